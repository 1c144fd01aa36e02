//! Provider-facing descriptors (data) and strategies (behavior).
//!
//! `descriptor` exposes validated metadata (`ProviderDescriptor`) covering the authorization,
//! token, and resource API endpoints, client authentication preference, and the scopes requested
//! at sign-in. `strategy` defines [`ProviderStrategy`], an HTTP-client-agnostic hook used by flows
//! to map token endpoint failures into the broker error taxonomy.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
