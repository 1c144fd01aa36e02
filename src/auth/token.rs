//! Token secrets and the per-user credential record built around them.

pub mod record;
pub mod secret;
