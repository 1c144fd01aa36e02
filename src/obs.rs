//! Optional observability helpers for broker flows and the response cache.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `music_broker.flow` with the `flow` and
//!   `stage` fields, plus debug/warn events for cache hits, misses, and repaired entries.
//! - Enable `metrics` to increment `music_broker_flow_total` (labels `flow`, `outcome`) and
//!   `music_broker_cache_total` (label `event`).

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Flow kinds observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorization Code sign-in.
	AuthorizationCode,
	/// Refresh token exchange.
	Refresh,
	/// Resource call wrapped by the auth-retry orchestrator.
	AuthorizedCall,
	/// Cache-aside lookup.
	Cache,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::AuthorizationCode => "authorization_code",
			FlowKind::Refresh => "refresh",
			FlowKind::AuthorizedCall => "authorized_call",
			FlowKind::Cache => "cache",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a broker helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Cache lookup events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheEvent {
	/// Entry found and decoded.
	Hit,
	/// Entry absent; the producer ran.
	Miss,
	/// Entry failed to decode and was deleted.
	Repaired,
}
impl CacheEvent {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CacheEvent::Hit => "hit",
			CacheEvent::Miss => "miss",
			CacheEvent::Repaired => "repaired",
		}
	}
}
