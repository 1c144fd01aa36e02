// self
use crate::{
	_prelude::*,
	obs::{CacheEvent, FlowKind},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by broker flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("music_broker.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a cache event; repaired entries log at `warn`, everything else at `debug`.
pub fn trace_cache_event(event: CacheEvent, key: &str) {
	#[cfg(feature = "tracing")]
	{
		match event {
			CacheEvent::Repaired => tracing::warn!(
				key,
				event = event.as_str(),
				"Cached entry failed to decode; deleted."
			),
			_ => tracing::debug!(key, event = event.as_str(), "Cache lookup."),
		}
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (event, key);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_passes_output_through() {
		let span = FlowSpan::new(FlowKind::Cache, "instrument_passes_output_through");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}

	#[test]
	fn cache_events_trace_without_subscriber() {
		trace_cache_event(CacheEvent::Hit, "spotify:tokens:u1:playlists");
		trace_cache_event(CacheEvent::Repaired, "spotify:tokens:u1:playlists");
	}
}
