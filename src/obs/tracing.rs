// self
use crate::{_prelude::*, obs::FlowKind};

#[cfg(feature = "tracing")]
/// Future returned by [`FlowSpan::instrument`].
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
#[cfg(not(feature = "tracing"))]
/// Future returned by [`FlowSpan::instrument`]; the future itself when tracing is off.
pub type InstrumentedFlow<F> = F;

/// `blizzard_client.flow` span wrapping one token refresh or one Game API request.
///
/// Fields: `flow` (see [`FlowKind::as_str`]), `stage` (call site), `endpoint`, and `status`,
/// which stays empty until [`FlowSpan::record_status`] fills it.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	kind: FlowKind,
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens a span for `kind` at `stage`.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		let span = tracing::info_span!(
			"blizzard_client.flow",
			flow = kind.as_str(),
			stage,
			endpoint = kind.endpoint(),
			status = tracing::field::Empty,
		);
		#[cfg(not(feature = "tracing"))]
		let _ = stage;

		Self {
			kind,
			#[cfg(feature = "tracing")]
			span,
		}
	}

	/// Flow this span belongs to.
	pub fn kind(&self) -> FlowKind {
		self.kind
	}

	/// Attaches the HTTP status of the response to the span.
	pub fn record_status(&self, status: u16) {
		#[cfg(feature = "tracing")]
		self.span.record("status", status);
		#[cfg(not(feature = "tracing"))]
		let _ = status;
	}

	/// Runs `fut` inside the span; the span is entered only while `fut` is polled.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			tracing::Instrument::instrument(fut, self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn span_passes_output_through_and_accepts_status() {
		let span = FlowSpan::new(FlowKind::ApiRequest, "authorized_get");

		assert_eq!(span.kind(), FlowKind::ApiRequest);

		let status = span
			.instrument(async {
				span.record_status(404);

				404_u16
			})
			.await;

		assert_eq!(status, 404);
	}
}
