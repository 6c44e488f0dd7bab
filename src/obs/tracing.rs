// self
use crate::{
	_prelude::*,
	obs::{OpKind, OpOutcome},
};

/// Resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// Span covering one operation.
///
/// The span is named `session_gate.op` and carries `op` and `stage` from creation.
/// `outcome` and, on failure, the public `error` code are filled in by
/// [`OpSpan::record_result`], so a single span line tells what ran and how it ended.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Opens a span for `kind` at `stage`.
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"session_gate.op",
				op = kind.as_str(),
				stage,
				outcome = tracing::field::Empty,
				error = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Runs a synchronous section inside the span.
	pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
		#[cfg(feature = "tracing")]
		{
			self.span.in_scope(f)
		}
		#[cfg(not(feature = "tracing"))]
		{
			f()
		}
	}

	/// Instruments a future without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
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

	/// Stamps the span with the outcome of `result` and returns that outcome.
	pub fn record_result<T>(&self, result: &Result<T>) -> OpOutcome {
		let (outcome, code) = match result {
			Ok(_) => (OpOutcome::Success, None),
			Err(e) => (OpOutcome::Failure, Some(e.code())),
		};

		#[cfg(feature = "tracing")]
		{
			self.span.record("outcome", outcome.as_str());

			if let Some(code) = code {
				self.span.record("error", code);
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = code;
		}

		outcome
	}
}
