//! Optional observability helpers for token and identity operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `session_gate.op` with the `op`
//!   (operation) and `stage` (call site) fields. Each span is closed with an `outcome` and,
//!   on failure, the public `error` code. `debug` events describe why a credential was
//!   rejected.
//! - Enable `metrics` to increment the `session_gate_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`.
//!
//! Nothing recorded here ever contains a token, secret, or password.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::{_prelude::*, error::InternalError};

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Access/refresh pair issuance.
	Issue,
	/// Access token validation.
	Validate,
	/// Refresh token rotation.
	Rotate,
	/// Refresh token revocation.
	Revoke,
	/// Account registration.
	Register,
	/// Password login.
	Login,
	/// Password change.
	ChangePassword,
	/// Request admission through the gate.
	Admit,
	/// Background cleanup.
	Sweep,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Issue => "issue",
			OpKind::Validate => "validate",
			OpKind::Rotate => "rotate",
			OpKind::Revoke => "revoke",
			OpKind::Register => "register",
			OpKind::Login => "login",
			OpKind::ChangePassword => "change_password",
			OpKind::Admit => "admit",
			OpKind::Sweep => "sweep",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Records the internal cause of a uniformly reported failure.
///
/// Callers only ever see [`Error::Unauthorized`] or [`Error::Internal`]; this is where the
/// distinguishing cause goes instead.
pub fn record_rejection(kind: OpKind, cause: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		::tracing::debug!(op = kind.as_str(), cause = %cause, "Request rejected.");
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, cause);
	}
}

/// Records a failure that must be investigated by an operator (storage, signing keys).
pub fn record_internal(kind: OpKind, error: &dyn StdError) {
	#[cfg(feature = "tracing")]
	{
		::tracing::error!(op = kind.as_str(), error = %error, "Operation failed internally.");
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, error);
	}
}

/// Returns a mapper that logs a component error and folds it into [`Error::Internal`].
pub(crate) fn internal<E>(kind: OpKind) -> impl FnOnce(E) -> Error
where
	E: StdError + Into<InternalError>,
{
	move |error| {
		record_internal(kind, &error);

		Error::Internal(error.into())
	}
}

/// Runs `fut` inside an [`OpSpan`], recording attempt and outcome around it.
pub(crate) async fn observe<T, Fut>(kind: OpKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = OpSpan::new(kind, stage);

	record_op_outcome(kind, OpOutcome::Attempt);

	let result = span.instrument(fut).await;

	record_op_outcome(kind, span.record_result(&result));

	result
}

/// Synchronous counterpart of [`observe`].
pub(crate) fn observe_sync<T>(
	kind: OpKind,
	stage: &'static str,
	f: impl FnOnce() -> Result<T>,
) -> Result<T> {
	let span = OpSpan::new(kind, stage);

	record_op_outcome(kind, OpOutcome::Attempt);

	let result = span.in_scope(f);

	record_op_outcome(kind, span.record_result(&result));

	result
}
