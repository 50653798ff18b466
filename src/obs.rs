//! Observability helpers for broker flows.
//!
//! Every public flow runs inside a `credential_broker.flow` span carrying the `flow` kind and
//! the `stage` (call site). Enable the `metrics` feature to increment the
//! `credential_broker_flow_total` counter for every attempt/success/failure, labeled by
//! `flow` + `outcome`.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Flow kinds observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Credential resolution (`get_credentials`).
	Resolve,
	/// Refresh-token exchange.
	Refresh,
	/// Authorized API call with 401 recovery.
	AuthorizedRequest,
	/// Retry driver wrapping an arbitrary operation.
	Retry,
	/// Read-only diagnostics report.
	Diagnostics,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Resolve => "resolve",
			FlowKind::Refresh => "refresh",
			FlowKind::AuthorizedRequest => "authorized_request",
			FlowKind::Retry => "retry",
			FlowKind::Diagnostics => "diagnostics",
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

/// Runs `fut` inside a flow span and records attempt plus success/failure outcomes.
pub async fn observe<T, Fut>(kind: FlowKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);

	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(e) => {
			::tracing::debug!(flow = kind.as_str(), stage, error_kind = %e.kind(), "Flow failed.");
			record_flow_outcome(kind, FlowOutcome::Failure);
		},
	}

	result
}
