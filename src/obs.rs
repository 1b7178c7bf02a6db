//! Optional observability helpers for token refreshes and API requests.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `blizzard_client.flow` with the `flow`
//!   (token refresh or API request) and `stage` (call site) fields.
//! - Enable `metrics` to increment the `blizzard_client_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outbound call kinds observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Client-credentials exchange against the OAuth token endpoint.
	TokenRefresh,
	/// Bearer-authenticated GET against a Game API.
	ApiRequest,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::TokenRefresh => "token_refresh",
			FlowKind::ApiRequest => "api_request",
		}
	}

	/// Human-readable name of the remote endpoint, used in error messages.
	pub const fn endpoint(self) -> &'static str {
		match self {
			FlowKind::TokenRefresh => "the token endpoint",
			FlowKind::ApiRequest => "the Game API",
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
	/// Entry to a client helper.
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
