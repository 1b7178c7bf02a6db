//! Lazily acquired, single-flight refreshed client-credentials token.
//!
//! [`TokenManager::ensure_valid_token`] answers from the cached [`AccessToken`] while the clock
//! is before its expiry instant. Once the token is absent or expired, the first caller takes
//! the refresh guard and exchanges the client credentials; callers that queued behind it
//! re-check the cache after acquiring the guard and reuse the token it installed instead of
//! calling the token endpoint again. A failed exchange leaves the cached token untouched.

// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	clock::Clock,
	http::HttpTransport,
	oauth::{ClientCredentialsFacade, TransportErrorMapper},
	obs::{FlowKind, FlowSpan, RefreshMetrics},
};

/// Owns the current token and refreshes it from the OAuth endpoint on demand.
pub struct TokenManager<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	facade: ClientCredentialsFacade<C, M>,
	clock: Arc<dyn Clock>,
	token: RwLock<Option<AccessToken>>,
	refresh_guard: AsyncMutex<()>,
	metrics: RefreshMetrics,
}
impl<C, M> TokenManager<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(facade: ClientCredentialsFacade<C, M>, clock: Arc<dyn Clock>) -> Self {
		Self {
			facade,
			clock,
			token: RwLock::new(None),
			refresh_guard: AsyncMutex::new(()),
			metrics: RefreshMetrics::default(),
		}
	}

	/// Returns a token that is valid at the current instant, refreshing it first if needed.
	pub async fn ensure_valid_token(&self) -> Result<AccessToken> {
		if let Some(current) = self.cached_valid(self.clock.now()) {
			return Ok(current);
		}

		FlowSpan::new(FlowKind::TokenRefresh, "ensure_valid_token")
			.instrument(async move {
				let _singleflight = self.refresh_guard.lock().await;
				let now = self.clock.now();

				if let Some(current) = self.cached_valid(now) {
					return Ok(current);
				}

				self.metrics.record_attempt();

				match self.facade.exchange(now).await {
					Ok(token) => {
						*self.token.write() = Some(token.clone());
						self.metrics.record_success();

						Ok(token)
					},
					Err(e) => {
						self.metrics.record_failure();

						Err(e.into())
					},
				}
			})
			.await
	}

	/// Snapshot of the cached token, expired or not.
	pub fn cached_token(&self) -> Option<AccessToken> {
		self.token.read().clone()
	}

	/// Refresh counters for this token manager.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	fn cached_valid(&self, now: OffsetDateTime) -> Option<AccessToken> {
		self.token.read().as_ref().filter(|token| !token.is_expired_at(now)).cloned()
	}
}
impl<C, M> Debug for TokenManager<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("token", &*self.token.read())
			.field("metrics", &self.metrics)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use crate::{_preludet::*, error::TokenAcquisitionError};

	const START: OffsetDateTime = macros::datetime!(2025-01-01 00:00 UTC);

	#[tokio::test]
	async fn token_is_reused_until_expiry_then_refreshed_once() {
		let (client, transport, clock) = scripted_client(START);

		transport.push_token(ScriptedReply::token("first", 1_800));
		transport.push_token(ScriptedReply::token("second", 1_800));

		let first = client.tokens().ensure_valid_token().await.expect("Initial refresh should succeed.");

		assert_eq!(first.access_token.expose(), "first");
		assert_eq!(first.expires_at, START + Duration::seconds(1_800));

		clock.advance(Duration::seconds(1_799));

		let cached = client.tokens().ensure_valid_token().await.expect("Cache hit should succeed.");

		assert_eq!(cached.access_token.expose(), "first");
		assert_eq!(client.tokens().metrics().attempts(), 1);

		clock.advance(Duration::seconds(1));

		let refreshed =
			client.tokens().ensure_valid_token().await.expect("Expired token should refresh.");

		assert_eq!(refreshed.access_token.expose(), "second");
		assert_eq!(refreshed.expires_at, START + Duration::seconds(3_600));

		let again = client.tokens().ensure_valid_token().await.expect("Fresh token should be cached.");

		assert_eq!(again.access_token.expose(), "second");
		assert_eq!(client.tokens().metrics().attempts(), 2);
		assert_eq!(transport.token_requests(), 2);
	}

	#[tokio::test]
	async fn failed_first_refresh_leaves_token_absent() {
		let (client, transport, _clock) = scripted_client(START);

		transport.push_token(ScriptedReply::json(401, r#"{"error":"invalid_client"}"#));

		let err = client
			.tokens()
			.ensure_valid_token()
			.await
			.expect_err("Rejected credentials should surface.");

		assert!(matches!(
			err,
			Error::TokenAcquisition(TokenAcquisitionError::Rejected { status: Some(401), .. })
		));
		assert!(client.tokens().cached_token().is_none());
		assert_eq!(client.tokens().metrics().failures(), 1);
	}

	#[tokio::test]
	async fn failed_refresh_keeps_stale_token_and_retries_next_call() {
		let (client, transport, clock) = scripted_client(START);

		transport.push_token(ScriptedReply::token("original", 60));
		transport.push_token(ScriptedReply::ConnectFailure);
		transport.push_token(ScriptedReply::json(500, "not json"));
		transport.push_token(ScriptedReply::token("replacement", 60));

		client.tokens().ensure_valid_token().await.expect("Initial refresh should succeed.");
		clock.advance(Duration::seconds(60));

		let err = client
			.tokens()
			.ensure_valid_token()
			.await
			.expect_err("Unreachable token endpoint should surface.");

		assert!(matches!(err, Error::TokenAcquisition(TokenAcquisitionError::Transport(_))));

		let err = client
			.tokens()
			.ensure_valid_token()
			.await
			.expect_err("Malformed token response should surface.");

		assert!(matches!(err, Error::TokenAcquisition(_)));

		let stale = client.tokens().cached_token().expect("Stale token should remain cached.");

		assert_eq!(stale.access_token.expose(), "original");
		assert_eq!(stale.expires_at, START + Duration::seconds(60));

		let recovered =
			client.tokens().ensure_valid_token().await.expect("Later refresh should succeed.");

		assert_eq!(recovered.access_token.expose(), "replacement");
		assert_eq!(transport.token_requests(), 4);
		assert_eq!(client.tokens().metrics().successes(), 2);
		assert_eq!(client.tokens().metrics().failures(), 2);
	}

	#[tokio::test]
	async fn out_of_range_expiry_is_an_error_and_keeps_token() {
		let (client, transport, clock) = scripted_client(START);

		transport.push_token(ScriptedReply::token("kept", 60));
		transport.push_token(ScriptedReply::token("huge", 100_000_000_000_000));

		client.tokens().ensure_valid_token().await.expect("Initial refresh should succeed.");
		clock.advance(Duration::seconds(60));

		let err = client
			.tokens()
			.ensure_valid_token()
			.await
			.expect_err("Unrepresentable expiry should be rejected.");

		assert!(matches!(
			err,
			Error::TokenAcquisition(TokenAcquisitionError::ExpiresInOutOfRange)
		));

		let cached = client.tokens().cached_token().expect("Previous token should remain cached.");

		assert_eq!(cached.access_token.expose(), "kept");
		assert_eq!(cached.expires_at, START + Duration::seconds(60));
		assert_eq!(client.tokens().metrics().failures(), 1);
	}

	#[tokio::test]
	async fn concurrent_callers_on_expired_token_share_one_refresh() {
		let (client, transport, clock) = scripted_client(START);

		transport.push_token(ScriptedReply::token("old", 300));
		transport.push_token(ScriptedReply::token("new", 300));

		client.tokens().ensure_valid_token().await.expect("Initial refresh should succeed.");
		clock.advance(Duration::seconds(301));

		let (first, second, third, fourth) = tokio::join!(
			client.tokens().ensure_valid_token(),
			client.tokens().ensure_valid_token(),
			client.tokens().ensure_valid_token(),
			client.tokens().ensure_valid_token(),
		);

		for result in [first, second, third, fourth] {
			let token = result.expect("Every caller should receive the refreshed token.");

			assert_eq!(token.access_token.expose(), "new");
			assert_eq!(token.expires_at, START + Duration::seconds(601));
		}

		assert_eq!(transport.token_requests(), 2);
		assert_eq!(client.tokens().metrics().attempts(), 2);

		let after = client.tokens().ensure_valid_token().await.expect("Refresh must not stay stuck.");

		assert_eq!(after.access_token.expose(), "new");
		assert_eq!(transport.token_requests(), 2);
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_refresh() {
		let (client, transport, _clock) = scripted_client(START);

		transport.push_token(ScriptedReply::token("shared", 900));

		let (first, second, third) = tokio::join!(
			client.tokens().ensure_valid_token(),
			client.tokens().ensure_valid_token(),
			client.tokens().ensure_valid_token(),
		);

		for result in [first, second, third] {
			assert_eq!(
				result.expect("Every concurrent caller should get a token.").access_token.expose(),
				"shared"
			);
		}

		assert_eq!(transport.token_requests(), 1);
	}
}
