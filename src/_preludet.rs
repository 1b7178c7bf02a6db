//! Convenience re-exports and a scripted transport for tests; enabled via `cfg(test)` or the
//! `test` crate feature.

pub use crate::_prelude::*;

// std
use std::{
	collections::VecDeque,
	io,
	sync::atomic::{AtomicUsize, Ordering},
	task::{Context, Poll},
};
// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		Response,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderName},
	},
};
// self
use crate::{
	auth::ClientCredentials,
	client::{Client, ClientBuilder},
	clock::ManualClock,
	error::TransportError,
	http::{HttpTransport, ResponseMetadata, ResponseMetadataSlot},
	oauth::TransportErrorMapper,
	obs::FlowKind,
	region::{Region, RegionEndpoints},
};

/// OAuth base used by [`scripted_client`].
pub const SCRIPTED_OAUTH_BASE: &str = "https://oauth.test";
/// API base used by [`scripted_client`].
pub const SCRIPTED_API_BASE: &str = "https://api.test";

/// Client type produced by [`scripted_client`].
pub type ScriptedClient = Client<ScriptedHttpClient, ScriptedTransportErrorMapper>;

/// Builds a client wired to a fresh [`ScriptedHttpClient`] and a [`ManualClock`] at `start`.
pub fn scripted_client(start: OffsetDateTime) -> (ScriptedClient, ScriptedHttpClient, ManualClock) {
	let transport = ScriptedHttpClient::default();
	let clock = ManualClock::new(start);
	let client: ScriptedClient = ClientBuilder::new(
		ClientCredentials::new("scripted-client", "scripted-secret"),
		Region::US,
	)
	.endpoints(RegionEndpoints::custom(SCRIPTED_OAUTH_BASE, SCRIPTED_API_BASE, "en_US"))
	.clock(clock.clone())
	.build_with_http_client(transport.clone(), ScriptedTransportErrorMapper)
	.expect("Scripted client should build.");

	(client, transport, clock)
}

/// Canned outcome for one request.
#[derive(Clone, Debug)]
pub enum ScriptedReply {
	/// Complete response with a JSON content type.
	Response {
		/// HTTP status code.
		status: u16,
		/// Response body.
		body: Vec<u8>,
	},
	/// Status line arrives, then the body read fails.
	BodyReadFailure {
		/// HTTP status code received before the failure.
		status: u16,
	},
	/// The connection cannot be established.
	ConnectFailure,
}
impl ScriptedReply {
	/// Successful token endpoint response.
	pub fn token(access_token: &str, expires_in: i64) -> Self {
		Self::json(
			200,
			&format!(
				r#"{{"access_token":"{access_token}","token_type":"bearer","expires_in":{expires_in},"sub":"scripted"}}"#
			),
		)
	}

	/// Response carrying `body` verbatim.
	pub fn json(status: u16, body: &str) -> Self {
		Self::Response { status, body: body.as_bytes().to_vec() }
	}
}

/// Request observed by [`ScriptedHttpClient`].
#[derive(Clone, Debug)]
pub struct RecordedRequest {
	/// HTTP method.
	pub method: String,
	/// Absolute request URI.
	pub uri: String,
	/// `Authorization` header, if sent.
	pub authorization: Option<String>,
	/// `Accept` header, if sent.
	pub accept: Option<String>,
	/// Request body.
	pub body: Vec<u8>,
}

/// Error raised by [`ScriptedHttpClient`] for connection failures.
#[derive(Debug)]
pub enum ScriptedTransportError {
	/// The scripted connection was refused.
	ConnectionRefused,
	/// No reply was queued for the request.
	Exhausted {
		/// URI of the unanswered request.
		uri: String,
	},
}
impl Display for ScriptedTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::ConnectionRefused => write!(f, "Scripted connection refused."),
			Self::Exhausted { uri } => write!(f, "No scripted reply queued for {uri}."),
		}
	}
}
impl StdError for ScriptedTransportError {}

/// Maps scripted failures the same way the reqwest mapper maps real ones.
#[derive(Clone, Debug, Default)]
pub struct ScriptedTransportErrorMapper;
impl TransportErrorMapper<ScriptedTransportError> for ScriptedTransportErrorMapper {
	fn map_transport_error(
		&self,
		flow: FlowKind,
		_meta: Option<&ResponseMetadata>,
		err: HttpClientError<ScriptedTransportError>,
	) -> TransportError {
		match err {
			HttpClientError::Reqwest(inner) => TransportError::network(flow.endpoint(), *inner),
			HttpClientError::Http(inner) => TransportError::InvalidRequest(inner),
			HttpClientError::Io(inner) => TransportError::Io(inner),
			HttpClientError::Other(message) => TransportError::Other { message },
			other => TransportError::Other { message: format!("{other:?}") },
		}
	}
}

#[derive(Debug, Default)]
struct ScriptedState {
	token_replies: Mutex<VecDeque<ScriptedReply>>,
	api_replies: Mutex<VecDeque<ScriptedReply>>,
	token_requests: Mutex<Vec<RecordedRequest>>,
	api_requests: Mutex<Vec<RecordedRequest>>,
	opened: AtomicUsize,
	released: AtomicUsize,
}

/// In-memory [`HttpTransport`] answering from queued [`ScriptedReply`] values.
///
/// Requests whose path ends in `/oauth/token` consume the token queue; everything else consumes
/// the API queue. Every dispatched request opens a simulated connection that is released when
/// the request future finishes. Clones share queues and counters.
#[derive(Clone, Debug, Default)]
pub struct ScriptedHttpClient(Arc<ScriptedState>);
impl ScriptedHttpClient {
	/// Queues a reply for the next token request.
	pub fn push_token(&self, reply: ScriptedReply) {
		self.0.token_replies.lock().push_back(reply);
	}

	/// Queues a reply for the next API request.
	pub fn push_api(&self, reply: ScriptedReply) {
		self.0.api_replies.lock().push_back(reply);
	}

	/// Number of token requests dispatched so far.
	pub fn token_requests(&self) -> usize {
		self.0.token_requests.lock().len()
	}

	/// Token requests dispatched so far.
	pub fn token_request_log(&self) -> Vec<RecordedRequest> {
		self.0.token_requests.lock().clone()
	}

	/// API requests dispatched so far.
	pub fn api_requests(&self) -> Vec<RecordedRequest> {
		self.0.api_requests.lock().clone()
	}

	/// Connections opened so far.
	pub fn connections_opened(&self) -> usize {
		self.0.opened.load(Ordering::SeqCst)
	}

	/// Connections released so far.
	pub fn connections_released(&self) -> usize {
		self.0.released.load(Ordering::SeqCst)
	}
}
impl HttpTransport for ScriptedHttpClient {
	type Handle = ScriptedHandle;
	type TransportError = ScriptedTransportError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ScriptedHandle { state: Arc::clone(&self.0), slot }
	}
}

/// Handle returned by [`ScriptedHttpClient::with_metadata`].
#[derive(Debug)]
pub struct ScriptedHandle {
	state: Arc<ScriptedState>,
	slot: ResponseMetadataSlot,
}
impl<'c> AsyncHttpClient<'c> for ScriptedHandle {
	type Error = HttpClientError<ScriptedTransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let state = Arc::clone(&self.state);
		let slot = self.slot.clone();

		Box::pin(async move {
			slot.take();

			let _connection = ConnectionGuard::open(&state);
			let recorded = RecordedRequest {
				method: request.method().to_string(),
				uri: request.uri().to_string(),
				authorization: header_value(&request, AUTHORIZATION),
				accept: header_value(&request, ACCEPT),
				body: request.body().clone(),
			};
			let is_token = request.uri().path().ends_with("/oauth/token");
			let reply = if is_token {
				state.token_requests.lock().push(recorded);
				state.token_replies.lock().pop_front()
			} else {
				state.api_requests.lock().push(recorded);
				state.api_replies.lock().pop_front()
			};

			// Lets concurrent callers interleave while this request is in flight.
			YieldOnce::default().await;

			match reply {
				Some(ScriptedReply::Response { status, body }) => {
					slot.store(ResponseMetadata { status: Some(status) });

					Response::builder()
						.status(status)
						.header(CONTENT_TYPE, "application/json")
						.body(body)
						.map_err(HttpClientError::Http)
				},
				Some(ScriptedReply::BodyReadFailure { status }) => {
					slot.store(ResponseMetadata { status: Some(status) });

					Err(HttpClientError::Io(io::Error::new(
						io::ErrorKind::UnexpectedEof,
						"scripted body truncated",
					)))
				},
				Some(ScriptedReply::ConnectFailure) =>
					Err(HttpClientError::Reqwest(Box::new(ScriptedTransportError::ConnectionRefused))),
				None => Err(HttpClientError::Reqwest(Box::new(ScriptedTransportError::Exhausted {
					uri: request.uri().to_string(),
				}))),
			}
		})
	}
}

struct ConnectionGuard(Arc<ScriptedState>);
impl ConnectionGuard {
	fn open(state: &Arc<ScriptedState>) -> Self {
		state.opened.fetch_add(1, Ordering::SeqCst);

		Self(Arc::clone(state))
	}
}
impl Drop for ConnectionGuard {
	fn drop(&mut self) {
		self.0.released.fetch_add(1, Ordering::SeqCst);
	}
}

#[derive(Default)]
struct YieldOnce(bool);
impl Future for YieldOnce {
	type Output = ();

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		if self.0 {
			return Poll::Ready(());
		}

		self.0 = true;
		cx.waker().wake_by_ref();

		Poll::Pending
	}
}

fn header_value(request: &HttpRequest, name: HeaderName) -> Option<String> {
	request.headers().get(name).and_then(|value| value.to_str().ok()).map(str::to_owned)
}
