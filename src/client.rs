//! Region-bound Game API client that stamps every request with a valid bearer token.
//!
//! A [`Client`] resolves its endpoints once at construction, owns a [`TokenManager`], and
//! exposes [`Client::authorized_get`]. Only HTTP 404 is turned into an error; every other
//! status comes back as an [`ApiResponse`] for the caller to inspect.

pub mod response;
pub mod token_manager;

pub use response::*;
pub use token_manager::*;

// crates.io
use oauth2::{
	AsyncHttpClient,
	http::{
		Method, Request, StatusCode,
		header::{ACCEPT, AUTHORIZATION},
	},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, ClientAuthMethod, ClientCredentials},
	clock::{Clock, SystemClock},
	error::ConfigError,
	http::{DEFAULT_TIMEOUT, HttpTransport, ResponseMetadataSlot},
	oauth::{ClientCredentialsFacade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, RefreshMetrics},
	region::{Region, RegionEndpoints},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport stack.
pub type ReqwestApiClient = Client<ReqwestHttpClient, ReqwestTransportErrorMapper>;

const DATA_PATH: &str = "/data";
const PROFILE_PATH: &str = "/profile";

/// Bearer-authenticated client for one region's Game APIs.
///
/// Clones share the transport and the token cache.
pub struct Client<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	region: Region,
	endpoints: RegionEndpoints,
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
	tokens: Arc<TokenManager<C, M>>,
}
#[cfg(feature = "reqwest")]
impl Client<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a client for `region` backed by a reqwest transport with a 60 second timeout.
	///
	/// No network traffic happens here; the first token is requested by the first API call.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		region: Region,
	) -> Result<Self> {
		Self::builder(client_id, client_secret, region).build()
	}

	/// Starts configuring a client; see [`ClientBuilder`] for custom transports.
	pub fn builder(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		region: Region,
	) -> ClientBuilder {
		ClientBuilder::new(ClientCredentials::new(client_id, client_secret), region)
	}
}
impl<C, M> Client<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Region the client was built for.
	pub fn region(&self) -> Region {
		self.region
	}

	/// OAuth host, API host, and locale in use.
	pub fn endpoints(&self) -> &RegionEndpoints {
		&self.endpoints
	}

	/// Locale tag for the `locale` query parameter.
	pub fn locale(&self) -> &str {
		&self.endpoints.locale
	}

	/// Token manager shared by every clone of this client.
	pub fn tokens(&self) -> &TokenManager<C, M> {
		&self.tokens
	}

	/// Snapshot of the cached token, if one was ever acquired.
	pub fn cached_token(&self) -> Option<AccessToken> {
		self.tokens.cached_token()
	}

	/// Refresh counters for this client's token.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		self.tokens.metrics()
	}

	/// Builds `/data{segment}` with the client's locale appended.
	pub fn data_path(&self, segment: &str) -> String {
		self.localized(DATA_PATH, segment)
	}

	/// Builds `/profile{segment}` with the client's locale appended.
	pub fn profile_path(&self, segment: &str) -> String {
		self.localized(PROFILE_PATH, segment)
	}

	/// Performs a bearer-authenticated GET of `api_base + path`.
	///
	/// `path` is appended verbatim, so it must already carry any query string, including the
	/// locale. HTTP 404 yields [`Error::NotFound`]; all other statuses are returned as-is.
	pub async fn authorized_get(&self, path: &str) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::ApiRequest;

		let span = FlowSpan::new(KIND, "authorized_get");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let url = self.endpoints.api_url(path).map_err(|source| ConfigError::InvalidUrl {
					url: format!("{}{path}", self.endpoints.api_base),
					source,
				})?;
				let token = self.tokens.ensure_valid_token().await?;
				let request = Request::builder()
					.method(Method::GET)
					.uri(url.as_str())
					.header(AUTHORIZATION, token.bearer_header())
					.header(ACCEPT, "application/json")
					.body(Vec::new())
					.map_err(ConfigError::from)?;
				let meta = ResponseMetadataSlot::default();
				let handle = self.http_client.with_metadata(meta.clone());
				let response = handle.call(request).await.map_err(|err| {
					self.transport_mapper.map_transport_error(KIND, meta.take().as_ref(), err)
				})?;
				let status = response.status();

				span.record_status(status.as_u16());

				if status == StatusCode::NOT_FOUND {
					return Err(Error::NotFound { status: status_line(status) });
				}

				Ok::<_, Error>(ApiResponse::new(status.as_u16(), response.into_body()))
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// [`Client::authorized_get`] followed by JSON decoding of the body.
	pub async fn get_json<T>(&self, path: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.authorized_get(path).await?.json()
	}

	fn localized(&self, prefix: &str, segment: &str) -> String {
		let separator = if segment.contains('?') { '&' } else { '?' };

		format!("{prefix}{segment}{separator}locale={}", self.endpoints.locale)
	}
}
impl<C, M> Clone for Client<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			region: self.region,
			endpoints: self.endpoints.clone(),
			http_client: Arc::clone(&self.http_client),
			transport_mapper: Arc::clone(&self.transport_mapper),
			tokens: Arc::clone(&self.tokens),
		}
	}
}
impl<C, M> Debug for Client<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("region", &self.region)
			.field("endpoints", &self.endpoints)
			.field("tokens", &self.tokens)
			.finish()
	}
}

/// Builder for [`Client`].
pub struct ClientBuilder {
	credentials: ClientCredentials,
	region: Region,
	endpoints: Option<RegionEndpoints>,
	timeout: StdDuration,
	auth_method: ClientAuthMethod,
	clock: Arc<dyn Clock>,
}
impl ClientBuilder {
	/// Seeds a builder with credentials and a region.
	pub fn new(credentials: ClientCredentials, region: Region) -> Self {
		Self {
			credentials,
			region,
			endpoints: None,
			timeout: DEFAULT_TIMEOUT,
			auth_method: ClientAuthMethod::default(),
			clock: Arc::new(SystemClock),
		}
	}

	/// Replaces the region's fixed endpoints (proxies, mock servers).
	pub fn endpoints(mut self, endpoints: RegionEndpoints) -> Self {
		self.endpoints = Some(endpoints);

		self
	}

	/// Overrides the per-request timeout of the built-in reqwest transport.
	///
	/// Custom transports passed to [`ClientBuilder::build_with_http_client`] enforce their own.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Chooses how credentials are presented to the token endpoint.
	pub fn client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.auth_method = method;

		self
	}

	/// Replaces the clock used for expiry checks.
	pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
		self.clock = Arc::new(clock);

		self
	}

	/// Builds a client on the default reqwest transport.
	#[cfg(feature = "reqwest")]
	pub fn build(self) -> Result<ReqwestApiClient> {
		let http_client = ReqwestHttpClient::with_timeout(self.timeout)?;

		self.build_with_http_client(http_client, ReqwestTransportErrorMapper)
	}

	/// Builds a client on a caller-provided transport + mapper pair.
	pub fn build_with_http_client<C, M>(
		self,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Client<C, M>>
	where
		C: ?Sized + HttpTransport,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		let endpoints = self.endpoints.unwrap_or_else(|| self.region.endpoints());
		let token_url = endpoints.token_url().map_err(|source| ConfigError::InvalidUrl {
			url: endpoints.oauth_base.to_string(),
			source,
		})?;
		let http_client = http_client.into();
		let transport_mapper = mapper.into();
		let facade = ClientCredentialsFacade::new(
			&token_url,
			&self.credentials,
			self.auth_method,
			Arc::clone(&http_client),
			Arc::clone(&transport_mapper),
		)?;

		Ok(Client {
			region: self.region,
			endpoints,
			http_client,
			transport_mapper,
			tokens: Arc::new(TokenManager::new(facade, self.clock)),
		})
	}
}
impl Debug for ClientBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientBuilder")
			.field("credentials", &self.credentials)
			.field("region", &self.region)
			.field("endpoints", &self.endpoints)
			.field("timeout", &self.timeout)
			.field("auth_method", &self.auth_method)
			.finish()
	}
}

fn status_line(status: StatusCode) -> String {
	match status.canonical_reason() {
		Some(reason) => format!("{} {reason}", status.as_u16()),
		None => status.as_u16().to_string(),
	}
}
