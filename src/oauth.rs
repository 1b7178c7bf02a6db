//! Client-credentials exchange on top of the `oauth2` crate, plus transport error mapping.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError,
	RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenType},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AccessTokenBuilderError, ClientAuthMethod, ClientCredentials},
	error::{ConfigError, TokenAcquisitionError, TransportError},
	http::{HttpTransport, ResponseMetadata, ResponseMetadataSlot},
	obs::FlowKind,
};

type TokenEndpointClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeTokenResponse = oauth2::basic::BasicTokenResponse;

/// Maps HTTP transport failures into [`TransportError`] values.
///
/// The same mapper serves token exchanges and API requests; `flow` tells the two apart so the
/// resulting error names the endpoint that failed.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a [`TransportError`].
	fn map_transport_error(
		&self,
		flow: FlowKind,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> TransportError;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		flow: FlowKind,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> TransportError {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(flow, *inner),
			HttpClientError::Http(inner) => TransportError::InvalidRequest(inner),
			HttpClientError::Io(inner) => TransportError::Io(inner),
			HttpClientError::Other(message) => TransportError::Other { message },
			_ => TransportError::Other {
				message: format!(
					"unclassified transport failure calling {} (status {:?})",
					flow.endpoint(),
					meta.and_then(|value| value.status)
				),
			},
		}
	}
}

/// Performs the `client_credentials` grant against a single token endpoint.
pub(crate) struct ClientCredentialsFacade<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: TokenEndpointClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> ClientCredentialsFacade<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(
		token_url: &Url,
		credentials: &ClientCredentials,
		auth_method: ClientAuthMethod,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self, ConfigError> {
		let token_uri = TokenUrl::new(token_url.to_string())
			.map_err(|source| ConfigError::InvalidUrl { url: token_url.to_string(), source })?;
		let mut oauth_client = BasicClient::new(ClientId::new(credentials.client_id.clone()))
			.set_client_secret(ClientSecret::new(credentials.client_secret.expose().to_owned()))
			.set_token_uri(token_uri);

		if matches!(auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self { oauth_client, http_client, error_mapper })
	}

	/// Exchanges the client credentials for a new token stamped with `issued_at`.
	pub(crate) async fn exchange(
		&self,
		issued_at: OffsetDateTime,
	) -> Result<AccessToken, TokenAcquisitionError> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let response = self
			.oauth_client
			.exchange_client_credentials()
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;

		map_token_response(issued_at, response)
	}
}

fn map_token_response(
	issued_at: OffsetDateTime,
	response: FacadeTokenResponse,
) -> Result<AccessToken, TokenAcquisitionError> {
	let expires_in =
		response.expires_in().ok_or(TokenAcquisitionError::MissingExpiresIn)?.as_secs();
	let expires_in =
		i64::try_from(expires_in).map_err(|_| TokenAcquisitionError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(TokenAcquisitionError::NonPositiveExpiresIn);
	}

	let token_type = match response.token_type() {
		BasicTokenType::Bearer => "bearer".to_owned(),
		BasicTokenType::Mac => "mac".to_owned(),
		BasicTokenType::Extension(other) => other.clone(),
	};

	AccessToken::builder()
		.access_token(response.access_token().secret().to_owned())
		.token_type(token_type)
		.issued_at(issued_at)
		.expires_in(Duration::seconds(expires_in))
		.build()
		.map_err(|e| match e {
			AccessTokenBuilderError::ExpiryOutOfRange => TokenAcquisitionError::ExpiresInOutOfRange,
			other => other.into(),
		})
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> TokenAcquisitionError
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(response, meta_ref),
		RequestTokenError::Request(error) =>
			mapper.map_transport_error(FlowKind::TokenRefresh, meta_ref, error).into(),
		RequestTokenError::Parse(source, _body) =>
			TokenAcquisitionError::ResponseParse { source, status: meta_status(meta_ref) },
		RequestTokenError::Other(message) =>
			TokenAcquisitionError::Unexpected { message, status: meta_status(meta_ref) },
	}
}

fn map_server_response_error(
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> TokenAcquisitionError {
	let reason = match response.error_description() {
		Some(description) => format!("{} ({description})", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	};

	TokenAcquisitionError::Rejected { reason, status: meta_status(meta) }
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(flow: FlowKind, err: ReqwestError) -> TransportError {
	if err.is_timeout() {
		return TransportError::timeout(flow.endpoint(), err);
	}

	TransportError::network(flow.endpoint(), err)
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}
