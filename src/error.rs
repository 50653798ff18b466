//! Broker-level error taxonomy shared across the store, token endpoint, and request flows.
//!
//! Every internal failure is normalized into [`Error`] before it crosses a component
//! boundary. Callers branch on [`Error::kind`], [`Error::is_retryable`], and
//! [`Error::requires_reauthentication`] instead of provider-specific strings.

// self
use crate::{_prelude::*, store::StoreError};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// HTTP statuses that indicate a temporary upstream condition.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// No user record exists for the identifier.
	#[error("No user record exists for `{user_id}`.")]
	UserNotFound {
		/// Identifier that failed the lookup.
		user_id: String,
	},
	/// The user never completed the initial consent for the service.
	#[error("User `{user_id}` has not connected the {service} service.")]
	ServiceNotAuthenticated {
		/// Identifier of the user.
		user_id: String,
		/// Service key missing from the user record.
		service: String,
	},
	/// The stored grant lacks scopes the caller needs; re-consent is required.
	#[error("Stored grant is missing required scopes: {}.", .missing.join(" "))]
	InsufficientScopes {
		/// Required scopes absent from the stored grant.
		missing: Vec<String>,
	},
	/// Provider rejected the refresh token; the user must re-authenticate.
	#[error("Provider rejected the refresh token: {reason}.")]
	RefreshTokenInvalid {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Refresh call failed for a reason other than an invalid grant.
	#[error("Token refresh failed: {reason}.")]
	TokenRefreshFailed {
		/// Provider- or broker-supplied reason string.
		reason: String,
		/// HTTP status returned by the token endpoint, when available.
		status: Option<u16>,
		/// Whether retrying the same refresh may succeed.
		retryable: bool,
	},
	/// Transport failure reaching the provider.
	#[error(transparent)]
	Network(#[from] TransportError),
	/// Provider answered successfully but the body was unusable (e.g. no access token).
	#[error("Provider returned an unusable response: {reason}.")]
	InvalidResponse {
		/// Summary of what was wrong with the payload.
		reason: String,
		/// Structured parsing failure, when the body was not valid JSON.
		#[source]
		source: Option<BoxError>,
	},
	/// The persistence layer rejected the credential write.
	#[error("Failed to persist refreshed credentials.")]
	TokenSaveFailed {
		/// Underlying storage failure.
		#[source]
		source: StoreError,
	},
	/// No valid or refreshable token is available.
	#[error("No valid or refreshable credentials are available.")]
	InvalidCredentials,
	/// Re-authentication after a rejected call failed for an unclassified reason.
	#[error("Credential refresh failed after the provider rejected the access token.")]
	RefreshFailed {
		/// Failure raised by the refresh attempt.
		#[source]
		source: Box<Error>,
	},
	/// The user repository failed while reading credentials.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		StoreError,
	),
	/// An authorized API call returned a non-success status.
	#[error("API request failed with HTTP {status}: {message}.")]
	Api {
		/// HTTP status returned by the provider API.
		status: u16,
		/// Body preview or canonical reason.
		message: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Machine-readable classification of the error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::UserNotFound { .. } => ErrorKind::UserNotFound,
			Self::ServiceNotAuthenticated { .. } => ErrorKind::ServiceNotAuthenticated,
			Self::InsufficientScopes { .. } => ErrorKind::InsufficientScopes,
			Self::RefreshTokenInvalid { .. } => ErrorKind::RefreshTokenInvalid,
			Self::TokenRefreshFailed { .. } => ErrorKind::TokenRefreshFailed,
			Self::Network(_) => ErrorKind::NetworkError,
			Self::InvalidResponse { .. } => ErrorKind::InvalidResponse,
			Self::TokenSaveFailed { .. } => ErrorKind::TokenSaveFailed,
			Self::InvalidCredentials => ErrorKind::InvalidCredentials,
			Self::RefreshFailed { .. } => ErrorKind::RefreshFailed,
			Self::Storage(_) => ErrorKind::StorageFailed,
			Self::Api { .. } => ErrorKind::ApiError,
			Self::Config(_) => ErrorKind::Configuration,
		}
	}

	/// Returns `true` when retrying the same operation may succeed.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Network(_) => true,
			Self::TokenRefreshFailed { retryable, .. } => *retryable,
			Self::TokenSaveFailed { source } | Self::Storage(source) => source.is_transient(),
			Self::Api { status, .. } => RETRYABLE_STATUSES.contains(status),
			_ => false,
		}
	}

	/// Returns `true` for terminal kinds that must send the user back through consent.
	///
	/// A [`Error::RefreshFailed`] wrapper answers for the failure it wraps.
	pub fn requires_reauthentication(&self) -> bool {
		match self {
			Self::RefreshFailed { source } => source.requires_reauthentication(),
			_ => matches!(
				self.kind(),
				ErrorKind::RefreshTokenInvalid
					| ErrorKind::InsufficientScopes
					| ErrorKind::ServiceNotAuthenticated
			),
		}
	}

	/// Returns `true` when the error means the provider rejected the presented access token.
	pub fn is_auth_error(&self) -> bool {
		matches!(self, Self::Api { status: 401, .. } | Self::InvalidCredentials)
	}

	/// HTTP status associated with the failure, when one was observed.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Api { status, .. } => Some(*status),
			Self::TokenRefreshFailed { status, .. } => *status,
			_ => None,
		}
	}

	/// Retry-After hint supplied by the provider, if any.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Api { retry_after, .. } => *retry_after,
			_ => None,
		}
	}

	/// Wraps an unclassified refresh failure raised while recovering from a rejected token.
	pub fn refresh_failed(source: Error) -> Self {
		Self::RefreshFailed { source: Box::new(source) }
	}
}

/// Stable, `Copy` labels for every [`Error`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
	/// See [`Error::UserNotFound`].
	UserNotFound,
	/// See [`Error::ServiceNotAuthenticated`].
	ServiceNotAuthenticated,
	/// See [`Error::InsufficientScopes`].
	InsufficientScopes,
	/// See [`Error::RefreshTokenInvalid`].
	RefreshTokenInvalid,
	/// See [`Error::TokenRefreshFailed`].
	TokenRefreshFailed,
	/// See [`Error::Network`].
	NetworkError,
	/// See [`Error::InvalidResponse`].
	InvalidResponse,
	/// See [`Error::TokenSaveFailed`].
	TokenSaveFailed,
	/// See [`Error::InvalidCredentials`].
	InvalidCredentials,
	/// See [`Error::RefreshFailed`].
	RefreshFailed,
	/// See [`Error::Storage`].
	StorageFailed,
	/// See [`Error::Api`].
	ApiError,
	/// See [`Error::Config`].
	Configuration,
}
impl ErrorKind {
	/// Returns a stable label suitable for logs, metrics, and API payloads.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::UserNotFound => "user_not_found",
			Self::ServiceNotAuthenticated => "service_not_authenticated",
			Self::InsufficientScopes => "insufficient_scopes",
			Self::RefreshTokenInvalid => "refresh_token_invalid",
			Self::TokenRefreshFailed => "token_refresh_failed",
			Self::NetworkError => "network_error",
			Self::InvalidResponse => "invalid_response",
			Self::TokenSaveFailed => "token_save_failed",
			Self::InvalidCredentials => "invalid_credentials",
			Self::RefreshFailed => "refresh_failed",
			Self::StorageFailed => "storage_failed",
			Self::ApiError => "api_error",
			Self::Configuration => "configuration",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A provider endpoint cannot be parsed or joined.
	#[error("The {endpoint} endpoint is invalid.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// An absolute API URL points outside the provider's API origin.
	#[error("Refusing to send credentials to a foreign origin: {url}.")]
	ForeignApiOrigin {
		/// Rejected URL.
		url: String,
	},
	/// Requested scope bundle is not registered in the catalog.
	#[error("Scope bundle `{name}` is not registered.")]
	UnknownScopeBundle {
		/// Bundle name supplied by the caller.
		name: String,
	},
	/// Request scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Identifier validation failed.
	#[error("Identifier is invalid.")]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Provider descriptor failed validation.
	#[error("Provider descriptor is invalid.")]
	InvalidDescriptor(#[from] crate::provider::ProviderDescriptorError),
}

/// Transport-level failures (DNS, TCP, TLS, timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The call exceeded its bounded timeout.
	#[error("Request to the provider timed out.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout.
	pub fn timeout(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::timeout(e) } else { Self::network(e) }
	}
}
