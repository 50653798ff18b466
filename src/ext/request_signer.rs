//! Request signing contracts that let callers attach resolved credentials to any HTTP client.

// crates.io
use reqwest::RequestBuilder;
// self
use crate::{_prelude::*, auth::Credential};

/// Describes how to attach a [`Credential`] to an outbound request without constraining the
/// HTTP client type.
pub trait RequestSignerExt<Request, Error>
where
	Self: Send + Sync,
{
	/// Consumes the provided request and injects authorization derived from the credential.
	fn attach_token(&self, request: Request, credential: &Credential) -> Result<Request, Error>;
}

/// Signs reqwest requests with `Authorization: Bearer <access token>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BearerSigner;
impl RequestSignerExt<RequestBuilder, Error> for BearerSigner {
	fn attach_token(
		&self,
		request: RequestBuilder,
		credential: &Credential,
	) -> Result<RequestBuilder> {
		let token = credential
			.access_token
			.as_ref()
			.filter(|token| !token.is_blank())
			.ok_or(Error::InvalidCredentials)?;

		Ok(request.bearer_auth(token.expose()))
	}
}
