//! [`Header`] [`Transport`].

use axum_extra::headers::{
    authorization::Bearer, Authorization, HeaderMapExt as _,
};
use derive_more::Debug;
use service::{
    domain::{
        session::{self, token},
        Session,
    },
    Transport,
};
use tracing as log;

use super::{Staged, Staging};

/// [`Transport`] reading the access token from the `Authorization: Bearer`
/// header.
///
/// Delivered tokens are returned in the response body and the
/// `Authorization` response header. The client discards its token itself.
#[derive(Debug)]
pub struct Header {
    /// [`session::Codec`] to encode and decode tokens with.
    codec: session::Codec,

    /// Raw access token presented by the client.
    #[debug(skip)]
    presented: Option<String>,

    /// [`Staging`] of the current request.
    staging: Staging,
}

impl Header {
    /// Creates a new [`Header`] transport for the request with the provided
    /// `headers`.
    #[must_use]
    pub fn new(
        codec: session::Codec,
        headers: &http::HeaderMap,
        staging: Staging,
    ) -> Self {
        let presented = headers
            .typed_get::<Authorization<Bearer>>()
            .map(|Authorization(bearer)| bearer.token().to_owned());
        Self {
            codec,
            presented,
            staging,
        }
    }
}

impl Transport for Header {
    fn deliver(
        &self,
        session: &Session,
    ) -> Result<session::Token, token::EncodeError> {
        let token = self.codec.encode(&session.id, session.expires_at)?;
        self.staging.put(Staged::Delivered {
            token: token.clone(),
            expires_at: session.expires_at,
        });
        Ok(token)
    }

    fn extract_id(&self) -> Option<session::Id> {
        self.codec.decode(self.presented.as_deref()?)
    }

    fn remove_current(&self) {}
}

/// Applies the [`Staged`] outcome as an `Authorization` header.
pub(super) fn apply(staged: Staged, headers: &mut http::HeaderMap) {
    match staged {
        Staged::Delivered { token, .. } => {
            match http::HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(v) => _ = headers.insert(http::header::AUTHORIZATION, v),
                Err(e) => {
                    log::error!("failed to encode `Authorization` header: {e}");
                }
            }
        }
        Staged::Removed => {}
    }
}
