//! Signed access [`Token`]s of [`Session`]s.

use std::{collections::HashSet, sync::Arc};

use common::Clock;
use derive_more::{AsRef, Debug, Display, Error, From, FromStr};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use tracing as log;

#[cfg(doc)]
use super::Session;
use super::{ExpirationDateTime, Id};

/// Access token of a [`Session`].
#[derive(AsRef, Clone, Debug, Display, Eq, FromStr, PartialEq)]
#[as_ref(str)]
pub struct Token(String);

/// Signing algorithm of [`Token`]s.
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq)]
pub enum Algorithm {
    /// HMAC using SHA-256.
    #[display("HS256")]
    #[serde(rename = "HS256")]
    Hs256,

    /// HMAC using SHA-384.
    #[display("HS384")]
    #[serde(rename = "HS384")]
    Hs384,

    /// HMAC using SHA-512.
    #[display("HS512")]
    #[serde(rename = "HS512")]
    Hs512,

    /// RSASSA-PKCS1-v1_5 using SHA-256.
    #[display("RS256")]
    #[serde(rename = "RS256")]
    Rs256,

    /// RSASSA-PKCS1-v1_5 using SHA-384.
    #[display("RS384")]
    #[serde(rename = "RS384")]
    Rs384,

    /// RSASSA-PKCS1-v1_5 using SHA-512.
    #[display("RS512")]
    #[serde(rename = "RS512")]
    Rs512,
}

impl Algorithm {
    /// Indicates whether this [`Algorithm`] is a symmetric one.
    #[must_use]
    pub const fn is_symmetric(self) -> bool {
        matches!(self, Self::Hs256 | Self::Hs384 | Self::Hs512)
    }
}

impl From<Algorithm> for jsonwebtoken::Algorithm {
    fn from(alg: Algorithm) -> Self {
        match alg {
            Algorithm::Hs256 => Self::HS256,
            Algorithm::Hs384 => Self::HS384,
            Algorithm::Hs512 => Self::HS512,
            Algorithm::Rs256 => Self::RS256,
            Algorithm::Rs384 => Self::RS384,
            Algorithm::Rs512 => Self::RS512,
        }
    }
}

/// Key material for signing and verifying [`Token`]s.
#[derive(Clone, Debug)]
pub enum Key {
    /// Shared secret of an HMAC [`Algorithm`].
    Secret(SecretString),

    /// PEM-encoded RSA key pair.
    Rsa {
        /// PEM-encoded private key, used for signing.
        private_pem: SecretString,

        /// PEM-encoded public key, used for verification.
        public_pem: String,
    },
}

/// Claims carried by a [`Token`].
#[derive(Debug, Deserialize, Serialize)]
struct Claims {
    /// ID of the [`Session`] the [`Token`] is issued for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sid: Option<Id>,

    /// Subject of the [`Token`], taken as the [`Session`] ID when `sid` is
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<Id>,

    /// [`DateTime`] when the [`Token`] expires.
    ///
    /// [`DateTime`]: common::DateTime
    #[serde(with = "common::datetime::serde::unix_timestamp")]
    exp: ExpirationDateTime,
}

/// Encoder and verifier of [`Token`]s.
#[derive(Clone, Debug)]
pub struct Codec {
    /// [`Header`] of issued [`Token`]s.
    header: Header,

    /// Key for signing [`Token`]s.
    #[debug(skip)]
    encoding_key: EncodingKey,

    /// Key for verifying [`Token`]s.
    #[debug(skip)]
    decoding_key: DecodingKey,

    /// Rules of [`Token`]s verification.
    validation: Validation,

    /// [`Clock`] to check [`Token`]s expiration against.
    clock: Arc<dyn Clock>,
}

impl Codec {
    /// Creates a new [`Codec`] signing with the provided [`Algorithm`].
    ///
    /// # Errors
    ///
    /// If the [`Key`] doesn't suit the [`Algorithm`] or is malformed.
    pub fn new(
        algorithm: Algorithm,
        key: &Key,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, KeyError> {
        let (encoding_key, decoding_key) = match key {
            Key::Secret(secret) if algorithm.is_symmetric() => {
                let secret = secret.expose_secret().as_bytes();
                (
                    EncodingKey::from_secret(secret),
                    DecodingKey::from_secret(secret),
                )
            }
            Key::Rsa {
                private_pem,
                public_pem,
            } if !algorithm.is_symmetric() => (
                EncodingKey::from_rsa_pem(
                    private_pem.expose_secret().as_bytes(),
                )?,
                DecodingKey::from_rsa_pem(public_pem.as_bytes())?,
            ),
            Key::Secret(_) | Key::Rsa { .. } => {
                return Err(KeyError::Mismatch(algorithm));
            }
        };

        let mut validation = Validation::new(algorithm.into());
        // Expiration is checked against the `Clock` instead.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::from(["exp".to_owned()]);

        Ok(Self {
            header: Header::new(algorithm.into()),
            encoding_key,
            decoding_key,
            validation,
            clock,
        })
    }

    /// Encodes a new [`Token`] for the [`Session`] with the provided [`Id`].
    ///
    /// # Errors
    ///
    /// If signing fails.
    pub fn encode(
        &self,
        session_id: &Id,
        expires_at: ExpirationDateTime,
    ) -> Result<Token, EncodeError> {
        let token = jsonwebtoken::encode(
            &self.header,
            &Claims {
                sid: Some(session_id.clone()),
                sub: None,
                exp: expires_at,
            },
            &self.encoding_key,
        )?;
        Ok(Token(token))
    }

    /// Decodes the [`Session`] [`Id`] out of the provided raw [`Token`].
    ///
    /// Forged, malformed and expired [`Token`]s are indistinguishable from
    /// an absent one, so [`None`] is returned for all of them.
    #[must_use]
    pub fn decode(&self, token: &str) -> Option<Id> {
        let claims = jsonwebtoken::decode::<Claims>(
            token,
            &self.decoding_key,
            &self.validation,
        )
        .map_err(|e| log::debug!("access token is invalid: {e}"))
        .ok()?
        .claims;

        if claims.exp <= self.clock.now().coerce() {
            log::debug!("access token is expired");
            return None;
        }
        let id = claims.sid.or(claims.sub);
        if id.is_none() {
            log::debug!("access token carries no session ID");
        }
        id
    }
}

/// Error of encoding a [`Token`].
#[derive(Debug, Display, Error, From)]
#[display("failed to sign access token: {_0}")]
pub struct EncodeError(jsonwebtoken::errors::Error);

/// Error of creating a [`Codec`].
#[derive(Debug, Display, Error, From)]
pub enum KeyError {
    /// [`Key`] belongs to another [`Algorithm`] family.
    #[display("`{_0}` algorithm cannot be used with the provided key")]
    #[from(ignore)]
    Mismatch(#[error(not(source))] Algorithm),

    /// [`Key`] is malformed.
    #[display("invalid key: {_0}")]
    Malformed(jsonwebtoken::errors::Error),
}
