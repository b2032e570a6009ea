//! [`RefreshToken`] definitions.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use derive_more::{AsRef, Debug, Display, FromStr};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rand::{rngs::OsRng, RngCore as _};
use serde::Serialize;
use sha2::{Digest as _, Sha256};

#[cfg(doc)]
use crate::domain::{Device, Session};

/// Opaque long-lived token exchanged for a new [`Session`].
///
/// Only its [`TokenHash`] is ever persisted.
#[derive(AsRef, Clone, Debug, Display, Eq, FromStr, PartialEq, Serialize)]
#[as_ref(str)]
#[debug("RefreshToken(..)")]
#[serde(transparent)]
pub struct RefreshToken(String);

impl RefreshToken {
    /// Number of random bytes a [`RefreshToken`] is generated from.
    pub const ENTROPY_BYTES: usize = 48;

    /// Generates a new random [`RefreshToken`].
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0; Self::ENTROPY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Computes the [`TokenHash`] of this [`RefreshToken`].
    #[must_use]
    pub fn hash(&self) -> TokenHash {
        TokenHash(Sha256::digest(self.0.as_bytes()).to_vec())
    }
}

impl From<&str> for RefreshToken {
    fn from(token: &str) -> Self {
        Self(token.to_owned())
    }
}

/// SHA-256 digest of a [`RefreshToken`], identifying its [`Device`].
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct TokenHash(Vec<u8>);

impl AsRef<[u8]> for TokenHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
