//! [`Session`] definitions.

pub mod refresh;
pub mod timer;
pub mod token;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf};
use derive_more::{AsRef, Display, FromStr};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rand::{rngs::OsRng, RngCore as _};
use serde::{Deserialize, Serialize};

use crate::domain::user;

pub use self::{
    refresh::RefreshToken,
    timer::Timer,
    token::{Codec, Token},
};

/// Server-tracked authenticated session of a user.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    /// ID of this [`Session`].
    pub id: Id,

    /// ID of the user this [`Session`] belongs to.
    pub user_id: user::Id,

    /// [`DateTime`] after which this [`Session`] is no longer valid.
    pub expires_at: ExpirationDateTime,
}

impl Session {
    /// Indicates whether this [`Session`] is expired at the provided moment.
    #[must_use]
    pub fn is_expired_at<Of: ?Sized>(&self, now: DateTimeOf<Of>) -> bool {
        self.expires_at <= now.coerce()
    }
}

/// ID of a [`Session`].
///
/// URL-safe and never reused.
#[derive(
    AsRef,
    Clone,
    Debug,
    Deserialize,
    Display,
    Eq,
    FromStr,
    Hash,
    PartialEq,
    Serialize,
)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    /// Number of random bytes an [`Id`] is generated from.
    pub const ENTROPY_BYTES: usize = 32;

    /// Generates a new random [`Id`].
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0; Self::ENTROPY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }
}

impl From<&str> for Id {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// [`DateTime`] of a [`Session`] expiration.
pub type ExpirationDateTime = DateTimeOf<(Session, unit::Expiration)>;
