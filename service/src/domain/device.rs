//! [`Device`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf};
use derive_more::{AsRef, Display, From, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::Session;
use crate::domain::{
    session::{self, refresh::TokenHash},
    user,
};

/// Client a user signed in from, holding a [`RefreshToken`].
///
/// Points to the latest [`Session`] issued for this client.
///
/// [`RefreshToken`]: session::RefreshToken
#[derive(Clone, Debug)]
pub struct Device {
    /// ID of this [`Device`].
    pub id: Id,

    /// ID of the user this [`Device`] belongs to.
    pub user_id: user::Id,

    /// ID of the latest [`Session`] of this [`Device`].
    pub session_id: session::Id,

    /// [`TokenHash`] of the current [`RefreshToken`] of this [`Device`].
    ///
    /// [`RefreshToken`]: session::RefreshToken
    pub refresh_token_hash: TokenHash,

    /// IP address this [`Device`] was last seen from.
    pub ip_address: Option<String>,

    /// `User-Agent` this [`Device`] was last seen with.
    pub user_agent: Option<String>,

    /// [`DateTime`] when this [`Device`] signed in.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Device`] was last refreshed.
    pub last_activity_at: ActivityDateTime,

    /// [`DateTime`] after which the [`RefreshToken`] of this [`Device`] is no
    /// longer accepted.
    ///
    /// It's fixed at sign in and isn't prolonged by refreshing.
    ///
    /// [`RefreshToken`]: session::RefreshToken
    pub expires_at: ExpirationDateTime,
}

impl Device {
    /// Indicates whether this [`Device`] is expired at the provided moment.
    #[must_use]
    pub fn is_expired_at<Of: ?Sized>(&self, now: DateTimeOf<Of>) -> bool {
        self.expires_at <= now.coerce()
    }
}

/// ID of a [`Device`].
#[derive(AsRef, Clone, Copy, Debug, Display, Eq, From, Hash, Into, PartialEq)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Generates a new random [`Id`].
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// [`DateTime`] of a [`Device`] creation.
pub type CreationDateTime = DateTimeOf<(Device, unit::Creation)>;

/// [`DateTime`] of a [`Device`] last activity.
pub type ActivityDateTime = DateTimeOf<(Device, unit::Activity)>;

/// [`DateTime`] of a [`Device`] expiration.
pub type ExpirationDateTime = DateTimeOf<(Device, unit::Expiration)>;

