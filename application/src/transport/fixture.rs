//! Shared setup of [`Transport`] tests.
//!
//! [`Transport`]: service::Transport

use std::{sync::Arc, time::Duration};

use common::{clock, DateTime};
use secrecy::SecretString;
use service::domain::{
    session::{self, token},
    Session,
};

/// Creates a new [`session::Codec`] signing with a test secret.
pub(super) fn codec() -> session::Codec {
    session::Codec::new(
        token::Algorithm::Hs256,
        &token::Key::Secret(SecretString::from("test-secret")),
        Arc::new(clock::System),
    )
    .unwrap()
}

/// Creates a new [`Session`] expiring in an hour.
pub(super) fn session() -> Session {
    Session {
        id: session::Id::generate(),
        user_id: "user".into(),
        expires_at: (DateTime::now() + Duration::from_secs(60 * 60)).coerce(),
    }
}
