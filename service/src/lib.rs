//! Service contains the authenticated session lifecycle.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod auth;
pub mod command;
pub mod domain;
pub mod infra;
pub mod task;

use std::{error::Error, sync::Arc, time::Duration};

use common::operations::{By, Start};

#[cfg(doc)]
use self::domain::{Device, Session};
use self::{domain::session, infra::PasswordHasher};
#[cfg(doc)]
use infra::Database;

pub use self::{
    auth::{AccessRevoker, IdentityProvider, SessionService, Transport},
    command::Command,
    task::Task,
};

/// [`Service`] configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// [`session::Timer`] of [`Session`]s.
    pub timer: session::Timer,

    /// [`session::Codec`] of access [`session::Token`]s.
    pub codec: session::Codec,

    /// Lifetime of a [`Device`] refresh token, counted from signing in.
    pub refresh_token_ttl: Duration,

    /// [`PasswordHasher`] verifying credentials.
    pub password_hasher: Arc<dyn PasswordHasher>,

    /// [`task::CleanExpiredSessions`] configuration.
    pub clean_expired_sessions: task::clean_expired_sessions::Config,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,
}

impl<Db> Service<Db> {
    /// Creates a new [`Service`] with the provided parameters, along with its
    /// [`task::Background`] to be driven by the caller.
    pub fn new(config: Config, database: Db) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<
                        task::CleanExpiredSessions<Self>,
                        task::clean_expired_sessions::Config,
                    >,
                >,
                Ok = (),
                Err: Error,
            > + Clone
            + 'static,
    {
        let this = Service { config, database };

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn(async move {
            svc.execute(Start(By::new(svc.config().clean_expired_sessions)))
                .await
        });

        (this, bg)
    }

    /// Returns [`Config`] of this [`Service`].
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }
}
