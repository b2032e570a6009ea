//! Shared setup of [`SessionService`] tests.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use common::{clock::Manual, DateTime};
use secrecy::SecretString;

use crate::{
    domain::{
        session::{self, token, Codec, Timer},
        Session,
    },
    infra::{password, Memory},
    Config, Service, SessionService,
};

use super::Transport;

/// [`Transport`] acting as a client which keeps the last delivered token.
#[derive(Clone, Debug)]
pub(crate) struct Recording {
    /// [`Codec`] to encode and decode tokens with.
    codec: Codec,

    /// Observable state of this [`Recording`] transport.
    state: Arc<Mutex<State>>,
}

/// State of a [`Recording`] transport.
#[derive(Debug, Default)]
pub(crate) struct State {
    /// Raw token the client presents.
    pub(crate) presented: Option<String>,

    /// Tokens delivered to the client.
    pub(crate) delivered: Vec<session::Token>,

    /// Number of [`Transport::remove_current()`] calls.
    pub(crate) removals: usize,
}

impl Recording {
    /// Makes the client present the provided raw token.
    pub(crate) fn present(&self, token: impl Into<String>) {
        self.state.lock().unwrap().presented = Some(token.into());
    }

    /// Returns the number of delivered tokens.
    pub(crate) fn deliveries(&self) -> usize {
        self.state.lock().unwrap().delivered.len()
    }

    /// Returns the number of removals.
    pub(crate) fn removals(&self) -> usize {
        self.state.lock().unwrap().removals
    }

    /// Returns the raw token the client presents.
    pub(crate) fn presented(&self) -> Option<String> {
        self.state.lock().unwrap().presented.clone()
    }
}

impl Transport for Recording {
    fn deliver(
        &self,
        session: &Session,
    ) -> Result<session::Token, token::EncodeError> {
        let token = self.codec.encode(&session.id, session.expires_at)?;
        let mut state = self.state.lock().unwrap();
        state.presented = Some(token.to_string());
        state.delivered.push(token.clone());
        Ok(token)
    }

    fn extract_id(&self) -> Option<session::Id> {
        let presented = self.state.lock().unwrap().presented.clone()?;
        self.codec.decode(&presented)
    }

    fn remove_current(&self) {
        let mut state = self.state.lock().unwrap();
        state.presented = None;
        state.removals += 1;
    }
}

/// [`Service`] over a [`Memory`] database with a [`Manual`] clock.
///
/// Sessions live for 2 minutes and get renewed within the last minute.
#[derive(Debug)]
pub(crate) struct Fixture {
    /// [`Manual`] clock of the [`Service`].
    pub(crate) clock: Manual,

    /// [`Memory`] database of the [`Service`].
    pub(crate) db: Memory,

    /// [`Service`] under test.
    pub(crate) service: Service<Memory>,
}

impl Fixture {
    /// Lifetime of [`Session`]s.
    pub(crate) const TTL: Duration = Duration::from_secs(120);

    /// Lifetime of refresh tokens.
    pub(crate) const REFRESH_TTL: Duration = Duration::from_secs(24 * 60 * 60);

    /// Creates a new [`Fixture`].
    pub(crate) fn new() -> Self {
        let clock =
            Manual::new(DateTime::from_unix_timestamp(1_700_000_000).unwrap());
        let codec = Codec::new(
            token::Algorithm::Hs256,
            &token::Key::Secret(SecretString::from("test-secret")),
            Arc::new(clock.clone()),
        )
        .unwrap();
        let timer = Timer::new(Self::TTL, 0.5, Arc::new(clock.clone())).unwrap();
        let db = Memory::new();
        let service = Service {
            config: Config {
                timer,
                codec,
                refresh_token_ttl: Self::REFRESH_TTL,
                password_hasher: Arc::new(password::Argon2),
                clean_expired_sessions: Default::default(),
            },
            database: db.clone(),
        };
        Self { clock, db, service }
    }

    /// Creates a new [`Recording`] transport presenting nothing.
    pub(crate) fn transport(&self) -> Recording {
        Recording {
            codec: self.service.config().codec.clone(),
            state: Arc::default(),
        }
    }

    /// Creates a new [`SessionService`] for a request made via the provided
    /// [`Recording`] transport.
    pub(crate) fn request(
        &self,
        transport: &Recording,
    ) -> SessionService<Memory, Recording> {
        SessionService::new(self.service.clone(), transport.clone())
    }
}
