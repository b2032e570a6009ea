//! [`Command`] for creating a [`Session`].

use common::operations::{Commit, Insert, Transact, Transacted};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        device,
        session::{self, token, RefreshToken},
        user, Device, Session,
    },
    infra::{database, Database},
    SessionService, Transport,
};

use super::Command;

/// [`Command`] for creating a new [`Session`] of an already identified user,
/// along with the [`Device`] it's used from.
#[derive(Clone, Debug)]
pub struct CreateSession {
    /// ID of the user to create a [`Session`] for.
    pub user_id: user::Id,

    /// IP address of the client.
    pub ip_address: Option<String>,

    /// `User-Agent` of the client.
    pub user_agent: Option<String>,
}

/// Output of [`CreateSession`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// Created [`Session`].
    pub session: Session,

    /// Access [`session::Token`] delivered to the client.
    pub access_token: session::Token,

    /// [`RefreshToken`] of the client [`Device`].
    pub refresh_token: RefreshToken,
}

impl<Db, T> Command<CreateSession> for SessionService<Db, T>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Insert<Session>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Insert<Device>, Ok = (), Err = Traced<database::Error>>
        + Database<Commit, Ok = (), Err = Traced<database::Error>>,
    T: Transport,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateSession) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateSession {
            user_id,
            ip_address,
            user_agent,
        } = cmd;
        let config = self.service().config();

        let now = config.timer.current_time();
        let session = Session {
            id: session::Id::generate(),
            user_id: user_id.clone(),
            expires_at: config.timer.session_expiration(),
        };
        let refresh_token = RefreshToken::generate();
        let device = Device {
            id: device::Id::generate(),
            user_id,
            session_id: session.id.clone(),
            refresh_token_hash: refresh_token.hash(),
            ip_address,
            user_agent,
            created_at: now.coerce(),
            last_activity_at: now.coerce(),
            expires_at: (now + config.refresh_token_ttl).coerce(),
        };

        let tx = self
            .service()
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Insert(session.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Insert(device))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let access_token = self
            .transport()
            .deliver(&session)
            .map_err(tracerr::from_and_wrap!(=> E))?;
        log::debug!("created new `Session` of `User(id: {})`", session.user_id);

        self.remember(session.clone());
        Ok(Output {
            session,
            access_token,
            refresh_token,
        })
    }
}

/// Error of [`CreateSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] is unable to persist the [`Session`], so it's worth
    /// retrying later.
    #[display("Authentication is temporarily unavailable: {_0}")]
    Unavailable(database::Error),

    /// Access [`session::Token`] cannot be signed.
    TokenEncode(token::EncodeError),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::Clock as _;

    use crate::{auth::fixture::Fixture, Command as _};

    use super::{CreateSession, ExecutionError};

    fn create(user_id: &str) -> CreateSession {
        CreateSession {
            user_id: user_id.into(),
            ip_address: Some("127.0.0.1".into()),
            user_agent: Some("curl/8.0".into()),
        }
    }

    #[tokio::test]
    async fn persists_session_and_device() {
        let fx = Fixture::new();
        let transport = fx.transport();
        let now = fx.clock.now();

        let out = fx.request(&transport).execute(create("u")).await.unwrap();

        assert_eq!(out.session.user_id, "u".into());
        assert_eq!(out.session.expires_at, (now + Fixture::TTL).coerce());
        assert_eq!(fx.db.sessions().await, vec![out.session.clone()]);

        let devices = fx.db.devices().await;
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].session_id, out.session.id);
        assert_eq!(devices[0].refresh_token_hash, out.refresh_token.hash());
        assert_eq!(devices[0].ip_address.as_deref(), Some("127.0.0.1"));
        assert_eq!(
            devices[0].expires_at,
            (now + Fixture::REFRESH_TTL).coerce(),
        );
    }

    #[tokio::test]
    async fn delivers_access_token() {
        let fx = Fixture::new();
        let transport = fx.transport();

        let out = fx.request(&transport).execute(create("u")).await.unwrap();

        assert_eq!(transport.deliveries(), 1);
        assert_eq!(
            transport.presented().as_deref(),
            Some(out.access_token.as_ref()),
        );
    }

    #[tokio::test]
    async fn creates_distinct_sessions() {
        let fx = Fixture::new();
        let transport = fx.transport();

        let first = fx.request(&transport).execute(create("u")).await.unwrap();
        fx.clock.advance(Duration::from_secs(1));
        let second = fx.request(&transport).execute(create("u")).await.unwrap();

        assert_ne!(first.session.id, second.session.id);
        assert_ne!(first.refresh_token, second.refresh_token);
        assert_eq!(fx.db.sessions().await.len(), 2);
    }

    #[tokio::test]
    async fn reports_unavailable_storage() {
        let fx = Fixture::new();
        let transport = fx.transport();
        fx.db.set_offline(true);

        let err = fx
            .request(&transport)
            .execute(create("u"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Unavailable(_)));
        assert_eq!(transport.deliveries(), 0);
    }
}
