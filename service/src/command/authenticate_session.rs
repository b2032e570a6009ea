//! [`Command`] for authenticating the current [`Session`].

use common::operations::{By, Commit, Select, Transact, Transacted, Update};
use derive_more::{Display, Error};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{session, Session},
    infra::{database, Database},
    SessionService, Transport,
};

use super::Command;

/// [`Command`] for resolving the [`Session`] presented by the client.
///
/// The [`Session`] is prolonged once less than
/// [`Timer::refresh_trigger_interval()`] of its lifetime is left, and the
/// prolonged one is delivered to the client.
///
/// [`Timer::refresh_trigger_interval()`]: session::Timer::refresh_trigger_interval
#[derive(Clone, Copy, Debug)]
pub struct AuthenticateSession;

impl<Db, T> Command<AuthenticateSession> for SessionService<Db, T>
where
    Db: Database<
            Select<By<Option<Session>, session::Id>>,
            Ok = Option<Session>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Update<Session>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Commit, Ok = (), Err = Traced<database::Error>>,
    T: Transport,
{
    type Ok = Session;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        _: AuthenticateSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        if let Some(session) = self.remembered() {
            return Ok(session);
        }

        let id = self
            .transport()
            .extract_id()
            .ok_or(E::NotAuthenticated)
            .map_err(tracerr::wrap!())?;

        let session = self
            .service()
            .database()
            .execute(Select(By::<Option<Session>, _>::new(id)))
            .await
            .unwrap_or_else(|e| {
                log::error!("failed to read `Session`: {e}");
                None
            })
            .ok_or(E::NotAuthenticated)
            .map_err(tracerr::wrap!())?;

        let timer = &self.service().config().timer;
        let now = timer.current_time();
        if session.is_expired_at(now) {
            log::debug!("`Session` of `User(id: {})` expired", session.user_id);
            return Err(tracerr::new!(E::NotAuthenticated));
        }

        let remaining =
            session.expires_at.duration_since(now).unwrap_or_default();
        let session = if remaining > timer.refresh_trigger_interval() {
            session
        } else {
            match self.prolong(session.clone()).await {
                Ok(prolonged) => {
                    if let Err(e) = self.transport().deliver(&prolonged) {
                        log::error!(
                            "failed to deliver prolonged `Session`: {e}",
                        );
                    }
                    log::debug!(
                        "prolonged `Session` of `User(id: {})`",
                        prolonged.user_id,
                    );
                    prolonged
                }
                // The original `Session` stays valid until its expiration,
                // and the next request retries prolonging it.
                Err(e) => {
                    log::warn!(
                        "failed to prolong `Session` of `User(id: {})`: {e}",
                        session.user_id,
                    );
                    session
                }
            }
        };

        self.remember(session.clone());
        Ok(session)
    }
}

impl<Db, T> SessionService<Db, T>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Update<Session>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Commit, Ok = (), Err = Traced<database::Error>>,
{
    /// Persists the provided [`Session`] with a fresh expiration.
    async fn prolong(
        &self,
        mut session: Session,
    ) -> Result<Session, Traced<database::Error>> {
        session.expires_at =
            self.service().config().timer.session_expiration();

        let tx = self
            .service()
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::wrap!())?;
        tx.execute(Update(session.clone()))
            .await
            .map_err(tracerr::wrap!())?;
        tx.execute(Commit).await.map_err(tracerr::wrap!())?;

        Ok(session)
    }
}

/// Error of [`AuthenticateSession`] [`Command`] execution.
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum ExecutionError {
    /// Client presents no valid [`Session`].
    ///
    /// Doesn't tell whether the [`Session`] is missing, expired or forged.
    #[display("Not authenticated")]
    NotAuthenticated,
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{
        operations::{By, Delete, Insert},
        Clock as _,
    };

    use crate::{
        auth::fixture::Fixture,
        command::{create_session, CreateSession},
        domain::{session, Session},
        infra::database::memory::Stats,
        Command as _,
    };

    use super::{AuthenticateSession, ExecutionError};

    async fn sign_in(fx: &Fixture) -> create_session::Output {
        let transport = fx.transport();
        fx.request(&transport)
            .execute(CreateSession {
                user_id: "u".into(),
                ip_address: None,
                user_agent: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn renews_only_near_expiration() {
        let fx = Fixture::new();
        let created = sign_in(&fx).await;
        let transport = fx.transport();
        transport.present(created.access_token.as_ref());
        let before = fx.db.stats();

        let session = fx
            .request(&transport)
            .execute(AuthenticateSession)
            .await
            .unwrap();

        assert_eq!(session, created.session);
        assert_eq!(
            fx.db.stats(),
            Stats {
                reads: before.reads + 1,
                ..before
            },
        );
        assert_eq!(transport.deliveries(), 0);

        fx.clock.advance(Duration::from_secs(61));
        let session = fx
            .request(&transport)
            .execute(AuthenticateSession)
            .await
            .unwrap();

        assert_eq!(session.id, created.session.id);
        assert_eq!(session.user_id, created.session.user_id);
        assert_eq!(
            session.expires_at,
            (fx.clock.now() + Fixture::TTL).coerce(),
        );
        assert!(session.expires_at > created.session.expires_at);
        assert_eq!(
            fx.db.stats(),
            Stats {
                reads: before.reads + 2,
                updates: before.updates + 1,
                ..before
            },
        );
        assert_eq!(fx.db.sessions().await, vec![session]);
        assert_eq!(transport.deliveries(), 1);
    }

    #[tokio::test]
    async fn renewed_token_keeps_working() {
        let fx = Fixture::new();
        let created = sign_in(&fx).await;
        let transport = fx.transport();
        transport.present(created.access_token.as_ref());

        fx.clock.advance(Duration::from_secs(90));
        drop(
            fx.request(&transport)
                .execute(AuthenticateSession)
                .await
                .unwrap(),
        );
        fx.clock.advance(Duration::from_secs(90));

        let session = fx
            .request(&transport)
            .execute(AuthenticateSession)
            .await
            .unwrap();

        assert_eq!(session.id, created.session.id);
    }

    #[tokio::test]
    async fn reads_storage_once_per_request() {
        let fx = Fixture::new();
        let created = sign_in(&fx).await;
        let transport = fx.transport();
        transport.present(created.access_token.as_ref());
        let reads = fx.db.stats().reads;

        let request = fx.request(&transport);
        for _ in 0..3 {
            drop(request.execute(AuthenticateSession).await.unwrap());
        }

        assert_eq!(fx.db.stats().reads, reads + 1);
    }

    #[tokio::test]
    async fn rejects_missing_token() {
        let fx = Fixture::new();
        let transport = fx.transport();

        let err = fx
            .request(&transport)
            .execute(AuthenticateSession)
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::NotAuthenticated));
        assert_eq!(fx.db.stats().reads, 0);
    }

    #[tokio::test]
    async fn rejects_forged_token() {
        let fx = Fixture::new();
        let created = sign_in(&fx).await;
        let transport = fx.transport();
        let mut forged = created.access_token.to_string().into_bytes();
        let middle = forged.len() / 2;
        forged[middle] = if forged[middle] == b'A' { b'B' } else { b'A' };
        transport.present(String::from_utf8(forged).unwrap());

        assert!(fx
            .request(&transport)
            .execute(AuthenticateSession)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn rejects_deleted_session() {
        let fx = Fixture::new();
        let created = sign_in(&fx).await;
        fx.db
            .execute(Delete(By::<Session, _>::new(created.session.id)))
            .await
            .unwrap();
        let transport = fx.transport();
        transport.present(created.access_token.as_ref());

        assert!(fx
            .request(&transport)
            .execute(AuthenticateSession)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn rejects_expired_session_regardless_of_storage() {
        let fx = Fixture::new();
        let now = fx.clock.now();
        let session = Session {
            id: session::Id::from("abc"),
            user_id: "u".into(),
            expires_at: (now + Duration::from_secs(10)).coerce(),
        };
        fx.db.execute(Insert(session.clone())).await.unwrap();
        let transport = fx.transport();
        transport.present(
            fx.service
                .config()
                .codec
                .encode(&session.id, session.expires_at)
                .unwrap()
                .to_string(),
        );
        fx.clock.advance(Duration::from_secs(10));

        for offline in [false, true] {
            fx.db.set_offline(offline);

            assert!(fx
                .request(&transport)
                .execute(AuthenticateSession)
                .await
                .is_err());
        }
    }

    #[tokio::test]
    async fn rejects_lingering_expired_row() {
        let fx = Fixture::new();
        let now = fx.clock.now();
        let session = Session {
            id: session::Id::from("abc"),
            user_id: "u".into(),
            expires_at: (now + Duration::from_secs(10)).coerce(),
        };
        fx.db.execute(Insert(session.clone())).await.unwrap();
        let transport = fx.transport();
        // Token outlives the row, so only the stored expiration is checked.
        transport.present(
            fx.service
                .config()
                .codec
                .encode(&session.id, (now + Fixture::TTL).coerce())
                .unwrap()
                .to_string(),
        );
        fx.clock.advance(Duration::from_secs(10));

        let err = fx
            .request(&transport)
            .execute(AuthenticateSession)
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::NotAuthenticated));
        assert_eq!(fx.db.stats().updates, 0);
    }

    #[tokio::test]
    async fn treats_storage_failure_as_unauthenticated() {
        let fx = Fixture::new();
        let created = sign_in(&fx).await;
        let transport = fx.transport();
        transport.present(created.access_token.as_ref());
        fx.db.set_offline(true);

        let err = fx
            .request(&transport)
            .execute(AuthenticateSession)
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::NotAuthenticated));
    }

    #[tokio::test]
    async fn keeps_original_session_when_renewal_fails() {
        let fx = Fixture::new();
        let created = sign_in(&fx).await;
        let transport = fx.transport();
        transport.present(created.access_token.as_ref());
        fx.clock.advance(Duration::from_secs(61));
        fx.db.set_read_only(true);

        let session = fx
            .request(&transport)
            .execute(AuthenticateSession)
            .await
            .unwrap();

        assert_eq!(session, created.session);
        assert_eq!(transport.deliveries(), 0);
        assert_eq!(fx.db.sessions().await, vec![created.session.clone()]);

        fx.db.set_read_only(false);
        let session = fx
            .request(&transport)
            .execute(AuthenticateSession)
            .await
            .unwrap();

        assert!(session.expires_at > created.session.expires_at);
        assert_eq!(transport.deliveries(), 1);
    }
}
