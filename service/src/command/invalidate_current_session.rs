//! [`Command`] for invalidating the current [`Session`].

use std::convert::Infallible;

use common::operations::{By, Commit, Delete, Transact, Transacted};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{session, Device, Session},
    infra::{database, Database},
    SessionService, Transport,
};

use super::Command;

/// [`Command`] for signing the client out of its current [`Session`].
///
/// The client forgets its token even if the [`Session`] cannot be deleted.
/// Invalidating nothing is not an error.
#[derive(Clone, Copy, Debug)]
pub struct InvalidateCurrentSession;

impl<Db, T> Command<InvalidateCurrentSession> for SessionService<Db, T>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Delete<By<Session, session::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<Device, session::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Commit, Ok = (), Err = Traced<database::Error>>,
    T: Transport,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        _: InvalidateCurrentSession,
    ) -> Result<Self::Ok, Self::Err> {
        self.forget();

        let Some(id) = self.transport().extract_id() else {
            log::debug!("no `Session` to invalidate");
            return Ok(());
        };

        self.transport().remove_current();

        if let Err(e) = self.discard(id).await {
            log::warn!("failed to delete invalidated `Session`: {e}");
        }
        Ok(())
    }
}

impl<Db, T> SessionService<Db, T>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Delete<By<Session, session::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<Device, session::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Commit, Ok = (), Err = Traced<database::Error>>,
{
    /// Deletes the [`Session`] with the provided ID and its [`Device`].
    async fn discard(
        &self,
        id: session::Id,
    ) -> Result<(), Traced<database::Error>> {
        let tx = self
            .service()
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::wrap!())?;
        tx.execute(Delete(By::<Session, _>::new(id.clone())))
            .await
            .map_err(tracerr::wrap!())?;
        tx.execute(Delete(By::<Device, _>::new(id)))
            .await
            .map_err(tracerr::wrap!())?;
        tx.execute(Commit).await.map_err(tracerr::wrap!())
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        auth::fixture::{Fixture, Recording},
        command::{AuthenticateSession, CreateSession},
        Command as _,
    };

    use super::InvalidateCurrentSession;

    async fn signed_in(fx: &Fixture) -> Recording {
        let transport = fx.transport();
        drop(
            fx.request(&transport)
                .execute(CreateSession {
                    user_id: "u".into(),
                    ip_address: None,
                    user_agent: None,
                })
                .await
                .unwrap(),
        );
        transport
    }

    #[tokio::test]
    async fn deletes_session_and_device() {
        let fx = Fixture::new();
        let transport = signed_in(&fx).await;

        fx.request(&transport)
            .execute(InvalidateCurrentSession)
            .await
            .unwrap();

        assert_eq!(transport.removals(), 1);
        assert!(transport.presented().is_none());
        assert!(fx.db.sessions().await.is_empty());
        assert!(fx.db.devices().await.is_empty());
    }

    #[tokio::test]
    async fn is_idempotent() {
        let fx = Fixture::new();
        let transport = signed_in(&fx).await;

        let request = fx.request(&transport);
        request.execute(InvalidateCurrentSession).await.unwrap();
        request.execute(InvalidateCurrentSession).await.unwrap();

        assert_eq!(transport.removals(), 1);
        assert!(request.execute(AuthenticateSession).await.is_err());
    }

    #[tokio::test]
    async fn does_not_touch_storage_without_token() {
        let fx = Fixture::new();
        let transport = fx.transport();
        let before = fx.db.stats();

        fx.request(&transport)
            .execute(InvalidateCurrentSession)
            .await
            .unwrap();

        assert_eq!(fx.db.stats(), before);
        assert_eq!(transport.removals(), 0);
    }

    #[tokio::test]
    async fn signs_client_out_while_storage_is_down() {
        let fx = Fixture::new();
        let transport = signed_in(&fx).await;
        fx.db.set_offline(true);

        fx.request(&transport)
            .execute(InvalidateCurrentSession)
            .await
            .unwrap();

        assert_eq!(transport.removals(), 1);
        assert!(transport.presented().is_none());

        fx.db.set_offline(false);
        assert_eq!(fx.db.sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn forgets_session_resolved_in_same_request() {
        let fx = Fixture::new();
        let transport = signed_in(&fx).await;
        let request = fx.request(&transport);
        drop(request.execute(AuthenticateSession).await.unwrap());

        request.execute(InvalidateCurrentSession).await.unwrap();

        assert!(request.execute(AuthenticateSession).await.is_err());
    }
}
