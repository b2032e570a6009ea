//! [`Command`] for invalidating all [`Session`]s of a user.

use common::operations::{By, Commit, Delete, Transact, Transacted};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{user, Device, Session},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for invalidating all [`Session`]s and [`Device`]s of a user,
/// returning the number of invalidated [`Session`]s.
///
/// Fails if the invalidation cannot be persisted.
#[derive(Clone, Debug)]
pub struct InvalidateUserSessions {
    /// ID of the user to invalidate [`Session`]s of.
    pub user_id: user::Id,
}

impl<Db> Command<InvalidateUserSessions> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Delete<By<Session, user::Id>>,
            Ok = u64,
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<Device, user::Id>>,
            Ok = u64,
            Err = Traced<database::Error>,
        > + Database<Commit, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        cmd: InvalidateUserSessions,
    ) -> Result<Self::Ok, Self::Err> {
        let InvalidateUserSessions { user_id } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::wrap!())?;
        let sessions = tx
            .execute(Delete(By::<Session, _>::new(user_id.clone())))
            .await
            .map_err(tracerr::wrap!())?;
        let devices = tx
            .execute(Delete(By::<Device, _>::new(user_id.clone())))
            .await
            .map_err(tracerr::wrap!())?;
        tx.execute(Commit).await.map_err(tracerr::wrap!())?;

        log::info!(
            "invalidated {sessions} sessions and {devices} devices of \
             `User(id: {user_id})`",
        );
        Ok(sessions)
    }
}
