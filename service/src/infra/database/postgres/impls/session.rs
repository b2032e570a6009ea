//! [`Session`]-related [`Database`] implementations.

use common::operations::{By, Delete, Insert, Select, Update};
use tracerr::Traced;

use crate::{
    domain::{session, user, Session},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Insert<Session>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(session): Insert<Session>,
    ) -> Result<Self::Ok, Self::Err> {
        let Session {
            id,
            user_id,
            expires_at,
        } = session;

        const SQL: &str = "\
            INSERT INTO auth_sessions (id, user_id, expires_at) \
            VALUES ($1::VARCHAR, $2::VARCHAR, $3::TIMESTAMPTZ)";
        self.exec(SQL, &[&id, &user_id, &expires_at])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Select<By<Option<Session>, session::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Session>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Session>, session::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            SELECT id, user_id, expires_at \
            FROM auth_sessions \
            WHERE id = $1::VARCHAR";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| Session {
                id: row.get("id"),
                user_id: row.get("user_id"),
                expires_at: row.get("expires_at"),
            }))
    }
}

impl<C> Database<Update<Session>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(session): Update<Session>,
    ) -> Result<Self::Ok, Self::Err> {
        // Only the expiration of a `Session` is mutable.
        const SQL: &str = "\
            UPDATE auth_sessions \
            SET expires_at = $2::TIMESTAMPTZ \
            WHERE id = $1::VARCHAR";
        self.exec(SQL, &[&session.id, &session.expires_at])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Delete<By<Session, session::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Session, session::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            DELETE FROM auth_sessions \
            WHERE id = $1::VARCHAR";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Delete<By<Session, user::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Session, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let user_id = by.into_inner();

        const SQL: &str = "\
            DELETE FROM auth_sessions \
            WHERE user_id = $1::VARCHAR";
        self.exec(SQL, &[&user_id])
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Delete<By<Session, session::ExpirationDateTime>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Session, session::ExpirationDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        let now = by.into_inner();

        const SQL: &str = "\
            DELETE FROM auth_sessions \
            WHERE expires_at <= $1::TIMESTAMPTZ";
        self.exec(SQL, &[&now])
            .await
            .map_err(tracerr::wrap!())
    }
}
