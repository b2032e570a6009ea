//! [`Device`]-related [`Database`] implementations.

use common::operations::{By, Delete, Insert, Select, Update};
use tracerr::Traced;

use crate::{
    domain::{device, session, user, Device},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Insert<Device>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Device>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(device): Insert<Device>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(device)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Select<By<Option<Device>, session::refresh::TokenHash>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Device>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Device>, session::refresh::TokenHash>>,
    ) -> Result<Self::Ok, Self::Err> {
        let hash = by.into_inner();

        const SQL: &str = "\
            SELECT id, user_id, session_id, \
                   refresh_token_hash, \
                   ip_address, user_agent, \
                   created_at, last_activity_at, expires_at \
            FROM session_devices \
            WHERE refresh_token_hash = $1::BYTEA \
            FOR UPDATE";
        Ok(self
            .query_opt(SQL, &[&hash])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| Device {
                id: row.get("id"),
                user_id: row.get("user_id"),
                session_id: row.get("session_id"),
                refresh_token_hash: row.get("refresh_token_hash"),
                ip_address: row.get("ip_address"),
                user_agent: row.get("user_agent"),
                created_at: row.get("created_at"),
                last_activity_at: row.get("last_activity_at"),
                expires_at: row.get("expires_at"),
            }))
    }
}

impl<C> Database<Update<Device>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(device): Update<Device>,
    ) -> Result<Self::Ok, Self::Err> {
        let Device {
            id,
            user_id,
            session_id,
            refresh_token_hash,
            ip_address,
            user_agent,
            created_at,
            last_activity_at,
            expires_at,
        } = device;

        const SQL: &str = "\
            INSERT INTO session_devices (\
                id, user_id, session_id, \
                refresh_token_hash, \
                ip_address, user_agent, \
                created_at, last_activity_at, expires_at\
            ) \
            VALUES (\
                $1::UUID, $2::VARCHAR, $3::VARCHAR, \
                $4::BYTEA, \
                $5::VARCHAR, $6::VARCHAR, \
                $7::TIMESTAMPTZ, $8::TIMESTAMPTZ, $9::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET session_id = EXCLUDED.session_id, \
                refresh_token_hash = EXCLUDED.refresh_token_hash, \
                ip_address = EXCLUDED.ip_address, \
                user_agent = EXCLUDED.user_agent, \
                last_activity_at = EXCLUDED.last_activity_at";
        self.exec(
            SQL,
            &[
                &id,
                &user_id,
                &session_id,
                &refresh_token_hash,
                &ip_address,
                &user_agent,
                &created_at,
                &last_activity_at,
                &expires_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Delete<By<Device, session::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Device, session::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let session_id = by.into_inner();

        const SQL: &str = "\
            DELETE FROM session_devices \
            WHERE session_id = $1::VARCHAR";
        self.exec(SQL, &[&session_id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Delete<By<Device, user::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Device, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let user_id = by.into_inner();

        const SQL: &str = "\
            DELETE FROM session_devices \
            WHERE user_id = $1::VARCHAR";
        self.exec(SQL, &[&user_id])
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Delete<By<Device, device::ExpirationDateTime>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Device, device::ExpirationDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        let now = by.into_inner();

        const SQL: &str = "\
            DELETE FROM session_devices \
            WHERE expires_at <= $1::TIMESTAMPTZ";
        self.exec(SQL, &[&now])
            .await
            .map_err(tracerr::wrap!())
    }
}
