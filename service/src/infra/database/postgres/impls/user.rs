//! [`Account`]-related [`Database`] implementations.

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    domain::{user, Account},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Select<By<Option<Account>, user::Login>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Account>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Account>, user::Login>>,
    ) -> Result<Self::Ok, Self::Err> {
        let login = by.into_inner();

        const SQL: &str = "\
            SELECT id, login, password_hash, is_active \
            FROM users \
            WHERE login = $1::VARCHAR \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&login])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| Account {
                id: row.get("id"),
                login: row.get("login"),
                password_hash: row.get("password_hash"),
                is_active: row.get("is_active"),
            }))
    }
}
