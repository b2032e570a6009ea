//! [`Command`] for exchanging a [`RefreshToken`] for a new [`Session`].

use common::operations::{
    By, Commit, Delete, Insert, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        session::{self, refresh::TokenHash, token, RefreshToken},
        Device, Session,
    },
    infra::{database, Database},
    SessionService, Transport,
};

use super::{create_session::Output, Command};

/// [`Command`] for replacing the [`Session`] of a [`Device`] with a new one.
///
/// The provided [`RefreshToken`] is rotated, so it cannot be used again.
#[derive(Clone, Debug)]
pub struct RefreshSession {
    /// Current [`RefreshToken`] of the [`Device`].
    pub refresh_token: RefreshToken,

    /// IP address of the client.
    pub ip_address: Option<String>,

    /// `User-Agent` of the client.
    pub user_agent: Option<String>,
}

impl<Db, T> Command<RefreshSession> for SessionService<Db, T>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<Device>, TokenHash>>,
            Ok = Option<Device>,
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<Session, session::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Insert<Session>, Ok = (), Err = Traced<database::Error>>
        + Database<Update<Device>, Ok = (), Err = Traced<database::Error>>
        + Database<Commit, Ok = (), Err = Traced<database::Error>>,
    T: Transport,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RefreshSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RefreshSession {
            refresh_token,
            ip_address,
            user_agent,
        } = cmd;
        let timer = &self.service().config().timer;

        let tx = self
            .service()
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let now = timer.current_time();
        let mut device = tx
            .execute(Select(By::<Option<Device>, _>::new(
                refresh_token.hash(),
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(|d| !d.is_expired_at(now))
            .ok_or(E::InvalidRefreshToken)
            .map_err(tracerr::wrap!())?;

        tx.execute(Delete(By::<Session, _>::new(device.session_id.clone())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let session = Session {
            id: session::Id::generate(),
            user_id: device.user_id.clone(),
            expires_at: timer.session_expiration(),
        };
        tx.execute(Insert(session.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let refresh_token = RefreshToken::generate();
        device.session_id = session.id.clone();
        device.refresh_token_hash = refresh_token.hash();
        device.ip_address = ip_address.or(device.ip_address);
        device.user_agent = user_agent.or(device.user_agent);
        device.last_activity_at = now.coerce();
        tx.execute(Update(device))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let access_token = self
            .transport()
            .deliver(&session)
            .map_err(tracerr::from_and_wrap!(=> E))?;
        log::debug!("refreshed `Session` of `User(id: {})`", session.user_id);

        self.remember(session.clone());
        Ok(Output {
            session,
            access_token,
            refresh_token,
        })
    }
}

/// Error of [`RefreshSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] is unable to serve the request, so it's worth retrying
    /// later.
    #[display("Authentication is temporarily unavailable: {_0}")]
    Unavailable(database::Error),

    /// Access [`session::Token`] cannot be signed.
    TokenEncode(token::EncodeError),

    /// [`RefreshToken`] is unknown, already rotated or expired.
    #[display("Invalid refresh token")]
    #[from(ignore)]
    InvalidRefreshToken,
}
