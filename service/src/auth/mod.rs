//! Per-request authentication.

#[cfg(test)]
pub(crate) mod fixture;

use std::{
    fmt,
    future::Future,
    sync::{Mutex, PoisonError},
};

use tracerr::Traced;

use crate::{
    command::{
        authenticate_session, AuthenticateSession, Command,
        InvalidateUserSessions,
    },
    domain::{
        session::{self, token},
        user, Session,
    },
    infra::database,
    Service,
};

/// Medium moving access [`session::Token`]s between a client and the
/// [`Service`].
///
/// Bound to a single request.
pub trait Transport: fmt::Debug {
    /// Encodes a [`session::Token`] for the provided [`Session`] and hands it
    /// to the client.
    ///
    /// # Errors
    ///
    /// If the [`session::Token`] cannot be signed.
    fn deliver(
        &self,
        session: &Session,
    ) -> Result<session::Token, token::EncodeError>;

    /// Extracts the ID of the [`Session`] the client presents, if any valid.
    fn extract_id(&self) -> Option<session::Id>;

    /// Makes the client forget its current [`session::Token`].
    fn remove_current(&self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn deliver(
        &self,
        session: &Session,
    ) -> Result<session::Token, token::EncodeError> {
        (**self).deliver(session)
    }

    fn extract_id(&self) -> Option<session::Id> {
        (**self).extract_id()
    }

    fn remove_current(&self) {
        (**self).remove_current();
    }
}

/// [`Service`] bound to a single request and its [`Transport`].
///
/// Remembers the [`Session`] resolved during the request, so it's read from
/// the [`Database`] at most once.
///
/// [`Database`]: crate::infra::Database
#[derive(Debug)]
pub struct SessionService<Db, T> {
    /// [`Service`] this [`SessionService`] runs on.
    service: Service<Db>,

    /// [`Transport`] of the request.
    transport: T,

    /// [`Session`] resolved during the request.
    current: Mutex<Option<Session>>,
}

impl<Db, T> SessionService<Db, T> {
    /// Creates a new [`SessionService`] for a single request.
    #[must_use]
    pub fn new(service: Service<Db>, transport: T) -> Self {
        Self {
            service,
            transport,
            current: Mutex::new(None),
        }
    }

    /// Returns the [`Service`] of this [`SessionService`].
    #[must_use]
    pub fn service(&self) -> &Service<Db> {
        &self.service
    }

    /// Returns the [`Transport`] of this [`SessionService`].
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the [`Session`] resolved during the request, if any.
    pub(crate) fn remembered(&self) -> Option<Session> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remembers the provided [`Session`] as the current one.
    pub(crate) fn remember(&self, session: Session) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(session);
    }

    /// Forgets the current [`Session`].
    pub(crate) fn forget(&self) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Source of the authenticated user of the current request.
pub trait IdentityProvider {
    /// Returns the ID of the user the current request is authenticated as.
    ///
    /// # Errors
    ///
    /// If the request is not authenticated.
    fn current_user_id(
        &self,
    ) -> impl Future<
        Output = Result<user::Id, Traced<authenticate_session::ExecutionError>>,
    >;
}

impl<Db, T> IdentityProvider for SessionService<Db, T>
where
    Self: Command<
        AuthenticateSession,
        Ok = Session,
        Err = Traced<authenticate_session::ExecutionError>,
    >,
{
    async fn current_user_id(
        &self,
    ) -> Result<user::Id, Traced<authenticate_session::ExecutionError>> {
        self.execute(AuthenticateSession)
            .await
            .map(|s| s.user_id)
            .map_err(tracerr::wrap!())
    }
}

/// Revoker of every access a user holds.
pub trait AccessRevoker {
    /// Revokes all [`Session`]s and refresh tokens of the provided user,
    /// returning the number of revoked [`Session`]s.
    ///
    /// # Errors
    ///
    /// If the revocation cannot be persisted. Nothing should be reported as
    /// revoked in such case.
    fn remove_all_user_access(
        &self,
        user_id: user::Id,
    ) -> impl Future<Output = Result<u64, Traced<database::Error>>>;
}

impl<Db> AccessRevoker for Service<Db>
where
    Self: Command<
        InvalidateUserSessions,
        Ok = u64,
        Err = Traced<database::Error>,
    >,
{
    async fn remove_all_user_access(
        &self,
        user_id: user::Id,
    ) -> Result<u64, Traced<database::Error>> {
        self.execute(InvalidateUserSessions { user_id })
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<Db, T> AccessRevoker for SessionService<Db, T>
where
    Service<Db>: AccessRevoker,
{
    async fn remove_all_user_access(
        &self,
        user_id: user::Id,
    ) -> Result<u64, Traced<database::Error>> {
        let revoked = self
            .service
            .remove_all_user_access(user_id)
            .await
            .map_err(tracerr::wrap!())?;
        self.forget();
        Ok(revoked)
    }
}
