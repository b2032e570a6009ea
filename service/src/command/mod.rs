//! [`Command`] definition.

pub mod authenticate_session;
pub mod create_session;
pub mod invalidate_current_session;
pub mod invalidate_user_sessions;
pub mod log_in;
pub mod refresh_session;

/// [`Command`] of the [`Service`] and [`SessionService`].
///
/// [`Service`]: crate::Service
/// [`SessionService`]: crate::SessionService
pub use common::Handler as Command;

pub use self::{
    authenticate_session::AuthenticateSession, create_session::CreateSession,
    invalidate_current_session::InvalidateCurrentSession,
    invalidate_user_sessions::InvalidateUserSessions, log_in::LogIn,
    refresh_session::RefreshSession,
};
