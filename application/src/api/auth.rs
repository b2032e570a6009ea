//! Authentication endpoints.

use axum::{extract::rejection::JsonRejection, Json};
use secrecy::{ExposeSecret as _, SecretBox, SecretString};
use serde::{Deserialize, Serialize};
use service::{
    command::{
        authenticate_session, create_session, log_in, refresh_session,
        InvalidateCurrentSession, LogIn, RefreshSession,
    },
    domain::{session::RefreshToken, user},
    AccessRevoker as _, Command as _, IdentityProvider as _, Transport as _,
};

use crate::{define_error, AsError, Context, Error};

/// Credentials of a [`log_in()`] request.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    /// Login of the account.
    pub login: String,

    /// Password of the account.
    pub password: SecretString,
}

/// Body of a [`refresh()`] request.
#[derive(Debug, Deserialize)]
pub struct Refresh {
    /// Refresh token issued on signing in.
    pub refresh_token: String,
}

/// Newly issued session.
#[derive(Debug, Serialize)]
pub struct Issued {
    /// ID of the session.
    pub session_id: String,

    /// ID of the authenticated user.
    pub user_id: user::Id,

    /// [RFC 3339] moment when the session expires, unless renewed.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub expires_at: String,

    /// Access token authenticating the following requests.
    pub access_token: String,

    /// Refresh token to obtain a new session with.
    pub refresh_token: RefreshToken,

    /// Kind of the access token.
    pub token_type: &'static str,
}

impl From<create_session::Output> for Issued {
    fn from(out: create_session::Output) -> Self {
        let create_session::Output {
            session,
            access_token,
            refresh_token,
        } = out;

        Self {
            session_id: session.id.to_string(),
            user_id: session.user_id,
            expires_at: session.expires_at.to_rfc3339(),
            access_token: access_token.to_string(),
            refresh_token,
            token_type: "bearer",
        }
    }
}

/// Identity of the authenticated user.
#[derive(Debug, Serialize)]
pub struct Me {
    /// ID of the authenticated user.
    pub user_id: user::Id,
}

/// Result of revoking every session of the authenticated user.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Revoked {
    /// Number of revoked sessions.
    pub revoked: u64,
}

/// Signs in with the provided [`Credentials`].
///
/// # Errors
///
/// If the credentials are wrong, or the session cannot be created.
pub async fn log_in(
    ctx: Context,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<Issued>, Error> {
    let Json(Credentials { login, password }) =
        body.map_err(AsError::into_error)?;
    let login = user::Login::new(login)
        .ok_or_else(|| Error::from(AuthError::InvalidLogin))?;
    let password = SecretBox::new(Box::new(user::Password::from(
        password.expose_secret(),
    )));

    ctx.session()
        .execute(LogIn {
            login,
            password,
            ip_address: ctx.client().ip_address.clone(),
            user_agent: ctx.client().user_agent.clone(),
        })
        .await
        .map(|out| Json(out.into()))
        .map_err(AsError::into_error)
}

/// Exchanges a refresh token for a new session.
///
/// # Errors
///
/// If the refresh token is invalid, or the session cannot be created.
pub async fn refresh(
    ctx: Context,
    body: Result<Json<Refresh>, JsonRejection>,
) -> Result<Json<Issued>, Error> {
    let Json(Refresh { refresh_token }) = body.map_err(AsError::into_error)?;

    ctx.session()
        .execute(RefreshSession {
            refresh_token: RefreshToken::from(refresh_token.as_str()),
            ip_address: ctx.client().ip_address.clone(),
            user_agent: ctx.client().user_agent.clone(),
        })
        .await
        .map(|out| Json(out.into()))
        .map_err(AsError::into_error)
}

/// Signs out of the current session, if any.
pub async fn log_out(ctx: Context) -> http::StatusCode {
    ctx.session()
        .execute(InvalidateCurrentSession)
        .await
        .unwrap_or_else(|e| match e {});
    http::StatusCode::NO_CONTENT
}

/// Returns the identity of the authenticated user.
///
/// # Errors
///
/// If the request is not authenticated.
pub async fn me(ctx: Context) -> Result<Json<Me>, Error> {
    let user_id = ctx
        .session()
        .current_user_id()
        .await
        .map_err(AsError::into_error)?;
    Ok(Json(Me { user_id }))
}

/// Revokes every session of the authenticated user.
///
/// # Errors
///
/// If the request is not authenticated, or the sessions cannot be revoked.
pub async fn revoke_all(ctx: Context) -> Result<Json<Revoked>, Error> {
    let user_id = ctx
        .session()
        .current_user_id()
        .await
        .map_err(AsError::into_error)?;
    let revoked = ctx
        .session()
        .remove_all_user_access(user_id)
        .await
        .map_err(AsError::into_error)?;
    ctx.session().transport().remove_current();
    Ok(Json(Revoked { revoked }))
}

impl AsError for authenticate_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::NotAuthenticated => Some(AuthError::NotAuthenticated.into()),
        }
    }
}

impl AsError for log_in::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Unavailable(_) => {
                Some(AuthError::AuthenticationUnavailable.into())
            }
            Self::TokenEncode(_) => None,
            Self::WrongCredentials => Some(AuthError::WrongCredentials.into()),
            Self::AccountInactive => Some(AuthError::AccountInactive.into()),
            Self::AlreadyAuthenticated => {
                Some(AuthError::AlreadyAuthenticated.into())
            }
        }
    }
}

impl AsError for refresh_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Unavailable(_) => {
                Some(AuthError::AuthenticationUnavailable.into())
            }
            Self::TokenEncode(_) => None,
            Self::InvalidRefreshToken => {
                Some(AuthError::InvalidRefreshToken.into())
            }
        }
    }
}

define_error! {
    enum AuthError {
        #[code = "NOT_AUTHENTICATED"]
        #[status = UNAUTHORIZED]
        #[message = "Not authenticated"]
        NotAuthenticated,

        #[code = "AUTHENTICATION_UNAVAILABLE"]
        #[status = SERVICE_UNAVAILABLE]
        #[message = "Authentication is temporarily unavailable"]
        AuthenticationUnavailable,

        #[code = "WRONG_CREDENTIALS"]
        #[status = UNAUTHORIZED]
        #[message = "Wrong credentials"]
        WrongCredentials,

        #[code = "ACCOUNT_INACTIVE"]
        #[status = FORBIDDEN]
        #[message = "Account is inactive"]
        AccountInactive,

        #[code = "INVALID_REFRESH_TOKEN"]
        #[status = UNAUTHORIZED]
        #[message = "Invalid refresh token"]
        InvalidRefreshToken,

        #[code = "ALREADY_AUTHENTICATED"]
        #[status = CONFLICT]
        #[message = "Already authenticated"]
        AlreadyAuthenticated,

        #[code = "INVALID_LOGIN"]
        #[status = BAD_REQUEST]
        #[message = "Invalid login"]
        InvalidLogin,
    }
}
