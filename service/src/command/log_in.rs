//! [`Command`] for signing a user in by credentials.

use std::sync::Arc;

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret as _, SecretBox};
use tokio::task;
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::user::{Login, Password};
use crate::{
    domain::{session::token, user, Account, Session},
    infra::{database, Database},
    SessionService,
};

use super::{
    authenticate_session, create_session, AuthenticateSession, Command,
    CreateSession,
};

/// [`Command`] for creating a new [`Session`] by [`Account`] credentials.
///
/// Fails if the client is already authenticated.
#[derive(Debug)]
pub struct LogIn {
    /// [`Login`] of the [`Account`].
    pub login: user::Login,

    /// [`Password`] of the [`Account`].
    pub password: SecretBox<user::Password>,

    /// IP address of the client.
    pub ip_address: Option<String>,

    /// `User-Agent` of the client.
    pub user_agent: Option<String>,
}

impl<Db, T> Command<LogIn> for SessionService<Db, T>
where
    Db: Database<
        Select<By<Option<Account>, user::Login>>,
        Ok = Option<Account>,
        Err = Traced<database::Error>,
    >,
    Self: Command<
            AuthenticateSession,
            Ok = Session,
            Err = Traced<authenticate_session::ExecutionError>,
        > + Command<
            CreateSession,
            Ok = create_session::Output,
            Err = Traced<create_session::ExecutionError>,
        >,
{
    type Ok = create_session::Output;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: LogIn) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let LogIn {
            login,
            password,
            ip_address,
            user_agent,
        } = cmd;

        if self.execute(AuthenticateSession).await.is_ok() {
            return Err(tracerr::new!(E::AlreadyAuthenticated));
        }

        let account = self
            .service()
            .database()
            .execute(Select(By::<Option<Account>, _>::new(login.clone())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let hasher = Arc::clone(&self.service().config().password_hasher);
        let hash = account.as_ref().map(|a| a.password_hash.clone());
        let verified = task::spawn_blocking(move || {
            let password = password.expose_secret();
            if let Some(hash) = &hash {
                hasher.verify(password, hash)
            } else {
                hasher.verify_absent(password);
                false
            }
        })
        .await
        .unwrap_or_else(|e| {
            log::error!("password verification failed: {e}");
            false
        });

        let Some(account) = account.filter(|_| verified) else {
            log::debug!("wrong credentials provided for `{login}` login");
            return Err(tracerr::new!(E::WrongCredentials));
        };
        if !account.is_active {
            return Err(tracerr::new!(E::AccountInactive));
        }

        self.execute(CreateSession {
            user_id: account.id,
            ip_address,
            user_agent,
        })
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
    }
}

/// Error of [`LogIn`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] is unable to serve the request, so it's worth retrying
    /// later.
    #[display("Authentication is temporarily unavailable: {_0}")]
    Unavailable(database::Error),

    /// Access [`token::Token`] cannot be signed.
    TokenEncode(token::EncodeError),

    /// [`LogIn`] contains wrong credentials.
    #[display("Wrong credentials")]
    #[from(ignore)]
    WrongCredentials,

    /// [`Account`] is not allowed to sign in.
    #[display("`Account` is inactive")]
    #[from(ignore)]
    AccountInactive,

    /// Client already presents a valid [`Session`].
    #[display("Already authenticated")]
    #[from(ignore)]
    AlreadyAuthenticated,
}

impl From<create_session::ExecutionError> for ExecutionError {
    fn from(err: create_session::ExecutionError) -> Self {
        use create_session::ExecutionError as E;

        match err {
            E::Unavailable(e) => Self::Unavailable(e),
            E::TokenEncode(e) => Self::TokenEncode(e),
        }
    }
}

#[cfg(test)]
mod spec {
    use secrecy::SecretBox;

    use crate::{
        auth::fixture::Fixture,
        command::AuthenticateSession,
        domain::{user, Account},
        infra::PasswordHasher as _,
        Command as _,
    };

    use super::{ExecutionError, LogIn};

    async fn register(fx: &Fixture, login: &str, is_active: bool) {
        let password_hash = fx
            .service
            .config()
            .password_hasher
            .hash(&user::Password::from("qwerty"))
            .unwrap();
        fx.db
            .insert_account(Account {
                id: format!("id-{login}").into(),
                login: user::Login::new(login).unwrap(),
                password_hash,
                is_active,
            })
            .await;
    }

    fn log_in(login: &str, password: &str) -> LogIn {
        LogIn {
            login: user::Login::new(login).unwrap(),
            password: SecretBox::new(Box::new(password.into())),
            ip_address: Some("10.0.0.1".into()),
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn signs_in_with_valid_credentials() {
        let fx = Fixture::new();
        register(&fx, "alice", true).await;
        let transport = fx.transport();

        let out = fx
            .request(&transport)
            .execute(log_in("alice", "qwerty"))
            .await
            .unwrap();

        assert_eq!(out.session.user_id, "id-alice".into());
        assert_eq!(transport.deliveries(), 1);
        let session = fx
            .request(&transport)
            .execute(AuthenticateSession)
            .await
            .unwrap();
        assert_eq!(session, out.session);
    }

    #[tokio::test]
    async fn rejects_wrong_credentials() {
        let fx = Fixture::new();
        register(&fx, "alice", true).await;
        let transport = fx.transport();

        for (login, password) in [("alice", "wrong"), ("bob", "qwerty")] {
            let err = fx
                .request(&transport)
                .execute(log_in(login, password))
                .await
                .unwrap_err();

            assert!(matches!(err.as_ref(), ExecutionError::WrongCredentials));
        }
        assert!(fx.db.sessions().await.is_empty());
        assert_eq!(transport.deliveries(), 0);
    }

    #[tokio::test]
    async fn rejects_inactive_account() {
        let fx = Fixture::new();
        register(&fx, "alice", false).await;
        let transport = fx.transport();

        let err = fx
            .request(&transport)
            .execute(log_in("alice", "qwerty"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::AccountInactive));
        assert!(fx.db.sessions().await.is_empty());
    }

    #[tokio::test]
    async fn reports_unavailable_storage() {
        let fx = Fixture::new();
        register(&fx, "alice", true).await;
        fx.db.set_offline(true);
        let transport = fx.transport();

        let err = fx
            .request(&transport)
            .execute(log_in("alice", "qwerty"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Unavailable(_)));
    }

    #[tokio::test]
    async fn rejects_already_authenticated_client() {
        let fx = Fixture::new();
        register(&fx, "alice", true).await;
        let transport = fx.transport();
        let first = fx
            .request(&transport)
            .execute(log_in("alice", "qwerty"))
            .await
            .unwrap();

        let err = fx
            .request(&transport)
            .execute(log_in("alice", "qwerty"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::AlreadyAuthenticated));
        assert_eq!(fx.db.sessions().await, vec![first.session]);
        assert_eq!(transport.deliveries(), 1);
    }

    #[tokio::test]
    async fn signs_in_again_after_session_expires() {
        let fx = Fixture::new();
        register(&fx, "alice", true).await;
        let transport = fx.transport();
        let first = fx
            .request(&transport)
            .execute(log_in("alice", "qwerty"))
            .await
            .unwrap();
        fx.clock.advance(Fixture::TTL);

        let second = fx
            .request(&transport)
            .execute(log_in("alice", "qwerty"))
            .await
            .unwrap();

        assert_ne!(first.session.id, second.session.id);
    }
}
