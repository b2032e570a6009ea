//! [`Config`]-related definitions.

use std::{sync::Arc, time};

use axum_extra::extract::cookie;
use common::{clock, Clock};
use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use derive_more::{Display, Error, From};
use secrecy::SecretString;
use serde::Deserialize;
use service::{
    domain::session::{self, timer, token},
    infra::password,
};
use smart_default::SmartDefault;

use crate::transport;

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: Server,

    /// Session configuration.
    pub session: Session,

    /// Postgres configuration.
    pub postgres: Postgres,

    /// Log configuration.
    pub log: Log,
}

impl Config {
    /// Creates a new [`Config`] by:
    /// - loading it from the provided `path` (if any);
    /// - merging it with the environment variables (if any);
    /// - using default values for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("CONF").separator("."))
            .build()?
            .try_deserialize()
    }
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Server {
    /// Host to bind the server to.
    #[default("0.0.0.0".to_owned())]
    pub host: String,

    /// Port to bind the server to.
    #[default(8080)]
    pub port: u16,

    /// [CORS] configuration.
    ///
    /// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
    pub cors: Cors,
}

/// [CORS] configuration.
///
/// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Cors {
    /// List of allowed origins.
    #[default(vec!["*".to_owned()])]
    pub origins: Vec<String>,
}

/// Session configuration.
#[derive(Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Session {
    /// Lifetime of a session, at least one minute.
    #[default(time::Duration::from_secs(15 * 60))]
    #[serde(with = "humantime_serde")]
    pub ttl: time::Duration,

    /// Fraction of [`Session::ttl`] left, below which a session is renewed.
    #[default(0.5)]
    pub refresh_fraction: f64,

    /// Lifetime of a refresh token.
    #[default(time::Duration::from_secs(30 * 24 * 60 * 60))]
    #[serde(with = "humantime_serde")]
    pub refresh_token_ttl: time::Duration,

    /// [JWT] configuration.
    ///
    /// [JWT]: https://wikipedia.org/wiki/JSON_Web_Token
    pub jwt: Jwt,

    /// Access token transport configuration.
    pub transport: Transport,

    /// Session tasks configuration.
    pub tasks: Tasks,
}

impl TryFrom<Session> for service::Config {
    type Error = SessionError;

    fn try_from(value: Session) -> Result<Self, Self::Error> {
        let Session {
            ttl,
            refresh_fraction,
            refresh_token_ttl,
            jwt,
            transport: _,
            tasks: Tasks {
                clean_expired_sessions,
            },
        } = value;

        let clock: Arc<dyn Clock> = Arc::new(clock::System);
        let timer =
            session::Timer::new(ttl, refresh_fraction, Arc::clone(&clock))?;
        let algorithm = jwt.algorithm;
        let key = token::Key::try_from(jwt)?;
        let codec = session::Codec::new(algorithm, &key, clock)?;

        Ok(Self {
            timer,
            codec,
            refresh_token_ttl,
            password_hasher: Arc::new(password::Argon2),
            clean_expired_sessions:
                service::task::clean_expired_sessions::Config {
                    interval: clean_expired_sessions.interval,
                },
        })
    }
}

/// Error of turning a [`Session`] configuration into a [`service::Config`].
#[derive(Debug, Display, Error, From)]
pub enum SessionError {
    /// Invalid [`Session::ttl`] or [`Session::refresh_fraction`].
    #[display("invalid session lifetime: {_0}")]
    Policy(timer::PolicyError),

    /// Invalid [`Jwt`] key material.
    #[display("invalid JWT key: {_0}")]
    Key(token::KeyError),

    /// Key required by the [`Jwt::algorithm`] is missing.
    #[display("`session.jwt.{field}` is required for `{algorithm}` algorithm")]
    #[from(ignore)]
    MissingKey {
        /// Name of the missing field.
        field: &'static str,

        /// [`token::Algorithm`] requiring the field.
        algorithm: token::Algorithm,
    },

    /// Cookie with `SameSite=None` is not `Secure`, so browsers reject it.
    #[display(
        "`session.transport.cookie.same_site = \"none\"` requires \
         `session.transport.cookie.secure = true`"
    )]
    #[from(ignore)]
    InsecureCrossSiteCookie,
}

/// [JWT] configuration.
///
/// [JWT]: https://wikipedia.org/wiki/JSON_Web_Token
#[derive(Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Jwt {
    /// [`token::Algorithm`] to sign access tokens with.
    #[default(token::Algorithm::Hs256)]
    pub algorithm: token::Algorithm,

    /// Secret of `HS*` algorithms.
    pub secret: Option<SecretString>,

    /// PEM-encoded RSA private key of `RS*` algorithms.
    pub private_key: Option<SecretString>,

    /// PEM-encoded RSA public key of `RS*` algorithms.
    pub public_key: Option<String>,
}

impl TryFrom<Jwt> for token::Key {
    type Error = SessionError;

    fn try_from(value: Jwt) -> Result<Self, Self::Error> {
        let Jwt {
            algorithm,
            secret,
            private_key,
            public_key,
        } = value;
        let missing = |field| SessionError::MissingKey { field, algorithm };

        if algorithm.is_symmetric() {
            Ok(Self::Secret(secret.ok_or_else(|| missing("secret"))?))
        } else {
            Ok(Self::Rsa {
                private_pem: private_key
                    .ok_or_else(|| missing("private_key"))?,
                public_pem: public_key.ok_or_else(|| missing("public_key"))?,
            })
        }
    }
}

/// Access token transport configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Transport {
    /// Kind of the transport.
    pub kind: TransportKind,

    /// Cookie transport configuration.
    pub cookie: Cookie,
}

impl TryFrom<Transport> for transport::Factory {
    type Error = SessionError;

    fn try_from(value: Transport) -> Result<Self, Self::Error> {
        let Transport { kind, cookie } = value;
        match kind {
            TransportKind::Cookie => {
                if matches!(cookie.same_site, SameSite::None) && !cookie.secure
                {
                    return Err(SessionError::InsecureCrossSiteCookie);
                }
                Ok(Self::Cookie(transport::cookie::Settings {
                    name: cookie.name,
                    secure: cookie.secure,
                    same_site: cookie.same_site.into(),
                }))
            }
            TransportKind::Header => Ok(Self::Header),
        }
    }
}

/// Kind of the access token transport.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Token travels in an `HttpOnly` cookie.
    Cookie,

    /// Token travels in the `Authorization: Bearer` header.
    #[default]
    Header,
}

/// Cookie transport configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Cookie {
    /// Name of the cookie.
    #[default("access_token".to_owned())]
    pub name: String,

    /// Indicator whether the cookie is sent over HTTPS only.
    #[default(true)]
    pub secure: bool,

    /// `SameSite` policy of the cookie.
    pub same_site: SameSite,
}

/// `SameSite` policy of a cookie.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    /// Cookie is sent with same-site requests only.
    Strict,

    /// Cookie is also sent with top-level cross-site navigations.
    #[default]
    Lax,

    /// Cookie is sent with all requests.
    None,
}

impl From<SameSite> for cookie::SameSite {
    fn from(value: SameSite) -> Self {
        match value {
            SameSite::Strict => Self::Strict,
            SameSite::Lax => Self::Lax,
            SameSite::None => Self::None,
        }
    }
}

/// Session tasks configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Tasks {
    /// `CleanExpiredSessions` task configuration.
    pub clean_expired_sessions: Task,
}

/// Session task configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Task {
    /// Task execution interval.
    #[default(time::Duration::from_secs(60 * 60))]
    #[serde(with = "humantime_serde")]
    pub interval: time::Duration,
}

/// Postgres configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Postgres {
    /// Host to connect to.
    #[default("127.0.0.1".to_owned())]
    pub host: String,

    /// Port to connect to.
    #[default(5432)]
    pub port: u16,

    /// User to connect as.
    #[default("postgres".to_owned())]
    pub user: String,

    /// Password to connect with.
    #[default("postgres".to_owned())]
    pub password: String,

    /// Database name to connect to.
    #[default("postgres".to_owned())]
    pub dbname: String,
}

impl From<Postgres> for service::infra::postgres::Config {
    fn from(value: Postgres) -> Self {
        let Postgres {
            host,
            port,
            user,
            password,
            dbname,
        } = value;

        Self {
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            dbname: Some(dbname),
            ..Self::default()
        }
    }
}

/// Log configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,

    /// Designates lower priority information.
    Debug,

    /// Designates useful information.
    #[default]
    Info,

    /// Designates hazardous situations.
    Warn,

    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use secrecy::SecretString;
    use service::domain::session::token;

    use crate::transport;

    use super::{
        Cookie, Jwt, SameSite, Session, SessionError, Transport, TransportKind,
    };

    fn session() -> Session {
        Session {
            jwt: Jwt {
                secret: Some(SecretString::from("secret")),
                ..Jwt::default()
            },
            ..Session::default()
        }
    }

    #[test]
    fn builds_service_config_from_defaults() {
        let config = service::Config::try_from(session()).unwrap();

        assert_eq!(config.timer.ttl(), Duration::from_secs(15 * 60));
        assert_eq!(
            config.timer.refresh_trigger_interval(),
            Duration::from_secs(450),
        );
        assert_eq!(
            config.refresh_token_ttl,
            Duration::from_secs(30 * 24 * 60 * 60),
        );
    }

    #[test]
    fn rejects_invalid_lifetime() {
        for (ttl, fraction) in [(59, 0.5), (600, 0.0), (600, 1.0)] {
            let err = service::Config::try_from(Session {
                ttl: Duration::from_secs(ttl),
                refresh_fraction: fraction,
                ..session()
            })
            .unwrap_err();

            assert!(matches!(err, SessionError::Policy(_)));
        }
    }

    #[test]
    fn requires_key_of_algorithm() {
        let err = service::Config::try_from(Session::default()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::MissingKey {
                field: "secret",
                ..
            },
        ));

        let err = service::Config::try_from(Session {
            jwt: Jwt {
                algorithm: token::Algorithm::Rs256,
                secret: Some(SecretString::from("secret")),
                ..Jwt::default()
            },
            ..Session::default()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            SessionError::MissingKey {
                field: "private_key",
                ..
            },
        ));
    }

    #[test]
    fn selects_transport_kind() {
        let factory = transport::Factory::try_from(Transport::default()).unwrap();
        assert!(matches!(factory, transport::Factory::Header));

        let factory = transport::Factory::try_from(Transport {
            kind: TransportKind::Cookie,
            ..Transport::default()
        })
        .unwrap();
        let transport::Factory::Cookie(settings) = factory else {
            panic!("expected cookie transport");
        };
        assert_eq!(settings.name, "access_token");
        assert!(settings.secure);
    }

    #[test]
    fn rejects_insecure_cross_site_cookie() {
        let cookie = Cookie {
            secure: false,
            same_site: SameSite::None,
            ..Cookie::default()
        };

        let err = transport::Factory::try_from(Transport {
            kind: TransportKind::Cookie,
            cookie: cookie.clone(),
        })
        .unwrap_err();
        assert!(matches!(err, SessionError::InsecureCrossSiteCookie));

        let factory = transport::Factory::try_from(Transport {
            kind: TransportKind::Header,
            cookie,
        })
        .unwrap();
        assert!(matches!(factory, transport::Factory::Header));
    }
}
