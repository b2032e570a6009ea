//! [`Context`]-related definitions.

use axum::{async_trait, extract::FromRequestParts};
use axum_client_ip::InsecureClientIp;
use service::{infra::Postgres, SessionService, Transport};

use crate::{
    transport::{Factory, Staging},
    Error, Service,
};

/// Request-bound [`SessionService`].
pub type Session =
    SessionService<Postgres, Box<dyn Transport + Send + Sync>>;

/// Application context of a single HTTP request.
#[derive(Debug)]
pub struct Context {
    /// [`SessionService`] bound to the current request.
    session: Session,

    /// Client performing the current request.
    client: Client,
}

impl Context {
    /// Returns the [`SessionService`] bound to the current request.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the [`Client`] performing the current request.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Client performing an HTTP request.
#[derive(Clone, Debug, Default)]
pub struct Client {
    /// IP address of the client.
    pub ip_address: Option<String>,

    /// `User-Agent` of the client.
    pub user_agent: Option<String>,
}

impl Client {
    /// Recognizes the [`Client`] of the request with the provided `parts`.
    fn from_parts(parts: &http::request::Parts) -> Self {
        Self {
            ip_address: InsecureClientIp::from(
                &parts.headers,
                &parts.extensions,
            )
            .map(|ip| ip.0.to_string())
            .ok(),
            user_agent: parts
                .headers
                .get(http::header::USER_AGENT)
                .and_then(|h| h.to_str().ok())
                .map(ToOwned::to_owned),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        let service = parts
            .extensions
            .get::<Service>()
            .cloned()
            .ok_or_else(|| Error::internal(&"missing `Service` extension"))?;
        let factory = parts
            .extensions
            .get::<Factory>()
            .cloned()
            .ok_or_else(|| Error::internal(&"missing `Factory` extension"))?;
        let staging = parts
            .extensions
            .get::<Staging>()
            .cloned()
            .ok_or_else(|| Error::internal(&"missing `Staging` extension"))?;

        let transport = factory.transport(
            service.config().codec.clone(),
            &parts.headers,
            staging,
        );

        Ok(Self {
            session: SessionService::new(service, transport),
            client: Client::from_parts(parts),
        })
    }
}

#[cfg(test)]
mod spec {
    use axum::extract::FromRequestParts as _;
    use secrecy::SecretString;

    use crate::{
        config,
        transport::{Factory, Staging},
        Service,
    };

    use super::Context;

    fn service() -> Service {
        let postgres = service::infra::Postgres::new(
            &config::Postgres::default().into(),
        )
        .unwrap();
        let config = service::Config::try_from(config::Session {
            jwt: config::Jwt {
                secret: Some(SecretString::from("secret")),
                ..config::Jwt::default()
            },
            ..config::Session::default()
        })
        .unwrap();
        Service::new(config, postgres).0
    }

    fn parts(
        extensions: impl FnOnce(&mut http::Extensions),
    ) -> http::request::Parts {
        let (mut parts, ()) = http::Request::get("/")
            .header(http::header::USER_AGENT, "curl/8.0")
            .body(())
            .unwrap()
            .into_parts();
        extensions(&mut parts.extensions);
        parts
    }

    #[tokio::test]
    async fn requires_every_extension() {
        for (mut parts, missing) in [
            (parts(|_| {}), "Service"),
            (
                parts(|ext| {
                    _ = ext.insert(service());
                }),
                "Factory",
            ),
            (
                parts(|ext| {
                    _ = ext.insert(service());
                    _ = ext.insert(Factory::Header);
                }),
                "Staging",
            ),
        ] {
            let err = Context::from_request_parts(&mut parts, &())
                .await
                .unwrap_err();

            assert_eq!(
                err.status_code,
                http::StatusCode::INTERNAL_SERVER_ERROR,
            );
            assert_eq!(
                err.message,
                format!("missing `{missing}` extension"),
            );
        }
    }

    #[tokio::test]
    async fn recognizes_client() {
        let mut parts = parts(|ext| {
            _ = ext.insert(service());
            _ = ext.insert(Factory::Header);
            _ = ext.insert(Staging::default());
        });

        let ctx = Context::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(ctx.client().user_agent.as_deref(), Some("curl/8.0"));
        assert_eq!(ctx.client().ip_address, None);
    }
}
