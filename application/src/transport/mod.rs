//! [`Transport`]s of access tokens over HTTP.

pub mod cookie;
#[cfg(test)]
mod fixture;
pub mod header;

use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use service::{domain::session, Transport};

pub use self::{cookie::Cookie, header::Header};

/// Outcome of a [`Transport`] during a single request.
#[derive(Clone, Debug)]
pub enum Staged {
    /// Access token is delivered to the client.
    Delivered {
        /// Delivered access token.
        token: session::Token,

        /// Expiration of the [`Session`] the token belongs to.
        ///
        /// [`Session`]: service::domain::Session
        expires_at: session::ExpirationDateTime,
    },

    /// Client should forget its access token.
    Removed,
}

/// Slot for the [`Staged`] outcome of a request, applied to its response.
///
/// Clones share the same slot.
#[derive(Clone, Debug, Default)]
pub struct Staging(Arc<Mutex<Option<Staged>>>);

impl Staging {
    /// Stages the provided outcome, replacing the previous one.
    pub fn put(&self, staged: Staged) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(staged);
    }

    /// Takes the staged outcome, if any.
    #[must_use]
    pub fn take(&self) -> Option<Staged> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Factory of request-bound [`Transport`]s, chosen once at startup.
#[derive(Clone, Debug)]
pub enum Factory {
    /// Produces [`Cookie`] transports.
    Cookie(cookie::Settings),

    /// Produces [`Header`] transports.
    Header,
}

impl Factory {
    /// Creates a new [`Transport`] for the request with the provided
    /// `headers`.
    #[must_use]
    pub fn transport(
        &self,
        codec: session::Codec,
        headers: &http::HeaderMap,
        staging: Staging,
    ) -> Box<dyn Transport + Send + Sync> {
        match self {
            Self::Cookie(settings) => Box::new(Cookie::new(
                settings.clone(),
                codec,
                headers,
                staging,
            )),
            Self::Header => Box::new(Header::new(codec, headers, staging)),
        }
    }

    /// Applies the [`Staged`] outcome to the response `headers`.
    pub fn apply(&self, staged: Staged, headers: &mut http::HeaderMap) {
        match self {
            Self::Cookie(settings) => cookie::apply(settings, staged, headers),
            Self::Header => header::apply(staged, headers),
        }
    }
}

/// Middleware providing the [`Factory`] and a fresh [`Staging`] to the
/// request, and applying the [`Staged`] outcome to its response.
pub async fn stage(
    State(factory): State<Factory>,
    mut req: Request,
    next: Next,
) -> Response {
    let staging = Staging::default();
    drop(req.extensions_mut().insert(staging.clone()));
    drop(req.extensions_mut().insert(factory.clone()));

    let mut res = next.run(req).await;
    if let Some(staged) = staging.take() {
        factory.apply(staged, res.headers_mut());
    }
    res
}

#[cfg(test)]
mod spec {
    use axum::{
        body::{self, Body},
        middleware,
        routing::post,
        Extension, Router,
    };
    use axum_extra::extract::cookie::SameSite;
    use service::Transport as _;
    use tower::ServiceExt as _;

    use super::{cookie, fixture, stage, Factory, Staged, Staging};

    fn cookie_factory() -> Factory {
        Factory::Cookie(cookie::Settings {
            name: "access_token".into(),
            secure: true,
            same_site: SameSite::Strict,
        })
    }

    fn app(factory: Factory, handler: axum::routing::MethodRouter) -> Router {
        Router::new()
            .route("/", handler)
            .layer(middleware::from_fn_with_state(factory, stage))
    }

    fn request() -> http::Request<Body> {
        http::Request::post("/").body(Body::empty()).unwrap()
    }

    #[test]
    fn staging_keeps_latest_outcome() {
        let staging = Staging::default();
        let shared = staging.clone();

        shared.put(Staged::Removed);
        staging.put(Staged::Removed);

        assert!(matches!(staging.take(), Some(Staged::Removed)));
        assert!(shared.take().is_none());
    }

    #[tokio::test]
    async fn clears_cookie_staged_for_removal() {
        let app = app(
            cookie_factory(),
            post(|Extension(staging): Extension<Staging>| async move {
                staging.put(Staged::Removed);
            }),
        );

        let res = app.oneshot(request()).await.unwrap();

        let cookie = res.headers()[http::header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("access_token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn returns_delivered_token_in_header() {
        let app = app(
            Factory::Header,
            post(
                |Extension(factory): Extension<Factory>,
                 Extension(staging): Extension<Staging>,
                 headers: http::HeaderMap| async move {
                    factory
                        .transport(fixture::codec(), &headers, staging)
                        .deliver(&fixture::session())
                        .unwrap()
                        .to_string()
                },
            ),
        );

        let res = app.oneshot(request()).await.unwrap();

        let authorization = res.headers()[http::header::AUTHORIZATION]
            .to_str()
            .unwrap()
            .to_owned();
        let token = body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            authorization,
            format!("Bearer {}", String::from_utf8_lossy(&token)),
        );
    }

    #[tokio::test]
    async fn leaves_response_untouched_without_outcome() {
        for factory in [cookie_factory(), Factory::Header] {
            let app = app(factory, post(|| async {}));

            let res = app.oneshot(request()).await.unwrap();

            assert_eq!(res.status(), http::StatusCode::OK);
            assert!(res.headers().get(http::header::SET_COOKIE).is_none());
            assert!(res.headers().get(http::header::AUTHORIZATION).is_none());
        }
    }
}
