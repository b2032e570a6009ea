//! [`Cookie`] [`Transport`].

use axum_extra::extract::cookie::{self, CookieJar, Expiration, SameSite};
use derive_more::Debug;
use service::{
    domain::{
        session::{self, token},
        Session,
    },
    Transport,
};
use tracing as log;

use super::{Staged, Staging};

/// Settings of a [`Cookie`] transport.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Name of the cookie carrying the access token.
    pub name: String,

    /// Indicator whether the cookie is sent over HTTPS only.
    pub secure: bool,

    /// [`SameSite`] policy of the cookie.
    pub same_site: SameSite,
}

/// [`Transport`] keeping the access token in an `HttpOnly` cookie.
#[derive(Debug)]
pub struct Cookie {
    /// [`Settings`] of this [`Cookie`] transport.
    settings: Settings,

    /// [`session::Codec`] to encode and decode tokens with.
    codec: session::Codec,

    /// Raw access token presented by the client.
    #[debug(skip)]
    presented: Option<String>,

    /// [`Staging`] of the current request.
    staging: Staging,
}

impl Cookie {
    /// Creates a new [`Cookie`] transport for the request with the provided
    /// `headers`.
    #[must_use]
    pub fn new(
        settings: Settings,
        codec: session::Codec,
        headers: &http::HeaderMap,
        staging: Staging,
    ) -> Self {
        let presented = CookieJar::from_headers(headers)
            .get(&settings.name)
            .map(|c| c.value().to_owned());
        Self {
            settings,
            codec,
            presented,
            staging,
        }
    }
}

impl Transport for Cookie {
    fn deliver(
        &self,
        session: &Session,
    ) -> Result<session::Token, token::EncodeError> {
        let token = self.codec.encode(&session.id, session.expires_at)?;
        self.staging.put(Staged::Delivered {
            token: token.clone(),
            expires_at: session.expires_at,
        });
        Ok(token)
    }

    fn extract_id(&self) -> Option<session::Id> {
        self.codec.decode(self.presented.as_deref()?)
    }

    fn remove_current(&self) {
        self.staging.put(Staged::Removed);
    }
}

/// Applies the [`Staged`] outcome as a `Set-Cookie` header.
pub(super) fn apply(
    settings: &Settings,
    staged: Staged,
    headers: &mut http::HeaderMap,
) {
    let cookie = match staged {
        Staged::Delivered { token, expires_at } => {
            let mut c = access_cookie(settings, token.to_string());
            c.set_expires(Expiration::DateTime(expires_at.into()));
            c
        }
        Staged::Removed => {
            let mut c = access_cookie(settings, String::new());
            c.make_removal();
            c
        }
    };

    match http::HeaderValue::from_str(&cookie.to_string()) {
        Ok(v) => _ = headers.append(http::header::SET_COOKIE, v),
        Err(e) => log::error!("failed to encode `Set-Cookie` header: {e}"),
    }
}

/// Creates the access token cookie with the provided `value`.
fn access_cookie(
    settings: &Settings,
    value: String,
) -> cookie::Cookie<'static> {
    let mut c = cookie::Cookie::new(settings.name.clone(), value);
    c.set_path("/");
    c.set_http_only(true);
    c.set_secure(settings.secure);
    c.set_same_site(settings.same_site);
    c
}

#[cfg(test)]
mod spec {
    use axum_extra::extract::cookie::SameSite;
    use service::Transport as _;

    use super::{
        super::{fixture, Staged, Staging},
        apply, Cookie, Settings,
    };

    fn settings() -> Settings {
        Settings {
            name: "access_token".into(),
            secure: true,
            same_site: SameSite::Lax,
        }
    }

    fn request(cookie: Option<&str>) -> http::HeaderMap {
        let mut headers = http::HeaderMap::new();
        if let Some(cookie) = cookie {
            _ = headers.insert(http::header::COOKIE, cookie.parse().unwrap());
        }
        headers
    }

    #[test]
    fn extracts_session_from_cookie() {
        let codec = fixture::codec();
        let session = fixture::session();
        let token = codec.encode(&session.id, session.expires_at).unwrap();
        let headers =
            request(Some(&format!("theme=dark; access_token={token}")));

        let transport =
            Cookie::new(settings(), codec, &headers, Staging::default());

        assert_eq!(transport.extract_id(), Some(session.id));
    }

    #[test]
    fn ignores_missing_and_foreign_cookies() {
        for headers in [
            request(None),
            request(Some("theme=dark")),
            request(Some("access_token=garbage")),
        ] {
            let transport = Cookie::new(
                settings(),
                fixture::codec(),
                &headers,
                Staging::default(),
            );

            assert_eq!(transport.extract_id(), None);
        }
    }

    #[test]
    fn sets_cookie_on_delivery() {
        let staging = Staging::default();
        let transport = Cookie::new(
            settings(),
            fixture::codec(),
            &request(None),
            staging.clone(),
        );

        let token = transport.deliver(&fixture::session()).unwrap();
        let mut headers = http::HeaderMap::new();
        apply(&settings(), staging.take().unwrap(), &mut headers);

        let cookie = headers[http::header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with(&format!("access_token={token}")));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Expires="));
    }

    #[test]
    fn clears_cookie_on_removal() {
        let staging = Staging::default();
        let transport = Cookie::new(
            settings(),
            fixture::codec(),
            &request(Some("access_token=whatever")),
            staging.clone(),
        );

        transport.remove_current();
        let staged = staging.take().unwrap();
        assert!(matches!(staged, Staged::Removed));
        let mut headers = http::HeaderMap::new();
        apply(&settings(), staged, &mut headers);

        let cookie = headers[http::header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("access_token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
