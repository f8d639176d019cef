use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::session;
use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    /// The session token the request authenticated with.
    pub token: String,
}

/// Extractor that requires authentication.
/// Returns 401 if no valid session found.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| cookie_token(parts, &state.config.auth.cookie_name))
            .ok_or_else(|| AppError::Unauthenticated("missing session token".into()))?
            .to_string();

        let user = session::find_session_user(&state.db, &token)?
            .ok_or_else(|| AppError::Unauthenticated("invalid or expired session".into()))?;

        Ok(CurrentUser {
            id: user.id,
            username: user.username,
            token,
        })
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn cookie_token<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(header::HeaderName, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn reads_bearer_token() {
        let p = parts(&[(header::AUTHORIZATION, "Bearer abc123")]);
        assert_eq!(bearer_token(&p), Some("abc123"));

        let p = parts(&[(header::AUTHORIZATION, "bearer   xyz")]);
        assert_eq!(bearer_token(&p), Some("xyz"));
    }

    #[test]
    fn ignores_other_authorization_schemes() {
        let p = parts(&[(header::AUTHORIZATION, "Basic Zm9vOmJhcg==")]);
        assert_eq!(bearer_token(&p), None);

        let p = parts(&[(header::AUTHORIZATION, "Bearer ")]);
        assert_eq!(bearer_token(&p), None);
    }

    #[test]
    fn reads_named_cookie() {
        let p = parts(&[(header::COOKIE, "theme=dark; forum_session=tok; other=1")]);
        assert_eq!(cookie_token(&p, "forum_session"), Some("tok"));
        assert_eq!(cookie_token(&p, "missing"), None);
    }
}
