//! Account endpoints: register, login, logout.
//!
//! The session is a JWT carried in an HttpOnly cookie.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    error::AppResult,
    models::user::{LoginForm, RegisterForm},
    AppState,
};

use super::{FormData, SessionUser, CATALOG_PATH};

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Serialize)]
pub struct LoginView {
    pub view: &'static str,
    pub next: Option<String>,
}

fn session_cookie(config: &AuthConfig, token: String) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Only follow `next` when it stays on this site.
fn redirect_target(next: Option<&str>) -> &str {
    match next {
        Some(path) if is_local_path(path) => path,
        _ => CATALOG_PATH,
    }
}

/// Browsers read `\` as `/`, so `/\host` is as off-site as `//host`.
fn is_local_path(path: &str) -> bool {
    let mut chars = path.chars();
    chars.next() == Some('/')
        && !matches!(chars.next(), Some('/') | Some('\\'))
        && !path.contains("://")
        && !path.chars().any(|c| c == '\\' || c.is_control())
}

/// Login page; visitors with a session go straight to the catalog
pub async fn login_form(session: Option<SessionUser>, Query(query): Query<NextQuery>) -> Response {
    if session.is_some() {
        return Redirect::to(CATALOG_PATH).into_response();
    }
    Json(LoginView {
        view: "login",
        next: query.next,
    })
    .into_response()
}

/// Authenticate and open a session
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    FormData(form): FormData<LoginForm>,
) -> AppResult<(CookieJar, Redirect)> {
    let (user, token) = state
        .services
        .accounts
        .login(&form.username, &form.password)
        .await?;
    tracing::info!(user_id = user.id, "User logged in");

    let jar = jar.add(session_cookie(&state.config.auth, token));
    Ok((jar, Redirect::to(redirect_target(form.next.as_deref()))))
}

/// Create an account and log it in
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    FormData(form): FormData<RegisterForm>,
) -> AppResult<(CookieJar, Redirect)> {
    let (_, token) = state.services.accounts.register(form).await?;
    let jar = jar.add(session_cookie(&state.config.auth, token));
    Ok((jar, Redirect::to(CATALOG_PATH)))
}

/// Close the session
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let removal = Cookie::build((state.config.auth.cookie_name.clone(), "")).path("/");
    (jar.remove(removal), Redirect::to(CATALOG_PATH))
}
