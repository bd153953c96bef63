//! SMART launch and authorization callback routes
//!
//! `/launch` opens a browser session and sets its cookie; `/callback` runs
//! against the stores of the session named by that cookie.

use axum::{
    extract::{RawQuery, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use bedside_smart::{CallbackState, LaunchParams};

use crate::error::{Error, Result};
use crate::state::AppState;

/// `GET /launch?iss=...&launch=...` redirects (302) to the EHR's authorize endpoint.
pub async fn launch(
    State(state): State<AppState>,
    jar: CookieJar,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    let params = LaunchParams::from_query(query.as_deref().unwrap_or_default())?;
    tracing::info!(iss = %params.iss, "EHR launch");

    let (smart, cookie) = state.start_session()?;
    let redirect = smart.launch(&params).await?;
    Ok((
        StatusCode::FOUND,
        jar.add(cookie),
        [(header::LOCATION, redirect.authorize_url)],
    )
        .into_response())
}

/// `GET /callback?code=...&state=...` exchanges the code, then sends the
/// browser to the dashboard (303).
pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    uri: Uri,
) -> Result<Response> {
    let callback_url = callback_url(&state.config.smart.redirect_uri, uri.query());

    let mut handler = state.callback_client(&jar).callback_handler();
    let outcome = handler.handle(&callback_url).await.clone();
    match outcome {
        CallbackState::Success(success) => Ok(Redirect::to(&success.redirect_to).into_response()),
        CallbackState::Failed(error) => Err(Error::Callback {
            error,
            debug_info: handler.debug_info().to_string(),
        }),
        other => Err(Error::Internal(format!(
            "callback finished in state {other:?}"
        ))),
    }
}

/// The registered redirect URI with the query the EHR appended
fn callback_url(redirect_uri: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{redirect_uri}?{q}"),
        _ => redirect_uri.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_url() {
        assert_eq!(
            callback_url("http://localhost:3000/callback", Some("code=c&state=s")),
            "http://localhost:3000/callback?code=c&state=s"
        );
        assert_eq!(
            callback_url("http://localhost:3000/callback", None),
            "http://localhost:3000/callback"
        );
    }
}
