//! Full EHR launch through the router: discovery, authorize redirect,
//! callback and token exchange against a mock EHR.

mod support;

use axum::http::{Method, StatusCode};
use bedside_smart::{keys, KeyValueStore};
use serde_json::json;
use support::{body_json, location, query_param, session_cookie, MockEhr, TestApp};

/// Launch from a fresh browser; returns its cookie and the CSRF state sent to
/// the authorize endpoint.
async fn launch(
    app: &TestApp,
    ehr: &MockEhr,
    launch_context: &str,
) -> anyhow::Result<(String, String)> {
    let response = app.get(&ehr.launch_uri(launch_context)).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    let cookie = session_cookie(&response).expect("session cookie set");
    let state = query_param(&location(&response), "state").expect("state in redirect");
    Ok((cookie, state))
}

#[tokio::test]
async fn callback_redirects_to_dashboard_after_exchange() -> anyhow::Result<()> {
    let ehr = MockEhr::start().await?;
    ehr.respond(
        Method::POST,
        "/token",
        200,
        json!({"access_token": "at-1", "patient": "p1", "need_patient_banner": true}),
    );
    let app = TestApp::new()?;

    let (cookie, state) = launch(&app, &ehr, "l1").await?;
    let response = app
        .get_as(&format!("/callback?code=c1&state={state}"), &cookie)
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/home");

    let form = ehr.requests_to(Method::POST, "/token")[0].body.clone();
    assert!(form.contains("code=c1"));

    let storage = app.storage(&cookie).expect("session registered");
    assert_eq!(storage.durable.get(keys::ACCESS_TOKEN)?.as_deref(), Some("at-1"));
    assert_eq!(storage.session.get(keys::AUTH_STATE)?, None);

    let info = body_json(app.get_as("/info", &cookie).await?).await?;
    assert_eq!(info["authorized"], true);
    Ok(())
}

#[tokio::test]
async fn interleaved_launches_complete_independently() -> anyhow::Result<()> {
    let ehr = MockEhr::start().await?;
    // Token responses are served in callback order: B first, then A.
    ehr.respond(
        Method::POST,
        "/token",
        200,
        json!({"access_token": "at-b", "patient": "pb"}),
    );
    ehr.respond(
        Method::POST,
        "/token",
        200,
        json!({"access_token": "at-a", "patient": "pa"}),
    );
    let app = TestApp::new()?;

    let (cookie_a, state_a) = launch(&app, &ehr, "launch-a").await?;
    let (cookie_b, state_b) = launch(&app, &ehr, "launch-b").await?;
    assert_ne!(cookie_a, cookie_b);
    assert_ne!(state_a, state_b);

    let response = app
        .get_as(&format!("/callback?code=code-b&state={state_b}"), &cookie_b)
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app
        .get_as(&format!("/callback?code=code-a&state={state_a}"), &cookie_a)
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let token = |cookie: &str| -> anyhow::Result<Option<String>> {
        let storage = app.storage(cookie).expect("session registered");
        Ok(storage.durable.get(keys::ACCESS_TOKEN)?)
    };
    assert_eq!(token(&cookie_a)?.as_deref(), Some("at-a"));
    assert_eq!(token(&cookie_b)?.as_deref(), Some("at-b"));
    let codes: Vec<String> = ehr
        .requests_to(Method::POST, "/token")
        .iter()
        .filter_map(|r| r.body.split('&').find(|p| p.starts_with("code=")).map(str::to_string))
        .collect();
    assert_eq!(codes, vec!["code=code-b", "code=code-a"]);
    Ok(())
}

#[tokio::test]
async fn state_from_another_browser_is_rejected() -> anyhow::Result<()> {
    let ehr = MockEhr::start().await?;
    ehr.respond(Method::POST, "/token", 200, json!({"access_token": "at-a"}));
    let app = TestApp::new()?;

    let (cookie_a, state_a) = launch(&app, &ehr, "launch-a").await?;
    let (cookie_b, _) = launch(&app, &ehr, "launch-b").await?;

    let response = app
        .get_as(&format!("/callback?code=x&state={state_a}"), &cookie_b)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(ehr.requests_to(Method::POST, "/token").is_empty());

    let response = app
        .get_as(&format!("/callback?code=code-a&state={state_a}"), &cookie_a)
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    Ok(())
}

#[tokio::test]
async fn callback_without_the_launching_browser_is_rejected() -> anyhow::Result<()> {
    let ehr = MockEhr::start().await?;
    ehr.respond(Method::POST, "/token", 200, json!({"access_token": "at-1"}));
    let app = TestApp::new()?;

    let (cookie, state) = launch(&app, &ehr, "l1").await?;

    // A victim's browser sent to the attacker's callback URL carries no
    // matching session.
    let response = app.get(&format!("/callback?code=attacker&state={state}")).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    let transcript = body["issue"][1]["diagnostics"].as_str().unwrap_or_default();
    assert!(transcript.contains("Stored State: null"));
    assert!(ehr.requests_to(Method::POST, "/token").is_empty());

    // The launching browser still completes.
    let response = app
        .get_as(&format!("/callback?code=c1&state={state}"), &cookie)
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    Ok(())
}
