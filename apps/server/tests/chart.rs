//! Chart and vital-entry routes for an authorized browser, backed by a mock
//! EHR.

mod support;

use axum::http::{Method, StatusCode};
use bedside_smart::{keys, KeyValueStore};
use serde_json::json;
use support::{body_json, searchset, MockEhr, TestApp};

fn patient() -> serde_json::Value {
    json!({
        "resourceType": "Patient",
        "id": "p1",
        "name": [{"given": ["Amy"], "family": "Shaw"}],
        "gender": "female",
        "birthDate": "1987-02-20"
    })
}

fn blood_pressure(id: &str, systolic: f64, diastolic: f64) -> serde_json::Value {
    let component = |code: &str, value: f64| {
        json!({
            "code": {"coding": [{"system": "http://loinc.org", "code": code}]},
            "valueQuantity": {"value": value, "unit": "mmHg"}
        })
    };
    json!({
        "resourceType": "Observation",
        "id": id,
        "status": "final",
        "code": {"text": "Blood pressure"},
        "effectiveDateTime": "2024-03-01T10:00:00Z",
        "component": [component("8480-6", systolic), component("8462-4", diastolic)]
    })
}

fn heart_rate(id: &str, value: f64) -> serde_json::Value {
    json!({
        "resourceType": "Observation",
        "id": id,
        "status": "final",
        "code": {"text": "Heart rate"},
        "effectiveDateTime": "2024-03-01T10:05:00Z",
        "valueQuantity": {"value": value, "unit": "beats/minute"}
    })
}

#[tokio::test]
async fn dashboard_summarises_patient_with_banner_flag() -> anyhow::Result<()> {
    let ehr = MockEhr::start().await?;
    ehr.respond(Method::GET, "/Patient/p1", 200, patient());
    let app = TestApp::new()?;
    let cookie = app.authorize(&ehr.base_url)?;
    let storage = app.storage(&cookie).expect("session registered");
    storage.durable.set(keys::NEED_PATIENT_BANNER, "true")?;

    let response = app.get_as("/home", &cookie).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["patientId"], "p1");
    assert_eq!(body["issuer"], ehr.base_url);
    assert_eq!(body["needPatientBanner"], true);
    assert_eq!(body["patient"]["displayName"], "Amy Shaw");
    assert_eq!(body["patient"]["initials"], "AS");
    assert_eq!(body["patient"]["gender"], "female");

    let fetches = ehr.requests_to(Method::GET, "/Patient/p1");
    assert_eq!(fetches.len(), 1);
    assert_eq!(fetches[0].header("authorization"), Some("Bearer test-access-token"));
    Ok(())
}

#[tokio::test]
async fn vitals_filter_by_label_and_flag_abnormal_pressure() -> anyhow::Result<()> {
    let ehr = MockEhr::start().await?;
    ehr.respond(
        Method::GET,
        "/Observation",
        200,
        searchset(vec![
            blood_pressure("bp-high", 150.0, 95.0),
            heart_rate("hr-1", 72.0),
            blood_pressure("bp-normal", 118.0, 76.0),
        ]),
    );
    let app = TestApp::new()?;
    let cookie = app.authorize(&ehr.base_url)?;

    let body = body_json(app.get_as("/api/vitals", &cookie).await?).await?;
    assert_eq!(body["labels"], json!(["Blood pressure", "Heart rate"]));
    assert_eq!(body["readings"].as_array().map(Vec::len), Some(3));

    let response = app.get_as("/api/vitals?label=Blood%20pressure", &cookie).await?;
    let body = body_json(response).await?;
    let readings = body["readings"].as_array().cloned().unwrap_or_default();
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0]["id"], "bp-high");
    assert_eq!(readings[0]["systolic"], 150.0);
    assert_eq!(readings[0]["abnormal"], true);
    assert_eq!(readings[1]["id"], "bp-normal");
    assert_eq!(readings[1]["abnormal"], false);
    assert_eq!(body["labels"], json!(["Blood pressure", "Heart rate"]));

    let search = &ehr.requests_to(Method::GET, "/Observation")[0];
    let query = search.query.as_deref().unwrap_or_default();
    assert!(query.contains("patient=p1"));
    assert!(query.contains("category=vital-signs"));
    Ok(())
}

#[tokio::test]
async fn created_vitals_come_back_in_a_collection_bundle() -> anyhow::Result<()> {
    let ehr = MockEhr::start().await?;
    ehr.respond(Method::POST, "/Observation", 201, heart_rate("new-1", 72.0));
    let app = TestApp::new()?;
    let cookie = app.authorize(&ehr.base_url)?;

    let response = app
        .post_json(
            "/api/vitals",
            Some(&cookie),
            json!({"entries": [
                {"code": "heart-rate", "value": "72"},
                {"code": "blood-pressure", "value": "120/80"}
            ]}),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await?;
    assert_eq!(body["resourceType"], "Bundle");
    assert_eq!(body["type"], "collection");
    assert_eq!(body["entry"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["entry"][0]["resource"]["id"], "new-1");

    let posts = ehr.requests_to(Method::POST, "/Observation");
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].json()["subject"]["reference"], "Patient/p1");
    Ok(())
}

#[tokio::test]
async fn upstream_unauthorized_maps_to_unauthorized() -> anyhow::Result<()> {
    let ehr = MockEhr::start().await?;
    ehr.respond(
        Method::GET,
        "/AllergyIntolerance",
        401,
        json!({"resourceType": "OperationOutcome", "issue": [{"code": "login"}]}),
    );
    ehr.respond(Method::GET, "/Patient/p1", 500, json!({}));
    let app = TestApp::new()?;
    let cookie = app.authorize(&ehr.base_url)?;

    let response = app.get_as("/api/allergies", &cookie).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await?;
    assert_eq!(body["issue"][0]["code"], "login");

    let response = app.get_as("/api/patient", &cookie).await?;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    Ok(())
}

#[tokio::test]
async fn allergies_are_listed_with_total() -> anyhow::Result<()> {
    let ehr = MockEhr::start().await?;
    ehr.respond(
        Method::GET,
        "/AllergyIntolerance",
        200,
        searchset(vec![
            json!({"resourceType": "AllergyIntolerance", "id": "a1"}),
            json!({"resourceType": "AllergyIntolerance", "id": "a2"}),
        ]),
    );
    let app = TestApp::new()?;
    let cookie = app.authorize(&ehr.base_url)?;

    let body = body_json(app.get_as("/api/allergies", &cookie).await?).await?;
    assert_eq!(body["total"], 2);
    assert_eq!(body["allergies"][1]["id"], "a2");
    Ok(())
}
