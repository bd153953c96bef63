//! Error responses for the launch server

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Smart(#[from] bedside_smart::Error),

    #[error(transparent)]
    Model(#[from] bedside_models::Error),

    /// Callback failure with the handler's diagnostic transcript
    #[error("{error}")]
    Callback {
        error: bedside_smart::Error,
        debug_info: String,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl Error {
    fn status(&self) -> StatusCode {
        use bedside_smart::Error as Smart;

        let smart = match self {
            Error::Smart(e) | Error::Callback { error: e, .. } => e,
            Error::Model(_) => return StatusCode::BAD_GATEWAY,
            Error::BadRequest(_) => return StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => return StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => return StatusCode::NOT_FOUND,
            Error::Internal(_) => return StatusCode::INTERNAL_SERVER_ERROR,
        };
        match smart {
            Smart::MissingLaunchParameters
            | Smart::CsrfMismatch
            | Smart::MissingAuthorizationCode
            | Smart::UnsupportedVitalType(_)
            | Smart::InvalidVitalValue { .. }
            | Smart::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            Smart::MissingCredentials { .. } => StatusCode::UNAUTHORIZED,
            Smart::FetchFailure {
                status: Some(401), ..
            } => StatusCode::UNAUTHORIZED,
            Smart::DiscoveryFailure(_)
            | Smart::TokenExchangeFailure { .. }
            | Smart::FetchFailure { .. }
            | Smart::CreateFailure { .. } => StatusCode::BAD_GATEWAY,
            Smart::InvalidConfiguration(_) | Smart::Storage(_) | Smart::Http(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let diagnostics = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal error: {}", self);
            "Internal server error".to_string()
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request failed");
            self.to_string()
        };

        let mut issues = vec![json!({
            "severity": "error",
            "code": status_to_fhir_code(status),
            "diagnostics": diagnostics
        })];
        if let Error::Callback { debug_info, .. } = &self {
            issues.push(json!({
                "severity": "information",
                "code": "informational",
                "diagnostics": debug_info
            }));
        }

        let body = Json(json!({
            "resourceType": "OperationOutcome",
            "issue": issues
        }));

        let mut response = (status, body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/fhir+json; charset=utf-8"),
        );
        response
    }
}

fn status_to_fhir_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "invalid",
        StatusCode::UNAUTHORIZED => "login",
        StatusCode::NOT_FOUND => "not-found",
        StatusCode::BAD_GATEWAY => "transient",
        _ => "exception",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err: Error = bedside_smart::Error::CsrfMismatch.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: Error = bedside_smart::Error::MissingCredentials {
            keys: vec!["access_token".to_string()],
        }
        .into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err: Error = bedside_smart::Error::CreateFailure {
            status: Some(422),
            message: "422 Unprocessable Entity".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        let err = Error::Unauthorized("no session".to_string());
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err: Error = bedside_smart::Error::FetchFailure {
            resource: "Patient".to_string(),
            status: Some(401),
            message: "401 Unauthorized".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
