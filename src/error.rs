use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::env;
use std::fmt::{self, Debug, Display};

use crate::validation::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

impl Error {
    pub fn is_invalid_input_error(&self) -> bool {
        self.code >= 100
    }

    pub fn is_store_closed_error(&self) -> bool {
        self.code == 4
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        env_var_error(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        database_error(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        serialization_error(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        let code = match err {
            ValidationError::MissingOrInvalidCoordinate => 110,
            ValidationError::MissingName => 111,
            ValidationError::MissingCode => 112,
        };

        Self {
            code,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.code {
            1..=99 => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
            _ => (StatusCode::BAD_REQUEST, self.message.as_str()),
        };

        let body = Json(json!({
            "code": self.code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub fn invalid_input_error() -> Error {
    Error {
        code: 100,
        message: "invalid input".into(),
    }
}

pub fn env_var_error(_: env::VarError) -> Error {
    Error {
        code: 1,
        message: "environment variable error".into(),
    }
}

pub fn database_error<T: Debug>(err: T) -> Error {
    tracing::error!("database error: {:?}", err);

    Error {
        code: 2,
        message: "database error".into(),
    }
}

pub fn serialization_error(err: serde_json::Error) -> Error {
    tracing::error!("serialization error: {}", err);

    Error {
        code: 3,
        message: "serialization error".into(),
    }
}

pub fn store_closed_error() -> Error {
    Error {
        code: 4,
        message: "store closed".into(),
    }
}

pub fn unexpected_error() -> Error {
    Error {
        code: 5,
        message: "unexpected error".into(),
    }
}

#[test]
fn validation_errors_map_to_client_codes() {
    let err: Error = ValidationError::MissingName.into();

    assert_eq!(err.code, 111);
    assert_eq!(err.message, "Please enter a name for the location.");
    assert!(err.is_invalid_input_error());

    let err: Error = ValidationError::MissingOrInvalidCoordinate.into();
    assert_eq!(err.code, 110);
}

#[test]
fn internal_errors_hide_their_message() {
    let response = store_closed_error().into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = Error::from(ValidationError::MissingCode).into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
