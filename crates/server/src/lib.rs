use api_types::ErrorBody;
use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::{EngineError, ErrorClass};

pub use server::{ServerState, app, run_with_listener};

mod server;
mod transfers;
mod users;

pub enum ServerError {
    Engine(EngineError),
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err.class() {
        ErrorClass::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorClass::NotFound => StatusCode::NOT_FOUND,
        ErrorClass::Conflict => StatusCode::CONFLICT,
        ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let ServerError::Engine(err) = self;
        let status = status_for_engine_error(&err);
        let error = message_for_engine_error(err);

        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
