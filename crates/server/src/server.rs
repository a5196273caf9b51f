use axum::{
    Json, Router,
    http::{HeaderName, HeaderValue},
    routing::get,
};
use axum_extra::headers::{Error as AxumError, Header};
use serde::Serialize;

use std::sync::Arc;

use crate::{transfers, users};
use engine::Engine;

pub(crate) static IDEMPOTENCY_KEY_HEADER: HeaderName = HeaderName::from_static("idempotency-key");

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

/// `TypedHeader` for the `Idempotency-Key` request header.
///
/// Only the first value is considered; it must be visible ASCII.
#[derive(Debug)]
pub(crate) struct IdempotencyKey(pub String);

impl Header for IdempotencyKey {
    fn name() -> &'static HeaderName {
        &IDEMPOTENCY_KEY_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };

        Ok(IdempotencyKey(value.to_string()))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        match HeaderValue::from_str(&self.0) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode idempotency-key header"),
        }
    }
}

#[derive(Serialize)]
struct Health {
    message: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { message: "ok" })
}

fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/users", get(users::list).post(users::create))
        .route(
            "/users/{id}",
            get(users::get).put(users::update).delete(users::delete),
        )
        .route("/users/{id}/ledger", get(users::ledger))
        .route("/transfers", get(transfers::list).post(transfers::create))
        .route("/transfers/{key}", get(transfers::get))
        .with_state(state)
}

/// Builds the HTTP application around `engine`.
pub fn app(engine: Engine) -> Router {
    router(ServerState {
        engine: Arc::new(engine),
    })
}

pub async fn run_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(engine)).await
}
