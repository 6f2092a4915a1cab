//! Action endpoints called by the external conversation runtime.
//!
//! - `POST   /conversations/{id}/slots`     submit `{slot, value}`
//! - `PUT    /conversations/{id}/language`  switch reply language
//! - `POST   /conversations/{id}/finalize`  confirm and notify
//! - `DELETE /conversations/{id}`           abandon the conversation
//! - `GET    /health`                       readiness

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, post, put},
    Json, Router,
};
use enrollment_agent::{EnrollmentRuntime, FinalizeReply, SlotReply};
use enrollment_core::domain::language::Language;
use enrollment_core::errors::InterfaceError;
use enrollment_db::DbPool;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::health;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ActionState {
    runtime: Arc<EnrollmentRuntime>,
}

#[derive(Debug, Deserialize)]
pub struct SlotRequest {
    pub slot: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct LanguageRequest {
    pub language: String,
}

#[derive(Debug, Serialize)]
pub struct LanguageResponse {
    pub conversation_id: String,
    pub language: Language,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: &'static str,
    pub correlation_id: String,
}

/// `InterfaceError` rendered as an HTTP response. Internal detail stays in the
/// logs; the body only carries the user-safe message.
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl From<InterfaceError> for ApiError {
    fn from(error: InterfaceError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "bad_request"),
            InterfaceError::Unprocessable { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable")
            }
            InterfaceError::ServiceUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
            InterfaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() {
            tracing::error!(
                event_name = "http.request_failed",
                correlation_id = self.0.correlation_id(),
                status = status.as_u16(),
                error = %self.0,
                "action request failed"
            );
        }
        let body = ErrorBody {
            code,
            message: self.0.user_message(),
            correlation_id: self.0.correlation_id().to_owned(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(runtime: Arc<EnrollmentRuntime>, db_pool: DbPool) -> Router {
    Router::new()
        .route("/conversations/{conversation_id}/slots", post(submit_slot))
        .route("/conversations/{conversation_id}/language", put(set_language))
        .route("/conversations/{conversation_id}/finalize", post(finalize))
        .route("/conversations/{conversation_id}", delete(abandon))
        .with_state(ActionState { runtime })
        .merge(health::router(db_pool))
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

async fn submit_slot(
    State(state): State<ActionState>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SlotRequest>,
) -> Result<Json<SlotReply>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let reply = state
        .runtime
        .handle_slot(&conversation_id, &body.slot, &body.value, &correlation_id)
        .await?;
    Ok(Json(reply))
}

async fn set_language(
    State(state): State<ActionState>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<LanguageRequest>,
) -> Result<Json<LanguageResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let language = body.language.parse::<Language>().map_err(|error| {
        InterfaceError::BadRequest { message: error.to_string(), correlation_id: correlation_id.clone() }
    })?;
    let language = state.runtime.set_language(&conversation_id, language, &correlation_id).await;
    Ok(Json(LanguageResponse { conversation_id, language }))
}

async fn finalize(
    State(state): State<ActionState>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<FinalizeReply>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let reply = state.runtime.finalize(&conversation_id, &correlation_id).await?;
    Ok(Json(reply))
}

async fn abandon(
    State(state): State<ActionState>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
) -> StatusCode {
    let correlation_id = correlation_id(&headers);
    if state.runtime.abandon(&conversation_id, &correlation_id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use enrollment_agent::{EnrollmentRuntime, InMemoryNotifier, RuntimeSettings};
    use enrollment_core::catalog::{CatalogConnector, CatalogError, InMemoryCatalog};
    use enrollment_core::domain::catalog::{CatalogQuery, CatalogRecord};
    use enrollment_db::connect_with_settings;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, CORRELATION_HEADER};

    struct OfflineCatalog;

    #[async_trait]
    impl CatalogConnector for OfflineCatalog {
        async fn lookup(&self, _query: &CatalogQuery) -> Result<Vec<CatalogRecord>, CatalogError> {
            Err(CatalogError::Unavailable("connection refused".to_string()))
        }
    }

    async fn app_with(catalog: Arc<dyn CatalogConnector>) -> Router {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        let runtime = EnrollmentRuntime::new(
            catalog,
            Arc::new(InMemoryNotifier::default()),
            RuntimeSettings::default(),
        )
        .expect("runtime");
        router(Arc::new(runtime), pool)
    }

    async fn app() -> Router {
        app_with(Arc::new(InMemoryCatalog::demo())).await
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(CORRELATION_HEADER, "test-correlation");
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    async fn submit(app: &Router, slot: &str, value: &str) -> Value {
        let (status, body) = send(
            app,
            Method::POST,
            "/conversations/c1/slots",
            Some(json!({ "slot": slot, "value": value })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }

    #[tokio::test]
    async fn slot_submission_returns_reply() {
        let app = app().await;

        let body = submit(&app, "field_of_study", "Ingegneria").await;

        assert_eq!(body["accepted"], json!(true));
        assert_eq!(body["state"], json!("valid"));
        assert_eq!(body["next_slot"], json!("degree_type"));
    }

    #[tokio::test]
    async fn full_conversation_finalizes() {
        let app = app().await;
        for (slot, value) in [
            ("field_of_study", "Ingegneria"),
            ("degree_type", "triennale"),
            ("degree_id", "101"),
            ("courses", "103"),
            ("courses", "105"),
            ("email", "mario@unina.it"),
        ] {
            let body = submit(&app, slot, value).await;
            assert_eq!(body["accepted"], json!(true), "{slot}: {body}");
        }

        let (status, body) = send(&app, Method::POST, "/conversations/c1/finalize", None).await;

        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["confirmation"]["degree"]["id"], json!("101"));
        assert_eq!(body["deliveries"][0]["delivered"], json!(true));

        let (status, _) = send(&app, Method::DELETE, "/conversations/c1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn incomplete_finalize_is_unprocessable() {
        let app = app().await;
        submit(&app, "field_of_study", "Ingegneria").await;

        let (status, body) = send(&app, Method::POST, "/conversations/c1/finalize", None).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], json!("unprocessable"));
        assert_eq!(body["correlation_id"], json!("test-correlation"));
    }

    #[tokio::test]
    async fn catalog_outage_during_finalize_is_service_unavailable() {
        let catalog = Arc::new(InMemoryCatalog::demo());
        let switchable = Arc::new(SwitchableCatalog::new(Arc::clone(&catalog)));
        let app = app_with(switchable.clone()).await;
        for (slot, value) in [
            ("field_of_study", "Ingegneria"),
            ("degree_type", "triennale"),
            ("degree_id", "101"),
            ("courses", "103"),
            ("courses", "105"),
            ("email", "mario@unina.it"),
        ] {
            submit(&app, slot, value).await;
        }
        switchable.go_offline();

        let (status, body) = send(&app, Method::POST, "/conversations/c1/finalize", None).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], json!("service_unavailable"));
    }

    #[tokio::test]
    async fn catalog_outage_during_submission_asks_for_retry() {
        let app = app_with(Arc::new(OfflineCatalog)).await;
        submit(&app, "field_of_study", "Ingegneria").await;
        submit(&app, "degree_type", "triennale").await;

        let body = submit(&app, "degree_id", "101").await;

        assert_eq!(body["accepted"], json!(false));
        assert_eq!(body["error_code"], json!("catalog_unavailable"));
    }

    #[tokio::test]
    async fn language_switch_accepts_known_codes_only() {
        let app = app().await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/conversations/c1/language",
            Some(json!({ "language": "en" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["language"], json!("en"));

        let (status, body) = send(
            &app,
            Method::PUT,
            "/conversations/c1/language",
            Some(json!({ "language": "klingon" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!("bad_request"));
    }

    #[tokio::test]
    async fn abandon_removes_existing_conversation() {
        let app = app().await;
        submit(&app, "field_of_study", "Ingegneria").await;

        let (status, _) = send(&app, Method::DELETE, "/conversations/c1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, Method::DELETE, "/conversations/c1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_route_is_mounted() {
        let app = app().await;

        let (status, body) = send(&app, Method::GET, "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"]["status"], json!("ready"));
    }

    struct SwitchableCatalog {
        inner: Arc<InMemoryCatalog>,
        offline: std::sync::atomic::AtomicBool,
    }

    impl SwitchableCatalog {
        fn new(inner: Arc<InMemoryCatalog>) -> Self {
            Self { inner, offline: std::sync::atomic::AtomicBool::new(false) }
        }

        fn go_offline(&self) {
            self.offline.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl CatalogConnector for SwitchableCatalog {
        async fn lookup(&self, query: &CatalogQuery) -> Result<Vec<CatalogRecord>, CatalogError> {
            if self.offline.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(CatalogError::Unavailable("pool timed out".to_string()));
            }
            self.inner.lookup(query).await
        }
    }
}
