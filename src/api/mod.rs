// REST API endpoints for the executor

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::depot::DispatchError;
use crate::executor::{Client, ExecutorError};
use crate::model::{ExecutorAction, Registration};
use crate::provision::{AllocationRequest, ProvisionError, Provisioner};
use crate::registry::{Registry, RegistryError};

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn Client>,
    pub registry: Arc<dyn Registry>,
    pub provisioner: Provisioner,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub actions: Vec<ExecutorAction>,
    pub complete_url: String,
}

/// Error response carrying `{ "error": "<message>" }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<ExecutorError> for ApiError {
    fn from(err: ExecutorError) -> Self {
        let status = match &err {
            ExecutorError::ContainerNotFound => StatusCode::NOT_FOUND,
            ExecutorError::StepsInvalid => StatusCode::BAD_REQUEST,
            ExecutorError::Dispatch(DispatchError::Timeout(_) | DispatchError::Closed) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ExecutorError::Registry(_) | ExecutorError::Runtime(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<ProvisionError> for ApiError {
    fn from(err: ProvisionError) -> Self {
        let status = match &err {
            ProvisionError::Registry(RegistryError::AlreadyExists(_)) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/containers", get(list_containers))
        .route(
            "/containers/{guid}",
            get(get_container).post(allocate_container).delete(delete_container),
        )
        .route("/containers/{guid}/run", post(run_container))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn ping(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state
        .client
        .ping()
        .await
        .map_err(|err| ApiError::new(StatusCode::BAD_GATEWAY, err.to_string()))?;

    Ok(Json(json!({ "status": "ok" })))
}

async fn list_containers(
    State(state): State<AppState>,
) -> Result<Json<Vec<Registration>>, ApiError> {
    let mut registrations = state
        .registry
        .list()
        .await
        .map_err(ExecutorError::Registry)?;
    registrations.sort_by(|a, b| a.guid.as_str().cmp(b.guid.as_str()));
    Ok(Json(registrations))
}

async fn get_container(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> Result<Json<Registration>, ApiError> {
    match state.registry.find_by_guid(&guid).await {
        Ok(registration) => Ok(Json(registration)),
        Err(RegistryError::NotFound(_)) => Err(ExecutorError::ContainerNotFound.into()),
        Err(err) => Err(ExecutorError::Registry(err).into()),
    }
}

async fn allocate_container(
    State(state): State<AppState>,
    Path(guid): Path<String>,
    Json(request): Json<AllocationRequest>,
) -> Result<(StatusCode, Json<Registration>), ApiError> {
    let registration = state.provisioner.allocate(&guid, request).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

async fn run_container(
    State(state): State<AppState>,
    Path(guid): Path<String>,
    Json(request): Json<RunRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .client
        .run_container(&guid, &request.actions, &request.complete_url)
        .await?;

    Ok(StatusCode::ACCEPTED)
}

async fn delete_container(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.client.delete_container(&guid).await?;
    Ok(Json(json!({ "status": "deleted", "guid": guid })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depot::{DispatchReceiver, dispatch_channel};
    use crate::executor::ExecutorClient;
    use crate::registry::InMemoryRegistry;
    use crate::runtime::InMemoryRuntime;
    use crate::transformer::ActionTransformer;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        runtime: InMemoryRuntime,
        work: DispatchReceiver,
    }

    fn app() -> TestApp {
        let registry = Arc::new(InMemoryRegistry::new());
        let runtime = InMemoryRuntime::new();
        let (tx, work) = dispatch_channel(4, Duration::from_millis(50));

        let client = ExecutorClient::new(
            Arc::new(runtime.clone()),
            registry.clone(),
            Arc::new(ActionTransformer::new()),
            tx,
        );

        let state = AppState {
            client: Arc::new(client),
            registry: registry.clone(),
            provisioner: Provisioner::new(registry, Arc::new(runtime.clone())),
        };

        TestApp {
            router: create_router(state),
            runtime,
            work,
        }
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_ping() {
        let app = app();
        let (status, body) = send(&app.router, "GET", "/ping", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        app.runtime.set_reachable(false);
        let (status, body) = send(&app.router, "GET", "/ping", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("unreachable"));
    }

    #[tokio::test]
    async fn test_allocate_run_delete() {
        let mut app = app();

        let (status, body) = send(
            &app.router,
            "POST",
            "/containers/abc",
            Some(json!({ "memory_mb": 128, "log": { "guid": "app-1", "source_name": "APP" } })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["guid"], "abc");
        assert_eq!(body["log"]["source_name"], "APP");

        let (status, _) = send(&app.router, "POST", "/containers/abc", Some(json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app.router,
            "POST",
            "/containers/abc/run",
            Some(json!({
                "actions": [{ "type": "run", "script": "./start" }],
                "complete_url": "http://cb"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(app.work.try_recv().unwrap().complete_url, "http://cb");

        let (status, body) = send(&app.router, "DELETE", "/containers/abc", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "deleted");
        assert!(app.runtime.is_empty().await);

        let (status, body) = send(&app.router, "GET", "/containers/abc", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "container not found");
    }

    #[tokio::test]
    async fn test_run_error_statuses() {
        let mut app = app();

        let (status, _) = send(
            &app.router,
            "POST",
            "/containers/missing/run",
            Some(json!({ "actions": [], "complete_url": "http://cb" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        send(&app.router, "POST", "/containers/abc", Some(json!({}))).await;
        let (status, body) = send(
            &app.router,
            "POST",
            "/containers/abc/run",
            Some(json!({
                "actions": [{ "type": "run", "script": "" }],
                "complete_url": "http://cb"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "steps invalid");
        assert!(app.work.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_list_containers() {
        let app = app();
        let (status, body) = send(&app.router, "GET", "/containers", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        send(&app.router, "POST", "/containers/b", Some(json!({}))).await;
        send(&app.router, "POST", "/containers/a", Some(json!({}))).await;

        let (status, body) = send(&app.router, "GET", "/containers", None).await;
        assert_eq!(status, StatusCode::OK);
        let guids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["guid"].as_str().unwrap())
            .collect();
        assert_eq!(guids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let app = app();
        let (status, _) = send(&app.router, "DELETE", "/containers/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
