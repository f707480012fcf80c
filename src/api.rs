use std::convert::Infallible;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRequestParts, Path, State, rejection::JsonRejection},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::error::{ErrorKind, LibError};
use crate::identity::{Caller, IdentityVerifier, resolve_caller};
use crate::models::{
    CreateEdgePayload, CreateGraphPayload, CreateNodePayload, EdgeId, EdgePatch, GraphId,
    GraphPatch, NodeId, NodePatch,
};
use crate::operations::{GraphOperation, GraphOperationResult, GraphOperations};
use crate::store::SharedStore;

/// Status used when the store itself fails on routes where the client sees a 500.
const STORE_FAILURE_INTERNAL: StatusCode = StatusCode::INTERNAL_SERVER_ERROR;
/// Status used when the store itself fails on every other route.
const STORE_FAILURE_BAD_REQUEST: StatusCode = StatusCode::BAD_REQUEST;

#[derive(Debug)]
pub struct AppError {
    pub error: LibError,
    store_failure_status: StatusCode,
}

impl AppError {
    pub fn new(error: LibError, store_failure_status: StatusCode) -> Self {
        Self {
            error,
            store_failure_status,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.error.kind {
            ErrorKind::Database => self.store_failure_status,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LibError> for AppError {
    fn from(value: LibError) -> Self {
        Self::new(value, STORE_FAILURE_INTERNAL)
    }
}

/// Failures from [`GraphOperations::execute`] are logged there. Requests turned
/// away before dispatch are logged by [`rejected`].
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "error": self.error.public,
            "code": self.error.code,
        });
        if self.error.kind.is_internal() {
            body["error_type"] = json!(format!("{:?}", self.error.kind));
        }
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for GraphOperationResult {
    fn into_response(self) -> Response {
        match self {
            GraphOperationResult::Graphs { graphs } => Json(graphs).into_response(),
            GraphOperationResult::GraphCreated { graph } => {
                (StatusCode::CREATED, Json(graph)).into_response()
            }
            GraphOperationResult::Graph { graph } => Json(graph).into_response(),
            GraphOperationResult::GraphDetail { detail } => Json(detail).into_response(),
            GraphOperationResult::NodeCreated { node } => {
                (StatusCode::CREATED, Json(node)).into_response()
            }
            GraphOperationResult::Node { node } => Json(node).into_response(),
            GraphOperationResult::EdgeCreated { edge } => {
                (StatusCode::CREATED, Json(edge)).into_response()
            }
            GraphOperationResult::Edge { edge } => Json(edge).into_response(),
            GraphOperationResult::Deleted => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

pub trait HasStore {
    fn store(&self) -> SharedStore;
}

pub trait HasIdentity {
    fn identity(&self) -> Arc<dyn IdentityVerifier>;
}

pub trait GraphApp: HasStore + HasIdentity {}

/// Concrete application state: one injected store and one identity verifier.
#[derive(Clone)]
pub struct AppState {
    store: SharedStore,
    identity: Arc<dyn IdentityVerifier>,
}

impl AppState {
    pub fn new(store: SharedStore, identity: Arc<dyn IdentityVerifier>) -> Self {
        Self { store, identity }
    }
}

impl HasStore for AppState {
    fn store(&self) -> SharedStore {
        SharedStore::clone(&self.store)
    }
}

impl HasIdentity for AppState {
    fn identity(&self) -> Arc<dyn IdentityVerifier> {
        Arc::clone(&self.identity)
    }
}

impl GraphApp for AppState {}

impl<S> FromRequestParts<S> for Caller
where
    S: GraphApp + Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let verifier = state.identity();
        Ok(resolve_caller(verifier.as_ref(), header).await)
    }
}

fn rejected(
    operation: &'static str,
    error: LibError,
    store_failure_status: StatusCode,
) -> AppError {
    let detail = format!("{:#}", error.source);
    tracing::error!(
        operation,
        kind = ?error.kind,
        code = error.code,
        error = %detail,
        "Graph request rejected before dispatch"
    );
    AppError::new(error, store_failure_status)
}

fn parse_id<T: FromStr>(raw: &str, entity: &'static str) -> Result<T, LibError>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|err| {
        LibError::invalid_with_code(
            "invalid_id",
            format!("Invalid {entity} id"),
            anyhow!("could not parse {} id '{}': {}", entity, raw, err),
        )
    })
}

fn path_id<T: FromStr>(
    raw: &str,
    entity: &'static str,
    operation: &'static str,
    store_failure_status: StatusCode,
) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    parse_id(raw, entity).map_err(|err| rejected(operation, err, store_failure_status))
}

fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    operation: &'static str,
    store_failure_status: StatusCode,
) -> Result<T, AppError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        rejected(
            operation,
            LibError::invalid_with_code(
                "invalid_json",
                rejection.body_text(),
                anyhow!("rejected request body: {}", rejection),
            ),
            store_failure_status,
        )
    })
}

/// An empty body creates a graph with every default.
fn graph_payload(body: &Bytes) -> Result<CreateGraphPayload, LibError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CreateGraphPayload::default());
    }
    serde_json::from_slice(body).map_err(|err| {
        LibError::invalid_with_code(
            "invalid_json",
            format!("Failed to parse the request body as JSON: {err}"),
            anyhow!("rejected graph body: {}", err),
        )
    })
}

async fn run<S>(
    app: &S,
    caller: Caller,
    operation: GraphOperation,
    store_failure_status: StatusCode,
) -> Result<Response, AppError>
where
    S: GraphApp,
{
    GraphOperations::new(app.store())
        .execute(caller, operation)
        .await
        .map(IntoResponse::into_response)
        .map_err(|error| AppError::new(error, store_failure_status))
}

async fn list_graphs_handler<S>(
    State(app): State<S>,
    caller: Caller,
) -> Result<Response, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    run(
        &app,
        caller,
        GraphOperation::ListGraphs,
        STORE_FAILURE_INTERNAL,
    )
    .await
}

async fn create_graph_handler<S>(
    State(app): State<S>,
    caller: Caller,
    body: Bytes,
) -> Result<Response, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    // Anonymous callers are turned away by the operation guard, so their body is
    // never decoded.
    let payload = match caller {
        Caller::Anonymous => CreateGraphPayload::default(),
        Caller::User(_) => graph_payload(&body)
            .map_err(|err| rejected("create_graph", err, STORE_FAILURE_INTERNAL))?,
    };
    run(
        &app,
        caller,
        GraphOperation::CreateGraph { payload },
        STORE_FAILURE_INTERNAL,
    )
    .await
}

async fn get_graph_handler<S>(
    State(app): State<S>,
    caller: Caller,
    Path(graph_id): Path<String>,
) -> Result<Response, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    // An id that cannot name a graph resolves to nothing.
    let graph_id: GraphId = parse_id(&graph_id, "graph").map_err(|err| {
        rejected(
            "get_graph",
            LibError::not_found("Graph not found", err.source),
            STORE_FAILURE_INTERNAL,
        )
    })?;
    run(
        &app,
        caller,
        GraphOperation::GetGraph { graph_id },
        STORE_FAILURE_INTERNAL,
    )
    .await
}

async fn update_graph_handler<S>(
    State(app): State<S>,
    caller: Caller,
    Path(graph_id): Path<String>,
    payload: Result<Json<GraphPatch>, JsonRejection>,
) -> Result<Response, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let graph_id: GraphId =
        path_id(&graph_id, "graph", "update_graph", STORE_FAILURE_BAD_REQUEST)?;
    let patch = match caller {
        Caller::Anonymous => GraphPatch::default(),
        Caller::User(_) => json_body(payload, "update_graph", STORE_FAILURE_BAD_REQUEST)?,
    };
    run(
        &app,
        caller,
        GraphOperation::UpdateGraph { graph_id, patch },
        STORE_FAILURE_BAD_REQUEST,
    )
    .await
}

async fn delete_graph_handler<S>(
    State(app): State<S>,
    caller: Caller,
    Path(graph_id): Path<String>,
) -> Result<Response, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let graph_id: GraphId =
        path_id(&graph_id, "graph", "delete_graph", STORE_FAILURE_BAD_REQUEST)?;
    run(
        &app,
        caller,
        GraphOperation::DeleteGraph { graph_id },
        STORE_FAILURE_BAD_REQUEST,
    )
    .await
}

async fn create_node_handler<S>(
    State(app): State<S>,
    caller: Caller,
    payload: Result<Json<CreateNodePayload>, JsonRejection>,
) -> Result<Response, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let payload = json_body(payload, "create_node", STORE_FAILURE_BAD_REQUEST)?;
    run(
        &app,
        caller,
        GraphOperation::CreateNode { payload },
        STORE_FAILURE_BAD_REQUEST,
    )
    .await
}

async fn update_node_handler<S>(
    State(app): State<S>,
    caller: Caller,
    Path(node_id): Path<String>,
    payload: Result<Json<NodePatch>, JsonRejection>,
) -> Result<Response, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let node_id: NodeId =
        path_id(&node_id, "node", "update_node", STORE_FAILURE_BAD_REQUEST)?;
    let patch = json_body(payload, "update_node", STORE_FAILURE_BAD_REQUEST)?;
    run(
        &app,
        caller,
        GraphOperation::UpdateNode { node_id, patch },
        STORE_FAILURE_BAD_REQUEST,
    )
    .await
}

async fn delete_node_handler<S>(
    State(app): State<S>,
    caller: Caller,
    Path(node_id): Path<String>,
) -> Result<Response, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let node_id: NodeId =
        path_id(&node_id, "node", "delete_node", STORE_FAILURE_BAD_REQUEST)?;
    run(
        &app,
        caller,
        GraphOperation::DeleteNode { node_id },
        STORE_FAILURE_BAD_REQUEST,
    )
    .await
}

async fn create_edge_handler<S>(
    State(app): State<S>,
    caller: Caller,
    payload: Result<Json<CreateEdgePayload>, JsonRejection>,
) -> Result<Response, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let payload = json_body(payload, "create_edge", STORE_FAILURE_BAD_REQUEST)?;
    run(
        &app,
        caller,
        GraphOperation::CreateEdge { payload },
        STORE_FAILURE_BAD_REQUEST,
    )
    .await
}

async fn update_edge_handler<S>(
    State(app): State<S>,
    caller: Caller,
    Path(edge_id): Path<String>,
    payload: Result<Json<EdgePatch>, JsonRejection>,
) -> Result<Response, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let edge_id: EdgeId =
        path_id(&edge_id, "edge", "update_edge", STORE_FAILURE_BAD_REQUEST)?;
    let patch = json_body(payload, "update_edge", STORE_FAILURE_BAD_REQUEST)?;
    run(
        &app,
        caller,
        GraphOperation::UpdateEdge { edge_id, patch },
        STORE_FAILURE_BAD_REQUEST,
    )
    .await
}

async fn delete_edge_handler<S>(
    State(app): State<S>,
    caller: Caller,
    Path(edge_id): Path<String>,
) -> Result<Response, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let edge_id: EdgeId =
        path_id(&edge_id, "edge", "delete_edge", STORE_FAILURE_BAD_REQUEST)?;
    run(
        &app,
        caller,
        GraphOperation::DeleteEdge { edge_id },
        STORE_FAILURE_BAD_REQUEST,
    )
    .await
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "ok": true
    }))
}

/// Graph, node and edge routes, relative to the API prefix. Every path is served
/// with and without a trailing slash.
pub fn routes<S>() -> Router<S>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    tracing::info!("Registering route /graphs/ [GET,POST]");
    tracing::info!("Registering route /graphs/{{graph_id}}/ [GET,PATCH,DELETE]");
    tracing::info!("Registering route /nodes/ [POST]");
    tracing::info!("Registering route /nodes/{{node_id}}/ [PATCH,DELETE]");
    tracing::info!("Registering route /edges/ [POST]");
    tracing::info!("Registering route /edges/{{edge_id}}/ [PATCH,DELETE]");

    let mut router = Router::new();
    for suffix in ["", "/"] {
        router = router
            .route(
                &format!("/graphs{suffix}"),
                get(list_graphs_handler::<S>).post(create_graph_handler::<S>),
            )
            .route(
                &format!("/graphs/{{graph_id}}{suffix}"),
                get(get_graph_handler::<S>)
                    .patch(update_graph_handler::<S>)
                    .delete(delete_graph_handler::<S>),
            )
            .route(&format!("/nodes{suffix}"), post(create_node_handler::<S>))
            .route(
                &format!("/nodes/{{node_id}}{suffix}"),
                patch(update_node_handler::<S>).delete(delete_node_handler::<S>),
            )
            .route(&format!("/edges{suffix}"), post(create_edge_handler::<S>))
            .route(
                &format!("/edges/{{edge_id}}{suffix}"),
                patch(update_edge_handler::<S>).delete(delete_edge_handler::<S>),
            );
    }
    router
}

/// The full application: `/api/...` routes, `/healthz` and request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .nest("/api", routes::<AppState>())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_error(kind_error: LibError, store_status: StatusCode) -> AppError {
        AppError::new(kind_error, store_status)
    }

    #[test]
    fn store_failures_use_route_status() {
        let internal = app_error(
            LibError::database("Failed to list graphs", anyhow!("connection reset")),
            STORE_FAILURE_INTERNAL,
        );
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bad_request = app_error(
            LibError::database("Failed to delete graph", anyhow!("connection reset")),
            STORE_FAILURE_BAD_REQUEST,
        );
        assert_eq!(bad_request.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn client_errors_ignore_route_status() {
        let unauthorized = app_error(
            LibError::unauthorized("Authentication required", anyhow!("anonymous")),
            STORE_FAILURE_BAD_REQUEST,
        );
        assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);

        let not_found = app_error(
            LibError::not_found("Graph not found", anyhow!("missing")),
            STORE_FAILURE_BAD_REQUEST,
        );
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn empty_graph_body_uses_defaults() {
        let payload = graph_payload(&Bytes::from_static(b" \n")).expect("empty body");
        assert_eq!(payload.name, None);
        assert_eq!(payload.description, None);

        let payload = graph_payload(&Bytes::from_static(br#"{"name":"Roads"}"#)).expect("body");
        assert_eq!(payload.name.as_deref(), Some("Roads"));
    }

    #[test]
    fn malformed_graph_body_is_invalid_json() {
        let err = graph_payload(&Bytes::from_static(b"{name")).expect_err("bad body");
        assert_eq!(err.code, "invalid_json");
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }

    #[test]
    fn parse_id_rejects_garbage() {
        let err = parse_id::<GraphId>("not-a-uuid", "graph").expect_err("bad id");
        assert_eq!(err.code, "invalid_id");
        assert_eq!(err.public, "Invalid graph id");
    }
}
