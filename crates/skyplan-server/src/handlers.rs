//! REST API handlers for the Skyplan server

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use skyplan_core::{
    ChangeSummary, CodeLanguage, DesignEngine, DesignError, Edge, EdgeChange, Node, NodeChange, NodeData,
    NodeDataPatch, NodeId, NodeKind, Position, PropertyValue,
};

use crate::ServerState;

/// An error response: status code plus `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }

    fn unknown_node(id: &NodeId) -> Self {
        DesignError::UnknownNode(id.clone()).into()
    }
}

impl From<DesignError> for ApiError {
    fn from(e: DesignError) -> Self {
        let status = match &e {
            DesignError::UnknownNode(_) => StatusCode::NOT_FOUND,
            DesignError::SelfParent(_)
            | DesignError::WouldCycle { .. }
            | DesignError::ContainmentViolation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            DesignError::Io(_) | DesignError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// The whole document plus engine-side UI state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignResponse {
    pub design_name: String,
    pub design_id: Option<String>,
    pub dirty: bool,
    pub last_saved_at: Option<String>,
    pub language: CodeLanguage,
    pub selected_node: Option<NodeId>,
    pub panel_open: bool,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl DesignResponse {
    pub fn from_engine(engine: &DesignEngine) -> Self {
        let document = engine.document();
        let (nodes, edges) = document.graph().to_parts();
        DesignResponse {
            design_name: document.name().to_string(),
            design_id: document.design_id().map(str::to_string),
            dirty: document.is_dirty(),
            last_saved_at: document.last_saved_at().map(|t| t.to_rfc3339()),
            language: engine.language(),
            selected_node: engine.selected_node().cloned(),
            panel_open: engine.is_panel_open(),
            nodes,
            edges,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeRequest {
    /// Generated when absent.
    #[serde(default)]
    pub id: Option<NodeId>,
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub position: Position,
    pub data: NodeData,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub cascade: bool,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: Vec<NodeId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRequest {
    /// `null` detaches.
    #[serde(default)]
    pub parent_id: Option<NodeId>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub source: NodeId,
    pub target: NodeId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    #[serde(default)]
    pub node_id: Option<NodeId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResponse {
    pub selected_node: Option<NodeId>,
    pub panel_open: bool,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LanguageRequest {
    pub language: CodeLanguage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRequest {
    pub design_id: String,
}

fn node_json(engine: &DesignEngine, id: &NodeId) -> ApiResult<Json<Node>> {
    engine
        .node(id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::unknown_node(id))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    let health = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    Json(health)
}

/// Get the current design as JSON
pub async fn get_design(State(state): State<Arc<ServerState>>) -> Json<DesignResponse> {
    let engine = state.engine.read().await;
    Json(DesignResponse::from_engine(&engine))
}

/// The VPC → subnet → service outline consumed by the code generators
pub async fn get_hierarchy(State(state): State<Arc<ServerState>>) -> ApiResult<Json<serde_json::Value>> {
    let engine = state.engine.read().await;
    let outline = serde_json::to_value(engine.vpc_hierarchy()).map_err(DesignError::from)?;
    Ok(Json(outline))
}

pub async fn create_node(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<CreateNodeRequest>,
) -> ApiResult<(StatusCode, Json<Node>)> {
    let mut engine = state.engine.write().await;
    let id = req.id.unwrap_or_else(|| engine.next_node_id());
    if engine.node(&id).is_some() {
        return Err(ApiError::new(StatusCode::CONFLICT, format!("node {} already exists", id)));
    }

    let mut node = Node::new(id.clone(), req.kind, req.data);
    node.position = req.position;
    if let Some(parent) = req.parent_id {
        if parent == id {
            return Err(DesignError::SelfParent(id).into());
        }
        let parent_kind = engine
            .node(&parent)
            .map(|n| n.kind)
            .ok_or_else(|| ApiError::unknown_node(&parent))?;
        engine.policy().check(parent_kind, node.kind)?;
        node = node.inside(parent);
    }
    engine.add_node(node);
    let Json(node) = node_json(&engine, &id)?;
    Ok((StatusCode::CREATED, Json(node)))
}

/// `?cascade=true` removes the whole subtree.
pub async fn delete_node(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<RemovedResponse>> {
    let id = NodeId::from(id);
    let mut engine = state.engine.write().await;
    let removed = if query.cascade {
        engine.remove_node_with_children(&id)
    } else {
        engine.remove_node(&id).map(|n| vec![n.id]).unwrap_or_default()
    };
    if removed.is_empty() {
        return Err(ApiError::unknown_node(&id));
    }
    Ok(Json(RemovedResponse { removed }))
}

pub async fn update_node_data(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(patch): Json<NodeDataPatch>,
) -> ApiResult<Json<Node>> {
    let id = NodeId::from(id);
    let mut engine = state.engine.write().await;
    if engine.node(&id).is_none() {
        return Err(ApiError::unknown_node(&id));
    }
    engine.update_node_data(&id, patch);
    node_json(&engine, &id)
}

pub async fn set_node_property(
    State(state): State<Arc<ServerState>>,
    Path((id, key)): Path<(String, String)>,
    Json(value): Json<PropertyValue>,
) -> ApiResult<Json<Node>> {
    let id = NodeId::from(id);
    let mut engine = state.engine.write().await;
    if engine.node(&id).is_none() {
        return Err(ApiError::unknown_node(&id));
    }
    engine.update_node_property(&id, key, value);
    node_json(&engine, &id)
}

pub async fn set_node_parent(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(req): Json<ParentRequest>,
) -> ApiResult<Json<Node>> {
    let id = NodeId::from(id);
    let mut engine = state.engine.write().await;
    for known in std::iter::once(&id).chain(req.parent_id.as_ref()) {
        if engine.node(known).is_none() {
            return Err(ApiError::unknown_node(known));
        }
    }
    engine.set_parent(&id, req.parent_id.as_ref())?;
    node_json(&engine, &id)
}

pub async fn create_edge(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<ConnectRequest>,
) -> ApiResult<(StatusCode, Json<Edge>)> {
    let mut engine = state.engine.write().await;
    let missing = [&req.source, &req.target].into_iter().find(|id| engine.node(id).is_none());
    if let Some(id) = missing {
        return Err(ApiError::unknown_node(id));
    }
    let edge = engine
        .connect(&req.source, &req.target)
        .and_then(|edge_id| engine.graph().edge(&edge_id).cloned())
        .ok_or_else(|| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "edge was not created"))?;
    Ok((StatusCode::CREATED, Json(edge)))
}

pub async fn apply_node_changes(
    State(state): State<Arc<ServerState>>,
    Json(changes): Json<Vec<NodeChange>>,
) -> Json<ChangeSummary> {
    let mut engine = state.engine.write().await;
    Json(engine.apply_node_changes(&changes))
}

pub async fn apply_edge_changes(
    State(state): State<Arc<ServerState>>,
    Json(changes): Json<Vec<EdgeChange>>,
) -> Json<ChangeSummary> {
    let mut engine = state.engine.write().await;
    Json(engine.apply_edge_changes(&changes))
}

pub async fn select_node(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<SelectRequest>,
) -> ApiResult<Json<SelectionResponse>> {
    let mut engine = state.engine.write().await;
    if let Some(id) = &req.node_id {
        if engine.node(id).is_none() {
            return Err(ApiError::unknown_node(id));
        }
    }
    engine.select_node(req.node_id.as_ref());
    Ok(Json(SelectionResponse {
        selected_node: engine.selected_node().cloned(),
        panel_open: engine.is_panel_open(),
    }))
}

pub async fn rename_design(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<RenameRequest>,
) -> Json<DesignResponse> {
    let mut engine = state.engine.write().await;
    engine.set_design_name(req.name);
    Json(DesignResponse::from_engine(&engine))
}

pub async fn set_language(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<LanguageRequest>,
) -> Json<DesignResponse> {
    let mut engine = state.engine.write().await;
    engine.set_language(req.language);
    Json(DesignResponse::from_engine(&engine))
}

pub async fn clear_design(State(state): State<Arc<ServerState>>) -> Json<DesignResponse> {
    let mut engine = state.engine.write().await;
    engine.clear_canvas();
    Json(DesignResponse::from_engine(&engine))
}

pub async fn mark_saved(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<SavedRequest>,
) -> Json<DesignResponse> {
    let mut engine = state.engine.write().await;
    engine.mark_saved(req.design_id);
    Json(DesignResponse::from_engine(&engine))
}
