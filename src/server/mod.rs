//! Headless HTTP surface: the same pipeline as the viewer, returning layout,
//! draw batches and menus as JSON.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::TopologySettings;
use crate::interaction::TopologyController;
use crate::layout::{LayoutConfig, TopologyLayout, Viewport};
use crate::menu::MenuEntry;
use crate::render::commands::DrawCommandBatch;
use crate::render::shapes::ShapeRegistry;
use crate::render::{Theme, TopologyRenderer};
use crate::topology::snapshot::snapshot_from_value;
use crate::topology::{NodeKind, TopologyModelBuilder};

#[derive(Clone)]
struct AppState {
    auto_expand_threshold: usize,
    default_cluster_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RenderRequest {
    pub clusters: serde_json::Value,
    #[serde(default)]
    pub current_cluster_id: Option<String>,
    /// Collapse flags to apply on top of the built-in defaults.
    #[serde(default)]
    pub collapsed: BTreeMap<String, bool>,
    #[serde(default)]
    pub viewport: Option<Viewport>,
    #[serde(default)]
    pub layout: Option<LayoutConfig>,
    #[serde(default)]
    pub theme: Option<Theme>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResponse {
    pub current_cluster_id: Option<String>,
    pub layout: TopologyLayout,
    pub batch: DrawCommandBatch,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MenuRequest {
    pub clusters: serde_json::Value,
    #[serde(default)]
    pub current_cluster_id: Option<String>,
    pub node_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuResponse {
    pub node_id: String,
    pub kind: NodeKind,
    pub entries: Vec<MenuEntry>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
}

pub async fn run_http_server(settings: &TopologySettings, bind: &str) -> Result<()> {
    let state = AppState {
        auto_expand_threshold: settings.auto_expand_threshold,
        default_cluster_id: settings.current_cluster_id.clone(),
    };
    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/render", post(handle_render))
        .route("/menu", post(handle_menu))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind HTTP server to `{bind}`"))?;
    let local_addr = listener.local_addr().ok();

    info!(
        requested_bind = %bind,
        bound_addr = local_addr.map(|addr| addr.to_string()),
        auto_expand_threshold = settings.auto_expand_threshold,
        "starting HTTP server"
    );

    axum::serve(listener, app)
        .await
        .context("HTTP server exited with an error")
}

async fn handle_health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn handle_render(State(state): State<AppState>, Json(req): Json<RenderRequest>) -> Response {
    into_response("render", render_topology(&state, req))
}

async fn handle_menu(State(state): State<AppState>, Json(req): Json<MenuRequest>) -> Response {
    into_response("menu", resolve_menu(&state, req))
}

fn into_response<T: Serialize>(route: &'static str, result: Result<T>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(error) => {
            let details = error_details(&error);
            let status = status_code_for_error(&details);
            warn!(
                route,
                status = status.as_u16(),
                error = %error,
                "HTTP request failed"
            );
            (status, Json(ErrorBody { error: details })).into_response()
        }
    }
}

fn render_topology(state: &AppState, req: RenderRequest) -> Result<RenderResponse> {
    let clusters = snapshot_from_value(req.clusters).context("invalid render request")?;
    let renderer = TopologyRenderer::new(req.theme.unwrap_or_default(), ShapeRegistry::standard());
    let mut controller = TopologyController::new(
        TopologyModelBuilder::new(state.auto_expand_threshold),
        req.layout.unwrap_or_default(),
        renderer,
        req.current_cluster_id.or_else(|| state.default_cluster_id.clone()),
        req.viewport.unwrap_or_default(),
    );
    controller.apply_snapshot(&clusters, None);

    for (node_id, collapsed) in &req.collapsed {
        match controller.tree().find(node_id).and_then(|node| node.collapsed) {
            Some(current) if current != *collapsed => {
                controller.toggle_collapse(node_id);
            }
            Some(_) => {}
            None => debug!(node_id = %node_id, "ignoring collapse override for unknown node"),
        }
    }

    Ok(RenderResponse {
        current_cluster_id: controller.tree().current_cluster_id.clone(),
        batch: controller.render(),
        layout: controller.layout().clone(),
    })
}

fn resolve_menu(state: &AppState, req: MenuRequest) -> Result<MenuResponse> {
    let clusters = snapshot_from_value(req.clusters).context("invalid menu request")?;
    let mut controller = TopologyController::with_defaults(
        req.current_cluster_id.or_else(|| state.default_cluster_id.clone()),
        Viewport::default(),
    );
    controller.apply_snapshot(&clusters, None);

    let kind = controller
        .tree()
        .find(&req.node_id)
        .map(|node| node.kind)
        .ok_or_else(|| anyhow!("unknown node `{}`", req.node_id))?;
    let entries = controller
        .resolve_menu(&req.node_id)
        .ok_or_else(|| anyhow!("unknown node `{}`", req.node_id))?;

    Ok(MenuResponse {
        node_id: req.node_id,
        kind,
        entries,
    })
}

fn error_details(error: &anyhow::Error) -> String {
    error
        .chain()
        .map(std::string::ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

fn status_code_for_error(details: &str) -> StatusCode {
    let normalized = details.to_ascii_lowercase();

    if contains_any(
        &normalized,
        &[
            "failed to parse snapshot",
            "invalid render request",
            "invalid menu request",
            "unknown node `",
        ],
    ) {
        return StatusCode::BAD_REQUEST;
    }

    StatusCode::INTERNAL_SERVER_ERROR
}

fn contains_any(details: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| details.contains(needle))
}
