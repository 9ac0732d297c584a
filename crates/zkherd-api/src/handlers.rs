//! Control API handlers.
//!
//! Each handler resolves to a JSON server view. Parse errors answer 400;
//! unknown ids answer 200 with a synthetic `Unknown` server.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use zkherd_model::ServerState;
use zkherd_scheduler::{AddServerRequest, ServerView};

use crate::ApiState;

fn error_response(msg: &str) -> impl IntoResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": msg })),
    )
}

/// Query parameters for `/api/add`.
#[derive(Debug, Deserialize)]
pub struct AddParams {
    pub id: String,
    pub cpu: Option<f64>,
    pub mem: Option<f64>,
    pub constraints: Option<String>,
    pub configchangebackoff: Option<u64>,
}

/// Query parameter shared by the single-server endpoints.
#[derive(Debug, Deserialize)]
pub struct IdParam {
    pub id: String,
}

/// GET /api/add
pub async fn add(
    State(state): State<ApiState>,
    Query(params): Query<AddParams>,
) -> impl IntoResponse {
    let req = AddServerRequest {
        id: params.id,
        cpus: params.cpu,
        mem: params.mem,
        constraints: params.constraints,
        config_change_backoff: params.configchangebackoff,
    };
    match state.scheduler.add_server(&req).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => error_response(&e.to_string()).into_response(),
    }
}

/// GET /api/start — make the server eligible for offers (`Added` →
/// `Stopped`). The verb is historical: `Stopped` is the launchable state,
/// and the next matching offer starts the server for real.
pub async fn start(
    State(state): State<ApiState>,
    Query(params): Query<IdParam>,
) -> impl IntoResponse {
    match state.scheduler.start_server(&params.id).await {
        Some(view) => Json(view),
        None => Json(ServerView::unknown(&params.id)),
    }
}

/// GET /api/stop
pub async fn stop(
    State(state): State<ApiState>,
    Query(params): Query<IdParam>,
) -> impl IntoResponse {
    match state.scheduler.stop_server(&params.id).await {
        Some(view) => Json(view),
        None => Json(ServerView::unknown(&params.id)),
    }
}

/// GET /api/remove
pub async fn remove(
    State(state): State<ApiState>,
    Query(params): Query<IdParam>,
) -> impl IntoResponse {
    match state.scheduler.remove_server(&params.id).await {
        Some(view) => Json(view),
        None => Json(ServerView::unknown(&params.id)),
    }
}

/// GET /api/config — merge recognized option keys into the server's
/// configuration. Unrecognized keys are logged and ignored by the
/// scheduler.
pub async fn config(
    State(state): State<ApiState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(id) = params.get("id").cloned() else {
        return error_response("missing parameter: id").into_response();
    };
    let options: BTreeMap<String, String> = params
        .into_iter()
        .filter(|(key, _)| key != "id")
        .collect();

    match state.scheduler.configure_server(&id, &options).await {
        Some(view) => Json(view).into_response(),
        None => Json(ServerView::unknown(&id)).into_response(),
    }
}

/// Response body of `/api/status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub servers: Vec<ServerView>,
}

/// GET /api/status — all servers, each enriched with the supervised node's
/// own view of the ensemble when it is reachable.
pub async fn status(State(state): State<ApiState>) -> impl IntoResponse {
    let mut servers = state.scheduler.cluster_view().await;
    for view in &mut servers {
        view.ensemble = ensemble_status(&state.client, view).await;
    }
    Json(StatusResponse { servers })
}

/// Best-effort poll of one supervised node's cluster status endpoint.
async fn ensemble_status(
    client: &reqwest::Client,
    view: &ServerView,
) -> Option<serde_json::Value> {
    if view.state != ServerState::Running {
        return None;
    }
    let hostname = view.hostname.as_deref()?;
    let port = view.exhibitor_options.get("port")?;
    let url = format!("http://{hostname}:{port}/exhibitor/v1/cluster/status");

    let response = client
        .get(&url)
        .timeout(Duration::from_secs(2))
        .send()
        .await;
    match response {
        Ok(resp) => resp.json().await.ok(),
        Err(e) => {
            debug!(server = %view.id, error = %e, "ensemble status unreachable");
            None
        }
    }
}
