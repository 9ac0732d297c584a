//! zkherd-api — the control-plane HTTP API.
//!
//! Translates operator intent into mutations on the scheduler's cluster.
//! All endpoints are GET with query parameters and all responses are JSON;
//! unknown server ids answer 200 with a synthetic `Unknown` server so
//! operator tooling keeps a uniform response shape.
//!
//! | Path | Query | Effect |
//! |---|---|---|
//! | `/api/add` | `id`, opt `cpu`, `mem`, `constraints`, `configchangebackoff` | declare a server (state `Added`) |
//! | `/api/start` | `id` | make it eligible for offers |
//! | `/api/stop` | `id` | kill its task; it lands back in `Added` |
//! | `/api/remove` | `id` | stop if needed, then forget it |
//! | `/api/config` | `id` + recognized option keys | merge supervisor options / shared overrides |
//! | `/api/status` | — | all servers, with each node's ensemble view when reachable |

pub mod handlers;

use axum::routing::get;
use axum::Router;

use zkherd_scheduler::Scheduler;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Scheduler,
    /// Client for polling supervised nodes during `/api/status`.
    pub client: reqwest::Client,
}

impl ApiState {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            client: reqwest::Client::new(),
        }
    }
}

/// Build the control-plane router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/add", get(handlers::add))
        .route("/api/start", get(handlers::start))
        .route("/api/stop", get(handlers::stop))
        .route("/api/remove", get(handlers::remove))
        .route("/api/config", get(handlers::config))
        .route("/api/status", get(handlers::status))
        .with_state(state)
}
