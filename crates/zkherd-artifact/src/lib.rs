//! zkherd-artifact — the artifact download endpoint used by executors.
//!
//! Serves the already-resolved distribution files a task sandbox fetches
//! before launch: the framework binary, the Exhibitor and ZooKeeper
//! distributions, a JDK, and optionally S3 credentials and a default
//! supervisor config. Nothing else is reachable; each route serves exactly
//! the file registered at startup.

use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use thiserror::Error;
use tracing::{info, warn};

use zkherd_model::ArtifactSet;

/// Result type alias for artifact operations.
pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Errors raised while building the artifact index.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact missing on disk: {0}")]
    Missing(PathBuf),

    #[error("artifact has no file name: {0}")]
    NoFileName(PathBuf),
}

/// The set of files the endpoint serves, validated at startup.
#[derive(Debug, Clone)]
pub struct ArtifactIndex {
    jar: PathBuf,
    exhibitor: PathBuf,
    zookeeper: PathBuf,
    jdk: PathBuf,
    s3credentials: Option<PathBuf>,
    defaultconfig: Option<PathBuf>,
}

impl ArtifactIndex {
    /// Build the index. Every given path must exist on disk; a missing
    /// artifact is fatal and the daemon refuses to start.
    pub fn new(
        jar: PathBuf,
        exhibitor: PathBuf,
        zookeeper: PathBuf,
        jdk: PathBuf,
        s3credentials: Option<PathBuf>,
        defaultconfig: Option<PathBuf>,
    ) -> ArtifactResult<Self> {
        for path in [&jar, &exhibitor, &zookeeper, &jdk]
            .into_iter()
            .chain(s3credentials.iter())
            .chain(defaultconfig.iter())
        {
            if !path.is_file() {
                return Err(ArtifactError::Missing(path.clone()));
            }
            file_name(path)?;
        }
        info!(?jar, ?exhibitor, ?zookeeper, ?jdk, "artifact index built");
        Ok(Self {
            jar,
            exhibitor,
            zookeeper,
            jdk,
            s3credentials,
            defaultconfig,
        })
    }

    /// The artifact file names, paired with the endpoint base URL, in the
    /// form executor descriptors embed.
    pub fn artifact_set(&self, base_url: &str) -> ArtifactResult<ArtifactSet> {
        Ok(ArtifactSet {
            base_url: base_url.trim_end_matches('/').to_string(),
            jar: file_name(&self.jar)?,
            exhibitor: file_name(&self.exhibitor)?,
            zookeeper: file_name(&self.zookeeper)?,
            jdk: file_name(&self.jdk)?,
            s3credentials: self
                .s3credentials
                .as_deref()
                .map(|p| file_name(p))
                .transpose()?,
            defaultconfig: self
                .defaultconfig
                .as_deref()
                .map(|p| file_name(p))
                .transpose()?,
        })
    }

    /// Resolve a route category and requested name to the registered file.
    /// Only the exact registered file name is served.
    fn lookup(&self, category: &str, name: &str) -> Option<&FsPath> {
        let path = match category {
            "jar" => Some(self.jar.as_path()),
            "exhibitor" => Some(self.exhibitor.as_path()),
            "zookeeper" => Some(self.zookeeper.as_path()),
            "jdk" => Some(self.jdk.as_path()),
            "s3credentials" => self.s3credentials.as_deref(),
            "defaultconfig" => self.defaultconfig.as_deref(),
            _ => None,
        }?;
        (path.file_name().and_then(|n| n.to_str()) == Some(name)).then_some(path)
    }
}

fn file_name(path: &FsPath) -> ArtifactResult<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| ArtifactError::NoFileName(path.to_path_buf()))
}

/// Build the artifact router.
pub fn build_router(index: ArtifactIndex) -> Router {
    Router::new()
        .route("/{category}/{name}", get(download))
        .with_state(Arc::new(index))
}

/// GET /{category}/{name} — stream the registered file as an attachment.
async fn download(
    State(index): State<Arc<ArtifactIndex>>,
    Path((category, name)): Path<(String, String)>,
) -> Response {
    let Some(path) = index.lookup(&category, &name) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match tokio::fs::read(path).await {
        Ok(bytes) => (
            [
                ("content-type", "application/octet-stream".to_string()),
                (
                    "content-disposition",
                    format!("attachment; filename=\"{name}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            warn!(%category, %name, error = %e, "artifact read failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
