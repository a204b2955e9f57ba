//! HTTP surface: a static page, the static directory, the generated downloads and a single
//! `POST /research` endpoint running the whole pipeline.

use crate::assistant::{ResearchAssistant, ResearchRequest};
use crate::config::Config;
use crate::error::Error;
use crate::export::{ExportArtifact, Exporter};
use crate::output::{self, ResearchResult};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

const INDEX_HTML: &str = include_str!("../static/index.html");

pub struct AppState {
    pub assistant: ResearchAssistant,
    pub exporter: Exporter,
}

#[derive(Debug, Deserialize)]
pub struct ResearchBody {
    #[serde(default = "default_name")]
    pub name: String,
    pub query: String,
}

fn default_name() -> String {
    "User".to_string()
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ResearchResponse {
    pub topic: String,
    pub summary: String,
    pub sources: Vec<String>,
    pub tools_used: Vec<String>,
    pub pdf_path: Option<String>,
    pub txt_path: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        if let Error::Parse(parse) = &err {
            tracing::warn!(raw = %parse.raw, "model output did not match the schema");
        }
        tracing::error!(error = %err, "research request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Relative link under `/downloads` for a file in the downloads directory.
fn download_link(path: &Path) -> String {
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("/downloads/{}", file)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// File writes and pdf rendering run on the blocking pool.
async fn export_blocking(
    state: Arc<AppState>,
    result: ResearchResult,
    requester_name: String,
) -> Result<(ResearchResult, ExportArtifact), Error> {
    tokio::task::spawn_blocking(move || -> Result<_, Error> {
        let artifact = state.exporter.export(&result, &requester_name)?;
        Ok((result, artifact))
    })
    .await
    .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

pub async fn research(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResearchBody>,
) -> Result<Json<ResearchResponse>, ApiError> {
    if body.query.trim().is_empty() {
        return Err(ApiError {
            status: StatusCode::BAD_REQUEST,
            message: "query must not be empty".to_string(),
        });
    }

    let request = ResearchRequest {
        requester_name: body.name,
        query: body.query,
    };

    let invocation = state.assistant.invoke(&request).await?;
    tracing::info!(tools = ?invocation.tools_invoked, "research finished");
    let result = output::parse(&invocation.raw).map_err(Error::from)?;
    let (result, artifact) = export_blocking(state, result, request.requester_name).await?;

    Ok(Json(ResearchResponse {
        txt_path: download_link(&artifact.text_path),
        pdf_path: artifact.pdf_path.as_deref().map(download_link),
        topic: result.topic,
        summary: result.summary,
        sources: result.sources,
        tools_used: result.tools_used,
    }))
}

pub fn router(state: Arc<AppState>, static_dir: &Path) -> Router {
    let downloads = ServeDir::new(state.exporter.downloads_dir());

    Router::new()
        .route("/", get(index))
        .route("/research", post(research))
        .nest_service("/static", ServeDir::new(static_dir))
        .nest_service("/downloads", downloads)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

pub async fn serve(config: &Config, host: &str, port: u16) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        assistant: ResearchAssistant::from_config(config),
        exporter: Exporter::new(&config.downloads_dir),
    });
    std::fs::create_dir_all(&config.downloads_dir)?;

    let app = router(state, &config.static_dir);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, provider = ?config.provider, model = %config.model, "research server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
