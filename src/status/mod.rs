use anyhow::Context;
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::guard::JobGuard;
use crate::utils::format_uptime;
use crate::Result;

/// How the bot receives updates from Telegram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Polling,
    Webhook,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Polling => "polling",
            TransportMode::Webhook => "webhook",
        }
    }
}

/// Process-wide counters shared by the pipeline, the /status command and the status page
#[derive(Debug)]
pub struct Stats {
    started_at: Instant,
    started_wall: DateTime<Utc>,
    successful_downloads: AtomicU64,
    mode: TransportMode,
}

impl Stats {
    pub fn new(mode: TransportMode) -> Arc<Self> {
        Arc::new(Self {
            started_at: Instant::now(),
            started_wall: Utc::now(),
            successful_downloads: AtomicU64::new(0),
            mode,
        })
    }

    pub fn record_success(&self) {
        self.successful_downloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn successful_downloads(&self) -> u64 {
        self.successful_downloads.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_wall
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }
}

#[derive(Clone)]
pub struct StatusState {
    stats: Arc<Stats>,
    guard: Arc<JobGuard>,
}

impl StatusState {
    pub fn new(stats: Arc<Stats>, guard: Arc<JobGuard>) -> Self {
        Self { stats, guard }
    }

    pub fn report(&self) -> StatusReport {
        StatusReport {
            status: "ok".to_string(),
            started_at: self.stats.started_at(),
            uptime_secs: self.stats.uptime().as_secs(),
            successful_downloads: self.stats.successful_downloads(),
            active_downloads: self.guard.active_count(),
            mode: self.stats.mode(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub successful_downloads: u64,
    pub active_downloads: usize,
    pub mode: TransportMode,
}

/// Routes for the status page, mergeable into the webhook server
pub fn router(state: StatusState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .with_state(state)
}

/// Serve the status page on its own listener (polling mode)
pub async fn serve(state: StatusState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting status page on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, router(state))
        .await
        .context("Status server error")?;

    Ok(())
}

async fn health(State(state): State<StatusState>) -> Json<StatusReport> {
    Json(state.report())
}

async fn index(State(state): State<StatusState>) -> Html<String> {
    Html(render_page(&state.report()))
}

fn render_page(report: &StatusReport) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>YouTube Music Bot</title>
<style>
body {{ font-family: sans-serif; max-width: 40em; margin: 3em auto; color: #222; }}
dt {{ font-weight: bold; }}
dd {{ margin: 0 0 1em 0; }}
</style>
</head>
<body>
<h1>🎵 YouTube Music Bot</h1>
<p>Status: <strong>{status}</strong></p>
<dl>
<dt>Uptime</dt><dd>{uptime}</dd>
<dt>Started</dt><dd>{started}</dd>
<dt>Downloads completed</dt><dd>{successful}</dd>
<dt>Downloads in progress</dt><dd>{active}</dd>
<dt>Mode</dt><dd>{mode}</dd>
</dl>
</body>
</html>
"#,
        status = report.status,
        uptime = format_uptime(report.uptime_secs),
        started = report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        successful = report.successful_downloads,
        active = report.active_downloads,
        mode = report.mode.as_str(),
    )
}
