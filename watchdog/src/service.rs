//! Stream workers, report writer and status API
//!
//! Each ingestion stream gets its own blocking worker. All workers share one
//! `Arc<Pipeline>` and forward reports over a bounded channel to a single
//! writer that emits one JSON object per line.

use crate::pipeline::{DropCounters, Pipeline};
use anomaly_scorer::AnomalyReport;
use axum::{extract::State, routing::get, Json, Router};
use link_layer::RawFrame;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

pub const REPORT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub streams: usize,
    pub frames: usize,
    pub reports: usize,
    pub anomalies: usize,
}

fn write_reports<W: Write>(
    mut rx: mpsc::Receiver<AnomalyReport>,
    mut sink: W,
) -> Result<(usize, usize), ServiceError> {
    let (mut reports, mut anomalies) = (0, 0);
    while let Some(report) = rx.blocking_recv() {
        serde_json::to_writer(&mut sink, &report)?;
        sink.write_all(b"\n")?;
        reports += 1;
        if !report.nominal {
            anomalies += 1;
        }
    }
    sink.flush()?;
    Ok((reports, anomalies))
}

/// Run every stream to completion and write all reports to `sink`
pub async fn run_streams<W>(
    pipeline: Arc<Pipeline>,
    streams: Vec<Vec<RawFrame>>,
    sink: W,
) -> Result<RunSummary, ServiceError>
where
    W: Write + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<AnomalyReport>(REPORT_CHANNEL_CAPACITY);
    let writer = tokio::task::spawn_blocking(move || write_reports(rx, sink));

    let stream_count = streams.len();
    let mut workers = Vec::with_capacity(stream_count);
    for (stream, frames) in streams.into_iter().enumerate() {
        let pipeline = Arc::clone(&pipeline);
        let tx = tx.clone();
        workers.push(tokio::task::spawn_blocking(move || {
            let total = frames.len();
            for frame in &frames {
                if let Some(report) = pipeline.process(frame).into_report() {
                    if tx.blocking_send(report).is_err() {
                        warn!(stream, "report writer closed, stopping stream");
                        break;
                    }
                }
            }
            info!(stream, frames = total, "stream finished");
            total
        }));
    }
    drop(tx);

    let mut frames = 0;
    for worker in workers {
        frames += worker.await?;
    }
    let (reports, anomalies) = writer.await??;

    Ok(RunSummary {
        streams: stream_count,
        frames,
        reports,
        anomalies,
    })
}

#[derive(Clone)]
pub struct StatusState {
    pub counters: Arc<DropCounters>,
    pub satellites: usize,
    pub models: usize,
}

impl StatusState {
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        Self {
            counters: pipeline.counters(),
            satellites: pipeline.registry().len(),
            models: pipeline.bank().len(),
        }
    }
}

pub fn status_router(state: StatusState) -> Router {
    let api = Router::new()
        .route("/drops", get(drops))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health))
        .with_state(state)
        .nest("/api/v1", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<StatusState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "watchdog",
        "satellites": state.satellites,
        "models": state.models,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn drops(State(state): State<StatusState>) -> Json<serde_json::Value> {
    let snapshot = state.counters.snapshot();
    Json(serde_json::json!({
        "total_dropped": snapshot.total_dropped(),
        "counters": snapshot,
    }))
}

pub async fn serve_status(port: u16, state: StatusState) -> Result<(), ServiceError> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("status API listening on {}", addr);
    axum::serve(listener, status_router(state)).await?;
    Ok(())
}
