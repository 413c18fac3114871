//! Web server entrypoints live here.

use std::{future::Future, net::SocketAddr, time::Duration};

use axum::{
    Json, Router,
    extract::{Form, Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::{net::TcpListener, sync::watch};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::paths::AppPaths;
use crate::services::jobs::JobState;
use crate::services::worker::WorkerPool;

const HEALTHZ_PATH: &str = "/v1/healthz";
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ShutdownEvent {
    Pending,
    CtrlC,
    SigTerm,
    ListenerFailed,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("listen address may not be empty")]
    EmptyListenAddr,
    #[error("invalid listen address `{address}`: {source}")]
    InvalidListenAddr {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to determine local address: {source}")]
    LocalAddr {
        #[source]
        source: std::io::Error,
    },
    #[error("axum server error: {source}")]
    Serve {
        #[source]
        source: std::io::Error,
    },
}

/// Shared handler state: the worker pool (which owns the job store) and the
/// artifact paths. Passed explicitly; no process-wide singleton.
#[derive(Clone)]
pub struct AppState {
    pool: WorkerPool,
    paths: AppPaths,
}

impl AppState {
    pub fn new(pool: WorkerPool, paths: AppPaths) -> Self {
        Self { pool, paths }
    }
}

#[derive(Debug, Deserialize)]
struct JobForm {
    city: String,
    #[serde(default)]
    task: String,
}

pub fn build_api_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(form_page))
        .route("/jobs", post(create_job))
        .route("/jobs/{job_id}", get(job_status))
        .route("/status/{job_id}", get(status_page))
        .route("/download/{city}", get(download_zip))
        .route(HEALTHZ_PATH, get(healthz))
        .with_state(state)
}

pub async fn serve(config: AppConfig, state: AppState) -> Result<(), ServerError> {
    let listen_addr = parse_listen_addr(&config.server.listen_addr)?;
    let listener = bind_listener(listen_addr).await?;

    let local_addr = listener
        .local_addr()
        .map_err(|source| ServerError::LocalAddr { source })?;
    tracing::info!(%local_addr, "terraplan server listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(ShutdownEvent::Pending);
    let shutdown_future = broadcast_shutdown(shutdown_tx);

    let app = build_api_router(state);

    let mut server_future = Box::pin(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_future)
            .await
    });

    let drain_rx = shutdown_rx.clone();
    let mut drain_timeout = Box::pin(drain_timeout_future(drain_rx));

    tokio::select! {
        result = server_future.as_mut() => {
            if let Err(source) = result {
                return Err(ServerError::Serve { source });
            }
        }
        _ = drain_timeout.as_mut() => {
            // Timeout elapsed; dropping the server future forces termination.
        }
    }

    let final_event = *shutdown_rx.borrow();
    if final_event == ShutdownEvent::Pending {
        tracing::info!("server stopped without external shutdown signal");
    } else {
        tracing::info!(?final_event, "server shutdown complete");
    }

    Ok(())
}

async fn form_page() -> Html<&'static str> {
    Html(FORM_HTML)
}

async fn create_job(State(state): State<AppState>, Form(input): Form<JobForm>) -> Redirect {
    let job_id = state
        .pool
        .submit(input.city.trim(), input.task.trim());
    Redirect::to(&format!("/status/{job_id}"))
}

async fn job_status(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    let known = Uuid::parse_str(&job_id)
        .ok()
        .and_then(|id| state.pool.jobs().get(id));

    match known {
        Some(job) => {
            let mut value = serde_json::to_value(&job).expect("job state is serializable");
            if let JobState::Success { data } = &job {
                value["download_html"] = json!(format!(
                    "<a class=\"button\" href=\"{}\">⬇️ Stáhnout ZIP ({})</a>",
                    data.download_url, data.city
                ));
            }
            Json(value).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Unknown job_id" })),
        )
            .into_response(),
    }
}

async fn status_page(Path(job_id): Path<String>) -> Response {
    if Uuid::parse_str(&job_id).is_err() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Unknown job_id" })),
        )
            .into_response();
    }
    Html(STATUS_HTML.replace("__JOB_ID__", &job_id)).into_response()
}

async fn download_zip(State(state): State<AppState>, Path(city): Path<String>) -> Response {
    let zip_path = match state.paths.zip_path(&city) {
        Ok(path) => path,
        Err(_) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("invalid municipality name `{city}`") })),
            )
                .into_response();
        }
    };

    match tokio::fs::read(&zip_path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/zip".to_owned()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{city}.zip\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("ZIP not found at {}", zip_path.display()) })),
        )
            .into_response(),
    }
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn wait_for_shutdown() -> ShutdownEvent {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => ShutdownEvent::CtrlC,
            Err(error) => {
                tracing::warn!(%error, "failed to capture Ctrl+C signal");
                ShutdownEvent::ListenerFailed
            }
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => match term.recv().await {
                Some(_) => ShutdownEvent::SigTerm,
                None => ShutdownEvent::ListenerFailed,
            },
            Err(error) => {
                tracing::warn!(%error, "failed to capture SIGTERM");
                ShutdownEvent::ListenerFailed
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending();

    tokio::select! {
        event = ctrl_c => event,
        event = sigterm => event,
    }
}

fn parse_listen_addr(addr: &str) -> Result<SocketAddr, ServerError> {
    let trimmed = addr.trim();
    if trimmed.is_empty() {
        return Err(ServerError::EmptyListenAddr);
    }

    trimmed
        .parse()
        .map_err(|source| ServerError::InvalidListenAddr {
            address: trimmed.to_string(),
            source,
        })
}

async fn bind_listener(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            address: addr.to_string(),
            source,
        })
}

fn broadcast_shutdown(
    sender: watch::Sender<ShutdownEvent>,
) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let event = wait_for_shutdown().await;
        debug_assert!(event != ShutdownEvent::Pending);
        if let Err(error) = sender.send(event) {
            tracing::warn!(?event, %error, "failed to broadcast shutdown event");
        }
    }
}

fn drain_timeout_future(
    mut receiver: watch::Receiver<ShutdownEvent>,
) -> impl Future<Output = ()> + Send + 'static {
    async move {
        if receiver.changed().await.is_ok() {
            let event = *receiver.borrow_and_update();
            tracing::info!(?event, "shutdown signal received; draining connections");
            tokio::time::sleep(DRAIN_TIMEOUT).await;
            tracing::warn!(
                ?event,
                seconds = DRAIN_TIMEOUT.as_secs(),
                "graceful shutdown timed out; continuing shutdown"
            );
        }
    }
}

const FORM_HTML: &str = r#"<!doctype html><meta charset="utf-8"><title>Analýza územního plánu</title>
<meta name="viewport" content="width=device-width,initial-scale=1" />
<style>
body{font-family:system-ui,-apple-system,Segoe UI,Roboto,Helvetica,Arial,sans-serif;max-width:680px;margin:40px auto;padding:0 16px}
.card{border:1px solid #e5e7eb;border-radius:12px;padding:20px;box-shadow:0 1px 2px rgba(0,0,0,.04)}
label{display:block;margin:14px 0 6px;font-weight:600}
input,textarea,button{width:100%;padding:12px;border:1px solid #e5e7eb;border-radius:10px;font-size:16px}
button{cursor:pointer;background:#111;color:#fff;border-color:#111;margin-top:16px}
.hint{color:#6b7280;font-size:14px;margin-top:8px}
</style>
<div class="card">
  <h1>🏙️ Územní analýza</h1>
  <form method="post" action="/jobs">
    <label>Obec</label>
    <input name="city" placeholder="Např. Příbram" required />
    <label>Úkol (volitelný)</label>
    <textarea name="task" rows="3" placeholder="Např. Proveď kompletní analýzu pro obec Dubno."></textarea>
    <button>Spustit</button>
    <p class="hint">Po odeslání budete přesměrován/a na stránku se stavem a odkazem ke stažení ZIP.</p>
  </form>
</div>
"#;

const STATUS_HTML: &str = r#"<!doctype html><meta charset="utf-8"><title>Stav úlohy</title>
<meta name="viewport" content="width=device-width,initial-scale=1" />
<style>
body{font-family:system-ui;max-width:680px;margin:40px auto;padding:0 16px}
.card{border:1px solid #e5e7eb;border-radius:12px;padding:20px;box-shadow:0 1px 2px rgba(0,0,0,.04)}
.status{margin-top:10px;color:#6b7280}
a.button{display:inline-block;padding:10px 16px;background:#2563eb;color:#fff;text-decoration:none;border-radius:8px;margin-top:12px}
pre{white-space:pre-wrap;background:#f9fafb;padding:8px;border-radius:8px}
</style>
<div class="card">
  <h1>🔄 Zpracování</h1>
  <p class="status" id="status">Probíhá…</p>
  <div id="result"></div>
  <p><a href="/" style="text-decoration:none">← Zpět na formulář</a></p>
</div>
<script>
const statusUrl = "/jobs/__JOB_ID__";
const statusEl = document.getElementById("status");
const resultEl = document.getElementById("result");
async function poll(){
  try {
    const r = await fetch(statusUrl);
    const j = await r.json();
    if (j.state === "SUCCESS") {
      statusEl.textContent = "Hotovo ✅";
      const link = j.data && j.data.download_url;
      if (link) {
        resultEl.innerHTML = `<a class="button" href="${link}">⬇️ Stáhnout ZIP</a>`;
      } else {
        resultEl.innerHTML = "<pre>" + JSON.stringify(j, null, 2) + "</pre>";
      }
    } else if (j.state === "ERROR") {
      statusEl.textContent = "Chyba ❌";
      resultEl.innerHTML = "<pre>" + (j.error || JSON.stringify(j, null, 2)) + "</pre>";
    } else {
      statusEl.textContent = j.state || "Čekám…";
      setTimeout(poll, 1200);
    }
  } catch (e) {
    statusEl.textContent = "Chyba při načítání stavu";
    resultEl.textContent = String(e);
  }
}
poll();
</script>
"#;
