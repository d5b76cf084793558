use anyhow::{anyhow, Context, Result};
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;

use crate::controller::{Command, PromptForge, Refresh};
use crate::debounce::Debouncer;
use crate::export::ExportFile;
use crate::form_state::FormField;
use crate::generation::GenerationClient;
use crate::main_ui_html::build_main_ui_html;

pub struct AppState {
    pub forge: Mutex<PromptForge>,
    pub client: Arc<dyn GenerationClient>,
    pub input_debounce: Debouncer,
    pub server_port: AtomicU16,
    pub view_revision: AtomicU64,
}

type ApiResponse = (StatusCode, Json<Value>);

impl AppState {
    pub fn new(
        forge: PromptForge,
        client: Arc<dyn GenerationClient>,
        input_debounce: Duration,
    ) -> Self {
        Self {
            forge: Mutex::new(forge),
            client,
            input_debounce: Debouncer::new(input_debounce),
            server_port: AtomicU16::new(0),
            view_revision: AtomicU64::new(0),
        }
    }

    fn bump_revision(&self, refresh: Refresh) {
        if refresh == Refresh::View {
            self.view_revision.fetch_add(1, Ordering::Relaxed);
        }
    }
}

pub struct AppServer {
    port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl AppServer {
    pub fn start(state: Arc<AppState>, preferred_port: u16) -> Result<Self> {
        let listener = bind_listener(preferred_port)?;
        let port = listener
            .local_addr()
            .context("failed to inspect server local address")?
            .port();
        listener
            .set_nonblocking(true)
            .context("failed to set listener non-blocking")?;

        state.server_port.store(port, Ordering::Relaxed);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let thread_handle = thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build();
            let runtime = match runtime {
                Ok(runtime) => runtime,
                Err(err) => {
                    tracing::error!("failed to build server runtime: {}", err);
                    return;
                }
            };

            runtime.block_on(async move {
                let listener = match tokio::net::TcpListener::from_std(listener) {
                    Ok(listener) => listener,
                    Err(err) => {
                        tracing::error!("failed to adopt listener: {}", err);
                        return;
                    }
                };

                let app = build_router(state);
                let server = axum::serve(listener, app).with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                });
                if let Err(err) = server.await {
                    tracing::error!("server stopped with error: {}", err);
                }
            });
        });

        Ok(Self {
            port,
            shutdown_tx: Some(shutdown_tx),
            thread_handle: Some(thread_handle),
        })
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// Blocks until the server thread exits.
    pub fn wait(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for AppServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Deserialize)]
struct InputReq {
    field: FormField,
    value: String,
    #[serde(default)]
    seq: Option<u64>,
}

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    let port = state.server_port.load(Ordering::Relaxed);
    let mut origins = vec![HeaderValue::from_static("null")];
    for origin in [
        format!("http://127.0.0.1:{port}"),
        format!("http://localhost:{port}"),
    ] {
        if let Ok(value) = HeaderValue::from_str(&origin) {
            origins.push(value);
        }
    }

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(get_main_page))
        .route("/ping", get(get_ping))
        .route("/app/init", get(get_app_init))
        .route("/app/revision", get(get_app_revision))
        .route("/app/input", post(post_app_input))
        .route("/app/command", post(post_app_command))
        .route("/app/generate", post(post_app_generate))
        .route("/app/copy", post(post_app_copy))
        .route("/app/export", get(get_app_export))
        .layer(cors)
        .with_state(state)
}

async fn get_main_page() -> Html<String> {
    Html(build_main_ui_html())
}

async fn get_ping() -> ApiResponse {
    ok_json(json!({}))
}

async fn get_app_init(State(state): State<Arc<AppState>>) -> ApiResponse {
    let forge = match lock_forge(&state) {
        Ok(guard) => guard,
        Err(resp) => return resp,
    };
    ok_view(&state, &forge)
}

async fn get_app_revision(State(state): State<Arc<AppState>>) -> ApiResponse {
    let revision = state.view_revision.load(Ordering::Relaxed);
    ok_json(json!({ "revision": revision }))
}

async fn post_app_input(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<InputReq>,
) -> ApiResponse {
    {
        let mut forge = match lock_forge(&state) {
            Ok(guard) => guard,
            Err(resp) => return resp,
        };
        let command = Command::SetField {
            field: payload.field,
            value: payload.value,
            seq: payload.seq,
        };
        if let Err(err) = forge.apply(command, Utc::now()) {
            return err_json(StatusCode::BAD_REQUEST, &err.to_string());
        }
    }

    schedule_gate_refresh(&state);
    ok_json(json!({}))
}

async fn post_app_command(
    State(state): State<Arc<AppState>>,
    Json(command): Json<Command>,
) -> ApiResponse {
    let is_field_edit = matches!(command, Command::SetField { .. });

    let mut forge = match lock_forge(&state) {
        Ok(guard) => guard,
        Err(resp) => return resp,
    };
    match forge.apply(command, Utc::now()) {
        Ok(refresh) => state.bump_revision(refresh),
        Err(err) if is_field_edit => {
            return err_json(StatusCode::BAD_REQUEST, &err.to_string());
        }
        Err(err) => {
            tracing::error!("command failed: {:#}", err);
            return err_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("command failed: {err}"),
            );
        }
    }
    let response = ok_view(&state, &forge);
    drop(forge);

    if is_field_edit {
        schedule_gate_refresh(&state);
    }
    response
}

async fn post_app_generate(State(state): State<Arc<AppState>>) -> ApiResponse {
    let pending = {
        let mut forge = match lock_forge(&state) {
            Ok(guard) => guard,
            Err(resp) => return resp,
        };
        match forge.begin_generate() {
            Ok(Some(pending)) => pending,
            Ok(None) => return ok_view(&state, &forge),
            Err(err) => {
                return err_json(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &format!("save error: {err}"),
                )
            }
        }
    };

    let outcome = state.client.generate(&pending.request).await;

    let mut forge = match lock_forge(&state) {
        Ok(guard) => guard,
        Err(resp) => return resp,
    };
    match forge.finish_generate(pending.ticket, outcome) {
        Ok(refresh) => state.bump_revision(refresh),
        Err(err) => {
            return err_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("save error: {err}"),
            )
        }
    }
    ok_view(&state, &forge)
}

async fn post_app_copy(State(state): State<Arc<AppState>>) -> ApiResponse {
    let text = {
        let forge = match lock_forge(&state) {
            Ok(guard) => guard,
            Err(resp) => return resp,
        };
        forge.copy_text()
    };

    let Some(text) = text else {
        return ok_json(json!({ "copied": false }));
    };

    if let Err(err) = copy_to_system_clipboard(&text) {
        return err_json(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("clipboard error: {err}"),
        );
    }

    ok_json(json!({
        "copied": true,
        "system_clipboard": cfg!(target_os = "windows"),
        "text": text,
    }))
}

async fn get_app_export(State(state): State<Arc<AppState>>) -> axum::response::Response {
    let file = {
        let forge = match lock_forge(&state) {
            Ok(guard) => guard,
            Err(resp) => return resp.into_response(),
        };
        forge.export_file()
    };

    let Some(file) = file else {
        return err_json(StatusCode::CONFLICT, "nothing to export").into_response();
    };

    tracing::debug!("exporting result as {}", file.file_name);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, ExportFile::CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.file_name),
            ),
        ],
        file.content,
    )
        .into_response()
}

/// Recomputes the generate/save gate once input has been quiet for the
/// configured window.
fn schedule_gate_refresh(state: &Arc<AppState>) {
    let debounced = Arc::clone(state);
    state.input_debounce.trigger(move || {
        let mut forge = match debounced.forge.lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::error!("forge lock error during gate refresh");
                return;
            }
        };
        match forge.apply(Command::RefreshGates, Utc::now()) {
            Ok(refresh) => debounced.bump_revision(refresh),
            Err(err) => tracing::error!("gate refresh failed: {:#}", err),
        }
    });
}

fn lock_forge(state: &AppState) -> std::result::Result<MutexGuard<'_, PromptForge>, ApiResponse> {
    state
        .forge
        .lock()
        .map_err(|_| err_json(StatusCode::INTERNAL_SERVER_ERROR, "forge lock error"))
}

fn ok_json(payload: Value) -> ApiResponse {
    let mut body = serde_json::Map::new();
    body.insert("ok".to_string(), Value::Bool(true));

    if let Some(obj) = payload.as_object() {
        for (key, value) in obj {
            body.insert(key.clone(), value.clone());
        }
    } else if !payload.is_null() {
        body.insert("data".to_string(), payload);
    }

    (StatusCode::OK, Json(Value::Object(body)))
}

fn ok_view(state: &AppState, forge: &PromptForge) -> ApiResponse {
    let mut snapshot = match serde_json::to_value(forge.snapshot()) {
        Ok(value) => value,
        Err(err) => {
            return err_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("snapshot error: {err}"),
            )
        }
    };
    if let Some(obj) = snapshot.as_object_mut() {
        obj.insert(
            "revision".to_string(),
            json!(state.view_revision.load(Ordering::Relaxed)),
        );
    }
    ok_json(snapshot)
}

fn err_json(status: StatusCode, message: &str) -> ApiResponse {
    (
        status,
        Json(json!({
            "ok": false,
            "error": message,
        })),
    )
}

fn bind_listener(preferred_port: u16) -> Result<TcpListener> {
    for offset in 0..200u16 {
        let port = preferred_port.saturating_add(offset);
        if port == 0 {
            continue;
        }

        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
            return Ok(listener);
        }
    }

    Err(anyhow!(
        "failed to bind a server port from {preferred_port}"
    ))
}

#[cfg(target_os = "windows")]
fn copy_to_system_clipboard(text: &str) -> Result<()> {
    clipboard_win::set_clipboard_string(text)
        .map_err(|err| anyhow!("failed to write clipboard: {err}"))
}

#[cfg(not(target_os = "windows"))]
fn copy_to_system_clipboard(_text: &str) -> Result<()> {
    Ok(())
}
