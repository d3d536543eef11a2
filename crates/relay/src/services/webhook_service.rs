use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use common::actors::{Actor, ActorType, ControlMessage};
use common::error::AlertError;
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span};
use uuid::Uuid;

use crate::auth::{Credentials, authorize};
use crate::context::RelayContext;
use crate::pipeline::{RelayOutcome, process_signal};
use crate::services::scanner_service::{ScanTrigger, run_scan_cycle};

const SECRET_HEADER: &str = "x-webhook-secret";
const SIGNATURE_HEADER: &str = "x-signature";

pub fn router(ctx: Arc<RelayContext>) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/test", get(test_handler))
        .route("/status", get(status_handler))
        .route("/analyze/{symbol}", get(analyze_handler))
        .route("/tv", post(webhook_handler))
        .route("/webhook", post(webhook_handler))
        .route("/scan", post(scan_handler))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                info_span!(
                    "http",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %Uuid::new_v4(),
                )
            }),
        )
        .with_state(ctx)
}

fn credentials(headers: &HeaderMap) -> Credentials<'_> {
    Credentials {
        header_secret: headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok()),
        signature: headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()),
    }
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn test_handler(State(ctx): State<Arc<RelayContext>>) -> Response {
    let delivery = ctx.deliver("✅ Signal relay test message").await;
    let status = if delivery.ok {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(delivery)).into_response()
}

async fn status_handler(State(ctx): State<Arc<RelayContext>>) -> Response {
    let settings = ctx.settings.get().await;
    let mut state = ctx.state.lock().await;
    state.reset_if_new_day();

    Json(json!({
        "ok": true,
        "settings": settings,
        "day": state.day(),
        "max_alerts_per_day": ctx.config.max_alerts_per_day,
        "session_open": ctx.session_open(&state.now()),
        "timezone": ctx.config.timezone.name(),
    }))
    .into_response()
}

async fn analyze_handler(
    State(ctx): State<Arc<RelayContext>>,
    Path(symbol): Path<String>,
) -> Response {
    let settings = ctx.settings.get().await;
    match ctx.analyze_symbol(&symbol, &settings).await {
        Ok(analysis) => (StatusCode::OK, Json(analysis)).into_response(),
        Err(e) => {
            let status = match e {
                AlertError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                AlertError::Transport(_) => StatusCode::BAD_GATEWAY,
                AlertError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
                AlertError::Unauthorized => StatusCode::UNAUTHORIZED,
            };
            (status, Json(json!({"ok": false, "error": e.to_string()}))).into_response()
        }
    }
}

async fn webhook_handler(
    State(ctx): State<Arc<RelayContext>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let outcome = process_signal(&ctx, &body, credentials(&headers)).await;
    let status = match outcome {
        RelayOutcome::Unauthorized => StatusCode::UNAUTHORIZED,
        RelayOutcome::BadRequest(_) => StatusCode::BAD_REQUEST,
        RelayOutcome::Failed(_) => StatusCode::BAD_GATEWAY,
        RelayOutcome::Ignored(_) | RelayOutcome::Sent { .. } => StatusCode::OK,
    };
    (status, Json(outcome.body())).into_response()
}

async fn scan_handler(State(ctx): State<Arc<RelayContext>>, headers: HeaderMap) -> Response {
    if authorize(&ctx.config.webhook_secret, &json!({}), credentials(&headers), &[]).is_err() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"ok": false, "error": "unauthorized"})),
        )
            .into_response();
    }

    let cycle = run_scan_cycle(&ctx, ScanTrigger::Manual).await;
    (StatusCode::OK, Json(json!({"ok": true, "scan": cycle}))).into_response()
}

pub struct WebhookServer {
    ctx: Arc<RelayContext>,
}

impl WebhookServer {
    pub fn new(ctx: Arc<RelayContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Actor for WebhookServer {
    fn name(&self) -> ActorType {
        ActorType::WebhookActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());

        let addr = self.ctx.config.bind_addr;
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                heartbeat_handle.abort();
                supervisor_tx
                    .send(ControlMessage::Error(
                        self.name(),
                        format!("Failed to bind {}: {}", addr, e),
                    ))
                    .await?;
                bail!("Failed to bind {}: {}", addr, e);
            }
        };
        info!(%addr, "Webhook server listening");

        let result = axum::serve(listener, router(self.ctx.clone())).await;
        heartbeat_handle.abort();
        if let Err(e) = result {
            error!("Webhook server stopped: {}", e);
            supervisor_tx
                .send(ControlMessage::Error(self.name(), e.to_string()))
                .await?;
            bail!("Webhook server stopped: {}", e);
        }
        Ok(())
    }
}
