//! JSON command surface for the chat transport.

use crate::{
    ledger::Ledger,
    metrics::render_prometheus,
    service::Rewards,
    store::UserStore,
    Error,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use quantum_types::user::UNKNOWN_NAME;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Deep-link payload naming the inviting user.
    #[serde(default)]
    pub referrer: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub window_seconds: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Serialize)]
struct HealthzResponse {
    ok: bool,
}

fn error_response(status: StatusCode, kind: &str, message: String) -> Response {
    (
        status,
        Json(ErrorBody {
            error: kind.to_string(),
            message,
        }),
    )
        .into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::WalletUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Unreachable(_) => StatusCode::BAD_GATEWAY,
            Error::Rejected(_) => StatusCode::CONFLICT,
            Error::Store(err) => {
                error!("Store failure: {err}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error_response(status, self.kind(), self.to_string())
    }
}

fn display_name(name: Option<String>) -> String {
    name.map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_NAME.to_string())
}

fn invalid_id() -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        "invalid_request",
        "id must not be empty".to_string(),
    )
}

fn respond<T: Serialize>(result: crate::Result<T>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn router<S, L, R>(rewards: Arc<Rewards<S, L, R>>) -> Router
where
    S: UserStore,
    L: Ledger,
    R: Rng + Send + 'static,
{
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics::<S, L, R>))
        .route("/commands/start", post(start::<S, L, R>))
        .route("/commands/mine", post(mine::<S, L, R>))
        .route("/commands/wallet", post(wallet::<S, L, R>))
        .route("/commands/claim", post(claim::<S, L, R>))
        .route("/commands/referral", post(referral::<S, L, R>))
        .route("/users/:id/profile", get(profile::<S, L, R>))
        .route("/leaderboard", get(leaderboard::<S, L, R>))
        .route("/stats", get(stats::<S, L, R>))
        .layer(TraceLayer::new_for_http())
        .with_state(rewards)
}

async fn healthz() -> Response {
    Json(HealthzResponse { ok: true }).into_response()
}

async fn metrics<S: UserStore, L: Ledger, R: Rng + Send + 'static>(
    State(rewards): State<Arc<Rewards<S, L, R>>>,
) -> Response {
    let users = match rewards.user_count().await {
        Ok(users) => users,
        Err(err) => {
            warn!("User count unavailable for metrics: {err}");
            0
        }
    };
    let body = render_prometheus(&rewards.metrics().snapshot(), users);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

async fn start<S: UserStore, L: Ledger, R: Rng + Send + 'static>(
    State(rewards): State<Arc<Rewards<S, L, R>>>,
    Json(request): Json<StartRequest>,
) -> Response {
    if request.id.trim().is_empty() {
        return invalid_id();
    }
    let name = display_name(request.name);
    let referrer = request.referrer.as_deref().map(str::trim).filter(|r| !r.is_empty());
    respond(rewards.start(&request.id, &name, referrer).await)
}

async fn mine<S: UserStore, L: Ledger, R: Rng + Send + 'static>(
    State(rewards): State<Arc<Rewards<S, L, R>>>,
    Json(request): Json<CommandRequest>,
) -> Response {
    if request.id.trim().is_empty() {
        return invalid_id();
    }
    let name = display_name(request.name);
    respond(rewards.mine(&request.id, &name).await)
}

async fn wallet<S: UserStore, L: Ledger, R: Rng + Send + 'static>(
    State(rewards): State<Arc<Rewards<S, L, R>>>,
    Json(request): Json<CommandRequest>,
) -> Response {
    if request.id.trim().is_empty() {
        return invalid_id();
    }
    let name = display_name(request.name);
    respond(rewards.wallet(&request.id, &name).await)
}

async fn claim<S: UserStore, L: Ledger, R: Rng + Send + 'static>(
    State(rewards): State<Arc<Rewards<S, L, R>>>,
    Json(request): Json<CommandRequest>,
) -> Response {
    if request.id.trim().is_empty() {
        return invalid_id();
    }
    let name = display_name(request.name);
    respond(rewards.claim(&request.id, &name).await)
}

async fn referral<S: UserStore, L: Ledger, R: Rng + Send + 'static>(
    State(rewards): State<Arc<Rewards<S, L, R>>>,
    Json(request): Json<CommandRequest>,
) -> Response {
    if request.id.trim().is_empty() {
        return invalid_id();
    }
    let name = display_name(request.name);
    respond(rewards.referral(&request.id, &name).await)
}

async fn profile<S: UserStore, L: Ledger, R: Rng + Send + 'static>(
    State(rewards): State<Arc<Rewards<S, L, R>>>,
    Path(id): Path<String>,
) -> Response {
    respond(rewards.profile(&id).await)
}

async fn leaderboard<S: UserStore, L: Ledger, R: Rng + Send + 'static>(
    State(rewards): State<Arc<Rewards<S, L, R>>>,
    Query(query): Query<LeaderboardQuery>,
) -> Response {
    respond(rewards.leaderboard(query.limit).await)
}

async fn stats<S: UserStore, L: Ledger, R: Rng + Send + 'static>(
    State(rewards): State<Arc<Rewards<S, L, R>>>,
    Query(query): Query<StatsQuery>,
) -> Response {
    respond(rewards.stats(query.window_seconds).await)
}
