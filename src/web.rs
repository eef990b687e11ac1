use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::chat::HistoryTurn;
use crate::db::{call_blocking, token_hash, AuthUser};
use crate::error::GrocerError;
use crate::limiter::RateLimiter;
use crate::runtime::AppState;

#[derive(Clone)]
pub struct WebState {
    app: Arc<AppState>,
    chat_limiter: Arc<RateLimiter>,
    admin_limiter: Arc<RateLimiter>,
}

impl WebState {
    pub fn new(app: Arc<AppState>) -> Self {
        let config = &app.config;
        let chat_limiter = Arc::new(RateLimiter::new(
            config.chat_rate_limit,
            Duration::from_secs(config.chat_rate_window_secs),
        ));
        let admin_limiter = Arc::new(RateLimiter::new(
            config.admin_rate_limit,
            Duration::from_secs(config.admin_rate_window_secs),
        ));
        WebState {
            app,
            chat_limiter,
            admin_limiter,
        }
    }
}

type ApiError = (StatusCode, Json<Value>);
type ApiResult = Result<Json<Value>, ApiError>;

fn ok(data: Value) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

fn fail(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "success": false, "error": message })))
}

/// Map domain errors to the uniform client envelope. Details of generic
/// failures stay in the server log only.
fn error_response(e: GrocerError) -> ApiError {
    match e {
        GrocerError::Validation(msg) => fail(StatusCode::BAD_REQUEST, &msg),
        GrocerError::Config(_) => {
            error!("AI request failed: provider credentials missing");
            fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                "AI service is currently unavailable",
            )
        }
        GrocerError::ProviderAuth => {
            error!("AI request failed: provider rejected credentials");
            fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                "AI service configuration error",
            )
        }
        GrocerError::ProviderQuota => fail(
            StatusCode::TOO_MANY_REQUESTS,
            "AI service is temporarily busy, please try again shortly",
        ),
        GrocerError::RateLimited => fail(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many AI chat requests, please try again later.",
        ),
        other => {
            error!("AI request failed: {other}");
            fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Sorry, I'm having trouble processing your request right now. Please try again in a moment.",
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

fn auth_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("authorization")?.to_str().ok()?.trim();
    let mut parts = raw.splitn(2, char::is_whitespace);
    let scheme = parts.next()?.trim();
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = parts.next()?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

async fn require_user(state: &WebState, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let Some(token) = auth_token_from_headers(headers) else {
        return Err(fail(StatusCode::UNAUTHORIZED, "Authentication required"));
    };
    let hash = token_hash(&token);
    let user = call_blocking(state.app.db.clone(), move |db| {
        db.find_user_by_token_hash(&hash)
    })
    .await
    .map_err(error_response)?;
    user.ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "Invalid or expired token"))
}

async fn require_admin(state: &WebState, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let user = require_user(state, headers).await?;
    if !user.is_admin() {
        return Err(fail(StatusCode::FORBIDDEN, "Access denied. Admin only."));
    }
    Ok(user)
}

// ---------------------------------------------------------------------------
// Client identity for the chat limiter
// ---------------------------------------------------------------------------

fn client_key_from_headers(headers: &HeaderMap, trust_xff: bool) -> String {
    if !trust_xff {
        return "global".to_string();
    }
    parse_forwarded_client_ip(headers).unwrap_or_else(|| "global".to_string())
}

fn parse_forwarded_client_ip(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("x-forwarded-for")?.to_str().ok()?;
    raw.split(',')
        .find_map(|part| normalize_forwarded_ip(part.trim()))
}

fn normalize_forwarded_ip(value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip.to_string());
    }

    if let Some(rest) = value.strip_prefix('[') {
        let (host, _) = rest.split_once("]:")?;
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Some(ip.to_string());
        }
        return None;
    }

    if let Some((host, port)) = value.rsplit_once(':') {
        if !host.contains(':') && port.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(ip) = host.parse::<IpAddr>() {
                return Some(ip.to_string());
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn api_index() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the GrocerAI API!",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "ai": "/api/ai",
            "admin": "/api/admin"
        }
    }))
}

async fn api_health() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "service": "GrocerAI Chat Assistant",
            "status": "operational",
            "timestamp": chrono::Utc::now().to_rfc3339()
        }
    }))
}

async fn api_chat(
    State(state): State<WebState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    let user = require_user(&state, &headers).await?;

    let client_key =
        client_key_from_headers(&headers, state.app.config.trust_x_forwarded_for);
    if !state.chat_limiter.admit(&client_key).await {
        return Err(error_response(GrocerError::RateLimited));
    }

    // Mirrors the body contract: a non-string `message` is treated as
    // absent and rejected by validation with HTTP 400.
    let message = body
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let history: Vec<HistoryTurn> = body
        .get("conversationHistory")
        .cloned()
        .map(|v| serde_json::from_value(v).unwrap_or_default())
        .unwrap_or_default();
    let session_id = body
        .get("sessionId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let chat_type = body
        .get("chatType")
        .and_then(|v| v.as_str())
        .unwrap_or("general")
        .to_string();

    let reply = state
        .app
        .chat
        .send_message(user.id, &message, &history, session_id, &chat_type)
        .await
        .map_err(error_response)?;

    Ok(ok(json!({
        "message": reply.reply,
        "sessionId": reply.session_id,
        "chatType": chat_type,
        "responseTime": reply.response_time_ms,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    session_id: Option<String>,
    limit: Option<usize>,
}

async fn api_history(
    State(state): State<WebState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> ApiResult {
    let user = require_user(&state, &headers).await?;
    let limit = query
        .limit
        .unwrap_or(state.app.config.history_limit)
        .clamp(1, 500);
    let messages = state
        .app
        .chat
        .get_history(user.id, limit, query.session_id)
        .await
        .map_err(error_response)?;
    Ok(ok(serde_json::to_value(messages).map_err(|e| {
        error_response(GrocerError::Json(e))
    })?))
}

#[derive(Debug, Deserialize)]
struct SessionsQuery {
    limit: Option<usize>,
}

async fn api_sessions(
    State(state): State<WebState>,
    headers: HeaderMap,
    Query(query): Query<SessionsQuery>,
) -> ApiResult {
    let user = require_user(&state, &headers).await?;
    let limit = query
        .limit
        .unwrap_or(state.app.config.sessions_limit)
        .clamp(1, 100);
    let sessions = state
        .app
        .chat
        .get_sessions(user.id, limit)
        .await
        .map_err(error_response)?;
    Ok(ok(serde_json::to_value(sessions).map_err(|e| {
        error_response(GrocerError::Json(e))
    })?))
}

async fn api_clear_history(
    State(state): State<WebState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> ApiResult {
    let user = require_user(&state, &headers).await?;
    let session_id = query.session_id;
    let description = match &session_id {
        Some(session) => format!("Cleared session {session}"),
        None => "Cleared all chat history".to_string(),
    };
    let deleted = state
        .app
        .chat
        .clear_history(user.id, session_id)
        .await
        .map_err(error_response)?;
    Ok(ok(json!({
        "deletedCount": deleted,
        "message": description,
    })))
}

async fn api_recommendations(State(state): State<WebState>, headers: HeaderMap) -> ApiResult {
    let user = require_user(&state, &headers).await?;
    let result = state
        .app
        .recommender
        .recommend(user.id)
        .await
        .map_err(error_response)?;
    Ok(ok(json!({
        "recommendations": result.recommendations,
        "responseTime": result.response_time_ms,
        "recommendationId": result.recommendation_id,
        "savedAt": result.saved_at,
    })))
}

// --- Admin ---

async fn api_admin_chat_test(
    State(state): State<WebState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    let admin = require_admin(&state, &headers).await?;

    if !state.admin_limiter.admit(&admin.id.to_string()).await {
        return Err(fail(
            StatusCode::TOO_MANY_REQUESTS,
            "Admin AI rate limit exceeded. Please wait before testing again.",
        ));
    }

    let message = body
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let test_type = body
        .get("testType")
        .and_then(|v| v.as_str())
        .unwrap_or("general")
        .to_string();

    let reply = state
        .app
        .chat
        .admin_test(message, &test_type)
        .await
        .map_err(error_response)?;

    info!(admin_id = admin.id, test_type = %test_type, "admin AI test completed");

    Ok(ok(json!({
        "message": reply,
        "testType": test_type,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "adminId": admin.id,
    })))
}

async fn api_admin_analytics(State(state): State<WebState>, headers: HeaderMap) -> ApiResult {
    require_admin(&state, &headers).await?;

    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let analytics = call_blocking(state.app.db.clone(), move |db| {
        // Refresh today's aggregate row, then read the live overview.
        db.update_daily_analytics(&today)?;
        db.get_ai_analytics(&today)
    })
    .await
    .map_err(error_response)?;

    Ok(ok(serde_json::to_value(analytics).map_err(|e| {
        error_response(GrocerError::Json(e))
    })?))
}

async fn api_admin_clear_history(
    State(state): State<WebState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    let admin = require_admin(&state, &headers).await?;

    let user_id = body.get("userId").and_then(|v| v.as_i64());
    let session_id = body
        .get("sessionId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let deleted = call_blocking(state.app.db.clone(), move |db| match (user_id, session_id) {
        (Some(uid), session) => db.clear_chat_history(uid, session.as_deref()),
        (None, Some(session)) => db.clear_session_history(&session),
        (None, None) => db.clear_all_chat_history(),
    })
    .await
    .map_err(error_response)?;

    info!(admin_id = admin.id, deleted, "admin cleared AI chat history");

    Ok(ok(json!({
        "deletedCount": deleted,
        "message": format!("Cleared {deleted} chat messages"),
    })))
}

// ---------------------------------------------------------------------------
// Router / server
// ---------------------------------------------------------------------------

pub fn build_router(state: WebState) -> Router {
    Router::new()
        .route("/", get(api_index))
        .route("/api/ai/health", get(api_health))
        .route("/api/ai/chat", post(api_chat))
        .route("/api/ai/history", get(api_history).delete(api_clear_history))
        .route("/api/ai/sessions", get(api_sessions))
        .route("/api/ai/recommendations", get(api_recommendations))
        .route("/api/admin/ai/chat-test", post(api_admin_chat_test))
        .route("/api/admin/ai/analytics", get(api_admin_analytics))
        .route("/api/admin/ai/clear-history", post(api_admin_clear_history))
        .with_state(state)
}

pub async fn start_server(app: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", app.config.host, app.config.port);
    let router = build_router(WebState::new(app));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("GrocerAI API listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
