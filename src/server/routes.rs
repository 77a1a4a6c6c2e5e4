//! HTTP route handlers for the Sentinel API.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chat::{ChatSession, ChatView, RejectReason, TurnId};

use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/status", get(directory_status))
        .route("/api/services", get(list_services))
        .route("/api/evacuation-points", get(list_evacuation_points))
        .route("/api/chat", get(chat_view).post(submit_message))
        .route("/api/chat/cancel", post(cancel_stream))
        .route("/api/chat/events", get(chat_events))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "sentinel-agent",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.model_name,
    }))
}

async fn directory_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.status().await)
}

async fn list_services(State(state): State<Arc<AppState>>) -> Response {
    match state.services().await {
        Some(services) => Json(services).into_response(),
        None => not_connected(&state).await,
    }
}

async fn list_evacuation_points(State(state): State<Arc<AppState>>) -> Response {
    match state.evacuation_points().await {
        Some(points) => Json(points).into_response(),
        None => not_connected(&state).await,
    }
}

async fn not_connected(state: &AppState) -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, Json(state.status().await)).into_response()
}

async fn chat_view(State(state): State<Arc<AppState>>) -> Json<ChatView> {
    Json(state.session.chat_view())
}

/// Chat submission request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
}

/// Chat submission response.
///
/// A rejected submission is a normal outcome, not an HTTP error.
#[derive(Debug, Serialize)]
pub struct ChatAccepted {
    /// Whether turns were appended.
    pub accepted: bool,
    /// Why the submission was ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    /// Appended user turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_turn_id: Option<TurnId>,
    /// Placeholder model turn receiving the stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_turn_id: Option<TurnId>,
}

async fn submit_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatAccepted> {
    match state.session.begin(&request.message) {
        Ok(pending) => {
            let user_turn_id = pending.user_turn();
            let model_turn_id = pending.model_turn();
            tokio::spawn(async move {
                let outcome = pending.run().await;
                debug!(?outcome, "submission settled");
            });
            Json(ChatAccepted {
                accepted: true,
                reason: None,
                user_turn_id: Some(user_turn_id),
                model_turn_id: Some(model_turn_id),
            })
        }
        Err(reason) => Json(ChatAccepted {
            accepted: false,
            reason: Some(reason),
            user_turn_id: None,
            model_turn_id: None,
        }),
    }
}

async fn cancel_stream(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "cancelled": state.session.cancel() }))
}

async fn chat_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = view_updates(Arc::clone(&state.session)).filter_map(|view| async move {
        match Event::default().json_data(&view) {
            Ok(event) => Some(Ok(event)),
            Err(err) => {
                warn!(error = %err, "failed to encode chat view event");
                None
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Current view, then a fresh view after every store or phase change.
///
/// Bursts of changes between polls collapse into one view.
fn view_updates(session: Arc<ChatSession>) -> impl Stream<Item = ChatView> {
    let conversation = session.store().subscribe();
    let phase = session.subscribe_phase();

    futures::stream::unfold(
        (session, conversation, phase, true),
        |(session, mut conversation, mut phase, first)| async move {
            if !first {
                let alive = tokio::select! {
                    changed = conversation.changed() => changed.is_ok(),
                    changed = phase.changed() => changed.is_ok(),
                };
                if !alive {
                    return None;
                }
                conversation.mark_unchanged();
                phase.mark_unchanged();
            }
            let view = session.chat_view();
            Some((view, (session, conversation, phase, false)))
        },
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::chat::provider::scripted::{Script, ScriptedProvider};
    use crate::chat::{Role, SessionPhase, SubmitOutcome};
    use crate::config::{MockLatency, SentinelConfig};
    use crate::directory::MockDataProvider;

    fn state_with(scripts: Vec<Script>) -> Arc<AppState> {
        AppState::with_provider(
            Arc::new(ScriptedProvider::new(scripts)),
            &SentinelConfig::default(),
        )
    }

    async fn call(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = create_router(Arc::clone(state))
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap();
        (status, json)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn wait_idle(state: &Arc<AppState>) {
        let mut rx = state.session.subscribe_phase();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|p| p.is_idle()))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_health_check() {
        let state = state_with(Vec::new());
        let (status, json) = call(&state, get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "sentinel-agent");
    }

    #[tokio::test]
    async fn test_chat_view_starts_with_welcome() {
        let state = state_with(Vec::new());
        let (status, json) = call(&state, get_req("/api/chat")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["phase"]["state"], "idle");
        assert_eq!(json["turns"].as_array().map(Vec::len), Some(1));
        assert_eq!(json["turns"][0]["role"], "model");
    }

    #[tokio::test]
    async fn test_submit_streams_in_background() {
        let state = state_with(vec![Script::chunks(&["Call ", "112."])]);
        let (status, json) = call(
            &state,
            post_json("/api/chat", &serde_json::json!({ "message": "fire!" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["accepted"], true);
        assert!(json["model_turn_id"].is_string());

        wait_idle(&state).await;
        let snapshot = state.session.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.turns()[1].role, Role::User);
        assert_eq!(snapshot.turns()[2].text, "Call 112.");
    }

    #[tokio::test]
    async fn test_blank_submit_rejected_with_ok_status() {
        let state = state_with(Vec::new());
        let (status, json) = call(
            &state,
            post_json("/api/chat", &serde_json::json!({ "message": "   " })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["accepted"], false);
        assert_eq!(json["reason"], "empty_input");
        assert_eq!(state.session.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_busy_submit_rejected_and_cancel_settles() {
        let (_tx, script) = Script::channel();
        let state = state_with(vec![script]);

        let (_, first) = call(
            &state,
            post_json("/api/chat", &serde_json::json!({ "message": "one" })),
        )
        .await;
        assert_eq!(first["accepted"], true);

        let (_, second) = call(
            &state,
            post_json("/api/chat", &serde_json::json!({ "message": "two" })),
        )
        .await;
        assert_eq!(second["accepted"], false);
        assert_eq!(second["reason"], "busy");

        let (_, cancelled) = call(&state, post_json("/api/chat/cancel", &serde_json::json!({}))).await;
        assert_eq!(cancelled["cancelled"], true);

        wait_idle(&state).await;
        assert_eq!(state.session.phase(), SessionPhase::Idle);
        assert_eq!(state.session.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn test_directory_routes_follow_load_state() {
        let state = state_with(Vec::new());

        let (status, json) = call(&state, get_req("/api/services")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["status"], "connecting");

        state
            .refresh_directory(&MockDataProvider::new(MockLatency::ZERO))
            .await;

        let (status, json) = call(&state, get_req("/api/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "connected");

        let (_, services) = call(&state, get_req("/api/services")).await;
        assert_eq!(services.as_array().map(Vec::len), Some(9));
        let (_, points) = call(&state, get_req("/api/evacuation-points")).await;
        assert_eq!(points.as_array().map(Vec::len), Some(5));
        assert_eq!(points[0]["type"], "Shelter");
    }

    #[tokio::test]
    async fn test_view_updates_follow_stream() {
        let (tx, script) = Script::channel();
        let state = state_with(vec![script]);
        let mut updates = Box::pin(view_updates(Arc::clone(&state.session)));

        let initial = updates.next().await.unwrap();
        assert_eq!(initial.turns.len(), 1);

        let pending = state.session.begin("smoke").unwrap();
        let driver = tokio::spawn(pending.run());

        let appended = updates.next().await.unwrap();
        assert_eq!(appended.turns.len(), 3);

        tx.unbounded_send(Ok("Stay low".to_string())).unwrap();
        let mut saw_fragment = false;
        for _ in 0..4 {
            let view = tokio::time::timeout(Duration::from_secs(2), updates.next())
                .await
                .unwrap()
                .unwrap();
            if view.turns[2].text == "Stay low" {
                saw_fragment = true;
                break;
            }
        }
        assert!(saw_fragment);

        drop(tx);
        driver.await.unwrap();
    }

    #[tokio::test]
    async fn test_view_updates_coalesce_bursts() {
        let state = state_with(vec![Script::chunks(&["Move ", "to ", "higher ground."])]);
        let mut updates = Box::pin(view_updates(Arc::clone(&state.session)));
        assert_eq!(updates.next().await.unwrap().turns.len(), 1);

        let outcome = state.session.begin("flood").unwrap().run().await;
        assert!(matches!(outcome, SubmitOutcome::Completed { chunks: 3, .. }));

        let latest = updates.next().await.unwrap();
        assert_eq!(latest.phase, SessionPhase::Idle);
        assert_eq!(latest.turns.len(), 3);
        assert_eq!(latest.turns[2].text, "Move to higher ground.");

        let quiet = tokio::time::timeout(Duration::from_millis(50), updates.next()).await;
        assert!(quiet.is_err());
    }

    #[tokio::test]
    async fn test_events_route_sends_initial_view() {
        let state = state_with(Vec::new());
        let response = create_router(Arc::clone(&state))
            .oneshot(get_req("/api/chat/events"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body().into_data_stream();
        let bytes = tokio::time::timeout(Duration::from_secs(2), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let frame = String::from_utf8_lossy(&bytes);
        assert!(frame.starts_with("data: "));
        assert!(frame.contains("\"turns\""));
    }
}
