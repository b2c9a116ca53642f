use std::{sync::Arc, time::Duration};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{sse::{Event, KeepAlive, Sse}, IntoResponse},
    routing::{get, post, put},
    Json, Router,
};
use futures_util::stream::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::{
    catalog::{self, Mood},
    events::GenerationEvent,
    orchestrator::{Orchestrator, Reflection},
    session::{SessionSnapshot, SessionStore},
    spiritual::{self, SpiritualContent, SpiritualError, SpiritualRequest},
};

const MAX_MOODS: usize = 10;
const MAX_LABEL_LEN: usize = 40;

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    sessions: Arc<SessionStore>,
    events_tx: broadcast::Sender<GenerationEvent>,
}

impl AppState {
    /// `orchestrator` should already publish to `events_tx`.
    pub fn new(orchestrator: Arc<Orchestrator>, events_tx: broadcast::Sender<GenerationEvent>) -> Self {
        Self { orchestrator, sessions: Arc::new(SessionStore::new()), events_tx }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> { &self.sessions }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/moods", get(list_moods))
        .route("/api/themes", get(list_themes))
        .route("/api/religions", get(list_religions))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/sessions/{id}/moods", put(put_moods))
        .route("/api/sessions/{id}/reflection", post(reflect))
        .route("/api/sessions/{id}/events", get(session_events))
        .route("/api/thought-of-the-day", get(thought_of_the_day))
        .route("/api/inspiration", post(inspiration))
        .route("/api/spiritual-content", post(spiritual_content))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(bind: String, state: AppState, session_ttl: Duration) -> Result<()> {
    let sessions = state.sessions().clone();
    tokio::spawn(async move {
        let ttl = chrono::Duration::from_std(session_ttl).unwrap_or(chrono::Duration::hours(1));
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            let pruned = sessions.prune_idle(ttl);
            if pruned > 0 {
                tracing::info!(pruned, remaining = sessions.len(), "pruned idle sessions");
            }
        }
    });

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .context(format!("Failed to bind {bind}"))?;
    tracing::info!("soulful API listening on http://{bind}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResp { status: &'static str, provider: &'static str }

async fn health(State(st): State<AppState>) -> Json<HealthResp> {
    Json(HealthResp { status: "ok", provider: st.orchestrator.generator().name() })
}

async fn list_moods() -> Json<&'static [Mood]> { Json(catalog::MOODS) }

async fn list_themes() -> Json<&'static [&'static str]> { Json(catalog::THEMES) }

async fn list_religions() -> Json<&'static [&'static str]> { Json(catalog::RELIGIONS) }

#[derive(Serialize)]
struct CreateSessionResp { session_id: Uuid }

async fn create_session(State(st): State<AppState>) -> (StatusCode, Json<CreateSessionResp>) {
    let session = st.sessions.create();
    (StatusCode::CREATED, Json(CreateSessionResp { session_id: session.id }))
}

async fn get_session(State(st): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<SessionSnapshot>, ApiErr> {
    let session = st.sessions.get(&id).ok_or_else(|| ApiErr::session_not_found(&id))?;
    let history = session.history().lock().await;
    Ok(Json(SessionSnapshot::capture(&session, &history)))
}

async fn delete_session(State(st): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiErr> {
    if st.sessions.remove(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiErr::session_not_found(&id))
    }
}

#[derive(Deserialize)]
struct MoodsReq { moods: Vec<String> }

fn check_labels(field: &str, labels: &[String]) -> Result<(), ApiErr> {
    if labels.len() > MAX_MOODS {
        return Err(ApiErr::bad_request(format!("At most {MAX_MOODS} {field} can be selected")));
    }
    if let Some(l) = labels.iter().find(|l| l.trim().chars().count() > MAX_LABEL_LEN) {
        return Err(ApiErr::bad_request(format!("Label too long: {l}")));
    }
    Ok(())
}

async fn put_moods(
    State(st): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<MoodsReq>,
) -> Result<Json<SessionSnapshot>, ApiErr> {
    check_labels("moods", &req.moods)?;
    let session = st.sessions.get(&id).ok_or_else(|| ApiErr::session_not_found(&id))?;
    // known moods are stored under their catalog spelling
    let moods = req.moods.iter().map(|m| match catalog::mood_by_name(m) {
        Some(known) => known.name.to_string(),
        None => m.trim().to_string(),
    });
    let mut history = session.history().lock().await;
    history.set_selected_tags(moods);
    Ok(Json(SessionSnapshot::capture(&session, &history)))
}

async fn reflect(State(st): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Reflection>, ApiErr> {
    let session = st.sessions.get(&id).ok_or_else(|| ApiErr::session_not_found(&id))?;
    // held for the whole call so concurrent requests on one session queue up
    let mut history = session.history().lock().await;
    let reflection = st.orchestrator.reflect(&id.to_string(), &mut history).await;
    Ok(Json(reflection))
}

async fn session_events(
    State(st): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl futures_util::Stream<Item = Result<Event, axum::Error>>>, ApiErr> {
    if st.sessions.get(&id).is_none() {
        return Err(ApiErr::session_not_found(&id));
    }
    let rx = st.events_tx.subscribe();
    let session_id = id.to_string();

    let stream = BroadcastStream::new(rx)
        .filter_map(|msg| async move { msg.ok() })
        .filter(move |evt: &GenerationEvent| futures_util::future::ready(evt.session_id() == session_id))
        .map(|evt| Event::default().event("message").json_data(evt));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn thought_of_the_day(State(st): State<AppState>) -> Json<Reflection> {
    let none: [&str; 0] = [];
    Json(st.orchestrator.thought_of_the_day(&none).await)
}

#[derive(Deserialize)]
struct InspirationReq { themes: Vec<String> }

async fn inspiration(State(st): State<AppState>, Json(req): Json<InspirationReq>) -> Result<Json<Reflection>, ApiErr> {
    check_labels("themes", &req.themes)?;
    let themes: Vec<&str> = req.themes.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();
    if themes.is_empty() {
        return Err(ApiErr::bad_request("Select a theme to receive a new inspirational message."));
    }
    Ok(Json(st.orchestrator.thought_of_the_day(&themes).await))
}

async fn spiritual_content(
    State(st): State<AppState>,
    Json(req): Json<SpiritualRequest>,
) -> Result<Json<SpiritualContent>, ApiErr> {
    check_labels("themes", &req.themes)?;
    match spiritual::generate(&st.orchestrator, &req).await {
        Ok(c) => Ok(Json(c)),
        Err(e @ SpiritualError::UnknownReligion(_)) => Err(ApiErr::bad_request(e.to_string())),
        Err(e) => {
            tracing::error!(error = %e, "spiritual content generation failed");
            Err(ApiErr::bad_gateway(e))
        }
    }
}

#[derive(Debug)]
struct ApiErr {
    status: StatusCode,
    code: String,
    message: String,
    suggestion: Option<String>,
}

impl ApiErr {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request".to_string(),
            message: message.into(),
            suggestion: None,
        }
    }

    fn bad_gateway(e: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            code: "generation_failed".to_string(),
            message: format!("Content generation failed: {}", e),
            suggestion: Some("Try again in a moment.".to_string()),
        }
    }

    fn session_not_found(id: &Uuid) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "session_not_found".to_string(),
            message: format!("No session with id {}", id),
            suggestion: Some("Create a new session with POST /api/sessions.".to_string()),
        }
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> axum::response::Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            code: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            suggestion: Option<String>,
        }
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                code: self.code,
                suggestion: self.suggestion,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::{orchestrator, ScriptedGenerator};
    use crate::orchestrator::{DEFAULT_MESSAGE, FALLBACK_MESSAGE};
    use crate::providers::GenerationError;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(script: Vec<Result<String, GenerationError>>) -> (Router, AppState) {
        let (tx, _rx) = broadcast::channel(16);
        let orch = orchestrator(ScriptedGenerator::new(script)).with_events(tx.clone());
        let state = AppState::new(Arc::new(orch), tx);
        (router(state.clone()), state)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, v)
    }

    #[tokio::test]
    async fn catalog_endpoints() {
        let (app, _) = app(vec![]);
        let (s, v) = call(&app, "GET", "/api/moods", None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(v[0]["name"], "Joy");
        let (_, v) = call(&app, "GET", "/api/themes", None).await;
        assert_eq!(v.as_array().unwrap().len(), 20);
        let (_, v) = call(&app, "GET", "/api/health", None).await;
        assert_eq!(v["provider"], "scripted");
    }

    #[tokio::test]
    async fn reflection_flow_over_http() {
        let (app, _) = app(vec![Ok("You are doing great today friend".into())]);
        let (s, v) = call(&app, "POST", "/api/sessions", None).await;
        assert_eq!(s, StatusCode::CREATED);
        let id = v["session_id"].as_str().unwrap().to_string();

        let (_, v) = call(&app, "POST", &format!("/api/sessions/{id}/reflection"), None).await;
        assert_eq!(v["message"], DEFAULT_MESSAGE);
        assert_eq!(v["source"], "default");
        assert!(v["warning"].is_string());

        let (s, v) = call(&app, "PUT", &format!("/api/sessions/{id}/moods"), Some(json!({"moods": ["Joy", "joy "]}))).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(v["selected_moods"], json!(["Joy"]));

        let (_, v) = call(&app, "POST", &format!("/api/sessions/{id}/reflection"), None).await;
        assert_eq!(v["message"], "You are doing great today friend");
        assert_eq!(v["source"], "generated");

        let (_, v) = call(&app, "GET", &format!("/api/sessions/{id}"), None).await;
        assert_eq!(v["generated_texts"].as_array().unwrap().len(), 1);
        assert_eq!(v["key_phrases"][2], "great today friend");

        let (_, v) = call(&app, "POST", &format!("/api/sessions/{id}/reflection"), None).await;
        assert_eq!(v["message"], FALLBACK_MESSAGE);
        assert_eq!(v["attempt_errors"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_session_is_404() {
        let (app, _) = app(vec![]);
        let uri = format!("/api/sessions/{}/reflection", Uuid::new_v4());
        let (s, v) = call(&app, "POST", &uri, None).await;
        assert_eq!(s, StatusCode::NOT_FOUND);
        assert_eq!(v["code"], "session_not_found");
    }

    #[tokio::test]
    async fn delete_ends_session() {
        let (app, state) = app(vec![]);
        let (_, v) = call(&app, "POST", "/api/sessions", None).await;
        let id = v["session_id"].as_str().unwrap().to_string();
        let (s, _) = call(&app, "DELETE", &format!("/api/sessions/{id}"), None).await;
        assert_eq!(s, StatusCode::NO_CONTENT);
        assert_eq!(state.sessions().len(), 0);
    }

    #[tokio::test]
    async fn inspiration_requires_a_theme() {
        let (app, _) = app(vec![Ok("Hope grows in small places.".into())]);
        let (s, _) = call(&app, "POST", "/api/inspiration", Some(json!({"themes": []}))).await;
        assert_eq!(s, StatusCode::BAD_REQUEST);
        let (s, v) = call(&app, "POST", "/api/inspiration", Some(json!({"themes": ["Hope"]}))).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(v["message"], "Hope grows in small places.");
    }

    #[tokio::test]
    async fn spiritual_content_errors_map_to_status() {
        let (app, _) = app(vec![Ok("not json".into())]);
        let (s, _) = call(&app, "POST", "/api/spiritual-content", Some(json!({"religion": "Nope"}))).await;
        assert_eq!(s, StatusCode::BAD_REQUEST);
        let (s, v) = call(&app, "POST", "/api/spiritual-content", Some(json!({"religion": "Islam", "themes": ["Patience"]}))).await;
        assert_eq!(s, StatusCode::BAD_GATEWAY);
        assert_eq!(v["code"], "generation_failed");
    }

    #[tokio::test]
    async fn too_many_moods_is_rejected() {
        let (app, _) = app(vec![]);
        let (_, v) = call(&app, "POST", "/api/sessions", None).await;
        let id = v["session_id"].as_str().unwrap().to_string();
        let moods: Vec<String> = (0..11).map(|i| format!("m{i}")).collect();
        let (s, _) = call(&app, "PUT", &format!("/api/sessions/{id}/moods"), Some(json!({ "moods": moods }))).await;
        assert_eq!(s, StatusCode::BAD_REQUEST);
    }
}
