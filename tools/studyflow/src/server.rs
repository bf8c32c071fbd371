//! HTTP surface for the study flow.
//!
//! | Method | Path | Step |
//! |--------|------|------|
//! | GET/POST | `/` | intro and consent |
//! | GET/POST | `/practice` | practice trials |
//! | GET/POST | `/experiment` | main trials |
//! | GET/POST | `/debrief` | debrief comment |
//! | GET | `/complete` | saved file paths |
//! | GET | `/health` | liveness |
//!
//! Every step handler loads the caller's `SessionState` by cookie token, hands it
//! to the `FlowController`, and saves it back before answering.

use std::sync::Arc;

use axum::{
    extract::{Form, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::errors::StudyError;
use crate::flow::{ConsentForm, DebriefForm, FlowController, RatingForm, StepOutcome};
use crate::logging::append_run_log;
use crate::runtime::{Clock, RandomSource};
use crate::session::SessionState;
use crate::session_store::SessionStore;
use crate::session_token;
use crate::types::Phase;

pub struct StudyApp {
    pub controller: FlowController,
    pub store: SessionStore,
    pub cookie_name: String,
    pub clock: Arc<dyn Clock>,
    /// Entropy for session tokens only; never the seeded trial source.
    pub token_random: Arc<dyn RandomSource>,
}

pub type AppState = Arc<StudyApp>;

pub fn create_router(app: AppState) -> Router {
    Router::new()
        .route("/", get(show_intro).post(post_consent))
        .route("/practice", get(show_practice).post(post_practice))
        .route("/experiment", get(show_experiment).post(post_experiment))
        .route("/debrief", get(show_debrief).post(post_debrief))
        .route("/complete", get(show_complete))
        .route("/health", get(handle_health_check))
        .with_state(app)
}

pub struct ApiError(StudyError);

impl From<StudyError> for ApiError {
    fn from(error: StudyError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.0.to_string();
        append_run_log(
            "error",
            "http.request.failed",
            json!({ "error": message }),
        );
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": message })),
        )
            .into_response()
    }
}

impl StudyApp {
    /// Runs one step against the caller's session and persists the result.
    fn step(
        &self,
        headers: &HeaderMap,
        action: impl FnOnce(&FlowController, &mut SessionState) -> Result<StepOutcome, StudyError>,
    ) -> Result<Response, ApiError> {
        let (token, mut state, fresh) = self.resolve_session(headers)?;
        let outcome = action(&self.controller, &mut state)?;

        // An empty state carries nothing worth a row or a cookie.
        let keep = state != SessionState::default();
        if keep {
            self.store.save(&token, &state)?;
        } else if !fresh {
            self.store.delete(&token)?;
        }

        let mut response = match outcome {
            StepOutcome::Render(view) => Json(view).into_response(),
            StepOutcome::Redirect(phase) => Redirect::to(phase.route()).into_response(),
        };
        if fresh && keep {
            let cookie = format!(
                "{}={token}; Path=/; HttpOnly; SameSite=Lax",
                self.cookie_name
            );
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| StudyError::Serialization(e.to_string()))?;
            response.headers_mut().insert(header::SET_COOKIE, value);
            append_run_log(
                "debug",
                "http.session.issued",
                json!({ "phase": state.phase().as_str() }),
            );
        }
        Ok(response)
    }

    fn resolve_session(
        &self,
        headers: &HeaderMap,
    ) -> Result<(String, SessionState, bool), StudyError> {
        if let Some(token) = cookie_value(headers, &self.cookie_name) {
            if session_token::is_well_formed(&token) {
                if let Some(state) = self.store.load(&token)? {
                    return Ok((token, state, false));
                }
            }
        }
        let token = session_token::mint(self.clock.as_ref(), self.token_random.as_ref());
        Ok((token, SessionState::default(), true))
    }
}

/// Value of cookie `name` from any `Cookie` header on the request.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
}

async fn handle_health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK" }))
}

async fn show_intro(State(app): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    app.step(&headers, |flow, state| flow.show(state, Phase::Intro))
}

async fn post_consent(
    State(app): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ConsentForm>,
) -> Result<Response, ApiError> {
    app.step(&headers, |flow, state| flow.accept_consent(state, &form))
}

async fn show_practice(
    State(app): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    app.step(&headers, |flow, state| flow.show(state, Phase::Practice))
}

async fn post_practice(
    State(app): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<RatingForm>,
) -> Result<Response, ApiError> {
    app.step(&headers, |flow, state| flow.submit_practice(state, &form))
}

async fn show_experiment(
    State(app): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    app.step(&headers, |flow, state| flow.show(state, Phase::Main))
}

async fn post_experiment(
    State(app): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<RatingForm>,
) -> Result<Response, ApiError> {
    app.step(&headers, |flow, state| flow.submit_trial(state, &form))
}

async fn show_debrief(
    State(app): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    app.step(&headers, |flow, state| flow.show(state, Phase::Debrief))
}

async fn post_debrief(
    State(app): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<DebriefForm>,
) -> Result<Response, ApiError> {
    app.step(&headers, |flow, state| flow.submit_debrief(state, &form))
}

async fn show_complete(
    State(app): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    app.step(&headers, |flow, state| flow.show(state, Phase::Complete))
}

/// Serves until ctrl-c.
pub async fn serve(app: AppState, bind: std::net::SocketAddr) -> Result<(), StudyError> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| StudyError::Io(format!("bind {bind}: {e}")))?;
    append_run_log(
        "info",
        "http.server.listening",
        json!({ "bind": bind.to_string() }),
    );
    axum::serve(listener, create_router(app))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(|e| StudyError::Io(e.to_string()))?;
    append_run_log("info", "http.server.stopped", json!({}));
    Ok(())
}
