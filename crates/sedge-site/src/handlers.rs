//! HTTP callback surface for the timer broker.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use serde::Deserialize;
use tracing::debug;

use crate::site::SiteManager;

/// The opaque payload the coordinator registered with the broker, returned
/// verbatim when the timer fires.
#[derive(Deserialize)]
struct TimerPopBody {
    aor_id: String,
}

/// Router exposing `POST /timers/pop` for broker timer callbacks.
pub fn timer_pop_router(site: Arc<SiteManager>) -> Router {
    Router::new().route("/timers/pop", post(timer_pop)).with_state(site)
}

/// The broker replays the opaque payload here when a timer fires. Reply
/// immediately; the actual expiry processing runs on its own task.
async fn timer_pop(State(site): State<Arc<SiteManager>>, body: String) -> impl IntoResponse {
    let pop: TimerPopBody = match serde_json::from_str(&body) {
        Ok(pop) => pop,
        Err(e) => {
            debug!(error = %e, "timer pop payload failed to parse");
            return (StatusCode::BAD_REQUEST, "expected a JSON body carrying aor_id").into_response();
        }
    };

    let trail_id = site.dispatch_timer_pop(&pop.aor_id).await;
    debug!(aor_id = %pop.aor_id, trail_id, "timer pop accepted");
    StatusCode::OK.into_response()
}
