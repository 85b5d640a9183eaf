//! JSON REST API for Drip.
//!
//! Exposes an axum [`Router`] backed by any [`CampaignStore`]. Every route
//! requires HTTP Basic auth; TLS and transport concerns are the caller's
//! responsibility.
//!
//! | Method | Path | |
//! |--------|------|-|
//! | `POST` | `/campaigns` | create a campaign |
//! | `GET`  | `/campaigns/{id}` | campaign and its steps |
//! | `PUT`  | `/campaigns/{id}/status` | change status |
//! | `PUT`  | `/campaigns/{id}/steps` | replace the sequence |
//! | `POST` | `/campaigns/{id}/contacts` | add a contact |
//! | `GET`  | `/campaigns/{id}/due[?now=]` | run an automation pass |
//! | `GET`  | `/contacts/{id}` | contact with its schedule |
//! | `GET`  | `/contacts/{id}/evaluate[?now=]` | single due decision |
//! | `POST` | `/contacts/{id}/sends` | report a send outcome |
//! | `POST` | `/contacts/{id}/events` | reply, unsubscribe or bounce |

pub mod auth;
pub mod campaigns;
pub mod contacts;
pub mod error;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use drip_core::store::CampaignStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::AuthConfig;
pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: CampaignStore> {
  pub store: Arc<S>,
  pub auth:  Arc<AuthConfig>,
}

/// `?now=<RFC 3339>` override for endpoints that evaluate schedules. Defaults
/// to the current time.
#[derive(Debug, Default, Deserialize)]
pub struct AtParams {
  pub now: Option<DateTime<Utc>>,
}

impl AtParams {
  pub fn now(&self) -> DateTime<Utc> { self.now.unwrap_or_else(Utc::now) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build an axum [`Router`] for the API.
pub fn api_router<S>(state: AppState<S>) -> Router
where
  S: CampaignStore + Clone + Send + Sync + 'static,
{
  Router::new()
    // Campaigns
    .route("/campaigns", post(campaigns::create::<S>))
    .route("/campaigns/{id}", get(campaigns::get_one::<S>))
    .route("/campaigns/{id}/status", put(campaigns::set_status::<S>))
    .route("/campaigns/{id}/steps", put(campaigns::replace_steps::<S>))
    .route("/campaigns/{id}/contacts", post(campaigns::add_contact::<S>))
    .route("/campaigns/{id}/due", get(campaigns::due::<S>))
    // Contacts
    .route("/contacts/{id}", get(contacts::get_one::<S>))
    .route("/contacts/{id}/evaluate", get(contacts::evaluate_one::<S>))
    .route("/contacts/{id}/sends", post(contacts::report::<S>))
    .route("/contacts/{id}/events", post(contacts::record_event::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
