//! Handlers for `/contacts` endpoints.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use drip_core::{
  automation::{SendOutcome, report_event, report_send},
  contact::{Contact, ContactEvent},
  evaluator::{Decision, evaluate},
  store::CampaignStore,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, AtParams, auth::Authenticated, error::ApiError};

async fn load<S: CampaignStore>(store: &S, id: &str) -> Result<Contact, ApiError> {
  store
    .get_contact(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("contact {id} not found")))
}

/// `GET /contacts/{id}`
pub async fn get_one<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<Json<Contact>, ApiError>
where
  S: CampaignStore + Clone + Send + Sync + 'static,
{
  Ok(Json(load(state.store.as_ref(), &id).await?))
}

#[derive(Debug, Serialize)]
pub struct Evaluation {
  pub contact_id:    String,
  pub sequence_step: u32,
  #[serde(flatten)]
  pub decision:      Decision,
}

/// `GET /contacts/{id}/evaluate[?now=<RFC 3339>]`
///
/// Read-only: nothing is persisted.
pub async fn evaluate_one<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
  Query(params): Query<AtParams>,
) -> Result<Json<Evaluation>, ApiError>
where
  S: CampaignStore + Clone + Send + Sync + 'static,
{
  let contact = load(state.store.as_ref(), &id).await?;
  let campaign = state
    .store
    .get_campaign(contact.campaign_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("campaign {} not found", contact.campaign_id)))?;
  let steps = state
    .store
    .sequence_steps(contact.campaign_id)
    .await
    .map_err(ApiError::store)?;

  let window = campaign.settings.window()?;
  let decision = evaluate(&contact, &steps, &window, params.now())?;

  Ok(Json(Evaluation {
    contact_id: contact.contact_id,
    sequence_step: contact.sequence_step,
    decision,
  }))
}

/// `POST /contacts/{id}/sends`
///
/// Body: `{"outcome":"sent","step":1,"sent_at":"…"}` or
/// `{"outcome":"failed","step":1,"reason":"…"}`.
pub async fn report<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
  Json(outcome): Json<SendOutcome>,
) -> Result<Json<Contact>, ApiError>
where
  S: CampaignStore + Clone + Send + Sync + 'static,
{
  let contact = report_send(state.store.as_ref(), &id, outcome).await?;
  Ok(Json(contact))
}

#[derive(Debug, Deserialize)]
pub struct EventBody {
  pub event: ContactEvent,
}

/// `POST /contacts/{id}/events`, body: `{"event":"replied"}`
///
/// Stops the contact's sequence. `event` is one of `replied`, `unsubscribed`
/// or `bounced`.
pub async fn record_event<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
  Json(body): Json<EventBody>,
) -> Result<Json<Contact>, ApiError>
where
  S: CampaignStore + Clone + Send + Sync + 'static,
{
  let contact = report_event(state.store.as_ref(), &id, body.event).await?;
  Ok(Json(contact))
}
