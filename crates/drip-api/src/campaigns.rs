//! Handlers for `/campaigns` endpoints.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use drip_core::{
  automation::{DuePass, due_contacts},
  campaign::{Campaign, CampaignStatus, NewCampaign, SequenceStep, validate_steps},
  contact::{Contact, NewContact, ProgressUpdate},
  location::resolve_timezone,
  schedule::plan,
  store::CampaignStore,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{AppState, AtParams, auth::Authenticated, error::ApiError};

async fn load<S: CampaignStore>(store: &S, id: Uuid) -> Result<Campaign, ApiError> {
  store
    .get_campaign(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("campaign {id} not found")))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /campaigns`
pub async fn create<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  Json(body): Json<NewCampaign>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CampaignStore + Clone + Send + Sync + 'static,
{
  body
    .settings
    .window()
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

  let campaign = state
    .store
    .create_campaign(body)
    .await
    .map_err(ApiError::store)?;
  info!(campaign_id = %campaign.campaign_id, name = %campaign.name, "created campaign");
  Ok((StatusCode::CREATED, Json(campaign)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CampaignWithSteps {
  #[serde(flatten)]
  pub campaign: Campaign,
  pub steps:    Vec<SequenceStep>,
}

/// `GET /campaigns/{id}`
pub async fn get_one<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<CampaignWithSteps>, ApiError>
where
  S: CampaignStore + Clone + Send + Sync + 'static,
{
  let campaign = load(state.store.as_ref(), id).await?;
  let steps = state
    .store
    .sequence_steps(id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(CampaignWithSteps { campaign, steps }))
}

// ─── Status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: CampaignStatus,
}

/// `PUT /campaigns/{id}/status`, body: `{"status":"active"}`
pub async fn set_status<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Campaign>, ApiError>
where
  S: CampaignStore + Clone + Send + Sync + 'static,
{
  let campaign = state
    .store
    .set_campaign_status(id, body.status)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("campaign {id} not found")))?;
  info!(campaign_id = %id, status = %campaign.status, "campaign status changed");
  Ok(Json(campaign))
}

// ─── Steps ────────────────────────────────────────────────────────────────────

/// `PUT /campaigns/{id}/steps`, body: the full ordered sequence.
pub async fn replace_steps<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(mut steps): Json<Vec<SequenceStep>>,
) -> Result<Json<Vec<SequenceStep>>, ApiError>
where
  S: CampaignStore + Clone + Send + Sync + 'static,
{
  load(state.store.as_ref(), id).await?;
  validate_steps(&mut steps).map_err(|e| ApiError::BadRequest(e.to_string()))?;

  state
    .store
    .replace_sequence_steps(id, steps.clone())
    .await
    .map_err(ApiError::store)?;
  info!(campaign_id = %id, steps = steps.len(), "replaced sequence");
  Ok(Json(steps))
}

// ─── Contacts ─────────────────────────────────────────────────────────────────

/// `POST /campaigns/{id}/contacts`
///
/// The contact's timezone must resolve before it is stored. Its schedule is
/// planned immediately when the campaign has steps.
pub async fn add_contact<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<NewContact>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CampaignStore + Clone + Send + Sync + 'static,
{
  let campaign = load(state.store.as_ref(), id).await?;
  let window = campaign.settings.window()?;

  if let Some(contact_id) = body.contact_id.as_deref()
    && state
      .store
      .get_contact(contact_id)
      .await
      .map_err(ApiError::store)?
      .is_some()
  {
    return Err(ApiError::Conflict(format!("contact {contact_id} already exists")));
  }
  resolve_timezone(
    body.contact_id.as_deref().unwrap_or("new contact"),
    body.timezone.as_deref(),
    body.location.as_deref(),
  )?;

  let contact = state
    .store
    .add_contact(id, body)
    .await
    .map_err(ApiError::store)?;

  let steps = state
    .store
    .sequence_steps(id)
    .await
    .map_err(ApiError::store)?;
  let contact = if steps.is_empty() {
    contact
  } else {
    let schedule = plan(&contact, &steps, &window, Utc::now())?;
    let mut update = ProgressUpdate::from_contact(&contact);
    update.next_email_due = schedule.next_due(contact.sequence_step).map(|e| e.scheduled_at);
    update.sequence_schedule = Some(schedule);
    state
      .store
      .update_progress(update)
      .await
      .map_err(ApiError::store)?
      .unwrap_or(contact)
  };

  info!(campaign_id = %id, contact_id = %contact.contact_id, "added contact");
  Ok((StatusCode::CREATED, Json::<Contact>(contact)))
}

// ─── Due ──────────────────────────────────────────────────────────────────────

/// `GET /campaigns/{id}/due[?now=<RFC 3339>]`
pub async fn due<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<AtParams>,
) -> Result<Json<DuePass>, ApiError>
where
  S: CampaignStore + Clone + Send + Sync + 'static,
{
  let pass = due_contacts(state.store.as_ref(), id, params.now()).await?;
  Ok(Json(pass))
}
