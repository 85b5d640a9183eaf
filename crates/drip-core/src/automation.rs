//! The automation pass: find the contacts whose next email should go out now,
//! and record what happened when it did.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  campaign::{Campaign, CampaignStatus, SequenceStep},
  contact::{Contact, ContactEvent, ContactStatus, ProgressUpdate, SendRecord},
  evaluator::{Decision, evaluate},
  schedule::{apply_send, plan},
  store::CampaignStore,
  window::SendingWindow,
};

/// A contact whose next step should be sent now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueContact {
  pub contact_id:   String,
  pub email:        String,
  pub step:         u32,
  pub subject:      String,
  pub scheduled_at: DateTime<Utc>,
}

/// A contact that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationFailure {
  pub contact_id: String,
  pub error:      String,
}

/// Result of one automation pass over a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuePass {
  pub campaign_id:      Uuid,
  pub campaign_status:  CampaignStatus,
  pub evaluated_at:     DateTime<Utc>,
  /// Ordered by `scheduled_at`, earliest first.
  pub due:              Vec<DueContact>,
  /// Contacts marked completed during this pass.
  pub completed:        Vec<String>,
  pub failures:         Vec<EvaluationFailure>,
  /// Due contacts held back by the campaign's daily limit.
  pub held_by_limit:    usize,
}

impl DuePass {
  fn empty(campaign: &Campaign, now: DateTime<Utc>) -> Self {
    Self {
      campaign_id:     campaign.campaign_id,
      campaign_status: campaign.status,
      evaluated_at:    now,
      due:             Vec::new(),
      completed:       Vec::new(),
      failures:        Vec::new(),
      held_by_limit:   0,
    }
  }
}

async fn load_campaign<S: CampaignStore>(
  store: &S,
  campaign_id: Uuid,
) -> Result<(Campaign, Vec<SequenceStep>, SendingWindow)> {
  let campaign = store
    .get_campaign(campaign_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::CampaignNotFound(campaign_id))?;
  let window = campaign.settings.window()?;
  let steps = store
    .sequence_steps(campaign_id)
    .await
    .map_err(Error::store)?;
  Ok((campaign, steps, window))
}

/// What one contact contributes to a pass.
enum Outcome {
  Due(DueContact),
  Waiting,
  Completed,
  /// The contact's progress changed while it was being evaluated.
  Moved,
}

async fn process_contact<S: CampaignStore>(
  store: &S,
  contact: &Contact,
  steps: &[SequenceStep],
  window: &SendingWindow,
  now: DateTime<Utc>,
) -> Result<Outcome> {
  let decision = evaluate(contact, steps, window, now)?;

  if decision == Decision::Complete {
    if contact.status == ContactStatus::Completed {
      return Ok(Outcome::Waiting);
    }
    let mut update = ProgressUpdate::from_contact(contact);
    update.status = ContactStatus::Completed;
    update.next_email_due = None;
    let written = store.update_progress(update).await.map_err(Error::store)?;
    return Ok(if written.is_some() { Outcome::Completed } else { Outcome::Moved });
  }

  let schedule = plan(contact, steps, window, now)?;
  let unchanged = contact.next_email_due == decision.scheduled_at()
    && contact
      .sequence_schedule
      .as_ref()
      .is_some_and(|s| s.same_plan(&schedule));

  if !unchanged {
    let mut update = ProgressUpdate::from_contact(contact);
    update.next_email_due = decision.scheduled_at();
    update.sequence_schedule = Some(schedule);
    if store.update_progress(update).await.map_err(Error::store)?.is_none() {
      return Ok(Outcome::Moved);
    }
  }

  match decision {
    Decision::Due { step, scheduled_at } => {
      let subject = steps
        .iter()
        .find(|s| s.step_number == step)
        .map(|s| s.subject.clone())
        .unwrap_or_default();
      Ok(Outcome::Due(DueContact {
        contact_id: contact.contact_id.clone(),
        email: contact.email.clone(),
        step,
        subject,
        scheduled_at,
      }))
    }
    _ => Ok(Outcome::Waiting),
  }
}

/// Evaluate every live contact in a campaign at `now`.
///
/// Refreshes stored schedules as a side effect and marks contacts whose
/// sequence is exhausted as completed. A contact that fails to evaluate is
/// reported in [`DuePass::failures`] and does not stop the pass. Campaigns
/// that are not active produce an empty pass.
pub async fn due_contacts<S: CampaignStore>(
  store: &S,
  campaign_id: Uuid,
  now: DateTime<Utc>,
) -> Result<DuePass> {
  let (campaign, steps, window) = load_campaign(store, campaign_id).await?;
  let mut pass = DuePass::empty(&campaign, now);

  if campaign.status != CampaignStatus::Active {
    info!(%campaign_id, status = %campaign.status, "campaign not active, skipping");
    return Ok(pass);
  }
  if steps.is_empty() {
    return Err(Error::InvalidSequence("campaign has no steps".into()));
  }

  let contacts = store
    .list_contacts(campaign_id, false)
    .await
    .map_err(Error::store)?;

  for contact in &contacts {
    match process_contact(store, contact, &steps, &window, now).await {
      Ok(Outcome::Due(due)) => {
        debug!(contact_id = %due.contact_id, step = due.step, scheduled_at = %due.scheduled_at, "due");
        pass.due.push(due);
      }
      Ok(Outcome::Waiting) => {
        debug!(contact_id = %contact.contact_id, "not due");
      }
      Ok(Outcome::Completed) => {
        debug!(contact_id = %contact.contact_id, "sequence complete");
        pass.completed.push(contact.contact_id.clone());
      }
      Ok(Outcome::Moved) => {
        debug!(contact_id = %contact.contact_id, "progress changed during evaluation, skipping");
      }
      Err(e @ Error::Store(_)) => return Err(e),
      Err(e) => {
        warn!(contact_id = %contact.contact_id, error = %e, "failed to evaluate contact");
        pass.failures.push(EvaluationFailure {
          contact_id: contact.contact_id.clone(),
          error:      e.to_string(),
        });
      }
    }
  }

  pass
    .due
    .sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then_with(|| a.contact_id.cmp(&b.contact_id)));

  if let Some(limit) = campaign.settings.daily_limit {
    let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let sent_today = store
      .count_sends_since(campaign_id, day_start)
      .await
      .map_err(Error::store)?;
    let remaining = limit.saturating_sub(sent_today) as usize;
    if pass.due.len() > remaining {
      pass.held_by_limit = pass.due.len() - remaining;
      pass.due.truncate(remaining);
    }
  }

  info!(
    %campaign_id,
    evaluated = contacts.len(),
    due = pass.due.len(),
    completed = pass.completed.len(),
    failed = pass.failures.len(),
    held = pass.held_by_limit,
    "automation pass finished"
  );

  Ok(pass)
}

/// What happened when the caller tried to send a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SendOutcome {
  Sent {
    step:    u32,
    sent_at: DateTime<Utc>,
  },
  Failed {
    step:   u32,
    #[serde(default)]
    reason: Option<String>,
  },
}

impl SendOutcome {
  pub fn step(&self) -> u32 {
    match self {
      Self::Sent { step, .. } | Self::Failed { step, .. } => *step,
    }
  }
}

async fn load_contact<S: CampaignStore>(store: &S, contact_id: &str) -> Result<Contact> {
  store
    .get_contact(contact_id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::ContactNotFound(contact_id.to_owned()))
}

/// The error for a guarded write of `before` that found the contact changed.
async fn conflict<S: CampaignStore>(store: &S, before: &Contact) -> Error {
  let current = match load_contact(store, &before.contact_id).await {
    Ok(current) => current,
    Err(e) => return e,
  };
  if current.sequence_step != before.sequence_step {
    Error::StepConflict {
      contact_id: before.contact_id.clone(),
      expected:   before.sequence_step,
      actual:     current.sequence_step,
    }
  } else {
    Error::StatusConflict {
      contact_id: before.contact_id.clone(),
      expected:   before.status,
      actual:     current.status,
    }
  }
}

/// Record the outcome of sending a contact's next step.
///
/// A successful send advances the contact by exactly one step; a failed one
/// marks it `error` and leaves the step where it was. Either way the
/// reported step must be the contact's next step. Contacts that replied,
/// unsubscribed or bounced accept no further sends.
pub async fn report_send<S: CampaignStore>(
  store: &S,
  contact_id: &str,
  outcome: SendOutcome,
) -> Result<Contact> {
  let contact = load_contact(store, contact_id).await?;

  if contact.status.is_terminal() && contact.status != ContactStatus::Completed {
    return Err(Error::ContactStopped {
      contact_id: contact.contact_id.clone(),
      status:     contact.status,
    });
  }

  let step = outcome.step();
  if step != contact.sequence_step + 1 {
    return Err(Error::StepConflict {
      contact_id: contact.contact_id.clone(),
      expected:   step.saturating_sub(1),
      actual:     contact.sequence_step,
    });
  }

  let update = match &outcome {
    SendOutcome::Sent { sent_at, .. } => {
      let (_, steps, window) = load_campaign(store, contact.campaign_id).await?;
      let next = apply_send(&contact, step, *sent_at, &steps, &window)?;
      let mut update = ProgressUpdate::replacing(&contact, &next);
      update.send = Some(SendRecord { step, sent_at: *sent_at });
      update
    }
    SendOutcome::Failed { reason, .. } => {
      warn!(%contact_id, step, reason = reason.as_deref().unwrap_or("unknown"), "send failed");
      let mut update = ProgressUpdate::from_contact(&contact);
      update.status = ContactStatus::Error;
      update
    }
  };

  match store.update_progress(update).await.map_err(Error::store)? {
    Some(updated) => {
      info!(%contact_id, step, status = %updated.status, "recorded send outcome");
      Ok(updated)
    }
    None => Err(conflict(store, &contact).await),
  }
}

/// Stop a contact's sequence because they replied, unsubscribed or bounced.
///
/// Clears `next_email_due` so the contact drops out of every later pass.
/// Reporting the status the contact already has is a no-op.
pub async fn report_event<S: CampaignStore>(
  store: &S,
  contact_id: &str,
  event: ContactEvent,
) -> Result<Contact> {
  let contact = load_contact(store, contact_id).await?;
  if contact.status == event.status() {
    return Ok(contact);
  }

  let mut update = ProgressUpdate::from_contact(&contact);
  update.status = event.status();
  update.next_email_due = None;

  match store.update_progress(update).await.map_err(Error::store)? {
    Some(updated) => {
      info!(%contact_id, %event, step = updated.sequence_step, "sequence stopped");
      Ok(updated)
    }
    None => Err(conflict(store, &contact).await),
  }
}

#[cfg(test)]
mod tests {
  use std::{convert::Infallible, sync::Mutex};

  use chrono::Duration;

  use super::*;
  use crate::{
    campaign::{CampaignSettings, NewCampaign, Timing},
    contact::NewContact,
    evaluator::tests::{steps, utc},
  };

  /// In-memory store; `sends` holds `(campaign_id, sent_at)`.
  #[derive(Default)]
  struct MemoryStore {
    campaigns: Mutex<Vec<Campaign>>,
    steps:     Mutex<Vec<(Uuid, Vec<SequenceStep>)>>,
    contacts:  Mutex<Vec<Contact>>,
    sends:     Mutex<Vec<(Uuid, DateTime<Utc>)>>,
  }

  impl CampaignStore for MemoryStore {
    type Error = Infallible;

    async fn create_campaign(&self, input: NewCampaign) -> Result<Campaign, Infallible> {
      let campaign = Campaign {
        campaign_id: Uuid::new_v4(),
        name:        input.name,
        status:      input.status,
        settings:    input.settings,
        created_at:  Utc::now(),
      };
      self.campaigns.lock().unwrap().push(campaign.clone());
      Ok(campaign)
    }

    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, Infallible> {
      let campaigns = self.campaigns.lock().unwrap();
      Ok(campaigns.iter().find(|c| c.campaign_id == id).cloned())
    }

    async fn set_campaign_status(
      &self,
      id: Uuid,
      status: CampaignStatus,
    ) -> Result<Option<Campaign>, Infallible> {
      let mut campaigns = self.campaigns.lock().unwrap();
      Ok(campaigns.iter_mut().find(|c| c.campaign_id == id).map(|c| {
        c.status = status;
        c.clone()
      }))
    }

    async fn replace_sequence_steps(
      &self,
      campaign_id: Uuid,
      new_steps: Vec<SequenceStep>,
    ) -> Result<(), Infallible> {
      let mut steps = self.steps.lock().unwrap();
      steps.retain(|(id, _)| *id != campaign_id);
      steps.push((campaign_id, new_steps));
      Ok(())
    }

    async fn sequence_steps(&self, campaign_id: Uuid) -> Result<Vec<SequenceStep>, Infallible> {
      let steps = self.steps.lock().unwrap();
      Ok(
        steps
          .iter()
          .find(|(id, _)| *id == campaign_id)
          .map(|(_, s)| s.clone())
          .unwrap_or_default(),
      )
    }

    async fn add_contact(&self, campaign_id: Uuid, input: NewContact) -> Result<Contact, Infallible> {
      let contact = Contact {
        contact_id: input.contact_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        campaign_id,
        email: input.email,
        first_name: input.first_name,
        last_name: input.last_name,
        company: input.company,
        timezone: input.timezone,
        location: input.location,
        status: ContactStatus::NotContacted,
        sequence_step: 0,
        created_at: Utc::now(),
        last_contacted_at: None,
        next_email_due: None,
        sequence_schedule: None,
      };
      self.contacts.lock().unwrap().push(contact.clone());
      Ok(contact)
    }

    async fn get_contact<'a>(&'a self, contact_id: &'a str) -> Result<Option<Contact>, Infallible> {
      let contacts = self.contacts.lock().unwrap();
      Ok(contacts.iter().find(|c| c.contact_id == contact_id).cloned())
    }

    async fn list_contacts(
      &self,
      campaign_id: Uuid,
      include_terminal: bool,
    ) -> Result<Vec<Contact>, Infallible> {
      let contacts = self.contacts.lock().unwrap();
      Ok(
        contacts
          .iter()
          .filter(|c| c.campaign_id == campaign_id)
          .filter(|c| include_terminal || !c.status.is_terminal())
          .cloned()
          .collect(),
      )
    }

    async fn update_progress(&self, update: ProgressUpdate) -> Result<Option<Contact>, Infallible> {
      let mut contacts = self.contacts.lock().unwrap();
      let Some(contact) = contacts
        .iter_mut()
        .find(|c| {
          c.contact_id == update.contact_id
            && c.sequence_step == update.expected_step
            && c.status == update.expected_status
        })
      else {
        return Ok(None);
      };
      contact.sequence_step = update.sequence_step;
      contact.status = update.status;
      contact.last_contacted_at = update.last_contacted_at;
      contact.next_email_due = update.next_email_due;
      contact.sequence_schedule = update.sequence_schedule;
      if let Some(send) = update.send {
        self.sends.lock().unwrap().push((contact.campaign_id, send.sent_at));
      }
      Ok(Some(contact.clone()))
    }

    async fn count_sends_since(
      &self,
      campaign_id: Uuid,
      since: DateTime<Utc>,
    ) -> Result<u32, Infallible> {
      let sends = self.sends.lock().unwrap();
      Ok(sends.iter().filter(|(id, at)| *id == campaign_id && *at >= since).count() as u32)
    }
  }

  impl MemoryStore {
    fn set_created_at(&self, contact_id: &str, at: DateTime<Utc>) {
      let mut contacts = self.contacts.lock().unwrap();
      if let Some(c) = contacts.iter_mut().find(|c| c.contact_id == contact_id) {
        c.created_at = at;
      }
    }
  }

  async fn active_campaign(store: &MemoryStore, settings: CampaignSettings) -> Uuid {
    let campaign = store
      .create_campaign(NewCampaign {
        name: "Launch".into(),
        status: CampaignStatus::Active,
        settings,
      })
      .await
      .unwrap();
    store
      .replace_sequence_steps(
        campaign.campaign_id,
        steps(&[Timing::days(0), Timing::days(2)]),
      )
      .await
      .unwrap();
    campaign.campaign_id
  }

  async fn add(store: &MemoryStore, campaign_id: Uuid, id: &str, tz: &str, created: &str) {
    let mut input = NewContact::new(format!("{id}@example.com"));
    input.contact_id = Some(id.into());
    input.timezone = Some(tz.into());
    store.add_contact(campaign_id, input).await.unwrap();
    store.set_created_at(id, utc(created));
  }

  fn every_day() -> CampaignSettings {
    CampaignSettings {
      active_days: vec![
        chrono::Weekday::Mon,
        chrono::Weekday::Tue,
        chrono::Weekday::Wed,
        chrono::Weekday::Thu,
        chrono::Weekday::Fri,
        chrono::Weekday::Sat,
        chrono::Weekday::Sun,
      ],
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn due_pass_orders_and_persists_schedules() {
    let store = MemoryStore::default();
    let id = active_campaign(&store, every_day()).await;
    add(&store, id, "267", "Australia/Sydney", "2025-08-21T01:20:33Z").await;
    add(&store, id, "268", "Europe/London", "2025-08-20T08:00:00Z").await;

    let pass = due_contacts(&store, id, utc("2025-08-22T00:00:00Z")).await.unwrap();
    assert_eq!(pass.due.len(), 2);
    assert!(pass.due[0].scheduled_at <= pass.due[1].scheduled_at);
    assert_eq!(pass.due[0].contact_id, "268");
    assert_eq!(pass.due[1].subject, "Email 1");

    let stored = store.get_contact("267").await.unwrap().unwrap();
    assert_eq!(stored.next_email_due, Some(utc("2025-08-21T03:00:00Z")));
    assert_eq!(stored.sequence_schedule.unwrap().steps.len(), 2);
  }

  #[tokio::test]
  async fn repeated_passes_agree() {
    let store = MemoryStore::default();
    let id = active_campaign(&store, every_day()).await;
    add(&store, id, "267", "Australia/Sydney", "2025-08-21T01:20:33Z").await;

    let now = utc("2025-08-21T02:00:00Z");
    let first = due_contacts(&store, id, now).await.unwrap();
    let second = due_contacts(&store, id, now).await.unwrap();
    assert!(first.due.is_empty());
    assert_eq!(first.due, second.due);
  }

  #[tokio::test]
  async fn inactive_campaign_is_skipped() {
    let store = MemoryStore::default();
    let id = active_campaign(&store, every_day()).await;
    add(&store, id, "1", "UTC", "2025-01-01T00:00:00Z").await;
    store.set_campaign_status(id, CampaignStatus::Paused).await.unwrap();

    let pass = due_contacts(&store, id, utc("2025-06-01T00:00:00Z")).await.unwrap();
    assert_eq!(pass.campaign_status, CampaignStatus::Paused);
    assert!(pass.due.is_empty());
  }

  #[tokio::test]
  async fn bad_timezone_is_reported_not_defaulted() {
    let store = MemoryStore::default();
    let id = active_campaign(&store, every_day()).await;
    add(&store, id, "good", "UTC", "2025-01-01T00:00:00Z").await;
    add(&store, id, "bad", "Mars/Base", "2025-01-01T00:00:00Z").await;

    let pass = due_contacts(&store, id, utc("2025-06-01T00:00:00Z")).await.unwrap();
    assert_eq!(pass.due.len(), 1);
    assert_eq!(pass.failures.len(), 1);
    assert_eq!(pass.failures[0].contact_id, "bad");
  }

  #[tokio::test]
  async fn daily_limit_caps_due_contacts() {
    let store = MemoryStore::default();
    let settings = CampaignSettings { daily_limit: Some(2), ..every_day() };
    let id = active_campaign(&store, settings).await;
    for n in 0..4 {
      add(&store, id, &format!("c{n}"), "UTC", "2025-01-01T00:00:00Z").await;
    }
    let now = utc("2025-06-01T12:00:00Z");

    let pass = due_contacts(&store, id, now).await.unwrap();
    assert_eq!(pass.due.len(), 2);
    assert_eq!(pass.held_by_limit, 2);

    let first = pass.due[0].contact_id.clone();
    report_send(&store, &first, SendOutcome::Sent { step: 1, sent_at: now })
      .await
      .unwrap();

    let pass = due_contacts(&store, id, now).await.unwrap();
    assert_eq!(pass.due.len(), 1);
    assert!(pass.due.iter().all(|d| d.contact_id != first));
  }

  #[tokio::test]
  async fn sends_advance_until_complete() {
    let store = MemoryStore::default();
    let id = active_campaign(&store, every_day()).await;
    add(&store, id, "267", "Europe/London", "2025-09-01T08:00:00Z").await;

    let sent_at = utc("2025-09-01T12:30:00Z");
    let contact = report_send(&store, "267", SendOutcome::Sent { step: 1, sent_at })
      .await
      .unwrap();
    assert_eq!(contact.sequence_step, 1);
    assert_eq!(contact.status, ContactStatus::InProgress);
    let due = contact.next_email_due.unwrap();
    assert!(due > sent_at + Duration::days(1));

    let contact = report_send(&store, "267", SendOutcome::Sent { step: 2, sent_at: due })
      .await
      .unwrap();
    assert_eq!(contact.status, ContactStatus::Completed);
    assert_eq!(contact.next_email_due, None);

    // Completed contacts drop out of later passes.
    let pass = due_contacts(&store, id, due + Duration::days(30)).await.unwrap();
    assert!(pass.due.is_empty());
    assert!(pass.completed.is_empty());
  }

  #[tokio::test]
  async fn duplicate_report_is_a_conflict() {
    let store = MemoryStore::default();
    let id = active_campaign(&store, every_day()).await;
    add(&store, id, "1", "UTC", "2025-09-01T08:00:00Z").await;

    let outcome = SendOutcome::Sent { step: 1, sent_at: utc("2025-09-01T12:00:00Z") };
    report_send(&store, "1", outcome.clone()).await.unwrap();
    let err = report_send(&store, "1", outcome).await.unwrap_err();
    assert!(matches!(err, Error::StepConflict { expected: 0, actual: 1, .. }));
    assert_eq!(store.get_contact("1").await.unwrap().unwrap().sequence_step, 1);
  }

  #[tokio::test]
  async fn failed_send_does_not_advance() {
    let store = MemoryStore::default();
    let id = active_campaign(&store, every_day()).await;
    add(&store, id, "1", "UTC", "2025-09-01T08:00:00Z").await;

    let contact = report_send(&store, "1", SendOutcome::Failed {
      step:   1,
      reason: Some("smtp timeout".into()),
    })
    .await
    .unwrap();
    assert_eq!(contact.status, ContactStatus::Error);
    assert_eq!(contact.sequence_step, 0);

    // Errored contacts are retried by the next pass.
    let pass = due_contacts(&store, id, utc("2025-09-02T00:00:00Z")).await.unwrap();
    assert_eq!(pass.due.len(), 1);
  }

  #[tokio::test]
  async fn replied_contact_leaves_the_pass() {
    let store = MemoryStore::default();
    let id = active_campaign(&store, every_day()).await;
    add(&store, id, "1", "UTC", "2025-09-01T08:00:00Z").await;
    add(&store, id, "2", "UTC", "2025-09-01T08:00:00Z").await;
    let now = utc("2025-09-02T00:00:00Z");
    assert_eq!(due_contacts(&store, id, now).await.unwrap().due.len(), 2);

    let contact = report_event(&store, "1", ContactEvent::Replied).await.unwrap();
    assert_eq!(contact.status, ContactStatus::Replied);
    assert_eq!(contact.next_email_due, None);

    let pass = due_contacts(&store, id, now).await.unwrap();
    assert_eq!(pass.due.len(), 1);
    assert_eq!(pass.due[0].contact_id, "2");
    assert!(pass.completed.is_empty());

    // Reporting it again changes nothing.
    let again = report_event(&store, "1", ContactEvent::Replied).await.unwrap();
    assert_eq!(again.status, ContactStatus::Replied);
  }

  #[tokio::test]
  async fn stopped_contact_accepts_no_sends() {
    let store = MemoryStore::default();
    let id = active_campaign(&store, every_day()).await;
    add(&store, id, "1", "UTC", "2025-09-01T08:00:00Z").await;
    report_event(&store, "1", ContactEvent::Unsubscribed).await.unwrap();

    let sent = SendOutcome::Sent { step: 1, sent_at: utc("2025-09-01T12:00:00Z") };
    let err = report_send(&store, "1", sent).await.unwrap_err();
    assert!(matches!(err, Error::ContactStopped { status: ContactStatus::Unsubscribed, .. }));

    let failed = SendOutcome::Failed { step: 1, reason: None };
    report_send(&store, "1", failed).await.unwrap_err();
    let stored = store.get_contact("1").await.unwrap().unwrap();
    assert_eq!(stored.status, ContactStatus::Unsubscribed);
    assert_eq!(stored.sequence_step, 0);
  }

  #[tokio::test]
  async fn status_change_during_a_pass_is_kept() {
    let store = MemoryStore::default();
    let id = active_campaign(&store, every_day()).await;
    add(&store, id, "1", "UTC", "2025-09-01T08:00:00Z").await;
    let (_, steps, window) = load_campaign(&store, id).await.unwrap();

    // The pass read the contact, then a reply landed before its write.
    let snapshot = store.get_contact("1").await.unwrap().unwrap();
    report_event(&store, "1", ContactEvent::Replied).await.unwrap();

    let outcome = process_contact(&store, &snapshot, &steps, &window, utc("2025-09-02T00:00:00Z"))
      .await
      .unwrap();
    assert!(matches!(outcome, Outcome::Moved));
    let stored = store.get_contact("1").await.unwrap().unwrap();
    assert_eq!(stored.status, ContactStatus::Replied);
    assert_eq!(stored.next_email_due, None);
  }

  #[tokio::test]
  async fn failed_send_during_a_pass_is_kept() {
    let store = MemoryStore::default();
    let id = active_campaign(&store, every_day()).await;
    add(&store, id, "1", "UTC", "2025-09-01T08:00:00Z").await;
    let (_, steps, window) = load_campaign(&store, id).await.unwrap();

    let snapshot = store.get_contact("1").await.unwrap().unwrap();
    report_send(&store, "1", SendOutcome::Failed { step: 1, reason: None })
      .await
      .unwrap();

    let outcome = process_contact(&store, &snapshot, &steps, &window, utc("2025-09-02T00:00:00Z"))
      .await
      .unwrap();
    assert!(matches!(outcome, Outcome::Moved));
    assert_eq!(store.get_contact("1").await.unwrap().unwrap().status, ContactStatus::Error);
  }

  #[tokio::test]
  async fn send_before_the_previous_one_is_rejected() {
    let store = MemoryStore::default();
    let id = active_campaign(&store, every_day()).await;
    add(&store, id, "1", "UTC", "2025-09-01T08:00:00Z").await;

    let first = utc("2025-09-01T12:00:00Z");
    report_send(&store, "1", SendOutcome::Sent { step: 1, sent_at: first })
      .await
      .unwrap();
    let err = report_send(&store, "1", SendOutcome::Sent {
      step:    2,
      sent_at: first - Duration::hours(1),
    })
    .await
    .unwrap_err();
    assert!(matches!(err, Error::InvalidSequence(_)), "{err}");
    assert_eq!(store.get_contact("1").await.unwrap().unwrap().last_contacted_at, Some(first));
  }

  #[tokio::test]
  async fn unknown_contact_is_not_found() {
    let store = MemoryStore::default();
    let err = report_send(&store, "nope", SendOutcome::Failed { step: 1, reason: None })
      .await
      .unwrap_err();
    assert!(matches!(err, Error::ContactNotFound(_)));
  }
}
