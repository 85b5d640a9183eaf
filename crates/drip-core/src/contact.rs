//! Contacts, the people a campaign writes to, and their sequence progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::schedule::SequenceSchedule;

/// Where a contact stands in its campaign.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContactStatus {
  #[default]
  NotContacted,
  InProgress,
  Completed,
  Replied,
  Unsubscribed,
  Bounced,
  /// The last send attempt failed; the step did not advance.
  Error,
}

impl ContactStatus {
  /// Terminal contacts are never considered by an automation pass.
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      Self::Completed | Self::Replied | Self::Unsubscribed | Self::Bounced
    )
  }
}

/// Something the recipient did that stops their sequence for good.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContactEvent {
  Replied,
  Unsubscribed,
  Bounced,
}

impl ContactEvent {
  pub fn status(self) -> ContactStatus {
    match self {
      Self::Replied => ContactStatus::Replied,
      Self::Unsubscribed => ContactStatus::Unsubscribed,
      Self::Bounced => ContactStatus::Bounced,
    }
  }
}

/// A person targeted by a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
  /// Stable, never reused. Seeds the send-time hash, so it is kept as the
  /// exact text the contact was created with.
  pub contact_id:        String,
  pub campaign_id:       Uuid,
  pub email:             String,
  pub first_name:        Option<String>,
  pub last_name:         Option<String>,
  pub company:           Option<String>,
  /// Explicit IANA timezone; takes precedence over `location`.
  pub timezone:          Option<String>,
  /// Free-text location, e.g. "Sydney, Australia".
  pub location:          Option<String>,
  pub status:            ContactStatus,
  /// Number of steps already sent.
  pub sequence_step:     u32,
  pub created_at:        DateTime<Utc>,
  pub last_contacted_at: Option<DateTime<Utc>>,
  pub next_email_due:    Option<DateTime<Utc>>,
  pub sequence_schedule: Option<SequenceSchedule>,
}

/// Input to [`crate::store::CampaignStore::add_contact`].
///
/// `created_at` is set by the store. When `contact_id` is `None` the store
/// assigns a fresh UUID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewContact {
  pub contact_id: Option<String>,
  pub email:      String,
  pub first_name: Option<String>,
  pub last_name:  Option<String>,
  pub company:    Option<String>,
  pub timezone:   Option<String>,
  pub location:   Option<String>,
}

impl NewContact {
  pub fn new(email: impl Into<String>) -> Self {
    Self { email: email.into(), ..Self::default() }
  }
}

/// A guarded write of a contact's progress. The store applies it only when the
/// stored `sequence_step` and `status` still equal `expected_step` and
/// `expected_status`.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
  pub contact_id:        String,
  pub expected_step:     u32,
  pub expected_status:   ContactStatus,
  pub sequence_step:     u32,
  pub status:            ContactStatus,
  pub last_contacted_at: Option<DateTime<Utc>>,
  pub next_email_due:    Option<DateTime<Utc>>,
  pub sequence_schedule: Option<SequenceSchedule>,
  /// Set when this update records a completed send.
  pub send:              Option<SendRecord>,
}

impl ProgressUpdate {
  /// An update that rewrites `contact` as it currently stands, guarded on its
  /// current step and status.
  pub fn from_contact(contact: &Contact) -> Self { Self::replacing(contact, contact) }

  /// An update that writes `next` over `current`, guarded on `current`'s step
  /// and status.
  pub fn replacing(current: &Contact, next: &Contact) -> Self {
    Self {
      contact_id:        current.contact_id.clone(),
      expected_step:     current.sequence_step,
      expected_status:   current.status,
      sequence_step:     next.sequence_step,
      status:            next.status,
      last_contacted_at: next.last_contacted_at,
      next_email_due:    next.next_email_due,
      sequence_schedule: next.sequence_schedule.clone(),
      send:              None,
    }
  }
}

/// One email that went out, kept for daily-limit accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRecord {
  pub step:    u32,
  pub sent_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn terminal_statuses() {
    assert!(ContactStatus::Replied.is_terminal());
    assert!(ContactStatus::Bounced.is_terminal());
    assert!(!ContactStatus::Error.is_terminal());
    assert!(!ContactStatus::InProgress.is_terminal());
  }

  #[test]
  fn events_map_to_terminal_statuses() {
    for event in [ContactEvent::Replied, ContactEvent::Unsubscribed, ContactEvent::Bounced] {
      assert!(event.status().is_terminal());
      assert_eq!(event.to_string(), event.status().to_string());
    }
  }

  #[test]
  fn status_strings() {
    assert_eq!(ContactStatus::NotContacted.to_string(), "not_contacted");
    assert_eq!(
      "unsubscribed".parse::<ContactStatus>().unwrap(),
      ContactStatus::Unsubscribed
    );
  }
}
