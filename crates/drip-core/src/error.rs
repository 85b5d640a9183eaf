//! Error types for `drip-core`.

use chrono::NaiveTime;
use thiserror::Error;
use uuid::Uuid;

use crate::contact::ContactStatus;

#[derive(Debug, Error)]
pub enum Error {
  // ── Configuration ───────────────────────────────────────────────────────
  #[error("invalid timezone: {0:?}")]
  InvalidTimezone(String),

  #[error("cannot resolve a timezone for contact {contact_id} (location: {location:?})")]
  UnresolvedTimezone {
    contact_id: String,
    location:   Option<String>,
  },

  #[error("campaign has no active sending days")]
  EmptyActiveDays,

  #[error("sending window {start}..{end} is empty or inverted")]
  InvalidSendingWindow { start: NaiveTime, end: NaiveTime },

  #[error("invalid sequence: {0}")]
  InvalidSequence(String),

  // ── Scheduling ──────────────────────────────────────────────────────────
  #[error("no sending slot found for contact {contact_id} step {step} within {days} days")]
  NoSendingSlot {
    contact_id: String,
    step:       u32,
    days:       u32,
  },

  // ── Lookups and concurrency ─────────────────────────────────────────────
  #[error("campaign not found: {0}")]
  CampaignNotFound(Uuid),

  #[error("contact not found: {0}")]
  ContactNotFound(String),

  /// The contact's `sequence_step` moved under the caller: another send was
  /// recorded first, or the caller reported the wrong step.
  #[error("contact {contact_id} is at step {actual}, expected step {expected}")]
  StepConflict {
    contact_id: String,
    expected:   u32,
    actual:     u32,
  },

  /// The contact's status changed under the caller without its step moving,
  /// e.g. a reply was recorded mid-pass.
  #[error("contact {contact_id} is {actual}, expected {expected}")]
  StatusConflict {
    contact_id: String,
    expected:   ContactStatus,
    actual:     ContactStatus,
  },

  /// The contact replied, unsubscribed or bounced; nothing more is sent.
  #[error("contact {contact_id} is {status}; its sequence has stopped")]
  ContactStopped {
    contact_id: String,
    status:     ContactStatus,
  },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Box a backend error raised by a [`CampaignStore`](crate::store::CampaignStore).
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  /// Whether the error stems from malformed campaign or contact configuration
  /// rather than from the store or a concurrent update.
  pub fn is_configuration(&self) -> bool {
    matches!(
      self,
      Self::InvalidTimezone(_)
        | Self::UnresolvedTimezone { .. }
        | Self::EmptyActiveDays
        | Self::InvalidSendingWindow { .. }
        | Self::InvalidSequence(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
