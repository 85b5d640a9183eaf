//! The `CampaignStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `drip-store-sqlite`).
//! The automation pass and the HTTP layer depend on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  campaign::{Campaign, CampaignStatus, NewCampaign, SequenceStep},
  contact::{Contact, NewContact, ProgressUpdate},
};

/// Abstraction over a campaign store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait CampaignStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Campaigns ─────────────────────────────────────────────────────────

  /// Create and persist a campaign. `created_at` is set by the store.
  fn create_campaign(
    &self,
    input: NewCampaign,
  ) -> impl Future<Output = Result<Campaign, Self::Error>> + Send + '_;

  /// Retrieve a campaign by UUID. Returns `None` if not found.
  fn get_campaign(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Campaign>, Self::Error>> + Send + '_;

  /// Change a campaign's status. Returns `None` if the campaign does not
  /// exist.
  fn set_campaign_status(
    &self,
    id: Uuid,
    status: CampaignStatus,
  ) -> impl Future<Output = Result<Option<Campaign>, Self::Error>> + Send + '_;

  // ── Sequence steps ────────────────────────────────────────────────────

  /// Replace all of a campaign's steps. Callers validate the sequence first.
  fn replace_sequence_steps(
    &self,
    campaign_id: Uuid,
    steps: Vec<SequenceStep>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// A campaign's steps, ordered by step number.
  fn sequence_steps(
    &self,
    campaign_id: Uuid,
  ) -> impl Future<Output = Result<Vec<SequenceStep>, Self::Error>> + Send + '_;

  // ── Contacts ──────────────────────────────────────────────────────────

  /// Create and persist a contact in `campaign_id` with no progress.
  fn add_contact(
    &self,
    campaign_id: Uuid,
    input: NewContact,
  ) -> impl Future<Output = Result<Contact, Self::Error>> + Send + '_;

  /// Retrieve a contact by id. Returns `None` if not found.
  fn get_contact<'a>(
    &'a self,
    contact_id: &'a str,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + 'a;

  /// List a campaign's contacts in creation order. Terminal contacts
  /// (completed, replied, unsubscribed, bounced) are skipped unless
  /// `include_terminal` is set.
  fn list_contacts(
    &self,
    campaign_id: Uuid,
    include_terminal: bool,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;

  /// Write a contact's progress if its stored `sequence_step` and `status`
  /// still equal `update.expected_step` and `update.expected_status`,
  /// recording `update.send` in the same transaction.
  ///
  /// Returns the updated contact, or `None` if the guard failed or the
  /// contact does not exist.
  fn update_progress(
    &self,
    update: ProgressUpdate,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  // ── Send log ──────────────────────────────────────────────────────────

  /// Number of sends recorded for the campaign at or after `since`.
  fn count_sends_since(
    &self,
    campaign_id: Uuid,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + '_;
}
