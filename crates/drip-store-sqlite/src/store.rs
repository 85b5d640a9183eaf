//! [`SqliteStore`], the SQLite implementation of [`CampaignStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use drip_core::{
  campaign::{Campaign, CampaignStatus, NewCampaign, SequenceStep},
  contact::{Contact, ContactStatus, NewContact, ProgressUpdate},
  store::CampaignStore,
};

use crate::{
  Error, Result,
  encode::{
    CAMPAIGN_COLUMNS, CONTACT_COLUMNS, RawCampaign, RawContact, RawStep, encode_dt,
    encode_schedule, encode_settings, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Drip campaign store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn campaign_exists(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM campaigns WHERE campaign_id = ?1",
              rusqlite::params![id_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }
}

// ─── CampaignStore impl ──────────────────────────────────────────────────────

impl CampaignStore for SqliteStore {
  type Error = Error;

  // ── Campaigns ─────────────────────────────────────────────────────────────

  async fn create_campaign(&self, input: NewCampaign) -> Result<Campaign> {
    let campaign = Campaign {
      campaign_id: Uuid::new_v4(),
      name:        input.name,
      status:      input.status,
      settings:    input.settings,
      created_at:  Utc::now(),
    };

    let id_str       = encode_uuid(campaign.campaign_id);
    let name         = campaign.name.clone();
    let status_str   = campaign.status.to_string();
    let settings_str = encode_settings(&campaign.settings)?;
    let at_str       = encode_dt(campaign.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO campaigns (campaign_id, name, status, settings, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, name, status_str, settings_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(campaign)
  }

  async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawCampaign> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE campaign_id = ?1"),
              rusqlite::params![id_str],
              RawCampaign::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCampaign::into_campaign).transpose()
  }

  async fn set_campaign_status(
    &self,
    id: Uuid,
    status: CampaignStatus,
  ) -> Result<Option<Campaign>> {
    let id_str     = encode_uuid(id);
    let status_str = status.to_string();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE campaigns SET status = ?2 WHERE campaign_id = ?1",
          rusqlite::params![id_str, status_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.get_campaign(id).await
  }

  // ── Sequence steps ────────────────────────────────────────────────────────

  async fn replace_sequence_steps(
    &self,
    campaign_id: Uuid,
    steps: Vec<SequenceStep>,
  ) -> Result<()> {
    if !self.campaign_exists(campaign_id).await? {
      return Err(Error::CampaignNotFound(campaign_id));
    }
    let id_str = encode_uuid(campaign_id);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM sequence_steps WHERE campaign_id = ?1",
          rusqlite::params![id_str],
        )?;
        for step in &steps {
          tx.execute(
            "INSERT INTO sequence_steps (
               campaign_id, step_number, subject, content, timing_value, timing_unit
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
              id_str,
              step.step_number,
              step.subject,
              step.content,
              step.timing.value,
              step.timing.unit.to_string(),
            ],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn sequence_steps(&self, campaign_id: Uuid) -> Result<Vec<SequenceStep>> {
    let id_str = encode_uuid(campaign_id);

    let raws: Vec<RawStep> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT step_number, subject, content, timing_value, timing_unit
           FROM sequence_steps WHERE campaign_id = ?1 ORDER BY step_number",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawStep {
              step_number:  row.get(0)?,
              subject:      row.get(1)?,
              content:      row.get(2)?,
              timing_value: row.get(3)?,
              timing_unit:  row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStep::into_step).collect()
  }

  // ── Contacts ──────────────────────────────────────────────────────────────

  async fn add_contact(&self, campaign_id: Uuid, input: NewContact) -> Result<Contact> {
    if !self.campaign_exists(campaign_id).await? {
      return Err(Error::CampaignNotFound(campaign_id));
    }

    let contact = Contact {
      contact_id:        input.contact_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
      campaign_id,
      email:             input.email,
      first_name:        input.first_name,
      last_name:         input.last_name,
      company:           input.company,
      timezone:          input.timezone,
      location:          input.location,
      status:            ContactStatus::NotContacted,
      sequence_step:     0,
      created_at:        Utc::now(),
      last_contacted_at: None,
      next_email_due:    None,
      sequence_schedule: None,
    };

    if self.get_contact(&contact.contact_id).await?.is_some() {
      return Err(Error::DuplicateContact(contact.contact_id));
    }

    let row = contact.clone();
    let campaign_str = encode_uuid(campaign_id);
    let status_str   = row.status.to_string();
    let at_str       = encode_dt(row.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO contacts (
             contact_id, campaign_id, email, first_name, last_name, company,
             timezone, location, status, sequence_step, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10)",
          rusqlite::params![
            row.contact_id,
            campaign_str,
            row.email,
            row.first_name,
            row.last_name,
            row.company,
            row.timezone,
            row.location,
            status_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(contact)
  }

  async fn get_contact<'a>(&'a self, contact_id: &'a str) -> Result<Option<Contact>> {
    let id = contact_id.to_owned();

    let raw: Option<RawContact> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE contact_id = ?1"),
              rusqlite::params![id],
              RawContact::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawContact::into_contact).transpose()
  }

  async fn list_contacts(
    &self,
    campaign_id: Uuid,
    include_terminal: bool,
  ) -> Result<Vec<Contact>> {
    let id_str = encode_uuid(campaign_id);

    let raws: Vec<RawContact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONTACT_COLUMNS} FROM contacts
           WHERE campaign_id = ?1 ORDER BY created_at, contact_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawContact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let contacts = raws
      .into_iter()
      .map(RawContact::into_contact)
      .collect::<Result<Vec<_>>>()?;

    Ok(
      contacts
        .into_iter()
        .filter(|c| include_terminal || !c.status.is_terminal())
        .collect(),
    )
  }

  async fn update_progress(&self, update: ProgressUpdate) -> Result<Option<Contact>> {
    let contact_id   = update.contact_id.clone();
    let expected_str = update.expected_status.to_string();
    let status_str   = update.status.to_string();
    let last_str     = update.last_contacted_at.map(encode_dt);
    let due_str      = update.next_email_due.map(encode_dt);
    let schedule_str = encode_schedule(update.sequence_schedule.as_ref())?;
    let send         = update
      .send
      .map(|s| (s.step, encode_dt(s.sent_at)));
    let id           = contact_id.clone();

    let applied = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE contacts
           SET sequence_step = ?3, status = ?4, last_contacted_at = ?5,
               next_email_due = ?6, sequence_schedule = ?7
           WHERE contact_id = ?1 AND sequence_step = ?2 AND status = ?8",
          rusqlite::params![
            id,
            update.expected_step,
            update.sequence_step,
            status_str,
            last_str,
            due_str,
            schedule_str,
            expected_str,
          ],
        )?;
        if changed == 0 {
          return Ok(false);
        }
        if let Some((step, sent_at)) = send {
          tx.execute(
            "INSERT INTO sends (campaign_id, contact_id, step, sent_at)
             SELECT campaign_id, contact_id, ?2, ?3 FROM contacts WHERE contact_id = ?1",
            rusqlite::params![id, step, sent_at],
          )?;
        }
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !applied {
      return Ok(None);
    }
    self.get_contact(&contact_id).await
  }

  // ── Send log ──────────────────────────────────────────────────────────────

  async fn count_sends_since(&self, campaign_id: Uuid, since: DateTime<Utc>) -> Result<u32> {
    let id_str    = encode_uuid(campaign_id);
    let since_str = encode_dt(since);

    let count: u32 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM sends WHERE campaign_id = ?1 AND sent_at >= ?2",
          rusqlite::params![id_str, since_str],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(count)
  }
}
