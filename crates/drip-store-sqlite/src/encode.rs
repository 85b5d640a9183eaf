//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings in UTC with
//! nanosecond precision, so that string comparison in SQL matches
//! chronological order and a stored instant reads back unchanged. Status enums use
//! their snake_case names. Settings and schedules are stored as compact JSON.
//! UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use drip_core::{
  campaign::{Campaign, CampaignSettings, SequenceStep, Timing},
  contact::Contact,
  schedule::SequenceSchedule,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Enums ───────────────────────────────────────────────────────────────────

/// Parse a status-like column through its `FromStr` impl.
pub fn decode_enum<T: FromStr>(column: &'static str, value: &str) -> Result<T> {
  value.parse().map_err(|_| Error::UnknownValue {
    column,
    value: value.to_owned(),
  })
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_settings(settings: &CampaignSettings) -> Result<String> {
  Ok(serde_json::to_string(settings)?)
}

pub fn encode_schedule(schedule: Option<&SequenceSchedule>) -> Result<Option<String>> {
  schedule
    .map(serde_json::to_string)
    .transpose()
    .map_err(Error::from)
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub struct RawCampaign {
  pub campaign_id: String,
  pub name:        String,
  pub status:      String,
  pub settings:    String,
  pub created_at:  String,
}

pub const CAMPAIGN_COLUMNS: &str = "campaign_id, name, status, settings, created_at";

impl RawCampaign {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      campaign_id: row.get(0)?,
      name:        row.get(1)?,
      status:      row.get(2)?,
      settings:    row.get(3)?,
      created_at:  row.get(4)?,
    })
  }

  pub fn into_campaign(self) -> Result<Campaign> {
    Ok(Campaign {
      campaign_id: decode_uuid(&self.campaign_id)?,
      name:        self.name,
      status:      decode_enum("campaigns.status", &self.status)?,
      settings:    serde_json::from_str(&self.settings)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawStep {
  pub step_number:  u32,
  pub subject:      String,
  pub content:      String,
  pub timing_value: u32,
  pub timing_unit:  String,
}

impl RawStep {
  pub fn into_step(self) -> Result<SequenceStep> {
    Ok(SequenceStep {
      step_number: self.step_number,
      subject:     self.subject,
      content:     self.content,
      timing:      Timing {
        value: self.timing_value,
        unit:  decode_enum("sequence_steps.timing_unit", &self.timing_unit)?,
      },
    })
  }
}

pub struct RawContact {
  pub contact_id:        String,
  pub campaign_id:       String,
  pub email:             String,
  pub first_name:        Option<String>,
  pub last_name:         Option<String>,
  pub company:           Option<String>,
  pub timezone:          Option<String>,
  pub location:          Option<String>,
  pub status:            String,
  pub sequence_step:     u32,
  pub created_at:        String,
  pub last_contacted_at: Option<String>,
  pub next_email_due:    Option<String>,
  pub sequence_schedule: Option<String>,
}

pub const CONTACT_COLUMNS: &str = "contact_id, campaign_id, email, first_name, last_name, \
                                   company, timezone, location, status, sequence_step, \
                                   created_at, last_contacted_at, next_email_due, \
                                   sequence_schedule";

impl RawContact {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      contact_id:        row.get(0)?,
      campaign_id:       row.get(1)?,
      email:             row.get(2)?,
      first_name:        row.get(3)?,
      last_name:         row.get(4)?,
      company:           row.get(5)?,
      timezone:          row.get(6)?,
      location:          row.get(7)?,
      status:            row.get(8)?,
      sequence_step:     row.get(9)?,
      created_at:        row.get(10)?,
      last_contacted_at: row.get(11)?,
      next_email_due:    row.get(12)?,
      sequence_schedule: row.get(13)?,
    })
  }

  pub fn into_contact(self) -> Result<Contact> {
    let sequence_schedule = self
      .sequence_schedule
      .as_deref()
      .map(serde_json::from_str)
      .transpose()?;

    Ok(Contact {
      contact_id: self.contact_id,
      campaign_id: decode_uuid(&self.campaign_id)?,
      email: self.email,
      first_name: self.first_name,
      last_name: self.last_name,
      company: self.company,
      timezone: self.timezone,
      location: self.location,
      status: decode_enum("contacts.status", &self.status)?,
      sequence_step: self.sequence_step,
      created_at: decode_dt(&self.created_at)?,
      last_contacted_at: decode_opt_dt(self.last_contacted_at)?,
      next_email_due: decode_opt_dt(self.next_email_due)?,
      sequence_schedule,
    })
  }
}
