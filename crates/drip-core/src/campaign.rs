//! Campaigns, their sending settings, and their sequence steps.

use chrono::{DateTime, Duration, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result, window::SendingWindow};

// ─── Campaign ────────────────────────────────────────────────────────────────

/// Whether a campaign is currently sending.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CampaignStatus {
  #[default]
  Draft,
  Active,
  Paused,
  Completed,
}

/// Campaign-level constraints on when emails may go out. Times are wall-clock
/// times in each contact's own timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSettings {
  #[serde(default = "default_active_days")]
  pub active_days:        Vec<Weekday>,
  #[serde(default, with = "hhmm")]
  pub sending_start_time: Option<NaiveTime>,
  /// Exclusive upper bound.
  #[serde(default, with = "hhmm")]
  pub sending_end_time:   Option<NaiveTime>,
  /// Maximum sends per campaign per UTC day.
  #[serde(default)]
  pub daily_limit:        Option<u32>,
}

fn default_active_days() -> Vec<Weekday> {
  vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
}

impl Default for CampaignSettings {
  fn default() -> Self {
    Self {
      active_days:        default_active_days(),
      sending_start_time: None,
      sending_end_time:   None,
      daily_limit:        None,
    }
  }
}

impl CampaignSettings {
  /// Validate the settings into a [`SendingWindow`].
  pub fn window(&self) -> Result<SendingWindow> {
    SendingWindow::new(
      self.active_days.clone(),
      self.sending_start_time,
      self.sending_end_time,
    )
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
  pub campaign_id: Uuid,
  pub name:        String,
  pub status:      CampaignStatus,
  pub settings:    CampaignSettings,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::CampaignStore::create_campaign`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampaign {
  pub name:     String,
  #[serde(default)]
  pub status:   CampaignStatus,
  #[serde(default)]
  pub settings: CampaignSettings,
}

// ─── Sequence steps ──────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TimingUnit {
  Days,
  Hours,
  Minutes,
}

/// Delay between the previous send (or contact creation, for step 1) and a
/// step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
  pub value: u32,
  pub unit:  TimingUnit,
}

impl Timing {
  pub fn days(value: u32) -> Self { Self { value, unit: TimingUnit::Days } }

  pub fn hours(value: u32) -> Self { Self { value, unit: TimingUnit::Hours } }

  pub fn minutes(value: u32) -> Self { Self { value, unit: TimingUnit::Minutes } }

  /// Day-granular timings pick a hashed time of day; finer ones keep the
  /// anchor's wall time.
  pub fn is_day_granular(&self) -> bool { self.unit == TimingUnit::Days }

  pub fn to_duration(self) -> Duration {
    let value = i64::from(self.value);
    match self.unit {
      TimingUnit::Days => Duration::days(value),
      TimingUnit::Hours => Duration::hours(value),
      TimingUnit::Minutes => Duration::minutes(value),
    }
  }
}

/// One step of a campaign's outreach plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceStep {
  /// 1-based, contiguous within a campaign.
  pub step_number: u32,
  pub subject:     String,
  pub content:     String,
  pub timing:      Timing,
}

/// Sort `steps` by step number and check that they run `1, 2, …, n`.
pub fn validate_steps(steps: &mut [SequenceStep]) -> Result<()> {
  steps.sort_by_key(|s| s.step_number);
  for (i, step) in steps.iter().enumerate() {
    let expected = i as u32 + 1;
    if step.step_number != expected {
      return Err(Error::InvalidSequence(format!(
        "expected step {expected}, found step {}",
        step.step_number
      )));
    }
  }
  Ok(())
}

/// Highest step number, or 0 for an empty sequence.
pub fn last_step(steps: &[SequenceStep]) -> u32 {
  steps.iter().map(|s| s.step_number).max().unwrap_or(0)
}

// ─── Serde helpers ───────────────────────────────────────────────────────────

/// `"HH:MM"` (or `"HH:MM:SS"`) wall-clock times.
pub mod hhmm {
  use chrono::NaiveTime;
  use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

  pub fn parse(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
      .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
      .ok()
  }

  pub fn serialize<S: Serializer>(
    value: &Option<NaiveTime>,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    match value {
      Some(t) => serializer.serialize_str(&t.format("%H:%M").to_string()),
      None => serializer.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Option<NaiveTime>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw
      .map(|s| parse(&s).ok_or_else(|| D::Error::custom(format!("invalid time {s:?}, expected HH:MM"))))
      .transpose()
  }
}
