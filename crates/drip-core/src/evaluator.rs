//! The due-decision evaluator: should a contact's next step go out now?
//!
//! The scheduled instant for a step is a function of persisted contact data
//! and campaign configuration only. `now` is consulted for the final
//! comparison and nothing else, so repeated evaluations agree.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  campaign::{SequenceStep, last_step},
  contact::Contact,
  location::contact_timezone,
  offset::send_offset,
  window::{MAX_DAY_ADVANCES, SendingWindow},
};

/// Outcome of evaluating one contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
  /// The next step is scheduled in the future.
  NotDue {
    step:         u32,
    scheduled_at: DateTime<Utc>,
  },
  /// The caller should send `step` now.
  Due {
    step:         u32,
    scheduled_at: DateTime<Utc>,
  },
  /// Every step has been sent.
  Complete,
}

impl Decision {
  pub fn is_due(&self) -> bool { matches!(self, Self::Due { .. }) }

  /// The step this decision is about, if any remain.
  pub fn step(&self) -> Option<u32> {
    match self {
      Self::NotDue { step, .. } | Self::Due { step, .. } => Some(*step),
      Self::Complete => None,
    }
  }

  pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
    match self {
      Self::NotDue { scheduled_at, .. } | Self::Due { scheduled_at, .. } => Some(*scheduled_at),
      Self::Complete => None,
    }
  }
}

/// The instant a step's timing is measured from: contact creation for the
/// first step, the previous send for later ones.
///
/// A contact past step 1 without a recorded send falls back to its creation
/// time.
pub fn anchor_for(contact: &Contact, step: u32) -> DateTime<Utc> {
  if step <= 1 {
    contact.created_at
  } else {
    contact.last_contacted_at.unwrap_or(contact.created_at)
  }
}

/// Compute when `step` goes out for the contact identified by `contact_id`,
/// measured from `anchor`.
///
/// Day-granular timings land on the contact's hashed time of day on the
/// resulting local date. Hour and minute timings keep the wall time of
/// `anchor + timing`. Either way the result is then fitted into `window`.
pub fn step_instant(
  contact_id: &str,
  tz: Tz,
  window: &SendingWindow,
  step: &SequenceStep,
  anchor: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
  let candidate = if step.timing.is_day_granular() {
    let offset = send_offset(contact_id, step.step_number);
    let date = anchor.with_timezone(&tz).date_naive()
      + Duration::days(i64::from(step.timing.value));
    let time = NaiveTime::from_hms_opt(offset.hour, offset.minute, 0).unwrap_or_default();
    date.and_time(time)
  } else {
    (anchor + step.timing.to_duration())
      .with_timezone(&tz)
      .naive_local()
  };

  window
    .place(tz, candidate)
    .ok_or_else(|| Error::NoSendingSlot {
      contact_id: contact_id.to_owned(),
      step:       step.step_number,
      days:       MAX_DAY_ADVANCES,
    })
}

/// Decide whether `contact`'s next step is due at `now`.
///
/// `steps` must be the campaign's full sequence; a contact that has already
/// sent the last step is [`Decision::Complete`] without any timezone or
/// window checks.
pub fn evaluate(
  contact: &Contact,
  steps: &[SequenceStep],
  window: &SendingWindow,
  now: DateTime<Utc>,
) -> Result<Decision> {
  if contact.sequence_step >= last_step(steps) {
    return Ok(Decision::Complete);
  }

  let target = contact.sequence_step + 1;
  let step = steps
    .iter()
    .find(|s| s.step_number == target)
    .ok_or_else(|| Error::InvalidSequence(format!("missing step {target}")))?;

  let tz = contact_timezone(contact)?;
  let scheduled_at = step_instant(
    &contact.contact_id,
    tz,
    window,
    step,
    anchor_for(contact, target),
  )?;

  Ok(if scheduled_at <= now {
    Decision::Due { step: target, scheduled_at }
  } else {
    Decision::NotDue { step: target, scheduled_at }
  })
}
