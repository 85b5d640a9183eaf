//! A contact's full projected sequence: what was sent, what is next, and
//! where the remaining steps would land if every send happened on time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
  Error, Result,
  campaign::{SequenceStep, last_step},
  contact::{Contact, ContactStatus},
  evaluator::{anchor_for, step_instant},
  location::contact_timezone,
  offset::contact_hash,
  window::SendingWindow,
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScheduleStatus {
  Sent,
  /// The next step to go out.
  Pending,
  /// A later step, projected from the pending one.
  Upcoming,
}

impl ScheduleStatus {
  /// Status of `step` for a contact that has sent `sequence_step` steps.
  pub fn for_step(step: u32, sequence_step: u32) -> Self {
    if step <= sequence_step {
      Self::Sent
    } else if step == sequence_step + 1 {
      Self::Pending
    } else {
      Self::Upcoming
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
  pub step:         u32,
  pub scheduled_at: DateTime<Utc>,
  pub status:       ScheduleStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sent_at:      Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSchedule {
  /// Ordered by step.
  pub steps:        Vec<ScheduleEntry>,
  pub contact_hash: i32,
  /// IANA name of the zone the schedule was computed in.
  pub timezone:     String,
  pub generated_at: DateTime<Utc>,
}

impl SequenceSchedule {
  pub fn entry(&self, step: u32) -> Option<&ScheduleEntry> {
    self.steps.iter().find(|e| e.step == step)
  }

  /// The entry for the step after `sequence_step`, if the sequence has one.
  pub fn next_due(&self, sequence_step: u32) -> Option<&ScheduleEntry> {
    self.entry(sequence_step + 1)
  }

  /// Record that `step` went out at `at`.
  pub fn mark_sent(&mut self, step: u32, at: DateTime<Utc>) {
    match self.steps.iter_mut().find(|e| e.step == step) {
      Some(entry) => {
        entry.status = ScheduleStatus::Sent;
        entry.sent_at = Some(at);
      }
      None => {
        self.steps.push(ScheduleEntry {
          step,
          scheduled_at: at,
          status: ScheduleStatus::Sent,
          sent_at: Some(at),
        });
        self.steps.sort_by_key(|e| e.step);
      }
    }
  }

  /// Whether two schedules describe the same sends, ignoring when they were
  /// generated.
  pub fn same_plan(&self, other: &Self) -> bool {
    self.steps == other.steps && self.timezone == other.timezone
  }
}

/// Compute `contact`'s schedule against the campaign's `steps`.
///
/// Entries for steps already sent are carried over from the stored schedule.
/// The pending step is placed exactly as [`crate::evaluator::evaluate`] would
/// place it; each upcoming step is anchored on the instant of the step before
/// it.
pub fn plan(
  contact: &Contact,
  steps: &[SequenceStep],
  window: &SendingWindow,
  generated_at: DateTime<Utc>,
) -> Result<SequenceSchedule> {
  let tz = contact_timezone(contact)?;
  let sent = contact.sequence_step;

  let mut entries: Vec<ScheduleEntry> = contact
    .sequence_schedule
    .iter()
    .flat_map(|s| s.steps.iter())
    .filter(|e| e.step <= sent)
    .map(|e| ScheduleEntry { status: ScheduleStatus::Sent, ..e.clone() })
    .collect();

  if sent > 0
    && !entries.iter().any(|e| e.step == sent)
    && let Some(at) = contact.last_contacted_at
  {
    entries.push(ScheduleEntry {
      step:         sent,
      scheduled_at: at,
      status:       ScheduleStatus::Sent,
      sent_at:      Some(at),
    });
  }

  let mut anchor = anchor_for(contact, sent + 1);
  for step in steps.iter().filter(|s| s.step_number > sent) {
    let scheduled_at = step_instant(&contact.contact_id, tz, window, step, anchor)?;
    entries.push(ScheduleEntry {
      step: step.step_number,
      scheduled_at,
      status: ScheduleStatus::for_step(step.step_number, sent),
      sent_at: None,
    });
    anchor = scheduled_at;
  }

  entries.sort_by_key(|e| e.step);

  Ok(SequenceSchedule {
    steps: entries,
    contact_hash: contact_hash(&contact.contact_id),
    timezone: tz.name().to_owned(),
    generated_at,
  })
}

/// Advance `contact` past a successful send of `step` at `sent_at`.
///
/// `step` must be exactly the contact's next step, and `sent_at` must not
/// precede the previous send. The returned contact has a re-planned schedule
/// and a fresh `next_email_due`.
pub fn apply_send(
  contact: &Contact,
  step: u32,
  sent_at: DateTime<Utc>,
  steps: &[SequenceStep],
  window: &SendingWindow,
) -> Result<Contact> {
  if step != contact.sequence_step + 1 {
    return Err(Error::StepConflict {
      contact_id: contact.contact_id.clone(),
      expected:   step.saturating_sub(1),
      actual:     contact.sequence_step,
    });
  }
  let last = last_step(steps);
  if step > last {
    return Err(Error::InvalidSequence(format!(
      "step {step} is past the end of a {last}-step sequence"
    )));
  }

  if let Some(previous) = contact.last_contacted_at
    && sent_at < previous
  {
    return Err(Error::InvalidSequence(format!(
      "step {step} sent at {sent_at}, before the previous send at {previous}"
    )));
  }

  let mut next = contact.clone();
  next.sequence_step = step;
  next.last_contacted_at = Some(sent_at);
  if let Some(schedule) = next.sequence_schedule.as_mut() {
    schedule.mark_sent(step, sent_at);
  }

  let schedule = plan(&next, steps, window, sent_at)?;
  next.next_email_due = schedule.next_due(step).map(|e| e.scheduled_at);
  next.sequence_schedule = Some(schedule);
  next.status = if step == last {
    ContactStatus::Completed
  } else {
    ContactStatus::InProgress
  };

  Ok(next)
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, NaiveTime};

  use super::*;
  use crate::{
    campaign::Timing,
    evaluator::{
      Decision, evaluate,
      tests::{all_days_nine_to_five, contact, steps, utc},
    },
  };

  #[test]
  fn fresh_contact_has_one_pending_and_the_rest_upcoming() {
    let c = contact("267", "Australia/Sydney", "2025-08-21T01:20:33Z");
    let seq = steps(&[Timing::days(0), Timing::days(3), Timing::days(4)]);
    let schedule = plan(&c, &seq, &all_days_nine_to_five(), c.created_at).unwrap();

    let statuses: Vec<_> = schedule.steps.iter().map(|e| e.status).collect();
    assert_eq!(statuses, [
      ScheduleStatus::Pending,
      ScheduleStatus::Upcoming,
      ScheduleStatus::Upcoming
    ]);
    assert_eq!(schedule.timezone, "Australia/Sydney");
    assert_eq!(schedule.contact_hash, 49779);
    assert_eq!(schedule.next_due(0).unwrap().scheduled_at, utc("2025-08-21T03:00:00Z"));
  }

  #[test]
  fn projected_steps_strictly_increase() {
    let c = contact("abc", "America/New_York", "2025-08-29T22:00:00Z");
    let seq = steps(&[
      Timing::days(0),
      Timing::days(1),
      Timing::hours(1),
      Timing::minutes(30),
      Timing::days(7),
    ]);
    // Weekdays only; the contact is created on a Friday evening.
    let window = crate::campaign::CampaignSettings {
      sending_start_time: NaiveTime::from_hms_opt(9, 0, 0),
      sending_end_time: NaiveTime::from_hms_opt(17, 0, 0),
      ..Default::default()
    }
    .window()
    .unwrap();

    let schedule = plan(&c, &seq, &window, c.created_at).unwrap();
    assert_eq!(schedule.steps.len(), 5);
    for pair in schedule.steps.windows(2) {
      assert!(pair[0].scheduled_at < pair[1].scheduled_at, "{pair:?}");
    }
  }

  #[test]
  fn pending_entry_matches_evaluator() {
    let c = contact("q", "Europe/London", "2025-10-24T16:30:00Z");
    let seq = steps(&[Timing::days(1), Timing::days(2)]);
    let window = all_days_nine_to_five();

    let schedule = plan(&c, &seq, &window, c.created_at).unwrap();
    let decision = evaluate(&c, &seq, &window, c.created_at).unwrap();
    assert_eq!(
      decision.scheduled_at(),
      schedule.next_due(0).map(|e| e.scheduled_at)
    );
  }

  #[test]
  fn replanning_is_stable() {
    let c = contact("x1", "Asia/Tokyo", "2025-05-01T00:00:00Z");
    let seq = steps(&[Timing::days(0), Timing::days(2)]);
    let window = all_days_nine_to_five();

    let a = plan(&c, &seq, &window, utc("2025-05-01T00:00:00Z")).unwrap();
    let b = plan(&c, &seq, &window, utc("2025-05-09T00:00:00Z")).unwrap();
    assert!(a.same_plan(&b));
    assert_ne!(a, b);
  }

  #[test]
  fn apply_send_advances_and_replans() {
    let c = contact("267", "Europe/London", "2025-09-01T08:00:00Z");
    let seq = steps(&[Timing::days(0), Timing::days(2)]);
    let window = all_days_nine_to_five();
    let sent_at = utc("2025-09-01T12:00:00Z");

    let next = apply_send(&c, 1, sent_at, &seq, &window).unwrap();
    assert_eq!(next.sequence_step, 1);
    assert_eq!(next.status, ContactStatus::InProgress);
    assert_eq!(next.last_contacted_at, Some(sent_at));

    let schedule = next.sequence_schedule.as_ref().unwrap();
    let sent = schedule.entry(1).unwrap();
    assert_eq!(sent.status, ScheduleStatus::Sent);
    assert_eq!(sent.sent_at, Some(sent_at));

    let pending = schedule.entry(2).unwrap();
    assert_eq!(pending.status, ScheduleStatus::Pending);
    assert_eq!(next.next_email_due, Some(pending.scheduled_at));
    assert!(pending.scheduled_at >= sent_at + Duration::days(1));

    let decision = evaluate(&next, &seq, &window, sent_at).unwrap();
    assert_eq!(decision, Decision::NotDue { step: 2, scheduled_at: pending.scheduled_at });
  }

  #[test]
  fn final_send_completes_the_contact() {
    let mut c = contact("9", "UTC", "2025-09-01T08:00:00Z");
    c.sequence_step = 1;
    c.last_contacted_at = Some(utc("2025-09-01T09:00:00Z"));
    let seq = steps(&[Timing::days(0), Timing::days(1)]);
    let window = SendingWindow::unrestricted();
    c.sequence_schedule = Some(plan(&c, &seq, &window, c.created_at).unwrap());

    let next = apply_send(&c, 2, utc("2025-09-02T10:00:00Z"), &seq, &window).unwrap();
    assert_eq!(next.status, ContactStatus::Completed);
    assert_eq!(next.next_email_due, None);

    let schedule = next.sequence_schedule.unwrap();
    assert_eq!(schedule.steps.len(), 2);
    assert!(schedule.steps.iter().all(|e| e.status == ScheduleStatus::Sent));
  }

  #[test]
  fn out_of_order_send_is_a_conflict() {
    let mut c = contact("9", "UTC", "2025-09-01T08:00:00Z");
    c.sequence_step = 1;
    let seq = steps(&[Timing::days(0), Timing::days(1), Timing::days(1)]);
    let window = SendingWindow::unrestricted();

    for step in [1, 3] {
      let err = apply_send(&c, step, Utc::now(), &seq, &window).unwrap_err();
      assert!(matches!(err, Error::StepConflict { actual: 1, .. }), "{err}");
    }
  }

  #[test]
  fn send_before_the_previous_one_is_rejected() {
    let mut c = contact("9", "UTC", "2025-09-01T08:00:00Z");
    c.sequence_step = 1;
    c.last_contacted_at = Some(utc("2025-09-02T10:00:00Z"));
    let seq = steps(&[Timing::days(0), Timing::days(1)]);
    let window = SendingWindow::unrestricted();

    let err = apply_send(&c, 2, utc("2025-09-02T09:59:59Z"), &seq, &window).unwrap_err();
    assert!(matches!(err, Error::InvalidSequence(_)), "{err}");

    // The same instant is fine.
    let next = apply_send(&c, 2, utc("2025-09-02T10:00:00Z"), &seq, &window).unwrap();
    assert_eq!(next.sequence_step, 2);
  }

  #[test]
  fn sub_microsecond_send_keeps_schedule_and_evaluator_in_step() {
    let c = contact("267", "Australia/Sydney", "2025-09-01T00:00:00Z");
    let seq = steps(&[Timing::days(0), Timing::hours(48)]);
    let window = all_days_nine_to_five();
    let sent_at = utc("2025-09-03T01:00:00.123456789Z");

    let next = apply_send(&c, 1, sent_at, &seq, &window).unwrap();
    let pending = next.sequence_schedule.as_ref().unwrap().entry(2).unwrap().scheduled_at;
    assert_eq!(pending, sent_at + Duration::hours(48));
    assert_eq!(next.next_email_due, Some(pending));
    assert_eq!(evaluate(&next, &seq, &window, sent_at).unwrap().scheduled_at(), Some(pending));
  }

  #[test]
  fn send_past_the_last_step_is_rejected() {
    let mut c = contact("9", "UTC", "2025-09-01T08:00:00Z");
    c.sequence_step = 1;
    let seq = steps(&[Timing::days(0)]);
    let err = apply_send(&c, 2, Utc::now(), &seq, &SendingWindow::unrestricted()).unwrap_err();
    assert!(matches!(err, Error::InvalidSequence(_)));
  }
}
