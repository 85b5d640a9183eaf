//! Mapping wall-clock send times onto absolute instants inside a campaign's
//! sending window.
//!
//! All conversions go through the timezone database for the civil date in
//! question, never through the offset in force "now". The UTC instant of a
//! local wall time is `local - offset`: 12:05 in Europe/London during BST
//! (UTC+1) is 11:05Z.

use chrono::{
  DateTime, Datelike as _, Duration, NaiveDateTime, NaiveTime, Offset as _, TimeZone as _,
  Timelike as _, Utc, Weekday,
};
use chrono_tz::Tz;

use crate::{Error, Result};

/// Upper bound on day-by-day advances while looking for an open slot.
pub const MAX_DAY_ADVANCES: u32 = 14;

const DAY_SECS: u32 = 86_400;

/// Resolve a wall-clock time in `tz` to a UTC instant.
///
/// Times repeated by a fall-back transition take the earlier instant. Times
/// skipped by a spring-forward transition take the offset in force before the
/// gap, which lands them the length of the gap later on the wall clock.
pub fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
  match tz.from_local_datetime(&local).earliest() {
    Some(dt) => dt.with_timezone(&Utc),
    None => {
      let before = tz.offset_from_utc_datetime(&(local - Duration::days(1))).fix();
      (local - Duration::seconds(i64::from(before.local_minus_utc()))).and_utc()
    }
  }
}

/// The days and hours during which a campaign may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendingWindow {
  active_days: Vec<Weekday>,
  start:       Option<NaiveTime>,
  end:         Option<NaiveTime>,
}

impl SendingWindow {
  /// Build a window, rejecting configurations that can never produce a slot.
  pub fn new(
    active_days: Vec<Weekday>,
    start: Option<NaiveTime>,
    end: Option<NaiveTime>,
  ) -> Result<Self> {
    if active_days.is_empty() {
      return Err(Error::EmptyActiveDays);
    }
    if let (Some(start), Some(end)) = (start, end)
      && start >= end
    {
      return Err(Error::InvalidSendingWindow { start, end });
    }
    Ok(Self { active_days, start, end })
  }

  /// Every day, all day.
  pub fn unrestricted() -> Self {
    Self {
      active_days: vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
      ],
      start:       None,
      end:         None,
    }
  }

  pub fn active_days(&self) -> &[Weekday] { &self.active_days }

  /// Window bounds as seconds from midnight, `[start, end)`.
  fn bounds(&self) -> (u32, u32) {
    let start = self.start.map_or(0, |t| t.num_seconds_from_midnight());
    let end = self.end.map_or(DAY_SECS, |t| t.num_seconds_from_midnight());
    (start, end)
  }

  fn within_hours(&self, time: NaiveTime) -> bool {
    let (start, end) = self.bounds();
    let t = time.num_seconds_from_midnight();
    start <= t && t < end
  }

  /// Whether a local wall time falls on an active day inside sending hours.
  pub fn contains(&self, local: NaiveDateTime) -> bool {
    self.active_days.contains(&local.weekday())
      && self.within_hours(local.time())
  }

  /// Fold a time outside sending hours back into them, keeping the
  /// per-contact spread: `start + (t - start) mod len`. Times at or after the
  /// end of the window move to the following day.
  fn wrap_into_hours(&self, local: NaiveDateTime) -> NaiveDateTime {
    if self.within_hours(local.time()) {
      return local;
    }

    let (start, end) = self.bounds();
    let t = local.time().num_seconds_from_midnight();
    let len = i64::from(end - start);
    let wrapped = i64::from(start) + (i64::from(t) - i64::from(start)).rem_euclid(len);
    let time = NaiveTime::from_num_seconds_from_midnight_opt(wrapped as u32, 0)
      .unwrap_or_default();

    let date = if t >= end {
      local.date() + Duration::days(1)
    } else {
      local.date()
    };
    date.and_time(time)
  }

  /// Place a candidate local send time into the window and resolve it to UTC.
  ///
  /// Returns `None` if no active slot turns up within [`MAX_DAY_ADVANCES`]
  /// days, which only a malformed configuration can cause.
  pub fn place(&self, tz: Tz, candidate: NaiveDateTime) -> Option<DateTime<Utc>> {
    let mut local = self.wrap_into_hours(candidate);

    for _ in 0..=MAX_DAY_ADVANCES {
      let instant = resolve_local(tz, local);
      // Re-check on the resolved instant: a DST gap can push the wall time
      // past the end of the window.
      if self.contains(instant.with_timezone(&tz).naive_local()) {
        return Some(instant);
      }
      local += Duration::days(1);
    }

    None
  }
}
