//! Deterministic per-contact send offsets.
//!
//! Send times are spread across the working day without persisting any
//! randomness: the hour and minute for a `(contact, step)` pair are derived
//! from a hash of the contact identifier alone.
//!
//! # Stability
//!
//! The hash is `h = h * 31 + u` over the UTF-16 code units `u` of the
//! identifier, starting from `h = 0` and wrapping at signed 32 bits. Changing
//! it moves every scheduled-but-unsent step, so treat it as a storage format.

use serde::{Deserialize, Serialize};

/// First hour of the hashed start-hour spread.
pub const FIRST_HOUR: u32 = 9;

/// Number of distinct start hours (9 AM through 4 PM).
pub const HOUR_SPREAD: u32 = 8;

const SEED_MODULUS: i64 = 1000;

/// The hashed time-of-day for one step of one contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOffset {
  /// Always in `[0, 1000)`.
  pub seed:   u32,
  pub hour:   u32,
  pub minute: u32,
}

/// Rolling 32-bit hash of a contact identifier.
pub fn contact_hash(contact_id: &str) -> i32 {
  contact_id
    .encode_utf16()
    .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Derive the send offset for `step` of the contact identified by
/// `contact_id`.
pub fn send_offset(contact_id: &str, step: u32) -> SendOffset {
  let hash = i64::from(contact_hash(contact_id));
  let seed = (hash + i64::from(step)).rem_euclid(SEED_MODULUS) as u32;

  SendOffset {
    seed,
    hour: FIRST_HOUR + seed % HOUR_SPREAD,
    minute: (seed * 7) % 60,
  }
}
