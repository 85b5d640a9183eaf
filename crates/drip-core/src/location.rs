//! Resolving a contact's timezone from an explicit IANA name or a free-text
//! location.
//!
//! There is no fallback zone. A contact whose timezone cannot be determined is
//! a configuration error for that contact.

use chrono_tz::Tz;

use crate::{Error, Result, contact::Contact};

/// Known places, checked in order. Cities first, then countries, then US
/// states and Canadian provinces.
const LOCATIONS: &[(&str, Tz)] = &[
  // North America
  ("new york", Tz::America__New_York),
  ("nyc", Tz::America__New_York),
  ("manhattan", Tz::America__New_York),
  ("brooklyn", Tz::America__New_York),
  ("los angeles", Tz::America__Los_Angeles),
  ("la", Tz::America__Los_Angeles),
  ("san francisco", Tz::America__Los_Angeles),
  ("sf", Tz::America__Los_Angeles),
  ("chicago", Tz::America__Chicago),
  ("houston", Tz::America__Chicago),
  ("toronto", Tz::America__Toronto),
  ("vancouver", Tz::America__Vancouver),
  ("montreal", Tz::America__Toronto),
  // Europe
  ("london", Tz::Europe__London),
  ("paris", Tz::Europe__Paris),
  ("berlin", Tz::Europe__Berlin),
  ("madrid", Tz::Europe__Madrid),
  ("rome", Tz::Europe__Rome),
  ("amsterdam", Tz::Europe__Amsterdam),
  ("stockholm", Tz::Europe__Stockholm),
  ("oslo", Tz::Europe__Oslo),
  ("copenhagen", Tz::Europe__Copenhagen),
  ("zurich", Tz::Europe__Zurich),
  ("vienna", Tz::Europe__Vienna),
  ("prague", Tz::Europe__Prague),
  ("warsaw", Tz::Europe__Warsaw),
  ("dublin", Tz::Europe__Dublin),
  // Asia Pacific
  ("sydney", Tz::Australia__Sydney),
  ("melbourne", Tz::Australia__Melbourne),
  ("brisbane", Tz::Australia__Brisbane),
  ("perth", Tz::Australia__Perth),
  ("adelaide", Tz::Australia__Adelaide),
  ("tokyo", Tz::Asia__Tokyo),
  ("seoul", Tz::Asia__Seoul),
  ("shanghai", Tz::Asia__Shanghai),
  ("beijing", Tz::Asia__Shanghai),
  ("hong kong", Tz::Asia__Hong_Kong),
  ("singapore", Tz::Asia__Singapore),
  ("bangkok", Tz::Asia__Bangkok),
  ("mumbai", Tz::Asia__Kolkata),
  ("delhi", Tz::Asia__Kolkata),
  ("bangalore", Tz::Asia__Kolkata),
  // Countries
  ("usa", Tz::America__New_York),
  ("united states", Tz::America__New_York),
  ("canada", Tz::America__Toronto),
  ("uk", Tz::Europe__London),
  ("united kingdom", Tz::Europe__London),
  ("england", Tz::Europe__London),
  ("france", Tz::Europe__Paris),
  ("germany", Tz::Europe__Berlin),
  ("spain", Tz::Europe__Madrid),
  ("italy", Tz::Europe__Rome),
  ("netherlands", Tz::Europe__Amsterdam),
  ("sweden", Tz::Europe__Stockholm),
  ("norway", Tz::Europe__Oslo),
  ("denmark", Tz::Europe__Copenhagen),
  ("switzerland", Tz::Europe__Zurich),
  ("austria", Tz::Europe__Vienna),
  ("australia", Tz::Australia__Sydney),
  ("japan", Tz::Asia__Tokyo),
  ("south korea", Tz::Asia__Seoul),
  ("korea", Tz::Asia__Seoul),
  ("china", Tz::Asia__Shanghai),
  ("thailand", Tz::Asia__Bangkok),
  ("india", Tz::Asia__Kolkata),
  // US states
  ("california", Tz::America__Los_Angeles),
  ("new york state", Tz::America__New_York),
  ("texas", Tz::America__Chicago),
  ("florida", Tz::America__New_York),
  ("illinois", Tz::America__Chicago),
  ("washington", Tz::America__Los_Angeles),
  ("oregon", Tz::America__Los_Angeles),
  ("nevada", Tz::America__Los_Angeles),
  ("arizona", Tz::America__Phoenix),
  ("colorado", Tz::America__Denver),
  ("utah", Tz::America__Denver),
  ("montana", Tz::America__Denver),
  ("wyoming", Tz::America__Denver),
  ("north dakota", Tz::America__Chicago),
  ("south dakota", Tz::America__Chicago),
  ("nebraska", Tz::America__Chicago),
  ("kansas", Tz::America__Chicago),
  ("oklahoma", Tz::America__Chicago),
  ("minnesota", Tz::America__Chicago),
  ("iowa", Tz::America__Chicago),
  ("missouri", Tz::America__Chicago),
  ("arkansas", Tz::America__Chicago),
  ("louisiana", Tz::America__Chicago),
  ("wisconsin", Tz::America__Chicago),
  ("michigan", Tz::America__New_York),
  ("indiana", Tz::America__New_York),
  ("ohio", Tz::America__New_York),
  ("kentucky", Tz::America__New_York),
  ("tennessee", Tz::America__Chicago),
  ("mississippi", Tz::America__Chicago),
  ("alabama", Tz::America__Chicago),
  ("georgia", Tz::America__New_York),
  ("south carolina", Tz::America__New_York),
  ("north carolina", Tz::America__New_York),
  ("virginia", Tz::America__New_York),
  ("west virginia", Tz::America__New_York),
  ("maryland", Tz::America__New_York),
  ("delaware", Tz::America__New_York),
  ("new jersey", Tz::America__New_York),
  ("connecticut", Tz::America__New_York),
  ("rhode island", Tz::America__New_York),
  ("massachusetts", Tz::America__New_York),
  ("vermont", Tz::America__New_York),
  ("new hampshire", Tz::America__New_York),
  ("maine", Tz::America__New_York),
  ("pennsylvania", Tz::America__New_York),
  // Canadian provinces
  ("ontario", Tz::America__Toronto),
  ("quebec", Tz::America__Toronto),
  ("british columbia", Tz::America__Vancouver),
  ("alberta", Tz::America__Edmonton),
  ("saskatchewan", Tz::America__Regina),
  ("manitoba", Tz::America__Winnipeg),
  ("new brunswick", Tz::America__Moncton),
  ("nova scotia", Tz::America__Halifax),
  ("prince edward island", Tz::America__Halifax),
  ("newfoundland", Tz::America__St_Johns),
  ("yukon", Tz::America__Whitehorse),
  ("northwest territories", Tz::America__Edmonton),
  ("nunavut", Tz::America__Iqaluit),
];

/// Shortest input accepted for the "known place contains the input" pass.
const MIN_PARTIAL_LEN: usize = 3;

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
  name
    .trim()
    .parse::<Tz>()
    .map_err(|_| Error::InvalidTimezone(name.to_owned()))
}

/// Whether `needle` occurs in `haystack` bounded by non-alphanumeric
/// characters (or the ends of the string).
fn contains_word(haystack: &str, needle: &str) -> bool {
  haystack.match_indices(needle).any(|(i, _)| {
    let before = haystack[..i].chars().next_back();
    let after = haystack[i + needle.len()..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
  })
}

/// Look up a free-text location such as `"Sydney, Australia"`.
///
/// Tries an exact match, then a known place appearing as a whole word in the
/// input, then the input appearing inside a known place name.
pub fn timezone_for_location(location: &str) -> Option<Tz> {
  let normalized = location.trim().to_lowercase();
  if normalized.is_empty() {
    return None;
  }

  if let Some((_, tz)) = LOCATIONS.iter().find(|(key, _)| *key == normalized) {
    return Some(*tz);
  }

  if let Some((_, tz)) = LOCATIONS
    .iter()
    .find(|(key, _)| contains_word(&normalized, key))
  {
    return Some(*tz);
  }

  if normalized.len() >= MIN_PARTIAL_LEN {
    return LOCATIONS
      .iter()
      .find(|(key, _)| key.contains(normalized.as_str()))
      .map(|(_, tz)| *tz);
  }

  None
}

/// Resolve the timezone for a contact from its explicit `timezone` and free
/// text `location`.
///
/// An explicit timezone must be a valid IANA name; it is never silently
/// replaced by the location lookup.
pub fn resolve_timezone(
  contact_id: &str,
  timezone: Option<&str>,
  location: Option<&str>,
) -> Result<Tz> {
  if let Some(name) = timezone.filter(|n| !n.trim().is_empty()) {
    return parse_timezone(name);
  }

  location
    .and_then(timezone_for_location)
    .ok_or_else(|| Error::UnresolvedTimezone {
      contact_id: contact_id.to_owned(),
      location:   location.map(str::to_owned),
    })
}

/// The timezone to schedule `contact` in.
pub fn contact_timezone(contact: &Contact) -> Result<Tz> {
  resolve_timezone(
    &contact.contact_id,
    contact.timezone.as_deref(),
    contact.location.as_deref(),
  )
}
