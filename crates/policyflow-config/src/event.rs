use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Domain events an event trigger can listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemEventType {
  QuoteCreated,
  QuoteFormDataUpdated,
  QuoteCalculated,
  QuoteSubmitted,
  QuoteApproved,
  QuoteDeclined,
  QuoteExpired,
  PolicyIssued,
  PolicyAdjusted,
  PolicyRenewed,
  PolicyCancelled,
  CustomerCreated,
  UserCreated,
  UserLoggedIn,
  /// A `raiseEventAction` with a custom event alias.
  Custom,
}

const NAMES: &[(&str, SystemEventType)] = &[
  ("quoteCreated", SystemEventType::QuoteCreated),
  ("quoteFormDataUpdated", SystemEventType::QuoteFormDataUpdated),
  ("quoteCalculated", SystemEventType::QuoteCalculated),
  ("quoteSubmitted", SystemEventType::QuoteSubmitted),
  ("quoteApproved", SystemEventType::QuoteApproved),
  ("quoteDeclined", SystemEventType::QuoteDeclined),
  ("quoteExpired", SystemEventType::QuoteExpired),
  ("policyIssued", SystemEventType::PolicyIssued),
  ("policyAdjusted", SystemEventType::PolicyAdjusted),
  ("policyRenewed", SystemEventType::PolicyRenewed),
  ("policyCancelled", SystemEventType::PolicyCancelled),
  ("customerCreated", SystemEventType::CustomerCreated),
  ("userCreated", SystemEventType::UserCreated),
  ("userLoggedIn", SystemEventType::UserLoggedIn),
  ("custom", SystemEventType::Custom),
];

/// Names used by older configurations. Consulted before the current names.
const LEGACY_NAMES: &[(&str, SystemEventType)] = &[
  ("quoteInitialized", SystemEventType::QuoteCreated),
  ("quoteFormUpdated", SystemEventType::QuoteFormDataUpdated),
  ("quoteCalculationResultCreated", SystemEventType::QuoteCalculated),
  ("policyCreated", SystemEventType::PolicyIssued),
  ("customerInitialized", SystemEventType::CustomerCreated),
];

impl SystemEventType {
  pub fn as_str(&self) -> &'static str {
    NAMES
      .iter()
      .find(|(_, t)| t == self)
      .map(|(name, _)| *name)
      .unwrap_or("custom")
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown system event type '{0}'")]
pub struct UnknownEventType(pub String);

impl FromStr for SystemEventType {
  type Err = UnknownEventType;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    LEGACY_NAMES
      .iter()
      .chain(NAMES)
      .find(|(name, _)| name.eq_ignore_ascii_case(s))
      .map(|(_, t)| *t)
      .ok_or_else(|| UnknownEventType(s.to_string()))
  }
}

impl fmt::Display for SystemEventType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl Serialize for SystemEventType {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.as_str())
  }
}

impl<'de> Deserialize<'de> for SystemEventType {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_legacy_name_maps_to_current_member() {
    let t: SystemEventType = serde_json::from_value(json!("quoteInitialized")).unwrap();
    assert_eq!(t, SystemEventType::QuoteCreated);
    assert_eq!(serde_json::to_value(t).unwrap(), json!("quoteCreated"));
  }

  #[test]
  fn test_names_are_case_insensitive() {
    assert_eq!(
      "PolicyIssued".parse::<SystemEventType>().unwrap(),
      SystemEventType::PolicyIssued
    );
  }

  #[test]
  fn test_every_member_round_trips() {
    for (name, t) in NAMES {
      assert_eq!(t.as_str(), *name);
      assert_eq!(name.parse::<SystemEventType>().unwrap(), *t);
    }
  }

  #[test]
  fn test_unknown_name() {
    assert!("quoteTeleported".parse::<SystemEventType>().is_err());
  }
}
