//! First-property discriminated deserialization.
//!
//! Every polymorphic configuration category (triggers, actions, each provider
//! category) owns one [`TypeMap`]: a static, append-only table from
//! discriminator key to variant constructor. A JSON object such as
//! `{"objectPathLookupText": {...}}` is decoded by taking its first property
//! name, looking it up in the table and deserializing the property's value
//! with the registered constructor. Several keys may share a constructor to
//! keep deprecated names working.

use std::cell::RefCell;

use serde::de::{Deserialize, Deserializer, Error as _};
use serde_json::Value;

/// Builds a variant from the body of its discriminator property.
pub type Constructor<T> = fn(Value) -> Result<T, serde_json::Error>;

/// Accepts a bare (non-object) JSON value as a static variant.
pub type Literal<T> = fn(&Value) -> Option<T>;

/// Consulted for keys the table itself does not know.
pub type Fallback<T> = fn(&str, Value) -> Option<Result<T, serde_json::Error>>;

/// The structured description of the first discriminator failure seen while
/// decoding a document.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscriminatorFailure {
  pub category: &'static str,
  /// `None` when the fragment was not an object at all.
  pub key: Option<String>,
  pub fragment: Value,
}

thread_local! {
  static FAILURE: RefCell<Option<DiscriminatorFailure>> = const { RefCell::new(None) };
}

fn record_failure(failure: DiscriminatorFailure) {
  FAILURE.with(|slot| {
    let mut slot = slot.borrow_mut();
    // The innermost failure is recorded first and is the useful one.
    if slot.is_none() {
      *slot = Some(failure);
    }
  });
}

/// Forget any failure recorded on this thread.
pub fn clear_failure() {
  FAILURE.with(|slot| slot.borrow_mut().take());
}

/// Take the failure recorded on this thread since the last clear.
pub fn take_failure() -> Option<DiscriminatorFailure> {
  FAILURE.with(|slot| slot.borrow_mut().take())
}

pub struct TypeMap<T> {
  category: &'static str,
  entries: Vec<(&'static str, Constructor<T>)>,
  literal: Option<Literal<T>>,
  fallback: Option<Fallback<T>>,
}

impl<T> TypeMap<T> {
  pub fn new(category: &'static str) -> Self {
    Self {
      category,
      entries: Vec::new(),
      literal: None,
      fallback: None,
    }
  }

  pub fn register(mut self, key: &'static str, constructor: Constructor<T>) -> Self {
    debug_assert!(
      !self.entries.iter().any(|(k, _)| *k == key),
      "duplicate {} key '{}'",
      self.category,
      key
    );
    self.entries.push((key, constructor));
    self
  }

  pub fn literal(mut self, literal: Literal<T>) -> Self {
    self.literal = Some(literal);
    self
  }

  pub fn fallback(mut self, fallback: Fallback<T>) -> Self {
    self.fallback = Some(fallback);
    self
  }

  pub fn category(&self) -> &'static str {
    self.category
  }

  /// Registered keys in registration order, aliases included.
  pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.entries.iter().map(|(key, _)| *key)
  }

  pub fn contains(&self, key: &str) -> bool {
    self.entries.iter().any(|(k, _)| *k == key)
  }

  /// Construct the variant registered under `key`, if any.
  pub fn construct(&self, key: &str, body: Value) -> Option<Result<T, serde_json::Error>> {
    if let Some((_, constructor)) = self.entries.iter().find(|(k, _)| *k == key) {
      return Some(constructor(body));
    }
    self.fallback.and_then(|fallback| fallback(key, body))
  }

  pub fn from_value(&self, value: Value) -> Result<T, serde_json::Error> {
    let Value::Object(map) = &value else {
      if let Some(found) = self.literal.and_then(|literal| literal(&value)) {
        return Ok(found);
      }
      let message = format!(
        "invalid automation configuration: expected a {} object but found {}",
        self.category, value
      );
      record_failure(DiscriminatorFailure {
        category: self.category,
        key: None,
        fragment: value,
      });
      return Err(serde_json::Error::custom(message));
    };

    let Some((key, body)) = map.iter().next() else {
      let message = format!(
        "invalid automation configuration: empty {} object",
        self.category
      );
      record_failure(DiscriminatorFailure {
        category: self.category,
        key: None,
        fragment: value,
      });
      return Err(serde_json::Error::custom(message));
    };

    match self.construct(key, body.clone()) {
      Some(result) => result.map_err(|e| {
        serde_json::Error::custom(format!("{} '{}': {}", self.category, key, e))
      }),
      None => {
        let message = format!(
          "invalid automation configuration: unknown {} '{}' in {}",
          self.category, key, value
        );
        record_failure(DiscriminatorFailure {
          category: self.category,
          key: Some(key.clone()),
          fragment: value.clone(),
        });
        Err(serde_json::Error::custom(message))
      }
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(&self, deserializer: D) -> Result<T, D::Error> {
    let value = Value::deserialize(deserializer)?;
    self.from_value(value).map_err(D::Error::custom)
  }
}

/// Implements `Deserialize` for a category model by dispatching through its
/// registry.
macro_rules! discriminated {
  ($model:ty, $registry:expr) => {
    impl<'de> serde::Deserialize<'de> for $model {
      fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        $registry.deserialize(deserializer)
      }
    }
  };
}

/// Constructor that deserializes the body into the payload of `$variant`.
macro_rules! variant {
  ($variant:path) => {
    |body| serde_json::from_value(body).map($variant)
  };
  ($variant:path, boxed) => {
    |body| serde_json::from_value(body).map(|inner| $variant(Box::new(inner)))
  };
}

pub(crate) use discriminated;
pub(crate) use variant;
