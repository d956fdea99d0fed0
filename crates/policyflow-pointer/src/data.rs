use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::navigable::{Child, Navigable, NodeKind};

/// A single resolved value with its runtime type attached.
///
/// Wrapping is transparent: serialization writes the inner value, and
/// pointer evaluation unwraps a `Data` before descending into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Data<T> {
  value: T,
}

impl<T> Data<T> {
  pub fn wrap(value: T) -> Self {
    Self { value }
  }

  pub fn unwrap(self) -> T {
    self.value
  }

  pub fn get(&self) -> &T {
    &self.value
  }

  /// Name of the wrapped type, used in type mismatch diagnostics.
  pub fn inner_type(&self) -> &'static str {
    std::any::type_name::<T>()
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Data<U> {
    Data::wrap(f(self.value))
  }
}

impl<T> From<T> for Data<T> {
  fn from(value: T) -> Self {
    Self::wrap(value)
  }
}

/// Capability of a value that wraps another navigable value.
pub trait DataWrapper {
  fn inner_type(&self) -> &'static str;

  fn inner(&self) -> &dyn Navigable;
}

impl<T: Navigable> DataWrapper for Data<T> {
  fn inner_type(&self) -> &'static str {
    Data::inner_type(self)
  }

  fn inner(&self) -> &dyn Navigable {
    &self.value
  }
}

impl<T: Navigable> Navigable for Data<T> {
  fn kind(&self) -> NodeKind {
    NodeKind::Wrapper
  }

  fn property(&self, _name: &str) -> Option<Child<'_>> {
    None
  }

  fn to_value(&self) -> Value {
    self.value.to_value()
  }

  fn as_data_wrapper(&self) -> Option<&dyn DataWrapper> {
    Some(self)
  }
}
