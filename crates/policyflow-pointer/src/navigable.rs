use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::data::DataWrapper;

/// The shape of a node as seen by pointer evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
  Null,
  Primitive,
  Array,
  Object,
  /// A [`DataWrapper`]; must be unwrapped before descending.
  Wrapper,
}

/// A child reached while walking a pointer.
///
/// Structures that hold their children directly hand out a borrowed node.
/// Structures whose fields are not themselves navigable (enums, timestamps)
/// hand out an owned JSON value instead.
pub enum Child<'a> {
  Node(&'a dyn Navigable),
  Value(Value),
}

/// Something a [`crate::Pointer`] can walk.
pub trait Navigable {
  fn kind(&self) -> NodeKind;

  /// Look up a property of an object-like node.
  fn property(&self, _name: &str) -> Option<Child<'_>> {
    None
  }

  /// Number of elements of an array-like node.
  fn element_count(&self) -> usize {
    0
  }

  /// Element of an array-like node.
  fn element(&self, _index: usize) -> Option<Child<'_>> {
    None
  }

  /// Snapshot of this node as JSON.
  fn to_value(&self) -> Value;

  fn as_data_wrapper(&self) -> Option<&dyn DataWrapper> {
    None
  }
}

impl Navigable for Value {
  fn kind(&self) -> NodeKind {
    match self {
      Value::Null => NodeKind::Null,
      Value::Bool(_) | Value::Number(_) | Value::String(_) => NodeKind::Primitive,
      Value::Array(_) => NodeKind::Array,
      Value::Object(_) => NodeKind::Object,
    }
  }

  fn property(&self, name: &str) -> Option<Child<'_>> {
    self
      .as_object()
      .and_then(|map| map.get(name))
      .map(|v| Child::Node(v))
  }

  fn element_count(&self) -> usize {
    self.as_array().map(|a| a.len()).unwrap_or(0)
  }

  fn element(&self, index: usize) -> Option<Child<'_>> {
    self
      .as_array()
      .and_then(|a| a.get(index))
      .map(|v| Child::Node(v))
  }

  fn to_value(&self) -> Value {
    self.clone()
  }
}

impl Navigable for Map<String, Value> {
  fn kind(&self) -> NodeKind {
    NodeKind::Object
  }

  fn property(&self, name: &str) -> Option<Child<'_>> {
    self.get(name).map(|v| Child::Node(v))
  }

  fn to_value(&self) -> Value {
    Value::Object(self.clone())
  }
}

impl<T: Navigable> Navigable for IndexMap<String, T> {
  fn kind(&self) -> NodeKind {
    NodeKind::Object
  }

  fn property(&self, name: &str) -> Option<Child<'_>> {
    self.get(name).map(|v| Child::Node(v))
  }

  fn to_value(&self) -> Value {
    Value::Object(
      self
        .iter()
        .map(|(k, v)| (k.clone(), v.to_value()))
        .collect(),
    )
  }
}

impl<T: Navigable> Navigable for HashMap<String, T> {
  fn kind(&self) -> NodeKind {
    NodeKind::Object
  }

  fn property(&self, name: &str) -> Option<Child<'_>> {
    self.get(name).map(|v| Child::Node(v))
  }

  fn to_value(&self) -> Value {
    Value::Object(
      self
        .iter()
        .map(|(k, v)| (k.clone(), v.to_value()))
        .collect(),
    )
  }
}

impl<T: Navigable> Navigable for Vec<T> {
  fn kind(&self) -> NodeKind {
    NodeKind::Array
  }

  fn element_count(&self) -> usize {
    self.len()
  }

  fn element(&self, index: usize) -> Option<Child<'_>> {
    self.get(index).map(|v| Child::Node(v))
  }

  fn to_value(&self) -> Value {
    Value::Array(self.iter().map(|v| v.to_value()).collect())
  }
}

impl<T: Navigable> Navigable for Option<T> {
  fn kind(&self) -> NodeKind {
    match self {
      Some(inner) => inner.kind(),
      None => NodeKind::Null,
    }
  }

  fn property(&self, name: &str) -> Option<Child<'_>> {
    self.as_ref().and_then(|inner| inner.property(name))
  }

  fn element_count(&self) -> usize {
    self.as_ref().map(|inner| inner.element_count()).unwrap_or(0)
  }

  fn element(&self, index: usize) -> Option<Child<'_>> {
    self.as_ref().and_then(|inner| inner.element(index))
  }

  fn to_value(&self) -> Value {
    self.as_ref().map(|inner| inner.to_value()).unwrap_or(Value::Null)
  }

  fn as_data_wrapper(&self) -> Option<&dyn DataWrapper> {
    self.as_ref().and_then(|inner| inner.as_data_wrapper())
  }
}

macro_rules! primitive_navigable {
  ($($ty:ty),*) => {
    $(
      impl Navigable for $ty {
        fn kind(&self) -> NodeKind {
          NodeKind::Primitive
        }

        fn to_value(&self) -> Value {
          Value::from(self.clone())
        }
      }
    )*
  };
}

primitive_navigable!(String, bool, i64, u64, f64);

/// A root that overlays named variables on top of another navigable root.
///
/// Used to bind the current list item while evaluating filter conditions:
/// `/item/amount` resolves against the bound item, every other top-level
/// name falls through to the base.
pub struct ScopedRoot<'a> {
  base: &'a dyn Navigable,
  variables: Vec<(String, Value)>,
}

impl<'a> ScopedRoot<'a> {
  pub fn new(base: &'a dyn Navigable) -> Self {
    Self {
      base,
      variables: Vec::new(),
    }
  }

  pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
    self.variables.push((name.into(), value));
    self
  }
}

impl Navigable for ScopedRoot<'_> {
  fn kind(&self) -> NodeKind {
    NodeKind::Object
  }

  fn property(&self, name: &str) -> Option<Child<'_>> {
    // Later bindings shadow earlier ones.
    if let Some((_, value)) = self.variables.iter().rev().find(|(n, _)| n == name) {
      return Some(Child::Node(value));
    }
    self.base.property(name)
  }

  fn to_value(&self) -> Value {
    let mut value = self.base.to_value();
    if let Value::Object(map) = &mut value {
      for (name, bound) in &self.variables {
        map.insert(name.clone(), bound.clone());
      }
    }
    value
  }
}
