//! Runtime data providers.
//!
//! A provider is the built form of a provider model: it resolves a typed
//! value against a [`ProviderContext`]. `Ok(None)` means the source is
//! absent and the configuration did not ask for an error; callers that need
//! a value use [`Provider::require`](trait.Provider.html#method.require).

mod archive;
mod binary;
mod condition;
mod entity;
mod expression;
mod list;
mod lookup;
mod number;
mod object;
mod patch;
mod temporal;
mod text;

pub use binary::FileProvider;
pub use entity::Entity;
pub use list::FilterCondition;
pub use lookup::{LookupValue, PathLookup};
pub use temporal::{Period, parse_date, parse_date_time, parse_iso_duration, parse_time};

pub(crate) use number::decimal_to_value;

use async_trait::async_trait;
use policyflow_pointer::{Navigable, Pointer, PointerError, Resolution, ScopedRoot};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::data::AutomationData;
use crate::error::EngineError;

/// Everything a provider may read while resolving.
#[derive(Clone)]
pub struct ProviderContext<'a> {
  data: &'a AutomationData,
  /// Pointer of the action being run; relative pointers start here.
  position: Pointer,
  /// Names bound on top of the automation data, e.g. the current list item.
  variables: Vec<(String, Value)>,
  cancel: CancellationToken,
}

impl<'a> ProviderContext<'a> {
  pub fn new(data: &'a AutomationData, cancel: &CancellationToken) -> Self {
    Self {
      data,
      position: Pointer::root(),
      variables: Vec::new(),
      cancel: cancel.clone(),
    }
  }

  /// The same context positioned at `position`.
  pub fn at(mut self, position: Pointer) -> Self {
    self.position = position;
    self
  }

  /// A child context with `name` bound to `value`.
  pub fn with_variable(&self, name: impl Into<String>, value: Value) -> Self {
    let mut scoped = self.clone();
    scoped.variables.push((name.into(), value));
    scoped
  }

  pub fn data(&self) -> &'a AutomationData {
    self.data
  }

  pub fn position(&self) -> &Pointer {
    &self.position
  }

  pub fn cancellation(&self) -> &CancellationToken {
    &self.cancel
  }

  pub fn check_cancelled(&self) -> Result<(), EngineError> {
    if self.cancel.is_cancelled() {
      return Err(EngineError::Cancelled);
    }
    Ok(())
  }

  /// Evaluate a pointer against the automation data and bound variables.
  pub fn evaluate(&self, pointer: &Pointer) -> Result<Resolution, PointerError> {
    if self.variables.is_empty() {
      return pointer.evaluate(self.data, Some(&self.position));
    }
    let root = self
      .variables
      .iter()
      .fold(ScopedRoot::new(self.data), |root, (name, value)| {
        root.with_variable(name.clone(), value.clone())
      });
    pointer.evaluate(&root, Some(&self.position))
  }

  /// The automation data as JSON, with bound variables as top-level keys.
  pub fn template_context(&self) -> Value {
    let mut value = self.data.to_value();
    if let Value::Object(map) = &mut value {
      for (name, bound) in &self.variables {
        map.insert(name.clone(), bound.clone());
      }
    }
    value
  }
}

#[async_trait]
pub trait Provider<T>: Send + Sync {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<T>, EngineError>;
}

pub type BoxProvider<T> = Box<dyn Provider<T>>;

impl<T: Send + 'static> dyn Provider<T> {
  /// Resolve a value that must be present.
  pub async fn require(&self, ctx: &ProviderContext<'_>, field: &str) -> Result<T, EngineError> {
    self
      .resolve(ctx)
      .await?
      .ok_or_else(|| EngineError::missing_value(field))
  }
}

/// Resolve an optional provider, treating an absent provider as no value.
pub(crate) async fn resolve_optional<T: Send + 'static>(
  provider: &Option<BoxProvider<T>>,
  ctx: &ProviderContext<'_>,
) -> Result<Option<T>, EngineError> {
  match provider {
    Some(provider) => provider.resolve(ctx).await,
    None => Ok(None),
  }
}

/// A value fixed at configuration time.
pub struct StaticProvider<T>(pub T);

#[async_trait]
impl<T: Clone + Send + Sync> Provider<T> for StaticProvider<T> {
  async fn resolve(&self, _ctx: &ProviderContext<'_>) -> Result<Option<T>, EngineError> {
    Ok(Some(self.0.clone()))
  }
}

/// Converts the value of another provider.
pub struct MapProvider<A, B> {
  inner: BoxProvider<A>,
  convert: fn(A) -> Result<B, EngineError>,
}

impl<A, B> MapProvider<A, B> {
  pub fn new(inner: BoxProvider<A>, convert: fn(A) -> Result<B, EngineError>) -> Self {
    Self { inner, convert }
  }
}

#[async_trait]
impl<A: Send + 'static, B: Send + 'static> Provider<B> for MapProvider<A, B> {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<B>, EngineError> {
    match self.inner.resolve(ctx).await? {
      Some(value) => (self.convert)(value).map(Some),
      None => Ok(None),
    }
  }
}
