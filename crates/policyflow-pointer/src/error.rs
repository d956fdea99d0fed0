use std::fmt;

use serde::Serialize;
use serde_json::{Value, json};

/// Positional context attached to every evaluation failure.
///
/// Error actions configured downstream inspect these fields, so they are
/// kept as structured data rather than folded into a message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathContext {
  /// Name of the provider that was evaluating the pointer, if any.
  pub provider_name: Option<String>,
  /// The pointer as written in configuration.
  pub pointer: String,
  /// The part of the path that was walked successfully.
  pub path_prefix: String,
  /// The reference token that could not be resolved.
  pub token: String,
  /// Optional debug payload supplied by the caller.
  pub debug: Option<Value>,
}

impl PathContext {
  pub fn to_json(&self) -> Value {
    json!({
      "providerName": self.provider_name,
      "pointer": self.pointer,
      "pathPrefix": self.path_prefix,
      "token": self.token,
      "debug": self.debug,
    })
  }
}

impl fmt::Display for PathContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "pointer '{}' at '{}' (token '{}')",
      self.pointer, self.path_prefix, self.token
    )?;
    if let Some(provider) = &self.provider_name {
      write!(f, " in provider '{}'", provider)?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PathFailureKind {
  PathNotFound,
  IndexOutOfRange,
}

/// An expected, reportable failure: the addressed value does not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct PathFailure {
  pub kind: PathFailureKind,
  pub context: PathContext,
}

impl PathFailure {
  pub fn code(&self) -> &'static str {
    match self.kind {
      PathFailureKind::PathNotFound => "automation.path.not.found",
      PathFailureKind::IndexOutOfRange => "automation.path.index.out.of.range",
    }
  }
}

impl fmt::Display for PathFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.kind {
      PathFailureKind::PathNotFound => write!(f, "path not found: {}", self.context),
      PathFailureKind::IndexOutOfRange => write!(f, "index out of range: {}", self.context),
    }
  }
}

/// A hard failure: malformed pointer syntax or a path that walks into the
/// wrong shape of data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PointerError {
  #[error("invalid pointer syntax '{pointer}': {message}")]
  Syntax { pointer: String, message: String },

  #[error("relative pointer '{pointer}' requires a context pointer")]
  ContextRequired { pointer: String },

  #[error(
    "relative pointer '{pointer}' goes up {up} levels but context '{context}' has only {depth}"
  )]
  TooManyLevelsUp {
    pointer: String,
    context: String,
    up: usize,
    depth: usize,
  },

  #[error("relative pointer '{pointer}' asks for the key of the root")]
  KeyOfRoot { pointer: String },

  #[error("path resolves to a primitive when an object or array was expected: {0}")]
  PrimitiveWhenObjectExpected(PathContext),

  #[error("path resolves to an array when an object was expected: {0}")]
  ArrayWhenObjectExpected(PathContext),
}

impl PointerError {
  pub fn code(&self) -> &'static str {
    match self {
      Self::Syntax { .. } => "automation.pointer.invalid.syntax",
      Self::ContextRequired { .. } => "automation.pointer.context.required",
      Self::TooManyLevelsUp { .. } => "automation.pointer.too.many.levels.up",
      Self::KeyOfRoot { .. } => "automation.pointer.key.of.root",
      Self::PrimitiveWhenObjectExpected(_) => "automation.path.resolves.to.primitive",
      Self::ArrayWhenObjectExpected(_) => "automation.path.resolves.to.array",
    }
  }

  /// Positional context, when the failure happened while walking data.
  pub fn context(&self) -> Option<&PathContext> {
    match self {
      Self::PrimitiveWhenObjectExpected(ctx) | Self::ArrayWhenObjectExpected(ctx) => Some(ctx),
      _ => None,
    }
  }
}
