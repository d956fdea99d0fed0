use std::fmt;

use serde_json::Value;

use crate::error::{PathContext, PathFailure, PathFailureKind, PointerError};
use crate::navigable::{Child, Navigable, NodeKind};

const SEPARATOR: char = '/';
const KEY_SUFFIX: char = '#';

/// Outcome of a successful pointer evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
  Found(Value),
  Missing(PathFailure),
}

impl Resolution {
  pub fn found(self) -> Option<Value> {
    match self {
      Resolution::Found(value) => Some(value),
      Resolution::Missing(_) => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RelativePrefix {
  up: usize,
  key_request: bool,
}

/// A parsed object pointer.
///
/// Absolute pointers (`/quote/customer/name`) walk from the root. Relative
/// pointers start with a non-negative integer: `1/d` discards one trailing
/// segment of the context pointer and appends `d`; `2#` resolves to the key
/// (property name or array index) found two levels above the context.
///
/// Pointers accept three written forms: plain (`/a~1b`), a JSON string
/// literal (`"/a~1b"`), and a URI fragment (`#/a%20b`).
#[derive(Debug, Clone)]
pub struct Pointer {
  tokens: Vec<String>,
  relative: Option<RelativePrefix>,
  source: String,
  provider_name: Option<String>,
  debug: Option<Value>,
}

impl PartialEq for Pointer {
  fn eq(&self, other: &Self) -> bool {
    self.tokens == other.tokens && self.relative == other.relative
  }
}

impl Eq for Pointer {}

impl Pointer {
  /// The root pointer, addressing the whole document.
  pub fn root() -> Self {
    Self::from_tokens(Vec::<String>::new())
  }

  /// Build an absolute pointer from unescaped reference tokens.
  pub fn from_tokens<I, S>(tokens: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
    let source = format_absolute(&tokens);
    Self {
      tokens,
      relative: None,
      source,
      provider_name: None,
      debug: None,
    }
  }

  /// Parse a pointer in any of its written forms.
  pub fn parse(input: &str) -> Result<Self, PointerError> {
    let normal = if input.starts_with('"') {
      serde_json::from_str::<String>(input).map_err(|e| PointerError::Syntax {
        pointer: input.to_string(),
        message: format!("invalid JSON string: {}", e),
      })?
    } else if let Some(fragment) = input.strip_prefix(KEY_SUFFIX) {
      urlencoding::decode(fragment)
        .map_err(|e| PointerError::Syntax {
          pointer: input.to_string(),
          message: format!("invalid URI fragment encoding: {}", e),
        })?
        .into_owned()
    } else {
      input.to_string()
    };

    let mut pointer = Self::parse_normal(&normal)?;
    pointer.source = input.to_string();
    Ok(pointer)
  }

  fn parse_normal(input: &str) -> Result<Self, PointerError> {
    if input.is_empty() {
      return Ok(Self::root());
    }

    if let Some(rest) = input.strip_prefix(SEPARATOR) {
      let tokens = rest
        .split(SEPARATOR)
        .map(|t| unescape(t, input))
        .collect::<Result<Vec<_>, _>>()?;
      return Ok(Self {
        tokens,
        relative: None,
        source: input.to_string(),
        provider_name: None,
        debug: None,
      });
    }

    let digits_end = input
      .find(|c: char| !c.is_ascii_digit())
      .unwrap_or(input.len());
    if digits_end == 0 {
      return Err(PointerError::Syntax {
        pointer: input.to_string(),
        message: "a pointer must start with '/' or a non-negative integer".to_string(),
      });
    }

    let prefix = &input[..digits_end];
    if prefix.len() > 1 && prefix.starts_with('0') {
      return Err(PointerError::Syntax {
        pointer: input.to_string(),
        message: "the relative prefix must not have leading zeros".to_string(),
      });
    }
    let up: usize = prefix.parse().map_err(|_| PointerError::Syntax {
      pointer: input.to_string(),
      message: format!("relative prefix '{}' is too large", prefix),
    })?;

    let rest = &input[digits_end..];
    let (key_request, tokens) = if rest.is_empty() {
      (false, Vec::new())
    } else if rest.len() == 1 && rest.starts_with(KEY_SUFFIX) {
      (true, Vec::new())
    } else if let Some(path) = rest.strip_prefix(SEPARATOR) {
      let tokens = path
        .split(SEPARATOR)
        .map(|t| unescape(t, input))
        .collect::<Result<Vec<_>, _>>()?;
      (false, tokens)
    } else {
      return Err(PointerError::Syntax {
        pointer: input.to_string(),
        message: "expected '/' or '#' after the relative prefix".to_string(),
      });
    };

    Ok(Self {
      tokens,
      relative: Some(RelativePrefix { up, key_request }),
      source: input.to_string(),
      provider_name: None,
      debug: None,
    })
  }

  /// Attach the name of the provider evaluating this pointer.
  pub fn with_provider(mut self, provider_name: impl Into<String>) -> Self {
    self.provider_name = Some(provider_name.into());
    self
  }

  /// Attach a debug payload reported with any failure.
  pub fn with_debug(mut self, debug: Value) -> Self {
    self.debug = Some(debug);
    self
  }

  pub fn tokens(&self) -> &[String] {
    &self.tokens
  }

  pub fn is_relative(&self) -> bool {
    self.relative.is_some()
  }

  /// The text this pointer was parsed from.
  pub fn source(&self) -> &str {
    &self.source
  }

  /// A new absolute pointer with one more token appended.
  pub fn join(&self, token: impl Into<String>) -> Self {
    let mut tokens = self.tokens.clone();
    tokens.push(token.into());
    Self::from_tokens(tokens)
  }

  /// Resolve a relative pointer against a context into an absolute one.
  ///
  /// Key requests (`N#`) have no absolute equivalent and are rejected.
  pub fn to_absolute(&self, context: &Pointer) -> Result<Pointer, PointerError> {
    let Some(prefix) = self.relative else {
      return Ok(self.clone());
    };
    if prefix.key_request {
      return Err(PointerError::Syntax {
        pointer: self.source.clone(),
        message: "a key request cannot be converted to an absolute pointer".to_string(),
      });
    }
    let base = self.truncate_context(prefix.up, context)?;
    let mut tokens = base.to_vec();
    tokens.extend(self.tokens.iter().cloned());
    Ok(self.rebuilt(tokens))
  }

  fn truncate_context<'c>(
    &self,
    up: usize,
    context: &'c Pointer,
  ) -> Result<&'c [String], PointerError> {
    let depth = context.tokens.len();
    if up > depth {
      return Err(PointerError::TooManyLevelsUp {
        pointer: self.source.clone(),
        context: context.to_string(),
        up,
        depth,
      });
    }
    Ok(&context.tokens[..depth - up])
  }

  fn rebuilt(&self, tokens: Vec<String>) -> Pointer {
    Pointer {
      tokens,
      relative: None,
      source: self.source.clone(),
      provider_name: self.provider_name.clone(),
      debug: self.debug.clone(),
    }
  }

  /// Evaluate this pointer against a root.
  ///
  /// `context` is the current position in the tree and is required for
  /// relative pointers.
  pub fn evaluate(
    &self,
    root: &dyn Navigable,
    context: Option<&Pointer>,
  ) -> Result<Resolution, PointerError> {
    match self.relative {
      None => self.walk(root, 0),
      Some(prefix) => {
        let context = context.ok_or_else(|| PointerError::ContextRequired {
          pointer: self.source.clone(),
        })?;
        if prefix.key_request {
          return self.resolve_key(root, prefix.up, context);
        }
        self.to_absolute(context)?.walk(root, 0)
      }
    }
  }

  fn resolve_key(
    &self,
    root: &dyn Navigable,
    up: usize,
    context: &Pointer,
  ) -> Result<Resolution, PointerError> {
    let base = self.truncate_context(up, context)?;
    let Some((key, parent)) = base.split_last() else {
      return Err(PointerError::KeyOfRoot {
        pointer: self.source.clone(),
      });
    };

    // An index is reported as a number when its container is an array.
    let container = self.rebuilt(parent.to_vec());
    let in_array = matches!(container.walk_kind(root, 0), Some(NodeKind::Array));
    if in_array && let Ok(index) = key.parse::<u64>() {
      return Ok(Resolution::Found(Value::from(index)));
    }
    Ok(Resolution::Found(Value::String(key.clone())))
  }

  fn walk(&self, node: &dyn Navigable, index: usize) -> Result<Resolution, PointerError> {
    let node = unwrap_data(node);
    let Some(token) = self.tokens.get(index) else {
      return Ok(Resolution::Found(node.to_value()));
    };

    let child = match node.kind() {
      NodeKind::Null => {
        if token.is_empty() {
          return self.walk(node, index + 1);
        }
        return Ok(Resolution::Missing(
          self.failure(PathFailureKind::PathNotFound, index),
        ));
      }
      NodeKind::Array => {
        if !is_array_index(token) {
          return Err(PointerError::ArrayWhenObjectExpected(self.context_at(index)));
        }
        let position: usize = match token.parse() {
          Ok(p) => p,
          Err(_) => {
            return Ok(Resolution::Missing(
              self.failure(PathFailureKind::IndexOutOfRange, index),
            ));
          }
        };
        if position >= node.element_count() {
          return Ok(Resolution::Missing(
            self.failure(PathFailureKind::IndexOutOfRange, index),
          ));
        }
        node.element(position)
      }
      NodeKind::Object => node.property(token),
      NodeKind::Primitive | NodeKind::Wrapper => {
        return Err(PointerError::PrimitiveWhenObjectExpected(
          self.context_at(index),
        ));
      }
    };

    match child {
      Some(Child::Node(next)) => self.walk(next, index + 1),
      Some(Child::Value(value)) => self.walk(&value, index + 1),
      None => Ok(Resolution::Missing(
        self.failure(PathFailureKind::PathNotFound, index),
      )),
    }
  }

  /// Walk to the end of the pointer and report the node kind found there.
  fn walk_kind(&self, node: &dyn Navigable, index: usize) -> Option<NodeKind> {
    let node = unwrap_data(node);
    let Some(token) = self.tokens.get(index) else {
      return Some(node.kind());
    };
    let child = match node.kind() {
      NodeKind::Array => token.parse().ok().and_then(|i| node.element(i)),
      NodeKind::Object => node.property(token),
      _ => None,
    };
    match child {
      Some(Child::Node(next)) => self.walk_kind(next, index + 1),
      Some(Child::Value(value)) => self.walk_kind(&value, index + 1),
      None => None,
    }
  }

  fn failure(&self, kind: PathFailureKind, index: usize) -> PathFailure {
    PathFailure {
      kind,
      context: self.context_at(index),
    }
  }

  fn context_at(&self, index: usize) -> PathContext {
    PathContext {
      provider_name: self.provider_name.clone(),
      pointer: self.source.clone(),
      path_prefix: format_absolute(&self.tokens[..index]),
      token: self.tokens[index].clone(),
      debug: self.debug.clone(),
    }
  }
}

impl fmt::Display for Pointer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if let Some(prefix) = self.relative {
      write!(f, "{}", prefix.up)?;
      if prefix.key_request {
        return write!(f, "{}", KEY_SUFFIX);
      }
    }
    write!(f, "{}", format_absolute(&self.tokens))
  }
}

impl std::str::FromStr for Pointer {
  type Err = PointerError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Pointer::parse(s)
  }
}

fn unwrap_data(mut node: &dyn Navigable) -> &dyn Navigable {
  while let Some(wrapper) = node.as_data_wrapper() {
    node = wrapper.inner();
  }
  node
}

fn is_array_index(token: &str) -> bool {
  !token.is_empty()
    && token.bytes().all(|b| b.is_ascii_digit())
    && (token == "0" || !token.starts_with('0'))
}

fn unescape(token: &str, pointer: &str) -> Result<String, PointerError> {
  if !token.contains('~') {
    return Ok(token.to_string());
  }
  let mut out = String::with_capacity(token.len());
  let mut chars = token.chars();
  while let Some(c) = chars.next() {
    if c != '~' {
      out.push(c);
      continue;
    }
    match chars.next() {
      Some('0') => out.push('~'),
      Some('1') => out.push('/'),
      _ => {
        return Err(PointerError::Syntax {
          pointer: pointer.to_string(),
          message: "'~' must be followed by '0' or '1'".to_string(),
        });
      }
    }
  }
  Ok(out)
}

fn escape(token: &str) -> String {
  token.replace('~', "~0").replace('/', "~1")
}

fn format_absolute(tokens: &[String]) -> String {
  tokens
    .iter()
    .map(|t| format!("{}{}", SEPARATOR, escape(t)))
    .collect()
}
