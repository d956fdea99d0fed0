//! Position of an action inside the action tree.

use std::fmt;

use policyflow_pointer::Pointer;

/// How an action hangs off its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Via {
  /// A top-level action of the automation.
  Root,
  /// A child of a group action.
  Child,
  /// A child of an iterate action, inside its current iteration.
  Iteration,
  /// An on-error action of the parent.
  OnError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
  pub via: Via,
  pub alias: String,
}

/// The alias chain leading to one action, e.g. `loop > grp > notify`.
///
/// Its pointer form addresses the action's record inside the automation
/// data: `/actions/loop/currentIteration/actions/grp/childActions/notify`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPath {
  segments: Vec<Segment>,
}

impl ActionPath {
  pub fn top(alias: impl Into<String>) -> Self {
    Self {
      segments: vec![Segment {
        via: Via::Root,
        alias: alias.into(),
      }],
    }
  }

  pub fn child(&self, alias: impl Into<String>, via: Via) -> Self {
    let mut segments = self.segments.clone();
    segments.push(Segment {
      via,
      alias: alias.into(),
    });
    Self { segments }
  }

  pub fn parent(&self) -> Option<Self> {
    if self.segments.len() < 2 {
      return None;
    }
    Some(Self {
      segments: self.segments[..self.segments.len() - 1].to_vec(),
    })
  }

  pub fn segments(&self) -> &[Segment] {
    &self.segments
  }

  /// Alias of the action this path points at.
  pub fn alias(&self) -> &str {
    // Paths are never empty.
    &self.segments[self.segments.len() - 1].alias
  }

  pub fn depth(&self) -> usize {
    self.segments.len()
  }

  pub fn to_pointer(&self) -> Pointer {
    let mut tokens = Vec::with_capacity(self.segments.len() * 3);
    for segment in &self.segments {
      match segment.via {
        Via::Root => tokens.push("actions".to_string()),
        Via::Child => tokens.push("childActions".to_string()),
        Via::Iteration => {
          tokens.push("currentIteration".to_string());
          tokens.push("actions".to_string());
        }
        Via::OnError => tokens.push("onErrorActions".to_string()),
      }
      tokens.push(segment.alias.clone());
    }
    Pointer::from_tokens(tokens)
  }

  /// Read a path back from its pointer form.
  pub fn from_pointer(pointer: &Pointer) -> Option<Self> {
    if pointer.is_relative() {
      return None;
    }
    let mut tokens = pointer.tokens().iter().map(String::as_str);
    let mut segments = Vec::new();
    let mut via = match tokens.next()? {
      "actions" => Via::Root,
      _ => return None,
    };
    loop {
      let alias = tokens.next()?;
      segments.push(Segment {
        via,
        alias: alias.to_string(),
      });
      via = match tokens.next() {
        None => break,
        Some("childActions") => Via::Child,
        Some("onErrorActions") => Via::OnError,
        Some("currentIteration") => match tokens.next()? {
          "actions" => Via::Iteration,
          _ => return None,
        },
        Some(_) => return None,
      };
    }
    Some(Self { segments })
  }

  pub fn parse(input: &str) -> Option<Self> {
    Pointer::parse(input).ok().as_ref().and_then(Self::from_pointer)
  }
}

impl fmt::Display for ActionPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.to_pointer())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_pointer_forms() {
    let path = ActionPath::top("loop")
      .child("grp", Via::Iteration)
      .child("notify", Via::Child);
    assert_eq!(
      path.to_string(),
      "/actions/loop/currentIteration/actions/grp/childActions/notify"
    );
    assert_eq!(
      ActionPath::top("x").child("y", Via::OnError).to_string(),
      "/actions/x/onErrorActions/y"
    );
  }

  #[test]
  fn test_parse_inverts_to_pointer() {
    let path = ActionPath::top("loop")
      .child("grp", Via::Iteration)
      .child("notify", Via::Child)
      .child("fallback", Via::OnError);
    assert_eq!(ActionPath::parse(&path.to_string()), Some(path));
  }

  #[test]
  fn test_parse_rejects_foreign_pointers() {
    assert_eq!(ActionPath::parse("/context/quote"), None);
    assert_eq!(ActionPath::parse("/actions"), None);
    assert_eq!(ActionPath::parse("/actions/a/currentIteration/item"), None);
    assert_eq!(ActionPath::parse("1/a"), None);
  }

  #[test]
  fn test_parent_and_alias() {
    let path = ActionPath::top("a").child("b", Via::Child);
    assert_eq!(path.alias(), "b");
    assert_eq!(path.parent(), Some(ActionPath::top("a")));
    assert_eq!(ActionPath::top("a").parent(), None);
    assert_eq!(path.depth(), 2);
  }
}
