//! JSON-patch style edits applied by `patchObject`.

use policyflow_config::ConfigError;
use policyflow_config::provider::PatchOperationModel;
use policyflow_pointer::Pointer;
use serde_json::Value;

use super::{BoxProvider, ProviderContext};
use crate::build::{Build, Dependencies};
use crate::error::EngineError;

const APPEND: &str = "-";

pub enum PatchOperation {
  Add { path: Vec<String>, value: BoxProvider<Value> },
  Replace { path: Vec<String>, value: BoxProvider<Value> },
  Remove { path: Vec<String> },
  Copy { from: Vec<String>, path: Vec<String> },
  Move { from: Vec<String>, path: Vec<String> },
}

fn tokens(path: &str) -> Result<Vec<String>, ConfigError> {
  let invalid = |message: String| ConfigError::InvalidValue {
    field: "patchObject".to_string(),
    message,
  };
  let pointer = Pointer::parse(path).map_err(|e| invalid(e.to_string()))?;
  if pointer.is_relative() {
    return Err(invalid(format!("patch path '{}' must be absolute", path)));
  }
  Ok(pointer.tokens().to_vec())
}

impl Build for PatchOperationModel {
  type Output = PatchOperation;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(match self {
      Self::Add(model) => PatchOperation::Add {
        path: tokens(&model.path)?,
        value: model.value.build(deps)?,
      },
      Self::Replace(model) => PatchOperation::Replace {
        path: tokens(&model.path)?,
        value: model.value.build(deps)?,
      },
      Self::Remove(model) => PatchOperation::Remove {
        path: tokens(&model.path)?,
      },
      Self::Copy(model) => PatchOperation::Copy {
        from: tokens(&model.from)?,
        path: tokens(&model.path)?,
      },
      Self::Move(model) => PatchOperation::Move {
        from: tokens(&model.from)?,
        path: tokens(&model.path)?,
      },
    })
  }
}

/// Apply `operations` in order. Any failing operation fails the whole patch.
pub(crate) async fn apply(
  operations: &[PatchOperation],
  mut target: Value,
  ctx: &ProviderContext<'_>,
) -> Result<Value, EngineError> {
  for operation in operations {
    let outcome = match operation {
      PatchOperation::Add { path, value } => {
        let value = value.resolve(ctx).await?.unwrap_or(Value::Null);
        add(&mut target, path, value)
      }
      PatchOperation::Replace { path, value } => {
        let value = value.resolve(ctx).await?.unwrap_or(Value::Null);
        replace(&mut target, path, value)
      }
      PatchOperation::Remove { path } => remove(&mut target, path).map(drop),
      PatchOperation::Copy { from, path } => match get(&target, from).cloned() {
        Some(value) => add(&mut target, path, value),
        None => Err(format!("nothing to copy at '{}'", display(from))),
      },
      PatchOperation::Move { from, path } => {
        remove(&mut target, from).and_then(|value| add(&mut target, path, value))
      }
    };
    outcome.map_err(|message| EngineError::invalid_value("patchObject", message))?;
  }
  Ok(target)
}

fn display(path: &[String]) -> String {
  Pointer::from_tokens(path.iter().cloned()).to_string()
}

fn get<'v>(mut value: &'v Value, path: &[String]) -> Option<&'v Value> {
  for token in path {
    value = match value {
      Value::Object(map) => map.get(token)?,
      Value::Array(items) => items.get(token.parse::<usize>().ok()?)?,
      _ => return None,
    };
  }
  Some(value)
}

fn get_mut<'v>(mut value: &'v mut Value, path: &[String]) -> Option<&'v mut Value> {
  for token in path {
    value = match value {
      Value::Object(map) => map.get_mut(token)?,
      Value::Array(items) => items.get_mut(token.parse::<usize>().ok()?)?,
      _ => return None,
    };
  }
  Some(value)
}

fn parent<'v>(
  target: &'v mut Value,
  path: &'v [String],
) -> Result<(&'v mut Value, &'v str), String> {
  let Some((last, parents)) = path.split_last() else {
    return Err("the document root cannot be the target".to_string());
  };
  let container =
    get_mut(target, parents).ok_or_else(|| format!("no parent for '{}'", display(path)))?;
  Ok((container, last))
}

fn add(target: &mut Value, path: &[String], value: Value) -> Result<(), String> {
  if path.is_empty() {
    *target = value;
    return Ok(());
  }
  let (container, last) = parent(target, path)?;
  match container {
    Value::Object(map) => {
      map.insert(last.to_string(), value);
      Ok(())
    }
    Value::Array(items) if last == APPEND => {
      items.push(value);
      Ok(())
    }
    Value::Array(items) => match last.parse::<usize>() {
      Ok(index) if index <= items.len() => {
        items.insert(index, value);
        Ok(())
      }
      _ => Err(format!("index '{}' is out of range", last)),
    },
    _ => Err(format!("cannot add to a primitive at '{}'", display(path))),
  }
}

fn replace(target: &mut Value, path: &[String], value: Value) -> Result<(), String> {
  let slot =
    get_mut(target, path).ok_or_else(|| format!("nothing to replace at '{}'", display(path)))?;
  *slot = value;
  Ok(())
}

fn remove(target: &mut Value, path: &[String]) -> Result<Value, String> {
  let (container, last) = parent(target, path)?;
  let removed = match container {
    Value::Object(map) => map.shift_remove(last),
    Value::Array(items) => match last.parse::<usize>() {
      Ok(index) if index < items.len() => Some(items.remove(index)),
      _ => None,
    },
    _ => None,
  };
  removed.ok_or_else(|| format!("nothing to remove at '{}'", display(path)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn path(pointer: &str) -> Vec<String> {
    tokens(pointer).unwrap()
  }

  #[test]
  fn test_add_and_append() {
    let mut doc = json!({"items": [1, 3]});
    add(&mut doc, &path("/items/1"), json!(2)).unwrap();
    add(&mut doc, &path("/items/-"), json!(4)).unwrap();
    add(&mut doc, &path("/name"), json!("x")).unwrap();
    assert_eq!(doc, json!({"items": [1, 2, 3, 4], "name": "x"}));
    assert!(add(&mut doc, &path("/items/9"), json!(0)).is_err());
    assert!(add(&mut doc, &path("/missing/child"), json!(0)).is_err());
  }

  #[test]
  fn test_replace_requires_existing() {
    let mut doc = json!({"a": 1});
    replace(&mut doc, &path("/a"), json!(2)).unwrap();
    assert_eq!(doc, json!({"a": 2}));
    assert!(replace(&mut doc, &path("/b"), json!(2)).is_err());
  }

  #[test]
  fn test_remove_keeps_order() {
    let mut doc = json!({"a": 1, "b": 2, "c": 3});
    assert_eq!(remove(&mut doc, &path("/a")).unwrap(), json!(1));
    let keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["b", "c"]);
  }

  #[test]
  fn test_relative_paths_rejected() {
    assert!(tokens("1/a").is_err());
  }
}
