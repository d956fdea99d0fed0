use std::sync::LazyLock;

use serde::Deserialize;
use serde_json::Value;

use super::{DateProviderModel, IntegerProviderModel, NumberProviderModel, ObjectPathLookupModel, ObjectProviderModel};
use crate::registry::{TypeMap, discriminated, variant};

#[derive(Debug, Clone, PartialEq)]
pub enum TextProviderModel {
  Static(String),
  ObjectPathLookup(ObjectPathLookupModel<TextProviderModel>),
  /// Like `ObjectPathLookup`, but a missing value yields an empty string.
  ObjectPathLookupOrEmpty(ObjectPathLookupModel<TextProviderModel>),
  Concatenated(Vec<TextProviderModel>),
  Template(TemplateTextModel),
  IntegerToText(Box<IntegerProviderModel>),
  NumberToText(Box<NumberProviderModel>),
  DateToText(DateToTextModel),
  JsonText(Box<ObjectProviderModel>),
}

/// A minijinja template rendered against `data` (or the automation data).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateTextModel {
  pub template: String,
  #[serde(default)]
  pub data: Option<Box<ObjectProviderModel>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateToTextModel {
  pub date: Box<DateProviderModel>,
  /// chrono format string; ISO-8601 when absent.
  #[serde(default)]
  pub format: Option<String>,
}

pub static TEXT_PROVIDERS: LazyLock<TypeMap<TextProviderModel>> = LazyLock::new(|| {
  TypeMap::new("text provider")
    .register("staticText", variant!(TextProviderModel::Static))
    .register("objectPathLookupText", variant!(TextProviderModel::ObjectPathLookup))
    .register(
      "objectPathLookupTextOrEmpty",
      variant!(TextProviderModel::ObjectPathLookupOrEmpty),
    )
    .register("concatenatedText", variant!(TextProviderModel::Concatenated))
    .register("textConcatenation", variant!(TextProviderModel::Concatenated))
    .register("templateText", variant!(TextProviderModel::Template))
    .register("liquidText", variant!(TextProviderModel::Template))
    .register("integerToText", variant!(TextProviderModel::IntegerToText, boxed))
    .register("numberToText", variant!(TextProviderModel::NumberToText, boxed))
    .register("dateToText", variant!(TextProviderModel::DateToText))
    .register("jsonText", variant!(TextProviderModel::JsonText, boxed))
    .literal(|value| match value {
      Value::String(s) => Some(TextProviderModel::Static(s.clone())),
      Value::Number(n) => Some(TextProviderModel::Static(n.to_string())),
      Value::Bool(b) => Some(TextProviderModel::Static(b.to_string())),
      _ => None,
    })
});

discriminated!(TextProviderModel, TEXT_PROVIDERS);

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_literal_string() {
    let model: TextProviderModel = serde_json::from_value(json!("hello")).unwrap();
    assert_eq!(model, TextProviderModel::Static("hello".to_string()));
  }

  #[test]
  fn test_concatenation_alias() {
    let a: TextProviderModel =
      serde_json::from_value(json!({"concatenatedText": ["a", {"staticText": "b"}]})).unwrap();
    let b: TextProviderModel =
      serde_json::from_value(json!({"textConcatenation": ["a", {"staticText": "b"}]})).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn test_nested_integer_to_text() {
    let model: TextProviderModel =
      serde_json::from_value(json!({"integerToText": {"parseTextInteger": "12"}})).unwrap();
    assert!(matches!(model, TextProviderModel::IntegerToText(_)));
  }

  #[test]
  fn test_template_with_data() {
    let model: TextProviderModel = serde_json::from_value(json!({
      "templateText": {"template": "Hi {{ name }}", "data": {"staticObject": {"name": "Ann"}}}
    }))
    .unwrap();
    let TextProviderModel::Template(template) = model else {
      panic!("expected template");
    };
    assert_eq!(template.template, "Hi {{ name }}");
    assert!(template.data.is_some());
  }
}
