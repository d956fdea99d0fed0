use std::sync::LazyLock;

use serde::Deserialize;

use super::{ObjectProviderModel, TextProviderModel};
use crate::registry::{TypeMap, discriminated, variant};

/// An expression evaluated against the automation data, e.g.
/// `context.quote.premium * 1.1` or `trigger.eventTags | length > 0`.
///
/// Names in `variables` shadow the automation data sections.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "ExpressionRepr")]
pub struct ExpressionModel {
  pub expression: String,
  pub variables: Vec<ExpressionVariableModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionVariableModel {
  pub name: String,
  pub value: ObjectProviderModel,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExpressionRepr {
  Expression(String),
  Full {
    expression: String,
    #[serde(default)]
    variables: Vec<ExpressionVariableModel>,
  },
}

impl From<ExpressionRepr> for ExpressionModel {
  fn from(repr: ExpressionRepr) -> Self {
    match repr {
      ExpressionRepr::Expression(expression) => Self {
        expression,
        variables: Vec::new(),
      },
      ExpressionRepr::Full {
        expression,
        variables,
      } => Self {
        expression,
        variables,
      },
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionProviderModel {
  Evaluate(ExpressionModel),
  /// The expression source is itself resolved at run time.
  EvaluateText(Box<TextProviderModel>),
}

pub static EXPRESSION_PROVIDERS: LazyLock<TypeMap<ExpressionProviderModel>> =
  LazyLock::new(|| {
    TypeMap::new("expression provider")
      .register("evaluateExpression", variant!(ExpressionProviderModel::Evaluate))
      .register(
        "evaluateTextExpression",
        variant!(ExpressionProviderModel::EvaluateText, boxed),
      )
      .literal(|value| {
        value.as_str().map(|expression| {
          ExpressionProviderModel::Evaluate(ExpressionModel {
            expression: expression.to_string(),
            variables: Vec::new(),
          })
        })
      })
  });

discriminated!(ExpressionProviderModel, EXPRESSION_PROVIDERS);

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_bare_string_is_an_expression() {
    let model: ExpressionProviderModel = serde_json::from_value(json!("1 + 2")).unwrap();
    let ExpressionProviderModel::Evaluate(model) = model else {
      panic!("expected evaluate");
    };
    assert_eq!(model.expression, "1 + 2");
    assert!(model.variables.is_empty());
  }

  #[test]
  fn test_variables_take_object_providers() {
    let model: ExpressionProviderModel = serde_json::from_value(json!({
      "evaluateExpression": {
        "expression": "rate * 2",
        "variables": [{"name": "rate", "value": {"objectPathLookupNumber": "/context/quote/rate"}}]
      }
    }))
    .unwrap();
    let ExpressionProviderModel::Evaluate(model) = model else {
      panic!("expected evaluate");
    };
    assert_eq!(model.variables[0].name, "rate");
    assert!(matches!(model.variables[0].value, ObjectProviderModel::Number(_)));
  }

  #[test]
  fn test_missing_expression_is_rejected() {
    let result: Result<ExpressionProviderModel, _> =
      serde_json::from_value(json!({"evaluateExpression": {"variables": []}}));
    assert!(result.is_err());
  }
}
