use async_trait::async_trait;
use minijinja::Environment;
use policyflow_config::ConfigError;
use policyflow_config::provider::ExpressionProviderModel;
use serde_json::Value;

use super::{BoxProvider, Provider, ProviderContext};
use crate::build::{Build, Dependencies};
use crate::data::widen_numbers;
use crate::error::EngineError;

impl Build for ExpressionProviderModel {
  type Output = BoxProvider<Value>;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(match self {
      Self::Evaluate(model) => {
        Environment::new()
          .compile_expression(&model.expression)
          .map(drop)
          .map_err(|e| ConfigError::InvalidValue {
            field: "evaluateExpression".to_string(),
            message: e.to_string(),
          })?;
        Box::new(Expression {
          source: Source::Fixed(model.expression.clone()),
          variables: model
            .variables
            .iter()
            .map(|variable| Ok::<_, ConfigError>((variable.name.clone(), variable.value.build(deps)?)))
            .collect::<Result<_, _>>()?,
        })
      }
      Self::EvaluateText(text) => Box::new(Expression {
        source: Source::Resolved(text.build(deps)?),
        variables: Vec::new(),
      }),
    })
  }
}

enum Source {
  Fixed(String),
  Resolved(BoxProvider<String>),
}

/// Evaluates a template expression against the automation data. An
/// undefined or none result is no value.
struct Expression {
  source: Source,
  variables: Vec<(String, BoxProvider<Value>)>,
}

#[async_trait]
impl Provider<Value> for Expression {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<Value>, EngineError> {
    let source = match &self.source {
      Source::Fixed(source) => source.clone(),
      Source::Resolved(text) => text.require(ctx, "expression").await?,
    };
    let mut context = ctx.template_context();
    for (name, value) in &self.variables {
      let value = value.resolve(ctx).await?.unwrap_or(Value::Null);
      if let Value::Object(map) = &mut context {
        map.insert(name.clone(), value);
      }
    }

    let env = Environment::new();
    let result = env.compile_expression(&source)?.eval(context)?;
    if result.is_undefined() || result.is_none() {
      return Ok(None);
    }
    Ok(Some(widen_numbers(serde_json::to_value(&result)?)))
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use tokio_util::sync::CancellationToken;

  use super::super::testing;
  use super::*;

  #[tokio::test]
  async fn test_expression_reads_automation_data() {
    let data = testing::data();
    let cancel = CancellationToken::new();
    let ctx = ProviderContext::new(&data, &cancel);

    let doubled =
      testing::build::<ExpressionProviderModel>(json!({"evaluateExpression": "context.quote.premium * 2"}));
    assert_eq!(doubled.resolve(&ctx).await.unwrap(), Some(json!(241)));

    let drivers = testing::build::<ExpressionProviderModel>(
      json!("context.quote.drivers | map(attribute='name') | list"),
    );
    assert_eq!(drivers.resolve(&ctx).await.unwrap(), Some(json!(["Ann", "Bob"])));

    let missing = testing::build::<ExpressionProviderModel>(json!("context.quote.discount"));
    assert_eq!(missing.resolve(&ctx).await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_variables_and_text_sources() {
    let data = testing::data();
    let cancel = CancellationToken::new();
    let ctx = ProviderContext::new(&data, &cancel);

    let scaled = testing::build::<ExpressionProviderModel>(json!({"evaluateExpression": {
      "expression": "count * 10",
      "variables": [{"name": "count", "value": {"countListItems": {"objectPathLookupList": "/context/quote/drivers"}}}]
    }}));
    assert_eq!(scaled.resolve(&ctx).await.unwrap(), Some(json!(20)));

    let from_text = testing::build::<ExpressionProviderModel>(json!({
      "evaluateTextExpression": {"concatenatedText": ["1 + ", "2"]}
    }));
    assert_eq!(from_text.resolve(&ctx).await.unwrap(), Some(json!(3)));
  }

  #[test]
  fn test_syntax_errors_fail_the_build() {
    let model: ExpressionProviderModel =
      serde_json::from_value(json!({"evaluateExpression": "premium *"})).unwrap();
    let Err(err) = model.build(&Dependencies::in_memory()) else {
      panic!("expected a build error");
    };
    assert_eq!(err.code(), "automation.configuration.invalid.value");
  }

  #[tokio::test]
  async fn test_runtime_syntax_error_is_a_template_error() {
    let data = testing::data();
    let cancel = CancellationToken::new();
    let provider = testing::build::<ExpressionProviderModel>(json!({
      "evaluateTextExpression": "1 +"
    }));
    let err = provider
      .resolve(&ProviderContext::new(&data, &cancel))
      .await
      .unwrap_err();
    assert!(matches!(err, EngineError::Template(_)), "got {:?}", err);
  }
}
