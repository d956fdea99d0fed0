use async_trait::async_trait;
use chrono::NaiveDate;
use minijinja::Environment;
use policyflow_config::ConfigError;
use policyflow_config::provider::TextProviderModel;
use rust_decimal::Decimal;
use serde_json::Value;

use super::{BoxProvider, MapProvider, PathLookup, Provider, ProviderContext, StaticProvider};
use crate::build::{Build, Dependencies};
use crate::error::EngineError;

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

impl Build for TextProviderModel {
  type Output = BoxProvider<String>;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(match self {
      Self::Static(text) => Box::new(StaticProvider(text.clone())),
      Self::ObjectPathLookup(model) => {
        Box::new(PathLookup::build("objectPathLookupText", model, deps)?)
      }
      Self::ObjectPathLookupOrEmpty(model) => Box::new(OrEmpty(Box::new(PathLookup::lenient(
        "objectPathLookupTextOrEmpty",
        &model.path,
        model.data_object.as_deref(),
        deps,
      )?))),
      Self::Concatenated(parts) => Box::new(Concatenated(parts.build(deps)?)),
      Self::Template(model) => {
        // Surface syntax errors when the configuration loads.
        let env = Environment::new();
        env
          .template_from_str(&model.template)
          .map_err(|e| ConfigError::InvalidValue {
            field: "templateText".to_string(),
            message: e.to_string(),
          })?;
        Box::new(TemplateText {
          template: model.template.clone(),
          data: model.data.build(deps)?,
        })
      }
      Self::IntegerToText(model) => Box::new(MapProvider::new(model.build(deps)?, |integer: i64| {
        Ok(integer.to_string())
      })),
      Self::NumberToText(model) => Box::new(MapProvider::new(model.build(deps)?, |number: Decimal| {
        Ok(number.normalize().to_string())
      })),
      Self::DateToText(model) => Box::new(DateToText {
        date: model.date.build(deps)?,
        format: model
          .format
          .clone()
          .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string()),
      }),
      Self::JsonText(model) => Box::new(MapProvider::new(model.build(deps)?, |value: Value| {
        Ok(serde_json::to_string(&value)?)
      })),
    })
  }
}

struct OrEmpty(BoxProvider<String>);

#[async_trait]
impl Provider<String> for OrEmpty {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<String>, EngineError> {
    Ok(Some(self.0.resolve(ctx).await?.unwrap_or_default()))
  }
}

/// Joins its parts; absent parts contribute nothing.
struct Concatenated(Vec<BoxProvider<String>>);

#[async_trait]
impl Provider<String> for Concatenated {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<String>, EngineError> {
    let mut text = String::new();
    for part in &self.0 {
      if let Some(part) = part.resolve(ctx).await? {
        text.push_str(&part);
      }
    }
    Ok(Some(text))
  }
}

struct TemplateText {
  template: String,
  data: Option<BoxProvider<Value>>,
}

#[async_trait]
impl Provider<String> for TemplateText {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<String>, EngineError> {
    let context = match &self.data {
      Some(data) => data.resolve(ctx).await?.unwrap_or(Value::Null),
      None => ctx.template_context(),
    };
    let rendered = Environment::new().render_str(&self.template, context)?;
    Ok(Some(rendered))
  }
}

struct DateToText {
  date: BoxProvider<NaiveDate>,
  format: String,
}

#[async_trait]
impl Provider<String> for DateToText {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<String>, EngineError> {
    use std::fmt::Write;

    let Some(date) = self.date.resolve(ctx).await? else {
      return Ok(None);
    };
    let mut text = String::new();
    write!(text, "{}", date.format(&self.format)).map_err(|_| {
      EngineError::invalid_value("dateToText", format!("invalid date format '{}'", self.format))
    })?;
    Ok(Some(text))
  }
}
