use std::sync::Arc;

use async_trait::async_trait;
use policyflow_config::ConfigError;
use policyflow_config::action::{CreateQuoteActionModel, EntityOperationActionModel};
use policyflow_config::provider::EntityProviderModel;
use serde_json::Value;

use super::Perform;
use crate::build::{Build, Dependencies};
use crate::data::{ActionDetails, EntityOperationOutcome};
use crate::error::EngineError;
use crate::provider::{BoxProvider, Entity, ProviderContext, resolve_optional};
use crate::services::{CreateQuoteRequest, QuoteOperation, QuoteService};

const NEW_BUSINESS: &str = "newBusiness";
const RENEWAL: &str = "renewal";

pub struct CreateQuote {
  product_alias: Option<BoxProvider<String>>,
  quote_type: Option<BoxProvider<String>>,
  policy: Option<BoxProvider<Entity>>,
  customer: Option<BoxProvider<Entity>>,
  form_data: Option<BoxProvider<Value>>,
  quotes: Arc<dyn QuoteService>,
}

impl Build for CreateQuoteActionModel {
  type Output = CreateQuote;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(CreateQuote {
      product_alias: self.product_alias.build(deps)?,
      quote_type: self.quote_type.build(deps)?,
      policy: self.policy.build(deps)?,
      customer: self.customer.build(deps)?,
      form_data: self.form_data.build(deps)?,
      quotes: deps.quotes.clone(),
    })
  }
}

#[async_trait]
impl Perform for CreateQuote {
  fn initial_details(&self) -> ActionDetails {
    ActionDetails::CreateQuote {
      quote_id: None,
      quote: None,
    }
  }

  async fn perform(
    &self,
    ctx: &ProviderContext<'_>,
    details: &mut ActionDetails,
  ) -> Result<(), EngineError> {
    let automation = &ctx.data().automation;
    let policy = resolve_optional(&self.policy, ctx).await?;
    let quote_type = match resolve_optional(&self.quote_type, ctx).await? {
      Some(quote_type) => quote_type,
      None if policy.is_some() => RENEWAL.to_string(),
      None => NEW_BUSINESS.to_string(),
    };
    let product_alias = match resolve_optional(&self.product_alias, ctx).await? {
      Some(product_alias) => Some(product_alias),
      None => automation.product_alias.clone(),
    };
    let request = CreateQuoteRequest {
      tenant_alias: automation.tenant_alias.clone(),
      product_alias,
      environment: automation.environment.clone(),
      quote_type,
      policy: policy.map(|entity| entity.reference),
      customer: resolve_optional(&self.customer, ctx)
        .await?
        .map(|entity| entity.reference),
      form_data: resolve_optional(&self.form_data, ctx).await?,
    };
    let quote = self
      .quotes
      .create_quote(&request)
      .await
      .map_err(EngineError::raised)?;
    *details = ActionDetails::CreateQuote {
      quote_id: quote.get("id").and_then(Value::as_str).map(str::to_string),
      quote: Some(quote),
    };
    Ok(())
  }
}

/// Issue, approve, decline or renew a quote or policy.
pub struct EntityOperation {
  operation: QuoteOperation,
  entity: BoxProvider<Entity>,
  form_data: Option<BoxProvider<Value>>,
  quotes: Arc<dyn QuoteService>,
}

fn outcome(operation: QuoteOperation, outcome: EntityOperationOutcome) -> ActionDetails {
  match operation {
    QuoteOperation::IssuePolicy => ActionDetails::IssuePolicy(outcome),
    QuoteOperation::ApproveQuote => ActionDetails::ApproveQuote(outcome),
    QuoteOperation::DeclineQuote => ActionDetails::DeclineQuote(outcome),
    QuoteOperation::RenewPolicy => ActionDetails::RenewPolicy(outcome),
  }
}

/// Without an explicit entity, renewals act on the context policy and the
/// other operations on the context quote.
pub(super) fn operation(
  model: &EntityOperationActionModel,
  operation: QuoteOperation,
  deps: &Dependencies,
) -> Result<EntityOperation, ConfigError> {
  let entity = match &model.entity {
    Some(entity) => entity.build(deps)?,
    None => {
      let name = match operation {
        QuoteOperation::RenewPolicy => "policy",
        _ => "quote",
      };
      EntityProviderModel::ContextEntity(name.to_string()).build(deps)?
    }
  };
  Ok(EntityOperation {
    operation,
    entity,
    form_data: model.form_data.build(deps)?,
    quotes: deps.quotes.clone(),
  })
}

#[async_trait]
impl Perform for EntityOperation {
  fn initial_details(&self) -> ActionDetails {
    outcome(self.operation, EntityOperationOutcome::default())
  }

  async fn perform(
    &self,
    ctx: &ProviderContext<'_>,
    details: &mut ActionDetails,
  ) -> Result<(), EngineError> {
    let entity = self.entity.require(ctx, "entity").await?;
    let form_data = resolve_optional(&self.form_data, ctx).await?;
    *details = outcome(
      self.operation,
      EntityOperationOutcome {
        entity_id: Some(entity.reference.entity_id.clone()),
        result: None,
      },
    );
    let result = self
      .quotes
      .perform(self.operation, &entity.reference, form_data.as_ref())
      .await
      .map_err(EngineError::raised)?;
    *details = outcome(
      self.operation,
      EntityOperationOutcome {
        entity_id: Some(entity.reference.entity_id),
        result: Some(result),
      },
    );
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use policyflow_config::ActionModel;
  use serde_json::json;

  use super::super::testing::perform;
  use crate::build::{Build, Dependencies};
  use crate::data::{ActionDetails, EntityOperationOutcome};
  use crate::provider;
  use crate::services::InMemoryEntityStore;

  #[tokio::test]
  async fn test_create_renewal_quote() {
    let store = InMemoryEntityStore::new();
    store.insert("policy", json!({"id": "p-1"}));
    let deps = Dependencies::in_memory().with_entity_store(store.clone());
    let model: ActionModel = serde_json::from_value(json!({"createQuoteAction": {
      "name": "Renew",
      "alias": "renew",
      "policy": {"dynamicEntity": {"entityType": "policy", "entityId": "p-1"}},
      "formData": {"staticObject": {"vehicle": "ute"}}
    }}))
    .unwrap();
    let (details, result) = perform(&model.build(&deps).unwrap(), &provider::testing::data()).await;
    result.unwrap();

    let ActionDetails::CreateQuote {
      quote_id: Some(quote_id),
      quote: Some(quote),
    } = details
    else {
      panic!("expected a created quote");
    };
    assert_eq!(quote["quoteType"], json!("renewal"));
    assert_eq!(quote["productAlias"], json!("motor"));
    assert_eq!(quote["policyId"], json!("p-1"));
    assert!(store.entity("quote", &quote_id).is_some());
  }

  #[tokio::test]
  async fn test_operation_defaults_to_context_quote() {
    let store = InMemoryEntityStore::new();
    store.insert("quote", json!({"id": "q-1", "state": "incomplete"}));
    let deps = Dependencies::in_memory().with_entity_store(store.clone());
    let model: ActionModel =
      serde_json::from_value(json!({"approveQuoteAction": {"name": "Approve", "alias": "approve"}}))
        .unwrap();
    let (details, result) = perform(&model.build(&deps).unwrap(), &provider::testing::data()).await;
    result.unwrap();
    let ActionDetails::ApproveQuote(EntityOperationOutcome {
      entity_id,
      result: Some(updated),
    }) = details
    else {
      panic!("expected an approval outcome");
    };
    assert_eq!(entity_id.as_deref(), Some("q-1"));
    assert_eq!(updated["state"], json!("approved"));
  }

  #[tokio::test]
  async fn test_renewal_without_context_policy_fails() {
    let model: ActionModel =
      serde_json::from_value(json!({"renewPolicyAction": {"name": "Renew", "alias": "renew"}}))
        .unwrap();
    let action = model.build(&Dependencies::in_memory()).unwrap();
    let (_, result) = perform(&action, &provider::testing::data()).await;
    assert_eq!(
      result.unwrap_err().to_error().code,
      "automation.provider.value.missing"
    );
  }
}
