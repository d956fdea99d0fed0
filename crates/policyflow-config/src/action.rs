use std::sync::LazyLock;

use serde::Deserialize;

use crate::provider::{
  ConditionProviderModel, EntityProviderModel, FileProviderModel, IntegerProviderModel,
  ListProviderModel, ObjectProviderModel, TextProviderModel,
};
use crate::registry::{TypeMap, discriminated, variant};

/// Fields every action carries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCommon {
  pub name: String,
  pub alias: String,
  #[serde(default)]
  pub description: Option<String>,
  /// Run on the job queue instead of inline.
  #[serde(default)]
  pub asynchronous: bool,
  #[serde(default)]
  pub run_condition: Option<ConditionProviderModel>,
  #[serde(default)]
  pub on_error_actions: Vec<ActionModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailActionModel {
  #[serde(flatten)]
  pub common: ActionCommon,
  pub to: TextProviderModel,
  #[serde(default)]
  pub from: Option<TextProviderModel>,
  #[serde(default)]
  pub cc: Vec<TextProviderModel>,
  pub subject: TextProviderModel,
  #[serde(default)]
  pub text_body: Option<TextProviderModel>,
  #[serde(default)]
  pub html_body: Option<TextProviderModel>,
  #[serde(default)]
  pub attachments: Vec<FileProviderModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsActionModel {
  #[serde(flatten)]
  pub common: ActionCommon,
  pub to: TextProviderModel,
  #[serde(default)]
  pub from: Option<TextProviderModel>,
  pub message: TextProviderModel,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpHeaderModel {
  pub name: TextProviderModel,
  pub value: TextProviderModel,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestModel {
  pub url: TextProviderModel,
  #[serde(default)]
  pub http_verb: Option<TextProviderModel>,
  #[serde(default)]
  pub headers: Vec<HttpHeaderModel>,
  #[serde(default)]
  pub content_type: Option<TextProviderModel>,
  #[serde(default)]
  pub content: Option<ObjectProviderModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestActionModel {
  #[serde(flatten)]
  pub common: ActionCommon,
  pub http_request: HttpRequestModel,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaiseEventActionModel {
  #[serde(flatten)]
  pub common: ActionCommon,
  pub custom_event_alias: TextProviderModel,
  #[serde(default)]
  pub event_data: Option<ObjectProviderModel>,
  #[serde(default)]
  pub event_tags: Vec<TextProviderModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorProviderModel {
  pub code: TextProviderModel,
  pub title: TextProviderModel,
  pub message: TextProviderModel,
  #[serde(default)]
  pub http_status_code: Option<IntegerProviderModel>,
  #[serde(default)]
  pub additional_details: Vec<TextProviderModel>,
  #[serde(default)]
  pub data: Option<ObjectProviderModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaiseErrorActionModel {
  #[serde(flatten)]
  pub common: ActionCommon,
  pub error: ErrorProviderModel,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAdditionalPropertyValueActionModel {
  #[serde(flatten)]
  pub common: ActionCommon,
  pub entity: EntityProviderModel,
  pub property_alias: TextProviderModel,
  pub value: TextProviderModel,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementAdditionalPropertyValueActionModel {
  #[serde(flatten)]
  pub common: ActionCommon,
  pub entity: EntityProviderModel,
  pub property_alias: TextProviderModel,
  /// Defaults to one.
  #[serde(default)]
  pub increment: Option<IntegerProviderModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuoteActionModel {
  #[serde(flatten)]
  pub common: ActionCommon,
  #[serde(default)]
  pub product_alias: Option<TextProviderModel>,
  /// `newBusiness` unless a policy is given, then `renewal`.
  #[serde(default)]
  pub quote_type: Option<TextProviderModel>,
  #[serde(default)]
  pub policy: Option<EntityProviderModel>,
  #[serde(default)]
  pub customer: Option<EntityProviderModel>,
  #[serde(default)]
  pub form_data: Option<ObjectProviderModel>,
}

/// Body of the quote and policy lifecycle actions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityOperationActionModel {
  #[serde(flatten)]
  pub common: ActionCommon,
  /// Target quote or policy; the context quote/policy when absent.
  #[serde(default, alias = "quote", alias = "policy")]
  pub entity: Option<EntityProviderModel>,
  #[serde(default)]
  pub form_data: Option<ObjectProviderModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachFilesToEntityActionModel {
  #[serde(flatten)]
  pub common: ActionCommon,
  #[serde(alias = "entity")]
  pub entities: Vec<EntityProviderModel>,
  pub attachments: Vec<FileProviderModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupActionModel {
  #[serde(flatten)]
  pub common: ActionCommon,
  pub actions: Vec<ActionModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterateActionModel {
  #[serde(flatten)]
  pub common: ActionCommon,
  pub list: ListProviderModel,
  /// Items for which this resolves false are skipped.
  #[serde(default)]
  pub condition: Option<ConditionProviderModel>,
  #[serde(default)]
  pub start_index: Option<IntegerProviderModel>,
  #[serde(default)]
  pub max_iterations: Option<IntegerProviderModel>,
  #[serde(default)]
  pub reverse: bool,
  pub actions: Vec<ActionModel>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionModel {
  SendEmail(SendEmailActionModel),
  SendSms(SendSmsActionModel),
  HttpRequest(HttpRequestActionModel),
  RaiseEvent(RaiseEventActionModel),
  RaiseError(RaiseErrorActionModel),
  SetAdditionalPropertyValue(SetAdditionalPropertyValueActionModel),
  IncrementAdditionalPropertyValue(IncrementAdditionalPropertyValueActionModel),
  CreateQuote(CreateQuoteActionModel),
  IssuePolicy(EntityOperationActionModel),
  ApproveQuote(EntityOperationActionModel),
  DeclineQuote(EntityOperationActionModel),
  RenewPolicy(EntityOperationActionModel),
  AttachFilesToEntity(AttachFilesToEntityActionModel),
  Group(GroupActionModel),
  Iterate(IterateActionModel),
}

impl ActionModel {
  pub fn common(&self) -> &ActionCommon {
    match self {
      Self::SendEmail(a) => &a.common,
      Self::SendSms(a) => &a.common,
      Self::HttpRequest(a) => &a.common,
      Self::RaiseEvent(a) => &a.common,
      Self::RaiseError(a) => &a.common,
      Self::SetAdditionalPropertyValue(a) => &a.common,
      Self::IncrementAdditionalPropertyValue(a) => &a.common,
      Self::CreateQuote(a) => &a.common,
      Self::IssuePolicy(a) | Self::ApproveQuote(a) | Self::DeclineQuote(a) | Self::RenewPolicy(a) => {
        &a.common
      }
      Self::AttachFilesToEntity(a) => &a.common,
      Self::Group(a) => &a.common,
      Self::Iterate(a) => &a.common,
    }
  }

  pub fn alias(&self) -> &str {
    &self.common().alias
  }

  /// Child actions of the composite kinds.
  pub fn child_actions(&self) -> Option<&[ActionModel]> {
    match self {
      Self::Group(a) => Some(&a.actions),
      Self::Iterate(a) => Some(&a.actions),
      _ => None,
    }
  }

  pub fn on_error_actions(&self) -> &[ActionModel] {
    &self.common().on_error_actions
  }
}

pub static ACTIONS: LazyLock<TypeMap<ActionModel>> = LazyLock::new(|| {
  TypeMap::new("action")
    .register("sendEmailAction", variant!(ActionModel::SendEmail))
    .register("sendSmsAction", variant!(ActionModel::SendSms))
    .register("httpRequestAction", variant!(ActionModel::HttpRequest))
    .register("raiseEventAction", variant!(ActionModel::RaiseEvent))
    .register("raiseErrorAction", variant!(ActionModel::RaiseError))
    .register(
      "setAdditionalPropertyValueAction",
      variant!(ActionModel::SetAdditionalPropertyValue),
    )
    .register(
      "incrementAdditionalPropertyValueAction",
      variant!(ActionModel::IncrementAdditionalPropertyValue),
    )
    .register("createQuoteAction", variant!(ActionModel::CreateQuote))
    .register("issuePolicyAction", variant!(ActionModel::IssuePolicy))
    .register("approveQuoteAction", variant!(ActionModel::ApproveQuote))
    .register("declineQuoteAction", variant!(ActionModel::DeclineQuote))
    .register("renewPolicyAction", variant!(ActionModel::RenewPolicy))
    .register("attachFilesToEntityAction", variant!(ActionModel::AttachFilesToEntity))
    .register("attachFilesToEntitiesAction", variant!(ActionModel::AttachFilesToEntity))
    .register("groupAction", variant!(ActionModel::Group))
    .register("iterateAction", variant!(ActionModel::Iterate))
});

discriminated!(ActionModel, ACTIONS);
