//! Runtime actions.
//!
//! An [`Action`] is either a leaf that performs one side effect through a
//! [`Perform`] implementation, or a composite (group, iterate) whose
//! children the [`ActionRunner`](crate::runner::ActionRunner) walks.

mod attach;
mod event;
mod http;
mod message;
mod property;
mod quote;

use async_trait::async_trait;
use policyflow_config::action::IterateActionModel;
use policyflow_config::{ActionModel, ConfigError};
use serde_json::Value;

use crate::build::{Build, Dependencies};
use crate::data::{ActionData, ActionDetails};
use crate::error::EngineError;
use crate::path::{ActionPath, Via};
use crate::provider::{BoxProvider, ProviderContext};
use crate::services::QuoteOperation;

/// The side effect of a leaf action.
#[async_trait]
pub trait Perform: Send + Sync {
  /// Details recorded before the action first runs.
  fn initial_details(&self) -> ActionDetails;

  /// Run the action, recording what it did into `details`. Whatever was
  /// recorded before a failure is kept.
  async fn perform(
    &self,
    ctx: &ProviderContext<'_>,
    details: &mut ActionDetails,
  ) -> Result<(), EngineError>;
}

pub struct Iterate {
  pub list: BoxProvider<Vec<Value>>,
  pub condition: Option<BoxProvider<bool>>,
  pub start_index: Option<BoxProvider<i64>>,
  pub max_iterations: Option<BoxProvider<i64>>,
  pub reverse: bool,
  pub actions: Vec<Action>,
}

pub enum ActionKind {
  Leaf(Box<dyn Perform>),
  Group(Vec<Action>),
  Iterate(Iterate),
}

pub struct Action {
  pub alias: String,
  pub name: String,
  pub description: Option<String>,
  pub asynchronous: bool,
  pub run_condition: Option<BoxProvider<bool>>,
  pub on_error_actions: Vec<Action>,
  pub kind: ActionKind,
}

impl Action {
  /// A fresh record for this action.
  pub fn new_data(&self) -> ActionData {
    let details = match &self.kind {
      ActionKind::Leaf(perform) => perform.initial_details(),
      ActionKind::Group(_) => ActionDetails::Group {
        child_actions: Default::default(),
      },
      ActionKind::Iterate(_) => ActionDetails::Iterate {
        current_iteration: None,
        iterations_completed: 0,
      },
    };
    ActionData::new(self.alias.clone(), self.name.clone(), details)
  }

  /// Children of the composite kinds, and how they hang off this action.
  pub fn child_actions(&self) -> Option<(&[Action], Via)> {
    match &self.kind {
      ActionKind::Group(actions) => Some((actions, Via::Child)),
      ActionKind::Iterate(iterate) => Some((&iterate.actions, Via::Iteration)),
      ActionKind::Leaf(_) => None,
    }
  }

  /// Depth-first search for `alias` below (and including) this action.
  fn find<'a>(&'a self, alias: &str, path: ActionPath) -> Option<(&'a Action, ActionPath)> {
    if self.alias == alias {
      return Some((self, path));
    }
    if let Some((children, via)) = self.child_actions() {
      for child in children {
        let found = child.find(alias, path.child(&child.alias, via));
        if found.is_some() {
          return found;
        }
      }
    }
    for handler in &self.on_error_actions {
      let found = handler.find(alias, path.child(&handler.alias, Via::OnError));
      if found.is_some() {
        return found;
      }
    }
    None
  }
}

/// Locate an action anywhere in `actions` by alias, with its path.
pub fn find_action<'a>(actions: &'a [Action], alias: &str) -> Option<(&'a Action, ActionPath)> {
  actions
    .iter()
    .find_map(|action| action.find(alias, ActionPath::top(&action.alias)))
}

impl Build for IterateActionModel {
  type Output = Iterate;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(Iterate {
      list: self.list.build(deps)?,
      condition: self.condition.build(deps)?,
      start_index: self.start_index.build(deps)?,
      max_iterations: self.max_iterations.build(deps)?,
      reverse: self.reverse,
      actions: self.actions.build(deps)?,
    })
  }
}

fn leaf(perform: impl Perform + 'static) -> ActionKind {
  ActionKind::Leaf(Box::new(perform))
}

impl Build for ActionModel {
  type Output = Action;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    let kind = match self {
      Self::SendEmail(model) => leaf(model.build(deps)?),
      Self::SendSms(model) => leaf(model.build(deps)?),
      Self::HttpRequest(model) => leaf(model.build(deps)?),
      Self::RaiseEvent(model) => leaf(model.build(deps)?),
      Self::RaiseError(model) => leaf(model.build(deps)?),
      Self::SetAdditionalPropertyValue(model) => leaf(model.build(deps)?),
      Self::IncrementAdditionalPropertyValue(model) => leaf(model.build(deps)?),
      Self::CreateQuote(model) => leaf(model.build(deps)?),
      Self::IssuePolicy(model) => {
        leaf(quote::operation(model, QuoteOperation::IssuePolicy, deps)?)
      }
      Self::ApproveQuote(model) => {
        leaf(quote::operation(model, QuoteOperation::ApproveQuote, deps)?)
      }
      Self::DeclineQuote(model) => {
        leaf(quote::operation(model, QuoteOperation::DeclineQuote, deps)?)
      }
      Self::RenewPolicy(model) => {
        leaf(quote::operation(model, QuoteOperation::RenewPolicy, deps)?)
      }
      Self::AttachFilesToEntity(model) => leaf(model.build(deps)?),
      Self::Group(model) => ActionKind::Group(model.actions.build(deps)?),
      Self::Iterate(model) => ActionKind::Iterate(model.build(deps)?),
    };
    let common = self.common();
    Ok(Action {
      alias: common.alias.clone(),
      name: common.name.clone(),
      description: common.description.clone(),
      asynchronous: common.asynchronous,
      run_condition: common.run_condition.build(deps)?,
      on_error_actions: common.on_error_actions.build(deps)?,
      kind,
    })
  }
}

#[cfg(test)]
pub(crate) mod testing {
  use std::sync::Mutex;

  use async_trait::async_trait;
  use policyflow_config::Error;
  use serde_json::Value;
  use tokio_util::sync::CancellationToken;

  use super::{Action, ActionKind};
  use crate::data::{ActionDetails, AutomationData};
  use crate::error::EngineError;
  use crate::path::ActionPath;
  use crate::provider::ProviderContext;
  use crate::services::{
    CustomEvent, EmailMessage, EmailSender, EventPublisher, HttpRequestMessage,
    HttpResponseMessage, HttpSender, SmsMessage, SmsSender,
  };

  /// Keeps whatever it is asked to send.
  pub struct Recorder<T>(pub Mutex<Vec<T>>);

  impl<T> Default for Recorder<T> {
    fn default() -> Self {
      Recorder(Mutex::new(Vec::new()))
    }
  }

  impl<T: Clone> Recorder<T> {
    pub fn sent(&self) -> Vec<T> {
      self.0.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl EmailSender for Recorder<EmailMessage> {
    async fn send(&self, email: &EmailMessage) -> Result<(), Error> {
      self.0.lock().unwrap().push(email.clone());
      Ok(())
    }
  }

  #[async_trait]
  impl SmsSender for Recorder<SmsMessage> {
    async fn send(&self, sms: &SmsMessage) -> Result<(), Error> {
      self.0.lock().unwrap().push(sms.clone());
      Ok(())
    }
  }

  #[async_trait]
  impl EventPublisher for Recorder<CustomEvent> {
    async fn publish(&self, event: &CustomEvent) -> Result<String, Error> {
      let mut events = self.0.lock().unwrap();
      events.push(event.clone());
      Ok(format!("evt-{}", events.len()))
    }
  }

  #[async_trait]
  impl HttpSender for Recorder<HttpRequestMessage> {
    async fn send(&self, request: &HttpRequestMessage) -> Result<HttpResponseMessage, Error> {
      self.0.lock().unwrap().push(request.clone());
      let http_status_code = if request.url.ends_with("/fail") { 500 } else { 200 };
      Ok(HttpResponseMessage {
        http_status_code,
        headers: Default::default(),
        content: serde_json::json!({"echo": request.content.clone().unwrap_or(Value::Null)}),
      })
    }
  }

  /// Run a leaf action once, outside the runner.
  pub async fn perform(
    action: &Action,
    data: &AutomationData,
  ) -> (ActionDetails, Result<(), EngineError>) {
    let ActionKind::Leaf(leaf) = &action.kind else {
      panic!("expected a leaf action");
    };
    let cancel = CancellationToken::new();
    let ctx = ProviderContext::new(data, &cancel).at(ActionPath::top(&action.alias).to_pointer());
    let mut details = leaf.initial_details();
    let result = leaf.perform(&ctx, &mut details).await;
    (details, result)
  }
}
