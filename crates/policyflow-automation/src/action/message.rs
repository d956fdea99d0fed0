use std::sync::Arc;

use async_trait::async_trait;
use policyflow_config::ConfigError;
use policyflow_config::action::{SendEmailActionModel, SendSmsActionModel};

use super::Perform;
use crate::build::{Build, Dependencies};
use crate::data::ActionDetails;
use crate::error::EngineError;
use crate::provider::{BoxProvider, ProviderContext, resolve_optional};
use crate::services::{EmailMessage, EmailSender, FileAttachment, SmsMessage, SmsSender};

pub struct SendEmail {
  to: BoxProvider<String>,
  from: Option<BoxProvider<String>>,
  cc: Vec<BoxProvider<String>>,
  subject: BoxProvider<String>,
  text_body: Option<BoxProvider<String>>,
  html_body: Option<BoxProvider<String>>,
  attachments: Vec<BoxProvider<FileAttachment>>,
  sender: Arc<dyn EmailSender>,
}

impl Build for SendEmailActionModel {
  type Output = SendEmail;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(SendEmail {
      to: self.to.build(deps)?,
      from: self.from.build(deps)?,
      cc: self.cc.build(deps)?,
      subject: self.subject.build(deps)?,
      text_body: self.text_body.build(deps)?,
      html_body: self.html_body.build(deps)?,
      attachments: self.attachments.build(deps)?,
      sender: deps.email.clone(),
    })
  }
}

impl SendEmail {
  async fn message(&self, ctx: &ProviderContext<'_>) -> Result<EmailMessage, EngineError> {
    let mut cc = Vec::with_capacity(self.cc.len());
    for address in &self.cc {
      cc.extend(address.resolve(ctx).await?);
    }
    let mut attachments = Vec::with_capacity(self.attachments.len());
    for file in &self.attachments {
      attachments.extend(file.resolve(ctx).await?);
    }
    let text_body = resolve_optional(&self.text_body, ctx).await?;
    let html_body = resolve_optional(&self.html_body, ctx).await?;
    if text_body.is_none() && html_body.is_none() {
      return Err(EngineError::missing_value("textBody"));
    }
    Ok(EmailMessage {
      to: self.to.require(ctx, "to").await?,
      from: resolve_optional(&self.from, ctx).await?,
      cc,
      subject: self.subject.require(ctx, "subject").await?,
      text_body,
      html_body,
      attachments,
    })
  }
}

#[async_trait]
impl Perform for SendEmail {
  fn initial_details(&self) -> ActionDetails {
    ActionDetails::SendEmail { email: None }
  }

  async fn perform(
    &self,
    ctx: &ProviderContext<'_>,
    details: &mut ActionDetails,
  ) -> Result<(), EngineError> {
    let email = self.message(ctx).await?;
    let mut recorded = serde_json::to_value(&email)?;
    if let Some(map) = recorded.as_object_mut() {
      let names: Vec<_> = email.attachments.iter().map(|f| f.file_name.clone()).collect();
      map.insert("attachments".to_string(), names.into());
    }
    *details = ActionDetails::SendEmail {
      email: Some(recorded),
    };
    self.sender.send(&email).await.map_err(EngineError::raised)
  }
}

pub struct SendSms {
  to: BoxProvider<String>,
  from: Option<BoxProvider<String>>,
  message: BoxProvider<String>,
  sender: Arc<dyn SmsSender>,
}

impl Build for SendSmsActionModel {
  type Output = SendSms;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(SendSms {
      to: self.to.build(deps)?,
      from: self.from.build(deps)?,
      message: self.message.build(deps)?,
      sender: deps.sms.clone(),
    })
  }
}

#[async_trait]
impl Perform for SendSms {
  fn initial_details(&self) -> ActionDetails {
    ActionDetails::SendSms { sms: None }
  }

  async fn perform(
    &self,
    ctx: &ProviderContext<'_>,
    details: &mut ActionDetails,
  ) -> Result<(), EngineError> {
    let sms = SmsMessage {
      to: self.to.require(ctx, "to").await?,
      from: resolve_optional(&self.from, ctx).await?,
      message: self.message.require(ctx, "message").await?,
    };
    *details = ActionDetails::SendSms {
      sms: Some(serde_json::to_value(&sms)?),
    };
    self.sender.send(&sms).await.map_err(EngineError::raised)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use policyflow_config::ActionModel;
  use serde_json::json;

  use super::super::testing::{Recorder, perform};
  use crate::build::{Build, Dependencies};
  use crate::data::ActionDetails;
  use crate::provider;
  use crate::services::{EmailMessage, SmsMessage};

  #[tokio::test]
  async fn test_email_records_message_and_sends() {
    let recorder = Arc::new(Recorder::<EmailMessage>::default());
    let deps = Dependencies::in_memory().with_email(recorder.clone());
    let model: ActionModel = serde_json::from_value(json!({"sendEmailAction": {
      "name": "Welcome",
      "alias": "welcome",
      "to": "ann@example.test",
      "cc": ["broker@example.test", {"objectPathLookupTextOrEmpty": "/context/quote/missing"}],
      "subject": {"templateText": {"template": "Quote {{ context.quote.quoteNumber }}"}},
      "textBody": "Thanks",
      "attachments": [{"textFile": {"outputFileName": "terms.txt", "sourceData": "terms"}}]
    }}))
    .unwrap();
    let action = model.build(&deps).unwrap();

    let (details, result) = perform(&action, &provider::testing::data()).await;
    result.unwrap();
    let ActionDetails::SendEmail { email: Some(email) } = details else {
      panic!("expected email details");
    };
    assert_eq!(email["subject"], json!("Quote Q-0001"));
    assert_eq!(email["attachments"], json!(["terms.txt"]));

    let sent = recorder.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].cc, vec!["broker@example.test".to_string(), String::new()]);
    assert_eq!(sent[0].attachments[0].content, b"terms");
  }

  #[tokio::test]
  async fn test_email_needs_a_body() {
    let model: ActionModel = serde_json::from_value(json!({"sendEmailAction": {
      "name": "Empty", "alias": "empty", "to": "a@example.test", "subject": "s"
    }}))
    .unwrap();
    let action = model.build(&Dependencies::in_memory()).unwrap();
    let (_, result) = perform(&action, &provider::testing::data()).await;
    assert_eq!(result.unwrap_err().to_error().code, "automation.provider.value.missing");
  }

  #[tokio::test]
  async fn test_sms() {
    let recorder = Arc::new(Recorder::<SmsMessage>::default());
    let deps = Dependencies::in_memory().with_sms(recorder.clone());
    let model: ActionModel = serde_json::from_value(json!({"sendSmsAction": {
      "name": "Text",
      "alias": "text",
      "to": "+61400000000",
      "message": {"concatenatedText": [
        "Quote ",
        {"objectPathLookupText": "/context/quote/quoteNumber"}
      ]}
    }}))
    .unwrap();
    let action = model.build(&deps).unwrap();
    let (details, result) = perform(&action, &provider::testing::data()).await;
    result.unwrap();
    assert_eq!(
      details,
      ActionDetails::SendSms {
        sms: Some(json!({"to": "+61400000000", "from": null, "message": "Quote Q-0001"}))
      }
    );
    assert_eq!(recorder.sent().len(), 1);
  }
}
