//! Turning inert configuration models into runnable automations.

use std::sync::Arc;

use policyflow_config::ConfigError;
use policyflow_jobs::{InMemoryJobStore, JobQueue};

use crate::runner::ActionRunner;
use crate::services::{
  EmailSender, EntityRepository, EventPublisher, HttpSender, InMemoryEntityStore,
  LoggingEmailSender, LoggingEventPublisher, LoggingSmsSender, QuoteService, ReqwestHttpSender,
  SmsSender,
};

pub const DEFAULT_QUEUE: &str = "automations";

/// Build a runtime object from its configuration model.
pub trait Build {
  type Output;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError>;
}

impl<M: Build> Build for Box<M> {
  type Output = M::Output;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    (**self).build(deps)
  }
}

impl<M: Build> Build for Option<M> {
  type Output = Option<M::Output>;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    self.as_ref().map(|model| model.build(deps)).transpose()
  }
}

impl<M: Build> Build for Vec<M> {
  type Output = Vec<M::Output>;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    self.iter().map(|model| model.build(deps)).collect()
  }
}

/// Collaborators handed to every built action.
#[derive(Clone)]
pub struct Dependencies {
  pub email: Arc<dyn EmailSender>,
  pub sms: Arc<dyn SmsSender>,
  pub http: Arc<dyn HttpSender>,
  pub events: Arc<dyn EventPublisher>,
  pub entities: Arc<dyn EntityRepository>,
  pub quotes: Arc<dyn QuoteService>,
  pub runner: Arc<ActionRunner>,
}

impl Dependencies {
  /// Default collaborators around the given job queue.
  pub fn new(jobs: Arc<dyn JobQueue>, queue: impl Into<String>) -> Self {
    let store = InMemoryEntityStore::new();
    Self {
      email: Arc::new(LoggingEmailSender),
      sms: Arc::new(LoggingSmsSender),
      http: Arc::new(ReqwestHttpSender::new()),
      events: Arc::new(LoggingEventPublisher),
      entities: Arc::new(store.clone()),
      quotes: Arc::new(store),
      runner: Arc::new(ActionRunner::new(jobs, queue)),
    }
  }

  /// Everything in process, including the job queue.
  pub fn in_memory() -> Self {
    Self::new(Arc::new(InMemoryJobStore::new()), DEFAULT_QUEUE)
  }

  pub fn with_email(mut self, email: Arc<dyn EmailSender>) -> Self {
    self.email = email;
    self
  }

  pub fn with_sms(mut self, sms: Arc<dyn SmsSender>) -> Self {
    self.sms = sms;
    self
  }

  pub fn with_http(mut self, http: Arc<dyn HttpSender>) -> Self {
    self.http = http;
    self
  }

  pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
    self.events = events;
    self
  }

  /// Use one store for both entity lookups and quote operations.
  pub fn with_entity_store<S>(mut self, store: S) -> Self
  where
    S: EntityRepository + QuoteService + Clone + 'static,
  {
    self.entities = Arc::new(store.clone());
    self.quotes = Arc::new(store);
    self
  }
}
