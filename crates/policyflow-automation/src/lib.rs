//! Automation execution engine for Policyflow.
//!
//! Configuration models from `policyflow-config` are built into a runnable
//! graph and executed against a mutable [`AutomationData`] context.
//!
//! # Architecture
//!
//! ```text
//! AutomationsConfiguration
//! ├── build(model, deps) - validate, then build every automation
//! ├── matching_automations(data) / best_http_match(data)
//! └── periodic_triggers()
//!
//! Automation
//! ├── execute(data, trigger, cancel) - trigger, conditions, actions, response
//! └── continue_action(data, alias, parent, cancel) - re-entry from the job queue
//!
//! ActionRunner
//! └── handle_action(data, action, path, cancel, is_internal)
//!     run condition, leaf/group/iterate execution, on-error actions,
//!     or enqueue when asynchronous
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use policyflow_automation::{AutomationsConfiguration, Dependencies};
//!
//! let deps = Dependencies::new(job_store, "automations");
//! let config = AutomationsConfiguration::build(&model, &deps)?;
//! if let Some(automation) = config.automation("renewalReminder") {
//!     automation.execute(&mut data, None, &cancel).await?;
//! }
//! ```

pub mod action;
mod automation;
mod build;
mod configuration;
pub mod data;
mod error;
pub mod path;
pub mod provider;
mod runner;
pub mod services;
pub mod trigger;

pub use automation::Automation;
pub use build::{Build, DEFAULT_QUEUE, Dependencies};
pub use configuration::AutomationsConfiguration;
pub use data::{AutomationData, AutomationInfo, TriggerData};
pub use error::EngineError;
pub use runner::ActionRunner;
