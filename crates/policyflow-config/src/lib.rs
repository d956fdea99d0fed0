//! Automation configuration models.
//!
//! An `automations.json` document deserializes into an
//! [`AutomationsConfigurationModel`]. Every trigger, action and provider
//! object is discriminated by its first property name through a per-category
//! [`registry::TypeMap`]; unknown keys surface as
//! [`ConfigError::InvalidConfiguration`] carrying the offending fragment.
//! The models are inert: building them into runnable automations is the job
//! of the engine crate.

pub mod action;
mod configuration;
mod error;
mod event;
pub mod provider;
pub mod registry;
pub mod trigger;
mod validator;

pub use action::{ACTIONS, ActionCommon, ActionModel};
pub use configuration::{AutomationModel, AutomationsConfigurationModel};
pub use error::{ConfigError, Error};
pub use event::{SystemEventType, UnknownEventType};
pub use trigger::{TRIGGERS, TriggerCommon, TriggerModel, route_shape};
pub use validator::{ValidationOptions, validate, validate_with};
