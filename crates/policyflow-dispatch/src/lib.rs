//! Policyflow Dispatch
//!
//! Connects the automation engine to the outside world:
//!
//! - [`FsConfigurationProvider`] loads and caches built configurations per
//!   tenant, product, environment and release.
//! - [`AutomationDispatcher`] starts runs from system events (one queued job
//!   per matching automation), inbound HTTP requests (best route across the
//!   configuration) and periodic ticks.
//! - [`PeriodicRegistrar`] keeps recurring job registrations in step with
//!   the periodic triggers of each deployment.
//! - [`AsynchronousActionHandler`] continues actions queued by the runner.
//! - [`JobWorker`] drains the queue and hands each job to the right service.

mod entry;
mod error;
mod handler;
mod periodic;
mod provider;
mod settings;
mod worker;

pub use entry::{AutomationDispatcher, HttpEntryRequest, SystemEvent};
pub use error::DispatchError;
pub use handler::AsynchronousActionHandler;
pub use periodic::{PeriodicRegistrar, REGISTRATION_LOCK, job_id_prefix};
pub use provider::{ConfigurationProvider, FsConfigurationProvider, ReleaseContext};
pub use settings::DispatchSettings;
pub use worker::{JobOutcome, JobWorker, WorkSummary};
