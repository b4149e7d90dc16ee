//! Research pipeline orchestration.
//!
//! - [`JobDispatcher`] validates submissions and schedules one execution
//!   per job through an [`ExecutionScheduler`].
//! - [`StepExecutor`] runs the five steps, persisting every transition.
//! - [`StatusReporter`] derives polling snapshots from the store.
//! - [`reconcile`] fails jobs whose execution died mid-run.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod reconcile;
pub mod scheduler;
pub mod service;
pub mod status;
pub mod steps;

pub use config::{ExecutionMode, PipelineConfig, StepRetryPolicy};
pub use dispatcher::JobDispatcher;
pub use error::{ExecutionError, StepError};
pub use executor::{RunOutcome, StepExecutor};
pub use scheduler::{ExecutionScheduler, InlineScheduler, QueueScheduler};
pub use service::ResearchService;
pub use status::StatusReporter;
