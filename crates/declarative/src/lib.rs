//! # Declarative
//!
//! Declarative resource graphs: compose values that only exist after
//! provisioning, declare resources against them, and realize everything in
//! dependency order.
//!
//! ## Core Concepts
//!
//! - **Deferred**: a single-assignment cell that composes before it settles
//! - **Stack**: one deployment; derives names and collects descriptors
//! - **ResourceDescriptor**: a declared resource with deferred parameters
//! - **ExecutionPlan**: descriptors grouped into dependency waves
//! - **Executor**: realizes waves in parallel through a [`Provider`]
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{ExecuteOptions, Stack, execute_simple};
//! use naming::{NamingContext, ResourceKind};
//!
//! let stack = Stack::new(NamingContext::new("acme", "eastus", "dev", "web")?);
//! let rg = stack.descriptor(ResourceKind::ResourceGroup).declare()?;
//! let sa = stack
//!     .descriptor(ResourceKind::StorageAccount)
//!     .param("resource_group", rg.name_output())
//!     .declare()?;
//! stack.export("connectionString", &sa.output_string("connection_string"));
//!
//! let report = execute_simple(&stack, &my_provider, &ExecuteOptions::default())?;
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`Provider`]: Creates (or previews) resources
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on a
//! particular cloud SDK or UI framework.

pub mod context;
pub mod deferred;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod fanout;
pub mod planner;
pub mod report;
pub mod stack;
pub mod types;

// Re-export main types at crate root
pub use context::{
    AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback, Provider, Realized,
};
pub use deferred::{CellId, CellState, Completer, Deferred, Presence, Provisional, all, combine};
pub use descriptor::{
    DescriptorBuilder, DescriptorId, Input, IntoInput, Outputs, Resource, ResolvedDescriptor,
    ResourceDescriptor,
};
pub use error::{BackendError, BackendErrorCategory, ConstructionError, ResolutionError};
pub use executor::{deploy, execute, execute_simple};
pub use fanout::split_tokens;
pub use planner::{ExecutionPlan, filter_by_target};
pub use report::{DeploymentReport, FailureContext, NEVER_RESOLVED, ResourceOutcome};
pub use stack::Stack;
pub use types::{ApplyResult, Change, ExecuteOptions, ExecuteSummary};
