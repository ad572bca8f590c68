//! Provider and callback traits
//!
//! These traits keep the core independent of any particular provisioning
//! backend, progress display or prompt implementation.

use crate::descriptor::{Outputs, ResolvedDescriptor};
use crate::error::BackendError;
use crate::types::{ApplyResult, Change};
use anyhow::Result;
use naming::ResourceKind;
use serde_json::Value;

/// What a backend reports for a realized descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct Realized {
    pub change: Change,
    /// Backend-assigned fields (endpoints, generated identifiers, ...)
    pub outputs: Outputs,
}

impl Realized {
    pub fn new(change: Change) -> Self {
        Self {
            change,
            outputs: Outputs::new(),
        }
    }

    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }
}

/// A provisioning backend.
///
/// Receives descriptors in dependency order, possibly from several threads
/// at once. Retries, if any, are the backend's business.
pub trait Provider: Send + Sync {
    /// Create or update the resource and report what was assigned
    fn create(&self, descriptor: &ResolvedDescriptor) -> Result<Realized, BackendError>;

    /// Report what `create` would do without changing anything
    ///
    /// Fields the backend only assigns on creation should be left out (they
    /// resolve to `null`). The default reports a creation that only knows
    /// the name.
    fn preview(&self, descriptor: &ResolvedDescriptor) -> Result<Realized, BackendError> {
        Ok(Realized::new(Change::Created).with_output("name", descriptor.name.clone()))
    }
}

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called when a wave of independent descriptors is dispatched
    fn on_wave_start(&mut self, count: usize, preview: bool);

    /// Called before a descriptor is sent to the backend
    fn on_resource_start(&mut self, kind: ResourceKind, name: &str);

    /// Called when a descriptor is settled (realized, failed or skipped)
    fn on_resource_complete(&mut self, kind: ResourceKind, name: &str, result: &ApplyResult);

    /// Called when a wave completes
    fn on_wave_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_wave_start(&mut self, _count: usize, _preview: bool) {}
    fn on_resource_start(&mut self, _kind: ResourceKind, _name: &str) {}
    fn on_resource_complete(&mut self, _kind: ResourceKind, _name: &str, _result: &ApplyResult) {}
    fn on_wave_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}
