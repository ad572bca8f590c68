//! Execution engine - realizes descriptors wave by wave
//!
//! The executor repeatedly plans whatever is declared but not yet settled,
//! dispatches the first wave to the backend in parallel and settles each
//! descriptor's output cells with the result. Settling runs continuations,
//! which may declare more descriptors (fan-out); those are picked up by the
//! next planning round.

use crate::context::{ConfirmCallback, NoProgress, ProgressCallback, Provider, Realized};
use crate::deferred::Deferred;
use crate::descriptor::{DescriptorId, Input, Outputs, Resource};
use crate::error::ResolutionError;
use crate::planner::{ExecutionPlan, filter_by_target};
use crate::report::{DeploymentReport, FailureContext, NEVER_RESOLVED, ResourceOutcome};
use crate::stack::Stack;
use crate::types::{ApplyResult, ExecuteOptions};
use anyhow::{Context, Result};
use naming::NamingContext;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Realize every descriptor declared on `stack`.
///
/// With `opts.dry_run` the backend is only asked for a preview and
/// placeholders are accepted as inputs. Descriptors whose dependencies
/// failed are never sent to the backend; their outputs fail with the
/// upstream cause. A dependency cycle aborts the run.
pub fn execute<P, G>(
    stack: &Stack,
    provider: &P,
    opts: &ExecuteOptions,
    progress: &mut G,
) -> Result<DeploymentReport>
where
    P: Provider + ?Sized,
    G: ProgressCallback,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

    let mut settled: BTreeMap<DescriptorId, (ApplyResult, Outputs)> = BTreeMap::new();
    let mut report = DeploymentReport {
        preview: opts.dry_run,
        ..Default::default()
    };

    loop {
        let pending: Vec<Resource> = filter_by_target(&stack.resources(), opts.target.as_deref())
            .into_iter()
            .filter(|r| !settled.contains_key(&r.id()))
            .collect();
        if pending.is_empty() {
            break;
        }

        if opts.fail_fast && report.failure.is_some() {
            for resource in &pending {
                let error = ResolutionError::Cancelled {
                    name: resource.name().to_string(),
                };
                let result = skip(resource, error);
                progress.on_resource_complete(resource.kind(), resource.name(), &result);
                settled.insert(resource.id(), (result, Outputs::new()));
            }
            continue;
        }

        if let Some((resource, cause)) = blocked(&pending, stack) {
            log::debug!("skipping '{}': {}", resource.name(), cause);
            let result = skip(&resource, cause);
            progress.on_resource_complete(resource.kind(), resource.name(), &result);
            settled.insert(resource.id(), (result, Outputs::new()));
            continue;
        }

        let plan = ExecutionPlan::from_descriptors(&pending)
            .context("Failed to order resources")?;
        let wave = plan.first_wave();

        log::info!(
            "{} wave of {} resource(s), {} pending",
            if opts.dry_run { "previewing" } else { "applying" },
            wave.len(),
            plan.total_resources()
        );
        progress.on_wave_start(wave.len(), opts.dry_run);
        for resource in wave {
            progress.on_resource_start(resource.kind(), resource.name());
        }

        let results: Vec<(ApplyResult, Outputs, Option<ResolutionError>)> = pool.install(|| {
            wave.par_iter()
                .map(|resource| realize(resource, provider, opts.dry_run))
                .collect()
        });

        for (resource, (result, outputs, error)) in wave.iter().zip(results) {
            progress.on_resource_complete(resource.kind(), resource.name(), &result);
            if let Some(error) = error
                && report.failure.is_none()
            {
                log::warn!("first failure: {error}");
                report.failure = Some(FailureContext {
                    kind: resource.kind(),
                    name: resource.name().to_string(),
                    cause: error.to_string(),
                });
            }
            settled.insert(resource.id(), (result, outputs));
        }
        progress.on_wave_complete();
    }

    for resource in stack.resources() {
        if let Some((result, outputs)) = settled.remove(&resource.id()) {
            report.summary.add_result(&result);
            report.resources.push(ResourceOutcome {
                id: resource.id(),
                kind: resource.kind(),
                name: resource.name().to_string(),
                result,
                outputs,
            });
        }
    }

    for (name, cell) in stack.exports() {
        match cell.try_get() {
            Some(Ok(Input::Value(value))) => {
                report.outputs.insert(name, value);
            }
            Some(Ok(Input::Placeholder(value))) if opts.dry_run => {
                report
                    .outputs
                    .insert(name, serde_json::json!({ "placeholder": value }));
            }
            Some(Ok(Input::Placeholder(_))) => {
                log::warn!("output '{name}' only has a preview placeholder");
                report
                    .unresolved_outputs
                    .insert(name, "preview placeholder, never assigned".to_string());
            }
            Some(Err(error)) => {
                report.unresolved_outputs.insert(name, error.to_string());
            }
            None => {
                report
                    .unresolved_outputs
                    .insert(name, NEVER_RESOLVED.to_string());
            }
        }
    }

    Ok(report)
}

/// The first pending descriptor that can no longer succeed, with the cause
/// to propagate.
///
/// Either a dependency settled as failed, or a parameter failed on its own
/// (a conversion or fan-out error, for example).
fn blocked(pending: &[Resource], stack: &Stack) -> Option<(Resource, ResolutionError)> {
    pending.iter().find_map(|resource| {
        let upstream = resource
            .depends_on()
            .into_iter()
            .filter_map(|id| stack.get(id))
            .find_map(|dep| dep.realized().error());
        let cause = upstream.or_else(|| {
            resource
                .parameters()
                .values()
                .find_map(Deferred::error)
        })?;
        Some((Resource::clone(resource), cause))
    })
}

fn skip(resource: &Resource, cause: ResolutionError) -> ApplyResult {
    let reason = cause.to_string();
    resource.complete(Err(cause));
    ApplyResult::Skipped { reason }
}

/// Send one descriptor to the backend and settle its outputs
fn realize<P>(
    resource: &Resource,
    provider: &P,
    preview: bool,
) -> (ApplyResult, Outputs, Option<ResolutionError>)
where
    P: Provider + ?Sized,
{
    let outcome = resource.resolve(preview).and_then(|resolved| {
        let realized = if preview {
            provider.preview(&resolved)
        } else {
            provider.create(&resolved)
        };
        realized.map_err(|error| ResolutionError::Backend {
            kind: resource.kind(),
            name: resource.name().to_string(),
            error,
        })
    });

    match outcome {
        Ok(Realized { change, outputs }) => {
            log::debug!("{} '{}': {:?}", resource.kind(), resource.name(), change);
            resource.complete(Ok(outputs.clone()));
            (change.into(), outputs, None)
        }
        Err(error) => {
            let result = ApplyResult::Failed {
                error: error.to_string(),
            };
            resource.complete(Err(error.clone()));
            (result, Outputs::new(), Some(error))
        }
    }
}

/// Preview a deployment, confirm, then apply it.
///
/// `build` declares the deployment; it runs once against a preview stack
/// and again against a fresh stack for the real apply, so both runs derive
/// identical names. Returns the preview report when `opts.dry_run` is set
/// or the user declines.
pub fn deploy<B, P, G, C>(
    naming: &NamingContext,
    build: B,
    provider: &P,
    opts: &ExecuteOptions,
    progress: &mut G,
    confirm: &mut C,
) -> Result<DeploymentReport>
where
    B: Fn(&Stack) -> Result<()>,
    P: Provider + ?Sized,
    G: ProgressCallback,
    C: ConfirmCallback,
{
    let preview_stack = Stack::new(naming.clone());
    build(&preview_stack).context("Failed to declare deployment")?;
    let preview_opts = ExecuteOptions {
        dry_run: true,
        ..opts.clone()
    };
    let preview = execute(&preview_stack, provider, &preview_opts, progress)?;

    if opts.dry_run {
        return Ok(preview);
    }

    let prompt = format!(
        "Apply {} change(s) to {} resource(s)?",
        preview.summary.total_changes(),
        preview.summary.total()
    );
    if !confirm.confirm(&prompt)? {
        log::info!("apply declined");
        return Ok(preview);
    }

    let stack = Stack::new(naming.clone());
    build(&stack).context("Failed to declare deployment")?;
    execute(&stack, provider, opts, progress)
}

/// Simple execution without callbacks
pub fn execute_simple<P>(stack: &Stack, provider: &P, opts: &ExecuteOptions) -> Result<DeploymentReport>
where
    P: Provider + ?Sized,
{
    execute(stack, provider, opts, &mut NoProgress)
}
