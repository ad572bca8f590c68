//! `preview` and `up`

use anyhow::{Result, bail};
use declarative::{AutoConfirm, ConfirmCallback, DeploymentReport, ExecuteOptions, NEVER_RESOLVED};

use crate::Context;
use crate::backend::{FailureRule, SimulatedBackend};
use crate::cli::{StackArgs, UpArgs};
use crate::progress::WaveProgress;
use crate::stacks;
use crate::ui::{self, PromptConfirm};

fn backend(args: &StackArgs) -> SimulatedBackend {
    args.failures
        .iter()
        .map(|raw| FailureRule::parse(raw))
        .fold(SimulatedBackend::new(), SimulatedBackend::with_failure)
}

fn options(args: &StackArgs, dry_run: bool, fail_fast: bool) -> ExecuteOptions {
    ExecuteOptions {
        dry_run,
        jobs: args.jobs.max(1),
        fail_fast,
        target: args.target.clone(),
    }
}

fn execute<C: ConfirmCallback>(
    ctx: &Context,
    args: &StackArgs,
    opts: &ExecuteOptions,
    confirm: &mut C,
) -> Result<DeploymentReport> {
    let (config, template) = super::load(ctx, args.template)?;
    if !ctx.quiet && !args.json {
        ui::info(&format!("Stack template: {template}"));
    }
    let provider = backend(args);
    // Bars would interleave with JSON on stdout
    let mut progress = WaveProgress::new(ctx.quiet || args.json);
    stacks::run(&config, template, &provider, opts, &mut progress, confirm)
}

fn finish(ctx: &Context, args: &StackArgs, report: &DeploymentReport) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else if !ctx.quiet {
        ui::print_report(report);
    }

    if let Some(failure) = &report.failure {
        bail!("Deployment failed at {failure}");
    }
    if report.summary.skipped > 0 {
        bail!("{} resource(s) did not complete", report.summary.skipped);
    }
    // A target leaves outputs of everything outside it pending
    let (outside, unresolved): (Vec<_>, Vec<_>) = report
        .unresolved_outputs
        .iter()
        .partition(|(_, reason)| args.target.is_some() && reason.as_str() == NEVER_RESOLVED);
    if !outside.is_empty() && !ctx.quiet && !args.json {
        let names: Vec<&str> = outside.iter().map(|(name, _)| name.as_str()).collect();
        ui::dim(&format!("Outside --target: {}", names.join(", ")));
    }
    if !unresolved.is_empty() {
        let names: Vec<&str> = unresolved.iter().map(|(name, _)| name.as_str()).collect();
        bail!("Unresolved output(s): {}", names.join(", "));
    }
    Ok(())
}

pub fn preview(ctx: &Context, args: &StackArgs) -> Result<()> {
    let opts = options(args, true, false);
    let report = execute(ctx, args, &opts, &mut AutoConfirm)?;
    finish(ctx, args, &report)
}

pub fn up(ctx: &Context, args: &UpArgs) -> Result<()> {
    let opts = options(&args.stack, false, args.fail_fast);
    let report = if args.yes {
        execute(ctx, &args.stack, &opts, &mut AutoConfirm)?
    } else {
        execute(ctx, &args.stack, &opts, &mut PromptConfirm)?
    };

    if report.preview {
        // Declined at the prompt
        if !ctx.quiet && !args.stack.json {
            ui::print_report(&report);
            ui::warn("Aborted, nothing applied");
        }
        return Ok(());
    }
    finish(ctx, &args.stack, &report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::stacks::StackTemplate;

    fn args(failures: &[&str]) -> StackArgs {
        StackArgs {
            template: None,
            target: Some("rg".into()),
            jobs: 0,
            json: false,
            failures: failures.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_options_clamp_jobs() {
        let opts = options(&args(&[]), true, false);
        assert!(opts.dry_run);
        assert_eq!(opts.jobs, 1);
        assert_eq!(opts.target.as_deref(), Some("rg"));
    }

    fn quiet() -> Context {
        Context {
            verbose: 0,
            quiet: true,
            config: None,
        }
    }

    fn unresolved(name: &str, reason: &str) -> DeploymentReport {
        let mut report = DeploymentReport::default();
        report
            .unresolved_outputs
            .insert(name.to_string(), reason.to_string());
        report
    }

    #[test]
    fn test_finish_accepts_outputs_outside_target() {
        let report = unresolved("connectionString", NEVER_RESOLVED);
        assert!(!report.is_success());
        assert!(finish(&quiet(), &args(&[]), &report).is_ok());
    }

    #[test]
    fn test_finish_rejects_placeholder_output_with_target() {
        let report = unresolved("principalId", "preview placeholder, never assigned");
        let err = finish(&quiet(), &args(&[]), &report).unwrap_err();
        assert_eq!(err.to_string(), "Unresolved output(s): principalId");
    }

    #[test]
    fn test_finish_names_unresolved_outputs() {
        let untargeted = StackArgs {
            target: None,
            ..args(&[])
        };
        let err = finish(&quiet(), &untargeted, &unresolved("connectionString", NEVER_RESOLVED)).unwrap_err();
        assert_eq!(err.to_string(), "Unresolved output(s): connectionString");
    }

    #[test]
    fn test_targeted_preview_of_minimal_stack() {
        let mut config = StackConfig::parse("").unwrap();
        config.company_code = Some("acme".into());
        config.location = Some("eastus".into());
        config.environment = Some("dev".into());
        config.default_scope = Some("web".into());

        let stack_args = args(&[]);
        let report = stacks::run(
            &config,
            StackTemplate::Minimal,
            &backend(&stack_args),
            &options(&stack_args, true, false),
            &mut WaveProgress::new(true),
            &mut AutoConfirm,
        )
        .unwrap();
        assert_eq!(report.resources.len(), 1);
        assert!(report.unresolved_outputs.contains_key("connectionString"));
        assert!(finish(&quiet(), &stack_args, &report).is_ok());
    }

    #[test]
    fn test_finish_reports_first_failure() {
        let report = DeploymentReport {
            failure: Some(declarative::FailureContext {
                kind: naming::ResourceKind::ResourceGroup,
                name: "acmedeveuswebrg00".into(),
                cause: "simulated failure".into(),
            }),
            ..Default::default()
        };
        let err = finish(&quiet(), &args(&[]), &report).unwrap_err();
        assert!(err.to_string().contains("acmedeveuswebrg00"));
    }
}
