//! Stack templates
//!
//! Each template declares one deployment through the resource factory and
//! publishes its outputs. The same declaration runs for preview and for
//! apply, so both derive identical names.

use anyhow::Result;
use clap::ValueEnum;
use declarative::{
    ConfirmCallback, Deferred, DeploymentReport, ExecuteOptions, ProgressCallback, Provider, Stack,
};
use naming::{ResourceKind, SCOPE_TAG};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::StackConfig;
use crate::factory::{ResourceFactory, outputs};

/// Stand-in principal while the app's identity is unknown (preview only)
pub const PREVIEW_PRINCIPAL: &str = "11111111-1111-1111-1111-111111111111";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StackTemplate {
    /// Resource group and storage account
    #[default]
    Minimal,
    /// Resource group and log analytics workspace
    Analytics,
    /// Web app with SQL database, key vault and managed identity
    WebApp,
}

impl std::fmt::Display for StackTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackTemplate::Minimal => write!(f, "minimal"),
            StackTemplate::Analytics => write!(f, "analytics"),
            StackTemplate::WebApp => write!(f, "web-app"),
        }
    }
}

/// Declare every resource of `template` on `stack`
pub fn declare(template: StackTemplate, config: &StackConfig, stack: &Stack) -> Result<()> {
    log::debug!("declaring {template} stack for {:?}", stack.naming());
    let factory = ResourceFactory::new(stack.clone());
    match template {
        StackTemplate::Minimal => minimal(&factory),
        StackTemplate::Analytics => analytics(&factory),
        StackTemplate::WebApp => web_app(&factory, config),
    }
}

/// Pass the scope as an explicit caller tag too
fn scoped(factory: &ResourceFactory) -> ResourceFactory {
    let scope = factory.stack().naming().scope().to_string();
    factory.clone().with_tag(SCOPE_TAG, scope)
}

fn minimal(factory: &ResourceFactory) -> Result<()> {
    let factory = scoped(factory);
    let rg = factory.resource_group()?;
    let sa = factory.storage_account(rg.name_output())?;

    factory.stack().export(
        "connectionString",
        &sa.output_string(outputs::CONNECTION_STRING),
    );
    Ok(())
}

fn analytics(factory: &ResourceFactory) -> Result<()> {
    let factory = scoped(factory);
    let rg = factory.resource_group()?;
    let workspace = factory.analytics_workspace(rg.name_output())?;

    let stack = factory.stack();
    stack.export("resourceGroupId", &rg.id_output());
    stack.export("resourceGroupName", &rg.name_output());
    stack.export(
        "workspaceId",
        &workspace.output_string(outputs::WORKSPACE_ID),
    );
    Ok(())
}

fn web_app(factory: &ResourceFactory, config: &StackConfig) -> Result<()> {
    let web_app_path = config.web_app_path()?;
    let tenant = Deferred::resolved(config.tenant_id()?.to_string());
    let deployer = Deferred::resolved(config.deployer_object_id()?.to_string());

    let rg = factory.resource_group()?;
    let rg_name = rg.name_output();
    let sa = factory.storage_account(rg_name.clone())?;
    let container = factory.container(sa.name_output())?;

    // Database, reached through the app's identity rather than credentials
    let password = factory.random_password(16)?;
    let sql = factory.sql_server(
        rg_name.clone(),
        &config.sql_admin_login,
        password.output_string(outputs::RESULT),
        &config.sql_version,
    )?;
    let database = factory.database(rg_name.clone(), sql.name_output(), &config.database_tier)?;
    let connection_string = sql.name_output().combine(&database.name_output(), |server, db| {
        format!("Server=tcp:{server}.database.windows.net;Database={db};")
    });

    let text_blob = factory.blob(
        sa.name_output(),
        container.name_output(),
        "block",
        &config.blob_source,
    )?;

    let sku = ResourceFactory::plan_sku(&config.plan_tier, &config.plan_size);
    let plan = factory.plan(rg_name.clone(), &sku, "App")?;
    let package = factory.zip_blob(
        sa.name_output(),
        container.name_output(),
        "block",
        &web_app_path.to_string_lossy(),
    )?;

    // Secret store holding a signed URL for the package
    let policies = ResourceFactory::key_vault_access_policy(
        &tenant,
        &deployer,
        &[],
        &["delete", "get", "list", "set"],
        &[],
    );
    let vault = factory.key_vault(rg_name.clone(), tenant.clone(), policies)?;
    let secret = factory.secret(vault.id_output(), &package, &sa)?;
    let secret_uri = secret
        .output_string(outputs::VAULT_URI)
        .combine(&secret.output_string(outputs::VERSION), |uri, version| {
            (uri, version)
        })
        .combine(&secret.name_output(), |(uri, version), name| {
            format!("{uri}secrets/{name}/{version}")
        });

    let app = factory.app_service(
        rg_name.clone(),
        plan.id_output(),
        text_blob.output_string(outputs::URL),
        secret_uri,
        connection_string,
        "db",
        "SQLAzure",
    )?;

    // The identity is only assigned on creation
    let principal = app
        .output(outputs::PRINCIPAL_ID)
        .fallback(json!(PREVIEW_PRINCIPAL));

    factory.access_policy(vault.id_output(), tenant.clone(), principal.clone(), &["get"])?;
    factory.directory_administrator(
        rg_name.clone(),
        tenant,
        principal.clone(),
        "adadmin",
        sql.name_output(),
    )?;
    factory.role_assignment(
        principal.clone(),
        &sa.id_output(),
        &container.name_output(),
        "Storage Blob Data Reader",
    )?;

    let rules_factory = factory.clone();
    let server = sql.name_output();
    let rules = app
        .output_string(outputs::OUTBOUND_IP_ADDRESSES)
        .expand_non_empty(",", move |ip| {
            let ip = ip.trim();
            rules_factory.firewall_rule(rg_name.clone(), ip, ip, server.clone())
        });
    rules.register(|rules| log::debug!("declared {} firewall rule(s)", rules.len()));

    let stack = factory.stack();
    stack.export(
        "endpoint",
        &app.output_string(outputs::DEFAULT_SITE_HOSTNAME)
            .map(|host| format!("https://{host}")),
    );
    stack.export_provisional("principalId", &principal);
    Ok(())
}

/// Names the template requests before anything is provisioned.
///
/// Descriptors declared by fan-out only exist once their list resolves and
/// are not included.
pub fn planned_names(
    template: StackTemplate,
    config: &StackConfig,
) -> Result<Vec<(ResourceKind, String)>> {
    let stack = Stack::new(config.naming()?);
    declare(template, config, &stack)?;
    Ok(stack
        .resources()
        .iter()
        .map(|r| (r.kind(), r.name().to_string()))
        .collect())
}

/// Preview, confirm and apply one stack
pub fn run<P, G, C>(
    config: &StackConfig,
    template: StackTemplate,
    provider: &P,
    opts: &ExecuteOptions,
    progress: &mut G,
    confirm: &mut C,
) -> Result<DeploymentReport>
where
    P: Provider + ?Sized,
    G: ProgressCallback,
    C: ConfirmCallback,
{
    let naming = config.naming()?;
    declarative::deploy(
        &naming,
        |stack| declare(template, config, stack),
        provider,
        opts,
        progress,
        confirm,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FailureRule, SimulatedBackend};
    use declarative::{ApplyResult, AutoConfirm, NoProgress};

    fn config() -> StackConfig {
        StackConfig {
            company_code: Some("acme".into()),
            location: Some("eastus".into()),
            environment: Some("dev".into()),
            default_scope: Some("web".into()),
            web_app_path: Some("./publish".into()),
            tenant_id: Some("tenant-0001".into()),
            deployer_object_id: Some("deployer-0001".into()),
            ..StackConfig::parse("").unwrap()
        }
    }

    fn apply(template: StackTemplate, backend: &SimulatedBackend) -> DeploymentReport {
        run(
            &config(),
            template,
            backend,
            &ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap()
    }

    fn preview(template: StackTemplate, backend: &SimulatedBackend) -> DeploymentReport {
        let opts = ExecuteOptions {
            dry_run: true,
            ..Default::default()
        };
        run(&config(), template, backend, &opts, &mut NoProgress, &mut AutoConfirm).unwrap()
    }

    #[test]
    fn test_minimal_realizes_group_first_and_exposes_connection() {
        let backend = SimulatedBackend::new();
        let report = apply(StackTemplate::Minimal, &backend);

        assert_eq!(backend.realized(), ["acmedeveuswebrg00", "acmedeveuswebsa00"]);
        let conn = report.output("connectionString").unwrap().as_str().unwrap();
        assert!(conn.contains("AccountName=acmedeveuswebsa00"), "{conn}");
        assert!(report.is_success());
    }

    #[test]
    fn test_minimal_group_failure_never_creates_storage() {
        let backend =
            SimulatedBackend::new().with_failure(FailureRule::Kind(ResourceKind::ResourceGroup));
        let report = apply(StackTemplate::Minimal, &backend);

        assert!(backend.realized().is_empty());
        let failure = report.failure.clone().unwrap();
        assert_eq!(failure.kind, ResourceKind::ResourceGroup);
        assert_eq!(failure.name, "acmedeveuswebrg00");

        let storage = report.outcome("acmedeveuswebsa00").unwrap();
        let ApplyResult::Skipped { reason } = &storage.result else {
            panic!("storage should be skipped, got {:?}", storage.result);
        };
        let unresolved = &report.unresolved_outputs["connectionString"];
        assert_eq!(reason, unresolved);
        assert!(unresolved.contains("simulated failure for 'acmedeveuswebrg00'"));
    }

    #[test]
    fn test_analytics_outputs() {
        let backend = SimulatedBackend::new();
        let report = apply(StackTemplate::Analytics, &backend);

        assert_eq!(
            report.output("resourceGroupName"),
            Some(&json!("acmedeveuswebrg00"))
        );
        let id = report.output("resourceGroupId").unwrap().as_str().unwrap();
        assert!(id.ends_with("/acmedeveuswebrg00"), "{id}");
        assert_eq!(
            report.output("workspaceId").unwrap().as_str().unwrap().len(),
            36
        );
        assert_eq!(report.resources[1].kind, ResourceKind::AnalyticsWorkspace);
    }

    #[test]
    fn test_web_app_preview_uses_placeholder_identity() {
        let backend = SimulatedBackend::new();
        let report = preview(StackTemplate::WebApp, &backend);

        assert!(report.preview);
        assert!(backend.realized().is_empty());
        assert_eq!(
            report.output("principalId"),
            Some(&json!({ "placeholder": PREVIEW_PRINCIPAL }))
        );
        assert!(report.is_success(), "{report:#?}");
    }

    #[test]
    fn test_web_app_apply() {
        let backend = SimulatedBackend::new();
        let report = apply(StackTemplate::WebApp, &backend);
        assert!(report.is_success(), "{report:#?}");

        assert_eq!(
            report.output("endpoint"),
            Some(&json!("https://acmedeveuswebapp00.azurewebsites.net"))
        );
        let principal = report.output("principalId").unwrap().as_str().unwrap();
        assert_ne!(principal, PREVIEW_PRINCIPAL);

        let realized = backend.realized();
        let position = |name: &str| realized.iter().position(|n| n == name).unwrap();
        assert!(position("acmedeveuswebrg00") < position("acmedeveuswebsa00"));
        assert!(position("acmedeveuswebkvs00") < position("acmedeveuswebapp00"));
        assert!(position("acmedeveuswebapp00") < position("acmedeveuswebkvap00"));

        let rules = report.group_by_kind()[&ResourceKind::FirewallRule].len();
        assert_eq!(rules, 3);
        assert_eq!(report.summary.created, 18);
    }

    #[test]
    fn test_reapply_reports_no_change() {
        let backend = SimulatedBackend::new();
        apply(StackTemplate::Minimal, &backend);
        let again = apply(StackTemplate::Minimal, &backend);
        assert_eq!(again.summary.no_change, 2);
        assert_eq!(again.summary.total_changes(), 0);
    }

    #[test]
    fn test_planned_names() {
        let names = planned_names(StackTemplate::Minimal, &config()).unwrap();
        assert_eq!(
            names,
            [
                (ResourceKind::ResourceGroup, "acmedeveuswebrg00".to_string()),
                (ResourceKind::StorageAccount, "acmedeveuswebsa00".to_string()),
            ]
        );
    }

    #[test]
    fn test_web_app_requires_tenant() {
        let config = StackConfig {
            tenant_id: None,
            ..config()
        };
        let err = planned_names(StackTemplate::WebApp, &config).unwrap_err();
        assert!(err.to_string().contains("'tenant_id'"));
    }

    #[test]
    fn test_every_template_tags_scope() {
        for template in [StackTemplate::Minimal, StackTemplate::Analytics, StackTemplate::WebApp] {
            let stack = Stack::new(config().naming().unwrap());
            declare(template, &config(), &stack).unwrap();
            for resource in stack.resources() {
                assert_eq!(resource.tags().get(SCOPE_TAG), Some("web"), "{}", resource.name());
                assert_eq!(resource.tags().iter().count(), 1);
            }
        }
    }
}
