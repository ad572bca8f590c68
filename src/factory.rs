//! Resource factory - one constructor per resource kind
//!
//! Constructors only record parameters and dependency edges; nothing is
//! resolved or provisioned here. Parameters may be literals or cells read
//! from other descriptors' outputs.

use declarative::{ConstructionError, Deferred, IntoInput, Resource, Stack};
use naming::ResourceKind;
use serde::Serialize;
use serde_json::{Value, json};

/// Output fields assigned by the backend, per kind
pub mod outputs {
    pub const ID: &str = "id";
    /// Storage account
    pub const CONNECTION_STRING: &str = "primary_connection_string";
    /// Blob
    pub const URL: &str = "url";
    /// Random password
    pub const RESULT: &str = "result";
    /// Key vault secret
    pub const VAULT_URI: &str = "vault_uri";
    pub const VERSION: &str = "version";
    /// App service
    pub const PRINCIPAL_ID: &str = "principal_id";
    pub const OUTBOUND_IP_ADDRESSES: &str = "outbound_ip_addresses";
    pub const DEFAULT_SITE_HOSTNAME: &str = "default_site_hostname";
    /// Analytics workspace
    pub const WORKSPACE_ID: &str = "workspace_id";
}

type Declared = Result<Resource, ConstructionError>;

/// Pricing tier and size of a hosting plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSku {
    pub tier: String,
    pub size: String,
}

/// Declares resources into one stack with a shared set of extra tags
#[derive(Debug, Clone)]
pub struct ResourceFactory {
    stack: Stack,
    tags: Vec<(String, String)>,
}

impl ResourceFactory {
    pub fn new(stack: Stack) -> Self {
        Self {
            stack,
            tags: Vec::new(),
        }
    }

    /// Add a tag to everything this factory declares
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    fn descriptor(&self, kind: ResourceKind) -> declarative::DescriptorBuilder {
        self.stack
            .descriptor(kind)
            .tags(self.tags.iter().cloned())
    }

    fn location(&self) -> String {
        self.stack.naming().location().to_string()
    }

    pub fn resource_group(&self) -> Declared {
        self.descriptor(ResourceKind::ResourceGroup)
            .param("location", self.location())
            .declare()
    }

    pub fn storage_account(&self, resource_group: impl IntoInput) -> Declared {
        self.descriptor(ResourceKind::StorageAccount)
            .param("resource_group_name", resource_group)
            .param("location", self.location())
            .param("account_tier", "Standard")
            .param("account_replication_type", "LRS")
            .declare()
    }

    pub fn container(&self, storage_account: impl IntoInput) -> Declared {
        self.descriptor(ResourceKind::StorageContainer)
            .param("storage_account_name", storage_account)
            .param("container_access_type", "private")
            .declare()
    }

    /// A blob uploaded from a local file
    pub fn blob(
        &self,
        storage_account: impl IntoInput,
        container: impl IntoInput,
        blob_type: &str,
        source: &str,
    ) -> Declared {
        self.descriptor(ResourceKind::Blob)
            .param("storage_account_name", storage_account)
            .param("storage_container_name", container)
            .param("type", blob_type)
            .param("source", source)
            .declare()
    }

    /// A blob holding a zipped directory or archive
    pub fn zip_blob(
        &self,
        storage_account: impl IntoInput,
        container: impl IntoInput,
        blob_type: &str,
        archive: &str,
    ) -> Declared {
        self.descriptor(ResourceKind::Blob)
            .param("storage_account_name", storage_account)
            .param("storage_container_name", container)
            .param("type", blob_type)
            .param("archive", archive)
            .declare()
    }

    pub fn random_password(&self, length: u32) -> Declared {
        self.descriptor(ResourceKind::RandomPassword)
            .param("length", length)
            .param("special", true)
            .declare()
    }

    pub fn sql_server(
        &self,
        resource_group: impl IntoInput,
        admin_login: &str,
        admin_password: impl IntoInput,
        version: &str,
    ) -> Declared {
        self.descriptor(ResourceKind::SqlServer)
            .param("resource_group_name", resource_group)
            .param("location", self.location())
            .param("administrator_login", admin_login)
            .param("administrator_login_password", admin_password)
            .param("version", version)
            .declare()
    }

    pub fn database(
        &self,
        resource_group: impl IntoInput,
        server: impl IntoInput,
        edition: &str,
    ) -> Declared {
        self.descriptor(ResourceKind::SqlDatabase)
            .param("resource_group_name", resource_group)
            .param("location", self.location())
            .param("server_name", server)
            .param("requested_service_objective_name", edition)
            .declare()
    }

    pub fn plan_sku(tier: &str, size: &str) -> PlanSku {
        PlanSku {
            tier: tier.to_string(),
            size: size.to_string(),
        }
    }

    pub fn plan(&self, resource_group: impl IntoInput, sku: &PlanSku, kind: &str) -> Declared {
        self.descriptor(ResourceKind::HostingPlan)
            .param("resource_group_name", resource_group)
            .param("location", self.location())
            .param("sku", json!(sku))
            .param("kind", kind)
            .declare()
    }

    /// The web app, wired to its package, secrets and database
    #[allow(clippy::too_many_arguments)]
    pub fn app_service(
        &self,
        resource_group: impl IntoInput,
        plan_id: impl IntoInput,
        text_blob_url: impl IntoInput,
        package_secret_uri: impl IntoInput,
        connection_string: impl IntoInput,
        connection_name: &str,
        connection_type: &str,
    ) -> Declared {
        self.descriptor(ResourceKind::AppService)
            .param("resource_group_name", resource_group)
            .param("location", self.location())
            .param("app_service_plan_id", plan_id)
            .param("text_blob_url", text_blob_url)
            .param("package_secret_uri", package_secret_uri)
            .param("connection_string", connection_string)
            .param("connection_name", connection_name)
            .param("connection_type", connection_type)
            .param("identity", "SystemAssigned")
            .declare()
    }

    /// An inline access policy for a key vault; not a resource of its own
    pub fn key_vault_access_policy(
        tenant_id: &Deferred<String>,
        object_id: &Deferred<String>,
        key_permissions: &[&str],
        secret_permissions: &[&str],
        certificate_permissions: &[&str],
    ) -> Deferred<Value> {
        let keys = to_strings(key_permissions);
        let secrets = to_strings(secret_permissions);
        let certificates = to_strings(certificate_permissions);
        tenant_id.combine(object_id, move |tenant, object| {
            json!([{
                "tenant_id": tenant,
                "object_id": object,
                "key_permissions": keys,
                "secret_permissions": secrets,
                "certificate_permissions": certificates,
            }])
        })
    }

    pub fn key_vault(
        &self,
        resource_group: impl IntoInput,
        tenant_id: impl IntoInput,
        access_policies: impl IntoInput,
    ) -> Declared {
        self.descriptor(ResourceKind::KeyVault)
            .param("resource_group_name", resource_group)
            .param("location", self.location())
            .param("tenant_id", tenant_id)
            .param("sku_name", "standard")
            .param("access_policies", access_policies)
            .declare()
    }

    /// A secret holding a signed read URL for `blob`
    pub fn secret(&self, vault_id: impl IntoInput, blob: &Resource, storage: &Resource) -> Declared {
        let signed = blob
            .output_string(outputs::URL)
            .combine(&storage.output_string(outputs::CONNECTION_STRING), |url, conn| {
                signed_read_url(&url, &conn)
            });
        self.descriptor(ResourceKind::KeyVaultSecret)
            .param("key_vault_id", vault_id)
            .param("value", signed)
            .declare()
    }

    pub fn access_policy(
        &self,
        vault_id: impl IntoInput,
        tenant_id: impl IntoInput,
        object_id: impl IntoInput,
        secret_permissions: &[&str],
    ) -> Declared {
        self.descriptor(ResourceKind::KeyVaultAccessPolicy)
            .param("key_vault_id", vault_id)
            .param("tenant_id", tenant_id)
            .param("object_id", object_id)
            .param("secret_permissions", to_strings(secret_permissions))
            .declare()
    }

    pub fn directory_administrator(
        &self,
        resource_group: impl IntoInput,
        tenant_id: impl IntoInput,
        object_id: impl IntoInput,
        login: &str,
        server: impl IntoInput,
    ) -> Declared {
        self.descriptor(ResourceKind::DirectoryAdministrator)
            .param("resource_group_name", resource_group)
            .param("tenant_id", tenant_id)
            .param("object_id", object_id)
            .param("login", login)
            .param("server_name", server)
            .declare()
    }

    /// Grant `principal` a role on one container of a storage account
    pub fn role_assignment(
        &self,
        principal: impl IntoInput,
        storage_id: &Deferred<String>,
        container: &Deferred<String>,
        role: &str,
    ) -> Declared {
        let scope = storage_id.combine(container, |account, container| {
            format!("{account}/blobServices/default/containers/{container}")
        });
        self.descriptor(ResourceKind::RoleAssignment)
            .param("principal_id", principal)
            .param("scope", scope)
            .param("role_definition_name", role)
            .declare()
    }

    pub fn firewall_rule(
        &self,
        resource_group: impl IntoInput,
        start_ip: &str,
        end_ip: &str,
        server: impl IntoInput,
    ) -> Declared {
        self.descriptor(ResourceKind::FirewallRule)
            .param("resource_group_name", resource_group)
            .param("start_ip_address", start_ip)
            .param("end_ip_address", end_ip)
            .param("server_name", server)
            .declare()
    }

    pub fn analytics_workspace(&self, resource_group: impl IntoInput) -> Declared {
        self.descriptor(ResourceKind::AnalyticsWorkspace)
            .param("resource_group_name", resource_group)
            .param("location", self.location())
            .param("sku", "PerGB2018")
            .param("retention_in_days", 30u32)
            .declare()
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Read-only shared access URL for a blob, signed with the account key
pub fn signed_read_url(url: &str, connection_string: &str) -> String {
    let signature = blake3::keyed_hash(blake3::hash(connection_string.as_bytes()).as_bytes(), url.as_bytes());
    format!("{url}?sp=r&sig={}", &signature.to_hex()[..32])
}
