//! Simulated provisioning backend
//!
//! An in-memory [`Provider`] that assigns outputs the way a cloud backend
//! would: identifiers, endpoints, connection strings and generated secrets,
//! all derived deterministically from the descriptor with blake3. It keeps
//! a digest of each resource's inputs to report drift between runs of the
//! same process, and can be told to fail specific kinds or names.

use declarative::{BackendError, Change, Provider, Realized, ResolvedDescriptor};
use naming::ResourceKind;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::factory::outputs;

/// Which descriptors a simulated failure applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureRule {
    Kind(ResourceKind),
    /// Substring of the derived name
    Name(String),
}

impl FailureRule {
    /// A type tag selects a kind; anything else matches names
    pub fn parse(raw: &str) -> Self {
        raw.parse::<ResourceKind>()
            .map_or_else(|_| Self::Name(raw.to_string()), Self::Kind)
    }

    fn matches(&self, descriptor: &ResolvedDescriptor) -> bool {
        match self {
            Self::Kind(kind) => descriptor.kind == *kind,
            Self::Name(name) => descriptor.name.contains(name.as_str()),
        }
    }
}

#[derive(Default)]
pub struct SimulatedBackend {
    subscription: String,
    failures: Vec<FailureRule>,
    records: Mutex<HashMap<String, blake3::Hash>>,
    order: Mutex<Vec<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self {
            subscription: "00000000-0000-0000-0000-000000000000".to_string(),
            ..Default::default()
        }
    }

    pub fn with_failure(mut self, rule: FailureRule) -> Self {
        self.failures.push(rule);
        self
    }

    /// Names in the order they were created
    pub fn realized(&self) -> Vec<String> {
        lock(&self.order).clone()
    }

    fn change_for(&self, name: &str, digest: blake3::Hash) -> Change {
        match lock(&self.records).get(name) {
            None => Change::Created,
            Some(previous) if *previous == digest => Change::NoChange,
            Some(_) => Change::Modified,
        }
    }

    fn resource_id(&self, d: &ResolvedDescriptor) -> String {
        let group = d
            .param_str("resource_group_name")
            .unwrap_or(d.name.as_str());
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
            self.subscription,
            group,
            d.kind.tag(),
            d.name
        )
    }

    /// Outputs for `d`. Identity is only known after creation.
    fn outputs(&self, d: &ResolvedDescriptor, created: bool) -> Realized {
        let name = d.name.as_str();
        let mut realized = Realized::new(Change::Created)
            .with_output("name", name)
            .with_output(outputs::ID, self.resource_id(d));

        match d.kind {
            ResourceKind::StorageAccount => {
                realized = realized.with_output(
                    outputs::CONNECTION_STRING,
                    format!(
                        "DefaultEndpointsProtocol=https;AccountName={name};AccountKey={}",
                        derive(name, "account-key", 44)
                    ),
                );
            }
            ResourceKind::Blob => {
                let account = d.param_str("storage_account_name").unwrap_or_default();
                let container = d.param_str("storage_container_name").unwrap_or_default();
                realized = realized.with_output(
                    outputs::URL,
                    format!("https://{account}.blob.core.windows.net/{container}/{name}"),
                );
            }
            ResourceKind::RandomPassword => {
                let length = d
                    .param("length")
                    .and_then(Value::as_u64)
                    .map_or(16, |l| l as usize);
                realized = realized.with_output(outputs::RESULT, derive(name, "password", length));
            }
            ResourceKind::KeyVault => {
                realized = realized
                    .with_output(outputs::VAULT_URI, format!("https://{name}.vault.azure.net/"));
            }
            ResourceKind::KeyVaultSecret => {
                let vault = d
                    .param_str("key_vault_id")
                    .and_then(|id| id.rsplit('/').next())
                    .unwrap_or_default();
                realized = realized
                    .with_output(outputs::VAULT_URI, format!("https://{vault}.vault.azure.net/"))
                    .with_output(outputs::VERSION, derive(name, &digest(d).to_hex(), 32));
            }
            ResourceKind::AppService => {
                let addresses: Vec<String> = (0..3u8)
                    .map(|i| {
                        let bytes = blake3::hash(format!("{name}/egress/{i}").as_bytes());
                        let b = bytes.as_bytes();
                        format!("20.{}.{}.{}", b[0], b[1], b[2].max(1))
                    })
                    .collect();
                realized = realized
                    .with_output(outputs::OUTBOUND_IP_ADDRESSES, addresses.join(","))
                    .with_output(
                        outputs::DEFAULT_SITE_HOSTNAME,
                        format!("{name}.azurewebsites.net"),
                    );
                if created {
                    realized = realized.with_output(outputs::PRINCIPAL_ID, uuid_like(name, "principal"));
                }
            }
            ResourceKind::AnalyticsWorkspace => {
                realized = realized.with_output(outputs::WORKSPACE_ID, uuid_like(name, "workspace"));
            }
            _ => {}
        }
        realized
    }
}

impl Provider for SimulatedBackend {
    fn create(&self, d: &ResolvedDescriptor) -> Result<Realized, BackendError> {
        if let Some(rule) = self.failures.iter().find(|rule| rule.matches(d)) {
            log::warn!("simulated failure for '{}' ({rule:?})", d.name);
            return Err(BackendError::other(format!(
                "simulated failure for '{}'",
                d.name
            )));
        }

        let digest = digest(d);
        let change = self.change_for(&d.name, digest);
        lock(&self.records).insert(d.name.clone(), digest);
        lock(&self.order).push(d.name.clone());
        log::info!("{} {} '{}'", change_verb(change), d.kind.description(), d.name);

        Ok(Realized {
            change,
            ..self.outputs(d, true)
        })
    }

    fn preview(&self, d: &ResolvedDescriptor) -> Result<Realized, BackendError> {
        let change = self.change_for(&d.name, digest(d));
        Ok(Realized {
            change,
            ..self.outputs(d, false)
        })
    }
}

fn change_verb(change: Change) -> &'static str {
    match change {
        Change::Created => "created",
        Change::Modified => "updated",
        Change::NoChange => "unchanged",
    }
}

/// Digest of everything the descriptor asks for
fn digest(d: &ResolvedDescriptor) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(d.name.as_bytes());
    for (key, value) in &d.parameters {
        hasher.update(key.as_bytes());
        hasher.update(value.to_string().as_bytes());
    }
    for (key, value) in &d.tags {
        hasher.update(key.as_bytes());
        hasher.update(value.as_bytes());
    }
    hasher.finalize()
}

/// `len` hex characters derived from `name` and a purpose label
fn derive(name: &str, purpose: &str, len: usize) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(purpose.as_bytes());
    hasher.update(name.as_bytes());
    let mut output = hasher.finalize_xof();
    let mut bytes = vec![0u8; len.div_ceil(2)];
    output.fill(&mut bytes);
    let mut hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    hex.truncate(len);
    hex
}

fn uuid_like(name: &str, purpose: &str) -> String {
    let hex = derive(name, purpose, 32);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..]
    )
}
