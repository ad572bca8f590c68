//! Stack configuration
//!
//! Loaded from `stack.toml` in the config directory (or `--config`).
//!
//! # Environment Variables
//!
//! - `STACKFORGE_CONFIG_DIR` - Override config directory

use anyhow::{Context, Result, bail};
use naming::NamingContext;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::stacks::StackTemplate;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "STACKFORGE_CONFIG_DIR";

/// Get the config directory path
///
/// Priority:
/// 1. `STACKFORGE_CONFIG_DIR` env var
/// 2. `~/.config/stackforge`
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand_path(&dir);
        log::debug!("Using config dir from {}: {}", ENV_CONFIG_DIR, path.display());
        return Ok(path);
    }
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("stackforge"))
}

/// Default config file location
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("stack.toml"))
}

/// Expand `~` and environment variables in a path
pub fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).map_or_else(
        |_| shellexpand::tilde(path).into_owned(),
        std::borrow::Cow::into_owned,
    );
    PathBuf::from(expanded)
}

/// Deployment parameters for one stack
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackConfig {
    pub company_code: Option<String>,
    pub location: Option<String>,
    pub environment: Option<String>,
    pub default_scope: Option<String>,

    #[serde(default)]
    pub template: StackTemplate,

    /// Deployment package for the web app (a directory or archive)
    pub web_app_path: Option<String>,
    /// File uploaded as the web app's text blob
    #[serde(default = "default_blob_source")]
    pub blob_source: String,

    #[serde(default = "default_sql_admin_login")]
    pub sql_admin_login: String,
    #[serde(default = "default_sql_version")]
    pub sql_version: String,
    #[serde(default = "default_database_tier")]
    pub database_tier: String,
    #[serde(default = "default_plan_tier")]
    pub plan_tier: String,
    #[serde(default = "default_plan_size")]
    pub plan_size: String,

    /// Directory tenant the secret store trusts
    pub tenant_id: Option<String>,
    /// Principal running the deployment; granted secret management
    pub deployer_object_id: Option<String>,
}

fn default_blob_source() -> String {
    "./README.md".to_string()
}

fn default_sql_admin_login() -> String {
    "manualadmin".to_string()
}

fn default_sql_version() -> String {
    "12.0".to_string()
}

fn default_database_tier() -> String {
    "S0".to_string()
}

fn default_plan_tier() -> String {
    "Basic".to_string()
}

fn default_plan_size() -> String {
    "B1".to_string()
}

impl StackConfig {
    /// Load from an explicit path or the default location
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// A required value; missing or blank values are reported by key
    pub fn require<'a>(&self, key: &str, value: Option<&'a String>) -> Result<&'a str> {
        match value.map(|v| v.trim()) {
            Some(v) if !v.is_empty() => Ok(v),
            _ => bail!("Missing required configuration value '{key}'"),
        }
    }

    /// Naming parameters for every resource in the stack
    pub fn naming(&self) -> Result<NamingContext> {
        let context = NamingContext::new(
            self.require("company_code", self.company_code.as_ref())?,
            self.require("location", self.location.as_ref())?,
            self.require("environment", self.environment.as_ref())?,
            self.require("default_scope", self.default_scope.as_ref())?,
        )?;
        Ok(context)
    }

    /// The web app package path with `~` and variables expanded
    pub fn web_app_path(&self) -> Result<PathBuf> {
        let raw = self.require("web_app_path", self.web_app_path.as_ref())?;
        Ok(expand_path(raw))
    }

    pub fn tenant_id(&self) -> Result<&str> {
        self.require("tenant_id", self.tenant_id.as_ref())
    }

    pub fn deployer_object_id(&self) -> Result<&str> {
        self.require("deployer_object_id", self.deployer_object_id.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_defaults() {
        let config = StackConfig::parse(
            r#"
            company_code = "acme"
            location = "eastus"
            environment = "dev"
            default_scope = "web"
            "#,
        )
        .unwrap();
        assert_eq!(config.template, StackTemplate::Minimal);
        assert_eq!(config.sql_admin_login, "manualadmin");
        assert_eq!(config.plan_size, "B1");

        let naming = config.naming().unwrap();
        assert_eq!(naming.company_code(), "acme");
        assert_eq!(naming.scope(), "web");
    }

    #[test]
    fn test_missing_key_is_named() {
        let config = StackConfig::parse(
            r#"
            company_code = "acme"
            location = "eastus"
            default_scope = "web"
            "#,
        )
        .unwrap();
        let err = config.naming().unwrap_err();
        assert!(err.to_string().contains("'environment'"), "{err}");

        let err = config.tenant_id().unwrap_err();
        assert!(err.to_string().contains("'tenant_id'"), "{err}");
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let config = StackConfig {
            company_code: Some("  ".into()),
            ..Default::default()
        };
        assert!(config.require("company_code", config.company_code.as_ref()).is_err());
    }

    #[test]
    fn test_template_and_paths() {
        let config = StackConfig::parse(
            r#"
            template = "web-app"
            web_app_path = "~/site/publish"
            "#,
        )
        .unwrap();
        assert_eq!(config.template, StackTemplate::WebApp);
        let path = config.web_app_path().unwrap();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with("site/publish"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "company_code = \"contoso\"\ntemplate = \"analytics\"").unwrap();

        let config = StackConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.company_code.as_deref(), Some("contoso"));
        assert_eq!(config.template, StackTemplate::Analytics);

        let err = StackConfig::load(Some(Path::new("/nonexistent/stack.toml"))).unwrap_err();
        assert!(err.to_string().contains("Could not read"));
    }
}
