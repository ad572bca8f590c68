//! Naming context: the organizational parameters shared by every name

use crate::error::{NamingError, Result};
use serde::{Deserialize, Serialize};

/// Organizational parameters threaded into every identifier.
///
/// Supplied once per deployment and never mutated afterwards. Fields keep
/// the caller's spelling (tags carry the scope verbatim); names use the
/// sanitized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawNamingContext")]
pub struct NamingContext {
    company_code: String,
    location: String,
    environment: String,
    scope: String,
}

#[derive(Deserialize)]
struct RawNamingContext {
    company_code: String,
    location: String,
    environment: String,
    scope: String,
}

impl TryFrom<RawNamingContext> for NamingContext {
    type Error = NamingError;

    fn try_from(raw: RawNamingContext) -> Result<Self> {
        Self::new(raw.company_code, raw.location, raw.environment, raw.scope)
    }
}

impl NamingContext {
    /// Create a context, rejecting fields with no usable characters
    pub fn new(
        company_code: impl Into<String>,
        location: impl Into<String>,
        environment: impl Into<String>,
        scope: impl Into<String>,
    ) -> Result<Self> {
        let ctx = Self {
            company_code: company_code.into().trim().to_string(),
            location: location.into().trim().to_string(),
            environment: environment.into().trim().to_string(),
            scope: scope.into().trim().to_string(),
        };

        for (field, raw) in [
            ("company_code", &ctx.company_code),
            ("location", &ctx.location),
            ("environment", &ctx.environment),
            ("scope", &ctx.scope),
        ] {
            if sanitize(raw).is_empty() {
                return Err(NamingError::EmptyComponent {
                    field,
                    raw: raw.clone(),
                });
            }
        }

        Ok(ctx)
    }

    pub fn company_code(&self) -> &str {
        &self.company_code
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

/// Reduce a component to lowercase ASCII alphanumerics
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Short code for a location
///
/// Well-known regions use their conventional abbreviation; anything else
/// keeps its first four sanitized characters.
pub fn location_code(location: &str) -> String {
    let sanitized = sanitize(location);
    let known = match sanitized.as_str() {
        "eastus" => Some("eus"),
        "eastus2" => Some("eus2"),
        "westus" => Some("wus"),
        "westus2" => Some("wus2"),
        "centralus" => Some("cus"),
        "northeurope" => Some("neu"),
        "westeurope" => Some("weu"),
        "uksouth" => Some("uks"),
        "ukwest" => Some("ukw"),
        "southeastasia" => Some("sea"),
        "eastasia" => Some("ea"),
        "australiaeast" => Some("aue"),
        "japaneast" => Some("jpe"),
        "canadacentral" => Some("cac"),
        "brazilsouth" => Some("brs"),
        _ => None,
    };

    match known {
        Some(code) => code.to_string(),
        None => sanitized.chars().take(4).collect(),
    }
}

/// Short code for an environment (at most four characters)
pub fn environment_code(environment: &str) -> String {
    sanitize(environment).chars().take(4).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Acme-Corp_01"), "acmecorp01");
        assert_eq!(sanitize("--"), "");
        assert_eq!(sanitize("Ünïcode"), "ncode");
    }

    #[test]
    fn test_location_code() {
        assert_eq!(location_code("eastus"), "eus");
        assert_eq!(location_code("West Europe"), "weu");
        assert_eq!(location_code("mars-north"), "mars");
    }

    #[test]
    fn test_environment_code() {
        assert_eq!(environment_code("dev"), "dev");
        assert_eq!(environment_code("production"), "prod");
    }

    #[test]
    fn test_empty_component_rejected() {
        let err = NamingContext::new("acme", "eastus", "dev", " - ").unwrap_err();
        assert_eq!(
            err,
            NamingError::EmptyComponent {
                field: "scope",
                raw: "-".to_string(),
            }
        );
    }

    #[test]
    fn test_fields_are_trimmed() {
        let ctx = NamingContext::new(" acme ", "eastus", "dev", "web").unwrap();
        assert_eq!(ctx.company_code(), "acme");
    }
}
