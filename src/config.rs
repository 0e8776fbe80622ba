//! Declaration file loading
//!
//! A declaration file is TOML:
//!
//! ```toml
//! [settings]
//! jobs = 4
//!
//! [settings.retry]
//! max_attempts = 3
//!
//! [[resource]]
//! id = "bucket"
//! kind = "bucket"
//! attributes = { name = "records" }
//!
//! [[resource]]
//! id = "function"
//! kind = "function"
//! attributes = { role = "${role.arn}", environment = { BUCKET_NAME = { ref = "bucket.name" } } }
//! ```

use anyhow::{Context, Result, bail};
use declarative::{
    Attributes, Declaration, ExecuteOptions, Reference, ResourceKind, RetryConfig, Value,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// File Structures
// ============================================================================

/// Top-level declaration file
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StackConfig {
    #[serde(default)]
    pub settings: Settings,

    /// Resources in declaration order
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceConfig>,
}

/// Execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Parallel workers
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            retry: RetrySettings::default(),
        }
    }
}

fn default_jobs() -> usize {
    4
}

/// Retry settings for transient backend errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    1
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> Result<RetryConfig> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 0.0 {
            bail!(
                "settings.retry.backoff_factor must be a non-negative number, got {}",
                self.backoff_factor
            );
        }
        Ok(RetryConfig {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff_factor: self.backoff_factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
        })
    }
}

/// One `[[resource]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub attributes: toml::Table,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

// ============================================================================
// Loading
// ============================================================================

impl StackConfig {
    /// Load a declaration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid declaration file: {}", path.display()))?;
        log::debug!(
            "Loaded {} resources from {}",
            config.resources.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Convert entries to engine declarations, preserving order
    pub fn declarations(&self) -> Result<Vec<Declaration>> {
        self.resources.iter().map(ResourceConfig::to_declaration).collect()
    }

    /// Execution options from `[settings]`
    pub fn execute_options(&self) -> Result<ExecuteOptions> {
        Ok(ExecuteOptions {
            jobs: self.settings.jobs.max(1),
            retry: self.settings.retry.to_retry_config()?,
            ..Default::default()
        })
    }
}

impl ResourceConfig {
    pub fn to_declaration(&self) -> Result<Declaration> {
        let kind: ResourceKind = self
            .kind
            .parse()
            .with_context(|| format!("Resource `{}`", self.id))?;

        let attributes = self
            .attributes
            .iter()
            .map(|(key, value)| {
                let value = convert_value(value)
                    .with_context(|| format!("Resource `{}` attribute `{key}`", self.id))?;
                Ok((key.clone(), value))
            })
            .collect::<Result<Attributes>>()?;

        Ok(Declaration {
            id: self.id.clone(),
            kind,
            attributes,
            depends_on: self.depends_on.clone(),
        })
    }
}

/// Convert a TOML value into an attribute value
///
/// `"${id.attr}"` and `{ ref = "id.attr" }` become references; everything
/// else is taken literally.
pub fn convert_value(value: &toml::Value) -> Result<Value> {
    Ok(match value {
        toml::Value::String(s) => match interpolation_target(s) {
            Some(target) => Value::Reference(parse_reference(target)?),
            None => Value::string(s.as_str()),
        },
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(x) => Value::from(*x),
        toml::Value::Boolean(b) => Value::from(*b),
        toml::Value::Datetime(dt) => Value::string(dt.to_string()),
        toml::Value::Array(items) => {
            Value::List(items.iter().map(convert_value).collect::<Result<_>>()?)
        }
        toml::Value::Table(table) => {
            if table.len() == 1
                && let Some(toml::Value::String(target)) = table.get("ref")
            {
                return Ok(Value::Reference(parse_reference(target)?));
            }
            Value::Map(
                table
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), convert_value(v)?)))
                    .collect::<Result<_>>()?,
            )
        }
    })
}

/// A whole-string `${...}` interpolation
static INTERPOLATION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\$\{([^}]+)\}$").ok());

/// Inner text of a whole-string `${...}` interpolation
fn interpolation_target(s: &str) -> Option<&str> {
    let re = INTERPOLATION.as_ref()?;
    re.captures(s).and_then(|caps| caps.get(1)).map(|m| m.as_str())
}

fn parse_reference(s: &str) -> Result<Reference> {
    match Reference::parse(s.trim()) {
        Some(reference) => Ok(reference),
        None => bail!("Invalid reference `{s}`, expected `resource.attribute`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STACK: &str = r#"
[settings]
jobs = 2

[settings.retry]
max_attempts = 3
base_delay_ms = 10

[[resource]]
id = "bucket"
kind = "bucket"
attributes = { name = "records", force_destroy = true }

[[resource]]
id = "role"
kind = "role"

[[resource]]
id = "function"
kind = "function"
depends_on = ["bucket"]

[resource.attributes]
role = "${role.arn}"
handler = "handler.handle"
timeout = 30

[resource.attributes.environment]
BUCKET_NAME = { ref = "bucket.name" }
"#;

    #[test]
    fn test_parse_stack() {
        let config = StackConfig::parse(STACK).unwrap();
        assert_eq!(config.settings.jobs, 2);
        assert_eq!(config.resources.len(), 3);

        let options = config.execute_options().unwrap();
        assert_eq!(options.jobs, 2);
        assert_eq!(options.retry.max_attempts, 3);
        assert_eq!(options.retry.base_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_declarations_keep_order_and_references() {
        let config = StackConfig::parse(STACK).unwrap();
        let decls = config.declarations().unwrap();

        let ids: Vec<&str> = decls.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["bucket", "role", "function"]);

        let function = &decls[2];
        assert_eq!(function.kind, ResourceKind::Function);
        assert_eq!(function.attributes["role"], Value::reference("role", "arn"));
        assert_eq!(function.attributes["timeout"], Value::from(30_i64));
        let env = function.attributes["environment"].as_map().unwrap();
        assert_eq!(env["BUCKET_NAME"], Value::reference("bucket", "name"));
        assert_eq!(function.dependency_ids(), vec!["bucket", "role"]);
    }

    #[test]
    fn test_defaults_without_settings() {
        let config = StackConfig::parse("").unwrap();
        assert!(config.resources.is_empty());
        let options = config.execute_options().unwrap();
        assert_eq!(options.jobs, 4);
        assert_eq!(options.retry.max_attempts, 1);
    }

    #[test]
    fn test_negative_backoff_is_rejected() {
        let config = StackConfig::parse(
            r#"
[settings.retry]
max_attempts = 3
backoff_factor = -2.0
"#,
        )
        .unwrap();
        let err = config.execute_options().unwrap_err();
        assert!(err.to_string().contains("backoff_factor"));

        let config = StackConfig::parse("[settings.retry]\nbackoff_factor = nan\n").unwrap();
        assert!(config.execute_options().is_err());
    }

    #[test]
    fn test_interpolation_target() {
        assert_eq!(interpolation_target("${role.arn}"), Some("role.arn"));
        assert_eq!(interpolation_target("${ bucket.name }"), Some(" bucket.name "));
        assert_eq!(interpolation_target("arn-${role.arn}"), None);
        assert_eq!(interpolation_target("${}"), None);
        assert_eq!(interpolation_target("plain"), None);
    }

    #[test]
    fn test_unknown_kind_is_an_error() {
        let config = StackConfig::parse(
            r#"
[[resource]]
id = "queue"
kind = "queue"
"#,
        )
        .unwrap();
        let err = config.declarations().unwrap_err();
        assert!(format!("{err:#}").contains("unknown resource kind `queue`"));
    }

    #[test]
    fn test_invalid_reference_is_an_error() {
        let value = toml::Value::String("${bucket}".into());
        assert!(convert_value(&value).is_err());
    }

    #[test]
    fn test_partial_interpolation_stays_literal() {
        let value = toml::Value::String("prefix-${bucket.name}".into());
        assert_eq!(
            convert_value(&value).unwrap(),
            Value::from("prefix-${bucket.name}")
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.toml");
        fs::write(&path, STACK).unwrap();
        let config = StackConfig::load(&path).unwrap();
        assert_eq!(config.resources.len(), 3);

        let missing = StackConfig::load(&dir.path().join("missing.toml"));
        assert!(missing.is_err());
    }
}
