//! Local provisioning backend
//!
//! Simulates the provider on the local filesystem: buckets are directories
//! under the objects root, every other kind only produces outputs. Good
//! enough to drive plans end to end and to back `strata invoke`.

use declarative::{Attributes, Backend, BackendError, ResourceKind, Value};
use std::fs;
use std::path::PathBuf;

/// Filesystem-backed simulation of the provisioning API
#[derive(Debug, Clone)]
pub struct LocalBackend {
    objects_root: PathBuf,
}

impl LocalBackend {
    pub fn new(objects_root: impl Into<PathBuf>) -> Self {
        Self {
            objects_root: objects_root.into(),
        }
    }

    /// Directory holding a bucket's objects
    pub fn bucket_dir(&self, name: &str) -> PathBuf {
        self.objects_root.join(name)
    }

    fn apply_bucket(&self, name: &str) -> Result<Attributes, BackendError> {
        validate_bucket_name(name)?;
        let dir = self.bucket_dir(name);
        if dir.is_dir() {
            log::debug!("Bucket {name} already exists at {}", dir.display());
        } else {
            fs::create_dir_all(&dir)?;
            log::debug!("Created bucket {name} at {}", dir.display());
        }
        Ok(Attributes::new())
    }

    fn destroy_bucket(&self, name: &str, attributes: &Attributes) -> Result<(), BackendError> {
        let dir = self.bucket_dir(name);
        if !dir.exists() {
            return Ok(());
        }

        let force = attributes
            .get("force_destroy")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let is_empty = fs::read_dir(&dir)?.next().is_none();
        if !is_empty && !force {
            return Err(BackendError::permanent(format!(
                "bucket `{name}` is not empty (set force_destroy = true to remove it)"
            )));
        }

        fs::remove_dir_all(&dir)?;
        log::debug!("Removed bucket {name}");
        Ok(())
    }
}

impl Backend for LocalBackend {
    fn apply(&self, kind: ResourceKind, attributes: &Attributes) -> Result<Attributes, BackendError> {
        let name = resource_name(kind, attributes);

        let mut outputs = match kind {
            ResourceKind::Bucket => self.apply_bucket(&name)?,
            ResourceKind::Role => Attributes::new(),
            ResourceKind::Policy => {
                let role = required_str(kind, attributes, "role")?;
                match attributes.get("statements") {
                    Some(Value::List(statements)) if !statements.is_empty() => {}
                    _ => {
                        return Err(BackendError::permanent(
                            "policy requires a non-empty `statements` list",
                        ));
                    }
                }
                let mut out = Attributes::new();
                out.insert("attached_to".into(), Value::from(role));
                out
            }
            ResourceKind::Function => {
                required_str(kind, attributes, "role")?;
                if let Some(env) = attributes.get("environment")
                    && env.as_map().is_none()
                {
                    return Err(BackendError::permanent(
                        "function `environment` must be a table",
                    ));
                }
                let version = attributes
                    .get("version")
                    .and_then(Value::as_int)
                    .unwrap_or(0)
                    + 1;
                let mut out = Attributes::new();
                out.insert("version".into(), Value::from(version));
                out
            }
            ResourceKind::LogGroup => {
                if let Some(days) = attributes.get("retention_days")
                    && !days.as_int().is_some_and(|d| d > 0)
                {
                    return Err(BackendError::permanent(
                        "`retention_days` must be a positive integer",
                    ));
                }
                Attributes::new()
            }
        };

        outputs.insert("arn".into(), Value::from(format!("arn:local:{kind}:::{name}")));
        outputs.insert("id".into(), Value::from(name.as_str()));
        outputs.insert("name".into(), Value::from(name));
        Ok(outputs)
    }

    fn destroy(&self, kind: ResourceKind, attributes: &Attributes) -> Result<(), BackendError> {
        let name = resource_name(kind, attributes);
        match kind {
            ResourceKind::Bucket => self.destroy_bucket(&name, attributes),
            _ => {
                log::debug!("Removed {kind} {name}");
                Ok(())
            }
        }
    }
}

/// Physical name: the declared `name`, the previously assigned `id`, or a
/// name derived from the inputs
fn resource_name(kind: ResourceKind, attributes: &Attributes) -> String {
    if let Some(name) = attributes.get("name").and_then(Value::as_str) {
        return name.to_string();
    }
    if let Some(id) = attributes.get("id").and_then(Value::as_str) {
        return id.to_string();
    }
    generated_name(kind, attributes)
}

/// Deterministic name from a hash of the kind and inputs
pub fn generated_name(kind: ResourceKind, attributes: &Attributes) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(kind.as_str().as_bytes());
    for (key, value) in attributes {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.to_string().as_bytes());
        hasher.update(b"\n");
    }
    let hex = hasher.finalize().to_hex();
    format!("{}-{}", kind.as_str().replace('_', "-"), &hex.as_str()[..8])
}

fn required_str<'a>(
    kind: ResourceKind,
    attributes: &'a Attributes,
    key: &str,
) -> Result<&'a str, BackendError> {
    attributes
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::permanent(format!("{kind} requires a `{key}` string")))
}

/// Bucket names: 3-63 characters of lowercase letters, digits, `-` and `.`,
/// starting and ending with a letter or digit
fn validate_bucket_name(name: &str) -> Result<(), BackendError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let valid_ends = name
        .chars()
        .next()
        .zip(name.chars().last())
        .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());

    if (3..=63).contains(&name.len()) && valid_chars && valid_ends {
        Ok(())
    } else {
        Err(BackendError::permanent(format!("invalid bucket name `{name}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::ErrorKind;

    fn attrs(pairs: &[(&str, Value)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_bucket_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        let inputs = attrs(&[("name", Value::from("records"))]);

        let outputs = backend.apply(ResourceKind::Bucket, &inputs).unwrap();
        assert_eq!(outputs["arn"], Value::from("arn:local:bucket:::records"));
        assert_eq!(outputs["id"], Value::from("records"));
        assert!(backend.bucket_dir("records").is_dir());

        // Existing directory counts as already provisioned
        backend.apply(ResourceKind::Bucket, &inputs).unwrap();

        backend.destroy(ResourceKind::Bucket, &inputs).unwrap();
        assert!(!backend.bucket_dir("records").exists());
    }

    #[test]
    fn test_non_empty_bucket_needs_force_destroy() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        let inputs = attrs(&[("name", Value::from("records"))]);
        backend.apply(ResourceKind::Bucket, &inputs).unwrap();
        fs::write(backend.bucket_dir("records").join("object.json"), "{}").unwrap();

        let err = backend.destroy(ResourceKind::Bucket, &inputs).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Permanent);
        assert!(backend.bucket_dir("records").exists());

        let forced = attrs(&[
            ("name", Value::from("records")),
            ("force_destroy", Value::from(true)),
        ]);
        backend.destroy(ResourceKind::Bucket, &forced).unwrap();
        assert!(!backend.bucket_dir("records").exists());
    }

    #[test]
    fn test_invalid_bucket_name() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        for name in ["ab", "Records", "-records", "records_1"] {
            let inputs = attrs(&[("name", Value::from(name))]);
            assert!(backend.apply(ResourceKind::Bucket, &inputs).is_err(), "{name}");
        }
    }

    #[test]
    fn test_generated_name_is_deterministic() {
        let inputs = attrs(&[("description", Value::from("exec role"))]);
        let a = generated_name(ResourceKind::Role, &inputs);
        let b = generated_name(ResourceKind::Role, &inputs);
        assert_eq!(a, b);
        assert!(a.starts_with("role-"));
        assert_eq!(a.len(), "role-".len() + 8);
        assert_ne!(a, generated_name(ResourceKind::LogGroup, &inputs));
        assert!(generated_name(ResourceKind::LogGroup, &inputs).starts_with("log-group-"));
    }

    #[test]
    fn test_update_keeps_assigned_name() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        let first = backend
            .apply(ResourceKind::Role, &attrs(&[("description", Value::from("a"))]))
            .unwrap();

        let mut update = first.clone();
        update.insert("description".into(), Value::from("b"));
        let second = backend.apply(ResourceKind::Role, &update).unwrap();
        assert_eq!(first["id"], second["id"]);
    }

    #[test]
    fn test_function_requires_role_and_bumps_version() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());

        let err = backend
            .apply(ResourceKind::Function, &attrs(&[("name", Value::from("fn"))]))
            .unwrap_err();
        assert!(err.message.contains("role"));

        let mut inputs = attrs(&[
            ("name", Value::from("fn")),
            ("role", Value::from("arn:local:role:::exec")),
        ]);
        let outputs = backend.apply(ResourceKind::Function, &inputs).unwrap();
        assert_eq!(outputs["version"], Value::from(1_i64));

        inputs.extend(outputs);
        let outputs = backend.apply(ResourceKind::Function, &inputs).unwrap();
        assert_eq!(outputs["version"], Value::from(2_i64));
    }

    #[test]
    fn test_policy_requires_statements() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        let role = ("role", Value::from("exec"));

        assert!(backend
            .apply(ResourceKind::Policy, &attrs(&[role.clone()]))
            .is_err());

        let outputs = backend
            .apply(
                ResourceKind::Policy,
                &attrs(&[role, ("statements", Value::List(vec![Value::from("s3:PutObject")]))]),
            )
            .unwrap();
        assert_eq!(outputs["attached_to"], Value::from("exec"));
    }

    #[test]
    fn test_log_group_retention() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        let bad = attrs(&[("retention_days", Value::from(0_i64))]);
        assert!(backend.apply(ResourceKind::LogGroup, &bad).is_err());
        let good = attrs(&[("retention_days", Value::from(14_i64))]);
        assert!(backend.apply(ResourceKind::LogGroup, &good).is_ok());
    }
}
