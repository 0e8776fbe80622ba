//! Function handler: records each invocation event as a JSON object in the
//! function's bucket.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Environment variable naming the target bucket
pub const BUCKET_ENV: &str = "BUCKET_NAME";

/// Prefix for execution record keys
pub const KEY_PREFIX: &str = "executions";

const CONTENT_TYPE: &str = "application/json";

/// Errors from writing to an event sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("bucket `{0}` does not exist")]
    NoSuchBucket(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Object storage write side of the handler
pub trait EventSink {
    fn put(
        &self,
        bucket: &str,
        key: &str,
        payload: &[u8],
        content_type: &str,
    ) -> Result<(), SinkError>;
}

/// Sink writing objects to `<root>/<bucket>/<key>`
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl EventSink for DirectorySink {
    fn put(
        &self,
        bucket: &str,
        key: &str,
        payload: &[u8],
        content_type: &str,
    ) -> Result<(), SinkError> {
        let bucket_dir = self.root.join(bucket);
        if !bucket_dir.is_dir() {
            return Err(SinkError::NoSuchBucket(bucket.to_string()));
        }

        let path = bucket_dir.join(key);
        let io_err = |source: std::io::Error| SinkError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&path, payload).map_err(io_err)?;

        log::debug!("Stored {} ({content_type}, {} bytes)", path.display(), payload.len());
        Ok(())
    }
}

#[derive(Debug, Error)]
enum HandlerError {
    #[error("BUCKET_NAME environment variable not set")]
    MissingBucket,

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Response returned to the invoker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HandlerResponse {
    fn new(status_code: u16, body: String) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), CONTENT_TYPE.to_string());
        Self {
            status_code,
            headers,
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Object key for an invocation at `now`
pub fn record_key(now: DateTime<Utc>) -> String {
    format!("{KEY_PREFIX}/{}.json", now.format("%Y-%m-%d/%H-%M-%S"))
}

/// Handle one invocation
///
/// Never fails: problems are reported as a 500 response with an `error` body.
pub fn handle(
    event: &serde_json::Value,
    env: &BTreeMap<String, String>,
    sink: &dyn EventSink,
    now: DateTime<Utc>,
) -> HandlerResponse {
    match record_event(event, env, sink, now) {
        Ok(body) => HandlerResponse::new(200, body),
        Err(e) => {
            let message = format!("Error: {e}");
            log::error!("{message}");
            HandlerResponse::new(500, json!({ "error": message }).to_string())
        }
    }
}

fn record_event(
    event: &serde_json::Value,
    env: &BTreeMap<String, String>,
    sink: &dyn EventSink,
    now: DateTime<Utc>,
) -> Result<String, HandlerError> {
    let bucket = env
        .get(BUCKET_ENV)
        .filter(|b| !b.is_empty())
        .ok_or(HandlerError::MissingBucket)?;

    let data = json!({
        "message": "Hello from strata!",
        "timestamp": now.to_rfc3339(),
        "event": event,
        "bucket": bucket,
    });

    let key = record_key(now);
    let payload = serde_json::to_vec_pretty(&data)?;
    sink.put(bucket, &key, &payload, CONTENT_TYPE)?;

    let location = format!("{bucket}/{key}");
    log::info!("Successfully wrote data to {location}");

    Ok(serde_json::to_string_pretty(&json!({
        "message": "Success!",
        "data": data,
        "location": location,
    }))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySink {
        objects: Mutex<Vec<(String, String, Vec<u8>)>>,
        fail: bool,
    }

    impl EventSink for MemorySink {
        fn put(
            &self,
            bucket: &str,
            key: &str,
            payload: &[u8],
            _content_type: &str,
        ) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::NoSuchBucket(bucket.to_string()));
            }
            self.objects
                .lock()
                .unwrap()
                .push((bucket.into(), key.into(), payload.to_vec()));
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
    }

    fn env(bucket: &str) -> BTreeMap<String, String> {
        BTreeMap::from([(BUCKET_ENV.to_string(), bucket.to_string())])
    }

    #[test]
    fn test_record_key() {
        assert_eq!(record_key(now()), "executions/2026-03-14/09-26-53.json");
    }

    #[test]
    fn test_success_writes_record() {
        let sink = MemorySink::default();
        let event = json!({ "source": "test" });
        let response = handle(&event, &env("records"), &sink, now());

        assert_eq!(response.status_code, 200);
        assert!(response.is_success());
        assert_eq!(response.headers["Content-Type"], "application/json");

        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["message"], "Success!");
        assert_eq!(
            body["location"],
            "records/executions/2026-03-14/09-26-53.json"
        );
        assert_eq!(body["data"]["event"], event);
        assert_eq!(body["data"]["bucket"], "records");

        let objects = sink.objects.lock().unwrap();
        assert_eq!(objects.len(), 1);
        let (bucket, key, payload) = &objects[0];
        assert_eq!(bucket, "records");
        assert_eq!(key, "executions/2026-03-14/09-26-53.json");
        let record: serde_json::Value = serde_json::from_slice(payload).unwrap();
        assert_eq!(record["timestamp"], "2026-03-14T09:26:53+00:00");
        assert_eq!(record["message"], "Hello from strata!");
    }

    #[test]
    fn test_missing_bucket_env() {
        let sink = MemorySink::default();
        let response = handle(&json!({}), &BTreeMap::new(), &sink, now());

        assert_eq!(response.status_code, 500);
        assert_eq!(response.headers["Content-Type"], "application/json");
        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(
            body["error"],
            "Error: BUCKET_NAME environment variable not set"
        );
        assert!(sink.objects.lock().unwrap().is_empty());
    }

    #[test]
    fn test_sink_failure_is_500() {
        let sink = MemorySink {
            fail: true,
            ..Default::default()
        };
        let response = handle(&json!({}), &env("records"), &sink, now());
        assert_eq!(response.status_code, 500);
        assert!(response.body.contains("bucket `records` does not exist"));
    }

    #[test]
    fn test_directory_sink() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path());

        let missing = sink.put("records", "a/b.json", b"{}", CONTENT_TYPE);
        assert!(matches!(missing, Err(SinkError::NoSuchBucket(_))));

        fs::create_dir(dir.path().join("records")).unwrap();
        let response = handle(&json!({ "n": 1 }), &env("records"), &sink, now());
        assert_eq!(response.status_code, 200);

        let written = dir
            .path()
            .join("records/executions/2026-03-14/09-26-53.json");
        let record: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(written).unwrap()).unwrap();
        assert_eq!(record["event"]["n"], 1);
    }
}
