//! JSON-RPC 2.0 method table and request handling.
//!
//! Every request is answered with HTTP 200. Job methods return a task id
//! at once; clients poll `check_task_status`. A notification still runs
//! its method but has no JSON-RPC response, so the body is a generic
//! error object instead.

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use feedlens_core::{Error, JobKind, TaskId, TaskLookup};
use feedlens_jobs::Dispatcher;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const SUBMISSION_FAILED: i64 = -32000;

/// Body sent when a request produced no JSON-RPC response.
pub fn no_response_body() -> Value {
    json!({ "error": "Internal server error" })
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }
}

impl From<Error> for RpcError {
    fn from(e: Error) -> Self {
        RpcError::new(SUBMISSION_FAILED, e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Submit(JobKind),
    Status,
    List,
}

/// One callable name with its positional parameter order.
struct MethodSpec {
    name: &'static str,
    call: Call,
    params: &'static [&'static str],
    required: &'static [&'static str],
}

const SUMMARY_PARAMS: &[&str] = &[
    "titles",
    "types",
    "categories",
    "sentiments",
    "start_date",
    "end_date",
];

static METHODS: &[MethodSpec] = &[
    MethodSpec {
        name: "crawl_comments",
        call: Call::Submit(JobKind::Crawl),
        params: &["app_ids"],
        required: &["app_ids"],
    },
    MethodSpec {
        name: "crawl_comment",
        call: Call::Submit(JobKind::Crawl),
        params: &["app_ids"],
        required: &["app_ids"],
    },
    MethodSpec {
        name: "sentiment_analysis",
        call: Call::Submit(JobKind::Sentiment),
        params: &["app_ids", "limit"],
        required: &[],
    },
    MethodSpec {
        name: "sentiment_analysis_apps",
        call: Call::Submit(JobKind::Sentiment),
        params: &["app_ids"],
        required: &["app_ids"],
    },
    MethodSpec {
        name: "sentiment_analysis_dima",
        call: Call::Submit(JobKind::Sentiment),
        params: &["limit"],
        required: &[],
    },
    MethodSpec {
        name: "ngram_analysis",
        call: Call::Submit(JobKind::Ngram),
        params: &["sentiment", "start_date", "end_date", "top_k"],
        required: &[],
    },
    MethodSpec {
        name: "comment_analysis",
        call: Call::Submit(JobKind::CommentAnalysis),
        params: &["limit"],
        required: &[],
    },
    MethodSpec {
        name: "comment_analysis_dima",
        call: Call::Submit(JobKind::CommentAnalysis),
        params: &["limit"],
        required: &[],
    },
    MethodSpec {
        name: "summarization",
        call: Call::Submit(JobKind::Summarization),
        params: SUMMARY_PARAMS,
        required: SUMMARY_PARAMS,
    },
    MethodSpec {
        name: "summarization_dima",
        call: Call::Submit(JobKind::Summarization),
        params: SUMMARY_PARAMS,
        required: SUMMARY_PARAMS,
    },
    MethodSpec {
        name: "duplicate_detection",
        call: Call::Submit(JobKind::DuplicateDetection),
        params: &[],
        required: &[],
    },
    MethodSpec {
        name: "check_task_status",
        call: Call::Status,
        params: &["task_id"],
        required: &["task_id"],
    },
    MethodSpec {
        name: "list_tasks",
        call: Call::List,
        params: &[],
        required: &[],
    },
];

fn lookup(method: &str) -> Option<&'static MethodSpec> {
    METHODS.iter().find(|m| m.name == method)
}

/// Names of every callable method, aliases included.
pub fn method_names() -> impl Iterator<Item = &'static str> {
    METHODS.iter().map(|m| m.name)
}

/// Turn positional or named params into a name → value map.
///
/// Null values are dropped so they behave like omitted arguments.
fn bind_params(spec: &MethodSpec, params: Option<Value>) -> Result<Map<String, Value>, RpcError> {
    let mut bound = Map::new();
    match params {
        None | Some(Value::Null) => {}
        Some(Value::Array(values)) => {
            if values.len() > spec.params.len() {
                return Err(RpcError::invalid_params(format!(
                    "{} takes at most {} positional params, got {}",
                    spec.name,
                    spec.params.len(),
                    values.len()
                )));
            }
            for (name, value) in spec.params.iter().zip(values) {
                bound.insert((*name).to_string(), value);
            }
        }
        Some(Value::Object(map)) => {
            if let Some(unknown) = map.keys().find(|k| !spec.params.contains(&k.as_str())) {
                return Err(RpcError::invalid_params(format!(
                    "unexpected param '{unknown}' for {}",
                    spec.name
                )));
            }
            bound = map;
        }
        Some(_) => return Err(RpcError::new(INVALID_REQUEST, "Invalid Request")),
    }

    bound.retain(|_, v| !v.is_null());
    if let Some(missing) = spec.required.iter().find(|r| !bound.contains_key(**r)) {
        return Err(RpcError::invalid_params(format!(
            "missing required param '{missing}' for {}",
            spec.name
        )));
    }
    Ok(bound)
}

fn call(dispatcher: &Dispatcher, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
    let spec = lookup(method).ok_or_else(|| RpcError::new(METHOD_NOT_FOUND, "Method not found"))?;
    let args = bind_params(spec, params)?;

    match spec.call {
        Call::Submit(kind) => {
            let task_id = dispatcher.submit(kind, Value::Object(args))?;
            info!(method, task_id = %task_id, job_kind = kind.as_str(), "Job submitted");
            Ok(json!({
                "task_id": task_id,
                "message": format!("Task started: {}", kind.description()),
            }))
        }
        Call::Status => {
            let found = args
                .get("task_id")
                .cloned()
                .and_then(|v| serde_json::from_value::<TaskId>(v).ok())
                .map(|id| dispatcher.status(id))
                .unwrap_or(TaskLookup::NotFound);
            serde_json::to_value(found).map_err(|e| RpcError::from(Error::from(e)))
        }
        Call::List => {
            serde_json::to_value(dispatcher.list()).map_err(|e| RpcError::from(Error::from(e)))
        }
    }
}

fn response(id: Value, outcome: Result<Value, RpcError>) -> Value {
    match outcome {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err(error) => json!({ "jsonrpc": "2.0", "id": id, "error": error }),
    }
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    response(id, Err(RpcError::new(code, message)))
}

/// Handle one request object. `None` for a notification.
fn handle_single(dispatcher: &Dispatcher, request: Value) -> Option<Value> {
    let Value::Object(mut obj) = request else {
        return Some(error_response(Value::Null, INVALID_REQUEST, "Invalid Request"));
    };

    let id = obj.remove("id");
    let id_valid = matches!(
        id,
        None | Some(Value::Null) | Some(Value::String(_)) | Some(Value::Number(_))
    );
    let version_ok = obj.get("jsonrpc").and_then(Value::as_str) == Some("2.0");
    let method = obj.remove("method");

    let (Some(Value::String(method)), true, true) = (method, version_ok, id_valid) else {
        return Some(error_response(
            id.filter(|_| id_valid).unwrap_or(Value::Null),
            INVALID_REQUEST,
            "Invalid Request",
        ));
    };

    let outcome = call(dispatcher, &method, obj.remove("params"));
    if let Err(e) = &outcome {
        warn!(method = %method, code = e.code, error = %e.message, "RPC call failed");
    }

    match id {
        Some(id) => Some(response(id, outcome)),
        None => {
            debug!(method = %method, "Notification handled without response");
            None
        }
    }
}

/// Handle a raw request body and produce the response body.
pub fn handle(dispatcher: &Dispatcher, body: &[u8]) -> Value {
    let request: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "Unparseable RPC body");
            return error_response(Value::Null, PARSE_ERROR, "Parse error");
        }
    };

    match request {
        Value::Array(batch) if batch.is_empty() => {
            error_response(Value::Null, INVALID_REQUEST, "Invalid Request")
        }
        Value::Array(batch) => {
            let responses: Vec<Value> = batch
                .into_iter()
                .filter_map(|r| handle_single(dispatcher, r))
                .collect();
            if responses.is_empty() {
                no_response_body()
            } else {
                Value::Array(responses)
            }
        }
        single => handle_single(dispatcher, single).unwrap_or_else(no_response_body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedlens_jobs::{DispatcherBuilder, NoOpHandler};

    fn dispatcher() -> Dispatcher {
        let mut builder = DispatcherBuilder::new();
        for kind in JobKind::ALL {
            builder = builder.with_handler(NoOpHandler::new(kind));
        }
        builder.build()
    }

    fn rpc(d: &Dispatcher, body: Value) -> Value {
        handle(d, body.to_string().as_bytes())
    }

    #[test]
    fn test_aliases_resolve_to_same_kind() {
        for (alias, kind) in [
            ("crawl_comment", JobKind::Crawl),
            ("sentiment_analysis_apps", JobKind::Sentiment),
            ("sentiment_analysis_dima", JobKind::Sentiment),
            ("comment_analysis_dima", JobKind::CommentAnalysis),
            ("summarization_dima", JobKind::Summarization),
        ] {
            assert_eq!(lookup(alias).unwrap().call, Call::Submit(kind));
        }
        assert!(lookup("check_add_url").is_none());
    }

    #[test]
    fn test_positional_binding_uses_method_order() {
        let spec = lookup("ngram_analysis").unwrap();
        let bound = bind_params(spec, Some(json!(["negative", "2025-01-01", null, 10]))).unwrap();
        assert_eq!(bound["sentiment"], "negative");
        assert_eq!(bound["top_k"], 10);
        assert!(!bound.contains_key("end_date"));

        let err = bind_params(spec, Some(json!([1, 2, 3, 4, 5]))).unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);
    }

    #[test]
    fn test_named_binding_rejects_unknown_and_missing() {
        let spec = lookup("crawl_comments").unwrap();
        assert_eq!(
            bind_params(spec, Some(json!({"app_id": [1]}))).unwrap_err().code,
            INVALID_PARAMS
        );
        assert_eq!(bind_params(spec, None).unwrap_err().code, INVALID_PARAMS);
        assert_eq!(
            bind_params(spec, Some(json!("x"))).unwrap_err().code,
            INVALID_REQUEST
        );
    }

    #[tokio::test]
    async fn test_error_codes() {
        let d = dispatcher();
        assert_eq!(handle(&d, b"{not json")["error"]["code"], PARSE_ERROR);
        assert_eq!(
            rpc(&d, json!({"jsonrpc": "1.0", "method": "list_tasks", "id": 1}))["error"]["code"],
            INVALID_REQUEST
        );
        assert_eq!(
            rpc(&d, json!({"jsonrpc": "2.0", "method": "nope", "id": 1}))["error"]["code"],
            METHOD_NOT_FOUND
        );
        assert_eq!(
            rpc(&d, json!({"jsonrpc": "2.0", "method": "summarization", "params": {}, "id": 1}))
                ["error"]["code"],
            INVALID_PARAMS
        );
        assert_eq!(rpc(&d, json!([]))["error"]["code"], INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_submission_failure_code() {
        let d = DispatcherBuilder::new()
            .with_handler(NoOpHandler::new(JobKind::Ngram))
            .build();
        let resp = rpc(&d, json!({"jsonrpc": "2.0", "method": "comment_analysis", "id": "a"}));
        assert_eq!(resp["id"], "a");
        assert_eq!(resp["error"]["code"], SUBMISSION_FAILED);
        assert!(d.list().is_empty());
    }

    #[tokio::test]
    async fn test_submit_then_poll() {
        let d = dispatcher();
        let resp = rpc(
            &d,
            json!({"jsonrpc": "2.0", "method": "ngram_analysis", "params": {"top_k": 5}, "id": 7}),
        );
        assert_eq!(resp["id"], 7);
        let task_id = resp["result"]["task_id"].as_str().unwrap().to_string();
        assert_eq!(task_id, "1");
        assert_eq!(resp["result"]["message"], "Task started: N-gram analysis");

        d.wait(TaskId(1)).await.unwrap();
        let status = rpc(
            &d,
            json!({"jsonrpc": "2.0", "method": "check_task_status", "params": [task_id], "id": 8}),
        );
        assert_eq!(status["result"]["status"], "completed");
        assert_eq!(status["result"]["description"], "N-gram analysis");
        assert!(status["result"]["error"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_task_payload() {
        let d = dispatcher();
        for task_id in [json!("999"), json!(999), json!("abc")] {
            let resp = rpc(
                &d,
                json!({"jsonrpc": "2.0", "method": "check_task_status", "params": {"task_id": task_id}, "id": 1}),
            );
            assert_eq!(
                resp["result"],
                json!({"status": "error", "message": "Task ID not found"})
            );
        }
    }

    #[tokio::test]
    async fn test_notification_runs_but_has_generic_body() {
        let d = dispatcher();
        let resp = rpc(&d, json!({"jsonrpc": "2.0", "method": "duplicate_detection"}));
        assert_eq!(resp, no_response_body());
        assert_eq!(d.list().len(), 1);
    }

    #[tokio::test]
    async fn test_batch_skips_notifications() {
        let d = dispatcher();
        let resp = rpc(
            &d,
            json!([
                {"jsonrpc": "2.0", "method": "list_tasks", "id": 1},
                {"jsonrpc": "2.0", "method": "duplicate_detection"},
                {"jsonrpc": "2.0", "method": "missing", "id": 2},
            ]),
        );
        let items = resp.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["error"]["code"], METHOD_NOT_FOUND);
    }
}
