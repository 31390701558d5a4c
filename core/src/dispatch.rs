//! Executes one requested tool call against the registry.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::registry::Registry;
use crate::service::{ToolCallRequest, ToolCallResult};

/// Arguments after parsing the model's JSON text.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArguments {
    Parsed(Value),
    /// The text was not valid JSON; the call proceeds with `{}`.
    Malformed { raw: String, error: String },
}

impl ToolArguments {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(value) => ToolArguments::Parsed(value),
            Err(e) => ToolArguments::Malformed { raw: raw.to_string(), error: e.to_string() },
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, ToolArguments::Malformed { .. })
    }

    pub fn into_value(self) -> Value {
        match self {
            ToolArguments::Parsed(value) => value,
            ToolArguments::Malformed { .. } => Value::Object(Map::new()),
        }
    }
}

/// What happened to a single call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Output(ToolCallResult),
    /// No registered function has that name; nothing is submitted for it.
    Skipped { call_id: String, function_name: String },
}

pub async fn dispatch(request: &ToolCallRequest, registry: &Registry) -> Result<Dispatch, ToolError> {
    let name = &request.function_name;

    let args = ToolArguments::parse(&request.raw_arguments);
    if let ToolArguments::Malformed { raw, error } = &args {
        warn!(call_id = %request.call_id, tool = %name, input = %raw, "JSON decoding failed: {}", error);
    }

    let Some(tool) = registry.resolve(name) else {
        warn!(call_id = %request.call_id, tool = %name, "Function not found in registry, skipping call");
        return Ok(Dispatch::Skipped {
            call_id: request.call_id.clone(),
            function_name: name.clone(),
        });
    };

    debug!(call_id = %request.call_id, tool = %name, "Invoking tool");
    let value = tool
        .call(args.into_value())
        .await
        .map_err(|source| ToolError::Execution { name: name.clone(), source })?;

    let output = serde_json::to_string(&value)
        .map_err(|source| ToolError::Serialization { name: name.clone(), source })?;

    Ok(Dispatch::Output(ToolCallResult { call_id: request.call_id.clone(), output }))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::registry::{Tool, ToolUnit};

    #[derive(Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<Value>>>,
    }

    #[async_trait]
    impl Tool for Recorder {
        fn name(&self) -> &str {
            "record"
        }

        async fn call(&self, args: Value) -> Result<Value> {
            self.seen.lock().unwrap().push(args.clone());
            Ok(json!({ "status": "completed", "echo": args }))
        }
    }

    struct Broken;

    #[async_trait]
    impl Tool for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn call(&self, _args: Value) -> Result<Value> {
            bail!("webhook down")
        }
    }

    fn request(name: &str, args: &str) -> ToolCallRequest {
        ToolCallRequest {
            call_id: "call_1".to_string(),
            function_name: name.to_string(),
            raw_arguments: args.to_string(),
        }
    }

    fn registry(seen: Arc<Mutex<Vec<Value>>>) -> Registry {
        Registry::load([
            ToolUnit::new().with_function(Recorder { seen }),
            ToolUnit::new().with_function(Broken),
        ])
        .unwrap()
    }

    #[test]
    fn malformed_arguments_are_tagged() {
        let args = ToolArguments::parse("{\"name\": ");
        assert!(args.is_malformed());
        assert_eq!(args.into_value(), json!({}));

        let args = ToolArguments::parse(r#"{"name":"Ana"}"#);
        assert_eq!(args, ToolArguments::Parsed(json!({"name": "Ana"})));
    }

    #[tokio::test]
    async fn serializes_tool_output_with_call_id() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let out = dispatch(&request("record", r#"{"a":1}"#), &registry(seen.clone()))
            .await
            .unwrap();

        let Dispatch::Output(result) = out else { panic!("expected output, got {out:?}") };
        assert_eq!(result.call_id, "call_1");
        let output: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(output, json!({"status": "completed", "echo": {"a": 1}}));
        assert_eq!(*seen.lock().unwrap(), vec![json!({"a": 1})]);
    }

    #[tokio::test]
    async fn malformed_arguments_degrade_to_empty_object() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        dispatch(&request("record", "not json"), &registry(seen.clone())).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![json!({})]);
    }

    #[tokio::test]
    async fn unknown_tool_is_skipped() {
        let out = dispatch(&request("missing", "{}"), &registry(Default::default())).await.unwrap();
        assert_eq!(
            out,
            Dispatch::Skipped { call_id: "call_1".to_string(), function_name: "missing".to_string() }
        );
    }

    #[tokio::test]
    async fn tool_failure_is_propagated() {
        let err = dispatch(&request("broken", "{}"), &registry(Default::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Execution { ref name, .. } if name == "broken"));
        assert!(err.to_string().contains("webhook down"));
    }
}
