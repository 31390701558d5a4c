use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RegistryError;

/// A callable the assistant can ask for by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    async fn call(&self, args: Value) -> Result<Value>;
}

// The tool "menu" entry shown to the assistant, in its function envelope:
// { "type": "function", "function": { "name", "description", "parameters" } }
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    #[serde(default)]
    pub description: String,
    // JSON Schema for the arguments: property names, types, required set.
    #[serde(default)]
    pub parameters: Value,
}

fn function_kind() -> String {
    "function".to_string()
}

impl ToolSchema {
    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            kind: function_kind(),
            function: FunctionSchema {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[derive(Debug, Clone)]
enum SchemaSource {
    Parsed(ToolSchema),
    Json(String),
}

/// One tool definition module: an optional schema plus any number of callables.
#[derive(Default, Clone)]
pub struct ToolUnit {
    schema: Option<SchemaSource>,
    functions: Vec<Arc<dyn Tool>>,
}

impl ToolUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: ToolSchema) -> Self {
        self.schema = Some(SchemaSource::Parsed(schema));
        self
    }

    /// Schema given as JSON text; parsed when the registry is loaded.
    pub fn with_schema_json(mut self, json: impl Into<String>) -> Self {
        self.schema = Some(SchemaSource::Json(json.into()));
        self
    }

    pub fn with_function<T>(mut self, tool: T) -> Self
    where
        T: Tool + 'static,
    {
        self.functions.push(Arc::new(tool));
        self
    }
}

/// Name -> callable lookup plus the schemas in discovery order.
/// Immutable once loaded; share it behind an `Arc`.
#[derive(Default)]
pub struct Registry {
    schemas: Vec<ToolSchema>,
    functions: HashMap<String, Arc<dyn Tool>>,
}

impl Registry {
    /// Builds the registry from an explicit list of units.
    pub fn load<I>(units: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = ToolUnit>,
    {
        let mut registry = Registry::default();

        for (index, unit) in units.into_iter().enumerate() {
            // 1. Schema (optional)
            match unit.schema {
                Some(SchemaSource::Parsed(schema)) => registry.schemas.push(schema),
                Some(SchemaSource::Json(text)) => {
                    let schema: ToolSchema = serde_json::from_str(&text)
                        .map_err(|source| RegistryError::MalformedSchema { index, source })?;
                    registry.schemas.push(schema);
                }
                None => tracing::debug!(unit = index, "Tool unit has no schema"),
            }

            // 2. Callables (last one wins on name collision)
            for tool in unit.functions {
                let name = tool.name().to_string();
                if name.is_empty() {
                    return Err(RegistryError::UnnamedFunction { index });
                }
                if registry.functions.insert(name.clone(), tool).is_some() {
                    tracing::warn!(tool = %name, unit = index, "Tool registered twice, keeping the later one");
                }
            }
        }

        Ok(registry)
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.functions.get(name).cloned()
    }

    pub fn schemas(&self) -> &[ToolSchema] {
        &self.schemas
    }

    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
