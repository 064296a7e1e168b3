//! Tool system for the Brandpilot agent
//!
//! Tools are the actions the model can request. Each tool has:
//! - A name and description for the LLM
//! - A JSON schema for parameters
//! - An execute method producing text
//!
//! The registry runs a tool by name under a timeout and always returns
//! text. Failures come back as strings beginning with `Error:`.

pub mod brand_brief;
pub mod code_gen;
pub mod content_database;
pub mod content_generator;
pub mod web_search;

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ToolError;

pub use brand_brief::{BrandBriefStore, BrandBriefTool};
pub use code_gen::GenerateCode;
pub use content_database::{ContentDatabase, ContentDatabaseTool};
pub use content_generator::ContentGenerator;
pub use web_search::WebSearch;

/// Boxed future type for object-safe async trait methods
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Prefix marking a tool result as a failure
pub const ERROR_PREFIX: &str = "Error:";

/// Default per-call tool budget
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(20);

/// Whether a tool result reports failure
pub fn is_error_result(result: &str) -> bool {
    result.starts_with(ERROR_PREFIX)
}

/// Tool definition for LLM consumption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Core trait for all tools
pub trait Tool: Send + Sync {
    /// Tool name (used by LLM to invoke)
    fn name(&self) -> &str;

    /// Description of what the tool does
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with an object of named arguments
    fn execute(&self, params: Value) -> BoxFuture<'_, Result<String, ToolError>>;

    /// Convert to tool definition for LLM
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// The fixed tool catalog
pub enum BuiltinTool {
    WebSearch(WebSearch),
    GenerateCode(GenerateCode),
    BrandBrief(BrandBriefTool),
    ContentGenerator(ContentGenerator),
    ContentDatabase(ContentDatabaseTool),
}

impl BuiltinTool {
    /// One instance of every built-in tool, sharing the given data stores
    pub fn catalog(briefs: Arc<BrandBriefStore>, database: Arc<ContentDatabase>) -> Vec<BuiltinTool> {
        vec![
            BuiltinTool::WebSearch(WebSearch),
            BuiltinTool::GenerateCode(GenerateCode),
            BuiltinTool::BrandBrief(BrandBriefTool::new(briefs.clone())),
            BuiltinTool::ContentGenerator(ContentGenerator::new(briefs)),
            BuiltinTool::ContentDatabase(ContentDatabaseTool::new(database)),
        ]
    }

    fn inner(&self) -> &dyn Tool {
        match self {
            BuiltinTool::WebSearch(t) => t,
            BuiltinTool::GenerateCode(t) => t,
            BuiltinTool::BrandBrief(t) => t,
            BuiltinTool::ContentGenerator(t) => t,
            BuiltinTool::ContentDatabase(t) => t,
        }
    }
}

impl Tool for BuiltinTool {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn description(&self) -> &str {
        self.inner().description()
    }

    fn parameters_schema(&self) -> Value {
        self.inner().parameters_schema()
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, Result<String, ToolError>> {
        match self {
            BuiltinTool::WebSearch(t) => t.execute(params),
            BuiltinTool::GenerateCode(t) => t.execute(params),
            BuiltinTool::BrandBrief(t) => t.execute(params),
            BuiltinTool::ContentGenerator(t) => t.execute(params),
            BuiltinTool::ContentDatabase(t) => t.execute(params),
        }
    }
}

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the full built-in catalog
    pub fn standard(briefs: Arc<BrandBriefStore>, database: Arc<ContentDatabase>) -> Self {
        let mut registry = Self::new();
        for tool in BuiltinTool::catalog(briefs, database) {
            registry.register(Arc::new(tool));
        }
        registry
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Definitions of all tools, ordered by name
    pub fn list(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<_> = self.tools.values().map(|t| t.to_definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool by name and return its text result
    ///
    /// Never fails: unknown names, tool errors, panics and timeouts all
    /// become `Error:` strings.
    pub async fn run(&self, name: &str, args: Map<String, Value>, timeout: Duration) -> String {
        match self.try_run(name, args, timeout).await {
            Ok(text) => text,
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool call failed");
                failure_text(name, &e)
            }
        }
    }

    /// Run a tool by name under `timeout`, classifying every failure
    pub async fn try_run(
        &self,
        name: &str,
        args: Map<String, Value>,
        timeout: Duration,
    ) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        debug!(tool = %name, args = %serde_json::Value::Object(args.clone()), "Running tool");
        let execution = AssertUnwindSafe(tool.execute(Value::Object(args))).catch_unwind();

        match tokio::time::timeout(timeout, execution).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ToolError::ExecutionFailed("unexpected panic".to_string())),
            Err(_) => Err(ToolError::Timeout(timeout.as_secs())),
        }
    }
}

/// Text handed back to the model in place of a tool result
fn failure_text(name: &str, error: &ToolError) -> String {
    match error {
        ToolError::NotFound(_) => format!("Error: Tool '{}' not found.", name),
        ToolError::Timeout(_) => format!(
            "Error: Tool '{}' timed out. The agent will try to continue without using this tool.",
            name
        ),
        other => format!(
            "Error: Tool '{}' failed with error: {}. The agent will continue processing your request.",
            name, other
        ),
    }
}

/// Read an optional string argument
pub(crate) fn str_arg<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

/// Read a required string argument
pub(crate) fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    str_arg(params, key).ok_or_else(|| ToolError::InvalidParams(format!("missing required parameter '{}'", key)))
}

/// Helper macro for creating tool parameter schemas
#[macro_export]
macro_rules! tool_params {
    ($($field:ident : $type:expr => $desc:expr),* $(,)?) => {
        serde_json::json!({
            "type": "object",
            "properties": {
                $( stringify!($field): { "type": $type, "description": $desc } ),*
            },
            "required": [ $( stringify!($field) ),* ]
        })
    };
}
