//! Brand briefs - company identity documents used to keep content on-brand

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::error::{Error, Result, ToolError};
use crate::tools::{str_arg, BoxFuture, Tool};

const DEFAULT_BRIEFS: &str = include_str!("../../assets/brand_briefs.json");

/// Fields every saved brief must carry
pub const REQUIRED_FIELDS: &[&str] = &[
    "company_name",
    "tagline",
    "mission",
    "values",
    "tone_of_voice",
    "target_audience",
    "unique_selling_proposition",
];

/// Name and company of a stored brief
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BriefSummary {
    pub name: String,
    pub company_name: String,
}

/// Shared in-memory collection of brand briefs, keyed by name
#[derive(Default)]
pub struct BrandBriefStore {
    briefs: RwLock<BTreeMap<String, Value>>,
}

impl BrandBriefStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the bundled example briefs
    pub fn with_defaults() -> Self {
        let store = Self::new();
        match serde_json::from_str::<BTreeMap<String, Value>>(DEFAULT_BRIEFS) {
            Ok(defaults) => *store.briefs.write() = defaults,
            Err(e) => error!(error = %e, "Bundled brand briefs are malformed"),
        }
        store
    }

    /// Load every `*.json` file in `dir` that looks like a brief
    ///
    /// The file stem becomes the brief name. Returns how many were loaded.
    pub fn load_dir(&self, dir: &Path) -> Result<usize> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable brief");
                    continue;
                }
            };
            match serde_json::from_str::<Value>(&content) {
                Ok(brief) if brief.get("company_name").is_some() => {
                    self.briefs.write().insert(name.to_string(), brief);
                    loaded += 1;
                }
                Ok(_) => debug!(path = %path.display(), "Skipping JSON without company_name"),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping invalid brief"),
            }
        }
        Ok(loaded)
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.briefs.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.briefs.read().contains_key(name)
    }

    /// Brief names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.briefs.read().keys().cloned().collect()
    }

    pub fn summaries(&self) -> Vec<BriefSummary> {
        self.briefs
            .read()
            .iter()
            .map(|(name, brief)| BriefSummary {
                name: name.clone(),
                company_name: brief
                    .get("company_name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect()
    }

    /// Validate and store a brief; returns the name it was saved under
    pub fn save(&self, name: Option<&str>, brief: Value) -> Result<String> {
        let missing = missing_fields(&brief);
        if !missing.is_empty() {
            return Err(Error::Tool(ToolError::InvalidParams(format!(
                "The following required fields are missing: {}",
                missing.join(", ")
            ))));
        }

        let name = match name.filter(|n| !n.trim().is_empty()) {
            Some(name) => name.to_string(),
            None => {
                let id = uuid::Uuid::new_v4().simple().to_string();
                format!("brief_{}", &id[..8])
            }
        };
        self.briefs.write().insert(name.clone(), brief);
        Ok(name)
    }

    pub fn delete(&self, name: &str) -> bool {
        self.briefs.write().remove(name).is_some()
    }
}

fn missing_fields(brief: &Value) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| brief.get(field).is_none())
        .collect()
}

/// Tool exposing save/get/list/delete over the brief store
pub struct BrandBriefTool {
    store: std::sync::Arc<BrandBriefStore>,
}

impl BrandBriefTool {
    pub fn new(store: std::sync::Arc<BrandBriefStore>) -> Self {
        Self { store }
    }

    fn save(&self, name: Option<&str>, content: Option<&Value>) -> String {
        let brief = match content {
            Some(Value::Object(_)) => content.cloned(),
            // Models sometimes send the document as a JSON string
            Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).ok().filter(Value::is_object),
            _ => None,
        };
        let Some(brief) = brief else {
            return "Error: No content provided for the brand brief.".to_string();
        };

        match self.store.save(name, brief) {
            Ok(name) => format!("Brand brief '{}' saved successfully.", name),
            Err(Error::Tool(ToolError::InvalidParams(msg))) => format!(
                "Error: {}. Suggested structure: {}",
                msg,
                suggested_structure()
            ),
            Err(e) => format!("Error: {}", e),
        }
    }

    fn get(&self, name: Option<&str>) -> String {
        let Some(name) = name else {
            return "Error: No brief name provided.".to_string();
        };
        match self.store.get(name) {
            Some(brief) => serde_json::to_string_pretty(&brief)
                .unwrap_or_else(|e| format!("Error: Could not encode brief '{}': {}", name, e)),
            None => format!("Error: Brand brief '{}' not found.", name),
        }
    }

    fn list(&self) -> String {
        let names = self.store.names();
        if names.is_empty() {
            return "No brand briefs found.".to_string();
        }
        let lines: Vec<String> = names.iter().map(|n| format!("- {}", n)).collect();
        format!("Available brand briefs:\n{}", lines.join("\n"))
    }

    fn delete(&self, name: Option<&str>) -> String {
        let Some(name) = name else {
            return "Error: No brief name provided.".to_string();
        };
        if self.store.delete(name) {
            format!("Brand brief '{}' deleted successfully.", name)
        } else {
            format!("Error: Brand brief '{}' not found.", name)
        }
    }
}

fn suggested_structure() -> Value {
    json!({
        "company_name": "Your company name",
        "tagline": "Your tagline or slogan",
        "mission": "Your company mission statement",
        "values": ["Value 1", "Value 2", "Value 3"],
        "tone_of_voice": ["Professional", "Friendly", "Authoritative"],
        "target_audience": [
            {"name": "Persona 1", "description": "Description of persona 1"}
        ],
        "unique_selling_proposition": "What makes your company unique"
    })
}

impl Tool for BrandBriefTool {
    fn name(&self) -> &str {
        "brand_brief"
    }

    fn description(&self) -> &str {
        "Save, retrieve, list, or delete company brand briefs. A brand brief holds a company's \
         identity, tone of voice, target audience and value proposition, and is needed to \
         generate on-brand content."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["save", "get", "list", "delete"],
                    "description": "Operation to perform"
                },
                "brief_name": {
                    "type": "string",
                    "description": "Name of the brand brief"
                },
                "content": {
                    "type": "object",
                    "description": "Brief document when operation is 'save'"
                }
            },
            "required": ["operation"]
        })
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, std::result::Result<String, ToolError>> {
        Box::pin(async move {
            let name = str_arg(&params, "brief_name");
            let result = match str_arg(&params, "operation").unwrap_or_default() {
                "save" => self.save(name, params.get("content")),
                "get" => self.get(name),
                "list" => self.list(),
                "delete" => self.delete(name),
                other => format!(
                    "Error: Invalid operation: {}. Supported operations are 'save', 'get', 'list', or 'delete'.",
                    other
                ),
            };
            Ok(result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn complete_brief() -> Value {
        json!({
            "company_name": "Acme",
            "tagline": "We make things",
            "mission": "Make things",
            "values": ["Quality"],
            "tone_of_voice": ["Friendly"],
            "target_audience": [{"name": "Makers", "description": "People who make"}],
            "unique_selling_proposition": "Things, made"
        })
    }

    #[test]
    fn test_defaults_are_seeded() {
        let store = BrandBriefStore::with_defaults();
        assert_eq!(store.names(), vec!["mai_phu_hung_brief", "tony_tech_insights_brief"]);
        let summaries = store.summaries();
        assert_eq!(summaries[1].company_name, "Tony Tech Insights");
    }

    #[tokio::test]
    async fn test_save_get_list_delete() {
        let store = Arc::new(BrandBriefStore::new());
        let tool = BrandBriefTool::new(store.clone());

        let saved = tool
            .execute(json!({"operation": "save", "brief_name": "acme", "content": complete_brief()}))
            .await
            .unwrap();
        assert_eq!(saved, "Brand brief 'acme' saved successfully.");

        let fetched = tool.execute(json!({"operation": "get", "brief_name": "acme"})).await.unwrap();
        assert!(fetched.contains("\"company_name\": \"Acme\""));

        let listed = tool.execute(json!({"operation": "list"})).await.unwrap();
        assert_eq!(listed, "Available brand briefs:\n- acme");

        let deleted = tool.execute(json!({"operation": "delete", "brief_name": "acme"})).await.unwrap();
        assert_eq!(deleted, "Brand brief 'acme' deleted successfully.");
        assert!(!store.contains("acme"));
    }

    #[tokio::test]
    async fn test_save_without_name_generates_one() {
        let store = Arc::new(BrandBriefStore::new());
        let tool = BrandBriefTool::new(store.clone());
        let saved = tool
            .execute(json!({"operation": "save", "content": complete_brief()}))
            .await
            .unwrap();
        let names = store.names();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("brief_"));
        assert_eq!(names[0].len(), "brief_".len() + 8);
        assert!(saved.contains(&names[0]));
    }

    #[tokio::test]
    async fn test_missing_fields_are_reported() {
        let tool = BrandBriefTool::new(Arc::new(BrandBriefStore::new()));
        let result = tool
            .execute(json!({"operation": "save", "brief_name": "x", "content": {"company_name": "X"}}))
            .await
            .unwrap();
        assert!(result.starts_with("Error: The following required fields are missing: tagline, mission"));
    }

    #[tokio::test]
    async fn test_invalid_operation_and_unknown_brief() {
        let tool = BrandBriefTool::new(Arc::new(BrandBriefStore::with_defaults()));
        let result = tool.execute(json!({"operation": "rename"})).await.unwrap();
        assert!(result.starts_with("Error: Invalid operation: rename"));

        let result = tool.execute(json!({"operation": "get", "brief_name": "ghost"})).await.unwrap();
        assert_eq!(result, "Error: Brand brief 'ghost' not found.");
    }

    #[test]
    fn test_load_dir_skips_non_briefs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("acme.json"), complete_brief().to_string()).unwrap();
        std::fs::write(dir.path().join("notes.json"), r#"{"title": "not a brief"}"#).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        std::fs::write(dir.path().join("readme.txt"), "hello").unwrap();

        let store = BrandBriefStore::new();
        assert_eq!(store.load_dir(dir.path()).unwrap(), 1);
        assert_eq!(store.names(), vec!["acme"]);
    }
}
