//! Content database - sample content the agent can reference
//!
//! The database is an index file (`db_index.json`) listing content types,
//! each backed by a JSON array of items. A bundled dataset is used when no
//! directory is configured.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error};

use crate::error::{Error, Result, ToolError};
use crate::tools::{str_arg, BoxFuture, Tool};

const BUNDLED_DATABASE: &str = include_str!("../../assets/content_db.json");

/// Characters kept in `content_preview`
const PREVIEW_CHARS: usize = 250;

#[derive(Debug, Clone, Deserialize)]
struct ContentTypeInfo {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    file_path: Option<String>,
    /// Inline items; when empty they are read from `file_path`
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct DbIndex {
    #[serde(default)]
    content_types: Vec<ContentTypeInfo>,
}

/// Read-only collection of content items grouped by type
#[derive(Debug, Default)]
pub struct ContentDatabase {
    types: Vec<ContentTypeInfo>,
    by_type: HashMap<String, usize>,
}

impl ContentDatabase {
    fn from_index(index: DbIndex) -> Self {
        let by_type = index
            .content_types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.content_type.clone(), i))
            .collect();
        Self {
            types: index.content_types,
            by_type,
        }
    }

    /// The bundled sample dataset
    pub fn builtin() -> Self {
        match serde_json::from_str::<DbIndex>(BUNDLED_DATABASE) {
            Ok(index) => Self::from_index(index),
            Err(e) => {
                error!(error = %e, "Bundled content database is malformed");
                Self::default()
            }
        }
    }

    /// Load `db_index.json` and its content files from `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        let index_path = dir.join("db_index.json");
        let raw = std::fs::read_to_string(&index_path).map_err(|e| {
            Error::Config(format!("Database index not found at {}: {}", index_path.display(), e))
        })?;
        let mut index: DbIndex = serde_json::from_str(&raw)?;

        for info in &mut index.content_types {
            if !info.items.is_empty() {
                continue;
            }
            let Some(file_path) = &info.file_path else {
                continue;
            };
            let path = resolve_content_file(dir, file_path).ok_or_else(|| {
                Error::Config(format!("Content file not found: {}", file_path))
            })?;
            info.items = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
            debug!(content_type = %info.content_type, count = info.items.len(), "Loaded content file");
        }

        Ok(Self::from_index(index))
    }

    pub fn content_types(&self) -> Vec<String> {
        self.types.iter().map(|t| t.content_type.clone()).collect()
    }

    pub fn all(&self, content_type: &str) -> &[Value] {
        self.by_type
            .get(content_type)
            .map(|&i| self.types[i].items.as_slice())
            .unwrap_or(&[])
    }

    pub fn by_id(&self, content_type: &str, id: &str) -> Option<&Value> {
        self.all(content_type)
            .iter()
            .find(|item| item.get("id").and_then(Value::as_str) == Some(id))
    }

    /// Items whose keyword list contains `keyword` (case-insensitive)
    pub fn by_keyword(&self, content_type: &str, keyword: &str) -> Vec<&Value> {
        let keyword = keyword.to_lowercase();
        self.all(content_type)
            .iter()
            .filter(|item| keywords(item).any(|k| k.to_lowercase() == keyword))
            .collect()
    }

    /// Substring search over title, body and keywords
    ///
    /// Only types with at least one match appear in the result.
    pub fn search(&self, query: &str, content_types: Option<&[String]>) -> BTreeMap<String, Vec<&Value>> {
        let query = query.to_lowercase();
        let types = match content_types {
            Some(types) => types.to_vec(),
            None => self.content_types(),
        };

        let mut results = BTreeMap::new();
        for content_type in types {
            let matched: Vec<&Value> = self
                .all(&content_type)
                .iter()
                .filter(|item| item_matches(item, &query))
                .collect();
            if !matched.is_empty() {
                results.insert(content_type, matched);
            }
        }
        results
    }

    /// Up to `count` distinct items chosen at random
    pub fn random(&self, content_type: &str, count: usize) -> Vec<&Value> {
        let mut rng = rand::thread_rng();
        self.all(content_type)
            .choose_multiple(&mut rng, count.max(1))
            .collect()
    }

    pub fn total_items(&self) -> usize {
        self.types.iter().map(|t| t.items.len()).sum()
    }

    pub fn statistics(&self) -> Value {
        let types: Map<String, Value> = self
            .types
            .iter()
            .map(|t| {
                (
                    t.content_type.clone(),
                    json!({"count": t.items.len(), "description": t.description}),
                )
            })
            .collect();
        json!({
            "total_items": self.total_items(),
            "content_types": types,
        })
    }
}

fn resolve_content_file(dir: &Path, file_path: &str) -> Option<PathBuf> {
    let direct = PathBuf::from(file_path);
    let mut candidates = vec![direct.clone(), dir.join(file_path)];
    if let Some(file_name) = direct.file_name() {
        candidates.push(dir.join("content").join(file_name));
    }
    candidates.into_iter().find(|p| p.is_file())
}

fn keywords(item: &Value) -> impl Iterator<Item = &str> {
    item.get("keywords")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

fn item_matches(item: &Value, query: &str) -> bool {
    let field = |name: &str| item.get(name).and_then(Value::as_str);

    if field("title").is_some_and(|t| t.to_lowercase().contains(query)) {
        return true;
    }

    let body = field("content")
        .or_else(|| field("full_description"))
        .or_else(|| field("description"));
    if body.is_some_and(|b| b.to_lowercase().contains(query)) {
        return true;
    }

    keywords(item).any(|k| k.to_lowercase().contains(query))
}

/// Copy of an item with a single-line `content_preview`
fn format_item(item: &Value) -> Value {
    let mut formatted = item.clone();
    if let Some(content) = item.get("content").and_then(Value::as_str) {
        let mut preview: String = content.chars().take(PREVIEW_CHARS).collect::<String>().replace('\n', " ");
        if content.chars().count() > PREVIEW_CHARS {
            preview.push_str("...");
        }
        if let Some(obj) = formatted.as_object_mut() {
            obj.insert("content_preview".to_string(), Value::String(preview));
        }
    }
    formatted
}

fn format_items(items: &[&Value]) -> Vec<Value> {
    items.iter().map(|item| format_item(item)).collect()
}

/// Tool for querying the content database
pub struct ContentDatabaseTool {
    db: Arc<ContentDatabase>,
}

impl ContentDatabaseTool {
    pub fn new(db: Arc<ContentDatabase>) -> Self {
        Self { db }
    }

    fn run(&self, params: &Value) -> std::result::Result<Value, ToolError> {
        let action = str_arg(params, "action")
            .ok_or_else(|| ToolError::InvalidParams("missing required parameter 'action'".into()))?;
        let content_type = str_arg(params, "content_type").filter(|s| !s.is_empty());
        let query = str_arg(params, "query").filter(|s| !s.is_empty());

        match action {
            "search" => {
                let query = query.ok_or_else(|| {
                    ToolError::InvalidParams("Query parameter is required for search action".into())
                })?;
                let scope = content_type.map(|t| vec![t.to_string()]);
                let results = self.db.search(query, scope.as_deref());
                let count: usize = results.values().map(Vec::len).sum();
                let formatted: Map<String, Value> = results
                    .into_iter()
                    .map(|(t, items)| (t, Value::Array(format_items(&items))))
                    .collect();
                Ok(json!({
                    "status": "success",
                    "action": action,
                    "query": query,
                    "results_count": count,
                    "results": formatted,
                }))
            }
            "get_by_id" => {
                let id = str_arg(params, "content_id");
                let (Some(content_type), Some(id)) = (content_type, id) else {
                    return Err(ToolError::InvalidParams(
                        "Content type and content ID are required for get_by_id action".into(),
                    ));
                };
                let item = self.db.by_id(content_type, id).ok_or_else(|| {
                    ToolError::ExecutionFailed(format!(
                        "Item with ID '{}' not found in content type '{}'",
                        id, content_type
                    ))
                })?;
                Ok(json!({
                    "status": "success",
                    "action": action,
                    "content_type": content_type,
                    "content_id": id,
                    "item": format_item(item),
                }))
            }
            "get_by_keyword" => {
                let (Some(content_type), Some(keyword)) = (content_type, query) else {
                    return Err(ToolError::InvalidParams(
                        "Content type and query are required for get_by_keyword action".into(),
                    ));
                };
                let items = self.db.by_keyword(content_type, keyword);
                Ok(json!({
                    "status": "success",
                    "action": action,
                    "content_type": content_type,
                    "keyword": keyword,
                    "results_count": items.len(),
                    "results": format_items(&items),
                }))
            }
            "get_random" => {
                let content_type = content_type.ok_or_else(|| {
                    ToolError::InvalidParams("Content type is required for get_random action".into())
                })?;
                let count = params.get("count").and_then(Value::as_u64).unwrap_or(1) as usize;
                let items = self.db.random(content_type, count);
                if items.is_empty() {
                    return Err(ToolError::ExecutionFailed(format!(
                        "No items found for content type '{}'",
                        content_type
                    )));
                }
                Ok(json!({
                    "status": "success",
                    "action": action,
                    "content_type": content_type,
                    "count": items.len(),
                    "results": format_items(&items),
                }))
            }
            "get_all" => {
                let content_type = content_type.ok_or_else(|| {
                    ToolError::InvalidParams("Content type is required for get_all action".into())
                })?;
                let items: Vec<&Value> = self.db.all(content_type).iter().collect();
                Ok(json!({
                    "status": "success",
                    "action": action,
                    "content_type": content_type,
                    "results_count": items.len(),
                    "results": format_items(&items),
                }))
            }
            "get_stats" => Ok(json!({
                "status": "success",
                "action": action,
                "statistics": self.db.statistics(),
            })),
            other => Err(ToolError::InvalidParams(format!("Unknown action: {}", other))),
        }
    }
}

impl Tool for ContentDatabaseTool {
    fn name(&self) -> &str {
        "content_database"
    }

    fn description(&self) -> &str {
        "Query a database of sample content (blog posts, social posts, product descriptions, \
         email templates) to find examples and inspiration for new content."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["search", "get_by_id", "get_by_keyword", "get_random", "get_all", "get_stats"],
                    "description": "The action to perform on the content database"
                },
                "content_type": {
                    "type": "string",
                    "description": "Type of content to query, e.g. blog_posts or social_posts"
                },
                "query": {
                    "type": "string",
                    "description": "Search query or keyword (for search and get_by_keyword)"
                },
                "content_id": {
                    "type": "string",
                    "description": "ID of a specific content item (for get_by_id)"
                },
                "count": {
                    "type": "integer",
                    "description": "Number of random items to return (for get_random)"
                }
            },
            "required": ["action"]
        })
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, std::result::Result<String, ToolError>> {
        Box::pin(async move {
            let result = self.run(&params)?;
            serde_json::to_string_pretty(&result).map_err(|e| ToolError::ExecutionFailed(e.to_string()))
        })
    }
}
