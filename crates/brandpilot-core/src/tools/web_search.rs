//! WebSearch tool - canned search results keyed by topic

use serde_json::Value;

use crate::error::ToolError;
use crate::tool_params;
use crate::tools::{required_str, BoxFuture, Tool};

/// Keyword to canned result; the first keyword found in the query wins
const CANNED_RESULTS: &[(&str, &str)] = &[
    ("weather", "Today's weather is sunny with a high of 75°F and a low of 60°F."),
    (
        "news",
        "Latest news: Technology companies announced new AI initiatives, and global markets showed positive trends.",
    ),
    (
        "python",
        "Python is a high-level programming language known for its readability and versatility. The latest version is Python 3.12.",
    ),
    (
        "deepseek",
        "DeepSeek is an AI research company that develops large language models, including DeepSeek Chat and DeepSeek Coder.",
    ),
    (
        "langchain",
        "LangChain is a framework for developing applications powered by language models, providing tools for agents, chains, and memory.",
    ),
];

/// Simulated web search
pub struct WebSearch;

impl WebSearch {
    pub fn search(query: &str) -> String {
        let lower = query.to_lowercase();
        CANNED_RESULTS
            .iter()
            .find(|(keyword, _)| lower.contains(keyword))
            .map(|(_, result)| result.to_string())
            .unwrap_or_else(|| {
                format!(
                    "Search results for '{}': Found multiple relevant resources. Consider refining your search.",
                    query
                )
            })
    }
}

impl Tool for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information on a topic. Use this for questions about \
         recent events, weather, news, or facts you are unsure about."
    }

    fn parameters_schema(&self) -> Value {
        tool_params! {
            query: "string" => "The search query"
        }
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, Result<String, ToolError>> {
        Box::pin(async move {
            let query = required_str(&params, "query")?;
            Ok(Self::search(query))
        })
    }
}
