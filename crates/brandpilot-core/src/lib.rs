//! Brandpilot Core - conversational content assistant
//!
//! This crate provides the pieces behind the Brandpilot server:
//! - An upstream chat-completion client with caching, timeouts and cancellation
//! - A session cache backed by Redis with an in-process fallback
//! - The tool catalog and its dispatcher
//! - The agent loop tying the model and the tools together

pub mod agent;
pub mod cache;
pub mod config;
pub mod error;
pub mod provider;
pub mod tools;

pub use agent::{Agent, AgentResponse, AgentSettings, RequestState, RequestStatus, ToolCallRecord};
pub use cache::{CacheBackend, SessionCache};
pub use config::{Config, ConfigManager, ProviderConfig};
pub use error::{Error, ProviderError, Result, ToolError};
pub use provider::{ChatMessage, CompletionProvider, CompletionRequest, CompletionResponse, UpstreamClient};
pub use tools::{BrandBriefStore, ContentDatabase, Tool, ToolDefinition, ToolRegistry};
