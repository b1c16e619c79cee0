//! Memory collaborator for past incidents and conversations

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentEnvironment {
    #[default]
    Dev,
    Test,
    Staging,
    Prod,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationalMemory {
    pub incident_id: String,
    #[serde(default)]
    pub domain: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default)]
    pub environment: DeploymentEnvironment,
    #[serde(default)]
    pub affected_resources: Vec<String>,
    #[serde(default)]
    pub diagnostic_steps: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl OperationalMemory {
    pub fn new(incident_id: impl Into<String>, symptoms: Vec<String>) -> Self {
        Self {
            incident_id: incident_id.into(),
            domain: "cluster".to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            symptoms,
            root_cause: None,
            resolution: None,
            environment: DeploymentEnvironment::default(),
            affected_resources: Vec::new(),
            diagnostic_steps: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_root_cause(mut self, root_cause: impl Into<String>) -> Self {
        self.root_cause = Some(root_cause.into());
        self
    }

    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    pub fn with_environment(mut self, environment: DeploymentEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn has_resolution(&self) -> bool {
        self.resolution
            .as_deref()
            .map(|r| !r.is_empty())
            .unwrap_or(false)
    }

    /// Text used for similarity search: symptoms, root cause and resolution.
    pub fn search_text(&self) -> String {
        format!(
            "{} {} {}",
            self.symptoms.join(" "),
            self.root_cause.as_deref().unwrap_or(""),
            self.resolution.as_deref().unwrap_or("")
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMemory {
    pub session_id: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub timestamp: i64,
    pub user_message: String,
    pub assistant_response: String,
    #[serde(default)]
    pub context: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ConversationMemory {
    pub fn new(
        session_id: impl Into<String>,
        user_message: impl Into<String>,
        assistant_response: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            domain: "cluster".to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            user_message: user_message.into(),
            assistant_response: assistant_response.into(),
            context: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn search_text(&self) -> String {
        format!("{} {}", self.user_message, self.assistant_response)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemorySearchResult<M> {
    pub memory: M,
    pub similarity: f64,
    pub relevance: f64,
}

/// Search/store interface to the incident memory backend.
///
/// The decision engine only reads similar incidents for suggestions. Errors
/// returned here are treated as "no suggestions" by the workflow.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    async fn search_operational(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemorySearchResult<OperationalMemory>>>;

    async fn search_conversations(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemorySearchResult<ConversationMemory>>>;

    async fn store_operational(&self, memory: OperationalMemory) -> Result<String>;

    async fn store_conversation(&self, memory: ConversationMemory) -> Result<String>;
}
