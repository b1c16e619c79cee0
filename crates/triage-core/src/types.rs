use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A tool invocation requested by the responder (or the agent acting for them).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_domain")]
    pub domain: String,
}

fn default_domain() -> String {
    "cluster".to_string()
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            timestamp: Utc::now(),
            domain: default_domain(),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    Symptoms,
    AffectedResources,
    Logs,
    Events,
    SimilarIncidents,
    PatternAnalysis,
    RootCauseTheory,
    SupportingEvidence,
    HypothesisTestResults,
    ConfirmedRootCause,
    SolutionPlan,
    RollbackPlan,
}

impl EvidenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceType::Symptoms => "symptoms",
            EvidenceType::AffectedResources => "affected_resources",
            EvidenceType::Logs => "logs",
            EvidenceType::Events => "events",
            EvidenceType::SimilarIncidents => "similar_incidents",
            EvidenceType::PatternAnalysis => "pattern_analysis",
            EvidenceType::RootCauseTheory => "root_cause_theory",
            EvidenceType::SupportingEvidence => "supporting_evidence",
            EvidenceType::HypothesisTestResults => "hypothesis_test_results",
            EvidenceType::ConfirmedRootCause => "confirmed_root_cause",
            EvidenceType::SolutionPlan => "solution_plan",
            EvidenceType::RollbackPlan => "rollback_plan",
        }
    }
}

impl fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceQuality {
    #[default]
    Basic,
    Detailed,
    Comprehensive,
}

/// One append-only entry in a session's evidence log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evidence {
    #[serde(rename = "type")]
    pub evidence_type: EvidenceType,
    pub description: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub quality: EvidenceQuality,
    #[serde(default)]
    pub data: Value,
}

impl Evidence {
    pub fn new(
        evidence_type: EvidenceType,
        description: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            evidence_type,
            description: description.into(),
            source: source.into(),
            timestamp: Utc::now(),
            quality: EvidenceQuality::Basic,
            data: Value::Null,
        }
    }

    /// Evidence derived from an admitted tool call. Always typed `symptoms`.
    pub fn from_tool_call(call: &ToolCall, timestamp: DateTime<Utc>) -> Self {
        Self {
            evidence_type: EvidenceType::Symptoms,
            description: format!("Evidence from {}", call.name),
            source: call.name.clone(),
            timestamp,
            quality: EvidenceQuality::Basic,
            data: call.arguments.clone(),
        }
    }

    pub fn with_quality(mut self, quality: EvidenceQuality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}
