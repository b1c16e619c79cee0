//! Suggestions drawn from past incidents and the current evidence gaps.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use triage_core::{EvidenceType, MemoryBackend};

use crate::session::WorkflowSession;
use crate::state::StateRules;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionType {
    PatternMatch,
    EvidenceGap,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedAction {
    pub action: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_tool: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSuggestion {
    #[serde(rename = "type")]
    pub suggestion_type: SuggestionType,
    pub priority: SuggestionPriority,
    pub message: String,
    pub recommended_actions: Vec<SuggestedAction>,
}

/// Tool most likely to produce evidence of the given type.
pub fn suggest_tool_for_evidence(evidence_type: EvidenceType) -> &'static str {
    match evidence_type {
        EvidenceType::Symptoms => "oc_diagnostic_cluster_health",
        EvidenceType::AffectedResources => "oc_read_get_pods",
        EvidenceType::Logs => "oc_read_logs",
        EvidenceType::Events => "oc_diagnostic_events",
        EvidenceType::SimilarIncidents => "memory_search_operational",
        EvidenceType::PatternAnalysis => "oc_diagnostic_cluster_health",
        _ => "oc_get_pods",
    }
}

pub struct MemoryGuidedWorkflow {
    memory: Option<Arc<dyn MemoryBackend>>,
    search_limit: usize,
}

impl MemoryGuidedWorkflow {
    pub fn new(memory: Option<Arc<dyn MemoryBackend>>, search_limit: usize) -> Self {
        Self {
            memory,
            search_limit,
        }
    }

    /// Pattern matches first, then evidence gaps for the current state.
    pub async fn suggest_next_steps(
        &self,
        session: &WorkflowSession,
        rules: &StateRules,
    ) -> Vec<WorkflowSuggestion> {
        let mut suggestions = Vec::new();

        let incidents = self.similar_incidents(session).await;
        if !incidents.is_empty() {
            suggestions.push(WorkflowSuggestion {
                suggestion_type: SuggestionType::PatternMatch,
                priority: SuggestionPriority::High,
                message: format!("I found {} similar incidents.", incidents.len()),
                recommended_actions: incidents,
            });
        }

        let gaps: Vec<SuggestedAction> = rules
            .required_evidence
            .iter()
            .filter(|required| !session.has_evidence(**required))
            .map(|required| SuggestedAction {
                action: "gather_evidence".into(),
                description: format!("Missing {} evidence", required),
                evidence: None,
                suggested_tool: Some(suggest_tool_for_evidence(*required).into()),
            })
            .collect();
        if !gaps.is_empty() {
            suggestions.push(WorkflowSuggestion {
                suggestion_type: SuggestionType::EvidenceGap,
                priority: SuggestionPriority::Medium,
                message: "We're missing some key evidence for diagnosis.".into(),
                recommended_actions: gaps,
            });
        }

        suggestions
    }

    async fn similar_incidents(&self, session: &WorkflowSession) -> Vec<SuggestedAction> {
        let Some(memory) = &self.memory else {
            return Vec::new();
        };
        let symptoms = session
            .evidence
            .iter()
            .filter(|e| e.evidence_type == EvidenceType::Symptoms)
            .map(|e| e.description.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        if symptoms.is_empty() {
            return Vec::new();
        }

        let results = match memory.search_operational(&symptoms, self.search_limit).await {
            Ok(results) => results,
            Err(e) => {
                warn!(session = %session.session_id, error = %e, "Memory search failed");
                return Vec::new();
            }
        };
        debug!(session = %session.session_id, hits = results.len(), "Searched operational memory");

        results
            .into_iter()
            .filter(|r| r.memory.has_resolution())
            .map(|r| SuggestedAction {
                action: "review_resolution".into(),
                description: format!("Review incident {}", r.memory.incident_id),
                evidence: r.memory.resolution,
                suggested_tool: None,
            })
            .collect()
    }
}
