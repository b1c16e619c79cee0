use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use triage_core::{
    ConversationMemory, MemoryBackend, MemorySearchResult, OperationalMemory, Result,
};

use crate::similarity::{SIMILARITY_THRESHOLD, text_similarity};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub total_operational: usize,
    pub total_conversations: usize,
}

/// Process-local memory with word-overlap search.
///
/// Each collection keeps at most `max_entries` items; the oldest are
/// dropped first.
pub struct InMemoryStore {
    operational: Arc<RwLock<Vec<OperationalMemory>>>,
    conversations: Arc<RwLock<Vec<ConversationMemory>>>,
    max_entries: usize,
}

impl InMemoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            operational: Arc::new(RwLock::new(Vec::new())),
            conversations: Arc::new(RwLock::new(Vec::new())),
            max_entries,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            total_operational: self.operational.read().len(),
            total_conversations: self.conversations.read().len(),
        }
    }

    pub fn clear(&self) {
        self.operational.write().clear();
        self.conversations.write().clear();
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl Clone for InMemoryStore {
    fn clone(&self) -> Self {
        Self {
            operational: Arc::clone(&self.operational),
            conversations: Arc::clone(&self.conversations),
            max_entries: self.max_entries,
        }
    }
}

fn rank<M: Clone>(
    items: &[M],
    query: &str,
    limit: usize,
    text: impl Fn(&M) -> String,
) -> Vec<MemorySearchResult<M>> {
    let mut results: Vec<MemorySearchResult<M>> = items
        .iter()
        .filter_map(|memory| {
            let similarity = text_similarity(query, &text(memory));
            (similarity > SIMILARITY_THRESHOLD).then(|| MemorySearchResult {
                memory: memory.clone(),
                similarity,
                relevance: similarity,
            })
        })
        .collect();
    results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    results.truncate(limit);
    results
}

fn push_bounded<M>(items: &mut Vec<M>, item: M, max: usize) {
    items.push(item);
    if items.len() > max {
        let excess = items.len() - max;
        items.drain(..excess);
    }
}

#[async_trait]
impl MemoryBackend for InMemoryStore {
    async fn search_operational(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemorySearchResult<OperationalMemory>>> {
        let items = self.operational.read();
        Ok(rank(items.as_slice(), query, limit, OperationalMemory::search_text))
    }

    async fn search_conversations(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemorySearchResult<ConversationMemory>>> {
        let items = self.conversations.read();
        Ok(rank(items.as_slice(), query, limit, ConversationMemory::search_text))
    }

    async fn store_operational(&self, memory: OperationalMemory) -> Result<String> {
        let id = format!("{}_{}", memory.incident_id, memory.timestamp);
        tracing::debug!(id = %id, "Storing operational memory");
        push_bounded(&mut *self.operational.write(), memory, self.max_entries);
        Ok(id)
    }

    async fn store_conversation(&self, memory: ConversationMemory) -> Result<String> {
        let id = format!("{}_{}", memory.session_id, memory.timestamp);
        tracing::debug!(id = %id, "Storing conversation memory");
        push_bounded(&mut *self.conversations.write(), memory, self.max_entries);
        Ok(id)
    }
}
