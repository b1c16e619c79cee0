//! Core types and traits for the diagnostic decision engine

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Result, TriageError};
pub use traits::memory::{
    ConversationMemory, DeploymentEnvironment, MemoryBackend, MemorySearchResult,
    OperationalMemory,
};
pub use traits::tool::ToolExecutor;
pub use types::{Evidence, EvidenceQuality, EvidenceType, ToolCall};
