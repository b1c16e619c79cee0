//! Collaborator traits consumed by the decision engine

pub mod memory;
pub mod tool;

pub use memory::MemoryBackend;
pub use tool::ToolExecutor;
