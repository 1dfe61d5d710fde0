//! Retrieval agent: definition files and invocation.

pub mod definition;
pub mod invoke;

pub use definition::{
    ActionFunction, ActionGroup, AgentDefinition, FunctionParameter, KnowledgeBaseBinding,
};
pub use invoke::{AgentAnswer, Citation, KnowledgeAgent, RetrievalAgent};
