//! Statically defined local tools and their executor.

pub mod executor;
pub mod tools;

pub use executor::BuiltinToolExecutor;
pub use tools::{AddTwoNumbersTool, RetrieveRelatedDocsTool, SummarizeThreadTool};
