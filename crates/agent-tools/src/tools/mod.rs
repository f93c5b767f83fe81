pub mod add_two_numbers;
pub mod retrieve_docs;
pub mod summarize_thread;

pub use add_two_numbers::AddTwoNumbersTool;
pub use retrieve_docs::RetrieveRelatedDocsTool;
pub use summarize_thread::SummarizeThreadTool;
