pub mod code_execution;
pub mod search_internet;

pub use code_execution::CodeExecutionTool;
pub use search_internet::SearchInternetTool;
