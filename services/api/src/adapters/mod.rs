pub mod backend_llm;
pub mod db;
pub mod direct_llm;
pub mod memory;
pub mod payload;
pub mod prompt;

pub use backend_llm::BackendGeneratorAdapter;
pub use db::DbAdapter;
pub use direct_llm::OpenAiGeneratorAdapter;
pub use memory::InMemoryStatsStore;
