pub mod config;
pub mod error;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod queue;
pub mod repository;
pub mod store;

pub use config::DbConfig;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use queue::PgJobQueue;
pub use repository::PgConversationStore;
pub use store::ConversationStore;
