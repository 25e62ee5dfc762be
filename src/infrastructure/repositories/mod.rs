//! Repository Implementations
//!
//! Concrete implementations of the domain repository traits.
//!
//! ## Available Repositories
//!
//! - **PgMessageRepository** - Direct messages (PostgreSQL)
//! - **PgGroupRepository** - Group rosters (PostgreSQL)
//! - **PgGroupMessageRepository** - Group messages and read-by sets (PostgreSQL)
//! - **InMemoryStore** - All of the above, process-local
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use crate::infrastructure::repositories::{PgGroupRepository, PgMessageRepository};
//!
//! async fn setup_repositories(pool: PgPool) {
//!     let message_repo = PgMessageRepository::new(pool.clone());
//!     let group_repo = PgGroupRepository::new(pool);
//! }
//! ```

pub mod group_repository;
pub mod memory;
pub mod message_repository;

pub use group_repository::{PgGroupMessageRepository, PgGroupRepository};
pub use memory::InMemoryStore;
pub use message_repository::PgMessageRepository;
