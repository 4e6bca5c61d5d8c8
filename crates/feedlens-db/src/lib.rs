//! # feedlens-db
//!
//! PostgreSQL persistence for feedlens.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for comments, analysis records and summaries
//! - An in-memory store implementing the same traits
//!
//! The schema is managed outside this crate.
//!
//! ## Example
//!
//! ```rust,ignore
//! use feedlens_db::{CommentRepository, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/feedlens").await?;
//!     let pending = db.comments.fetch_unanalyzed(100).await?;
//!     println!("{} comments waiting", pending.len());
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod comments;
pub mod memory;
pub mod pool;
pub mod summaries;

// Re-export core types
pub use feedlens_core::*;

pub use analysis::PgAnalysisRepository;
pub use comments::PgCommentRepository;
pub use memory::MemoryStore;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use summaries::PgSummaryRepository;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub comments: PgCommentRepository,
    pub analyses: PgAnalysisRepository,
    pub summaries: PgSummaryRepository,
}

impl Database {
    /// Create a Database from an existing pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            comments: PgCommentRepository::new(pool.clone()),
            analyses: PgAnalysisRepository::new(pool.clone()),
            summaries: PgSummaryRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with default pool settings.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Connect with custom pool settings.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }
}
