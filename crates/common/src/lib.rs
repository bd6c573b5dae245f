#[cfg(test)]
mod tests;

mod record;
mod schema;

pub use record::Record;
pub use schema::{Attribute, Schema};

use serde::{Deserialize, Serialize};
use std::{io, path::PathBuf};
use thiserror::Error;

/// On-disk page index. Signed because `NO_PAGE` doubles as the chain
/// terminator inside page headers and the catalog.
pub type PageNum = i32;

/// Sentinel for "no such page" in page headers and the catalog free list.
pub const NO_PAGE: PageNum = -1;

/// Identifier of a record within a table: the page it lives on and the slot
/// it occupies. Stable for the lifetime of the record.
///
/// Examples:
/// - `let rid = Rid { page: 1, slot: 0 };`
/// - `let rid = Rid { page: 42, slot: 17 };`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rid {
    pub page: PageNum,
    pub slot: i32,
}

/// Canonical error type shared across the engine's subsystems.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("page {0} does not exist")]
    ReadNonExistingPage(PageNum),
    #[error("page {0} is not cached")]
    PageNotCached(PageNum),
    #[error("unknown table '{0}'")]
    TableNotFound(String),
    #[error("table '{0}' already exists")]
    TableExists(String),
    #[error("table '{0}' is open")]
    TableOpen(String),
    #[error("no more entries: {0}")]
    NoMoreEntries(String),
    #[error("expr: {0}")]
    Expr(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Page replacement policy of a buffer pool, fixed at pool creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplacementStrategy {
    Fifo,
    Lru,
}

/// Runtime configuration for a record-manager session.
///
/// # Example
/// ```
/// use common::{DbConfig, ReplacementStrategy};
/// use std::path::PathBuf;
///
/// let config = DbConfig::builder()
///     .page_file(PathBuf::from("./tables.bin"))
///     .pool_frames(64)
///     .strategy(ReplacementStrategy::Fifo)
///     .build();
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct DbConfig {
    /// Page file holding the catalog and all table pages.
    #[builder(default = PathBuf::from("DATA.bin"))]
    pub page_file: PathBuf,
    /// Number of frames the buffer pool keeps resident.
    #[builder(default = 16)]
    pub pool_frames: usize,
    /// Eviction policy for the pool.
    #[builder(default = ReplacementStrategy::Lru)]
    pub strategy: ReplacementStrategy,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            page_file: PathBuf::from("DATA.bin"),
            pool_frames: 16,
            strategy: ReplacementStrategy::Lru,
        }
    }
}

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::{
        Attribute, DbConfig, DbError, DbResult, NO_PAGE, PageNum, Record, ReplacementStrategy,
        Rid, Schema,
    };
    pub use types::{DataType, Value};
}
