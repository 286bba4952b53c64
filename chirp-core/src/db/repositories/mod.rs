use anyhow::{Context, Result};
use chirp_types::Table;
use rusqlite::Connection;

mod author_repository;
mod post_repository;
mod mention_repository;
mod hashtag_repository;
mod association_repository;

pub use author_repository::AuthorRepository;
pub use post_repository::PostRepository;
pub use mention_repository::MentionedUserRepository;
pub use hashtag_repository::HashtagRepository;
pub use association_repository::AssociationRepository;

/// First identifier not yet used in a surrogate-keyed table (0 when empty)
pub(crate) fn next_id(conn: &Connection, table: Table) -> Result<i64> {
    let sql = format!("SELECT COALESCE(MAX(id) + 1, 0) FROM {}", table.as_str());
    conn.query_row(&sql, [], |row| row.get(0))
        .with_context(|| format!("Failed to read next id of {}", table))
}

/// Number of rows currently stored in a table
pub(crate) fn count_rows(conn: &Connection, table: Table) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.as_str());
    conn.query_row(&sql, [], |row| row.get(0))
        .with_context(|| format!("Failed to count rows of {}", table))
}
