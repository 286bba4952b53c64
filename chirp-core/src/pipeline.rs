//! Stage wiring: collect -> flat file, and flat file -> normalize -> load.

use std::path::Path;

use crate::collect::{collect_posts, PostSource};
use crate::db::Database;
use crate::error::EtlResult;
use crate::flatten::{flatten, read_flat_file, write_flat_file};
use crate::loader::{LoadReport, Loader};
use crate::normalize::normalize;

/// Collect posts and persist them as a flat file.
///
/// The source is drained before anything is written, so a failed collection
/// leaves no partial file behind. Returns the number of flat rows written.
pub fn collect_to_flat_file(
    source: &mut dyn PostSource,
    query: &str,
    count: usize,
    path: &Path,
) -> EtlResult<usize> {
    let posts = collect_posts(source, query, count)?;
    let rows = flatten(&posts);
    write_flat_file(path, &rows)?;
    Ok(rows.len())
}

/// Normalize a flat file and append the result to the store
pub fn import_flat_file(db: &Database, path: &Path) -> EtlResult<LoadReport> {
    let rows = read_flat_file(path)?;
    let tables = normalize(&rows)?;
    Loader::new(db).load(&tables)
}
