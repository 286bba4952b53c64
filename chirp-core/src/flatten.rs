//! Explodes raw posts into flat rows and moves them through the flat file.
//!
//! A post with `h` hashtags and `m` mentions becomes `max(h, 1) * max(m, 1)`
//! rows. An empty list contributes a single empty-string placeholder, so a
//! post without hashtags and mentions still yields exactly one row.

use chirp_types::{FlatRow, RawPost};
use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::path::Path;

use crate::error::EtlResult;

/// Cross product of one post's hashtags and mentions, hashtags outermost
pub fn flatten_post(post: &RawPost) -> Vec<FlatRow> {
    let hashtags = with_placeholder(&post.hashtags);
    let mentions = with_placeholder(&post.mentions);

    let mut rows = Vec::with_capacity(hashtags.len() * mentions.len());
    for hashtag in hashtags {
        for mention in mentions {
            rows.push(FlatRow {
                external_id: post.external_id.clone(),
                author_name: post.author_name.clone(),
                created_at: Some(post.created_at),
                text: post.text.clone(),
                hashtag: hashtag.to_string(),
                mention: mention.to_string(),
            });
        }
    }
    rows
}

/// Flatten every post, preserving input order
pub fn flatten(posts: &[RawPost]) -> Vec<FlatRow> {
    posts.iter().flat_map(flatten_post).collect()
}

fn with_placeholder(values: &[String]) -> &[String] {
    static PLACEHOLDER: [String; 1] = [String::new()];
    if values.is_empty() {
        &PLACEHOLDER
    } else {
        values
    }
}

/// Hashtags and mentions of one post, recovered from its flat rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegroupedPost {
    pub external_id: String,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
}

/// Re-aggregate flat rows by external id, in first-occurrence order.
/// Empty placeholders and repeated values are dropped.
pub fn regroup(rows: &[FlatRow]) -> Vec<RegroupedPost> {
    let mut posts: Vec<RegroupedPost> = Vec::new();
    let mut index_of: HashMap<&str, usize> = HashMap::new();
    let mut seen: HashSet<(&str, bool, &str)> = HashSet::new();

    for row in rows {
        let idx = *index_of.entry(row.external_id.as_str()).or_insert_with(|| {
            posts.push(RegroupedPost {
                external_id: row.external_id.clone(),
                hashtags: Vec::new(),
                mentions: Vec::new(),
            });
            posts.len() - 1
        });

        let id = row.external_id.as_str();
        if !row.hashtag.is_empty() && seen.insert((id, true, row.hashtag.as_str())) {
            posts[idx].hashtags.push(row.hashtag.clone());
        }
        if !row.mention.is_empty() && seen.insert((id, false, row.mention.as_str())) {
            posts[idx].mentions.push(row.mention.clone());
        }
    }
    posts
}

/// Serialize rows as CSV with the `id,author_name,created_at,text,hashtags,user_mentions` header
pub fn write_rows<W: Write>(writer: W, rows: &[FlatRow]) -> EtlResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn read_rows<R: Read>(reader: R) -> EtlResult<Vec<FlatRow>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let rows = csv_reader
        .deserialize()
        .collect::<Result<Vec<FlatRow>, _>>()?;
    Ok(rows)
}

pub fn write_flat_file<P: AsRef<Path>>(path: P, rows: &[FlatRow]) -> EtlResult<()> {
    let file = std::fs::File::create(path.as_ref())?;
    write_rows(file, rows)?;
    tracing::info!("Wrote {} flat rows to {}", rows.len(), path.as_ref().display());
    Ok(())
}

pub fn read_flat_file<P: AsRef<Path>>(path: P) -> EtlResult<Vec<FlatRow>> {
    let file = std::fs::File::open(path.as_ref())?;
    let rows = read_rows(file)?;
    tracing::info!("Read {} flat rows from {}", rows.len(), path.as_ref().display());
    Ok(rows)
}
