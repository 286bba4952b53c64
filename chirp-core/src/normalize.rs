//! Derives the relational tables from flat rows.
//!
//! Identifiers are zero-based and follow first-occurrence order in the input,
//! so the same flat file always yields the same tables. Foreign keys are
//! resolved through in-memory value -> id maps; nothing touches the store here.

use chirp_types::{
    Author, FlatRow, Hashtag, MentionedUser, NormalizedTables, Post, PostHashtag, PostMention,
    Table,
};
use std::collections::{HashMap, HashSet};

use crate::error::{EtlError, EtlResult};

/// Distinct values of one column with the id assigned to each
#[derive(Debug, Default)]
struct IdRegistry {
    values: Vec<String>,
    ids: HashMap<String, i64>,
}

impl IdRegistry {
    /// Id of `value`, assigning the next one on first sight
    fn intern(&mut self, value: &str) -> i64 {
        if let Some(id) = self.ids.get(value) {
            return *id;
        }
        let id = self.values.len() as i64;
        self.values.push(value.to_string());
        self.ids.insert(value.to_string(), id);
        id
    }

    fn resolve(&self, table: Table, value: &str) -> EtlResult<i64> {
        self.ids
            .get(value)
            .copied()
            .ok_or_else(|| EtlError::lookup(table, value))
    }

    fn from_values<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut registry = Self::default();
        for value in values {
            registry.intern(value);
        }
        registry
    }

    fn entries(&self) -> impl Iterator<Item = (i64, &str)> {
        self.values
            .iter()
            .enumerate()
            .map(|(id, value)| (id as i64, value.as_str()))
    }
}

/// Build the four entity tables and two association tables from flat rows
pub fn normalize(rows: &[FlatRow]) -> EtlResult<NormalizedTables> {
    // 1. Authors
    let authors = IdRegistry::from_values(rows.iter().map(|r| r.author_name.as_str()));

    // 2. Posts, first occurrence of each external id wins
    let mut post_ids = IdRegistry::default();
    let mut posts = Vec::new();
    for row in rows {
        let known = post_ids.ids.contains_key(&row.external_id);
        let id = post_ids.intern(&row.external_id);
        if known {
            let first: &Post = &posts[id as usize];
            if first.text != row.text {
                tracing::warn!(
                    "Post {} appears with differing text; keeping the first occurrence",
                    row.external_id
                );
            }
            continue;
        }
        posts.push(Post {
            id,
            external_id: row.external_id.clone(),
            text: row.text.clone(),
            author_id: authors.resolve(Table::Author, &row.author_name)?,
        });
    }

    // 3. Mentioned users and hashtags (the empty placeholder is a value like any other)
    let mentioned_users = IdRegistry::from_values(rows.iter().map(|r| r.mention.as_str()));
    let hashtags = IdRegistry::from_values(rows.iter().map(|r| r.hashtag.as_str()));

    // 4. Associations over distinct (external_id, value) pairs
    let mut post_mentions = Vec::new();
    let mut seen = HashSet::new();
    for row in rows {
        if seen.insert((row.external_id.as_str(), row.mention.as_str())) {
            post_mentions.push(PostMention {
                post_id: post_ids.resolve(Table::Post, &row.external_id)?,
                mentioned_user_id: mentioned_users.resolve(Table::MentionedUser, &row.mention)?,
            });
        }
    }

    let mut post_hashtags = Vec::new();
    let mut seen = HashSet::new();
    for row in rows {
        if seen.insert((row.external_id.as_str(), row.hashtag.as_str())) {
            post_hashtags.push(PostHashtag {
                post_id: post_ids.resolve(Table::Post, &row.external_id)?,
                hashtag_id: hashtags.resolve(Table::Hashtag, &row.hashtag)?,
            });
        }
    }

    let tables = NormalizedTables {
        authors: authors
            .entries()
            .map(|(id, name)| Author {
                id,
                author_name: name.to_string(),
            })
            .collect(),
        posts,
        mentioned_users: mentioned_users
            .entries()
            .map(|(id, name)| MentionedUser {
                id,
                name: name.to_string(),
            })
            .collect(),
        hashtags: hashtags
            .entries()
            .map(|(id, name)| Hashtag {
                id,
                name: name.to_string(),
            })
            .collect(),
        post_mentions,
        post_hashtags,
    };

    tracing::info!(
        "Normalized {} flat rows into {} authors, {} posts, {} mentioned users, {} hashtags",
        rows.len(),
        tables.authors.len(),
        tables.posts.len(),
        tables.mentioned_users.len(),
        tables.hashtags.len()
    );

    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::flatten;
    use chirp_types::RawPost;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn raw(id: &str, author: &str, hashtags: &[&str], mentions: &[&str]) -> RawPost {
        RawPost {
            external_id: id.to_string(),
            author_name: author.to_string(),
            created_at: Utc.with_ymd_and_hms(2020, 3, 10, 12, 0, 0).unwrap(),
            text: format!("post {}", id),
            hashtags: hashtags.iter().map(|s| s.to_string()).collect(),
            mentions: mentions.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_two_post_scenario() {
        let rows = flatten(&[
            raw("1", "A", &["x", "y"], &["u"]),
            raw("2", "A", &["x"], &[]),
        ]);
        let tables = normalize(&rows).expect("Failed to normalize");

        assert_eq!(
            tables.authors,
            vec![Author { id: 0, author_name: "A".to_string() }]
        );
        assert_eq!(
            tables.hashtags,
            vec![
                Hashtag { id: 0, name: "x".to_string() },
                Hashtag { id: 1, name: "y".to_string() },
            ]
        );
        assert_eq!(
            tables.mentioned_users,
            vec![
                MentionedUser { id: 0, name: "u".to_string() },
                MentionedUser { id: 1, name: String::new() },
            ]
        );

        let posts: Vec<(i64, &str, i64)> = tables
            .posts
            .iter()
            .map(|p| (p.id, p.external_id.as_str(), p.author_id))
            .collect();
        assert_eq!(posts, vec![(0, "1", 0), (1, "2", 0)]);

        let post_hashtags: HashSet<(i64, i64)> = tables
            .post_hashtags
            .iter()
            .map(|l| (l.post_id, l.hashtag_id))
            .collect();
        assert_eq!(post_hashtags, HashSet::from([(0, 0), (0, 1), (1, 0)]));

        let post_mentions: HashSet<(i64, i64)> = tables
            .post_mentions
            .iter()
            .map(|l| (l.post_id, l.mentioned_user_id))
            .collect();
        assert_eq!(post_mentions, HashSet::from([(0, 0), (1, 1)]));
    }

    #[test]
    fn test_bare_post_gets_placeholder_rows() {
        let tables = normalize(&flatten(&[raw("9", "B", &[], &[])])).unwrap();
        assert_eq!(tables.posts.len(), 1);
        assert_eq!(tables.hashtags, vec![Hashtag { id: 0, name: String::new() }]);
        assert_eq!(tables.mentioned_users, vec![MentionedUser { id: 0, name: String::new() }]);
        assert_eq!(tables.post_hashtags, vec![PostHashtag { post_id: 0, hashtag_id: 0 }]);
        assert_eq!(
            tables.post_mentions,
            vec![PostMention { post_id: 0, mentioned_user_id: 0 }]
        );
    }

    #[test]
    fn test_first_occurrence_wins_for_conflicting_text() {
        let mut rows = flatten(&[raw("1", "A", &["x"], &[])]);
        let mut edited = rows[0].clone();
        edited.text = "edited".to_string();
        edited.hashtag = "z".to_string();
        rows.push(edited);

        let tables = normalize(&rows).unwrap();
        assert_eq!(tables.posts.len(), 1);
        assert_eq!(tables.posts[0].text, "post 1");
        // The later row still contributes its hashtag
        assert_eq!(tables.post_hashtags.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let tables = normalize(&[]).unwrap();
        assert!(tables.is_empty());
    }

    #[test]
    fn test_registry_resolve_reports_missing_value() {
        let registry = IdRegistry::from_values(["a", "b", "a"]);
        assert_eq!(registry.resolve(Table::Hashtag, "b").unwrap(), 1);
        let err = registry.resolve(Table::Hashtag, "c").unwrap_err();
        assert!(matches!(err, EtlError::Lookup { table: Table::Hashtag, .. }));
    }

    fn raw_posts() -> impl Strategy<Value = Vec<RawPost>> {
        let post = (
            0usize..6,
            0usize..4,
            prop::collection::vec("[a-c]{0,2}", 0..4),
            prop::collection::vec("[a-c]{0,2}", 0..4),
        );
        prop::collection::vec(post, 0..12).prop_map(|specs| {
            specs
                .into_iter()
                .map(|(id, author, hashtags, mentions)| RawPost {
                    external_id: id.to_string(),
                    author_name: format!("author{}", author),
                    created_at: Utc.with_ymd_and_hms(2020, 3, 10, 12, 0, 0).unwrap(),
                    text: format!("post {}", id),
                    hashtags,
                    mentions,
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_one_row_per_distinct_value(posts in raw_posts()) {
            let rows = flatten(&posts);
            let tables = normalize(&rows).unwrap();

            let authors: HashSet<&str> = rows.iter().map(|r| r.author_name.as_str()).collect();
            let external_ids: HashSet<&str> = rows.iter().map(|r| r.external_id.as_str()).collect();
            let hashtags: HashSet<&str> = rows.iter().map(|r| r.hashtag.as_str()).collect();
            let mentions: HashSet<&str> = rows.iter().map(|r| r.mention.as_str()).collect();

            prop_assert_eq!(tables.authors.len(), authors.len());
            prop_assert_eq!(tables.posts.len(), external_ids.len());
            prop_assert_eq!(tables.hashtags.len(), hashtags.len());
            prop_assert_eq!(tables.mentioned_users.len(), mentions.len());
        }

        #[test]
        fn prop_author_resolves_to_first_source_author(posts in raw_posts()) {
            let rows = flatten(&posts);
            let tables = normalize(&rows).unwrap();

            for post in &tables.posts {
                let first = rows.iter().find(|r| r.external_id == post.external_id).unwrap();
                let author = tables
                    .authors
                    .iter()
                    .find(|a| a.id == post.author_id)
                    .map(|a| a.author_name.as_str());
                prop_assert_eq!(author, Some(first.author_name.as_str()));
            }
        }

        #[test]
        fn prop_foreign_keys_point_at_existing_rows(posts in raw_posts()) {
            let tables = normalize(&flatten(&posts)).unwrap();
            let post_ids: HashSet<i64> = tables.posts.iter().map(|p| p.id).collect();
            let hashtag_ids: HashSet<i64> = tables.hashtags.iter().map(|h| h.id).collect();
            let mention_ids: HashSet<i64> = tables.mentioned_users.iter().map(|m| m.id).collect();

            for link in &tables.post_hashtags {
                prop_assert!(post_ids.contains(&link.post_id));
                prop_assert!(hashtag_ids.contains(&link.hashtag_id));
            }
            for link in &tables.post_mentions {
                prop_assert!(post_ids.contains(&link.post_id));
                prop_assert!(mention_ids.contains(&link.mentioned_user_id));
            }

            let pairs: HashSet<PostHashtag> = tables.post_hashtags.iter().copied().collect();
            prop_assert_eq!(pairs.len(), tables.post_hashtags.len());
        }

        #[test]
        fn prop_normalize_is_deterministic(posts in raw_posts()) {
            let rows = flatten(&posts);
            prop_assert_eq!(normalize(&rows).unwrap(), normalize(&rows).unwrap());
        }
    }
}
