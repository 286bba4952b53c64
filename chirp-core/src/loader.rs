//! Appends normalized tables to the store.
//!
//! Parent tables go first, association tables last. Normalizer ids are
//! zero-based, so each parent table is shifted by the next free id already in
//! the store; on an empty store the shift is zero and stored ids equal the
//! normalized ones. Every table is committed on its own: when one append fails
//! the tables before it stay in the store.

use chirp_types::{
    Author, Hashtag, MentionedUser, NormalizedTables, Post, PostHashtag, PostMention, Table,
};

use crate::db::repositories::{
    AssociationRepository, AuthorRepository, HashtagRepository, MentionedUserRepository,
    PostRepository,
};
use crate::db::Database;
use crate::error::{EtlError, EtlResult};

/// Rows appended per table, in load order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub appended: Vec<(Table, usize)>,
}

impl LoadReport {
    pub fn rows(&self, table: Table) -> usize {
        self.appended
            .iter()
            .find(|(t, _)| *t == table)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.appended.iter().map(|(_, n)| n).sum()
    }
}

/// Id shift applied to each parent table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Offsets {
    author: i64,
    mentioned_user: i64,
    hashtag: i64,
    post: i64,
}

pub struct Loader {
    authors: AuthorRepository,
    posts: PostRepository,
    mentioned_users: MentionedUserRepository,
    hashtags: HashtagRepository,
    associations: AssociationRepository,
}

impl Loader {
    pub fn new(db: &Database) -> Self {
        Self {
            authors: AuthorRepository::new(db.pool.clone()),
            posts: PostRepository::new(db.pool.clone()),
            mentioned_users: MentionedUserRepository::new(db.pool.clone()),
            hashtags: HashtagRepository::new(db.pool.clone()),
            associations: AssociationRepository::new(db.pool.clone()),
        }
    }

    /// Append all six tables in dependency order
    pub fn load(&self, tables: &NormalizedTables) -> EtlResult<LoadReport> {
        let mut report = LoadReport::default();
        let mut offsets = Offsets::default();

        for table in Table::LOAD_ORDER {
            let rows = self
                .append_table(table, tables, &mut offsets)
                .map_err(|err| EtlError::load(table, err))?;
            tracing::debug!("Appended {} rows to {}", rows, table);
            report.appended.push((table, rows));
        }

        tracing::info!("Loaded {} rows into the store", report.total());
        Ok(report)
    }

    fn append_table(
        &self,
        table: Table,
        tables: &NormalizedTables,
        offsets: &mut Offsets,
    ) -> anyhow::Result<usize> {
        match table {
            Table::Author => {
                offsets.author = self.authors.next_id()?;
                let rows: Vec<Author> = tables
                    .authors
                    .iter()
                    .map(|a| Author {
                        id: a.id + offsets.author,
                        author_name: a.author_name.clone(),
                    })
                    .collect();
                self.authors.append(&rows)
            }
            Table::MentionedUser => {
                offsets.mentioned_user = self.mentioned_users.next_id()?;
                let rows: Vec<MentionedUser> = tables
                    .mentioned_users
                    .iter()
                    .map(|m| MentionedUser {
                        id: m.id + offsets.mentioned_user,
                        name: m.name.clone(),
                    })
                    .collect();
                self.mentioned_users.append(&rows)
            }
            Table::Hashtag => {
                offsets.hashtag = self.hashtags.next_id()?;
                let rows: Vec<Hashtag> = tables
                    .hashtags
                    .iter()
                    .map(|h| Hashtag {
                        id: h.id + offsets.hashtag,
                        name: h.name.clone(),
                    })
                    .collect();
                self.hashtags.append(&rows)
            }
            Table::Post => {
                offsets.post = self.posts.next_id()?;
                let rows: Vec<Post> = tables
                    .posts
                    .iter()
                    .map(|p| Post {
                        id: p.id + offsets.post,
                        external_id: p.external_id.clone(),
                        text: p.text.clone(),
                        author_id: p.author_id + offsets.author,
                    })
                    .collect();
                self.posts.append(&rows)
            }
            Table::PostMention => {
                let rows: Vec<PostMention> = tables
                    .post_mentions
                    .iter()
                    .map(|l| PostMention {
                        post_id: l.post_id + offsets.post,
                        mentioned_user_id: l.mentioned_user_id + offsets.mentioned_user,
                    })
                    .collect();
                self.associations.append_mentions(&rows)
            }
            Table::PostHashtag => {
                let rows: Vec<PostHashtag> = tables
                    .post_hashtags
                    .iter()
                    .map(|l| PostHashtag {
                        post_id: l.post_id + offsets.post,
                        hashtag_id: l.hashtag_id + offsets.hashtag,
                    })
                    .collect();
                self.associations.append_hashtags(&rows)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::flatten;
    use crate::normalize::normalize;
    use chirp_types::RawPost;
    use chrono::{TimeZone, Utc};

    fn setup_test_db() -> Database {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");
        db
    }

    fn sample_tables() -> NormalizedTables {
        let created_at = Utc.with_ymd_and_hms(2020, 3, 10, 12, 0, 0).unwrap();
        let posts = vec![
            RawPost {
                external_id: "1".to_string(),
                author_name: "A".to_string(),
                created_at,
                text: "first".to_string(),
                hashtags: vec!["x".to_string(), "y".to_string()],
                mentions: vec!["u".to_string()],
            },
            RawPost {
                external_id: "2".to_string(),
                author_name: "A".to_string(),
                created_at,
                text: "second".to_string(),
                hashtags: vec!["x".to_string()],
                mentions: vec![],
            },
        ];
        normalize(&flatten(&posts)).expect("Failed to normalize")
    }

    #[test]
    fn test_fresh_store_keeps_normalized_ids() {
        let db = setup_test_db();
        let tables = sample_tables();
        let report = Loader::new(&db).load(&tables).expect("Failed to load");

        assert_eq!(report.rows(Table::Author), 1);
        assert_eq!(report.rows(Table::Post), 2);
        assert_eq!(report.rows(Table::PostHashtag), 3);
        assert_eq!(report.rows(Table::PostMention), 2);
        assert_eq!(report.total(), 1 + 2 + 2 + 2 + 2 + 3);

        let order: Vec<Table> = report.appended.iter().map(|(t, _)| *t).collect();
        assert_eq!(order, Table::LOAD_ORDER.to_vec());

        assert_eq!(AuthorRepository::new(db.pool.clone()).get_all().unwrap(), tables.authors);
        assert_eq!(PostRepository::new(db.pool.clone()).get_all().unwrap(), tables.posts);
        let hashtags = HashtagRepository::new(db.pool.clone());
        assert_eq!(hashtags.get_all().unwrap(), tables.hashtags);
        assert_eq!(hashtags.get_by_post(0).unwrap(), vec!["x", "y"]);
        assert_eq!(
            MentionedUserRepository::new(db.pool.clone()).get_all().unwrap(),
            tables.mentioned_users
        );
    }

    #[test]
    fn test_reimport_appends_duplicates_under_new_ids() {
        let db = setup_test_db();
        let tables = sample_tables();
        let loader = Loader::new(&db);
        loader.load(&tables).expect("Failed first load");
        loader.load(&tables).expect("Failed second load");

        let posts = PostRepository::new(db.pool.clone()).get_all().unwrap();
        assert_eq!(posts.len(), 4);
        assert_eq!(posts[2].external_id, "1");
        assert_eq!(posts[2].id, 2);
        // Second batch points at the second batch's author
        assert_eq!(posts[2].author_id, 1);

        let links = AssociationRepository::new(db.pool.clone()).get_hashtags().unwrap();
        assert_eq!(links.len(), 6);
        assert!(links.contains(&PostHashtag { post_id: 2, hashtag_id: 2 }));
    }

    #[test]
    fn test_dangling_association_fails_load() {
        let db = setup_test_db();
        let mut tables = sample_tables();
        tables.post_hashtags.push(PostHashtag { post_id: 0, hashtag_id: 42 });

        let err = Loader::new(&db).load(&tables).unwrap_err();
        assert!(matches!(err, EtlError::Load { table: Table::PostHashtag, .. }));

        // Earlier tables were committed on their own
        assert_eq!(PostRepository::new(db.pool.clone()).get_all().unwrap().len(), 2);
        assert_eq!(
            AssociationRepository::new(db.pool.clone()).get_mentions().unwrap().len(),
            2
        );
        assert!(AssociationRepository::new(db.pool.clone())
            .get_hashtags()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_missing_schema_fails_on_first_table() {
        let db = Database::in_memory().expect("Failed to create database");
        let err = Loader::new(&db).load(&sample_tables()).unwrap_err();
        assert!(matches!(err, EtlError::Load { table: Table::Author, .. }));
    }
}
