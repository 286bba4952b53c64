use serde::{Deserialize, Serialize};

use crate::enums::Table;
use crate::models::{Author, Hashtag, MentionedUser, Post, PostHashtag, PostMention};

/// The six tables derived from one flat file, ready to be appended to the store.
///
/// Every foreign key in `posts`, `post_mentions` and `post_hashtags` refers to
/// an `id` present in the matching parent vector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTables {
    pub authors: Vec<Author>,
    pub posts: Vec<Post>,
    pub mentioned_users: Vec<MentionedUser>,
    pub hashtags: Vec<Hashtag>,
    pub post_mentions: Vec<PostMention>,
    pub post_hashtags: Vec<PostHashtag>,
}

impl NormalizedTables {
    pub fn row_count(&self, table: Table) -> usize {
        match table {
            Table::Author => self.authors.len(),
            Table::MentionedUser => self.mentioned_users.len(),
            Table::Hashtag => self.hashtags.len(),
            Table::Post => self.posts.len(),
            Table::PostMention => self.post_mentions.len(),
            Table::PostHashtag => self.post_hashtags.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        Table::LOAD_ORDER.iter().all(|t| self.row_count(*t) == 0)
    }
}
