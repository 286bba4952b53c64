use serde::{Deserialize, Serialize};

/// Tables of the relational store, named as the store names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Author,
    MentionedUser,
    Hashtag,
    Post,
    PostMention,
    PostHashtag,
}

impl Table {
    /// Parent tables first, association tables last.
    pub const LOAD_ORDER: [Table; 6] = [
        Table::Author,
        Table::MentionedUser,
        Table::Hashtag,
        Table::Post,
        Table::PostMention,
        Table::PostHashtag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Author => "author",
            Table::MentionedUser => "muser",
            Table::Hashtag => "hashtag",
            Table::Post => "twitt",
            Table::PostMention => "association_muser_twitt",
            Table::PostHashtag => "association_hashtag_twitt",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::LOAD_ORDER
            .into_iter()
            .find(|table| table.as_str().eq_ignore_ascii_case(s.trim()))
    }

    pub fn is_association(&self) -> bool {
        matches!(self, Table::PostMention | Table::PostHashtag)
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_order_puts_associations_last() {
        let first_association = Table::LOAD_ORDER
            .iter()
            .position(|t| t.is_association())
            .unwrap();
        assert!(Table::LOAD_ORDER[..first_association]
            .iter()
            .all(|t| !t.is_association()));
        assert!(Table::LOAD_ORDER[first_association..]
            .iter()
            .all(|t| t.is_association()));
    }

    #[test]
    fn test_parse_round_trips_names() {
        for table in Table::LOAD_ORDER {
            assert_eq!(Table::parse(table.as_str()), Some(table));
        }
        assert_eq!(Table::parse(" TWITT "), Some(Table::Post));
        assert_eq!(Table::parse("users"), None);
    }
}
