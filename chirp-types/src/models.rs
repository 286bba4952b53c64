use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Custom serde module for DateTime to ensure RFC3339 string format
mod datetime_format {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = date.to_rfc3339();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<DateTime<Utc>>().map_err(serde::de::Error::custom)
    }
}

// Flat file timestamps: RFC3339 on write; on read also the naive
// `YYYY-MM-DD HH:MM:SS` form (taken as UTC) and an empty cell.
mod flat_datetime {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(date) => serializer.serialize_str(&date.to_rfc3339()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        parse(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse(s: &str) -> Result<Option<DateTime<Utc>>, String> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }
        if let Ok(date) = DateTime::parse_from_rfc3339(s) {
            return Ok(Some(date.with_timezone(&Utc)));
        }
        if let Ok(date) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
            return Ok(Some(date.with_timezone(&Utc)));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
            .map(|naive| Some(naive.and_utc()))
            .ok_or_else(|| format!("unrecognized timestamp {:?}", s))
    }
}

/// One post as handed over by the search collaborator, before flattening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
    pub external_id: String,
    pub author_name: String,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    pub text: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
}

/// One row of the flat file: a post paired with exactly one hashtag and one
/// mention. Either value may be the empty placeholder.
///
/// `created_at` is carried for reference only; an empty cell
/// reads as `None`.
///
/// Field names map onto the flat file header
/// `id,author_name,created_at,text,hashtags,user_mentions`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlatRow {
    #[serde(rename = "id")]
    pub external_id: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(with = "flat_datetime", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "hashtags", default)]
    pub hashtag: String,
    #[serde(rename = "user_mentions", default)]
    pub mention: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub author_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    /// Identifier assigned by the social network (`twitt_real_id` in the store)
    pub external_id: String,
    pub text: String,
    pub author_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionedUser {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hashtag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostMention {
    pub post_id: i64,
    pub mentioned_user_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostHashtag {
    pub post_id: i64,
    pub hashtag_id: i64,
}

/// Result row of the hashtag -> post traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashtagPost {
    pub hashtag_name: String,
    pub twitt_real_id: String,
    pub text: String,
}
