//! Boundary to the social network search collaborator.
//!
//! A [`PostSource`] turns a query into a lazy, bounded sequence of raw posts.
//! Two sources ship with the crate: a JSON Lines dump reader and a blocking
//! client for a v1.1-style `search/tweets.json` endpoint that waits out rate
//! limits a bounded number of times.

use chirp_types::RawPost;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Collect;
use crate::error::{EtlError, EtlResult};

/// Largest page the search endpoint hands out
const MAX_PAGE_SIZE: usize = 100;
/// Upper bound on a single rate-limit wait
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(15 * 60);
const TWITTER_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

pub type PostIter<'a> = Box<dyn Iterator<Item = EtlResult<RawPost>> + 'a>;

/// Produces at most `count` raw posts matching `query`
pub trait PostSource {
    fn posts<'a>(&'a mut self, query: &str, count: usize) -> PostIter<'a>;
}

/// Drain a source completely; the first error aborts the whole collection
pub fn collect_posts(
    source: &mut dyn PostSource,
    query: &str,
    count: usize,
) -> EtlResult<Vec<RawPost>> {
    let posts = source.posts(query, count).collect::<EtlResult<Vec<_>>>()?;
    tracing::info!("Collected {} posts for query {:?}", posts.len(), query);
    Ok(posts)
}

/// Raw posts previously dumped as one JSON object per line.
/// The dump is already a query result, so `query` is not applied again.
pub struct JsonLinesSource {
    path: PathBuf,
}

impl JsonLinesSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PostSource for JsonLinesSource {
    fn posts<'a>(&'a mut self, _query: &str, count: usize) -> PostIter<'a> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                let err = EtlError::Collection(format!(
                    "cannot open {}: {}",
                    self.path.display(),
                    e
                ));
                return Box::new(std::iter::once(Err(err)));
            }
        };

        let lines = BufReader::new(file)
            .lines()
            .enumerate()
            .filter(|(_, line)| !matches!(line, Ok(l) if l.trim().is_empty()))
            .map(|(i, line)| {
                let line = line.map_err(|e| EtlError::Collection(e.to_string()))?;
                serde_json::from_str::<RawPost>(&line).map_err(|e| {
                    EtlError::Collection(format!("line {}: {}", i + 1, e))
                })
            })
            .take(count);
        Box::new(lines)
    }
}

/// Blocking client for the search endpoint
pub struct SearchApiSource {
    client: reqwest::blocking::Client,
    base_url: String,
    bearer_token: Option<String>,
    max_rate_limit_waits: u32,
}

impl SearchApiSource {
    pub fn new(settings: &Collect) -> EtlResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EtlError::Collection(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            bearer_token: settings.bearer_token.clone(),
            max_rate_limit_waits: settings.max_rate_limit_waits,
        })
    }

    fn fetch_page(
        &self,
        query: &str,
        page_size: usize,
        max_id: Option<u64>,
    ) -> EtlResult<Vec<Status>> {
        let url = format!("{}/search/tweets.json", self.base_url);
        let count = page_size.to_string();
        let mut waits = 0;

        loop {
            let mut request = self
                .client
                .get(&url)
                .query(&[("q", query), ("count", count.as_str())]);
            if let Some(max_id) = max_id {
                request = request.query(&[("max_id", max_id.to_string())]);
            }
            if let Some(token) = &self.bearer_token {
                request = request.bearer_auth(token);
            }

            let response = request
                .send()
                .map_err(|e| EtlError::Collection(format!("search request failed: {}", e)))?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if waits >= self.max_rate_limit_waits {
                    return Err(EtlError::Collection(format!(
                        "still rate limited after {} waits",
                        waits
                    )));
                }
                let reset = response
                    .headers()
                    .get("x-rate-limit-reset")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<i64>().ok());
                let wait = rate_limit_wait(reset, Utc::now());
                waits += 1;
                tracing::warn!(
                    "Search API rate limited, waiting {}s (wait {} of {})",
                    wait.as_secs(),
                    waits,
                    self.max_rate_limit_waits
                );
                std::thread::sleep(wait);
                continue;
            }

            if !response.status().is_success() {
                return Err(EtlError::Collection(format!(
                    "search API returned {}",
                    response.status()
                )));
            }

            let page: SearchResponse = response
                .json()
                .map_err(|e| EtlError::Collection(format!("invalid search response: {}", e)))?;
            return Ok(page.statuses);
        }
    }
}

impl PostSource for SearchApiSource {
    fn posts<'a>(&'a mut self, query: &str, count: usize) -> PostIter<'a> {
        Box::new(SearchCursor {
            source: self,
            query: query.to_string(),
            remaining: count,
            buffer: VecDeque::new(),
            max_id: None,
            exhausted: false,
        })
    }
}

/// Pages backwards through search results using `max_id`
struct SearchCursor<'a> {
    source: &'a SearchApiSource,
    query: String,
    remaining: usize,
    buffer: VecDeque<RawPost>,
    max_id: Option<u64>,
    exhausted: bool,
}

impl Iterator for SearchCursor<'_> {
    type Item = EtlResult<RawPost>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        if self.buffer.is_empty() {
            if self.exhausted {
                return None;
            }
            let page_size = self.remaining.min(MAX_PAGE_SIZE);
            let statuses = match self.source.fetch_page(&self.query, page_size, self.max_id) {
                Ok(statuses) => statuses,
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            };
            if statuses.is_empty() {
                self.exhausted = true;
                return None;
            }

            if let Some(oldest) = statuses.iter().map(|s| s.id).min() {
                self.max_id = oldest.checked_sub(1);
                if self.max_id.is_none() {
                    self.exhausted = true;
                }
            }
            for status in statuses {
                match status.into_raw_post() {
                    Ok(post) => self.buffer.push_back(post),
                    Err(e) => {
                        self.exhausted = true;
                        self.buffer.clear();
                        return Some(Err(e));
                    }
                }
            }
        }

        let post = self.buffer.pop_front()?;
        self.remaining -= 1;
        Some(Ok(post))
    }
}

/// How long to sleep given the `x-rate-limit-reset` epoch seconds
fn rate_limit_wait(reset_epoch: Option<i64>, now: DateTime<Utc>) -> Duration {
    let seconds = reset_epoch
        .map(|reset| reset - now.timestamp())
        .unwrap_or(60)
        .max(1) as u64;
    Duration::from_secs(seconds).min(MAX_RATE_LIMIT_WAIT)
}

fn parse_twitter_timestamp(value: &str) -> EtlResult<DateTime<Utc>> {
    DateTime::parse_from_str(value, TWITTER_TIME_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EtlError::Collection(format!("bad created_at {:?}: {}", value, e)))
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    statuses: Vec<Status>,
}

#[derive(Debug, Deserialize)]
struct Status {
    id: u64,
    id_str: String,
    created_at: String,
    #[serde(alias = "full_text")]
    text: String,
    user: StatusUser,
    #[serde(default)]
    entities: Entities,
}

#[derive(Debug, Deserialize)]
struct StatusUser {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct Entities {
    #[serde(default)]
    hashtags: Vec<HashtagEntity>,
    #[serde(default)]
    user_mentions: Vec<MentionEntity>,
}

#[derive(Debug, Deserialize)]
struct HashtagEntity {
    text: String,
}

#[derive(Debug, Deserialize)]
struct MentionEntity {
    name: String,
}

impl Status {
    fn into_raw_post(self) -> EtlResult<RawPost> {
        Ok(RawPost {
            external_id: self.id_str,
            author_name: self.user.name,
            created_at: parse_twitter_timestamp(&self.created_at)?,
            text: self.text,
            hashtags: self.entities.hashtags.into_iter().map(|h| h.text).collect(),
            mentions: self
                .entities
                .user_mentions
                .into_iter()
                .map(|m| m.name)
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    const STATUS_JSON: &str = r#"{
        "id": 1237345678901234567,
        "id_str": "1237345678901234567",
        "created_at": "Tue Mar 10 12:00:00 +0000 2020",
        "text": "Nowe informacje #koronawirus @MZ_GOV_PL",
        "user": {"name": "TVN24 BiS", "screen_name": "tvn24bis"},
        "entities": {
            "hashtags": [{"text": "koronawirus", "indices": [16, 28]}],
            "user_mentions": [{"name": "Ministerstwo Zdrowia", "screen_name": "MZ_GOV_PL"}]
        }
    }"#;

    #[test]
    fn test_status_maps_to_raw_post() {
        let status: Status = serde_json::from_str(STATUS_JSON).unwrap();
        let post = status.into_raw_post().unwrap();

        assert_eq!(post.external_id, "1237345678901234567");
        assert_eq!(post.author_name, "TVN24 BiS");
        assert_eq!(post.created_at, Utc.with_ymd_and_hms(2020, 3, 10, 12, 0, 0).unwrap());
        assert_eq!(post.hashtags, vec!["koronawirus"]);
        assert_eq!(post.mentions, vec!["Ministerstwo Zdrowia"]);
    }

    #[test]
    fn test_status_without_entities() {
        let json = r#"{"id": 5, "id_str": "5", "created_at": "Tue Mar 10 12:00:00 +0000 2020",
                       "full_text": "plain", "user": {"name": "A"}}"#;
        let post = serde_json::from_str::<Status>(json).unwrap().into_raw_post().unwrap();
        assert_eq!(post.text, "plain");
        assert!(post.hashtags.is_empty());
        assert!(post.mentions.is_empty());
    }

    #[test]
    fn test_bad_timestamp_is_collection_error() {
        let err = parse_twitter_timestamp("2020-03-10").unwrap_err();
        assert!(matches!(err, EtlError::Collection(_)));
    }

    #[test]
    fn test_rate_limit_wait() {
        let now = Utc.with_ymd_and_hms(2020, 3, 10, 12, 0, 0).unwrap();
        let reset = now.timestamp() + 90;
        assert_eq!(rate_limit_wait(Some(reset), now), Duration::from_secs(90));
        // Reset already passed: retry almost immediately
        assert_eq!(rate_limit_wait(Some(reset - 600), now), Duration::from_secs(1));
        assert_eq!(rate_limit_wait(None, now), Duration::from_secs(60));
        assert_eq!(rate_limit_wait(Some(reset + 86_400), now), MAX_RATE_LIMIT_WAIT);
    }

    fn write_dump(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_json_lines_source_respects_count() {
        let line = |id: u32| {
            format!(
                r#"{{"external_id":"{}","author_name":"A","created_at":"2020-03-10T12:00:00Z","text":"t","hashtags":["x"],"mentions":[]}}"#,
                id
            )
        };
        let lines: Vec<String> = (1..=3).map(line).collect();
        let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
        let dump = write_dump(&refs);

        let mut source = JsonLinesSource::new(dump.path());
        let posts = collect_posts(&mut source, "ignored", 2).unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].external_id, "2");

        let all = collect_posts(&mut source, "ignored", 10).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_json_lines_source_skips_blank_lines() {
        let dump = write_dump(&[
            r#"{"external_id":"1","author_name":"A","created_at":"2020-03-10T12:00:00Z","text":"t"}"#,
            "",
            "   ",
        ]);
        let posts = collect_posts(&mut JsonLinesSource::new(dump.path()), "", 10).unwrap();
        assert_eq!(posts.len(), 1);
    }

    #[test]
    fn test_malformed_line_aborts_collection() {
        let dump = write_dump(&[
            r#"{"external_id":"1","author_name":"A","created_at":"2020-03-10T12:00:00Z","text":"t"}"#,
            "{not json",
        ]);
        let err = collect_posts(&mut JsonLinesSource::new(dump.path()), "", 10).unwrap_err();
        match err {
            EtlError::Collection(msg) => assert!(msg.starts_with("line 2")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_dump_is_collection_error() {
        let mut source = JsonLinesSource::new("/nonexistent/dump.jsonl");
        assert!(matches!(
            collect_posts(&mut source, "", 10),
            Err(EtlError::Collection(_))
        ));
    }
}
