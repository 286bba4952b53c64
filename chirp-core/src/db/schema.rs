/// SQL schema for the Chirp store
/// Table and column names are read by downstream query tools; keep them stable.
pub const SCHEMA: &str = r#"
-- Authors of collected posts
CREATE TABLE IF NOT EXISTS author (
    id INTEGER PRIMARY KEY,
    author_name TEXT NOT NULL
);

-- Posts (twitt_real_id is the identifier assigned by the social network)
CREATE TABLE IF NOT EXISTS twitt (
    id INTEGER PRIMARY KEY,
    author_id INTEGER NOT NULL,
    text TEXT NOT NULL,
    twitt_real_id TEXT NOT NULL,
    FOREIGN KEY (author_id) REFERENCES author(id)
);

-- Users mentioned in posts
CREATE TABLE IF NOT EXISTS muser (
    id INTEGER PRIMARY KEY,
    mentioned_user_name TEXT NOT NULL
);

-- Hashtags (the empty string is a valid hashtag row)
CREATE TABLE IF NOT EXISTS hashtag (
    id INTEGER PRIMARY KEY,
    hashtag_name TEXT NOT NULL
);

-- Post-mention junction table
CREATE TABLE IF NOT EXISTS association_muser_twitt (
    muser_id INTEGER NOT NULL,
    twitt_id INTEGER NOT NULL,
    PRIMARY KEY (muser_id, twitt_id),
    FOREIGN KEY (muser_id) REFERENCES muser(id),
    FOREIGN KEY (twitt_id) REFERENCES twitt(id)
);

-- Post-hashtag junction table
CREATE TABLE IF NOT EXISTS association_hashtag_twitt (
    hashtag_id INTEGER NOT NULL,
    twitt_id INTEGER NOT NULL,
    PRIMARY KEY (hashtag_id, twitt_id),
    FOREIGN KEY (hashtag_id) REFERENCES hashtag(id),
    FOREIGN KEY (twitt_id) REFERENCES twitt(id)
);

-- Indexes for the equality lookups of the query layer
CREATE INDEX IF NOT EXISTS idx_author_name ON author(author_name);
CREATE INDEX IF NOT EXISTS idx_twitt_real_id ON twitt(twitt_real_id);
CREATE INDEX IF NOT EXISTS idx_twitt_author ON twitt(author_id);
CREATE INDEX IF NOT EXISTS idx_muser_name ON muser(mentioned_user_name);
CREATE INDEX IF NOT EXISTS idx_hashtag_name ON hashtag(hashtag_name);
CREATE INDEX IF NOT EXISTS idx_muser_twitt_twitt ON association_muser_twitt(twitt_id);
CREATE INDEX IF NOT EXISTS idx_hashtag_twitt_twitt ON association_hashtag_twitt(twitt_id);
"#;
