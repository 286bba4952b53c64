use anyhow::{Context, Result};
use chirp_types::{MentionedUser, Table};

use super::next_id;
use crate::db::DbPool;

pub struct MentionedUserRepository {
    pool: DbPool,
}

impl MentionedUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn next_id(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        next_id(&conn, Table::MentionedUser)
    }

    pub fn append(&self, users: &[MentionedUser]) -> Result<usize> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction().context("Failed to start transaction")?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO muser (id, mentioned_user_name) VALUES (?, ?)")?;
            for user in users {
                stmt.execute((user.id, &user.name))
                    .with_context(|| format!("Failed to insert mentioned user {:?}", user.name))?;
            }
        }
        tx.commit().context("Failed to commit mentioned users")?;
        Ok(users.len())
    }

    pub fn get_all(&self) -> Result<Vec<MentionedUser>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT id, mentioned_user_name FROM muser ORDER BY id")?;
        let users = stmt
            .query_map([], |row| {
                Ok(MentionedUser {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }
}
