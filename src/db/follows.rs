use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::Follow;

/// Create the edge `user_id -> author_id`. Repeating a follow, or following
/// yourself, changes nothing. Returns whether a new edge was written.
pub fn follow(conn: &Connection, user_id: &str, author_id: &str) -> Result<bool, rusqlite::Error> {
    if user_id == author_id {
        return Ok(false);
    }
    let rows = conn.execute(
        "INSERT OR IGNORE INTO follows (user_id, author_id) VALUES (?1, ?2)",
        params![user_id, author_id],
    )?;
    Ok(rows > 0)
}

/// Remove the edge if present. Returns whether anything was deleted.
pub fn unfollow(conn: &Connection, user_id: &str, author_id: &str) -> Result<bool, rusqlite::Error> {
    let rows = conn.execute(
        "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
    )?;
    Ok(rows > 0)
}

pub fn find(
    conn: &Connection,
    user_id: &str,
    author_id: &str,
) -> Result<Option<Follow>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, user_id, author_id FROM follows WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
        |row| {
            Ok(Follow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                author_id: row.get(2)?,
            })
        },
    )
    .optional()
}

pub fn is_following(conn: &Connection, user_id: &str, author_id: &str) -> Result<bool, rusqlite::Error> {
    Ok(find(conn, user_id, author_id)?.is_some())
}

pub fn count(conn: &Connection) -> Result<i64, rusqlite::Error> {
    conn.query_row("SELECT COUNT(*) FROM follows", [], |row| row.get(0))
}
