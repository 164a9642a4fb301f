use rusqlite::{params, Connection};

use crate::db::models::Comment;

pub fn create(
    conn: &Connection,
    post_id: i64,
    author_id: &str,
    text: &str,
) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO comments (text, post_id, author_id) VALUES (?1, ?2, ?3)",
        params![text, post_id, author_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Comments on a post, newest first.
pub fn for_post(conn: &Connection, post_id: i64) -> Result<Vec<Comment>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.text, c.post_id, c.author_id, u.username, c.created
         FROM comments c
         LEFT JOIN users u ON u.id = c.author_id
         WHERE c.post_id = ?1
         ORDER BY c.created DESC, c.id DESC",
    )?;

    let comments = stmt
        .query_map(params![post_id], |row| {
            Ok(Comment {
                id: row.get(0)?,
                text: row.get(1)?,
                post_id: row.get(2)?,
                author_id: row.get(3)?,
                author_username: row.get(4)?,
                created: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(comments)
}

pub fn count(conn: &Connection) -> Result<i64, rusqlite::Error> {
    conn.query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))
}
