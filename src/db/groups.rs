use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::Group;

pub fn create(
    conn: &Connection,
    title: &str,
    slug: &str,
    description: &str,
) -> Result<Group, rusqlite::Error> {
    conn.execute(
        "INSERT INTO groups (title, slug, description) VALUES (?1, ?2, ?3)",
        params![title, slug, description],
    )?;
    Ok(Group {
        id: conn.last_insert_rowid(),
        title: title.to_string(),
        slug: slug.to_string(),
        description: description.to_string(),
    })
}

pub fn find_by_slug(conn: &Connection, slug: &str) -> Result<Option<Group>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, title, slug, description FROM groups WHERE slug = ?1",
        params![slug],
        map_group,
    )
    .optional()
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Group>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, title, slug, description FROM groups WHERE id = ?1",
        params![id],
        map_group,
    )
    .optional()
}

/// All groups ordered by title, for the group picker on the post form.
pub fn list(conn: &Connection) -> Result<Vec<Group>, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT id, title, slug, description FROM groups ORDER BY title, id")?;
    let groups = stmt
        .query_map([], map_group)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(groups)
}

pub fn delete(conn: &Connection, id: i64) -> Result<bool, rusqlite::Error> {
    let rows = conn.execute("DELETE FROM groups WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

fn map_group(row: &rusqlite::Row<'_>) -> Result<Group, rusqlite::Error> {
    Ok(Group {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
    })
}
