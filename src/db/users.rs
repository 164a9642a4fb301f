use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::User;

/// Insert a user and return it. `password_hash` may be absent for accounts
/// that only ever authenticate through an existing session.
pub fn create(
    conn: &Connection,
    username: &str,
    password_hash: Option<&str>,
) -> Result<User, rusqlite::Error> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO users (id, username, password_hash) VALUES (?1, ?2, ?3)",
        params![id, username, password_hash],
    )?;
    conn.query_row(
        "SELECT id, username, created_at FROM users WHERE id = ?1",
        params![id],
        map_user,
    )
}

pub fn find_by_username(conn: &Connection, username: &str) -> Result<Option<User>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, username, created_at FROM users WHERE username = ?1",
        params![username],
        map_user,
    )
    .optional()
}

/// User plus stored password hash, for login.
pub fn find_credentials(
    conn: &Connection,
    username: &str,
) -> Result<Option<(User, Option<String>)>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, username, created_at, password_hash FROM users WHERE username = ?1",
        params![username],
        |row| Ok((map_user(row)?, row.get(3)?)),
    )
    .optional()
}

pub fn exists(conn: &Connection, username: &str) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )
}

pub fn delete(conn: &Connection, user_id: &str) -> Result<bool, rusqlite::Error> {
    let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
    Ok(rows > 0)
}

fn map_user(row: &rusqlite::Row<'_>) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        created_at: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[test]
    fn create_and_find_user() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let user = create(&conn, "alice", None).unwrap();

        let found = find_by_username(&conn, "alice").unwrap().unwrap();
        assert_eq!(found, user);
        assert!(exists(&conn, "alice").unwrap());
        assert!(find_by_username(&conn, "bob").unwrap().is_none());
    }

    #[test]
    fn usernames_are_unique() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        create(&conn, "alice", None).unwrap();
        assert!(create(&conn, "alice", None).is_err());
    }

    #[test]
    fn credentials_include_hash() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        create(&conn, "alice", Some("$2b$hash")).unwrap();

        let (user, hash) = find_credentials(&conn, "alice").unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(hash.as_deref(), Some("$2b$hash"));
    }
}
