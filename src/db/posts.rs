use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::db::models::{GroupRef, Post};
use crate::feed::{FeedFilter, Page};

const SELECT_POSTS: &str = "SELECT p.id, p.text, p.pub_date, p.author_id, u.username,
            p.group_id, g.slug, g.title, p.image
     FROM posts p
     JOIN users u ON u.id = p.author_id
     LEFT JOIN groups g ON g.id = p.group_id";

/// Fields a post submission may set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFields {
    pub text: String,
    pub group_id: Option<i64>,
    /// Relative image path; `None` leaves the stored image untouched on update.
    pub image: Option<String>,
}

pub fn create(conn: &Connection, author_id: &str, fields: &PostFields) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO posts (text, author_id, group_id, image) VALUES (?1, ?2, ?3, ?4)",
        params![
            fields.text,
            author_id,
            fields.group_id,
            fields.image.as_deref().unwrap_or("")
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Update text, group and (when given) image. `pub_date` and author never change.
pub fn update(conn: &Connection, post_id: i64, fields: &PostFields) -> Result<bool, rusqlite::Error> {
    let rows = match fields.image.as_deref() {
        Some(image) => conn.execute(
            "UPDATE posts SET text = ?1, group_id = ?2, image = ?3 WHERE id = ?4",
            params![fields.text, fields.group_id, image, post_id],
        )?,
        None => conn.execute(
            "UPDATE posts SET text = ?1, group_id = ?2 WHERE id = ?3",
            params![fields.text, fields.group_id, post_id],
        )?,
    };
    Ok(rows > 0)
}

pub fn find_by_id(conn: &Connection, post_id: i64) -> Result<Option<Post>, rusqlite::Error> {
    conn.query_row(
        &format!("{} WHERE p.id = ?1", SELECT_POSTS),
        params![post_id],
        map_post,
    )
    .optional()
}

pub fn delete(conn: &Connection, post_id: i64) -> Result<bool, rusqlite::Error> {
    let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![post_id])?;
    Ok(rows > 0)
}

pub fn count(conn: &Connection) -> Result<i64, rusqlite::Error> {
    conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))
}

pub fn count_by_author(conn: &Connection, author_id: &str) -> Result<i64, rusqlite::Error> {
    conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE author_id = ?1",
        params![author_id],
        |row| row.get(0),
    )
}

/// One page of posts matching `filter`, newest first.
pub fn feed(
    conn: &Connection,
    filter: &FeedFilter,
    number: u32,
    page_size: u32,
) -> Result<Page<Post>, rusqlite::Error> {
    let (clause, mut args) = filter_clause(filter);

    let total: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM posts p
             JOIN users u ON u.id = p.author_id
             LEFT JOIN groups g ON g.id = p.group_id {}",
            clause
        ),
        params_from_iter(args.iter()),
        |row| row.get(0),
    )?;
    let total = total.max(0) as u64;

    let Some(offset) = Page::<Post>::offset(number, total, page_size) else {
        return Ok(Page::empty(number, total, page_size));
    };

    let limit_idx = args.len() + 1;
    args.push(Value::Integer(i64::from(page_size)));
    args.push(Value::Integer(offset as i64));

    let sql = format!(
        "{} {} ORDER BY p.pub_date DESC, p.id DESC LIMIT ?{} OFFSET ?{}",
        SELECT_POSTS,
        clause,
        limit_idx,
        limit_idx + 1
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params_from_iter(args.iter()), map_post)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page {
        number,
        items,
        total,
        page_size,
    })
}

fn filter_clause(filter: &FeedFilter) -> (&'static str, Vec<Value>) {
    match filter {
        FeedFilter::All => ("", Vec::new()),
        FeedFilter::Group(slug) => ("WHERE g.slug = ?1", vec![Value::Text(slug.clone())]),
        FeedFilter::Author(username) => {
            ("WHERE u.username = ?1", vec![Value::Text(username.clone())])
        }
        FeedFilter::FollowedBy(user_id) => (
            "WHERE p.author_id IN (SELECT author_id FROM follows WHERE user_id = ?1)",
            vec![Value::Text(user_id.clone())],
        ),
    }
}

fn map_post(row: &rusqlite::Row<'_>) -> Result<Post, rusqlite::Error> {
    let group_id: Option<i64> = row.get(5)?;
    let group = match group_id {
        Some(id) => Some(GroupRef {
            id,
            slug: row.get(6)?,
            title: row.get(7)?,
        }),
        None => None,
    };

    Ok(Post {
        id: row.get(0)?,
        text: row.get(1)?,
        pub_date: row.get(2)?,
        author_id: row.get(3)?,
        author_username: row.get(4)?,
        group,
        image: row.get(8)?,
    })
}
