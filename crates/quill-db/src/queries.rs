use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::models::{CategoryRow, CommentRow, NewPost, PostChanges, PostRow, UserRow};
use crate::{Database, DbError, FOLD_CASE_FN, Result};

const USER_COLUMNS: &str = "id, username, email, password, created_at";
const POST_COLUMNS: &str = "id, title, content, category_id, image_url, created_at, updated_at";

/// Fixed-width UTC timestamp, so text ordering matches time ordering.
fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<UserRow> {
        let created_at = now();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, username, email, password_hash, created_at],
            )
            .map_err(|e| {
                DbError::unique_violation(e, &[("users.username", "username"), ("users.email", "email")])
            })?;
            Ok(())
        })?;

        Ok(UserRow {
            id: id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password: password_hash.to_string(),
            created_at,
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Categories --

    pub fn create_category(&self, id: &str, name: &str) -> Result<CategoryRow> {
        let created_at = now();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO categories (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![id, name, created_at],
            )?;
            Ok(())
        })?;

        Ok(CategoryRow {
            id: id.to_string(),
            name: name.to_string(),
            created_at,
        })
    }

    pub fn list_categories(&self) -> Result<Vec<CategoryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, created_at FROM categories ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt
                .query_map([], category_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch categories for a set of ids. Unknown ids are skipped.
    pub fn get_categories_by_ids(&self, ids: &[String]) -> Result<Vec<CategoryRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, name, created_at FROM categories WHERE id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> =
                ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();

            let rows = stmt
                .query_map(params.as_slice(), category_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Posts --

    pub fn create_post(&self, post: &NewPost<'_>) -> Result<PostRow> {
        let created_at = now();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO posts (id, title, content, category_id, image_url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    post.id,
                    post.title,
                    post.content,
                    post.category_id,
                    post.image_url,
                    created_at
                ],
            )?;
            Ok(())
        })?;

        Ok(PostRow {
            id: post.id.to_string(),
            title: post.title.to_string(),
            content: post.content.to_string(),
            category_id: post.category_id.to_string(),
            image_url: post.image_url.map(str::to_string),
            updated_at: created_at.clone(),
            created_at,
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// Newest first. `search` is matched case-insensitively against titles;
    /// `page` is 1-based.
    pub fn list_posts(&self, search: Option<&str>, page: u32, limit: u32) -> Result<Vec<PostRow>> {
        let needle = search.map(str::to_lowercase);
        let offset = u64::from(page.saturating_sub(1)) * u64::from(limit);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {POST_COLUMNS} FROM posts
                 WHERE ?1 IS NULL OR instr({FOLD_CASE_FN}(title), ?1) > 0
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![needle, limit, offset], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Apply `changes` and return the updated row, or `None` for an unknown id.
    pub fn update_post(&self, id: &str, changes: &PostChanges) -> Result<Option<PostRow>> {
        let updated_at = now();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                "UPDATE posts SET
                    title       = COALESCE(?2, title),
                    content     = COALESCE(?3, content),
                    category_id = COALESCE(?4, category_id),
                    image_url   = COALESCE(?5, image_url),
                    updated_at  = ?6
                 WHERE id = ?1",
                params![
                    id,
                    changes.title,
                    changes.content,
                    changes.category_id,
                    changes.image_url,
                    updated_at
                ],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            let row = query_post(&tx, id)?;
            tx.commit()?;
            Ok(row)
        })
    }

    /// Returns `false` when no post had this id.
    pub fn delete_post(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    // -- Comments --

    pub fn create_comment(
        &self,
        id: &str,
        post_id: &str,
        username: &str,
        text: &str,
    ) -> Result<CommentRow> {
        let created_at = now();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO comments (id, post_id, username, text, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, post_id, username, text, created_at],
            )?;
            Ok(())
        })?;

        Ok(CommentRow {
            id: id.to_string(),
            post_id: post_id.to_string(),
            username: username.to_string(),
            text: text.to_string(),
            created_at,
        })
    }

    /// Oldest first.
    pub fn list_comments(&self, post_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, post_id, username, text, created_at FROM comments
                 WHERE post_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt
                .query_map([post_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        username: row.get(2)?,
                        text: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// `column` is always one of our own literals, never user input.
fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_post(conn: &Connection, id: &str) -> Result<Option<PostRow>> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1");
    let row = conn.query_row(&sql, [id], post_from_row).optional()?;
    Ok(row)
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        category_id: row.get(3)?,
        image_url: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<CategoryRow> {
    Ok(CategoryRow {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn id() -> String {
        Uuid::new_v4().to_string()
    }

    fn seed_post(db: &Database, title: &str, category_id: &str) -> PostRow {
        let id = id();
        db.create_post(&NewPost {
            id: &id,
            title,
            content: "body",
            category_id,
            image_url: None,
        })
        .unwrap()
    }

    #[test]
    fn duplicate_username_and_email_are_conflicts() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&id(), "ana", "ana@example.com", "hash").unwrap();

        let err = db.create_user(&id(), "ana", "other@example.com", "hash").unwrap_err();
        assert!(matches!(err, DbError::Conflict("username")));

        let err = db.create_user(&id(), "bob", "ana@example.com", "hash").unwrap_err();
        assert!(matches!(err, DbError::Conflict("email")));
    }

    #[test]
    fn user_lookups() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user(&id(), "ana", "ana@example.com", "hash").unwrap();

        assert_eq!(db.get_user_by_email("ana@example.com").unwrap().unwrap().id, user.id);
        assert_eq!(db.get_user_by_username("ana").unwrap().unwrap().id, user.id);
        assert_eq!(db.get_user_by_id(&user.id).unwrap().unwrap().username, "ana");
        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn list_posts_pages_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let cat = id();
        let titles: Vec<String> = (0..12).map(|i| format!("post {i}")).collect();
        for title in &titles {
            seed_post(&db, title, &cat);
        }

        let page1 = db.list_posts(None, 1, 5).unwrap();
        let page2 = db.list_posts(None, 2, 5).unwrap();
        let page3 = db.list_posts(None, 3, 5).unwrap();

        assert_eq!(page1.len(), 5);
        assert_eq!(page2.len(), 5);
        assert_eq!(page3.len(), 2);
        assert_eq!(page1[0].title, "post 11");
        assert_eq!(page2[0].title, "post 6");
        assert_eq!(page3[1].title, "post 0");

        let again: Vec<String> = db.list_posts(None, 2, 5).unwrap().into_iter().map(|p| p.id).collect();
        let first: Vec<String> = page2.into_iter().map(|p| p.id).collect();
        assert_eq!(again, first);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let db = Database::open_in_memory().unwrap();
        let cat = id();
        seed_post(&db, "Learning Rust", &cat);
        seed_post(&db, "RUSTY nails", &cat);
        seed_post(&db, "Gardening", &cat);
        seed_post(&db, "Ölwechsel", &cat);

        let mut hits: Vec<String> = db
            .list_posts(Some("rust"), 1, 10)
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        hits.sort();
        assert_eq!(hits, vec!["Learning Rust", "RUSTY nails"]);

        let hits = db.list_posts(Some("ÖL"), 1, 10).unwrap();
        assert_eq!(hits.len(), 1);

        assert!(db.list_posts(Some("%"), 1, 10).unwrap().is_empty());
    }

    #[test]
    fn update_post_applies_only_given_fields() {
        let db = Database::open_in_memory().unwrap();
        let post = seed_post(&db, "Original", &id());

        let changes = PostChanges {
            title: Some("Renamed".into()),
            image_url: Some("/uploads/x.png".into()),
            ..Default::default()
        };
        let updated = db.update_post(&post.id, &changes).unwrap().unwrap();

        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.content, "body");
        assert_eq!(updated.category_id, post.category_id);
        assert_eq!(updated.image_url.as_deref(), Some("/uploads/x.png"));
        assert!(updated.updated_at >= post.updated_at);

        assert!(db.update_post(&id(), &changes).unwrap().is_none());
    }

    #[test]
    fn delete_post_reports_missing() {
        let db = Database::open_in_memory().unwrap();
        let post = seed_post(&db, "Doomed", &id());

        assert!(db.delete_post(&post.id).unwrap());
        assert!(!db.delete_post(&post.id).unwrap());
        assert!(db.get_post(&post.id).unwrap().is_none());
    }

    #[test]
    fn category_batch_lookup_skips_unknown_ids() {
        let db = Database::open_in_memory().unwrap();
        let a = db.create_category(&id(), "Tech").unwrap();
        let b = db.create_category(&id(), "Life").unwrap();

        let found = db
            .get_categories_by_ids(&[a.id.clone(), id(), b.id.clone()])
            .unwrap();
        assert_eq!(found.len(), 2);

        let names: Vec<String> = db.list_categories().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Tech", "Life"]);
    }

    #[test]
    fn comments_list_by_post_oldest_first() {
        let db = Database::open_in_memory().unwrap();
        let post_a = id();
        let post_b = id();
        db.create_comment(&id(), &post_a, "ana", "first").unwrap();
        db.create_comment(&id(), &post_b, "bob", "elsewhere").unwrap();
        db.create_comment(&id(), &post_a, "bob", "second").unwrap();

        let texts: Vec<String> = db
            .list_comments(&post_a)
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn file_database_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill.db");

        let cat_id = id();
        {
            let db = Database::open(&path).unwrap();
            db.create_category(&cat_id, "Travel").unwrap();
        }

        let db = Database::open(&path).unwrap();
        let found = db.get_categories_by_ids(&[cat_id]).unwrap();
        assert_eq!(found[0].name, "Travel");
    }
}
