/// Database row types: these map directly to SQLite rows.
/// Distinct from quill-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CategoryRow {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category_id: String,
    pub image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub username: String,
    pub text: String,
    pub created_at: String,
}

/// Fields of a new post. Validation happens before this is built.
#[derive(Debug, Clone)]
pub struct NewPost<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub content: &'a str,
    pub category_id: &'a str,
    pub image_url: Option<&'a str>,
}

/// Partial post update. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category_id: Option<String>,
    pub image_url: Option<String>,
}
