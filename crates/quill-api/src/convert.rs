//! Row -> wire model conversion. Corrupt stored values are logged and
//! replaced with defaults rather than failing the whole response.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use quill_db::models::{CategoryRow, CommentRow, PostRow};
use quill_types::models::{Category, Comment, Post, PostCategory};

fn uuid(value: &str, what: &str, owner: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on '{}': {}", what, value, owner, e);
        Uuid::default()
    })
}

fn timestamp(value: &str, owner: &str) -> DateTime<Utc> {
    value.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt timestamp '{}' on '{}': {}", value, owner, e);
        DateTime::default()
    })
}

pub(crate) fn category(row: CategoryRow) -> Category {
    Category {
        id: uuid(&row.id, "category id", &row.id),
        created_at: timestamp(&row.created_at, &row.id),
        name: row.name,
    }
}

/// `category` is the resolved reference, or `None` when it dangles.
pub(crate) fn post(row: PostRow, category: Option<PostCategory>) -> Post {
    Post {
        id: uuid(&row.id, "post id", &row.id),
        category_id: uuid(&row.category_id, "category_id", &row.id),
        created_at: timestamp(&row.created_at, &row.id),
        updated_at: timestamp(&row.updated_at, &row.id),
        title: row.title,
        content: row.content,
        category,
        image_url: row.image_url,
    }
}

pub(crate) fn comment(row: CommentRow) -> Comment {
    Comment {
        id: uuid(&row.id, "comment id", &row.id),
        post_id: uuid(&row.post_id, "post_id", &row.id),
        created_at: timestamp(&row.created_at, &row.id),
        username: row.username,
        text: row.text,
    }
}
