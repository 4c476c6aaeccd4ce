use macros::model;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A comment on a post, written by any signed-in user.
#[model]
#[derive(Debug, Deserialize, Serialize, JsonSchema, Validate, sqlx::FromRow)]
pub struct Comment {
	#[serde(skip_deserializing)]
	pub id: i64,
	/// The post being commented on.
	#[serde(alias = "postId", default)]
	#[validate(range(min = 1, message = "post is required"))]
	pub post_id: i64,
	#[serde(skip_deserializing)]
	pub user_id: i64,
	/// The author's username when the comment was written.
	#[serde(skip_deserializing)]
	pub username: String,
	/// The content of the comment as HTML.
	#[serde(default)]
	#[validate(length(min = 1, message = "comment cannot be empty"))]
	pub content: String,
	#[serde(skip_deserializing)]
	pub created_at: chrono::DateTime<chrono::Utc>,
}
