use macros::model;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub use crate::route::{
	comment::model::Comment,
	model::{IdInput, Paginate},
};

/// A single post, written by an administrator.
#[model]
#[derive(Debug, Deserialize, Serialize, JsonSchema, Validate, sqlx::FromRow)]
pub struct Post {
	/// The unique identifier of the post.
	#[serde(skip_deserializing)]
	pub id: i64,
	/// The user that created the post.
	#[serde(skip_deserializing)]
	pub user_id: i64,
	/// The title of the post.
	#[serde(default)]
	#[validate(length(min = 1, message = "title cannot be empty"))]
	pub title: String,
	/// The content of the post as HTML. Embedded images are stored separately
	/// and referenced by path.
	#[serde(default)]
	#[validate(length(min = 1, message = "content cannot be empty"))]
	pub content: String,
	/// The creation time of the post.
	#[serde(skip_deserializing)]
	pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A post together with its comments, oldest comment first.
#[derive(Debug, Serialize, JsonSchema)]
pub struct PostPage {
	#[serde(flatten)]
	pub post: Post,
	pub comments: Vec<Comment>,
}
