use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A coarse permission label, captured on the session at login.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
	User,
	Admin,
}

impl Role {
	/// Roles allowed to create posts.
	pub const AUTHORS: &'static [Self] = &[Self::Admin];
	/// Roles allowed to create comments.
	pub const MEMBERS: &'static [Self] = &[Self::User, Self::Admin];
}

/// A model representing a single user.
///
/// The `password` field is never serialized to the client.
#[derive(Debug, Serialize, JsonSchema, sqlx::FromRow)]
pub struct User {
	pub id: i64,
	pub username: String,
	/// Argon2 hash in PHC string format
	#[serde(skip_serializing)]
	pub password: String,
	pub role: Role,
	pub created_at: chrono::DateTime<chrono::Utc>,
}
