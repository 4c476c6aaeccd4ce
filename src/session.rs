//! Server-side sessions, keyed by a random id carried in the session cookie.

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::{model::Role, Database};

pub const COOKIE_NAME: &str = "session";

/// A resolved, unexpired session joined with its user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
	pub id: Uuid,
	pub user_id: i64,
	/// The username as it is now, not when the session was created.
	pub username: String,
	/// The role captured when the session was created.
	pub role: Role,
	pub expires_at: i64,
}

/// Creates a session cookie that expires together with the session
pub fn create_cookie(session_id: Uuid, ttl: Duration) -> cookie::Cookie<'static> {
	cookie::Cookie::build((COOKIE_NAME, session_id.to_string()))
		.secure(!cfg!(debug_assertions))
		.http_only(true)
		.same_site(cookie::SameSite::Lax)
		.path("/")
		.max_age(cookie::time::Duration::seconds(
			i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
		))
		.into()
}

/// Creates an empty session cookie used to invalidate a previous one
pub fn clear_cookie() -> cookie::Cookie<'static> {
	cookie::Cookie::build(COOKIE_NAME)
		.http_only(true)
		.path("/")
		.max_age(cookie::time::Duration::ZERO)
		.into()
}

/// Starts a session for the user, capturing their current role.
pub async fn create(
	database: &Database,
	user_id: i64,
	role: Role,
	ttl: Duration,
) -> Result<Uuid, sqlx::Error> {
	let id = Uuid::new_v4();
	let now = Utc::now().timestamp();
	let expires_at = now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX));

	// Expired sessions are only otherwise removed when they are presented again.
	sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
		.bind(now)
		.execute(database)
		.await?;

	sqlx::query("INSERT INTO sessions (id, user_id, role, expires_at) VALUES (?, ?, ?, ?)")
		.bind(id)
		.bind(user_id)
		.bind(role)
		.bind(expires_at)
		.execute(database)
		.await?;

	Ok(id)
}

/// Looks up a session, deleting it if it has expired.
pub async fn resolve(database: &Database, id: Uuid) -> Result<Option<Session>, sqlx::Error> {
	let session = sqlx::query_as::<_, Session>(
		r#"
			SELECT s.id, s.user_id, u.username, s.role, s.expires_at
			FROM sessions s
			INNER JOIN users u ON u.id = s.user_id
			WHERE s.id = ?
		"#,
	)
	.bind(id)
	.fetch_optional(database)
	.await?;

	match session {
		Some(session) if session.expires_at <= Utc::now().timestamp() => {
			destroy(database, id).await?;
			Ok(None)
		}
		session => Ok(session),
	}
}

/// Deletes a session. Unknown ids are ignored.
pub async fn destroy(database: &Database, id: Uuid) -> Result<(), sqlx::Error> {
	sqlx::query("DELETE FROM sessions WHERE id = ?")
		.bind(id)
		.execute(database)
		.await?;

	Ok(())
}
