use aide::axum::{
	routing::{get, get_with, post_with},
	ApiRouter,
};
use axum::http::StatusCode;
use tower_governor::GovernorLayer;

use crate::{config, error, model::Role, ratelimit, AppState};

pub mod model;
pub mod route;

/// An error that can occur during authentication or authorization.
///
/// Note that the messages are presented to the client, so they should not contain
/// sensitive information.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// Deliberately the same for an unknown user and a wrong password.
	#[error("invalid username or password")]
	InvalidUsernameOrPassword,
	#[error("authentication required")]
	AuthenticationRequired,
	#[error("permission denied")]
	PermissionDenied,
	#[error("username already taken")]
	UsernameTaken,
	#[error("password hashing error: {0}")]
	Hash(#[from] argon2::password_hash::Error),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes(config: &config::Config) -> ApiRouter<AppState> {
	use route::*;

	let mut credentials = ApiRouter::new().api_route("/login", post_with(login, login_docs));

	if config.allow_registration {
		credentials = credentials.api_route("/register", post_with(register, register_docs));
	}

	if config.rate_limit {
		let limits = ratelimit::credentials();

		ratelimit::prune_stale_limits(&limits);
		credentials = credentials.layer(GovernorLayer { config: limits });
	}

	ApiRouter::new()
		.route("/login", get(login_page))
		.api_route("/logout", get_with(logout, logout_docs))
		.api_route("/me", get_with(get_me, get_me_docs))
		.merge(credentials)
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::InvalidUsernameOrPassword | Self::AuthenticationRequired => {
				StatusCode::UNAUTHORIZED
			}
			Self::PermissionDenied => StatusCode::FORBIDDEN,
			Self::UsernameTaken => StatusCode::CONFLICT,
			Self::Hash(..) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	fn into_errors(self) -> Vec<error::Message<'static>> {
		match self {
			Self::Hash(..) => Vec::new(),
			Self::UsernameTaken => error::Message::new(self.to_string())
				.field("username")
				.into_vec(),
			_ => error::Message::new(self.to_string()).into_vec(),
		}
	}
}

/// Creates the configured administrator if no user with that name exists yet.
///
/// An existing user keeps their password and role.
pub async fn bootstrap_admin(
	state: &AppState,
	admin: &config::AdminBootstrap,
) -> Result<(), RouteError> {
	let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?")
		.bind(&admin.username)
		.fetch_optional(&state.database)
		.await?;

	if existing.is_some() {
		return Ok(());
	}

	let hash = route::hash_password(&state.hasher, &admin.password).map_err(Error::from)?;
	let id = route::insert_user(&state.database, &admin.username, &hash, Role::Admin).await?;

	tracing::info!(user_id = id, username = %admin.username, "created administrator");

	Ok(())
}

#[cfg(test)]
mod test {
	use std::time::Instant;

	use axum::http::{header, StatusCode};
	use serde_json::{json, Value};

	use crate::{model::Role, session, test::*};

	#[tokio::test]
	async fn test_login_flow() {
		let app = app().await;
		insert_user(&app.database, "alice", "hunter2hunter", Role::User).await;

		let response = app
			.server
			.post("/login")
			.form(&json!({ "username": "alice", "password": "hunter2hunter" }))
			.await;

		assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
		assert_eq!(response.header(header::LOCATION), "/");

		let cookie = response.cookie(session::COOKIE_NAME);
		let response = app.server.get("/me").add_cookie(cookie).await;

		assert_eq!(response.status_code(), StatusCode::OK);

		let me = response.json::<Value>();

		assert_eq!(me["username"], "alice");
		assert_eq!(me["role"], "user");
	}

	#[tokio::test]
	async fn test_login_errors_do_not_reveal_usernames() {
		let app = app().await;
		insert_user(&app.database, "alice", "hunter2hunter", Role::User).await;

		let unknown = app
			.server
			.post("/login")
			.form(&json!({ "username": "mallory", "password": "hunter2hunter" }))
			.await;

		let wrong = app
			.server
			.post("/login")
			.form(&json!({ "username": "alice", "password": "wrong password" }))
			.await;

		assert_eq!(unknown.status_code(), StatusCode::UNAUTHORIZED);
		assert_eq!(wrong.status_code(), StatusCode::UNAUTHORIZED);
		assert_eq!(unknown.text(), wrong.text());
		assert_eq!(
			wrong.json::<Value>()["errors"][0]["content"],
			"invalid username or password"
		);
		assert!(wrong.cookies().get(session::COOKIE_NAME).is_none());
	}

	#[tokio::test]
	async fn test_unknown_user_costs_a_hash() {
		let hasher = argon2::Argon2::default();
		let app = app_with_hasher(hasher.clone()).await;
		let hash = super::route::hash_password(&hasher, "hunter2hunter").unwrap();

		super::route::insert_user(&app.database, "alice", &hash, Role::User)
			.await
			.unwrap();

		let attempt = |username: &'static str| {
			let server = &app.server;

			async move {
				let start = Instant::now();
				let response = server
					.post("/login")
					.form(&json!({ "username": username, "password": "wrong password" }))
					.await;

				assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

				start.elapsed()
			}
		};

		let known = attempt("alice").await;
		let unknown = attempt("mallory").await;

		// both paths run Argon2 with the same parameters
		assert!(
			unknown * 4 >= known,
			"unknown user took {unknown:?}, known user took {known:?}"
		);
	}

	#[tokio::test]
	async fn test_login_validation() {
		let app = app().await;

		let response = app
			.server
			.post("/login")
			.form(&json!({ "username": "", "password": "" }))
			.await;

		assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

		let body = response.json::<Value>();
		let fields = body["errors"]
			.as_array()
			.unwrap()
			.iter()
			.map(|error| error["field"].as_str().unwrap())
			.collect::<Vec<_>>();

		assert_eq!(fields, ["password", "username"]);
	}

	#[tokio::test]
	async fn test_login_missing_fields() {
		let app = app().await;

		let response = app
			.server
			.post("/login")
			.form(&json!({ "username": "alice" }))
			.await;

		assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

		let body = response.json::<Value>();

		assert_eq!(body["errors"][0]["field"], "password");
		assert_eq!(body["errors"][0]["content"], "password cannot be empty");
	}

	#[tokio::test]
	async fn test_logout_destroys_session() {
		let app = app().await;
		insert_user(&app.database, "root", "hunter2hunter", Role::Admin).await;

		let cookie = login(&app, "root", "hunter2hunter").await;
		let response = app.server.get("/logout").add_cookie(cookie.clone()).await;

		assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
		assert_eq!(response.cookie(session::COOKIE_NAME).value(), "");

		// the old cookie no longer resolves to a session
		let response = app
			.server
			.post("/post")
			.add_cookie(cookie.clone())
			.form(&json!({ "title": "title", "content": "content" }))
			.await;

		assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
		assert_eq!(
			response.json::<Value>()["errors"][0]["content"],
			"authentication required"
		);

		let response = app.server.get("/me").add_cookie(cookie).await;

		assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
		assert_eq!(response.header(header::LOCATION), "/login");
	}

	#[tokio::test]
	async fn test_me_redirects_anonymous_callers() {
		let app = app().await;
		let response = app.server.get("/me").await;

		assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
		assert_eq!(response.header(header::LOCATION), "/login");
	}

	#[tokio::test]
	async fn test_login_page() {
		let app = app().await;
		let response = app.server.get("/login").await;

		assert_eq!(response.status_code(), StatusCode::OK);
		assert!(response.text().contains(r#"action="/login""#));
	}

	#[tokio::test]
	async fn test_registration_disabled_by_default() {
		let app = app().await;

		let response = app
			.server
			.post("/register")
			.form(&json!({ "username": "alice", "password": "hunter2hunter" }))
			.await;

		assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn test_registration() {
		let app = app_with(|config| config.allow_registration = true).await;

		let response = app
			.server
			.post("/register")
			.form(&json!({ "username": "alice", "password": "hunter2hunter" }))
			.await;

		assert_eq!(response.status_code(), StatusCode::SEE_OTHER);

		let cookie = response.cookie(session::COOKIE_NAME);
		let me = app.server.get("/me").add_cookie(cookie).await.json::<Value>();

		// registration never creates administrators
		assert_eq!(me["role"], "user");

		let response = app
			.server
			.post("/register")
			.form(&json!({ "username": "alice", "password": "another password" }))
			.await;

		assert_eq!(response.status_code(), StatusCode::CONFLICT);
		assert_eq!(response.json::<Value>()["errors"][0]["field"], "username");
	}

	#[tokio::test]
	async fn test_registration_validation() {
		let app = app_with(|config| config.allow_registration = true).await;

		let response = app
			.server
			.post("/register")
			.form(&json!({ "username": "a!", "password": "short" }))
			.await;

		assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
		assert_eq!(response.json::<Value>()["errors"].as_array().unwrap().len(), 3);
	}

	#[tokio::test]
	async fn test_bootstrap_admin() {
		let app = app().await;
		let admin = crate::config::AdminBootstrap {
			username: "root".into(),
			password: "hunter2hunter".into(),
		};

		super::bootstrap_admin(&app.state, &admin).await.unwrap();
		// running it again leaves the account alone
		super::bootstrap_admin(&app.state, &admin).await.unwrap();

		let cookie = login(&app, "root", "hunter2hunter").await;
		let me = app.server.get("/me").add_cookie(cookie).await.json::<Value>();

		assert_eq!(me["role"], "admin");
	}
}
