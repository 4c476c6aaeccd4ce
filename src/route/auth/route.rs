use aide::axum::IntoApiResponse;
use argon2::{
	password_hash::{
		self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
	},
	Argon2,
};
use axum::{
	extract::State,
	response::{Html, IntoResponse, Response},
};
use macros::route;

use crate::{
	extract::{Caller, Form, Json},
	openapi::tag,
	route::{see_other, see_other_with_cookie},
	session, AppState, Database,
};

use super::{model, Error, RouteError};

/// Hashes a password with Argon2 and a random salt, returning a PHC string.
pub fn hash_password(hasher: &Argon2, password: &str) -> Result<String, password_hash::Error> {
	let salt = SaltString::generate(&mut OsRng);

	Ok(hasher.hash_password(password.as_bytes(), &salt)?.to_string())
}

/// Checks a password against a stored PHC string.
///
/// A mismatch is `Ok(false)`; only a malformed hash is an error.
pub fn verify_password(
	hasher: &Argon2,
	password: &str,
	hash: &str,
) -> Result<bool, password_hash::Error> {
	let hash = PasswordHash::new(hash)?;

	match hasher.verify_password(password.as_bytes(), &hash) {
		Ok(()) => Ok(true),
		Err(password_hash::Error::Password) => Ok(false),
		Err(error) => Err(error),
	}
}

pub async fn insert_user(
	database: &Database,
	username: &str,
	hash: &str,
	role: model::Role,
) -> Result<i64, sqlx::Error> {
	sqlx::query_scalar::<_, i64>(
		"INSERT INTO users (username, password, role, created_at) VALUES (?, ?, ?, ?) RETURNING id",
	)
	.bind(username)
	.bind(hash)
	.bind(role)
	.bind(chrono::Utc::now())
	.fetch_one(database)
	.await
}

/// Log in
/// Verifies a username and password, starts a session and redirects to the home page.
#[route(tag = tag::AUTH, response(status = 303, description = "Signed in, redirecting to the home page."))]
pub async fn login(
	State(state): State<AppState>,
	Form(input): Form<model::LoginInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let user = sqlx::query_as::<_, model::User>("SELECT * FROM users WHERE username = ?")
		.bind(&input.username)
		.fetch_optional(&state.database)
		.await?;

	// An unknown user and a wrong password must be indistinguishable, in both
	// the response and the time it takes: each costs one Argon2 computation.
	let Some(user) = user else {
		hash_password(&state.hasher, &input.password).map_err(Error::from)?;
		tracing::info!(username = %input.username, "login failed");
		return Err(Error::InvalidUsernameOrPassword.into());
	};

	if !verify_password(&state.hasher, &input.password, &user.password).map_err(Error::from)? {
		tracing::info!(username = %input.username, "login failed");
		return Err(Error::InvalidUsernameOrPassword.into());
	}

	let session_id = session::create(&state.database, user.id, user.role, state.session_ttl).await?;

	tracing::info!(user_id = user.id, role = ?user.role, "signed in");

	Ok(see_other_with_cookie(
		"/",
		session::create_cookie(session_id, state.session_ttl),
	))
}

/// Log out
/// Ends the current session, if any, clears the session cookie and redirects to the home page.
#[route(tag = tag::AUTH, response(status = 303, description = "Signed out, redirecting to the home page."))]
pub async fn logout(
	State(database): State<Database>,
	caller: Caller,
) -> Result<impl IntoApiResponse, RouteError> {
	if let Some(session) = caller.session() {
		session::destroy(&database, session.id).await?;

		tracing::info!(user_id = session.user_id, "signed out");
	}

	Ok(see_other_with_cookie("/", session::clear_cookie()))
}

/// Register account
/// Creates a regular user account, starts a session and redirects to the home page. Only available when registration is enabled.
#[route(tag = tag::AUTH, response(status = 303, description = "Registered, redirecting to the home page."))]
pub async fn register(
	State(state): State<AppState>,
	Form(input): Form<model::RegisterInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let hash = hash_password(&state.hasher, &input.password).map_err(Error::from)?;

	let user_id = insert_user(&state.database, &input.username, &hash, model::Role::User)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref d) if d.is_unique_violation() => Error::UsernameTaken.into(),
			e => RouteError::from(e),
		})?;

	let session_id =
		session::create(&state.database, user_id, model::Role::User, state.session_ttl).await?;

	tracing::info!(user_id, username = %input.username, "registered");

	Ok(see_other_with_cookie(
		"/",
		session::create_cookie(session_id, state.session_ttl),
	))
}

/// Get caller
/// Returns the signed-in caller. Anonymous callers are redirected to the login page.
#[route(tag = tag::AUTH, response(status = 200, shape = "Json<model::Me>"), response(status = 303, description = "Not signed in, redirecting to the login page."))]
pub async fn get_me(caller: Caller) -> Response {
	match caller.session() {
		Some(session) => Json(model::Me::from(session)).into_response(),
		None => see_other("/login").into_response(),
	}
}

/// Serves the login form.
pub async fn login_page() -> Html<&'static str> {
	Html(include_str!("../../../assets/login.html"))
}
