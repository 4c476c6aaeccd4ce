use aide::axum::IntoApiResponse;
use axum::extract::State;
use macros::route;

use crate::{
	extract::{Caller, Form},
	model::Role,
	openapi::tag,
	route::see_other,
	AppState,
};

use super::{model, Error, RouteError};

/// Create comment
/// Adds a comment to a post from a form submission and redirects back to the post. Embedded images are extracted and stored first.
#[route(tag = tag::COMMENT, response(status = 303, description = "Created, redirecting to the post."))]
pub async fn create_comment(
	State(state): State<AppState>,
	caller: Caller,
	Form(input): Form<model::CreateComment>,
) -> Result<impl IntoApiResponse, RouteError> {
	let session = caller.require(Role::MEMBERS).map_err(Error::from)?;

	let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM posts WHERE id = ?")
		.bind(input.post_id)
		.fetch_optional(&state.database)
		.await?
		.is_some();

	if !exists {
		return Err(Error::UnknownPost(input.post_id).into());
	}

	let content = state
		.content
		.sanitize(&input.content)
		.await
		.map_err(Error::from)?;

	let mut tx = state.database.begin().await?;

	let id = sqlx::query_scalar::<_, i64>(
		r#"
			INSERT INTO comments (post_id, user_id, username, content, created_at)
			VALUES (?, ?, ?, ?, ?)
			RETURNING id
		"#,
	)
	.bind(input.post_id)
	.bind(session.user_id)
	.bind(&session.username)
	.bind(&content)
	.bind(chrono::Utc::now())
	.fetch_one(&mut *tx)
	.await?;

	tx.commit().await?;

	tracing::info!(
		comment_id = id,
		post_id = input.post_id,
		user_id = session.user_id,
		"created comment"
	);

	Ok(see_other(&format!("/post/{}", input.post_id)))
}
