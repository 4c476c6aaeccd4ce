use aide::axum::IntoApiResponse;
use axum::extract::State;
use macros::route;

use crate::{
	extract::{Caller, Form, Json, Path, Query},
	model::Role,
	openapi::tag,
	route::see_other,
	AppState, Database,
};

use super::{model, Error, RouteError};

/// Get all posts
/// Returns a paginated response of all posts, newest first.
#[route(tag = tag::POST)]
pub async fn get_posts(
	State(database): State<Database>,
	Query(paginate): Query<model::Paginate>,
) -> Result<Json<Vec<model::Post>>, RouteError> {
	let posts = sqlx::query_as::<_, model::Post>(
		r#"
			SELECT * FROM posts
			ORDER BY created_at DESC, id DESC
			LIMIT ? OFFSET ?
		"#,
	)
	.bind(paginate.limit())
	.bind(paginate.offset())
	.fetch_all(&database)
	.await?;

	Ok(Json(posts))
}

/// Get single post
/// Returns a single post by its unique id, with its comments in the order they were written.
#[route(tag = tag::POST)]
pub async fn get_post(
	State(database): State<Database>,
	Path(model::IdInput { id }): Path<model::IdInput>,
) -> Result<Json<model::PostPage>, RouteError> {
	let post = sqlx::query_as::<_, model::Post>("SELECT * FROM posts WHERE id = ?")
		.bind(id)
		.fetch_optional(&database)
		.await?
		.ok_or(Error::UnknownPost(id))?;

	let comments = sqlx::query_as::<_, model::Comment>(
		r#"
			SELECT * FROM comments
			WHERE post_id = ?
			ORDER BY created_at ASC, id ASC
		"#,
	)
	.bind(id)
	.fetch_all(&database)
	.await?;

	Ok(Json(model::PostPage { post, comments }))
}

/// Create post
/// Creates a new post from a form submission and redirects to the home page. Embedded images are extracted and stored first. Only administrators can post.
#[route(tag = tag::POST, response(status = 303, description = "Created, redirecting to the home page."))]
pub async fn create_post(
	State(state): State<AppState>,
	caller: Caller,
	Form(input): Form<model::CreatePost>,
) -> Result<impl IntoApiResponse, RouteError> {
	let session = caller.require(Role::AUTHORS).map_err(Error::from)?;
	let content = state
		.content
		.sanitize(&input.content)
		.await
		.map_err(Error::from)?;

	let mut tx = state.database.begin().await?;

	let id = sqlx::query_scalar::<_, i64>(
		r#"
			INSERT INTO posts (user_id, title, content, created_at)
			VALUES (?, ?, ?, ?)
			RETURNING id
		"#,
	)
	.bind(session.user_id)
	.bind(&input.title)
	.bind(&content)
	.bind(chrono::Utc::now())
	.fetch_one(&mut *tx)
	.await?;

	tx.commit().await?;

	tracing::info!(post_id = id, user_id = session.user_id, "created post");

	Ok(see_other("/"))
}
