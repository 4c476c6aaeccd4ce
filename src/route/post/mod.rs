use aide::axum::{
	routing::{get_with, post_with},
	ApiRouter,
};
use axum::http::StatusCode;

use crate::{content, error, route::auth, AppState};

pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown post")]
	UnknownPost(i64),
	#[error(transparent)]
	Auth(#[from] auth::Error),
	#[error(transparent)]
	Content(#[from] content::Error),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/", get_with(get_posts, get_posts_docs))
		.api_route("/post", post_with(create_post, create_post_docs))
		.api_route("/post/:id", get_with(get_post, get_post_docs))
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownPost(..) => StatusCode::NOT_FOUND,
			Self::Auth(error) => error.status(),
			Self::Content(error) => content_status(error),
		}
	}

	fn into_errors(self) -> Vec<error::Message<'static>> {
		match self {
			Self::UnknownPost(post) => error::Message::new(self.to_string())
				.detail("post", post)
				.into_vec(),
			Self::Auth(error) => error.into_errors(),
			Self::Content(error) => content_errors(error),
		}
	}
}

/// Content that cannot be rewritten is the client's fault, a failed write is ours.
pub(crate) fn content_status(error: &content::Error) -> StatusCode {
	match error {
		content::Error::Rewrite(..) => StatusCode::BAD_REQUEST,
		content::Error::Io(..) => StatusCode::INTERNAL_SERVER_ERROR,
	}
}

pub(crate) fn content_errors(error: content::Error) -> Vec<error::Message<'static>> {
	match error {
		content::Error::Rewrite(..) => error::Message::new("content could not be parsed")
			.field("content")
			.into_vec(),
		content::Error::Io(..) => Vec::new(),
	}
}
