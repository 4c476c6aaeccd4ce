use aide::axum::{routing::post_with, ApiRouter};
use axum::http::StatusCode;

use crate::{
	content, error,
	route::{auth, post},
	AppState,
};

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

	ApiRouter::new().api_route("/comment", post_with(create_comment, create_comment_docs))
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownPost(..) => StatusCode::NOT_FOUND,
			Self::Auth(error) => error.status(),
			Self::Content(error) => post::content_status(error),
		}
	}

	fn into_errors(self) -> Vec<error::Message<'static>> {
		match self {
			Self::UnknownPost(post) => error::Message::new(self.to_string())
				.field("post_id")
				.detail("post", post)
				.into_vec(),
			Self::Auth(error) => error.into_errors(),
			Self::Content(error) => post::content_errors(error),
		}
	}
}
