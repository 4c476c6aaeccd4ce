use aide::axum::ApiRouter;
use axum::http::{header, HeaderName, StatusCode};

use crate::{config::Config, AppState};

pub mod auth;
pub mod comment;
pub mod docs;
pub mod model;
pub mod post;

pub fn routes(config: &Config) -> ApiRouter<AppState> {
	ApiRouter::new()
		.merge(auth::routes(config))
		.merge(post::routes())
		.merge(comment::routes())
}

/// A `303 See Other` redirect, sent after every successful form submission.
pub fn see_other(location: &str) -> ([(HeaderName, String); 1], StatusCode) {
	([(header::LOCATION, location.to_owned())], StatusCode::SEE_OTHER)
}

/// Same as [`see_other`], also setting (or clearing) a cookie.
pub fn see_other_with_cookie(
	location: &str,
	cookie: cookie::Cookie<'_>,
) -> ([(HeaderName, String); 2], StatusCode) {
	(
		[
			(header::SET_COOKIE, cookie.to_string()),
			(header::LOCATION, location.to_owned()),
		],
		StatusCode::SEE_OTHER,
	)
}
