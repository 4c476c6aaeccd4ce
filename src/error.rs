use std::borrow::Cow;

use aide::OperationOutput;
use axum::{
	body::Body,
	extract::rejection,
	http::{Response, StatusCode},
	response::IntoResponse,
};
use schemars::JsonSchema;
use serde::Serialize;

pub type Map = serde_json::Map<String, serde_json::Value>;

/// A single error message sent to the client.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Message<'a> {
	/// A human-readable description of the error.
	pub content: Cow<'a, str>,
	/// The input field the error relates to, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub field: Option<Cow<'a, str>>,
	/// Additional machine-readable context.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Cow<'a, Map>>,
}

impl Message<'static> {
	pub fn new(content: impl Into<Cow<'static, str>>) -> Self {
		Self {
			content: content.into(),
			field: None,
			details: None,
		}
	}

	pub fn field(mut self, field: impl Into<Cow<'static, str>>) -> Self {
		self.field = Some(field.into());
		self
	}

	pub fn detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
		self.details
			.get_or_insert_with(|| Cow::Owned(Map::new()))
			.to_mut()
			.insert(key.into(), value.into());
		self
	}

	pub fn into_vec(self) -> Vec<Self> {
		vec![self]
	}
}

/// The body of every error response.
#[derive(Debug, Serialize, JsonSchema)]
pub struct ErrorResponse {
	pub success: bool,
	pub errors: Vec<Message<'static>>,
}

/// Describes how a route-specific error is presented to the client.
///
/// The [`std::fmt::Display`] implementation is only logged, so it can contain
/// information that [`ErrorShape::into_errors`] leaves out.
pub trait ErrorShape: std::error::Error {
	fn status(&self) -> StatusCode;
	fn into_errors(self) -> Vec<Message<'static>>;
}

/// Errors shared by every route, mostly produced by extractors.
///
/// Server-side failures are logged and sent to the client without details.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
	#[error("validation error: {0}")]
	Validation(#[from] validator::ValidationErrors),
	#[error("form error: {0}")]
	Form(#[from] rejection::FormRejection),
	#[error("query error: {0}")]
	Query(#[from] rejection::QueryRejection),
	#[error("path error: {0}")]
	Path(#[from] rejection::PathRejection),
	#[error("too many requests, retry in {wait_time}s")]
	RateLimited { wait_time: u64 },
	#[error("rate limiter error: {0}")]
	RateLimiter(String),
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}

impl AppError {
	pub fn status(&self) -> StatusCode {
		match self {
			Self::Validation(..) | Self::Form(..) | Self::Query(..) | Self::Path(..) => {
				StatusCode::BAD_REQUEST
			}
			Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
			Self::RateLimiter(..) | Self::Database(..) | Self::Io(..) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}

	pub fn into_errors(self) -> Vec<Message<'static>> {
		match self {
			Self::Validation(errors) => {
				let mut messages = errors
					.field_errors()
					.into_iter()
					.flat_map(|(field, errors)| {
						errors.iter().map(move |error| {
							let content = error
								.message
								.clone()
								.unwrap_or_else(|| error.code.clone());

							Message::new(content).field(field.to_string())
						})
					})
					.collect::<Vec<_>>();

				// field_errors is backed by a HashMap
				messages.sort_by(|a, b| a.field.cmp(&b.field));
				messages
			}
			Self::Form(error) => Message::new(error.body_text()).into_vec(),
			Self::Query(error) => Message::new(error.body_text()).into_vec(),
			Self::Path(error) => Message::new(error.body_text()).into_vec(),
			Self::RateLimited { wait_time } => Message::new("too many requests")
				.detail("wait_time", wait_time)
				.into_vec(),
			Self::RateLimiter(..) | Self::Database(..) | Self::Io(..) => Vec::new(),
		}
	}
}

fn respond(status: StatusCode, errors: Vec<Message<'static>>) -> Response<Body> {
	(
		status,
		axum::Json(ErrorResponse {
			success: false,
			errors,
		}),
	)
		.into_response()
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response<Body> {
		let status = self.status();

		if status.is_server_error() {
			tracing::error!(error = %self, "request failed");
		}

		respond(status, self.into_errors())
	}
}

/// The error type returned by handlers: either a shared [`AppError`] or
/// one specific to the route module.
#[derive(Debug)]
pub enum RouteError<T> {
	App(AppError),
	Route(T),
}

impl<T: std::fmt::Display> std::fmt::Display for RouteError<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::App(error) => error.fmt(f),
			Self::Route(error) => error.fmt(f),
		}
	}
}

impl<T: std::error::Error> std::error::Error for RouteError<T> {}

impl<T: ErrorShape> From<T> for RouteError<T> {
	fn from(error: T) -> Self {
		Self::Route(error)
	}
}

impl<T> From<AppError> for RouteError<T> {
	fn from(error: AppError) -> Self {
		Self::App(error)
	}
}

impl<T> From<sqlx::Error> for RouteError<T> {
	fn from(error: sqlx::Error) -> Self {
		Self::App(error.into())
	}
}

impl<T> From<std::io::Error> for RouteError<T> {
	fn from(error: std::io::Error) -> Self {
		Self::App(error.into())
	}
}

impl<T: ErrorShape> IntoResponse for RouteError<T> {
	fn into_response(self) -> Response<Body> {
		match self {
			Self::App(error) => error.into_response(),
			Self::Route(error) => {
				let status = error.status();

				if status.is_server_error() {
					tracing::error!(error = %error, "request failed");
				}

				respond(status, error.into_errors())
			}
		}
	}
}

impl<T> OperationOutput for RouteError<T> {
	type Inner = ErrorResponse;
}

#[cfg(test)]
mod test {
	use validator::Validate;

	use super::*;

	#[derive(Validate)]
	struct Input {
		#[validate(length(min = 1, message = "title cannot be empty"))]
		title: String,
		#[validate(length(min = 1, message = "content cannot be empty"))]
		content: String,
	}

	#[test]
	fn test_validation_messages_are_per_field() {
		let input = Input {
			title: String::new(),
			content: String::new(),
		};

		let errors = AppError::from(input.validate().unwrap_err()).into_errors();

		assert_eq!(errors.len(), 2);
		assert_eq!(errors[0].field.as_deref(), Some("content"));
		assert_eq!(errors[0].content, "content cannot be empty");
		assert_eq!(errors[1].field.as_deref(), Some("title"));
		assert_eq!(errors[1].content, "title cannot be empty");
	}

	#[test]
	fn test_server_errors_hide_details() {
		let error = AppError::from(sqlx::Error::RowNotFound);

		assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
		assert!(error.into_errors().is_empty());
	}

	#[test]
	fn test_message_details() {
		let message = Message::new("unknown post").detail("post", 4);
		let value = serde_json::to_value(&message).unwrap();

		assert_eq!(value["content"], "unknown post");
		assert_eq!(value["details"]["post"], 4);
		assert!(value.get("field").is_none());
	}
}
