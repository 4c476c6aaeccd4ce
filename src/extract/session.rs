use aide::OperationInput;
use axum::{
	extract::{FromRef, FromRequestParts},
	http::{header, request},
};
use uuid::Uuid;

use crate::{
	error::AppError, model::Role, openapi::SECURITY_SCHEME_SESSION, route::auth, session,
	Database,
};

/// The caller of a request, resolved from the session cookie.
///
/// Never rejects because of a missing or stale session: the caller is simply
/// anonymous. Handlers decide what an anonymous caller may do through
/// [`Caller::require`].
///
/// ```rust
/// async fn route(caller: Caller) {
///   let session = caller.require(Role::MEMBERS)?;
/// }
/// ```
#[derive(Debug, Default)]
pub struct Caller(pub Option<session::Session>);

impl Caller {
	pub fn session(&self) -> Option<&session::Session> {
		self.0.as_ref()
	}

	/// Checks the role captured on the caller's session against `allowed`.
	///
	/// An anonymous caller gets [`auth::Error::AuthenticationRequired`], a caller
	/// with any other role gets [`auth::Error::PermissionDenied`].
	pub fn require(&self, allowed: &[Role]) -> Result<&session::Session, auth::Error> {
		let session = self.session().ok_or(auth::Error::AuthenticationRequired)?;

		if !allowed.contains(&session.role) {
			tracing::info!(
				user_id = session.user_id,
				role = ?session.role,
				"permission denied"
			);

			return Err(auth::Error::PermissionDenied);
		}

		Ok(session)
	}
}

/// Returns the session id from the request cookies, if there is a well-formed one.
fn session_id(parts: &request::Parts) -> Option<Uuid> {
	parts
		.headers
		.get_all(header::COOKIE)
		.into_iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(cookie::Cookie::split_parse)
		.filter_map(Result::ok)
		.find(|cookie| cookie.name() == session::COOKIE_NAME)
		.and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
	Database: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = AppError;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let Some(session_id) = session_id(parts) else {
			return Ok(Self(None));
		};

		let database = Database::from_ref(state);

		Ok(Self(session::resolve(&database, session_id).await?))
	}
}

impl OperationInput for Caller {
	/// Operation input for the caller extractor.
	///
	/// This adds a session cookie to the `OpenAPI` operation.
	fn operation_input(_ctx: &mut aide::gen::GenContext, operation: &mut aide::openapi::Operation) {
		operation.security.push(
			[(SECURITY_SCHEME_SESSION.to_string(), Vec::new())]
				.into_iter()
				.collect(),
		);
	}
}
