use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

pub use crate::model::{Role, User};

fn validate_username(username: &str) -> Result<(), ValidationError> {
	if username.chars().any(|c| !c.is_ascii_alphanumeric()) {
		let mut error = ValidationError::new("username_alphanumeric");
		error.message = Some("username must be alphanumeric".into());

		return Err(error);
	}

	Ok(())
}

/// Missing fields deserialize as empty strings, so they are reported per field.
#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct LoginInput {
	#[serde(default)]
	#[validate(length(min = 1, message = "username cannot be empty"))]
	pub username: String,
	#[serde(default)]
	#[validate(length(min = 1, message = "password cannot be empty"))]
	pub password: String,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct RegisterInput {
	/// The username that is displayed next to comments.
	#[serde(default)]
	#[validate(
		length(min = 3, max = 32, message = "username must be between 3 and 32 characters"),
		custom(function = "validate_username")
	)]
	pub username: String,
	#[serde(default)]
	#[validate(length(min = 8, max = 128, message = "password must be between 8 and 128 characters"))]
	pub password: String,
}

/// The signed-in caller, as seen by their session.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Me {
	pub id: i64,
	pub username: String,
	/// The role captured when the session was created.
	pub role: Role,
	/// Unix timestamp after which the session is no longer accepted.
	pub expires_at: i64,
}

impl From<&crate::session::Session> for Me {
	fn from(session: &crate::session::Session) -> Self {
		Self {
			id: session.user_id,
			username: session.username.clone(),
			role: session.role,
			expires_at: session.expires_at,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_validate_username() {
		assert!(validate_username("alice42").is_ok());

		let error = validate_username("alice smith").unwrap_err();

		assert_eq!(error.message.as_deref(), Some("username must be alphanumeric"));
	}

	#[test]
	fn test_register_input() {
		let input = RegisterInput {
			username: "a!".into(),
			password: "short".into(),
		};

		let errors = input.validate().unwrap_err();
		let fields = errors.field_errors();

		// "a!" is both too short and not alphanumeric
		assert_eq!(fields["username"].len(), 2);
		assert_eq!(fields["password"].len(), 1);
	}
}
