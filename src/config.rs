use std::{env, net::IpAddr, path::PathBuf, str::FromStr, time::Duration};

use tracing::Level;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://blog.db?mode=rwc";
pub const DEFAULT_CONTENT_DIR: &str = "public/uploads";
pub const DEFAULT_CONTENT_PATH: &str = "/uploads";

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{name} is not valid: {value:?}")]
	Invalid { name: &'static str, value: String },
	#[error("{0} must start with '/' and must not end with one")]
	ContentPath(&'static str),
	#[error("ADMIN_USERNAME and ADMIN_PASSWORD must be set together")]
	PartialAdmin,
}

/// Credentials for an administrator created at startup if it does not exist yet.
///
/// This is the only way to get an `admin` account, since registration always
/// creates regular users.
#[derive(Clone)]
pub struct AdminBootstrap {
	pub username: String,
	pub password: String,
}

impl std::fmt::Debug for AdminBootstrap {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AdminBootstrap")
			.field("username", &self.username)
			.finish_non_exhaustive()
	}
}

/// Runtime configuration, read from the environment (and a `.env` file, if present).
#[derive(Debug, Clone)]
pub struct Config {
	pub database_url: String,
	pub host: IpAddr,
	pub port: u16,
	/// Directory extracted images are written to.
	pub content_dir: PathBuf,
	/// URL prefix the content directory is served under.
	pub content_path: String,
	pub session_ttl: Duration,
	/// Whether `POST /register` is mounted at all.
	pub allow_registration: bool,
	/// Maximum request body size in bytes. Embedded images make submissions large.
	pub body_limit: usize,
	pub rate_limit: bool,
	pub log_level: Level,
	/// Export traces and metrics over OTLP.
	pub otlp: bool,
	pub admin: Option<AdminBootstrap>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			database_url: DEFAULT_DATABASE_URL.into(),
			host: IpAddr::from([127, 0, 0, 1]),
			port: 3000,
			content_dir: DEFAULT_CONTENT_DIR.into(),
			content_path: DEFAULT_CONTENT_PATH.into(),
			session_ttl: Duration::from_secs(60 * 60 * 24 * 7),
			allow_registration: false,
			body_limit: 10 * 1024 * 1024,
			rate_limit: true,
			log_level: Level::INFO,
			otlp: false,
			admin: None,
		}
	}
}

/// Reads and parses an environment variable, returning `None` if it is unset.
fn var<T: FromStr>(name: &'static str) -> Result<Option<T>, Error> {
	let Ok(value) = env::var(name) else {
		return Ok(None);
	};

	value
		.trim()
		.parse()
		.map(Some)
		.map_err(|_| Error::Invalid { name, value })
}

impl Config {
	pub fn from_env() -> Result<Self, Error> {
		dotenvy::dotenv().ok();

		let default = Self::default();

		let content_path = var::<String>("CONTENT_PATH")?.unwrap_or(default.content_path);

		if !content_path.starts_with('/') || content_path.ends_with('/') {
			return Err(Error::ContentPath("CONTENT_PATH"));
		}

		let admin = match (
			var::<String>("ADMIN_USERNAME")?,
			var::<String>("ADMIN_PASSWORD")?,
		) {
			(Some(username), Some(password)) => Some(AdminBootstrap { username, password }),
			(None, None) => None,
			_ => return Err(Error::PartialAdmin),
		};

		Ok(Self {
			database_url: var("DATABASE_URL")?.unwrap_or(default.database_url),
			host: var("HOST")?.unwrap_or(default.host),
			port: var("PORT")?.unwrap_or(default.port),
			content_dir: var("CONTENT_DIR")?.unwrap_or(default.content_dir),
			content_path,
			session_ttl: var::<u64>("SESSION_TTL_HOURS")?
				.map_or(default.session_ttl, |hours| {
					Duration::from_secs(hours * 60 * 60)
				}),
			allow_registration: var("ALLOW_REGISTRATION")?.unwrap_or(default.allow_registration),
			body_limit: var("BODY_LIMIT")?.unwrap_or(default.body_limit),
			rate_limit: var("RATE_LIMIT")?.unwrap_or(default.rate_limit),
			log_level: var("LOG_LEVEL")?.unwrap_or(default.log_level),
			otlp: env::var_os("OTEL_EXPORTER_OTLP_ENDPOINT").is_some(),
			admin,
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_var_reports_name() {
		env::set_var("QUILLPOST_TEST_PORT", "not a number");

		let error = var::<u16>("QUILLPOST_TEST_PORT").unwrap_err();

		assert_eq!(
			error.to_string(),
			r#"QUILLPOST_TEST_PORT is not valid: "not a number""#
		);
	}

	#[test]
	fn test_var_unset() {
		assert!(var::<u16>("QUILLPOST_TEST_UNSET").unwrap().is_none());
	}

	#[test]
	fn test_admin_password_not_logged() {
		let admin = AdminBootstrap {
			username: "root".into(),
			password: "hunter2hunter".into(),
		};

		assert!(!format!("{admin:?}").contains("hunter2"));
	}
}
