use std::{sync::Arc, time::Duration};

use axum::{
	body::Body,
	response::{IntoResponse, Response},
};
use governor::{
	clock::QuantaInstant,
	middleware::{RateLimitingMiddleware, StateInformationMiddleware},
};
use tower_governor::{
	governor::{GovernorConfig, GovernorConfigBuilder},
	key_extractor::{KeyExtractor, PeerIpKeyExtractor},
	GovernorError,
};

use crate::error::AppError;

pub type Config = Arc<GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>>;

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Limits for endpoints that check credentials: one attempt per second per IP,
/// with a small burst for typos.
pub fn credentials() -> Config {
	Arc::new(
		GovernorConfigBuilder::default()
			.per_second(1)
			.burst_size(5)
			.use_headers()
			.error_handler(error_handler)
			.finish()
			.expect("rate limit period and burst size are non-zero"),
	)
}

fn error_handler(error: GovernorError) -> Response<Body> {
	match error {
		GovernorError::TooManyRequests { wait_time, headers } => {
			let mut response = AppError::RateLimited { wait_time }.into_response();

			if let Some(headers) = headers {
				response.headers_mut().extend(headers);
			}

			response
		}
		error => AppError::RateLimiter(format!("{error:?}")).into_response(),
	}
}

/// Spawns a thread that drops limiter state for clients not seen in the last minute.
pub fn prune_stale_limits<T, M>(config: &Arc<GovernorConfig<T, M>>)
where
	T: KeyExtractor,
	<T as KeyExtractor>::Key: Send + Sync + 'static,
	M: RateLimitingMiddleware<QuantaInstant> + Send + Sync + 'static,
{
	let limiter = config.limiter().clone();

	std::thread::spawn(move || loop {
		std::thread::sleep(PRUNE_INTERVAL);

		let before = limiter.len();
		limiter.retain_recent();

		tracing::debug!(before, after = limiter.len(), "pruned credential rate limits");
	});
}
