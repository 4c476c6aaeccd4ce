#![warn(clippy::pedantic)]

mod config;
mod content;
mod error;
mod extract;
mod model;
mod openapi;
mod ratelimit;
mod route;
mod session;
mod trace;

use std::{net::SocketAddr, str::FromStr, sync::Arc, time::Duration};

use aide::{axum::ApiRouter, openapi::OpenApi};
use argon2::Argon2;
use axum::{extract::DefaultBodyLimit, response::Response, Extension, Router};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tower::ServiceBuilder;
use tower_http::{
	compression::CompressionLayer,
	request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
	services::ServeDir,
	trace::TraceLayer,
};

pub type Database = sqlx::SqlitePool;
pub type AppState = State;

/// The shared application state.
///
/// Everything a handler needs is in here, so there is no global state.
#[derive(Clone, axum::extract::FromRef)]
pub struct State {
	pub database: Database,
	pub hasher: Argon2<'static>,
	pub content: content::ContentStore,
	pub session_ttl: Duration,
}

/// Builds the full application: API routes, documentation and stored images.
pub fn app(state: State, config: &config::Config) -> Router {
	let mut api = OpenApi::default();
	let uploads = ServeDir::new(state.content.dir());

	ApiRouter::new()
		.merge(route::routes(config))
		.nest_api_service("/docs", route::docs::routes())
		.finish_api_with(&mut api, openapi::docs)
		.layer(Extension(Arc::new(api)))
		.with_state(state)
		.nest_service(&config.content_path, uploads)
		.layer(DefaultBodyLimit::max(config.body_limit))
		.layer(
			ServiceBuilder::new()
				.layer(CompressionLayer::new())
				.layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
				.layer(PropagateRequestIdLayer::x_request_id())
				.layer(TraceLayer::new_for_http().on_response(
					|response: &Response, latency: Duration, _: &tracing::Span| {
						tracing::info!(
							histogram.latency_ms =
								u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
							status = response.status().as_u16(),
							"finished processing request"
						);
					},
				)),
		)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let config = config::Config::from_env()?;
	let _guard = trace::init_tracing_subscriber(config.log_level, config.otlp)?;

	let options = SqliteConnectOptions::from_str(&config.database_url)?
		.create_if_missing(true)
		.foreign_keys(true);
	let database = SqlitePoolOptions::new().connect_with(options).await?;

	sqlx::migrate!().run(&database).await?;

	let state = State {
		database,
		hasher: Argon2::default(),
		content: content::ContentStore::open(&config.content_dir, &config.content_path).await?,
		session_ttl: config.session_ttl,
	};

	if let Some(admin) = &config.admin {
		route::auth::bootstrap_admin(&state, admin).await?;
	}

	let app = app(state, &config);
	let listener = tokio::net::TcpListener::bind((config.host, config.port)).await?;

	tracing::info!(
		address = %listener.local_addr()?,
		registration = config.allow_registration,
		"listening"
	);

	axum::serve(
		listener,
		app.into_make_service_with_connect_info::<SocketAddr>(),
	)
	.await?;

	Ok(())
}
