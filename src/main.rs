mod accounts;
mod auth;
mod authz;
mod config;
mod middleware;

mod db;
mod error;
mod models;
mod procedures;
mod routes;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::{
    accounts::MySqlAccountStore, config::Config, models::AppState,
    procedures::mysql::MySqlProcedureInvoker,
};

use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::{HeaderValue, header};
use tracing_subscriber::EnvFilter;

fn cors_layer(cfg: &Config) -> anyhow::Result<CorsLayer> {
    let origin = if cfg.cors_allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let list = cfg
            .cors_allowed_origins
            .iter()
            .map(|o| HeaderValue::from_str(o))
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(list)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_mysql(&cfg).await?;

    let state = AppState {
        procedures: Arc::new(MySqlProcedureInvoker::new(pool.clone())),
        accounts: Arc::new(MySqlAccountStore::new(pool)),
        session_ttl_hours: cfg.session_ttl_hours,
        remember_me_ttl_hours: cfg.remember_me_ttl_hours,
    };

    let app = routes::router(state)
        .layer(cors_layer(&cfg)?)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
