use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use common_auth::{JwtConfig, JwtVerifier};
use common_observability::ControlPlaneMetrics;
use control_plane::app::{self, AppState};
use control_plane::config::AppConfig;
use control_plane::http::rate_limit::RateLimiter;
use control_plane::http::session::derive_session_key;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = AppConfig::from_env()?;
    common_http_errors::configure_redaction(config.app_env.is_production());

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    let jwt_verifier = build_jwt_verifier(&config).await?;
    spawn_jwks_refresh(jwt_verifier.clone(), config.jwks_refresh_seconds);

    let session_key = derive_session_key(&config.nextauth_secret);
    let metrics = Arc::new(ControlPlaneMetrics::new());

    let state = AppState {
        pool,
        jwt_verifier,
        session_key,
        metrics,
        rate_limiter: Arc::new(RateLimiter::new()),
        allowed_origins: config.allowed_origins.clone(),
        rate_limit_reads_per_min: config.rate_limit_reads_per_min,
        rate_limit_writes_per_min: config.rate_limit_writes_per_min,
        realtime_poll_ms: config.realtime_poll_ms,
    };

    let router = app::build_router(state, &config);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.context("failed to bind listener")?;
    info!(%addr, env = ?config.app_env, "control plane listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

async fn build_jwt_verifier(config: &AppConfig) -> anyhow::Result<Arc<JwtVerifier>> {
    let issuer = config.jwt_issuer.clone().context("JWT_ISSUER must be set")?;
    let audience = config.jwt_audience.clone().context("JWT_AUDIENCE must be set")?;

    let mut jwt_config = JwtConfig::new(issuer, audience);
    if let Some(leeway) = config.jwt_leeway_seconds {
        jwt_config = jwt_config.with_leeway(leeway);
    }

    let mut builder = JwtVerifier::builder(jwt_config);

    if let Some(url) = &config.jwt_jwks_url {
        info!(jwks_url = %url, "configuring JWKS fetcher");
        builder = builder.with_jwks_url(url.clone());
    }

    if let Some(pem) = &config.jwt_dev_public_key_pem {
        warn!("using JWT_DEV_PUBLIC_KEY_PEM for verification; do not enable in production");
        builder = builder.with_rsa_pem("local-dev", pem.as_bytes()).map_err(anyhow::Error::from)?;
    }

    let verifier = builder.build().await.map_err(anyhow::Error::from)?;
    info!("JWT verifier initialised");
    Ok(Arc::new(verifier))
}

fn spawn_jwks_refresh(verifier: Arc<JwtVerifier>, refresh_seconds: u64) {
    let Some(fetcher) = verifier.jwks_fetcher() else {
        return;
    };

    let interval_duration = Duration::from_secs(refresh_seconds);
    let url = fetcher.url().to_owned();
    let handle = verifier.clone();

    tokio::spawn(async move {
        let mut ticker = interval(interval_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match handle.refresh_jwks().await {
                Ok(count) => debug!(count, jwks_url = %url, "refreshed JWKS keys"),
                Err(err) => warn!(error = %err, jwks_url = %url, "failed to refresh JWKS keys"),
            }
        }
    });
}
