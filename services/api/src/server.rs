use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryReturnRepository};
use crate::routes::with_return_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use return_portal::commerce::{InMemoryCommerceGateway, RestCommerceGateway};
use return_portal::config::AppConfig;
use return_portal::error::AppError;
use return_portal::rate_limit::{RateLimiter, FixedWindowLimiter, Unlimited};
use return_portal::telemetry;
use return_portal::workflows::returns::{
    CommerceGateway, PolicyResolver, ReturnPortalService, ReturnsState, ServiceSettings,
    StaticPolicyResolver,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let policies: Arc<dyn PolicyResolver> = match &config.portal.tenant_policy_file {
        Some(path) => {
            let resolver = StaticPolicyResolver::from_path(path)?;
            info!(path = %path.display(), tenants = resolver.tenant_count(), "tenant policies loaded");
            Arc::new(resolver)
        }
        None => Arc::new(StaticPolicyResolver::default()),
    };

    let limiter: Arc<dyn RateLimiter> = if config.rate_limit.enabled() {
        Arc::new(FixedWindowLimiter::new(
            config.rate_limit.max_requests,
            config.rate_limit.window,
        ))
    } else {
        Arc::new(Unlimited)
    };

    let settings = ServiceSettings {
        upstream_timeout: config.commerce.timeout,
    };

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryReturnRepository::default());
    let admin_token = config.portal.admin_token.clone();
    if admin_token.is_none() {
        warn!("APP_ADMIN_TOKEN is not set, admin routes are open");
    }

    let app = match RestCommerceGateway::from_config(&config.commerce)? {
        Some(gateway) => build_router(
            repository,
            Arc::new(gateway),
            policies,
            limiter,
            admin_token,
            settings,
        ),
        None => {
            warn!("COMMERCE_API_URL is not set, serving the in-memory demo catalog");
            build_router(
                repository,
                Arc::new(InMemoryCommerceGateway::demo()),
                policies,
                limiter,
                admin_token,
                settings,
            )
        }
    }
    .layer(Extension(app_state))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "return portal ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router<G>(
    repository: Arc<InMemoryReturnRepository>,
    gateway: Arc<G>,
    policies: Arc<dyn PolicyResolver>,
    limiter: Arc<dyn RateLimiter>,
    admin_token: Option<String>,
    settings: ServiceSettings,
) -> axum::Router
where
    G: CommerceGateway + 'static,
{
    let service = ReturnPortalService::new(repository, gateway, policies).with_settings(settings);
    with_return_routes(ReturnsState {
        service: Arc::new(service),
        limiter,
        admin_token,
    })
}
