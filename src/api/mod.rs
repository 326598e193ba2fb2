pub mod handlers;

pub use handlers::*;

use crate::service::NotaService;
use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// 构建路由
pub fn router(service: Arc<NotaService>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/buscar-notas", post(buscar_notas))
        .route("/nota/:chave", get(detalhe_nota))
        .route("/nota/:chave/pdf", get(pdf_nota))
        .with_state(service)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(log_request))
                .layer(cors),
        )
}

/// 跨域配置: 含 "*" 时允许任意来源, 否则只允许列出的来源
pub fn cors_layer(origins: &str) -> CorsLayer {
    let origins: Vec<&str> = origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .collect();
    if origins.contains(&"*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// 访问日志 (不记录查询串, 其中含税号)
async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        "{} {} -> {} ({} ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}
