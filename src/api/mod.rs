//! HTTP 路由装配
//!
//! 业务路由全部挂在 /api 下并要求 HMAC 签名，/api/health 免签名。

use std::sync::Arc;

use axum::{middleware::from_fn_with_state, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app_state::AppState;

pub mod health_api;
pub mod middleware;
pub mod wallet_api;
pub mod withdrawal_api;

pub fn routes(state: Arc<AppState>) -> Router {
    // 需要签名的业务路由
    let protected = wallet_api::routes()
        .merge(withdrawal_api::routes())
        .layer(from_fn_with_state(
            state.clone(),
            middleware::hmac_auth_middleware,
        ));

    let api = health_api::routes().merge(protected);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
