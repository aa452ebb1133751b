// API 访问控制

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use super::handlers::ApiResponse;
use super::state::AppState;

/// API 访问策略
///
/// 家庭内网部署默认放行全部请求；对外部署时替换为校验请求头的实现
pub trait AccessPolicy: Send + Sync {
    /// 根据请求头判定是否放行
    fn allow(&self, headers: &HeaderMap) -> bool;
}

/// 放行全部请求的策略
pub struct OpenAccess;

impl AccessPolicy for OpenAccess {
    fn allow(&self, _headers: &HeaderMap) -> bool {
        true
    }
}

/// 访问控制中间件，拒绝时返回 401
pub async fn require_access(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if state.access.allow(request.headers()) {
        next.run(request).await
    } else {
        let body = Json(ApiResponse::<()>::error(401, "Unauthorized".to_string()));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}
