// 共享目录 API 处理器

use axum::{
    extract::{Query, State},
    Json,
};
use tracing::info;

use crate::server::state::AppState;
use crate::share::{
    BackfillRequest, BackfillResponse, DeleteRequest, DeleteResponse, ListQuery, ListResponse,
    MkdirRequest, MkdirResponse, RenameRequest, RenameResponse, ShareError,
};

use super::ApiResponse;

/// GET /api/v1/share/list?path=/photos
/// 列出目录内容
pub async fn list_directory(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<ListResponse>>, ShareError> {
    let response = state.share.list_directory(&query.path)?;
    Ok(Json(ApiResponse::success(response)))
}

/// POST /api/v1/share/mkdir
/// 在父目录下创建子目录
pub async fn create_directory(
    State(state): State<AppState>,
    Json(req): Json<MkdirRequest>,
) -> Result<Json<ApiResponse<MkdirResponse>>, ShareError> {
    info!("API: 创建目录: {} 下的 {}", req.path, req.name);

    let directory = state.share.create_directory(&req.path, &req.name)?;
    Ok(Json(ApiResponse::success(MkdirResponse {
        path: req.path,
        directory,
    })))
}

/// DELETE /api/v1/share/item
/// 删除文件或目录
pub async fn delete_item(
    State(state): State<AppState>,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<ApiResponse<DeleteResponse>>, ShareError> {
    info!("API: 删除条目: {}", req.path);

    state.share.delete_item(&req.path)?;
    Ok(Json(ApiResponse::success(DeleteResponse { path: req.path })))
}

/// POST /api/v1/share/rename
/// 在原目录内重命名条目
pub async fn rename_item(
    State(state): State<AppState>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<ApiResponse<RenameResponse>>, ShareError> {
    info!("API: 重命名条目: {} -> {}", req.path, req.name);

    state.share.rename_item(&req.path, &req.name)?;
    Ok(Json(ApiResponse::success(RenameResponse {
        path: req.path,
        name: req.name,
    })))
}

/// POST /api/v1/share/thumbnails/ensure
/// 回填目录树下缺失的缩略图，请求体可省略（默认从根目录开始）
pub async fn ensure_thumbnails(
    State(state): State<AppState>,
    req: Option<Json<BackfillRequest>>,
) -> Result<Json<ApiResponse<BackfillResponse>>, ShareError> {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    info!("API: 缩略图回填: {}", req.path);

    let generated = state.share.ensure_thumbnails(&req.path).await?;
    Ok(Json(ApiResponse::success(BackfillResponse {
        path: req.path,
        generated,
    })))
}
