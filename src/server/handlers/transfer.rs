// 文件传输 API 处理器
//
// 下载走流式响应，上传走 multipart 表单

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::server::state::AppState;
use crate::share::{DownloadQuery, ShareError, ShareErrorCode, UploadQuery, UploadResponse};

use super::ApiResponse;

/// GET /api/v1/share/download?path=/photos/a.jpg
/// 下载单个文件
pub async fn download_file(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<impl IntoResponse, ShareError> {
    let abs = state.share.resolve_file(&query.path)?;

    let metadata = tokio::fs::metadata(&abs)
        .await
        .map_err(|e| ShareError::from_io(&e).with_path(query.path.clone()))?;

    let file = tokio::fs::File::open(&abs)
        .await
        .map_err(|e| ShareError::from_io(&e).with_path(query.path.clone()))?;

    let filename = abs
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("download")
        .to_string();

    let mime_type = mime_guess::from_path(&abs)
        .first_or_octet_stream()
        .to_string();

    // 256KiB 读缓冲
    let stream = ReaderStream::with_capacity(file, 1 << 18);
    let body = Body::from_stream(stream);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&metadata.len().to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"download\"")),
    );

    info!("下载文件: {:?}, 大小 {} 字节", abs, metadata.len());
    Ok((StatusCode::OK, headers, body))
}

/// POST /api/v1/share/upload?path=/photos
/// multipart 上传单个文件，字段名为 file
pub async fn upload_file(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponse>>, ShareError> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(|name| name.to_string())
            .ok_or_else(|| {
                ShareError::new(ShareErrorCode::InvalidName).with_message("上传文件缺少文件名")
            })?;

        let target = state.share.resolve_upload_target(&query.path, &file_name)?;

        // 流式写入目标文件
        let mut file = tokio::fs::File::create(&target)
            .await
            .map_err(|e| ShareError::from_io(&e).with_path(file_name.clone()))?;

        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            file.write_all(&chunk)
                .await
                .map_err(|e| ShareError::from_io(&e).with_path(file_name.clone()))?;
        }

        file.flush()
            .await
            .map_err(|e| ShareError::from_io(&e).with_path(file_name.clone()))?;
        drop(file);

        let entry = state.share.finish_upload(&target).await?;
        info!("上传完成: {:?}", target);
        return Ok(Json(ApiResponse::success(UploadResponse { file: entry })));
    }

    warn!("上传请求缺少 file 字段");
    Err(ShareError::new(ShareErrorCode::InvalidName).with_message("上传表单缺少 file 字段"))
}

/// multipart 解析错误统一归类
fn multipart_error(e: MultipartError) -> ShareError {
    ShareError::new(ShareErrorCode::IoFailed).with_message(format!("multipart 解析失败: {}", e))
}
