// 共享目录模块数据类型定义

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 缩略图边车目录名（与原图同级）
pub const THUMB_DIR_NAME: &str = ".thumbnails";

/// 缩略图最大宽度（像素），小于该宽度的原图不放大
pub const THUMB_MAX_WIDTH: u32 = 300;

/// 支持生成缩略图的图片扩展名（小写）
pub const SUPPORTED_IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// 共享目录错误码
/// 错误码范围：51001 - 51099
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareErrorCode {
    /// 路径逃逸出共享根目录
    PathEscape = 51001,
    /// 路径不存在
    NotFound = 51002,
    /// 不是目录
    NotADirectory = 51003,
    /// 不是文件
    NotAFile = 51004,
    /// 目标已存在
    AlreadyExists = 51005,
    /// 条目名称无效
    InvalidName = 51006,
    /// 不支持的图片格式
    UnsupportedImage = 51007,
    /// 图片解码失败
    DecodeFailed = 51008,
    /// 文件系统操作失败
    IoFailed = 51009,
}

impl ShareErrorCode {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::PathEscape => "路径超出共享目录范围",
            Self::NotFound => "路径不存在",
            Self::NotADirectory => "指定路径不是目录",
            Self::NotAFile => "指定路径不是文件",
            Self::AlreadyExists => "目标已存在",
            Self::InvalidName => "条目名称无效",
            Self::UnsupportedImage => "不支持的图片格式",
            Self::DecodeFailed => "图片解码失败",
            Self::IoFailed => "文件系统操作失败",
        }
    }
}

/// 共享目录错误
#[derive(Debug)]
pub struct ShareError {
    pub code: ShareErrorCode,
    pub message: String,
    pub path: Option<String>,
}

impl ShareError {
    pub fn new(code: ShareErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// 将底层 IO 错误归类为共享目录错误
    ///
    /// NotFound / AlreadyExists 映射为对应的语义错误，其余归为 IoFailed
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::new(ShareErrorCode::NotFound),
            std::io::ErrorKind::AlreadyExists => Self::new(ShareErrorCode::AlreadyExists),
            _ => Self::new(ShareErrorCode::IoFailed).with_message(format!("文件系统操作失败: {}", err)),
        }
    }
}

impl std::fmt::Display for ShareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{}: {}", self.message, path)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ShareError {}

/// 共享目录条目
#[derive(Debug, Clone, Serialize)]
pub struct ShareEntry {
    /// 条目名称
    pub name: String,
    /// 虚拟路径（以 / 开头，相对共享根目录）
    pub path: String,
    /// 缩略图虚拟路径（仅当边车缩略图存在时）
    #[serde(rename = "thumbnailPath", skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,
    /// 文件大小（目录为 None）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// 修改时间 (ISO8601)
    #[serde(rename = "modTime")]
    pub mod_time: String,
    /// 是否为目录
    #[serde(rename = "isDir")]
    pub is_dir: bool,
}

/// 缩略图生成结果元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailMeta {
    /// 缩略图绝对路径
    pub path: PathBuf,
    /// 缩略图宽度
    pub width: u32,
    /// 缩略图高度
    pub height: u32,
}

/// ensure 调用的结果
///
/// Generated 表示本次调用新生成了缩略图，Skipped 表示缩略图已存在
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureResult {
    Generated(ThumbnailMeta),
    Skipped,
}

/// 列目录请求参数
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// 目录虚拟路径，默认为根目录
    #[serde(default = "default_virtual_root")]
    pub path: String,
}

/// 列目录响应
#[derive(Debug, Serialize)]
pub struct ListResponse {
    /// 当前目录虚拟路径
    pub path: String,
    /// 目录条目（目录在前，枚举顺序稳定）
    pub items: Vec<ShareEntry>,
}

/// 创建目录请求
#[derive(Debug, Deserialize)]
pub struct MkdirRequest {
    /// 父目录虚拟路径
    pub path: String,
    /// 新目录名称
    pub name: String,
}

/// 创建目录响应
#[derive(Debug, Serialize)]
pub struct MkdirResponse {
    /// 父目录虚拟路径
    pub path: String,
    /// 新建目录条目
    pub directory: ShareEntry,
}

/// 删除条目请求
#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    /// 条目虚拟路径
    pub path: String,
}

/// 删除条目响应
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub path: String,
}

/// 重命名请求
#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    /// 条目虚拟路径
    pub path: String,
    /// 新名称（单段，不含路径分隔符）
    pub name: String,
}

/// 重命名响应
#[derive(Debug, Serialize)]
pub struct RenameResponse {
    pub path: String,
    pub name: String,
}

/// 下载请求参数
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// 文件虚拟路径
    pub path: String,
}

/// 上传请求参数
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// 目标目录虚拟路径，默认为根目录
    #[serde(default = "default_virtual_root")]
    pub path: String,
}

/// 上传响应
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// 上传后的文件条目
    pub file: ShareEntry,
}

/// 缩略图回填请求
#[derive(Debug, Deserialize)]
pub struct BackfillRequest {
    /// 起始目录虚拟路径，默认为根目录
    #[serde(default = "default_virtual_root")]
    pub path: String,
}

impl Default for BackfillRequest {
    fn default() -> Self {
        Self {
            path: default_virtual_root(),
        }
    }
}

/// 缩略图回填响应
#[derive(Debug, Serialize)]
pub struct BackfillResponse {
    /// 起始目录虚拟路径
    pub path: String,
    /// 本次新生成的缩略图数量（已存在的不计入）
    pub generated: u32,
}

fn default_virtual_root() -> String {
    "/".to_string()
}

/// 判断扩展名是否为支持的图片格式
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            let ext = ext.to_lowercase();
            SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_error_code() {
        assert_eq!(ShareErrorCode::PathEscape.code(), 51001);
        assert_eq!(ShareErrorCode::NotFound.code(), 51002);
        assert_eq!(ShareErrorCode::DecodeFailed.code(), 51008);
    }

    #[test]
    fn test_share_error() {
        let err = ShareError::new(ShareErrorCode::PathEscape).with_path("../etc/passwd");
        assert_eq!(err.code, ShareErrorCode::PathEscape);
        assert!(err.path.is_some());
    }

    #[test]
    fn test_from_io() {
        let not_found = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(ShareError::from_io(&not_found).code, ShareErrorCode::NotFound);

        let exists = std::io::Error::new(std::io::ErrorKind::AlreadyExists, "dup");
        assert_eq!(ShareError::from_io(&exists).code, ShareErrorCode::AlreadyExists);

        let other = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(ShareError::from_io(&other).code, ShareErrorCode::IoFailed);
    }

    #[test]
    fn test_supported_image_detection() {
        assert!(is_supported_image(Path::new("photo.jpg")));
        assert!(is_supported_image(Path::new("photo.JPEG")));
        assert!(is_supported_image(Path::new("chart.png")));
        assert!(!is_supported_image(Path::new("movie.mp4")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("noext")));
    }

    #[test]
    fn test_entry_serialization() {
        let entry = ShareEntry {
            name: "photo.jpg".to_string(),
            path: "/album/photo.jpg".to_string(),
            thumbnail_path: Some("/album/.thumbnails/photo.jpg".to_string()),
            size: Some(1024),
            mod_time: "2024-01-01T00:00:00.000Z".to_string(),
            is_dir: false,
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"thumbnailPath\""));
        assert!(json.contains("\"modTime\""));
        assert!(json.contains("\"isDir\":false"));

        // 目录条目不序列化 size 和 thumbnailPath
        let dir = ShareEntry {
            name: "album".to_string(),
            path: "/album".to_string(),
            thumbnail_path: None,
            size: None,
            mod_time: "2024-01-01T00:00:00.000Z".to_string(),
            is_dir: true,
        };
        let json = serde_json::to_string(&dir).unwrap();
        assert!(!json.contains("thumbnailPath"));
        assert!(!json.contains("\"size\""));
    }
}
