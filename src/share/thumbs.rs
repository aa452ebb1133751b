// 缩略图服务
//
// 在原图同级的 .thumbnails 边车目录中生成定宽缩略图。
// 同一边车路径的并发 ensure 按路径加锁单飞，磁盘上最多生成一次。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use image::imageops::FilterType;
use image::{GenericImageView, ImageFormat};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::types::{
    is_supported_image, EnsureResult, ShareError, ShareErrorCode, ThumbnailMeta, THUMB_DIR_NAME,
    THUMB_MAX_WIDTH,
};

/// 缩略图服务
pub struct ThumbnailService {
    /// 以边车路径为键的生成锁
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl ThumbnailService {
    /// 创建新的缩略图服务
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// 计算原图对应的边车缩略图路径：{parent}/.thumbnails/{name}
    pub fn sidecar_path(&self, source: &Path) -> Option<PathBuf> {
        let parent = source.parent()?;
        let name = source.file_name()?;
        Some(parent.join(THUMB_DIR_NAME).join(name))
    }

    /// 确保原图存在对应缩略图
    ///
    /// 已存在时返回 Skipped，不重新生成也不改写现有产物。
    /// 同一原图的并发调用只有一个生成方，其余等待后跳过。
    pub async fn ensure(&self, source: &Path) -> Result<EnsureResult, ShareError> {
        if !is_supported_image(source) {
            return Err(ShareError::new(ShareErrorCode::UnsupportedImage)
                .with_path(source.to_string_lossy().to_string()));
        }

        let thumb_path = self.sidecar_path(source).ok_or_else(|| {
            ShareError::new(ShareErrorCode::InvalidName)
                .with_path(source.to_string_lossy().to_string())
        })?;

        // 快路径：缩略图已存在
        if thumb_path.is_file() {
            return Ok(EnsureResult::Skipped);
        }

        let lock = self
            .locks
            .entry(thumb_path.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let result = {
            let _permit = lock.lock().await;

            // 拿到锁后复查，竞争失败方跳过
            if thumb_path.is_file() {
                Ok(EnsureResult::Skipped)
            } else {
                let source = source.to_path_buf();
                let thumb = thumb_path.clone();
                // 解码和缩放是 CPU 密集操作，放入阻塞线程池
                tokio::task::spawn_blocking(move || generate_thumbnail(&source, &thumb))
                    .await
                    .map_err(|e| {
                        ShareError::new(ShareErrorCode::IoFailed)
                            .with_message(format!("缩略图任务执行失败: {}", e))
                    })?
                    .map(EnsureResult::Generated)
            }
        };

        // 回收无人持有的锁条目，避免映射随路径数量无限增长
        drop(lock);
        self.locks
            .remove_if(&thumb_path, |_, l| Arc::strong_count(l) == 1);

        result
    }
}

/// 同步生成缩略图
///
/// 先解码后落盘：解码失败时不会留下任何文件。
/// 产物先写入 .part 临时文件再原子改名，外界不可见半成品。
fn generate_thumbnail(source: &Path, thumb_path: &Path) -> Result<ThumbnailMeta, ShareError> {
    let src_display = source.to_string_lossy().to_string();

    info!("生成缩略图: {}", src_display);

    let reader = image::io::Reader::open(source)
        .map_err(|e| ShareError::from_io(&e).with_path(src_display.clone()))?;

    let src_image = reader
        .with_guessed_format()
        .map_err(|e| ShareError::from_io(&e).with_path(src_display.clone()))?
        .decode()
        .map_err(|e| {
            warn!("图片解码失败: {}: {}", src_display, e);
            ShareError::new(ShareErrorCode::DecodeFailed)
                .with_path(src_display.clone())
                .with_message(format!("图片解码失败: {}", e))
        })?;

    let (src_width, src_height) = src_image.dimensions();

    // 宽度超过上限时等比缩放到定宽，否则保持原尺寸（不放大）
    let (width, height) = if src_width > THUMB_MAX_WIDTH {
        let scaled =
            (src_height as f64 * THUMB_MAX_WIDTH as f64 / src_width as f64).round() as u32;
        (THUMB_MAX_WIDTH, scaled.max(1))
    } else {
        (src_width, src_height)
    };

    let thumbnail = src_image.resize_exact(width, height, FilterType::Triangle);

    // 编码格式跟随原图扩展名
    let format = match source
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => ImageFormat::Jpeg,
        Some("png") => ImageFormat::Png,
        _ => {
            return Err(ShareError::new(ShareErrorCode::UnsupportedImage).with_path(src_display));
        }
    };

    let thumb_dir = thumb_path.parent().ok_or_else(|| {
        ShareError::new(ShareErrorCode::IoFailed)
            .with_path(thumb_path.to_string_lossy().to_string())
    })?;
    std::fs::create_dir_all(thumb_dir)
        .map_err(|e| ShareError::from_io(&e).with_path(thumb_dir.to_string_lossy().to_string()))?;

    let part_path = {
        let mut p = thumb_path.as_os_str().to_os_string();
        p.push(".part");
        PathBuf::from(p)
    };

    if let Err(e) = thumbnail.save_with_format(&part_path, format) {
        let _ = std::fs::remove_file(&part_path);
        warn!("缩略图编码失败: {}: {}", src_display, e);
        return Err(ShareError::new(ShareErrorCode::IoFailed)
            .with_path(src_display)
            .with_message(format!("缩略图写入失败: {}", e)));
    }

    if let Err(e) = std::fs::rename(&part_path, thumb_path) {
        let _ = std::fs::remove_file(&part_path);
        return Err(
            ShareError::from_io(&e).with_path(thumb_path.to_string_lossy().to_string())
        );
    }

    debug!("缩略图生成完成: {:?} ({}x{})", thumb_path, width, height);

    Ok(ThumbnailMeta {
        path: thumb_path.to_path_buf(),
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, RgbImage};
    use tempfile::tempdir;

    fn write_jpeg(path: &Path, width: u32, height: u32) {
        let img: RgbImage = ImageBuffer::from_pixel(width, height, Rgb([120u8, 30, 200]));
        img.save_with_format(path, ImageFormat::Jpeg).unwrap();
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        let img: RgbImage = ImageBuffer::from_pixel(width, height, Rgb([10u8, 160, 90]));
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    #[tokio::test]
    async fn test_wide_image_scaled_to_fixed_width() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("wide.jpg");
        write_jpeg(&source, 2000, 1000);

        let service = ThumbnailService::new();
        let result = service.ensure(&source).await.unwrap();

        match result {
            EnsureResult::Generated(meta) => {
                assert_eq!(meta.width, 300);
                assert_eq!(meta.height, 150);
                assert_eq!(meta.path, dir.path().join(".thumbnails").join("wide.jpg"));

                // 产物可解码且尺寸正确
                let thumb = image::open(&meta.path).unwrap();
                assert_eq!(thumb.dimensions(), (300, 150));
            }
            EnsureResult::Skipped => panic!("首次调用应当生成缩略图"),
        }
    }

    #[tokio::test]
    async fn test_small_image_not_upscaled() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("small.png");
        write_png(&source, 100, 50);

        let service = ThumbnailService::new();
        let result = service.ensure(&source).await.unwrap();

        match result {
            EnsureResult::Generated(meta) => {
                assert_eq!(meta.width, 100);
                assert_eq!(meta.height, 50);
                let thumb = image::open(&meta.path).unwrap();
                assert_eq!(thumb.dimensions(), (100, 50));
            }
            EnsureResult::Skipped => panic!("首次调用应当生成缩略图"),
        }
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("photo.jpg");
        write_jpeg(&source, 640, 480);

        let service = ThumbnailService::new();
        let first = service.ensure(&source).await.unwrap();
        assert!(matches!(first, EnsureResult::Generated(_)));

        let thumb_path = dir.path().join(".thumbnails").join("photo.jpg");
        let bytes_after_first = std::fs::read(&thumb_path).unwrap();

        // 第二次调用跳过，产物字节不变
        let second = service.ensure(&source).await.unwrap();
        assert_eq!(second, EnsureResult::Skipped);
        assert_eq!(std::fs::read(&thumb_path).unwrap(), bytes_after_first);
    }

    #[tokio::test]
    async fn test_corrupt_image_leaves_no_artifact() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("broken.jpg");
        std::fs::write(&source, b"this is not an image").unwrap();

        let service = ThumbnailService::new();
        let err = service.ensure(&source).await.unwrap_err();
        assert_eq!(err.code, ShareErrorCode::DecodeFailed);

        // 解码先于任何写入，连边车目录都不应出现
        assert!(!dir.path().join(THUMB_DIR_NAME).exists());
    }

    #[tokio::test]
    async fn test_unsupported_extension_rejected() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("clip.gif");
        std::fs::write(&source, b"GIF89a").unwrap();

        let service = ThumbnailService::new();
        let err = service.ensure(&source).await.unwrap_err();
        assert_eq!(err.code, ShareErrorCode::UnsupportedImage);
        assert!(!dir.path().join(THUMB_DIR_NAME).exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ensure_generates_once() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("race.jpg");
        write_jpeg(&source, 800, 600);

        let service = Arc::new(ThumbnailService::new());

        let s1 = Arc::clone(&service);
        let p1 = source.clone();
        let t1 = tokio::spawn(async move { s1.ensure(&p1).await });

        let s2 = Arc::clone(&service);
        let p2 = source.clone();
        let t2 = tokio::spawn(async move { s2.ensure(&p2).await });

        let r1 = t1.await.unwrap().unwrap();
        let r2 = t2.await.unwrap().unwrap();

        // 两个并发调用恰好一个生成，另一个跳过
        let generated = [&r1, &r2]
            .iter()
            .filter(|r| matches!(r, EnsureResult::Generated(_)))
            .count();
        assert_eq!(generated, 1);

        assert!(dir.path().join(".thumbnails").join("race.jpg").is_file());
    }

    #[tokio::test]
    async fn test_lock_map_is_reclaimed() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("tidy.png");
        write_png(&source, 400, 400);

        let service = ThumbnailService::new();
        service.ensure(&source).await.unwrap();

        assert!(service.locks.is_empty());
    }
}
