// 共享目录服务
//
// 提供目录列表、创建、删除、重命名与缩略图回填

use std::fs::{self, DirEntry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::guard::PathGuard;
use super::scan::ImageScanner;
use super::thumbs::ThumbnailService;
use super::types::*;

/// 共享目录服务
pub struct ShareService {
    guard: PathGuard,
    thumbs: Arc<ThumbnailService>,
}

impl ShareService {
    /// 创建新的共享目录服务
    ///
    /// root 为共享根目录的绝对路径（由配置层校验并创建）
    pub fn new(root: PathBuf) -> Self {
        Self {
            guard: PathGuard::new(root),
            thumbs: Arc::new(ThumbnailService::new()),
        }
    }

    /// 路径守卫
    pub fn guard(&self) -> &PathGuard {
        &self.guard
    }

    /// 缩略图服务
    pub fn thumbnails(&self) -> &ThumbnailService {
        &self.thumbs
    }

    /// 列出目录内容
    ///
    /// 隐藏条目（点号开头）不出现在结果中；
    /// 列举期间被并发删除的条目跳过，不视为整体失败
    pub fn list_directory(&self, virtual_path: &str) -> Result<ListResponse, ShareError> {
        let dir = self.guard.resolve(virtual_path)?;

        let metadata =
            fs::metadata(&dir).map_err(|e| ShareError::from_io(&e).with_path(virtual_path))?;
        if !metadata.is_dir() {
            return Err(ShareError::new(ShareErrorCode::NotADirectory).with_path(virtual_path));
        }

        let read_dir = fs::read_dir(&dir).map_err(|e| {
            tracing::error!("读取目录失败: {:?}, 错误: {}", dir, e);
            ShareError::from_io(&e).with_path(virtual_path)
        })?;

        let mut items: Vec<ShareEntry> = read_dir
            .filter_map(|entry| entry.ok())
            .filter(|entry| !self.guard.is_hidden(&entry.file_name().to_string_lossy()))
            .filter_map(|entry| self.to_share_entry(&entry).ok())
            .collect();

        partition_dirs_first(&mut items);

        Ok(ListResponse {
            path: self.guard.to_virtual(&dir)?,
            items,
        })
    }

    /// 在父目录下创建子目录
    pub fn create_directory(&self, parent: &str, name: &str) -> Result<ShareEntry, ShareError> {
        self.guard.validate_entry_name(name)?;
        let parent_abs = self.guard.resolve(parent)?;
        let target = parent_abs.join(name);

        fs::create_dir(&target).map_err(|e| {
            warn!("创建目录失败: {:?}, 错误: {}", target, e);
            ShareError::from_io(&e).with_path(self.guard.join_virtual(parent, name))
        })?;
        info!("创建目录: {:?}", target);

        let metadata = fs::metadata(&target)
            .map_err(|e| ShareError::from_io(&e).with_path(self.guard.join_virtual(parent, name)))?;
        self.make_entry(&target, &metadata)
    }

    /// 删除条目
    ///
    /// 文件先删除其边车缩略图，缩略图删除失败则中止整个删除。
    /// 目录整体递归删除（其中的 .thumbnails 一并消失）。
    /// 符号链接按链接本身处理，不跟随。
    pub fn delete_item(&self, virtual_path: &str) -> Result<(), ShareError> {
        let abs = self.guard.resolve(virtual_path)?;

        if abs == self.guard.root() {
            return Err(ShareError::new(ShareErrorCode::InvalidName)
                .with_path(virtual_path)
                .with_message("不能删除共享根目录"));
        }

        let metadata = fs::symlink_metadata(&abs)
            .map_err(|e| ShareError::from_io(&e).with_path(virtual_path))?;

        if metadata.is_dir() {
            fs::remove_dir_all(&abs)
                .map_err(|e| ShareError::from_io(&e).with_path(virtual_path))?;
        } else {
            if let Some(sidecar) = self.thumbs.sidecar_path(&abs) {
                if sidecar.is_file() {
                    fs::remove_file(&sidecar).map_err(|e| {
                        warn!("删除边车缩略图失败: {:?}, 错误: {}", sidecar, e);
                        ShareError::from_io(&e)
                            .with_path(sidecar.to_string_lossy().to_string())
                    })?;
                }
            }
            fs::remove_file(&abs)
                .map_err(|e| ShareError::from_io(&e).with_path(virtual_path))?;
        }

        info!("删除条目: {:?}", abs);
        Ok(())
    }

    /// 在原目录内重命名条目
    ///
    /// 旧名称对应的缩略图不迁移不删除：新名称下首次 ensure 时重新生成，
    /// 旧缩略图留在边车目录直到原图被删除
    pub fn rename_item(&self, virtual_path: &str, new_name: &str) -> Result<(), ShareError> {
        let abs = self.guard.resolve(virtual_path)?;

        if abs == self.guard.root() {
            return Err(ShareError::new(ShareErrorCode::InvalidName)
                .with_path(virtual_path)
                .with_message("不能重命名共享根目录"));
        }

        self.guard.validate_entry_name(new_name)?;

        let parent = abs.parent().ok_or_else(|| {
            ShareError::new(ShareErrorCode::InvalidName).with_path(virtual_path)
        })?;
        let target = parent.join(new_name);

        // 同目录改名必定在同一文件系统上
        fs::rename(&abs, &target).map_err(|e| {
            warn!("重命名失败: {:?} -> {:?}, 错误: {}", abs, target, e);
            ShareError::from_io(&e).with_path(virtual_path)
        })?;

        info!("重命名条目: {:?} -> {:?}", abs, target);
        Ok(())
    }

    /// 回填目录树下缺失的缩略图
    ///
    /// 返回本次新生成的数量，已存在的不计入；单个文件失败只记日志不中止。
    /// 隐藏路径不可列出，也不可作为回填起点
    pub async fn ensure_thumbnails(&self, virtual_path: &str) -> Result<u32, ShareError> {
        let dir = self.guard.resolve(virtual_path)?;

        // 含隐藏段的起点按不存在处理，.thumbnails 不会被再缩略
        if self.guard.contains_hidden_segment(virtual_path) {
            return Err(ShareError::new(ShareErrorCode::NotFound).with_path(virtual_path));
        }

        let metadata =
            fs::metadata(&dir).map_err(|e| ShareError::from_io(&e).with_path(virtual_path))?;
        if !metadata.is_dir() {
            return Err(ShareError::new(ShareErrorCode::NotADirectory).with_path(virtual_path));
        }

        let candidates = ImageScanner::new(dir.clone()).scan_async().await?;
        info!("缩略图回填开始: {:?}, 候选 {} 个", dir, candidates.len());

        let mut generated: u32 = 0;
        for path in candidates {
            match self.thumbs.ensure(&path).await {
                Ok(EnsureResult::Generated(_)) => generated += 1,
                Ok(EnsureResult::Skipped) => {}
                Err(e) => warn!("缩略图生成失败: {:?}, 错误: {}", path, e),
            }
        }

        info!("缩略图回填完成: {:?}, 新生成 {} 个", dir, generated);
        Ok(generated)
    }

    /// 解析已存在文件的绝对路径，目录与缺失条目分别报错
    pub fn resolve_file(&self, virtual_path: &str) -> Result<PathBuf, ShareError> {
        let abs = self.guard.resolve(virtual_path)?;

        let metadata =
            fs::metadata(&abs).map_err(|e| ShareError::from_io(&e).with_path(virtual_path))?;
        if !metadata.is_file() {
            return Err(ShareError::new(ShareErrorCode::NotAFile).with_path(virtual_path));
        }

        Ok(abs)
    }

    /// 为上传解析目标文件的绝对路径（目标目录必须已存在）
    pub fn resolve_upload_target(
        &self,
        parent: &str,
        file_name: &str,
    ) -> Result<PathBuf, ShareError> {
        self.guard.validate_entry_name(file_name)?;
        let dir = self.guard.resolve(parent)?;

        let metadata =
            fs::metadata(&dir).map_err(|e| ShareError::from_io(&e).with_path(parent))?;
        if !metadata.is_dir() {
            return Err(ShareError::new(ShareErrorCode::NotADirectory).with_path(parent));
        }

        Ok(dir.join(file_name))
    }

    /// 上传落盘后的收尾：设置权限、生成缩略图、返回条目
    ///
    /// 支持的图片上传后立即生成缩略图，生成失败视为上传失败
    pub async fn finish_upload(&self, abs: &Path) -> Result<ShareEntry, ShareError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(abs, fs::Permissions::from_mode(0o775))
                .map_err(|e| ShareError::from_io(&e).with_path(abs.to_string_lossy().to_string()))?;
        }

        if is_supported_image(abs) {
            self.thumbs.ensure(abs).await?;
        }

        let metadata = fs::metadata(abs)
            .map_err(|e| ShareError::from_io(&e).with_path(abs.to_string_lossy().to_string()))?;
        self.make_entry(abs, &metadata)
    }

    /// 将 DirEntry 转换为 ShareEntry
    fn to_share_entry(&self, entry: &DirEntry) -> Result<ShareEntry, ShareError> {
        let path = entry.path();
        let metadata = entry
            .metadata()
            .map_err(|e| ShareError::from_io(&e).with_path(path.to_string_lossy().to_string()))?;
        self.make_entry(&path, &metadata)
    }

    /// 根据绝对路径和元数据构建条目
    fn make_entry(&self, abs: &Path, metadata: &fs::Metadata) -> Result<ShareEntry, ShareError> {
        let name = abs
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| abs.to_string_lossy().to_string());

        let is_dir = metadata.is_dir();
        let size = if metadata.is_file() {
            Some(metadata.len())
        } else {
            None
        };

        let mod_time = metadata
            .modified()
            .map(|t| self.system_time_to_iso8601(t))
            .unwrap_or_default();

        // 仅文件探测边车缩略图，以当次 stat 为准
        let thumbnail_path = if is_dir { None } else { self.probe_thumbnail(abs) };

        Ok(ShareEntry {
            name,
            path: self.guard.to_virtual(abs)?,
            thumbnail_path,
            size,
            mod_time,
            is_dir,
        })
    }

    /// 探测文件的边车缩略图是否存在
    fn probe_thumbnail(&self, abs: &Path) -> Option<String> {
        let sidecar = self.thumbs.sidecar_path(abs)?;
        if sidecar.is_file() {
            self.guard.to_virtual(&sidecar).ok()
        } else {
            None
        }
    }

    /// 将 SystemTime 转换为 ISO8601 字符串
    fn system_time_to_iso8601(&self, time: SystemTime) -> String {
        let datetime: DateTime<Utc> = time.into();
        datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }
}

/// 目录排在文件之前，两组内部保持原有枚举顺序
fn partition_dirs_first(entries: &mut [ShareEntry]) {
    // sort_by_key 是稳定排序
    entries.sort_by_key(|e| !e.is_dir);
}
