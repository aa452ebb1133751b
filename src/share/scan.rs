// 共享目录图片扫描
//
// 递归收集目录下可生成缩略图的图片文件

use std::path::PathBuf;

use tracing::debug;
use walkdir::WalkDir;

use super::types::{is_supported_image, ShareError, ShareErrorCode};

/// 图片扫描器
pub struct ImageScanner {
    /// 扫描的根目录（绝对路径）
    root: PathBuf,
}

impl ImageScanner {
    /// 创建新的图片扫描器
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// 递归收集支持的图片文件
    ///
    /// 点号开头的文件和目录整体剪枝（.thumbnails 因此不会被进入），
    /// 不跟随符号链接。起始目录自身不受隐藏名过滤影响。
    pub fn scan(&self) -> Vec<PathBuf> {
        let files: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                entry
                    .file_name()
                    .to_str()
                    .map(|name| !name.starts_with('.'))
                    .unwrap_or(false)
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| is_supported_image(path))
            .collect();

        debug!("图片扫描完成: {:?}, 共 {} 个候选", self.root, files.len());
        files
    }

    /// 异步扫描（阻塞线程池中执行）
    pub async fn scan_async(&self) -> Result<Vec<PathBuf>, ShareError> {
        let root = self.root.clone();

        tokio::task::spawn_blocking(move || {
            let scanner = ImageScanner { root };
            scanner.scan()
        })
        .await
        .map_err(|e| {
            ShareError::new(ShareErrorCode::IoFailed)
                .with_message(format!("扫描任务执行失败: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    fn sorted(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
        paths.sort();
        paths
    }

    #[test]
    fn test_scan_collects_supported_images() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        touch(&root.join("a.jpg"));
        touch(&root.join("b.png"));
        touch(&root.join("notes.txt"));
        fs::create_dir(root.join("sub")).unwrap();
        touch(&root.join("sub").join("c.jpeg"));

        let found = sorted(ImageScanner::new(root.to_path_buf()).scan());
        assert_eq!(
            found,
            sorted(vec![
                root.join("a.jpg"),
                root.join("b.png"),
                root.join("sub").join("c.jpeg"),
            ])
        );
    }

    #[test]
    fn test_scan_prunes_dot_entries() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        touch(&root.join("visible.jpg"));
        touch(&root.join(".hidden.png"));
        fs::create_dir(root.join(".thumbnails")).unwrap();
        touch(&root.join(".thumbnails").join("visible.jpg"));
        fs::create_dir(root.join(".secret")).unwrap();
        touch(&root.join(".secret").join("inside.jpg"));

        let found = ImageScanner::new(root.to_path_buf()).scan();
        assert_eq!(found, vec![root.join("visible.jpg")]);
    }

    #[test]
    fn test_scan_enters_dot_named_start_dir() {
        let dir = tempdir().unwrap();
        let start = dir.path().join(".start");
        fs::create_dir(&start).unwrap();
        touch(&start.join("x.jpg"));

        // 起始目录自身即使以点号开头也会被扫描
        let found = ImageScanner::new(start.clone()).scan();
        assert_eq!(found, vec![start.join("x.jpg")]);
    }

    #[tokio::test]
    async fn test_scan_async_matches_sync() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("one.png"));
        touch(&root.join("two.jpg"));

        let scanner = ImageScanner::new(root.to_path_buf());
        let sync = sorted(scanner.scan());
        let from_async = sorted(scanner.scan_async().await.unwrap());
        assert_eq!(sync, from_async);
    }
}
