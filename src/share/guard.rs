// 路径安全守卫
//
// 将虚拟路径解析为共享根目录内的绝对路径，防止路径穿越

use std::path::{Path, PathBuf};

use tracing::warn;

use super::types::{ShareError, ShareErrorCode};

/// 路径安全守卫
///
/// 持有共享根目录的绝对路径，所有对外暴露的虚拟路径都在该目录内解析。
/// 解析是纯词法计算，不访问磁盘，因此尚不存在的目标路径同样可以解析。
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// 创建新的路径守卫
    ///
    /// root 必须是绝对路径（由配置层保证）
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// 共享根目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 将虚拟路径解析为共享根目录内的绝对路径
    ///
    /// 空路径和 "/" 解析为根目录本身。两种分隔符都接受。
    pub fn resolve(&self, virtual_path: &str) -> Result<PathBuf, ShareError> {
        if self.contains_traversal(virtual_path) {
            warn!("拒绝穿越路径: {}", virtual_path);
            return Err(ShareError::new(ShareErrorCode::PathEscape).with_path(virtual_path));
        }

        // 逐段拼接，忽略空段和 "."
        let mut resolved = self.root.clone();
        for segment in virtual_path.split(['/', '\\']) {
            if segment.is_empty() || segment == "." {
                continue;
            }
            resolved.push(segment);
        }

        // 逐组件包含性复核，绝不做字符串前缀比较：
        // /srv/share-other 不是 /srv/share 的子路径
        if !resolved.starts_with(&self.root) {
            warn!("解析结果逃逸共享根目录: {} -> {:?}", virtual_path, resolved);
            return Err(ShareError::new(ShareErrorCode::PathEscape).with_path(virtual_path));
        }

        Ok(resolved)
    }

    /// 将根目录内的绝对路径转回虚拟路径（统一使用 / 分隔）
    pub fn to_virtual(&self, abs: &Path) -> Result<String, ShareError> {
        let rel = abs.strip_prefix(&self.root).map_err(|_| {
            ShareError::new(ShareErrorCode::PathEscape)
                .with_path(abs.to_string_lossy().to_string())
        })?;

        let segments: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();

        Ok(format!("/{}", segments.join("/")))
    }

    /// 拼接虚拟父路径与单段名称
    pub fn join_virtual(&self, parent: &str, name: &str) -> String {
        let trimmed = parent.trim_end_matches(['/', '\\']);
        if trimmed.is_empty() {
            format!("/{}", name)
        } else {
            format!("{}/{}", trimmed, name)
        }
    }

    /// 校验条目名称是否为单个合法路径段
    ///
    /// ".." 视为穿越企图，其余违规归为名称无效
    pub fn validate_entry_name(&self, name: &str) -> Result<(), ShareError> {
        if name == ".." {
            warn!("拒绝穿越名称: {}", name);
            return Err(ShareError::new(ShareErrorCode::PathEscape).with_path(name));
        }
        if name.is_empty() || name == "." {
            return Err(ShareError::new(ShareErrorCode::InvalidName).with_path(name));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(ShareError::new(ShareErrorCode::InvalidName)
                .with_path(name)
                .with_message("条目名称不能包含路径分隔符"));
        }
        Ok(())
    }

    /// 检查是否为隐藏条目（以 . 开头）
    pub fn is_hidden(&self, name: &str) -> bool {
        name.starts_with('.')
    }

    /// 检查虚拟路径是否包含隐藏路径段
    ///
    /// "." 是当前目录占位段，不算隐藏
    pub fn contains_hidden_segment(&self, virtual_path: &str) -> bool {
        virtual_path
            .split(['/', '\\'])
            .any(|segment| segment != "." && self.is_hidden(segment))
    }

    /// 检查虚拟路径是否包含穿越序列
    fn contains_traversal(&self, path: &str) -> bool {
        // ".." 作为完整路径段（两种分隔符都切分）
        if path.split(['/', '\\']).any(|segment| segment == "..") {
            return true;
        }

        // URL 编码变体
        let patterns = [
            "%2e%2e",     // URL 编码
            "%252e%252e", // 双重 URL 编码
        ];

        let path_lower = path.to_lowercase();
        patterns.iter().any(|p| path_lower.contains(p))
    }
}
