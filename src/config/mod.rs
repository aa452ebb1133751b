// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 共享目录配置
    pub share: ShareConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
}

/// 共享目录配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareConfig {
    /// 共享根目录（必须是绝对路径）
    pub root: PathBuf,
    /// 单次上传大小上限 (MB)
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_max_upload_mb() -> usize {
    1024
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

/// 检测是否运行在容器内
///
/// 依次检查 /.dockerenv 文件、/proc/1/cgroup 内容和 container 环境变量
fn running_in_container() -> bool {
    if Path::new("/.dockerenv").exists() {
        return true;
    }

    if let Ok(content) = std::fs::read_to_string("/proc/1/cgroup") {
        if content.contains("docker") || content.contains("containerd") {
            return true;
        }
    }

    std::env::var("container").is_ok()
}

impl Default for ServerConfig {
    fn default() -> Self {
        // 容器环境监听 0.0.0.0 以便从宿主机访问，本地环境只监听回环地址
        let host = if running_in_container() {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        };

        Self {
            host: host.to_string(),
            port: 18080,
        }
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        // 容器环境使用固定挂载路径，本地环境使用当前工作目录下的 share
        let root = if running_in_container() {
            PathBuf::from("/app/share")
        } else {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("share")
        };

        Self {
            root,
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let server = ServerConfig::default();
        let share = ShareConfig::default();

        tracing::info!(
            "使用默认配置, 监听地址: {}:{}, 共享根目录: {:?}",
            server.host,
            server.port,
            share.root
        );

        Self {
            server,
            share,
            log: LogConfig::default(),
        }
    }
}

impl ShareConfig {
    /// 验证共享根目录是否为绝对路径
    pub fn validate_root(&self) -> Result<()> {
        if !self.root.is_absolute() {
            anyhow::bail!(
                "共享根目录必须是绝对路径，当前值: {:?}\n\
                 Windows 示例: D:\\Share 或 C:\\Users\\YourName\\Share\n\
                 Linux/Docker 示例: /app/share 或 /srv/share",
                self.root
            );
        }

        tracing::debug!("共享根目录路径格式验证通过: {:?}", self.root);
        Ok(())
    }

    /// 确保共享根目录存在且可写（不存在则自动创建）
    pub fn ensure_root_exists(&self) -> Result<()> {
        self.validate_root()?;

        if !self.root.exists() {
            std::fs::create_dir_all(&self.root)
                .with_context(|| format!("无法创建共享根目录: {:?}", self.root))?;
            tracing::info!("自动创建共享根目录: {:?}", self.root);
        }

        if !self.root.is_dir() {
            anyhow::bail!("共享根目录不是目录: {:?}", self.root);
        }

        self.check_writable()
            .with_context(|| format!("共享根目录不可写: {:?}", self.root))?;

        tracing::info!("共享根目录已准备就绪: {:?}", self.root);
        Ok(())
    }

    /// 通过创建临时文件检测根目录写入权限
    fn check_writable(&self) -> Result<()> {
        let test_file = self.root.join(".write_test");
        std::fs::File::create(&test_file)
            .with_context(|| format!("在 {:?} 创建探测文件失败", self.root))?;
        let _ = std::fs::remove_file(&test_file);
        Ok(())
    }

    /// 上传大小上限（字节），换算溢出时封顶
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        config
            .share
            .validate_root()
            .context("配置文件中的共享根目录验证失败")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        self.share
            .validate_root()
            .context("保存配置失败：共享根目录必须是绝对路径")?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("配置已保存: {}", path);
        Ok(())
    }

    /// 加载或创建默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("已加载配置文件: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("加载配置文件失败, 回退默认配置: {}", e);
                let default_config = Self::default();

                // 首次启动：自动创建默认共享根目录
                if let Err(e) = default_config.share.ensure_root_exists() {
                    tracing::error!("无法准备默认共享根目录: {}", e);
                }

                if let Err(e) = default_config.save_to_file(path).await {
                    tracing::error!("写入默认配置失败: {}", e);
                }

                default_config
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 18080);
        assert_eq!(config.share.max_upload_mb, 1024);
        assert!(config.log.enabled);
        assert_eq!(config.log.retention_days, 7);
        assert_eq!(config.log.level, "info");
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        let mut config = AppConfig::default();
        config.share.root = std::env::temp_dir().join("home-share-config-test");
        config.save_to_file(&path).await.unwrap();

        let loaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(loaded.server.port, config.server.port);
        assert_eq!(loaded.share.root, config.share.root);
        assert_eq!(loaded.share.max_upload_mb, config.share.max_upload_mb);
    }

    #[test]
    fn test_validate_root() {
        let relative = ShareConfig {
            root: PathBuf::from("share"),
            max_upload_mb: 1024,
        };
        assert!(relative.validate_root().is_err());

        let absolute = ShareConfig {
            root: std::env::temp_dir().join("share"),
            max_upload_mb: 1024,
        };
        assert!(absolute.validate_root().is_ok());
    }

    #[test]
    fn test_ensure_root_creates_directory() {
        let temp = tempfile::tempdir().unwrap();
        let config = ShareConfig {
            root: temp.path().join("nested").join("share"),
            max_upload_mb: 1024,
        };

        config.ensure_root_exists().unwrap();
        assert!(config.root.is_dir());
        // 写入探测文件已清理
        assert!(!config.root.join(".write_test").exists());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let toml_str = r#"
[server]
host = "0.0.0.0"
port = 9000

[share]
root = "/srv/share"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.share.root, PathBuf::from("/srv/share"));
        assert_eq!(config.share.max_upload_mb, 1024);
        assert!(config.log.enabled);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_max_upload_bytes() {
        let config = ShareConfig {
            root: PathBuf::from("/srv/share"),
            max_upload_mb: 2,
        };
        assert_eq!(config.max_upload_bytes(), 2 * 1024 * 1024);

        // 离谱的配置值不回绕，封顶为 usize::MAX
        let absurd = ShareConfig {
            root: PathBuf::from("/srv/share"),
            max_upload_mb: usize::MAX,
        };
        assert_eq!(absurd.max_upload_bytes(), usize::MAX);
    }
}
