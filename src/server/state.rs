// 应用状态

use crate::config::AppConfig;
use crate::server::access::{AccessPolicy, OpenAccess};
use crate::share::ShareService;
use std::sync::Arc;
use tokio::sync::RwLock;

/// 应用全局状态
#[derive(Clone)]
pub struct AppState {
    /// 共享目录服务
    pub share: Arc<ShareService>,
    /// API 访问策略
    pub access: Arc<dyn AccessPolicy>,
    /// 应用配置
    pub config: Arc<RwLock<AppConfig>>,
}

impl AppState {
    /// 创建新的应用状态
    pub async fn new() -> anyhow::Result<Self> {
        // 加载配置
        let config = AppConfig::load_or_default("config/app.toml").await;
        Self::with_config(config)
    }

    /// 使用给定配置创建应用状态
    ///
    /// 共享根目录在此校验并创建，之后注入共享服务
    pub fn with_config(config: AppConfig) -> anyhow::Result<Self> {
        config.share.ensure_root_exists()?;

        let share = Arc::new(ShareService::new(config.share.root.clone()));

        Ok(Self {
            share,
            access: Arc::new(OpenAccess),
            config: Arc::new(RwLock::new(config)),
        })
    }
}
