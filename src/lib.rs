// Home Share Rust Library
// 家庭共享目录服务核心库

// 配置管理模块
pub mod config;

// 日志系统模块
pub mod logging;

// Web服务器模块
pub mod server;

// 共享目录模块
pub mod share;

// 导出常用类型
pub use config::AppConfig;
pub use server::{AccessPolicy, AppState, OpenAccess};
pub use share::{
    EnsureResult, ImageScanner, PathGuard, ShareEntry, ShareError, ShareErrorCode, ShareService,
    ThumbnailService,
};
