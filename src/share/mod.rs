// 共享目录模块
//
// 提供共享根目录内的受限浏览、条目变更与缩略图维护能力

mod guard;
mod scan;
mod service;
mod thumbs;
mod types;

pub use guard::PathGuard;
pub use scan::ImageScanner;
pub use service::ShareService;
pub use thumbs::ThumbnailService;
pub use types::*;
