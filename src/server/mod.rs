// Web服务器模块

pub mod access;
pub mod handlers;
pub mod state;

pub use access::{AccessPolicy, OpenAccess};
pub use state::AppState;
