use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use home_share_rust::{config::LogConfig, logging, server::access, server::handlers, AppState};
use serde::Serialize;
use std::path::PathBuf;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::info;

/// 智能检测前端资源目录
/// 按优先级尝试以下路径：
/// 1. ./frontend/dist - 开发环境标准路径
/// 2. ./frontend - 打包路径（dist 内容直接在 frontend 下）
/// 3. /app/frontend/dist - Docker 容器标准路径
/// 4. /app/frontend - Docker 容器打包路径
/// 5. ./dist - 备选路径（手动部署）
/// 6. {exe_dir}/frontend/dist 等 - 相对于可执行文件的路径
fn detect_frontend_dir() -> PathBuf {
    let mut candidates = vec![
        PathBuf::from("./frontend/dist"),
        PathBuf::from("./frontend"),
        PathBuf::from("/app/frontend/dist"),
        PathBuf::from("/app/frontend"),
        PathBuf::from("./dist"),
    ];

    // 可执行文件所在目录的 frontend/dist 和 frontend
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.push(exe_dir.join("frontend/dist"));
            candidates.push(exe_dir.join("frontend"));
            candidates.push(exe_dir.join("dist"));
        }
    }

    // 按顺序尝试每个候选路径
    for path in &candidates {
        if path.exists() && path.is_dir() {
            // 有 index.html 才视为有效的前端构建产物
            if path.join("index.html").exists() {
                info!(
                    "找到前端资源目录: {:?}",
                    path.canonicalize().unwrap_or(path.clone())
                );
                return path.clone();
            }
        }
    }

    // 如果都找不到，返回默认路径并警告
    let default = PathBuf::from("./frontend/dist");
    tracing::warn!(
        "未找到前端资源目录, 回退默认路径: {:?}, 请确认前端已构建",
        default
    );
    default
}

/// 加载日志配置
///
/// 尝试从配置文件加载，失败时返回默认配置
async fn load_log_config() -> LogConfig {
    let config_path = "config/app.toml";
    if let Ok(content) = tokio::fs::read_to_string(config_path).await {
        if let Ok(config) = toml::from_str::<toml::Value>(&content) {
            if let Some(log_table) = config.get("log") {
                if let Ok(log_config) = log_table.clone().try_into::<LogConfig>() {
                    return log_config;
                }
            }
        }
    }

    // 返回默认配置
    LogConfig::default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 先尝试加载日志配置，失败时使用默认配置
    let log_config = load_log_config().await;

    // 初始化日志系统（必须保持 _log_guard 存活）
    let _log_guard = logging::init_logging(&log_config);

    info!("Home Share Rust v1.2.0 启动中...");

    // 创建应用状态（含共享根目录校验与创建）
    let app_state = AppState::new().await?;
    info!("应用状态初始化完成");

    // 获取配置
    let config = app_state.config.read().await.clone();
    let addr = format!("{}:{}", config.server.host, config.server.port);

    // 配置中间件层
    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http()) // HTTP 请求日志
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // API 路由
    let api_routes = Router::new()
        // 目录浏览与条目管理
        .route("/share/list", get(handlers::list_directory))
        .route("/share/mkdir", post(handlers::create_directory))
        .route("/share/item", delete(handlers::delete_item))
        .route("/share/rename", post(handlers::rename_item))
        // 文件传输
        .route("/share/download", get(handlers::download_file))
        .route("/share/upload", post(handlers::upload_file))
        // 缩略图维护
        .route(
            "/share/thumbnails/ensure",
            post(handlers::ensure_thumbnails),
        )
        // 上传体积上限来自配置
        .layer(DefaultBodyLimit::max(config.share.max_upload_bytes()))
        .with_state(app_state.clone())
        // 应用访问控制中间件到所有 API 路由
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            access::require_access,
        ));

    // 自动检测前端资源目录
    let frontend_dir = detect_frontend_dir();
    let index_html_path = frontend_dir.join("index.html");

    // 静态文件服务（前端资源）
    let static_service =
        ServeDir::new(&frontend_dir).not_found_service(ServeFile::new(&index_html_path));

    // 健康检查响应结构
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
        service: String,
    }

    // 健康检查处理器
    async fn health_check() -> Json<HealthResponse> {
        Json(HealthResponse {
            status: "ok".to_string(),
            service: "home-share-rust".to_string(),
        })
    }

    // 构建完整应用
    let app = Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .fallback_service(static_service)
        .layer(middleware_stack);

    // 启动服务器
    info!("服务器启动在: http://{}", addr);
    info!("API 基础路径: http://{}/api/v1", addr);
    info!("健康检查: http://{}/health", addr);
    info!("前端页面: http://{}/", addr);
    info!("共享根目录: {:?}", config.share.root);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    // 使用 select! 监听关闭信号，支持优雅关闭
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("服务器错误: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("收到 Ctrl+C, 准备退出...");
        }
    }

    info!("服务已退出");

    Ok(())
}
