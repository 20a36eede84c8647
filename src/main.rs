#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use tracing::info;
use std::sync::Arc;
use audio_extract_rs::{
    batch::SimulatedExtractor, config::Settings, utils::logger, AppContext, BUILD_VERSION,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 读取 .env 与环境变量
    audio_extract_rs::init_env();
    let settings = Settings::from_env()?;

    // 初始化日志系统
    let _guard = logger::init(settings.log_dir.clone(), &settings.log_level)?;

    info!(
        "Starting {} {} in {} mode...",
        settings.app_name, *BUILD_VERSION, settings.environment
    );

    // 初始化提取器
    // TODO: swap in an ffmpeg-backed extractor once the transcoding worker exists
    let extractor = Arc::new(SimulatedExtractor::new());

    info!(
        "Batch processing with max_concurrency={} extract_timeout={:?} request_timeout={:?}",
        settings.max_concurrency, settings.extract_timeout, settings.request_timeout
    );

    let addr = settings.addr();
    let ctx = Arc::new(AppContext::new(settings, extractor));

    info!("Starting HTTP server at http://{}", addr);

    // 启动 HTTP 服务器
    match audio_extract_rs::web::start_server(ctx, addr).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            tracing::error!("Server error: {}", e);
            return Err(e);
        }
    }

    Ok(())
}
