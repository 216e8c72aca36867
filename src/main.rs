mod app;
mod config;
mod export;
mod package_manager;
mod session;

use anyhow::Result;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // 加载配置
    let config = config::Config::load_or_default()?;

    if !package_manager::pacman_available() {
        log::warn!("pacman not found in PATH, package commands will fail");
    }

    let session = Arc::new(session::Session::new(config.details_cache_capacity));
    app::run(config, session).await?;

    Ok(())
}
