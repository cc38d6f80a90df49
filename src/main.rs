use anyhow::Result;
use auto_evaluator::utils::logging;
use auto_evaluator::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env()?;

    // 初始化日志
    let log_path = logging::init(&config.log_dir)?;

    // 初始化并运行应用
    App::initialize(config, log_path).await?.run().await?;

    Ok(())
}
