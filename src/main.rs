#[macro_use]
mod log;

mod adapters;
mod command;
mod config;
mod db;
mod event;
mod matcher;
mod message;
mod mys;
mod plugins;
mod render;
mod res;
mod scheduler;

use crate::config::AppConfig;
use crate::event::{BotStatus, Context, EventType};
use crate::matcher::Matcher;
use crate::scheduler::Scheduler;
use std::sync::{Arc, RwLock};
use tokio::fs;
use tokio::sync::Mutex as AsyncMutex;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!(target: "System", "Trailblazer 启动中...");

    // 加载配置，不存在时生成默认配置
    let mut app_config: AppConfig = match fs::read_to_string(CONFIG_PATH).await {
        Ok(content) => toml::from_str(&content)?,
        Err(_) => {
            info!(target: "System", "未找到 {}，正在生成默认配置", CONFIG_PATH);
            AppConfig::default()
        }
    };

    // 补全缺失的插件默认配置并回写
    for plugin in plugins::get_plugins() {
        app_config
            .plugins
            .entry(plugin.name.to_string())
            .or_insert_with(plugin.default_config);
    }
    app_config.save(CONFIG_PATH).await?;

    let mys_config = app_config.mys.clone();
    let bots = app_config.bots.clone();

    let config = Arc::new(RwLock::new(app_config));
    let config_save_lock = Arc::new(AsyncMutex::new(()));
    let scheduler = Arc::new(Scheduler::new());

    let db = db::init().await?;

    // 设备指纹与资源索引
    mys::init().await?;
    res::init(&mys_config).await?;

    // 每日凌晨同步一次资源索引
    scheduler.add_daily_at(4, 30, 0, || async {
        res::get().update().await;
    });

    // 插件初始化 (建表等)
    let init_ctx = Context {
        event: EventType::Init,
        config: config.clone(),
        config_save_lock: config_save_lock.clone(),
        db: db.clone(),
        scheduler: scheduler.clone(),
        matcher: Arc::new(Matcher::new()),
        config_path: CONFIG_PATH.to_string(),
        bot: BotStatus::default(),
    };
    plugins::do_init(init_ctx).await?;

    // 启动各 Bot 适配器
    let mut handles = Vec::new();
    for bot_config in bots {
        if !bot_config.enabled {
            continue;
        }
        match adapters::find_adapter(&bot_config.protocol) {
            Some(adapter) => {
                info!(target: "System", "启动适配器: {}", adapter.protocol);
                let handle = tokio::spawn((adapter.handler)(
                    bot_config,
                    config.clone(),
                    db.clone(),
                    scheduler.clone(),
                    config_save_lock.clone(),
                    CONFIG_PATH.to_string(),
                ));
                handles.push(handle);
            }
            None => {
                warn!(target: "System", "未知协议: {}", bot_config.protocol);
            }
        }
    }

    if handles.is_empty() {
        warn!(target: "System", "没有启用任何 Bot，请检查 {}", CONFIG_PATH);
    }

    tokio::signal::ctrl_c().await?;
    info!(target: "System", "收到退出信号，正在清理...");
    scheduler.shutdown();
    for handle in handles {
        handle.abort();
    }

    Ok(())
}
