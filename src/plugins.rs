#![allow(dead_code)]

use crate::adapters::onebot::{LockedWriter, send_frame_raw, send_msg};
use crate::event::{BotStatus, Context, EventType};
use crate::matcher::Matcher;
use crate::message::Message;
use crate::{error, info};
use futures_util::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tokio::fs;
use toml::Value;

pub mod bind;
pub mod code;
pub mod filter_meta_event;
pub mod gacha;
pub mod help;
pub mod info;
pub mod logger;
pub mod memo;
pub mod panel;
pub mod sign;
pub mod wiki;

pub type PluginError = Box<dyn std::error::Error + Send + Sync>;

pub type PluginHandler =
    fn(Context, LockedWriter) -> BoxFuture<'static, Result<Option<Context>, PluginError>>;

pub type PluginInitHandler = fn(Context) -> BoxFuture<'static, Result<(), PluginError>>;

pub struct Plugin {
    pub name: &'static str,
    pub handler: PluginHandler,
    pub on_init: Option<PluginInitHandler>,
    /// 当 Bot 连接成功且获取到自身信息后触发 (用于注册定时任务等)
    pub on_connected: Option<PluginHandler>,
    pub default_config: fn() -> Value,
}

static PLUGINS: OnceLock<Vec<Plugin>> = OnceLock::new();

/// 获取全局插件列表
pub fn get_plugins() -> &'static [Plugin] {
    PLUGINS.get_or_init(|| {
        vec![
            Plugin {
                name: "filter_meta_event",
                handler: filter_meta_event::handle,
                on_init: None,
                on_connected: None,
                default_config: filter_meta_event::default_config,
            },
            Plugin {
                name: "logger",
                handler: logger::handle,
                on_init: None,
                on_connected: None,
                default_config: logger::default_config,
            },
            Plugin {
                name: "bind",
                handler: bind::handle,
                on_init: Some(bind::init),
                on_connected: None,
                default_config: bind::default_config,
            },
            Plugin {
                name: "sign",
                handler: sign::handle,
                on_init: None,
                on_connected: None,
                default_config: sign::default_config,
            },
            Plugin {
                name: "info",
                handler: info::handle,
                on_init: None,
                on_connected: None,
                default_config: info::default_config,
            },
            Plugin {
                name: "memo",
                handler: memo::handle,
                on_init: None,
                on_connected: None,
                default_config: memo::default_config,
            },
            Plugin {
                name: "gacha",
                handler: gacha::handle,
                on_init: Some(gacha::init),
                on_connected: None,
                default_config: gacha::default_config,
            },
            Plugin {
                name: "panel",
                handler: panel::handle,
                on_init: Some(panel::init),
                on_connected: None,
                default_config: panel::default_config,
            },
            Plugin {
                name: "code",
                handler: code::handle,
                on_init: None,
                on_connected: None,
                default_config: code::default_config,
            },
            Plugin {
                name: "wiki",
                handler: wiki::handle,
                on_init: None,
                on_connected: None,
                default_config: wiki::default_config,
            },
            Plugin {
                name: "help",
                handler: help::handle,
                on_init: None,
                on_connected: None,
                default_config: help::default_config,
            },
        ]
    })
}

fn enabled_plugins(ctx: &Context) -> HashSet<String> {
    let guard = ctx.config.read().unwrap();
    guard
        .plugins
        .iter()
        .filter(|(_, v)| v.get("enabled").and_then(|x| x.as_bool()).unwrap_or(false))
        .map(|(k, _)| k.clone())
        .collect()
}

/// 执行所有插件的初始化逻辑
pub async fn do_init(ctx: Context) -> Result<(), PluginError> {
    let plugins = get_plugins();
    let enabled = enabled_plugins(&ctx);

    info!(
        target: "System",
        "正在加载插件系统 (已启用 {}/{})",
        enabled.len(),
        plugins.len()
    );

    for plugin in plugins {
        if !enabled.contains(plugin.name) {
            continue;
        }

        if let Some(init_fn) = plugin.on_init {
            let init_ctx = Context {
                event: EventType::Init,
                config: ctx.config.clone(),
                config_save_lock: ctx.config_save_lock.clone(),
                db: ctx.db.clone(),
                scheduler: ctx.scheduler.clone(),
                matcher: Arc::new(Matcher::new()),
                config_path: ctx.config_path.clone(),
                bot: BotStatus {
                    adapter: "system".to_string(),
                    platform: "internal".to_string(),
                    login_user: Default::default(),
                },
            };

            match init_fn(init_ctx).await {
                Ok(_) => {
                    info!(target: "Plugin", "✅ [{}] 就绪 (Init Success)", plugin.name);
                }
                Err(e) => {
                    error!(target: "Plugin", "❌ [{}] 初始化失败: {}", plugin.name, e);
                }
            }
        } else {
            info!(target: "Plugin", "✅ [{}] 就绪", plugin.name);
        }
    }
    Ok(())
}

/// 当 Bot 连接建立后触发（用于注册定时任务或主动操作）
pub async fn do_connected(ctx: Context, writer: LockedWriter) -> Result<(), PluginError> {
    let plugins = get_plugins();
    let enabled = enabled_plugins(&ctx);

    for plugin in plugins {
        if !enabled.contains(plugin.name) {
            continue;
        }

        if let Some(conn_fn) = plugin.on_connected {
            if let Err(e) = conn_fn(ctx.clone(), writer.clone()).await {
                error!(target: "Plugin", "❌ [{}] 连接钩子执行失败: {}", plugin.name, e);
            } else {
                info!(target: "Plugin", "🔗 [{}] 连接钩子已触发", plugin.name);
            }
        }
    }
    Ok(())
}

/// 运行插件流水线
pub async fn run(mut ctx: Context, writer: LockedWriter) -> Result<(), PluginError> {
    let plugins = get_plugins();
    let enabled = enabled_plugins(&ctx);

    for plugin in plugins {
        if !enabled.contains(plugin.name) {
            continue;
        }

        match (plugin.handler)(ctx, writer.clone()).await? {
            Some(next_ctx) => {
                ctx = next_ctx;
            }
            None => return Ok(()),
        }
    }

    match ctx.event {
        EventType::Onebot(_) => {}
        EventType::BeforeSend(packet) => {
            let json_str = simd_json::to_string(&packet)?;
            send_frame_raw(writer, json_str).await?;
        }
        EventType::Init => {}
    }

    Ok(())
}

// ================= 工具函数 =================

pub async fn get_data_dir(plugin_name: &str) -> Result<PathBuf, PluginError> {
    let mut path = PathBuf::from("data");
    path.push(plugin_name);
    if !path.exists() {
        fs::create_dir_all(&path).await?;
    }
    Ok(path)
}

pub fn get_config<T>(ctx: &Context, plugin_name: &str) -> Option<T>
where
    T: DeserializeOwned,
{
    let guard = ctx.config.read().unwrap();
    guard
        .plugins
        .get(plugin_name)
        .and_then(|v| T::deserialize(v.clone()).ok())
}

/// 修改配置 (异步 & 自动持久化 & 线程安全)
pub async fn update_config<T, F>(ctx: &Context, plugin_name: &str, f: F) -> Result<(), PluginError>
where
    T: Serialize + DeserializeOwned + Clone,
    F: FnOnce(T) -> T,
{
    {
        let mut guard = ctx.config.write().unwrap();
        if let Some(v) = guard.plugins.get_mut(plugin_name)
            && let Ok(current_cfg) = T::deserialize(v.clone())
        {
            let new_cfg = f(current_cfg);
            if let Ok(new_val) = Value::try_from(new_cfg) {
                *v = new_val;
            }
        }
    }

    let _fs_guard = ctx.config_save_lock.lock().await;

    let latest_config_snapshot = {
        let guard = ctx.config.read().unwrap();
        guard.clone()
    };

    latest_config_snapshot.save(&ctx.config_path).await?;

    Ok(())
}

/// 回复文本。群聊中附带 @发送者。
pub async fn reply_text(
    ctx: &Context,
    writer: LockedWriter,
    group_id: Option<i64>,
    user_id: i64,
    text: impl Into<String>,
) -> Result<(), PluginError> {
    let text = text.into();
    let msg = if group_id.is_some() {
        Message::new().at(user_id).text(format!(" {text}"))
    } else {
        Message::new().text(text)
    };
    send_msg(ctx, writer, group_id, Some(user_id), msg).await
}

/// 回复图片 (base64:// / 路径 / URL)
pub async fn reply_image(
    ctx: &Context,
    writer: LockedWriter,
    group_id: Option<i64>,
    user_id: i64,
    file: impl Into<String>,
) -> Result<(), PluginError> {
    let msg = Message::new().image(file.into());
    send_msg(ctx, writer, group_id, Some(user_id), msg).await
}

/// 判断发送者是否为超级用户
pub fn is_superuser(ctx: &Context, user_id: i64) -> bool {
    ctx.config.read().unwrap().is_superuser(user_id)
}
