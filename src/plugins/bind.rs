use crate::adapters::onebot::LockedWriter;
use crate::command::match_any;
use crate::config::build_config;
use crate::event::Context;
use crate::mys::{self, Api, models::QrStatus};
use crate::plugins::{PluginError, get_config, is_superuser, reply_image, reply_text};
use crate::render;
use crate::{error, info, warn};
use futures_util::future::BoxFuture;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    ModelTrait, QueryFilter, Schema, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use toml::Value;

pub mod entity {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "user_bindings")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub bot_id: String,
        pub user_id: String,
        pub sr_uid: String,
        pub mys_id: Option<String>,
        pub device_id: Option<String>,
        pub device_fp: Option<String>,
        #[sea_orm(column_type = "Text", nullable)]
        pub cookie: Option<String>,
        #[sea_orm(column_type = "Text", nullable)]
        pub stoken: Option<String>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

// ================= 配置 =================

#[derive(Serialize, Deserialize)]
struct BindConfig {
    enabled: bool,
    /// 扫码登录轮询间隔（秒）
    #[serde(default = "default_qr_interval")]
    qr_poll_interval: u64,
    /// 扫码登录最大轮询次数
    #[serde(default = "default_qr_attempts")]
    qr_max_attempts: u32,
}

fn default_qr_interval() -> u64 {
    3
}

fn default_qr_attempts() -> u32 {
    60
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            qr_poll_interval: default_qr_interval(),
            qr_max_attempts: default_qr_attempts(),
        }
    }
}

pub fn default_config() -> Value {
    build_config(BindConfig::default())
}

// ================= 数据访问 =================

/// 待写入的绑定记录
#[derive(Debug, Clone, Default)]
pub struct UserBinding {
    pub bot_id: String,
    pub user_id: String,
    pub sr_uid: String,
    pub mys_id: Option<String>,
    pub device_id: Option<String>,
    pub device_fp: Option<String>,
    pub cookie: Option<String>,
    pub stoken: Option<String>,
}

pub async fn get_bindings(
    db: &DatabaseConnection,
    bot_id: &str,
    user_id: &str,
) -> Result<Vec<entity::Model>, DbErr> {
    entity::Entity::find()
        .filter(entity::Column::BotId.eq(bot_id))
        .filter(entity::Column::UserId.eq(user_id))
        .all(db)
        .await
}

/// 取指定 UID 的 cookie；未命中时退回第一条绑定
pub async fn get_cookie(
    db: &DatabaseConnection,
    bot_id: &str,
    user_id: &str,
    sr_uid: &str,
) -> Option<String> {
    let bindings = get_bindings(db, bot_id, user_id).await.ok()?;
    if bindings.is_empty() {
        return None;
    }
    bindings
        .iter()
        .find(|b| b.sr_uid == sr_uid)
        .or_else(|| bindings.first())
        .and_then(|b| b.cookie.clone())
}

/// 写入绑定。同一用户换绑新 UID 时删除旧记录；公共账号 (user_id = "0")
/// 仅在 cookie 相同时覆盖更新。
pub async fn save_binding(db: &DatabaseConnection, binding: UserBinding) -> Result<(), DbErr> {
    let existing = get_bindings(db, &binding.bot_id, &binding.user_id).await?;
    let mut updated = false;

    for old in existing {
        if binding.user_id != "0" {
            if old.sr_uid != binding.sr_uid {
                old.delete(db).await?;
            } else {
                apply_update(db, old, &binding).await?;
                updated = true;
            }
        } else if old.cookie == binding.cookie {
            apply_update(db, old, &binding).await?;
            updated = true;
        }
    }

    if !updated {
        entity::ActiveModel {
            bot_id: Set(binding.bot_id),
            user_id: Set(binding.user_id),
            sr_uid: Set(binding.sr_uid),
            mys_id: Set(binding.mys_id),
            device_id: Set(binding.device_id),
            device_fp: Set(binding.device_fp),
            cookie: Set(binding.cookie),
            stoken: Set(binding.stoken),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

async fn apply_update(
    db: &DatabaseConnection,
    old: entity::Model,
    binding: &UserBinding,
) -> Result<(), DbErr> {
    let mut active: entity::ActiveModel = old.into();
    active.mys_id = Set(binding.mys_id.clone());
    active.device_id = Set(binding.device_id.clone());
    active.device_fp = Set(binding.device_fp.clone());
    active.cookie = Set(binding.cookie.clone());
    active.stoken = Set(binding.stoken.clone());
    active.update(db).await?;
    Ok(())
}

pub async fn delete_binding(
    db: &DatabaseConnection,
    bot_id: &str,
    user_id: &str,
    sr_uid: &str,
) -> Result<(), DbErr> {
    let bindings = get_bindings(db, bot_id, user_id).await?;
    for binding in bindings {
        if binding.sr_uid == sr_uid {
            binding.delete(db).await?;
        }
    }
    Ok(())
}

// ================= Cookie 解析 =================

#[derive(Debug, Default, PartialEq)]
pub struct ParsedCookie {
    pub mys_id: Option<String>,
    pub cookie_token: Option<String>,
    pub login_ticket: Option<String>,
    pub stoken: Option<String>,
}

static MYS_ID_RE: OnceLock<Regex> = OnceLock::new();
static COOKIE_TOKEN_RE: OnceLock<Regex> = OnceLock::new();
static LOGIN_TICKET_RE: OnceLock<Regex> = OnceLock::new();
static STOKEN_RE: OnceLock<Regex> = OnceLock::new();
static UID_RE: OnceLock<Regex> = OnceLock::new();

pub fn parse_cookie(raw: &str) -> ParsedCookie {
    let mys_id_re = MYS_ID_RE.get_or_init(|| {
        Regex::new(r"(?:(?:login_uid|account_mid|account_id|stmid|ltmid|stuid|ltuid)(?:_v2)?)=(\d+)")
            .unwrap()
    });
    let cookie_token_re = COOKIE_TOKEN_RE
        .get_or_init(|| Regex::new(r"(?:cookie_token|cookie_token_v2)=([0-9a-zA-Z]+)").unwrap());
    let login_ticket_re = LOGIN_TICKET_RE
        .get_or_init(|| Regex::new(r"(?:login_ticket|login_ticket_v2)=([0-9a-zA-Z]+)").unwrap());
    let stoken_re =
        STOKEN_RE.get_or_init(|| Regex::new(r"(?:stoken|stoken_v2)=([0-9a-zA-Z]+)").unwrap());

    let capture = |re: &Regex| {
        re.captures(raw)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    };

    ParsedCookie {
        mys_id: capture(mys_id_re),
        cookie_token: capture(cookie_token_re),
        login_ticket: capture(login_ticket_re),
        stoken: capture(stoken_re),
    }
}

fn valid_uid(text: &str) -> bool {
    UID_RE
        .get_or_init(|| Regex::new(r"^1\d{8}$").unwrap())
        .is_match(text)
}

const BIND_HINT: &str = "未绑定SRUID，请使用`sruid [uid]`绑定或`srqr`扫码绑定";
const COOKIE_TUTORIAL: &str = "请查看教程获取cookie:\ndocs.qq.com/doc/DQ3JLWk1vQVllZ2Z1";

// ================= 初始化 =================

pub fn init(ctx: Context) -> BoxFuture<'static, Result<(), PluginError>> {
    Box::pin(async move {
        let db = &ctx.db;
        let builder = db.get_database_backend();
        let schema = Schema::new(builder);

        let mut stmt = schema.create_table_from_entity(entity::Entity);
        stmt.if_not_exists();

        db.execute(builder.build(&stmt))
            .await
            .map_err(|e| format!("Bind Plugin DB Init Error: {}", e))?;

        Ok(())
    })
}

// ================= 指令处理 =================

pub fn handle(
    ctx: Context,
    writer: LockedWriter,
) -> BoxFuture<'static, Result<Option<Context>, PluginError>> {
    Box::pin(async move {
        let config: BindConfig = get_config(&ctx, "bind").unwrap_or_default();
        if !config.enabled {
            return Ok(Some(ctx));
        }

        let (group_id, user_id) = match ctx.as_message() {
            Some(m) => (m.group_id(), m.user_id()),
            None => return Ok(Some(ctx)),
        };

        if let Some(m) = match_any(&ctx, &["sruid", "星铁uid", "星铁账号绑定", "星铁绑定"]) {
            handle_uid(&ctx, writer, group_id, user_id, m.plain_text()).await?;
            return Ok(None);
        }
        if let Some(m) = match_any(&ctx, &["srck", "srcookie", "星铁ck", "星铁cookie"]) {
            handle_cookie(&ctx, writer, group_id, user_id, m.plain_text(), false).await?;
            return Ok(None);
        }
        if let Some(m) = match_any(&ctx, &["srpck", "srpcookie", "星铁pck", "星铁公共cookie"]) {
            if !is_superuser(&ctx, user_id) {
                reply_text(&ctx, writer, group_id, user_id, "仅超级用户可绑定公共cookie").await?;
            } else {
                handle_cookie(&ctx, writer, group_id, user_id, m.plain_text(), true).await?;
            }
            return Ok(None);
        }
        if let Some(m) = match_any(&ctx, &["srdel", "星铁解绑", "星铁取消绑定", "星铁解除绑定"]) {
            handle_delete(&ctx, writer, group_id, user_id, m.plain_text()).await?;
            return Ok(None);
        }
        if match_any(&ctx, &["srqr", "星铁扫码绑定", "星铁扫码登录", "星铁扫码"]).is_some() {
            handle_qr(&ctx, writer, group_id, user_id, &config).await?;
            return Ok(None);
        }

        Ok(Some(ctx))
    })
}

/// sruid：无参数列出绑定，有参数绑定 UID
async fn handle_uid(
    ctx: &Context,
    writer: LockedWriter,
    group_id: Option<i64>,
    user_id: i64,
    arg: String,
) -> Result<(), PluginError> {
    let bot_id = ctx.bot.login_user.id.clone();
    let user_id_str = user_id.to_string();

    let msg = if arg.is_empty() {
        info!(target: "Plugin/Bind", "开始查询『{}』的SRUID绑定状态", user_id);
        let bindings = get_bindings(&ctx.db, &bot_id, &user_id_str).await?;
        if bindings.is_empty() {
            "未绑定SRUID".to_string()
        } else {
            let uid_list: Vec<String> = bindings.iter().map(|b| b.sr_uid.clone()).collect();
            format!("已绑定SRUID：\n{}", uid_list.join("\n"))
        }
    } else if !valid_uid(&arg) {
        "SRUID格式错误".to_string()
    } else {
        info!(target: "Plugin/Bind", "开始为『{}』绑定SRUID『{}』", user_id, arg);
        save_binding(
            &ctx.db,
            UserBinding {
                bot_id,
                user_id: user_id_str,
                sr_uid: arg.clone(),
                ..Default::default()
            },
        )
        .await?;
        format!("成功绑定SRUID『{arg}』")
    };

    reply_text(ctx, writer, group_id, user_id, msg).await
}

/// srck / srpck：解析 cookie 并走 token 刷新链
async fn handle_cookie(
    ctx: &Context,
    writer: LockedWriter,
    group_id: Option<i64>,
    user_id: i64,
    raw: String,
    public: bool,
) -> Result<(), PluginError> {
    let bot_id = ctx.bot.login_user.id.clone();

    if matches!(raw.as_str(), "" | "cookie" | "[cookie]" | "Cookie" | "[COOKIE]" | "ck" | "CK") {
        reply_text(ctx, writer, group_id, user_id, COOKIE_TUTORIAL).await?;
        return Ok(());
    }

    let parsed = parse_cookie(&raw);
    let Some(mys_id) = parsed.mys_id else {
        let msg = format!(
            "cookie无效，缺少account_id、login_uid或stuid字段\n{COOKIE_TUTORIAL}"
        );
        reply_text(ctx, writer, group_id, user_id, msg).await?;
        return Ok(());
    };

    let api = mys::get();
    let mut stoken = parsed.stoken;
    let mut cookie_token = parsed.cookie_token;

    // login_ticket -> stoken -> cookie_token 链式补全
    if stoken.is_none()
        && let Some(ticket) = &parsed.login_ticket
    {
        stoken = api
            .get_stoken_by_login_ticket(ticket, &mys_id)
            .await
            .unwrap_or(None);
    }
    if cookie_token.is_none()
        && let Some(st) = &stoken
    {
        cookie_token = api
            .get_cookie_token_by_stoken(st, &mys_id)
            .await
            .unwrap_or(None);
    }

    let Some(cookie_token) = cookie_token else {
        let msg = format!(
            "cookie无效，缺少cookie_token或login_ticket字段\n{COOKIE_TUTORIAL}"
        );
        reply_text(ctx, writer, group_id, user_id, msg).await?;
        return Ok(());
    };

    let cookie = format!("account_id={mys_id};cookie_token={cookie_token}");
    let stoken_str = stoken
        .as_ref()
        .map(|st| format!("stuid={mys_id};stoken={st};"));

    if public {
        save_binding(
            &ctx.db,
            UserBinding {
                bot_id,
                user_id: "0".to_string(),
                sr_uid: "0".to_string(),
                mys_id: Some(mys_id),
                device_id: Some(api.device_id.clone()),
                device_fp: Some(api.device_fp.clone()),
                cookie: Some(cookie),
                stoken: stoken_str,
            },
        )
        .await?;
        reply_text(ctx, writer, group_id, user_id, "绑定公共cookie成功").await?;
        return Ok(());
    }

    // 通过游戏记录卡片校验并取出星穹铁道角色
    let msg = match bound_game_roles(&cookie, &mys_id).await {
        Ok(roles) if roles.is_empty() => "该账号尚未绑定星穹铁道，请确认账号无误~".to_string(),
        Ok(roles) => {
            let mut players = String::new();
            for (uid, nickname) in &roles {
                players.push_str(&format!("{nickname}({uid}) "));
                save_binding(
                    &ctx.db,
                    UserBinding {
                        bot_id: bot_id.clone(),
                        user_id: user_id.to_string(),
                        sr_uid: uid.clone(),
                        mys_id: Some(mys_id.clone()),
                        device_id: Some(api.device_id.clone()),
                        device_fp: Some(api.device_fp.clone()),
                        cookie: Some(cookie.clone()),
                        stoken: stoken_str.clone(),
                    },
                )
                .await?;
            }
            let with_stoken = if stoken_str.is_some() { "和stoken" } else { "" };
            format!(
                "玩家{}绑定cookie{}成功，建议将cookie撤回哦",
                players.trim(),
                with_stoken
            )
        }
        Err(e) => {
            warn!(target: "Plugin/Bind", "cookie 校验失败: {}", e);
            format!("Cookie无效，请确认是否已过期\n{COOKIE_TUTORIAL}")
        }
    };
    reply_text(ctx, writer, group_id, user_id, msg).await
}

/// 查询游戏记录卡片中的星穹铁道角色 (game_id = 6)
async fn bound_game_roles(
    cookie: &str,
    mys_id: &str,
) -> Result<Vec<(String, String)>, PluginError> {
    let resp = mys::get()
        .call(Api::GameRecord { mys_id }, cookie, "0")
        .await?;
    if !resp.is_ok() {
        return Err(format!("game_record retcode={}", resp.retcode).into());
    }
    let card: mys::models::GameRecordCard = resp.data_as()?;
    Ok(card
        .list
        .into_iter()
        .filter(|g| g.game_id == 6)
        .map(|g| (g.game_role_id, g.nickname))
        .collect())
}

/// srdel：无参数全部解绑，有参数解绑指定 UID
async fn handle_delete(
    ctx: &Context,
    writer: LockedWriter,
    group_id: Option<i64>,
    user_id: i64,
    arg: String,
) -> Result<(), PluginError> {
    let bot_id = ctx.bot.login_user.id.clone();
    let user_id_str = user_id.to_string();

    let msg = if arg.is_empty() {
        info!(target: "Plugin/Bind", "开始解绑『{}』的所有SRUID", user_id);
        let bindings = get_bindings(&ctx.db, &bot_id, &user_id_str).await?;
        if bindings.is_empty() {
            "未绑定SRUID".to_string()
        } else {
            let uid_list: Vec<String> = bindings.iter().map(|b| b.sr_uid.clone()).collect();
            for uid in &uid_list {
                delete_binding(&ctx.db, &bot_id, &user_id_str, uid).await?;
            }
            format!("已解绑SRUID：\n{}", uid_list.join("\n"))
        }
    } else if !valid_uid(&arg) {
        "SRUID格式错误".to_string()
    } else {
        let bindings = get_bindings(&ctx.db, &bot_id, &user_id_str).await?;
        if bindings.iter().any(|b| b.sr_uid == arg) {
            delete_binding(&ctx.db, &bot_id, &user_id_str, &arg).await?;
            format!("已解绑SRUID『{arg}』")
        } else {
            format!("未绑定SRUID『{arg}』")
        }
    };

    reply_text(ctx, writer, group_id, user_id, msg).await
}

// ================= 扫码绑定 =================

// 崩坏：星穹铁道在 SDK 中的 app_id
const QR_APP_ID: u32 = 8;

// 扫码中的用户集合 (bot_id, user_id)，登录结束后移除
static PENDING_QR: OnceLock<Mutex<HashSet<(String, String)>>> = OnceLock::new();

fn pending_qr() -> &'static Mutex<HashSet<(String, String)>> {
    PENDING_QR.get_or_init(|| Mutex::new(HashSet::new()))
}

async fn handle_qr(
    ctx: &Context,
    writer: LockedWriter,
    group_id: Option<i64>,
    user_id: i64,
    config: &BindConfig,
) -> Result<(), PluginError> {
    let bot_id = ctx.bot.login_user.id.clone();
    let key = (bot_id.clone(), user_id.to_string());

    let already_pending = {
        let mut pending = pending_qr().lock().unwrap();
        if pending.contains(&key) {
            true
        } else {
            pending.insert(key.clone());
            false
        }
    };
    if already_pending {
        reply_text(ctx, writer, group_id, user_id, "已有待扫描的二维码，请先完成扫码").await?;
        return Ok(());
    }

    let api = mys::get();
    let login = match api.create_login_qr(QR_APP_ID).await {
        Ok(login) => login,
        Err(e) => {
            pending_qr().lock().unwrap().remove(&key);
            error!(target: "Plugin/Bind", "创建二维码失败: {}", e);
            reply_text(ctx, writer, group_id, user_id, "获取二维码失败，请稍后重试").await?;
            return Ok(());
        }
    };

    match qr_image(&login.url) {
        Ok(image) => {
            reply_text(
                ctx,
                writer.clone(),
                group_id,
                user_id,
                "请使用米游社App扫码并确认登录（二维码三分钟内有效）",
            )
            .await?;
            reply_image(ctx, writer.clone(), group_id, user_id, image).await?;
        }
        Err(e) => {
            pending_qr().lock().unwrap().remove(&key);
            error!(target: "Plugin/Bind", "二维码绘制失败: {}", e);
            reply_text(ctx, writer, group_id, user_id, "二维码绘制失败，请稍后重试").await?;
            return Ok(());
        }
    }

    // 后台固定间隔轮询扫码状态，结束后从内存集合移除
    let ctx = ctx.clone();
    let interval = Duration::from_secs(config.qr_poll_interval.max(1));
    let max_attempts = config.qr_max_attempts.max(1);
    tokio::spawn(async move {
        let result = poll_qr_login(&ctx, writer, group_id, user_id, login, interval, max_attempts)
            .await;
        if let Err(e) = result {
            error!(target: "Plugin/Bind", "扫码绑定任务出错: {}", e);
        }
        pending_qr().lock().unwrap().remove(&key);
    });

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn poll_qr_login(
    ctx: &Context,
    writer: LockedWriter,
    group_id: Option<i64>,
    user_id: i64,
    login: mys::models::QrLogin,
    interval: Duration,
    max_attempts: u32,
) -> Result<(), PluginError> {
    let api = mys::get();

    for _ in 0..max_attempts {
        tokio::time::sleep(interval).await;

        match api.check_login_qr(&login).await {
            Ok(QrStatus::Init) | Ok(QrStatus::Scanned) => continue,
            Ok(QrStatus::Expired) => {
                reply_text(ctx, writer, group_id, user_id, "二维码已过期，请重新使用`srqr`获取").await?;
                return Ok(());
            }
            Ok(QrStatus::Confirmed { uid, game_token }) => {
                return finish_qr_login(ctx, writer, group_id, user_id, uid, &game_token).await;
            }
            Err(e) => {
                warn!(target: "Plugin/Bind", "查询二维码状态失败: {}", e);
                continue;
            }
        }
    }

    reply_text(ctx, writer, group_id, user_id, "扫码超时，请重新使用`srqr`获取二维码").await?;
    Ok(())
}

/// 扫码确认后：game_token -> stoken + cookie_token，校验后入库
async fn finish_qr_login(
    ctx: &Context,
    writer: LockedWriter,
    group_id: Option<i64>,
    user_id: i64,
    account_id: i64,
    game_token: &str,
) -> Result<(), PluginError> {
    let api = mys::get();
    let mys_id = account_id.to_string();

    let stoken = api
        .get_stoken_by_game_token(account_id, game_token)
        .await
        .unwrap_or(None);
    let cookie_token = api
        .get_cookie_token_by_game_token(account_id, game_token)
        .await
        .unwrap_or(None);

    let Some(cookie_token) = cookie_token else {
        reply_text(ctx, writer, group_id, user_id, "登录失败，请重新使用`srqr`绑定").await?;
        return Ok(());
    };

    let cookie = format!("account_id={mys_id};cookie_token={cookie_token}");
    let stoken_str = stoken.map(|st| format!("stuid={mys_id};stoken={st};"));

    let msg = match bound_game_roles(&cookie, &mys_id).await {
        Ok(roles) if roles.is_empty() => "该账号尚未绑定星穹铁道，请确认账号无误~".to_string(),
        Ok(roles) => {
            let mut players = String::new();
            for (uid, nickname) in &roles {
                players.push_str(&format!("{nickname}({uid}) "));
                save_binding(
                    &ctx.db,
                    UserBinding {
                        bot_id: ctx.bot.login_user.id.clone(),
                        user_id: user_id.to_string(),
                        sr_uid: uid.clone(),
                        mys_id: Some(mys_id.clone()),
                        device_id: Some(api.device_id.clone()),
                        device_fp: Some(api.device_fp.clone()),
                        cookie: Some(cookie.clone()),
                        stoken: stoken_str.clone(),
                    },
                )
                .await?;
            }
            info!(target: "Plugin/Bind", "扫码绑定成功: {}", players.trim());
            format!("玩家{}扫码绑定成功", players.trim())
        }
        Err(e) => {
            warn!(target: "Plugin/Bind", "扫码登录校验失败: {}", e);
            "登录失败，请重新使用`srqr`绑定".to_string()
        }
    };

    reply_text(ctx, writer, group_id, user_id, msg).await
}

/// 将登录链接绘制为二维码图片
fn qr_image(url: &str) -> Result<String, PluginError> {
    let code = qrcode::QrCode::new(url.as_bytes()).map_err(|e| format!("QR Encode: {e}"))?;
    let luma = code
        .render::<image::Luma<u8>>()
        .min_dimensions(360, 360)
        .build();
    let rgba = image::DynamicImage::ImageLuma8(luma).to_rgba8();
    Ok(render::to_base64_png(rgba)?)
}

pub fn bind_hint() -> &'static str {
    BIND_HINT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_cookie() {
        let raw = "login_uid=123456; cookie_token=abcDEF123; login_ticket=tick987; stoken=sTok42";
        let parsed = parse_cookie(raw);
        assert_eq!(parsed.mys_id.as_deref(), Some("123456"));
        assert_eq!(parsed.cookie_token.as_deref(), Some("abcDEF123"));
        assert_eq!(parsed.login_ticket.as_deref(), Some("tick987"));
        assert_eq!(parsed.stoken.as_deref(), Some("sTok42"));
    }

    #[test]
    fn parse_v2_cookie_fields() {
        let raw = "account_id_v2=654321;cookie_token_v2=zzz999;stoken_v2=abc";
        let parsed = parse_cookie(raw);
        assert_eq!(parsed.mys_id.as_deref(), Some("654321"));
        assert_eq!(parsed.cookie_token.as_deref(), Some("zzz999"));
        assert_eq!(parsed.stoken.as_deref(), Some("abc"));
        assert_eq!(parsed.login_ticket, None);
    }

    #[test]
    fn parse_cookie_without_ids() {
        let parsed = parse_cookie("foo=bar; baz=1");
        assert_eq!(parsed, ParsedCookie::default());
    }

    #[test]
    fn uid_format() {
        assert!(valid_uid("100000001"));
        assert!(!valid_uid("200000001"));
        assert!(!valid_uid("10000001"));
        assert!(!valid_uid("1000000012"));
        assert!(!valid_uid("1abc00001"));
        assert!(!valid_uid(""));
    }
}
