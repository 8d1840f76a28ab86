use crate::adapters::onebot::LockedWriter;
use crate::command::{get_prefixes, match_any};
use crate::config::build_config;
use crate::event::Context;
use crate::plugins::{PluginError, bind, get_config, is_superuser, reply_image, reply_text};
use crate::render::{
    self, CARD_BLACK, CARD_GRAY, CARD_GRAY_LIGHT, CARD_WHITE, draw_frame, draw_line,
    draw_rect_outline, font,
};
use crate::{error, info, warn};
use futures_util::future::BoxFuture;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Schema, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};
use std::time::Duration;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use toml::Value;

pub mod entity {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "user_panels")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub bot_id: String,
        pub user_id: String,
        pub sr_uid: String,
        /// 角色 ID，"0" 表示玩家信息
        pub cid: String,
        /// PlayerInfo / CharacterInfo 的 JSON 序列化
        #[sea_orm(column_type = "Text")]
        pub info: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

// ================= 面板数据模型 (mihomo 解析格式) =================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlayerAvatar {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ElementInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SkillInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: i64,
    #[serde(default)]
    pub max_level: i64,
    #[serde(default)]
    pub type_text: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PropertyInfo {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub percent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AttributeInfo {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub percent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SubAffixInfo {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub percent: bool,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub step: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelicInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub set_id: String,
    #[serde(default)]
    pub set_name: String,
    #[serde(default)]
    pub rarity: i64,
    #[serde(default)]
    pub level: i64,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub main_affix: Option<PropertyInfo>,
    #[serde(default)]
    pub sub_affix: Vec<SubAffixInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelicSetInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub num: i64,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub desc: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LightConeInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rarity: i64,
    #[serde(default)]
    pub rank: i64,
    #[serde(default)]
    pub level: i64,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub attributes: Vec<AttributeInfo>,
    #[serde(default)]
    pub properties: Vec<PropertyInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlayerInfo {
    pub uid: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub level: i64,
    #[serde(default)]
    pub world_level: i64,
    #[serde(default)]
    pub friend_count: i64,
    #[serde(default)]
    pub avatar: Option<PlayerAvatar>,
    #[serde(default)]
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CharacterInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rarity: i64,
    #[serde(default)]
    pub rank: i64,
    #[serde(default)]
    pub level: i64,
    #[serde(default)]
    pub promotion: i64,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub preview: String,
    #[serde(default)]
    pub portrait: String,
    #[serde(default)]
    pub path: Option<PathInfo>,
    #[serde(default)]
    pub element: Option<ElementInfo>,
    #[serde(default)]
    pub skills: Vec<SkillInfo>,
    #[serde(default)]
    pub light_cone: Option<LightConeInfo>,
    #[serde(default)]
    pub relics: Vec<RelicInfo>,
    #[serde(default)]
    pub relic_sets: Vec<RelicSetInfo>,
    #[serde(default)]
    pub attributes: Vec<AttributeInfo>,
    #[serde(default)]
    pub additions: Vec<AttributeInfo>,
    /// 面板更新时间
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FormattedApiInfo {
    player: PlayerInfo,
    #[serde(default)]
    characters: Vec<CharacterInfo>,
}

// ================= 遗器评分标准 =================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreItem {
    #[serde(default)]
    pub weight: HashMap<String, f64>,
    #[serde(default)]
    pub main: HashMap<String, HashMap<String, f64>>,
    #[serde(default = "default_score_max")]
    pub max: f64,
}

fn default_score_max() -> f64 {
    1.0
}

pub type ScoreMap = HashMap<String, ScoreItem>;

static SCORE: OnceLock<RwLock<ScoreMap>> = OnceLock::new();

fn score_map() -> &'static RwLock<ScoreMap> {
    SCORE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// 下载遗器评分标准，失败时回退到本地缓存
async fn update_score_file(score_url: &str, github_proxy: Option<&str>) -> Option<ScoreMap> {
    let local = crate::plugins::get_data_dir("panel")
        .await
        .ok()
        .map(|dir| dir.join("score.json"));

    let url = match github_proxy {
        Some(proxy) if score_url.starts_with("https://raw.githubusercontent.com") => {
            format!("{}/{}", proxy.trim_end_matches('/'), score_url)
        }
        _ => score_url.to_string(),
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .ok()?;

    let downloaded: Option<Vec<u8>> = match client
        .get(&url)
        .header("User-Agent", "Mar-7th/March7th")
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => resp.bytes().await.ok().map(|b| b.to_vec()),
        _ => None,
    };

    let data = match downloaded {
        Some(data) => {
            if let Some(path) = &local {
                let _ = tokio::fs::write(path, &data).await;
            }
            data
        }
        None => {
            warn!(target: "Plugin/Panel", "评分标准下载失败，尝试本地缓存");
            let path = local?;
            tokio::fs::read(&path).await.ok()?
        }
    };

    serde_json::from_slice(&data).ok()
}

/// 计算单件遗器评分 (满分 10)
pub fn relic_score(cid: &str, relic: &RelicInfo, score: &ScoreMap) -> Option<f64> {
    let item = score.get(cid)?;
    let main_affix = relic.main_affix.as_ref()?;
    let relic_type = relic.id.chars().last()?.to_string();

    let mut sub_score = 0.0;
    for affix in &relic.sub_affix {
        if let Some(weight) = item.weight.get(&affix.type_) {
            sub_score += weight * (affix.count as f64 + 0.1 * affix.step as f64);
        }
    }

    let main_weight = item
        .main
        .get(&relic_type)
        .and_then(|m| m.get(&main_affix.type_))
        .copied()?;

    let total = sub_score / item.max * 0.5 + main_weight * ((relic.level as f64 + 1.0) / 16.0) * 0.5;
    Some(total * 10.0)
}

// ================= 数据访问 =================

async fn get_panel(
    db: &DatabaseConnection,
    bot_id: &str,
    user_id: &str,
    sr_uid: &str,
    cid: &str,
) -> Result<Option<entity::Model>, DbErr> {
    entity::Entity::find()
        .filter(entity::Column::BotId.eq(bot_id))
        .filter(entity::Column::UserId.eq(user_id))
        .filter(entity::Column::SrUid.eq(sr_uid))
        .filter(entity::Column::Cid.eq(cid))
        .one(db)
        .await
}

async fn set_panel(
    db: &DatabaseConnection,
    bot_id: &str,
    user_id: &str,
    sr_uid: &str,
    cid: &str,
    info: String,
) -> Result<(), DbErr> {
    match get_panel(db, bot_id, user_id, sr_uid, cid).await? {
        Some(existing) => {
            let mut active: entity::ActiveModel = existing.into();
            active.info = Set(info);
            active.update(db).await?;
        }
        None => {
            entity::ActiveModel {
                bot_id: Set(bot_id.to_string()),
                user_id: Set(user_id.to_string()),
                sr_uid: Set(sr_uid.to_string()),
                cid: Set(cid.to_string()),
                info: Set(info),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }
    Ok(())
}

/// 开拓者各命途 ID (80xx) 归一存储
pub fn normalize_cid(cid: &str) -> String {
    if cid.starts_with("80") {
        "8000".to_string()
    } else {
        cid.to_string()
    }
}

// ================= 配置与初始化 =================

#[derive(Serialize, Deserialize)]
struct PanelConfig {
    enabled: bool,
}

pub fn default_config() -> Value {
    build_config(PanelConfig { enabled: true })
}

pub fn init(ctx: Context) -> BoxFuture<'static, Result<(), PluginError>> {
    Box::pin(async move {
        let db = &ctx.db;
        let builder = db.get_database_backend();
        let schema = Schema::new(builder);

        let mut stmt = schema.create_table_from_entity(entity::Entity);
        stmt.if_not_exists();

        db.execute(builder.build(&stmt))
            .await
            .map_err(|e| format!("Panel Plugin DB Init Error: {}", e))?;

        // 加载遗器评分标准
        let (score_url, github_proxy) = {
            let guard = ctx.config.read().unwrap();
            (guard.mys.score_url.clone(), guard.mys.github_proxy.clone())
        };
        match update_score_file(&score_url, github_proxy.as_deref()).await {
            Some(score) => {
                *score_map().write().unwrap() = score;
                info!(target: "Plugin/Panel", "遗器评分标准加载完成");
            }
            None => {
                error!(target: "Plugin/Panel", "遗器评分标准加载失败，请检查网络连接和配置");
            }
        }

        Ok(())
    })
}

// ================= 指令处理 =================

static PANEL_RE: OnceLock<Regex> = OnceLock::new();

fn panel_regex() -> &'static Regex {
    PANEL_RE.get_or_init(|| Regex::new(r"^(\w{1,10})面板$").unwrap())
}

pub fn handle(
    ctx: Context,
    writer: LockedWriter,
) -> BoxFuture<'static, Result<Option<Context>, PluginError>> {
    Box::pin(async move {
        let config: PanelConfig =
            get_config(&ctx, "panel").unwrap_or(PanelConfig { enabled: true });
        if !config.enabled {
            return Ok(Some(ctx));
        }

        let (group_id, user_id, text) = match ctx.as_message() {
            Some(m) => (m.group_id(), m.user_id(), m.text().trim().to_string()),
            None => return Ok(Some(ctx)),
        };

        if match_any(
            &ctx,
            &["srpu", "更新角色面板", "更新星铁面板", "更新星铁角色面板", "星铁更新面板"],
        )
        .is_some()
        {
            handle_update(&ctx, writer, group_id, user_id).await?;
            return Ok(None);
        }

        if match_any(&ctx, &["srsupdate", "更新星铁评分标准"]).is_some() {
            if !is_superuser(&ctx, user_id) {
                reply_text(&ctx, writer, group_id, user_id, "仅超级用户可更新评分标准").await?;
            } else {
                handle_score_update(&ctx, writer, group_id, user_id).await?;
            }
            return Ok(None);
        }

        // xxxx面板
        if let Some(name) = match_panel_query(&ctx, &text) {
            if handle_query(&ctx, writer, group_id, user_id, &name).await? {
                return Ok(None);
            }
        }

        Ok(Some(ctx))
    })
}

/// 匹配「xxxx面板」，返回角色名
fn match_panel_query(ctx: &Context, text: &str) -> Option<String> {
    let prefixes = get_prefixes(ctx);
    let mut content = text;
    for prefix in &prefixes {
        if !prefix.is_empty() && text.starts_with(prefix.as_str()) {
            content = &text[prefix.len()..];
            break;
        }
    }
    panel_regex()
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

async fn handle_update(
    ctx: &Context,
    writer: LockedWriter,
    group_id: Option<i64>,
    user_id: i64,
) -> Result<(), PluginError> {
    let bot_id = ctx.bot.login_user.id.clone();
    let user_id_str = user_id.to_string();

    let bindings = bind::get_bindings(&ctx.db, &bot_id, &user_id_str).await?;
    let Some(first) = bindings.first() else {
        reply_text(ctx, writer, group_id, user_id, bind::bind_hint()).await?;
        return Ok(());
    };
    let sr_uid = first.sr_uid.clone();

    info!(target: "Plugin/Panel", "正在更新SRUID『{}』角色面板", sr_uid);
    reply_text(
        ctx,
        writer.clone(),
        group_id,
        user_id,
        format!("正在更新SRUID『{sr_uid}』角色面板"),
    )
    .await?;

    let panel_url = ctx.config.read().unwrap().mys.panel_url.clone();
    let msg = match update_panel(&ctx.db, &panel_url, &bot_id, &user_id_str, &sr_uid).await {
        Ok(names) => format!("成功更新以下角色面板\n{names}"),
        Err(e) => {
            warn!(target: "Plugin/Panel", "面板更新失败: {}", e);
            "角色面板更新失败，请稍后重试".to_string()
        }
    };
    reply_text(ctx, writer, group_id, user_id, msg).await
}

async fn handle_score_update(
    ctx: &Context,
    writer: LockedWriter,
    group_id: Option<i64>,
    user_id: i64,
) -> Result<(), PluginError> {
    reply_text(ctx, writer.clone(), group_id, user_id, "开始更新遗器评分标准").await?;
    let (score_url, github_proxy) = {
        let guard = ctx.config.read().unwrap();
        (guard.mys.score_url.clone(), guard.mys.github_proxy.clone())
    };
    let msg = match update_score_file(&score_url, github_proxy.as_deref()).await {
        Some(score) => {
            *score_map().write().unwrap() = score;
            "遗器评分标准更新完成"
        }
        None => "遗器评分标准更新失败，请检查网络连接和配置",
    };
    reply_text(ctx, writer, group_id, user_id, msg).await
}

/// 拉取解析面板并入库，返回更新的角色名列表
async fn update_panel(
    db: &DatabaseConnection,
    panel_url: &str,
    bot_id: &str,
    user_id: &str,
    sr_uid: &str,
) -> Result<String, PluginError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let resp = client
        .get(format!("{panel_url}{sr_uid}"))
        .header("User-Agent", "Mar-7th/March7th")
        .send()
        .await?;
    let parsed: FormattedApiInfo = serde_json::from_slice(&resp.bytes().await?)?;

    let player = parsed.player;
    set_panel(
        db,
        bot_id,
        user_id,
        sr_uid,
        "0",
        serde_json::to_string(&player)?,
    )
    .await?;

    let time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let mut names: Vec<String> = Vec::new();
    for mut character in parsed.characters {
        character.time = Some(time.clone());
        let name = character.name.replace("{NICKNAME}", &player.nickname);
        if !names.contains(&name) {
            names.push(name);
        }
        let cid = normalize_cid(&character.id);
        set_panel(
            db,
            bot_id,
            user_id,
            sr_uid,
            &cid,
            serde_json::to_string(&character)?,
        )
        .await?;
    }
    if names.is_empty() {
        return Err("面板中没有可展示的角色".into());
    }
    Ok(names.join(" "))
}

/// 处理「xxxx面板」查询。返回 false 表示名称未命中，放行事件。
async fn handle_query(
    ctx: &Context,
    writer: LockedWriter,
    group_id: Option<i64>,
    user_id: i64,
    name: &str,
) -> Result<bool, PluginError> {
    let res = crate::res::get();
    let Some(cid) = res.nickname_to_id(name) else {
        return Ok(false);
    };
    // 仅角色 (4 位 ID)
    if cid.len() != 4 {
        return Ok(false);
    }
    let cid = normalize_cid(&cid);

    let bot_id = ctx.bot.login_user.id.clone();
    let user_id_str = user_id.to_string();

    let bindings = bind::get_bindings(&ctx.db, &bot_id, &user_id_str).await?;
    let Some(first) = bindings.first() else {
        reply_text(ctx, writer, group_id, user_id, bind::bind_hint()).await?;
        return Ok(true);
    };
    let sr_uid = first.sr_uid.clone();

    let character: Option<CharacterInfo> = get_panel(&ctx.db, &bot_id, &user_id_str, &sr_uid, &cid)
        .await?
        .and_then(|p| serde_json::from_str(&p.info).ok());

    let Some(character) = character else {
        let display_name = if cid == "8000" {
            "开拓者".to_string()
        } else {
            res.character(&cid).map(|c| c.name).unwrap_or_else(|| name.to_string())
        };
        reply_text(
            ctx,
            writer,
            group_id,
            user_id,
            format!("未找到『{display_name}』的面板，请使用`srpu`更新面板"),
        )
        .await?;
        return Ok(true);
    };

    let player: Option<PlayerInfo> = get_panel(&ctx.db, &bot_id, &user_id_str, &sr_uid, "0")
        .await?
        .and_then(|p| serde_json::from_str(&p.info).ok());

    let Some(player) = player else {
        reply_text(ctx, writer, group_id, user_id, "绘图出错，请使用`srpu`更新面板").await?;
        return Ok(true);
    };

    let font_family = ctx.config.read().unwrap().mys.font_family.clone();
    let score = score_map().read().unwrap().clone();
    match render_panel_card(&font_family, &player, &character, &score).await {
        Ok(image) => {
            reply_image(ctx, writer, group_id, user_id, image).await?;
        }
        Err(e) => {
            warn!(target: "Plugin/Panel", "绘图出错：{}", e);
            reply_text(ctx, writer, group_id, user_id, "绘图出错，请使用`srpu`更新面板").await?;
        }
    }
    Ok(true)
}

// ================= 绘图 =================

fn roman_rank(rank: i64) -> &'static str {
    match rank {
        5 => "V",
        4 => "IV",
        3 => "III",
        2 => "II",
        1 => "I",
        _ => "",
    }
}

async fn render_panel_card(
    font_family: &str,
    player: &PlayerInfo,
    character: &CharacterInfo,
    score: &ScoreMap,
) -> Result<String, String> {
    let res = crate::res::get();
    let width = 1280u32;
    let height = 1250u32;

    let name = character.name.replace("{NICKNAME}", &player.nickname);
    let cid = normalize_cid(&character.id);

    // 预取素材
    let preview = match res.character_preview(&character.id).await {
        Some(path) => image::open(&path)
            .ok()
            .map(|img| {
                img.resize_exact(300, 410, image::imageops::FilterType::Lanczos3)
                    .to_rgba8()
            }),
        None => None,
    };
    let element_icon = match &character.element {
        Some(element) if !element.icon.is_empty() => match res.cache(&element.icon).await {
            Some(path) => render::load_icon(&path, 48),
            None => None,
        },
        _ => None,
    };
    let path_icon = match &character.path {
        Some(path) if !path.icon.is_empty() => match res.cache(&path.icon).await {
            Some(p) => render::load_icon(&p, 48),
            None => None,
        },
        _ => None,
    };
    let light_cone_icon = match &character.light_cone {
        Some(lc) if !lc.icon.is_empty() => match res.cache(&lc.icon).await {
            Some(p) => render::load_icon(&p, 80),
            None => None,
        },
        _ => None,
    };

    // 遗器评分
    let relic_scores: Vec<Option<f64>> = character
        .relics
        .iter()
        .map(|r| relic_score(&cid, r, score))
        .collect();
    let score_all: f64 = relic_scores.iter().flatten().sum::<f64>() / 6.0;

    let mut image = render::draw_card(width, height, CARD_BLACK, |root| {
        let white = |size| {
            font(font_family, size, &CARD_WHITE).pos(Pos::new(HPos::Left, VPos::Top))
        };
        let gray = |size| {
            font(font_family, size, &CARD_GRAY_LIGHT).pos(Pos::new(HPos::Left, VPos::Top))
        };

        // 标题行
        root.draw_text("角色面板", &white(64), (60, 50))
            .map_err(|e| e.to_string())?;
        root.draw_text(&format!("UID:{}", player.uid), &white(36), (400, 70))
            .map_err(|e| e.to_string())?;
        if let Some(path) = &character.path {
            root.draw_text(&path.name, &white(36), (760, 70))
                .map_err(|e| e.to_string())?;
        }
        if let Some(element) = &character.element {
            root.draw_text(&element.name, &white(36), (960, 70))
                .map_err(|e| e.to_string())?;
        }
        root.draw_text(&format!("Lv.{}", character.level), &white(48), (1120, 60))
            .map_err(|e| e.to_string())?;

        // 立绘框
        draw_rect_outline(root, (60, 140), (380, 570), CARD_GRAY, 3)?;
        root.draw_text(&name, &white(40), (70, 580)).map_err(|e| e.to_string())?;
        root.draw_text(
            &format!("星魂 {}  ·  {}星", character.rank, character.rarity),
            &gray(24),
            (70, 635),
        )
        .map_err(|e| e.to_string())?;

        // 属性列表 (基础 + 加成)
        let mut additions: HashMap<&str, &AttributeInfo> = HashMap::new();
        for addition in &character.additions {
            additions.insert(addition.field.as_str(), addition);
        }
        let mut y = 150;
        for attribute in character.attributes.iter().take(10) {
            root.draw_text(&attribute.name, &gray(26), (420, y))
                .map_err(|e| e.to_string())?;
            let display = match additions.get(attribute.field.as_str()) {
                Some(addition) => format!("{} +{}", attribute.display, addition.display),
                None => attribute.display.clone(),
            };
            root.draw_text(&display, &white(26), (620, y))
                .map_err(|e| e.to_string())?;
            y += 42;
        }

        // 行迹
        y += 10;
        root.draw_text("行迹", &gray(26), (420, y)).map_err(|e| e.to_string())?;
        y += 40;
        for skill in character.skills.iter().take(4) {
            root.draw_text(
                &format!("{} Lv.{}", skill.name, skill.level),
                &white(24),
                (420, y),
            )
            .map_err(|e| e.to_string())?;
            y += 36;
        }

        // 光锥
        draw_line(root, (60, 680), (1220, 680), CARD_GRAY, 2)?;
        match &character.light_cone {
            Some(lc) => {
                root.draw_text(&lc.name, &white(32), (160, 700))
                    .map_err(|e| e.to_string())?;
                root.draw_text(
                    &format!("{} Lv.{}  {}星", roman_rank(lc.rank), lc.level, lc.rarity),
                    &gray(24),
                    (160, 745),
                )
                .map_err(|e| e.to_string())?;
            }
            None => {
                root.draw_text("未装备光锥", &gray(28), (80, 710))
                    .map_err(|e| e.to_string())?;
            }
        }
        // 遗器套装
        let mut set_y = 700;
        for set in character.relic_sets.iter().take(3) {
            root.draw_text(
                &format!("{} {}", set.name, set.desc),
                &gray(22),
                (620, set_y),
            )
            .map_err(|e| e.to_string())?;
            set_y += 30;
        }
        // 总评分
        let score_display = if score_all > 0.0 {
            format!("遗器评分 {:.1}/10", score_all)
        } else {
            "遗器评分 --".to_string()
        };
        root.draw_text(&score_display, &white(28), (1000, 710))
            .map_err(|e| e.to_string())?;

        // 遗器 (2 列 x 3 行)
        for i in 0..6usize {
            let x = 60 + (i / 3) as i32 * 600;
            let y = 800 + (i % 3) as i32 * 145;
            draw_rect_outline(root, (x, y), (x + 580, y + 130), CARD_GRAY, 2)?;

            let Some(relic) = character.relics.get(i) else {
                root.draw_text("该位置未装备遗器", &gray(26), (x + 30, y + 50))
                    .map_err(|e| e.to_string())?;
                continue;
            };

            root.draw_text(&relic.name, &white(24), (x + 20, y + 15))
                .map_err(|e| e.to_string())?;
            let main_text = match &relic.main_affix {
                Some(main) => format!(
                    "+{}  {}  {}",
                    relic.level,
                    main.name.replace("属性伤害提高", "增伤"),
                    main.display
                ),
                None => format!("+{}", relic.level),
            };
            root.draw_text(&main_text, &gray(22), (x + 20, y + 50))
                .map_err(|e| e.to_string())?;

            // 副词条一行排布
            let mut sub_x = x + 20;
            for affix in relic.sub_affix.iter().take(4) {
                let text = if affix.count > 1 {
                    format!("{} {} x{}", affix.name, affix.display, affix.count)
                } else {
                    format!("{} {}", affix.name, affix.display)
                };
                root.draw_text(&text, &gray(18), (sub_x, y + 90))
                    .map_err(|e| e.to_string())?;
                sub_x += 145;
            }

            if let Some(Some(relic_item_score)) = relic_scores.get(i) {
                root.draw_text(
                    &format!("{:.1}", relic_item_score),
                    &white(22),
                    (x + 520, y + 15),
                )
                .map_err(|e| e.to_string())?;
            }
        }

        // 更新时间
        if let Some(time) = &character.time {
            root.draw_text(&format!("更新于 {time}"), &gray(20), (60, height as i32 - 45))
                .map_err(|e| e.to_string())?;
        }

        draw_frame(root, width, height, CARD_GRAY, CARD_WHITE)
    })?;

    if let Some(preview) = &preview {
        render::overlay_image(&mut image, preview, 70, 150);
    }
    if let Some(icon) = &element_icon {
        render::overlay_image(&mut image, icon, 900, 64);
    }
    if let Some(icon) = &path_icon {
        render::overlay_image(&mut image, icon, 700, 64);
    }
    if let Some(icon) = &light_cone_icon {
        render::overlay_image(&mut image, icon, 70, 700);
    }

    render::to_base64_png(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_score() -> ScoreMap {
        let mut weight = HashMap::new();
        weight.insert("CriticalChanceBase".to_string(), 1.0);
        weight.insert("AttackAddedRatio".to_string(), 0.75);
        let mut main = HashMap::new();
        let mut head = HashMap::new();
        head.insert("HPDelta".to_string(), 1.0);
        main.insert("1".to_string(), head);
        let mut map = HashMap::new();
        map.insert(
            "1205".to_string(),
            ScoreItem {
                weight,
                main,
                max: 10.0,
            },
        );
        map
    }

    fn sample_relic() -> RelicInfo {
        RelicInfo {
            id: "61011".to_string(),
            name: "测试遗器".to_string(),
            level: 15,
            main_affix: Some(PropertyInfo {
                type_: "HPDelta".to_string(),
                ..Default::default()
            }),
            sub_affix: vec![
                SubAffixInfo {
                    type_: "CriticalChanceBase".to_string(),
                    count: 4,
                    step: 2,
                    ..Default::default()
                },
                SubAffixInfo {
                    type_: "SpeedDelta".to_string(),
                    count: 2,
                    step: 0,
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn relic_score_formula() {
        let score = sample_score();
        let relic = sample_relic();
        // sub = 1.0 * (4 + 0.2) = 4.2; main 权重 1.0, 等级 15
        // total = 4.2/10*0.5 + 1.0 * (16/16) * 0.5 = 0.21 + 0.5 = 0.71 -> 7.1
        let value = relic_score("1205", &relic, &score).unwrap();
        assert!((value - 7.1).abs() < 1e-9);
    }

    #[test]
    fn relic_score_missing_character() {
        let score = sample_score();
        let relic = sample_relic();
        assert!(relic_score("9999", &relic, &score).is_none());
    }

    #[test]
    fn relic_score_unknown_main_affix() {
        let score = sample_score();
        let mut relic = sample_relic();
        relic.main_affix = Some(PropertyInfo {
            type_: "SpeedDelta".to_string(),
            ..Default::default()
        });
        assert!(relic_score("1205", &relic, &score).is_none());
    }

    #[test]
    fn trailblazer_ids_normalize() {
        assert_eq!(normalize_cid("8004"), "8000");
        assert_eq!(normalize_cid("8001"), "8000");
        assert_eq!(normalize_cid("1205"), "1205");
    }

    #[test]
    fn character_info_roundtrip() {
        let character = CharacterInfo {
            id: "1205".to_string(),
            name: "刃".to_string(),
            level: 80,
            relics: vec![sample_relic()],
            ..Default::default()
        };
        let json = serde_json::to_string(&character).unwrap();
        let parsed: CharacterInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.name, "刃");
        assert_eq!(parsed.relics.len(), 1);
        assert_eq!(parsed.relics[0].sub_affix.len(), 2);
    }
}
