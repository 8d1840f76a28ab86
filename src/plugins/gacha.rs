use crate::adapters::onebot::LockedWriter;
use crate::command::match_any;
use crate::config::build_config;
use crate::event::Context;
use crate::plugins::{PluginError, bind, get_config, reply_image, reply_text};
use crate::render::{
    self, CARD_BLACK, CARD_GRAY, CARD_WHITE, draw_frame, draw_line, draw_rect_outline, font,
};
use crate::{error, info, warn};
use futures_util::future::BoxFuture;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Schema, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use toml::Value;
use url::Url;

pub mod entity {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "user_gacha_logs")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub bot_id: String,
        pub user_id: String,
        pub sr_uid: String,
        /// GachaLog 的 JSON 序列化
        #[sea_orm(column_type = "Text")]
        pub gacha: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

// ================= 数据模型 =================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GachaLogItem {
    pub id: String,
    #[serde(default)]
    pub gacha_id: String,
    pub gacha_type: String,
    #[serde(default)]
    pub item_type: String,
    pub item_id: String,
    pub rank_type: String,
    pub name: String,
    #[serde(default)]
    pub count: String,
    #[serde(default)]
    pub time: String,
}

#[derive(Debug, Deserialize)]
struct GachaLogData {
    #[serde(default)]
    list: Vec<GachaLogItem>,
}

#[derive(Debug, Deserialize)]
struct GachaLogResponse {
    retcode: i64,
    #[serde(default)]
    message: String,
    data: Option<GachaLogData>,
}

/// 四个卡池的记录，按记录 ID 去重
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GachaLog {
    /// 群星跃迁（常驻）
    #[serde(default)]
    pub common: HashMap<String, GachaLogItem>,
    /// 始发跃迁（新手）
    #[serde(default)]
    pub beginner: HashMap<String, GachaLogItem>,
    /// 角色活动跃迁
    #[serde(default)]
    pub character_event: HashMap<String, GachaLogItem>,
    /// 光锥活动跃迁
    #[serde(default)]
    pub light_cone_event: HashMap<String, GachaLogItem>,
}

// 常驻角色与光锥（用于判断歪/UP）
const RESIDENT: &[&str] = &[
    "1003", "1004", "1101", "1104", "1107", "1209", "1211", "23000", "23002", "23003", "23004",
    "23005", "23012", "23013",
];

const GACHA_URL_PREFIX: &str =
    "https://api-takumi.mihoyo.com/common/gacha_record/api/getGachaLog";

const HELP_MESSAGE: &str = "请在命令后跟上抽卡记录链接，获取链接的教程:\n\
docs.qq.com/doc/p/9c830f3e9398aaaf68d1eba225eead983947d2db";

#[derive(Serialize, Deserialize)]
struct GachaConfig {
    enabled: bool,
}

pub fn default_config() -> Value {
    build_config(GachaConfig { enabled: true })
}

// ================= 数据访问 =================

async fn get_record(
    db: &DatabaseConnection,
    bot_id: &str,
    user_id: &str,
    sr_uid: &str,
) -> Result<Option<entity::Model>, DbErr> {
    entity::Entity::find()
        .filter(entity::Column::BotId.eq(bot_id))
        .filter(entity::Column::UserId.eq(user_id))
        .filter(entity::Column::SrUid.eq(sr_uid))
        .one(db)
        .await
}

async fn save_record(
    db: &DatabaseConnection,
    bot_id: &str,
    user_id: &str,
    sr_uid: &str,
    gacha: &GachaLog,
) -> Result<(), PluginError> {
    let json = serde_json::to_string(gacha)?;
    match get_record(db, bot_id, user_id, sr_uid).await? {
        Some(existing) => {
            let mut active: entity::ActiveModel = existing.into();
            active.gacha = Set(json);
            active.update(db).await?;
        }
        None => {
            entity::ActiveModel {
                bot_id: Set(bot_id.to_string()),
                user_id: Set(user_id.to_string()),
                sr_uid: Set(sr_uid.to_string()),
                gacha: Set(json),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }
    Ok(())
}

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
            .map_err(|e| format!("Gacha Plugin DB Init Error: {}", e))?;

        Ok(())
    })
}

// ================= 指令处理 =================

pub fn handle(
    ctx: Context,
    writer: LockedWriter,
) -> BoxFuture<'static, Result<Option<Context>, PluginError>> {
    Box::pin(async move {
        let config: GachaConfig =
            get_config(&ctx, "gacha").unwrap_or(GachaConfig { enabled: true });
        if !config.enabled {
            return Ok(Some(ctx));
        }

        let (group_id, user_id) = match ctx.as_message() {
            Some(m) => (m.group_id(), m.user_id()),
            None => return Ok(Some(ctx)),
        };

        if let Some(m) = match_any(
            &ctx,
            &["srgu", "导入抽卡记录", "更新抽卡记录", "导入星铁抽卡记录", "更新星铁抽卡记录"],
        ) {
            handle_update(&ctx, writer, group_id, user_id, m.plain_text()).await?;
            return Ok(None);
        }
        if match_any(
            &ctx,
            &["srgc", "查看抽卡记录", "查询抽卡记录", "查看星铁抽卡记录", "查询星铁抽卡记录"],
        )
        .is_some()
        {
            handle_view(&ctx, writer, group_id, user_id).await?;
            return Ok(None);
        }

        Ok(Some(ctx))
    })
}

async fn handle_update(
    ctx: &Context,
    writer: LockedWriter,
    group_id: Option<i64>,
    user_id: i64,
    url: String,
) -> Result<(), PluginError> {
    if url.is_empty() || !url.starts_with(GACHA_URL_PREFIX) || !url.contains("authkey=") {
        reply_text(ctx, writer, group_id, user_id, HELP_MESSAGE).await?;
        return Ok(());
    }

    let bot_id = ctx.bot.login_user.id.clone();
    let user_id_str = user_id.to_string();

    let bindings = bind::get_bindings(&ctx.db, &bot_id, &user_id_str).await?;
    let Some(first) = bindings.first() else {
        reply_text(ctx, writer, group_id, user_id, bind::bind_hint()).await?;
        return Ok(());
    };
    let sr_uid = first.sr_uid.clone();

    info!(target: "Plugin/Gacha", "开始更新SRUID『{}』抽卡记录", sr_uid);
    reply_text(
        ctx,
        writer.clone(),
        group_id,
        user_id,
        format!("开始更新SRUID『{sr_uid}』抽卡记录"),
    )
    .await?;

    let msg = match update_gacha(&ctx.db, &bot_id, &user_id_str, &sr_uid, &url).await {
        Ok(msg) => msg,
        Err(e) => {
            error!(target: "Plugin/Gacha", "导入抽卡记录出错：{}", e);
            "抽卡记录更新失败，请检查链接是否正确".to_string()
        }
    };
    reply_text(ctx, writer, group_id, user_id, msg).await
}

async fn handle_view(
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

    let Some(record) = get_record(&ctx.db, &bot_id, &user_id_str, &sr_uid).await? else {
        reply_text(ctx, writer, group_id, user_id, "请先使用 导入抽卡记录 命令导入抽卡记录").await?;
        return Ok(());
    };

    let gacha: GachaLog = match serde_json::from_str(&record.gacha) {
        Ok(g) => g,
        Err(e) => {
            warn!(target: "Plugin/Gacha", "抽卡记录解析失败: {}", e);
            reply_text(ctx, writer, group_id, user_id, "请先使用 导入抽卡记录 命令导入抽卡记录").await?;
            return Ok(());
        }
    };

    let font_family = ctx.config.read().unwrap().mys.font_family.clone();
    match render_gacha_card(&font_family, &sr_uid, &gacha).await {
        Ok(image) => reply_image(ctx, writer, group_id, user_id, image).await,
        Err(e) => {
            warn!(target: "Plugin/Gacha", "绘图出错：{}", e);
            reply_text(ctx, writer, group_id, user_id, "图片绘制失败，请稍后重试").await
        }
    }
}

// ================= 抓取与合并 =================

/// 重写抽卡记录链接的查询参数（保留 authkey 等原始字段）
fn rewrite_gacha_url(raw: &str, gacha_type: &str, end_id: &str) -> Result<String, PluginError> {
    let mut url = Url::parse(raw)?;
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .filter(|(k, _)| {
            !matches!(
                k.as_str(),
                "authkey_ver" | "sign_type" | "lang" | "game_biz" | "size" | "gacha_type" | "end_id"
            )
        })
        .collect();
    params.push(("authkey_ver".to_string(), "1".to_string()));
    params.push(("sign_type".to_string(), "2".to_string()));
    params.push(("lang".to_string(), "zh-cn".to_string()));
    params.push(("game_biz".to_string(), "hkrpg_cn".to_string()));
    params.push(("size".to_string(), "20".to_string()));
    params.push(("gacha_type".to_string(), gacha_type.to_string()));
    if !end_id.is_empty() {
        params.push(("end_id".to_string(), end_id.to_string()));
    }

    url.query_pairs_mut().clear().extend_pairs(params);
    Ok(url.to_string())
}

/// 逐页抓取某个卡池的全部记录
async fn fetch_gacha_log(
    client: &reqwest::Client,
    gacha_url: &str,
    gacha_type: &str,
) -> Result<HashMap<String, GachaLogItem>, PluginError> {
    let mut full_log: HashMap<String, GachaLogItem> = HashMap::new();
    let mut end_id = String::new();

    loop {
        let url = rewrite_gacha_url(gacha_url, gacha_type, &end_id)?;
        let resp = client.get(&url).send().await?;
        let data: GachaLogResponse = serde_json::from_slice(&resp.bytes().await?)?;
        if data.retcode != 0 {
            return Err(format!(
                "抽卡记录接口返回错误 retcode={}: {}",
                data.retcode, data.message
            )
            .into());
        }
        let list = data.data.map(|d| d.list).unwrap_or_default();
        if list.is_empty() {
            break;
        }
        end_id = list.last().map(|item| item.id.clone()).unwrap_or_default();
        for item in list {
            full_log.insert(item.id.clone(), item);
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    Ok(full_log)
}

/// 合并两份记录：保留旧记录，补充新记录
fn merge_pool(
    mut fresh: HashMap<String, GachaLogItem>,
    origin: &HashMap<String, GachaLogItem>,
) -> HashMap<String, GachaLogItem> {
    for (k, v) in origin {
        fresh.insert(k.clone(), v.clone());
    }
    fresh
}

async fn update_gacha(
    db: &DatabaseConnection,
    bot_id: &str,
    user_id: &str,
    sr_uid: &str,
    url: &str,
) -> Result<String, PluginError> {
    let origin: GachaLog = match get_record(db, bot_id, user_id, sr_uid).await? {
        Some(record) => serde_json::from_str(&record.gacha).unwrap_or_default(),
        None => GachaLog::default(),
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let mut new_data = GachaLog {
        common: fetch_gacha_log(&client, url, "1").await?,
        beginner: fetch_gacha_log(&client, url, "2").await?,
        character_event: fetch_gacha_log(&client, url, "11").await?,
        light_cone_event: fetch_gacha_log(&client, url, "12").await?,
    };

    new_data.common = merge_pool(new_data.common, &origin.common);
    new_data.beginner = merge_pool(new_data.beginner, &origin.beginner);
    new_data.character_event = merge_pool(new_data.character_event, &origin.character_event);
    new_data.light_cone_event = merge_pool(new_data.light_cone_event, &origin.light_cone_event);

    let common_add = new_data.common.len() - origin.common.len();
    let beginner_add = new_data.beginner.len() - origin.beginner.len();
    let character_add = new_data.character_event.len() - origin.character_event.len();
    let light_cone_add = new_data.light_cone_event.len() - origin.light_cone_event.len();

    let mut msg = if common_add == 0 && beginner_add == 0 && character_add == 0 && light_cone_add == 0
    {
        "没有新的抽卡记录".to_string()
    } else {
        save_record(db, bot_id, user_id, sr_uid, &new_data).await?;
        let mut parts = Vec::new();
        if common_add > 0 {
            parts.push(format!(" {common_add} 条常驻池记录"));
        }
        if beginner_add > 0 {
            parts.push(format!(" {beginner_add} 条新手池记录"));
        }
        if character_add > 0 {
            parts.push(format!(" {character_add} 条角色池记录"));
        }
        if light_cone_add > 0 {
            parts.push(format!(" {light_cone_add} 条光锥池记录"));
        }
        format!("抽卡记录已更新，增加了{}", parts.join("，"))
    };

    msg.push('\n');
    msg.push_str(&format!(
        "当前共有 {} 条常驻池记录， {} 条新手池记录， {} 条角色池记录， {} 条光锥池记录",
        new_data.common.len(),
        new_data.beginner.len(),
        new_data.character_event.len(),
        new_data.light_cone_event.len()
    ));
    msg.push('\n');
    msg.push_str("可回复『查看抽卡记录』查看");
    Ok(msg)
}

// ================= 统计分析 =================

#[derive(Debug, Clone)]
pub struct AnalyzedItem {
    pub item_id: String,
    pub name: String,
    /// 距上一个五星的垫抽数
    pub cost: i64,
    pub is_up: bool,
}

#[derive(Debug, Default)]
pub struct GachaAnalysis {
    /// 五星记录，新到旧排列
    pub items: Vec<AnalyzedItem>,
    pub avg_5_cost: f64,
    pub avg_5_up_cost: f64,
    /// 距上一个五星已投入的抽数（未出五星）
    pub counter_5: i64,
    pub counter_5_up: i64,
}

pub fn analyze(pool: &HashMap<String, GachaLogItem>) -> GachaAnalysis {
    let mut sorted: Vec<&GachaLogItem> = pool.values().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut counter_5_up: i64 = 0;
    let mut counter_5: i64 = 0;
    let mut counter_5_up_list: Vec<i64> = Vec::new();
    let mut counter_5_list: Vec<i64> = Vec::new();
    let mut items: Vec<AnalyzedItem> = Vec::new();

    for item in sorted {
        match item.rank_type.as_str() {
            "5" => {
                let resident = RESIDENT.contains(&item.item_id.as_str());
                items.push(AnalyzedItem {
                    item_id: item.item_id.clone(),
                    name: item.name.clone(),
                    cost: counter_5,
                    is_up: !resident,
                });
                if resident {
                    counter_5_up += 1;
                } else {
                    counter_5_up_list.push(counter_5_up);
                    counter_5_up = 0;
                }
                counter_5_list.push(counter_5);
                counter_5 = 0;
            }
            _ => {
                counter_5_up += 1;
                counter_5 += 1;
            }
        }
    }

    // 新记录在前
    items.reverse();

    let avg = |list: &[i64]| {
        if list.is_empty() {
            0.0
        } else {
            list.iter().sum::<i64>() as f64 / list.len() as f64
        }
    };

    GachaAnalysis {
        items,
        avg_5_cost: avg(&counter_5_list),
        avg_5_up_cost: avg(&counter_5_up_list),
        counter_5,
        counter_5_up,
    }
}

/// 平均五星抽数 -> 评价
fn luck_comment(avg_cost: f64) -> &'static str {
    if avg_cost == 0.0 {
        "未知"
    } else if avg_cost <= 50.0 {
        "欧"
    } else if avg_cost <= 60.0 {
        "吉"
    } else if avg_cost <= 70.0 {
        "中"
    } else {
        "非"
    }
}

fn avg_star5_cost(total: usize, counter_5: i64, star5: usize) -> f64 {
    if star5 == 0 {
        0.0
    } else {
        let v = (total as f64 - counter_5 as f64) / star5 as f64;
        (v * 10.0).round() / 10.0
    }
}

// ================= 绘图 =================

const TILES_PER_ROW: usize = 6;

struct PoolSection<'a> {
    title: &'a str,
    total: usize,
    analysis: GachaAnalysis,
    show_up: bool,
}

async fn render_gacha_card(
    font_family: &str,
    sr_uid: &str,
    gacha: &GachaLog,
) -> Result<String, String> {
    let res = crate::res::get();

    let sections = [
        PoolSection {
            title: "角色卡池",
            total: gacha.character_event.len(),
            analysis: analyze(&gacha.character_event),
            show_up: true,
        },
        PoolSection {
            title: "光锥卡池",
            total: gacha.light_cone_event.len(),
            analysis: analyze(&gacha.light_cone_event),
            show_up: true,
        },
        PoolSection {
            title: "常驻卡池",
            total: gacha.common.len(),
            analysis: analyze(&gacha.common),
            show_up: false,
        },
        PoolSection {
            title: "新手卡池",
            total: gacha.beginner.len(),
            analysis: analyze(&gacha.beginner),
            show_up: false,
        },
    ];

    let num_total: usize = sections.iter().map(|s| s.total).sum();
    let num_star5_total: usize = sections.iter().map(|s| s.analysis.items.len()).sum();
    let counter_5_total: i64 = sections.iter().map(|s| s.analysis.counter_5).sum();
    let avg_total = avg_star5_cost(num_total, counter_5_total, num_star5_total);
    let comment = luck_comment(avg_total);

    let line_counts: Vec<usize> = sections
        .iter()
        .map(|s| s.analysis.items.len().div_ceil(TILES_PER_ROW))
        .collect();
    let total_lines: usize = line_counts.iter().sum();
    let width = 1160u32;
    let height = (320 + sections.len() * 100 + total_lines * 200 + 40) as u32;

    // 预取五星图标
    let mut icons: Vec<Vec<Option<image::RgbaImage>>> = Vec::new();
    for section in &sections {
        let mut section_icons = Vec::with_capacity(section.analysis.items.len());
        for item in &section.analysis.items {
            let icon = match res.icon(&item.item_id).await {
                Some(path) => render::load_icon_circular(&path, 100),
                None => None,
            };
            section_icons.push(icon);
        }
        icons.push(section_icons);
    }

    let mut image = render::draw_card(width, height, CARD_BLACK, |root| {
        let left_top = |size| {
            font(font_family, size, &CARD_WHITE).pos(Pos::new(HPos::Left, VPos::Top))
        };
        let center = |size| {
            font(font_family, size, &CARD_WHITE).pos(Pos::new(HPos::Center, VPos::Center))
        };

        // 总览
        root.draw_text("抽卡记录", &left_top(72), (60, 50))
            .map_err(|e| e.to_string())?;
        root.draw_text(&format!("UID {sr_uid}"), &left_top(36), (800, 85))
            .map_err(|e| e.to_string())?;
        draw_line(root, (50, 150), (1110, 150), CARD_GRAY, 2)?;

        let overview = [
            (130, "总抽卡数", num_total.to_string()),
            (430, "总五星数", num_star5_total.to_string()),
            (720, "平均五星抽数", format!("{avg_total}")),
            (1010, "抽卡评价", comment.to_string()),
        ];
        for (x, label, value) in &overview {
            root.draw_text(value, &center(48), (*x, 205))
                .map_err(|e| e.to_string())?;
            root.draw_text(label, &center(24), (*x, 255))
                .map_err(|e| e.to_string())?;
        }
        draw_line(root, (50, 300), (1110, 300), CARD_GRAY, 2)?;

        // 各卡池
        let mut y = 320i32;
        for (sec_idx, section) in sections.iter().enumerate() {
            let avg = avg_star5_cost(section.total, section.analysis.counter_5,
                section.analysis.items.len());

            root.draw_text(section.title, &left_top(32), (50, y + 25))
                .map_err(|e| e.to_string())?;
            let stat_items = [
                (430, "抽卡数", section.total.to_string()),
                (720, "平均五星抽数", format!("{avg}")),
                (1010, "未出五星", section.analysis.counter_5.to_string()),
            ];
            for (x, label, value) in &stat_items {
                root.draw_text(value, &center(40), (*x, y + 25))
                    .map_err(|e| e.to_string())?;
                root.draw_text(label, &center(22), (*x, y + 70))
                    .map_err(|e| e.to_string())?;
            }
            y += 100;

            for (i, item) in section.analysis.items.iter().enumerate() {
                let row = i / TILES_PER_ROW;
                let col = i % TILES_PER_ROW;
                let x = 50 + col as i32 * 180;
                let tile_y = y + row as i32 * 200;

                // 垫抽数
                root.draw_text(&item.cost.to_string(), &center(24), (x + 135, tile_y + 25))
                    .map_err(|e| e.to_string())?;
                if section.show_up && item.is_up {
                    root.draw_text("UP", &center(24), (x + 25, tile_y + 25))
                        .map_err(|e| e.to_string())?;
                }
                root.draw_text(&item.name, &center(22), (x + 80, tile_y + 140))
                    .map_err(|e| e.to_string())?;
                draw_rect_outline(root, (x, tile_y), (x + 160, tile_y + 160), CARD_GRAY, 2)?;
            }
            y += line_counts[sec_idx] as i32 * 200;
            draw_line(root, (50, y - 20), (1110, y - 20), CARD_GRAY, 2)?;
        }

        draw_frame(root, width, height, CARD_GRAY, CARD_WHITE)
    })?;

    // 叠加五星图标
    let mut y = 320i32;
    for (sec_idx, section_icons) in icons.iter().enumerate() {
        y += 100;
        for (i, icon) in section_icons.iter().enumerate() {
            if let Some(icon) = icon {
                let row = i / TILES_PER_ROW;
                let col = i % TILES_PER_ROW;
                let x = 50 + col as i32 * 180;
                let tile_y = y + row as i32 * 200;
                render::overlay_image(&mut image, icon, x + 30, tile_y + 15);
            }
        }
        y += line_counts[sec_idx] as i32 * 200;
    }

    render::to_base64_png(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, item_id: &str, rank: &str) -> GachaLogItem {
        GachaLogItem {
            id: id.to_string(),
            gacha_id: String::new(),
            gacha_type: "11".to_string(),
            item_type: String::new(),
            item_id: item_id.to_string(),
            rank_type: rank.to_string(),
            name: format!("item-{item_id}"),
            count: "1".to_string(),
            time: String::new(),
        }
    }

    fn pool(items: Vec<GachaLogItem>) -> HashMap<String, GachaLogItem> {
        items.into_iter().map(|i| (i.id.clone(), i)).collect()
    }

    #[test]
    fn analyze_counts_pity() {
        // 3 垫 -> 五星(UP) -> 2 垫，未出金
        let pool = pool(vec![
            item("001", "1102", "3"),
            item("002", "1102", "4"),
            item("003", "1102", "3"),
            item("004", "1205", "5"),
            item("005", "1102", "3"),
            item("006", "1102", "4"),
        ]);
        let result = analyze(&pool);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].cost, 3);
        assert!(result.items[0].is_up);
        assert_eq!(result.counter_5, 2);
        assert_eq!(result.avg_5_cost, 3.0);
    }

    #[test]
    fn analyze_marks_resident_as_not_up() {
        let pool = pool(vec![item("001", "1003", "5"), item("002", "23000", "5")]);
        let result = analyze(&pool);
        assert_eq!(result.items.len(), 2);
        // 新记录在前
        assert_eq!(result.items[0].item_id, "23000");
        assert!(result.items.iter().all(|i| !i.is_up));
    }

    #[test]
    fn analyze_empty_pool() {
        let result = analyze(&HashMap::new());
        assert!(result.items.is_empty());
        assert_eq!(result.avg_5_cost, 0.0);
        assert_eq!(result.counter_5, 0);
    }

    #[test]
    fn merge_keeps_origin_entries() {
        let fresh = pool(vec![item("001", "1102", "3"), item("002", "1205", "5")]);
        let origin = pool(vec![item("000", "1101", "4")]);
        let merged = merge_pool(fresh, &origin);
        assert_eq!(merged.len(), 3);
        assert!(merged.contains_key("000"));
    }

    #[test]
    fn rewrite_url_overrides_paging_params() {
        let raw = format!("{GACHA_URL_PREFIX}?authkey=SECRET&gacha_type=1&size=5&lang=en");
        let rewritten = rewrite_gacha_url(&raw, "11", "123").unwrap();
        let url = Url::parse(&rewritten).unwrap();
        let pairs: HashMap<String, String> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs["authkey"], "SECRET");
        assert_eq!(pairs["gacha_type"], "11");
        assert_eq!(pairs["size"], "20");
        assert_eq!(pairs["lang"], "zh-cn");
        assert_eq!(pairs["game_biz"], "hkrpg_cn");
        assert_eq!(pairs["end_id"], "123");
    }

    #[test]
    fn rewrite_url_without_end_id() {
        let raw = format!("{GACHA_URL_PREFIX}?authkey=SECRET");
        let rewritten = rewrite_gacha_url(&raw, "1", "").unwrap();
        assert!(!rewritten.contains("end_id"));
    }

    #[test]
    fn luck_comment_thresholds() {
        assert_eq!(luck_comment(0.0), "未知");
        assert_eq!(luck_comment(42.0), "欧");
        assert_eq!(luck_comment(55.0), "吉");
        assert_eq!(luck_comment(65.0), "中");
        assert_eq!(luck_comment(80.0), "非");
    }

    #[test]
    fn avg_cost_excludes_pending_pity() {
        // 100 抽，10 抽未出金，3 个五星 -> (100-10)/3 = 30.0
        assert_eq!(avg_star5_cost(100, 10, 3), 30.0);
        assert_eq!(avg_star5_cost(100, 10, 0), 0.0);
    }
}
