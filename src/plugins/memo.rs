use crate::adapters::onebot::LockedWriter;
use crate::command::match_any;
use crate::config::build_config;
use crate::event::Context;
use crate::mys::{self, Api, models};
use crate::plugins::{PluginError, bind, get_config, reply_image, reply_text};
use crate::render::{
    self, CARD_GRAY_DARK, CARD_GRAY_LIGHT, CARD_PAPER, draw_line, draw_rect_outline, font,
    time_fmt,
};
use crate::{info, warn};
use futures_util::future::BoxFuture;
use plotters::prelude::RGBColor;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use serde::{Deserialize, Serialize};
use toml::Value;

const GRAY2: RGBColor = RGBColor(100, 100, 100);

#[derive(Serialize, Deserialize)]
struct MemoConfig {
    enabled: bool,
}

pub fn default_config() -> Value {
    build_config(MemoConfig { enabled: true })
}

pub fn handle(
    ctx: Context,
    writer: LockedWriter,
) -> BoxFuture<'static, Result<Option<Context>, PluginError>> {
    Box::pin(async move {
        let config: MemoConfig = get_config(&ctx, "memo").unwrap_or(MemoConfig { enabled: true });
        if !config.enabled {
            return Ok(Some(ctx));
        }

        let (group_id, user_id) = match ctx.as_message() {
            Some(m) => (m.group_id(), m.user_id()),
            None => return Ok(Some(ctx)),
        };

        let memo_hit = match_any(
            &ctx,
            &["srmemo", "srnote", "星铁体力", "星铁每日", "星铁开拓力", "星铁便笺", "星铁实时便笺"],
        )
        .is_some();
        let month_hit = !memo_hit
            && match_any(&ctx, &["srmonth", "星铁每月", "星铁月历", "星铁开拓月历"]).is_some();

        if !memo_hit && !month_hit {
            return Ok(Some(ctx));
        }

        let bot_id = ctx.bot.login_user.id.clone();
        let user_id_str = user_id.to_string();

        let bindings = bind::get_bindings(&ctx.db, &bot_id, &user_id_str).await?;
        let Some(first) = bindings.first() else {
            reply_text(&ctx, writer, group_id, user_id, bind::bind_hint()).await?;
            return Ok(None);
        };
        let sr_uid = first.sr_uid.clone();

        let Some(cookie) = bind::get_cookie(&ctx.db, &bot_id, &user_id_str, &sr_uid).await else {
            reply_text(
                &ctx,
                writer,
                group_id,
                user_id,
                "未绑定cookie，请使用`srck [cookie]`绑定或`srqr`扫码绑定",
            )
            .await?;
            return Ok(None);
        };

        let api = mys::get();
        let basic = fetch::<models::RoleBasicInfo>(api, Api::BasicInfo, &cookie, &sr_uid).await;

        let font_family = ctx.config.read().unwrap().mys.font_family.clone();

        let image = if memo_hit {
            info!(target: "Plugin/Memo", "正在查询SRUID『{}』便笺", sr_uid);
            let note = fetch::<models::DailyNote>(api, Api::Note, &cookie, &sr_uid).await;
            match (basic, note) {
                (Some(basic), Some(note)) => {
                    info!(target: "Plugin/Memo", "正在绘制SRUID『{}』便笺图片", sr_uid);
                    render_memo_card(&font_family, &sr_uid, &basic, &note)
                }
                _ => {
                    reply_text(&ctx, writer, group_id, user_id, "查询失败，请稍后重试").await?;
                    return Ok(None);
                }
            }
        } else {
            info!(target: "Plugin/Memo", "正在查询SRUID『{}』月历", sr_uid);
            let month = fetch::<models::MonthlyAward>(api, Api::MonthInfo, &cookie, &sr_uid).await;
            match (basic, month) {
                (Some(basic), Some(month)) => {
                    info!(target: "Plugin/Memo", "正在绘制SRUID『{}』月历图片", sr_uid);
                    render_month_card(&font_family, &sr_uid, &basic, &month)
                }
                _ => {
                    reply_text(&ctx, writer, group_id, user_id, "查询失败，请稍后重试").await?;
                    return Ok(None);
                }
            }
        };

        match image {
            Ok(image) => {
                reply_image(&ctx, writer, group_id, user_id, image).await?;
            }
            Err(e) => {
                warn!(target: "Plugin/Memo", "绘图出错: {}", e);
                reply_text(&ctx, writer, group_id, user_id, "图片绘制失败，请稍后重试").await?;
            }
        }
        Ok(None)
    })
}

async fn fetch<T: serde::de::DeserializeOwned>(
    api: &mys::MysApi,
    kind: Api<'_>,
    cookie: &str,
    sr_uid: &str,
) -> Option<T> {
    match api.call(kind, cookie, sr_uid).await {
        Ok(resp) if resp.is_ok() => resp.data_as().ok(),
        Ok(resp) => {
            warn!(target: "Plugin/Memo", "接口返回错误 retcode={}: {}", resp.retcode, resp.message);
            None
        }
        Err(e) => {
            warn!(target: "Plugin/Memo", "接口请求失败: {}", e);
            None
        }
    }
}

// ================= 绘图 =================

/// 实时便笺卡片：开拓力 + 派遣列表
fn render_memo_card(
    font_family: &str,
    sr_uid: &str,
    basic: &models::RoleBasicInfo,
    note: &models::DailyNote,
) -> Result<String, String> {
    // 最多展示 4 条派遣
    let expeditions: Vec<&models::Expedition> = note.expeditions.iter().take(4).collect();
    let width = 800u32;
    let height = (300 + expeditions.len() * 80) as u32;

    let stamina_str = format!("{}/{}", note.current_stamina, note.max_stamina);
    let recover_str = if note.current_stamina >= note.max_stamina {
        "已回满".to_string()
    } else {
        format!("{} 后回满", time_fmt(note.stamina_recover_time))
    };

    let image = render::draw_card(width, height, CARD_PAPER, |root| {
        let dark = |size| {
            font(font_family, size, &CARD_GRAY_DARK).pos(Pos::new(HPos::Left, VPos::Top))
        };
        let mid = |size| font(font_family, size, &GRAY2).pos(Pos::new(HPos::Left, VPos::Top));

        root.draw_text(&basic.nickname, &dark(48), (60, 50))
            .map_err(|e| e.to_string())?;
        root.draw_text(&format!("UID {sr_uid}"), &dark(24), (60, 110))
            .map_err(|e| e.to_string())?;
        root.draw_text(&basic.level.to_string(), &dark(72), (620, 55))
            .map_err(|e| e.to_string())?;

        draw_line(root, (50, 150), (750, 150), CARD_GRAY_LIGHT, 2)?;

        root.draw_text("开拓力", &mid(24), (50, 190))
            .map_err(|e| e.to_string())?;
        root.draw_text(&stamina_str, &dark(54), (200, 175))
            .map_err(|e| e.to_string())?;
        root.draw_text(&recover_str, &mid(24), (500, 190))
            .map_err(|e| e.to_string())?;

        draw_line(root, (50, 250), (750, 250), CARD_GRAY_LIGHT, 2)?;

        // 派遣列表
        for (i, expedition) in expeditions.iter().enumerate() {
            let y = 280 + i as i32 * 80;
            draw_rect_outline(root, (50, y), (750, y + 60), CARD_GRAY_LIGHT, 2)?;
            root.draw_text(&expedition.name, &dark(24), (60, y + 18))
                .map_err(|e| e.to_string())?;
            let status = if expedition.remaining_time == 0 {
                "已完成".to_string()
            } else {
                format!("剩余 {}", time_fmt(expedition.remaining_time))
            };
            root.draw_text(&status, &dark(24), (420, y + 18))
                .map_err(|e| e.to_string())?;
        }

        render::draw_frame(root, width, height, CARD_GRAY_DARK, GRAY2)
    })?;

    render::to_base64_png(image)
}

/// 开拓月历卡片：本月/上月 星琼与通票 + 来源占比
fn render_month_card(
    font_family: &str,
    sr_uid: &str,
    basic: &models::RoleBasicInfo,
    month: &models::MonthlyAward,
) -> Result<String, String> {
    let groups: Vec<&models::MonthGroup> = month.month_data.group_by.iter().collect();
    let width = 800u32;
    let height = (360 + groups.len() * 50) as u32;
    let data = &month.month_data;

    let image = render::draw_card(width, height, CARD_PAPER, |root| {
        let dark = |size| {
            font(font_family, size, &CARD_GRAY_DARK).pos(Pos::new(HPos::Left, VPos::Top))
        };
        let mid = |size| font(font_family, size, &GRAY2).pos(Pos::new(HPos::Left, VPos::Top));

        root.draw_text(&basic.nickname, &dark(48), (60, 50))
            .map_err(|e| e.to_string())?;
        root.draw_text(&format!("UID {sr_uid}"), &dark(24), (60, 110))
            .map_err(|e| e.to_string())?;
        let month_label = if month.data_month.is_empty() {
            month.month.clone()
        } else {
            month.data_month.clone()
        };
        root.draw_text(&format!("{month_label} 月历"), &dark(36), (520, 70))
            .map_err(|e| e.to_string())?;

        draw_line(root, (50, 150), (750, 150), CARD_GRAY_LIGHT, 2)?;

        root.draw_text("本月星琼", &mid(24), (60, 180))
            .map_err(|e| e.to_string())?;
        root.draw_text(&data.current_hcoin.to_string(), &dark(48), (60, 215))
            .map_err(|e| e.to_string())?;
        root.draw_text("本月通票", &mid(24), (260, 180))
            .map_err(|e| e.to_string())?;
        root.draw_text(&data.current_rails_pass.to_string(), &dark(48), (260, 215))
            .map_err(|e| e.to_string())?;
        root.draw_text("上月星琼", &mid(24), (460, 180))
            .map_err(|e| e.to_string())?;
        root.draw_text(&data.last_hcoin.to_string(), &dark(48), (460, 215))
            .map_err(|e| e.to_string())?;
        root.draw_text("上月通票", &mid(24), (620, 180))
            .map_err(|e| e.to_string())?;
        root.draw_text(&data.last_rails_pass.to_string(), &dark(48), (620, 215))
            .map_err(|e| e.to_string())?;

        draw_line(root, (50, 290), (750, 290), CARD_GRAY_LIGHT, 2)?;

        root.draw_text("星琼来源", &mid(24), (60, 310))
            .map_err(|e| e.to_string())?;

        for (i, group) in groups.iter().enumerate() {
            let y = 350 + i as i32 * 50;
            root.draw_text(&group.action_name, &dark(24), (80, y))
                .map_err(|e| e.to_string())?;
            root.draw_text(&group.num.to_string(), &dark(24), (460, y))
                .map_err(|e| e.to_string())?;
            root.draw_text(&format!("{}%", group.percent), &mid(24), (620, y))
                .map_err(|e| e.to_string())?;
        }

        render::draw_frame(root, width, height, CARD_GRAY_DARK, GRAY2)
    })?;

    render::to_base64_png(image)
}
