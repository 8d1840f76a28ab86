use crate::adapters::onebot::LockedWriter;
use crate::command::match_any;
use crate::config::build_config;
use crate::event::Context;
use crate::mys::{self, Api, models};
use crate::plugins::{PluginError, bind, get_config, reply_image, reply_text};
use crate::render::{
    self, CARD_BLACK, CARD_GRAY, CARD_WHITE, STAR4, STAR5, draw_frame, draw_line,
    draw_rect_outline, font, level_fmt,
};
use crate::{info, warn};
use futures_util::future::BoxFuture;
use image::RgbaImage;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use toml::Value;

#[derive(Serialize, Deserialize)]
struct InfoConfig {
    enabled: bool,
}

pub fn default_config() -> Value {
    build_config(InfoConfig { enabled: true })
}

pub fn handle(
    ctx: Context,
    writer: LockedWriter,
) -> BoxFuture<'static, Result<Option<Context>, PluginError>> {
    Box::pin(async move {
        let config: InfoConfig = get_config(&ctx, "info").unwrap_or(InfoConfig { enabled: true });
        if !config.enabled {
            return Ok(Some(ctx));
        }

        let (group_id, user_id) = match ctx.as_message() {
            Some(m) => (m.group_id(), m.user_id()),
            None => return Ok(Some(ctx)),
        };

        if match_any(&ctx, &["srinfo", "星铁信息", "星铁个人信息", "星铁玩家信息"]).is_none() {
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

        info!(target: "Plugin/Info", "正在查询SRUID『{}』信息", sr_uid);
        let api = mys::get();

        let basic = fetch_model::<models::RoleBasicInfo>(api, Api::BasicInfo, &cookie, &sr_uid).await;
        let index = fetch_model::<models::RoleIndex>(api, Api::Index, &cookie, &sr_uid).await;

        let (Some(basic), Some(index)) = (basic, index) else {
            reply_text(&ctx, writer, group_id, user_id, "查询失败，请稍后重试").await?;
            return Ok(None);
        };

        // 光锥信息失败可容忍，仅影响展示
        let equips = match fetch_model::<models::AvatarInfo>(
            api,
            Api::AvatarInfo { avatar_id: "0" },
            &cookie,
            &sr_uid,
        )
        .await
        {
            Some(detail) => Some(
                detail
                    .avatar_list
                    .into_iter()
                    .filter_map(|d| d.equip.map(|e| (d.id, e)))
                    .collect::<HashMap<i64, models::Equip>>(),
            ),
            None => None,
        };

        info!(target: "Plugin/Info", "正在绘制SRUID『{}』信息图片", sr_uid);
        let font_family = ctx.config.read().unwrap().mys.font_family.clone();

        match render_info_card(&font_family, &sr_uid, &basic, &index, equips.as_ref()).await {
            Ok(image) => {
                reply_image(&ctx, writer, group_id, user_id, image).await?;
            }
            Err(e) => {
                warn!(target: "Plugin/Info", "绘图出错: {}", e);
                reply_text(&ctx, writer, group_id, user_id, "图片绘制失败，请稍后重试").await?;
            }
        }
        Ok(None)
    })
}

async fn fetch_model<T: serde::de::DeserializeOwned>(
    api: &mys::MysApi,
    kind: Api<'_>,
    cookie: &str,
    sr_uid: &str,
) -> Option<T> {
    match api.call(kind, cookie, sr_uid).await {
        Ok(resp) if resp.is_ok() => resp.data_as().ok(),
        Ok(resp) => {
            warn!(target: "Plugin/Info", "接口返回错误 retcode={}: {}", resp.retcode, resp.message);
            None
        }
        Err(e) => {
            warn!(target: "Plugin/Info", "接口请求失败: {}", e);
            None
        }
    }
}

// ================= 绘图 =================

const TILE_W: i32 = 160;
const TILE_H: i32 = 240;
const TILES_PER_ROW: usize = 6;

struct TileIcons {
    avatar: Option<RgbaImage>,
    element: Option<RgbaImage>,
    equip: Option<RgbaImage>,
}

async fn render_info_card(
    font_family: &str,
    sr_uid: &str,
    basic: &models::RoleBasicInfo,
    index: &models::RoleIndex,
    equips: Option<&HashMap<i64, models::Equip>>,
) -> Result<String, String> {
    let res = crate::res::get();
    let avatars = &index.avatar_list;
    let rows: Vec<&[models::AvatarListItem]> = avatars.chunks(TILES_PER_ROW).collect();
    let height = (400 + rows.len() * 260) as u32;
    let width = 1160u32;

    // 预取图标（绘制闭包内无法 await）
    let mut icons: Vec<TileIcons> = Vec::with_capacity(avatars.len());
    for avatar in avatars {
        let avatar_icon = match res.icon(&avatar.id.to_string()).await {
            Some(path) => render::load_icon_circular(&path, 100),
            None => None,
        };
        let element_icon = match res.element_icon(&avatar.element).await {
            Some(path) => render::load_icon(&path, 28),
            None => None,
        };
        let equip_icon = match equips.and_then(|m| m.get(&avatar.id)) {
            Some(equip) => match res.icon(&equip.id.to_string()).await {
                Some(path) => render::load_icon(&path, 56),
                None => None,
            },
            None => None,
        };
        icons.push(TileIcons {
            avatar: avatar_icon,
            element: element_icon,
            equip: equip_icon,
        });
    }

    let stats = &index.stats;
    let mut image = render::draw_card(width, height, CARD_BLACK, |root| {
        let left_top = |size| {
            font(font_family, size, &CARD_WHITE).pos(Pos::new(HPos::Left, VPos::Top))
        };
        let center = |size| {
            font(font_family, size, &CARD_WHITE).pos(Pos::new(HPos::Center, VPos::Center))
        };

        // 头部：昵称 / UID / 开拓等级
        root.draw_text(&basic.nickname, &left_top(72), (60, 50))
            .map_err(|e| e.to_string())?;
        root.draw_text(&format!("UID {sr_uid}"), &left_top(36), (550, 85))
            .map_err(|e| e.to_string())?;
        root.draw_text(&basic.level.to_string(), &center(72), (1010, 95))
            .map_err(|e| e.to_string())?;

        draw_line(root, (50, 150), (1110, 150), CARD_GRAY, 2)?;

        // 统计信息
        let stat_items = [
            (130, "活跃天数", stats.active_days),
            (430, "解锁角色", stats.avatar_num),
            (720, "达成成就", stats.achievement_num),
            (1010, "宝箱开启", stats.chest_num),
        ];
        for (x, label, value) in stat_items {
            root.draw_text(&value.to_string(), &center(48), (x, 205))
                .map_err(|e| e.to_string())?;
            root.draw_text(label, &center(24), (x, 255))
                .map_err(|e| e.to_string())?;
        }

        draw_line(root, (50, 290), (1110, 290), CARD_GRAY, 2)?;

        // 忘却之庭
        root.draw_text("忘却之庭", &left_top(24), (50, 315))
            .map_err(|e| e.to_string())?;
        root.draw_text(&stats.abyss_process, &left_top(28), (300, 310))
            .map_err(|e| e.to_string())?;

        draw_line(root, (50, 360), (1110, 360), CARD_GRAY, 2)?;

        // 角色橱窗，每行 6 个
        for (row_idx, row) in rows.iter().enumerate() {
            let y = 380 + row_idx as i32 * 260;
            for (col_idx, avatar) in row.iter().enumerate() {
                let x = 50 + col_idx as i32 * 180;

                root.draw_text(
                    &level_fmt(avatar.level),
                    &center(32),
                    (x + 80, y + 150),
                )
                .map_err(|e| e.to_string())?;

                // 星魂数角标
                if avatar.rank > 0 {
                    draw_rect_outline(root, (x + 20, y + 20), (x + 40, y + 40), CARD_GRAY, 2)?;
                    root.draw_text(&avatar.rank.to_string(), &center(20), (x + 30, y + 30))
                        .map_err(|e| e.to_string())?;
                }

                // 光锥信息
                let equip = equips.and_then(|m| m.get(&avatar.id));
                match equip {
                    Some(equip) => {
                        draw_rect_outline(
                            root,
                            (x + 94, y + 174),
                            (x + 114, y + 194),
                            CARD_GRAY,
                            2,
                        )?;
                        root.draw_text(
                            &equip.rank.to_string(),
                            &center(18),
                            (x + 104, y + 184),
                        )
                        .map_err(|e| e.to_string())?;
                        root.draw_text(
                            &level_fmt(equip.level),
                            &center(20),
                            (x + 105, y + 212),
                        )
                        .map_err(|e| e.to_string())?;
                    }
                    None => {
                        let text = if equips.is_some() {
                            "未装备光锥"
                        } else {
                            "未获取光锥信息"
                        };
                        root.draw_text(text, &center(18), (x + 80, y + 200))
                            .map_err(|e| e.to_string())?;
                    }
                }

                // 边框颜色按稀有度区分
                let border = if avatar.rarity == 5 { STAR5 } else { STAR4 };
                draw_rect_outline(root, (x, y), (x + TILE_W, y + TILE_H), border, 3)?;
            }
        }

        draw_frame(root, width, height, CARD_GRAY, CARD_WHITE)
    })?;

    // 叠加图标
    for (i, avatar_icons) in icons.iter().enumerate() {
        let row = i / TILES_PER_ROW;
        let col = i % TILES_PER_ROW;
        let x = 50 + col as i32 * 180;
        let y = 380 + row as i32 * 260;
        if let Some(icon) = &avatar_icons.avatar {
            render::overlay_image(&mut image, icon, x + 30, y + 30);
        }
        if let Some(icon) = &avatar_icons.element {
            render::overlay_image(&mut image, icon, x + 116, y + 16);
        }
        if let Some(icon) = &avatar_icons.equip {
            render::overlay_image(&mut image, icon, x + 20, y + 170);
        }
    }

    render::to_base64_png(image)
}
