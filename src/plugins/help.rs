use crate::adapters::onebot::LockedWriter;
use crate::command::match_any;
use crate::config::build_config;
use crate::event::Context;
use crate::plugins::{PluginError, get_config, reply_image, reply_text};
use crate::render::{self, CARD_BLACK, CARD_GRAY, CARD_WHITE, draw_frame, draw_line, font};
use crate::warn;
use futures_util::future::BoxFuture;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use serde::{Deserialize, Serialize};
use toml::Value;

#[derive(Serialize, Deserialize)]
struct HelpConfig {
    enabled: bool,
}

pub fn default_config() -> Value {
    build_config(HelpConfig { enabled: true })
}

/// 帮助菜单条目：功能名 + 指令说明
pub const HELP_ENTRIES: &[(&str, &[&str])] = &[
    ("账号绑定", &[
        "绑定UID: sruid [uid]",
        "绑定cookie: srck [cookie]",
        "扫码绑定: srqr",
        "解除绑定: srdel",
    ]),
    ("每日签到", &["米游社签到: srsign"]),
    ("开拓信息", &["玩家信息: srinfo", "实时便笺: srmemo", "开拓月历: srmonth"]),
    ("抽卡记录", &["导入: 导入抽卡记录 [链接]", "查看: 查看抽卡记录"]),
    ("角色面板", &["更新面板: srpu", "查看面板: xxxx面板"]),
    ("兑换码", &["前瞻兑换码: srcode"]),
    ("百科", &["攻略查询: xxxx攻略 / xxxx图鉴 / xxxx材料"]),
];

pub fn handle(
    ctx: Context,
    writer: LockedWriter,
) -> BoxFuture<'static, Result<Option<Context>, PluginError>> {
    Box::pin(async move {
        let config: HelpConfig = get_config(&ctx, "help").unwrap_or(HelpConfig { enabled: true });
        if !config.enabled {
            return Ok(Some(ctx));
        }

        let (group_id, user_id) = match ctx.as_message() {
            Some(m) => (m.group_id(), m.user_id()),
            None => return Ok(Some(ctx)),
        };

        if match_any(&ctx, &["srhelp", "星铁帮助", "星铁功能"]).is_some() {
            let font_family = ctx.config.read().unwrap().mys.font_family.clone();
            match render_help_card(&font_family) {
                Ok(image) => {
                    reply_image(&ctx, writer, group_id, user_id, image).await?;
                }
                Err(e) => {
                    warn!(target: "Plugin/Help", "绘图出错: {}", e);
                    reply_text(&ctx, writer, group_id, user_id, "帮助图片绘制失败，请稍后重试")
                        .await?;
                }
            }
            return Ok(None);
        }

        if match_any(&ctx, &["help", "帮助", "功能"]).is_some() {
            reply_text(&ctx, writer, group_id, user_id, "发送 srhelp 查看崩坏：星穹铁道帮助菜单")
                .await?;
            return Ok(None);
        }

        Ok(Some(ctx))
    })
}

fn render_help_card(font_family: &str) -> Result<String, String> {
    let total_lines: usize = HELP_ENTRIES.iter().map(|(_, lines)| lines.len()).sum();
    let width = 800u32;
    let height = (200 + HELP_ENTRIES.len() * 60 + total_lines * 40) as u32;

    let image = render::draw_card(width, height, CARD_BLACK, |root| {
        let white = |size| {
            font(font_family, size, &CARD_WHITE).pos(Pos::new(HPos::Left, VPos::Top))
        };

        root.draw_text("崩坏：星穹铁道 帮助菜单", &white(44), (60, 50))
            .map_err(|e| e.to_string())?;
        draw_line(root, (50, 130), (750, 130), CARD_GRAY, 2)?;

        let mut y = 160i32;
        for (title, lines) in HELP_ENTRIES {
            root.draw_text(title, &white(32), (60, y))
                .map_err(|e| e.to_string())?;
            y += 50;
            for line in *lines {
                root.draw_text(line, &white(24), (100, y))
                    .map_err(|e| e.to_string())?;
                y += 40;
            }
            y += 10;
        }

        draw_frame(root, width, height, CARD_GRAY, CARD_WHITE)
    })?;

    render::to_base64_png(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_entries_cover_all_commands() {
        let all: Vec<&str> = HELP_ENTRIES
            .iter()
            .flat_map(|(_, lines)| lines.iter().copied())
            .collect();
        assert!(all.iter().any(|l| l.contains("sruid")));
        assert!(all.iter().any(|l| l.contains("srsign")));
        assert!(all.iter().any(|l| l.contains("srmemo")));
        assert!(all.iter().any(|l| l.contains("抽卡记录")));
        assert!(all.iter().any(|l| l.contains("srpu")));
        assert!(all.iter().any(|l| l.contains("srcode")));
    }
}
