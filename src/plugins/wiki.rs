use crate::adapters::onebot::LockedWriter;
use crate::command::get_prefixes;
use crate::config::build_config;
use crate::event::Context;
use crate::plugins::{PluginError, get_config, reply_image, reply_text};
use crate::render;
use crate::res::GuideKind;
use crate::{info, warn};
use futures_util::future::BoxFuture;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use toml::Value;

#[derive(Serialize, Deserialize)]
struct WikiConfig {
    enabled: bool,
}

pub fn default_config() -> Value {
    build_config(WikiConfig { enabled: true })
}

static WIKI_RE: OnceLock<Regex> = OnceLock::new();

fn wiki_regex() -> &'static Regex {
    // (名称)(角色|光锥)?(图鉴|攻略|材料)
    WIKI_RE.get_or_init(|| {
        Regex::new(r"^(?P<name>\w{1,7}?)(?P<base>角色|光锥)?(?P<kind>图鉴|攻略|材料)$").unwrap()
    })
}

#[derive(Debug, PartialEq)]
pub struct WikiQuery {
    pub name: String,
    /// 限定范围：角色 / 光锥 / 不限
    pub base: Option<String>,
    pub kind: String,
}

pub fn parse_wiki_query(content: &str) -> Option<WikiQuery> {
    let caps = wiki_regex().captures(content)?;
    let name = caps.name("name")?.as_str().to_string();
    if name.is_empty() {
        return None;
    }
    Some(WikiQuery {
        name,
        base: caps.name("base").map(|m| m.as_str().to_string()),
        kind: caps.name("kind")?.as_str().to_string(),
    })
}

pub fn handle(
    ctx: Context,
    writer: LockedWriter,
) -> BoxFuture<'static, Result<Option<Context>, PluginError>> {
    Box::pin(async move {
        let config: WikiConfig = get_config(&ctx, "wiki").unwrap_or(WikiConfig { enabled: true });
        if !config.enabled {
            return Ok(Some(ctx));
        }

        let (group_id, user_id, text) = match ctx.as_message() {
            Some(m) => (m.group_id(), m.user_id(), m.text().trim().to_string()),
            None => return Ok(Some(ctx)),
        };

        // 去除指令前缀
        let mut content = text.as_str();
        for prefix in get_prefixes(&ctx) {
            if !prefix.is_empty() && content.starts_with(prefix.as_str()) {
                content = &content[prefix.len()..];
                break;
            }
        }

        let Some(query) = parse_wiki_query(content) else {
            return Ok(Some(ctx));
        };

        let res = crate::res::get();
        let Some(id) = res.nickname_to_id(&query.name) else {
            // 名称未命中时放行，避免吞掉普通聊天
            return Ok(Some(ctx));
        };

        info!(target: "Plugin/Wiki", "查询『{}』{}", query.name, query.kind);

        // 角色材料 / 角色攻略 / 光锥攻略，按查询类型和 ID 类别选取
        let is_character = id.len() == 4 || id.starts_with("80");
        let kinds: Vec<GuideKind> = match (query.base.as_deref(), query.kind.as_str()) {
            (Some("光锥"), _) => vec![GuideKind::LightCone],
            (Some("角色"), "材料") => vec![GuideKind::CharacterMaterial],
            (Some("角色"), _) => vec![GuideKind::CharacterOverview],
            (None, "材料") => vec![GuideKind::CharacterMaterial],
            _ if is_character => vec![GuideKind::CharacterOverview, GuideKind::CharacterMaterial],
            _ => vec![GuideKind::LightCone, GuideKind::RelicSet],
        };

        let mut path = None;
        for kind in kinds {
            path = res.guide(&id, kind).await;
            if path.is_some() {
                break;
            }
        }

        match path {
            Some(path) => match tokio::fs::read(&path).await {
                Ok(data) => {
                    reply_image(&ctx, writer, group_id, user_id, render::file_to_base64(&data))
                        .await?;
                }
                Err(e) => {
                    warn!(target: "Plugin/Wiki", "读取攻略图失败: {}", e);
                    reply_text(
                        &ctx,
                        writer,
                        group_id,
                        user_id,
                        format!("暂无『{}』的查找结果", query.name),
                    )
                    .await?;
                }
            },
            None => {
                reply_text(
                    &ctx,
                    writer,
                    group_id,
                    user_id,
                    format!("暂无『{}』的查找结果", query.name),
                )
                .await?;
            }
        }
        Ok(None)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_guide_query() {
        let query = parse_wiki_query("希儿攻略").unwrap();
        assert_eq!(query.name, "希儿");
        assert_eq!(query.base, None);
        assert_eq!(query.kind, "攻略");
    }

    #[test]
    fn parses_scoped_queries() {
        let query = parse_wiki_query("希儿角色材料").unwrap();
        assert_eq!(query.base.as_deref(), Some("角色"));
        assert_eq!(query.kind, "材料");

        let query = parse_wiki_query("银河铁道之夜光锥图鉴").unwrap();
        assert_eq!(query.name, "银河铁道之夜");
        assert_eq!(query.base.as_deref(), Some("光锥"));
    }

    #[test]
    fn rejects_non_wiki_text() {
        assert!(parse_wiki_query("随便聊聊").is_none());
        assert!(parse_wiki_query("攻略").is_none());
        assert!(parse_wiki_query("").is_none());
    }
}
