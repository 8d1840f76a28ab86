use crate::adapters::onebot::LockedWriter;
use crate::command::match_any;
use crate::config::build_config;
use crate::event::Context;
use crate::plugins::{PluginError, get_config, reply_text};
use crate::{error, info};
use futures_util::future::BoxFuture;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use toml::Value;

// 米游社崩坏：星穹铁道官方账号的动态列表
const ACT_ID_URL: &str =
    "https://bbs-api.mihoyo.com/painter/api/user_instant/list?offset=0&size=20&uid=288909600";
const LIVE_INDEX_URL: &str = "https://api-takumi.mihoyo.com/event/miyolive/index";
const CODE_URL: &str = "https://api-takumi-static.mihoyo.com/event/miyolive/refreshCode";

#[derive(Serialize, Deserialize)]
struct CodeConfig {
    enabled: bool,
}

pub fn default_config() -> Value {
    build_config(CodeConfig { enabled: true })
}

pub fn handle(
    ctx: Context,
    writer: LockedWriter,
) -> BoxFuture<'static, Result<Option<Context>, PluginError>> {
    Box::pin(async move {
        let config: CodeConfig = get_config(&ctx, "code").unwrap_or(CodeConfig { enabled: true });
        if !config.enabled {
            return Ok(Some(ctx));
        }

        let (group_id, user_id) = match ctx.as_message() {
            Some(m) => (m.group_id(), m.user_id()),
            None => return Ok(Some(ctx)),
        };

        if match_any(&ctx, &["srcode", "星铁兑换码", "星铁前瞻兑换码"]).is_none() {
            return Ok(Some(ctx));
        }

        info!(target: "Plugin/Code", "正在查询前瞻直播兑换码");
        let msg = match get_code_msg().await {
            Ok(msg) => msg,
            Err(e) => {
                error!(target: "Plugin/Code", "兑换码查询失败: {}", e);
                "获取前瞻兑换码失败".to_string()
            }
        };
        reply_text(&ctx, writer, group_id, user_id, msg).await?;
        Ok(None)
    })
}

// ================= 接口请求 =================

fn client() -> Result<reqwest::Client, PluginError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?)
}

async fn get_json(
    client: &reqwest::Client,
    url: &str,
    act_id: Option<&str>,
    query: &[(&str, &str)],
) -> Result<serde_json::Value, PluginError> {
    let mut req = client.get(url);
    if let Some(act_id) = act_id {
        req = req.header("x-rpc-act_id", act_id);
    }
    if !query.is_empty() {
        req = req.query(query);
    }
    let resp = req.send().await?;
    Ok(serde_json::from_slice(&resp.bytes().await?)?)
}

static ACT_ID_RE: OnceLock<Regex> = OnceLock::new();
static HTML_TAG_RE: OnceLock<Regex> = OnceLock::new();

fn extract_act_id(link: &str) -> Option<String> {
    ACT_ID_RE
        .get_or_init(|| Regex::new(r"act_id=(.*?)&").unwrap())
        .captures(link)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn strip_html_tags(text: &str) -> String {
    HTML_TAG_RE
        .get_or_init(|| Regex::new(r"<.*?>").unwrap())
        .replace_all(text, "")
        .to_string()
}

/// 从官方动态中找到前瞻特别节目的 act_id
async fn get_act_id(client: &reqwest::Client) -> Result<String, PluginError> {
    let data = get_json(client, ACT_ID_URL, None, &[]).await?;
    if data["retcode"].as_i64() != Some(0) {
        return Err("动态列表接口返回异常".into());
    }

    let Some(list) = data["data"]["list"].as_array() else {
        return Err("动态列表为空".into());
    };
    for item in list {
        let post = &item["post"]["post"];
        let subject = post["subject"].as_str().unwrap_or("");
        if !subject.contains("版本前瞻特别节目") {
            continue;
        }
        let Some(content) = post["structured_content"].as_str() else {
            continue;
        };
        let Ok(segments) = serde_json::from_str::<serde_json::Value>(content) else {
            continue;
        };
        if let Some(segments) = segments.as_array() {
            for segment in segments {
                let insert = segment["insert"].as_str().unwrap_or("");
                let link = segment["attributes"]["link"].as_str().unwrap_or("");
                if insert.contains("直播") && !link.is_empty()
                    && let Some(act_id) = extract_act_id(link)
                {
                    return Ok(act_id);
                }
            }
        }
    }
    Err("未找到前瞻直播资讯".into())
}

struct LiveData {
    code_ver: String,
    title: String,
}

/// 获取直播数据，尤其是 code_ver
async fn get_live_data(client: &reqwest::Client, act_id: &str) -> Result<LiveData, PluginError> {
    let data = get_json(client, LIVE_INDEX_URL, Some(act_id), &[]).await?;
    if data["retcode"].as_i64() != Some(0) {
        return Err("前瞻直播数据异常".into());
    }
    let live = &data["data"]["live"];
    let code_ver = live["code_ver"]
        .as_str()
        .ok_or("前瞻直播数据缺少 code_ver")?
        .to_string();
    let title = live["title"]
        .as_str()
        .unwrap_or("")
        .replace("特别节目", "");
    Ok(LiveData { code_ver, title })
}

/// 获取兑换码列表 (奖励说明, 兑换码)
async fn get_codes(
    client: &reqwest::Client,
    version: &str,
    act_id: &str,
) -> Result<Vec<(String, String)>, PluginError> {
    let time = chrono::Utc::now().timestamp().to_string();
    let data = get_json(
        client,
        CODE_URL,
        Some(act_id),
        &[("version", version), ("time", time.as_str())],
    )
    .await?;
    if data["retcode"].as_i64() != Some(0) {
        return Err("兑换码数据异常".into());
    }
    let Some(list) = data["data"]["code_list"].as_array() else {
        return Err("兑换码数据异常".into());
    };
    Ok(list
        .iter()
        .map(|info| {
            let items = strip_html_tags(info["title"].as_str().unwrap_or(""));
            let code = info["code"].as_str().unwrap_or("").to_string();
            (items, code)
        })
        .collect())
}

/// 生成最新前瞻直播兑换码消息
async fn get_code_msg() -> Result<String, PluginError> {
    let client = client()?;
    let act_id = match get_act_id(&client).await {
        Ok(act_id) => act_id,
        Err(_) => return Ok("暂无前瞻直播资讯！".to_string()),
    };
    let live = get_live_data(&client, &act_id).await?;
    let codes = get_codes(&client, &live.code_ver, &act_id).await?;

    let mut msg = live.title;
    for (items, code) in codes {
        msg.push('\n');
        msg.push_str(&format!("{items}:\n{code}"));
    }
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn act_id_extracted_from_link() {
        let link = "https://webstatic.mihoyo.com/bbs/event/live/index.html?act_id=abc123&sign=1";
        assert_eq!(extract_act_id(link).as_deref(), Some("abc123"));
        assert_eq!(extract_act_id("https://example.com/no_act"), None);
    }

    #[test]
    fn html_tags_stripped_from_prize_title() {
        assert_eq!(strip_html_tags("<p>星琼*100</p>"), "星琼*100");
        assert_eq!(
            strip_html_tags("星琼<span style=\"color:red\">*100</span>"),
            "星琼*100"
        );
        assert_eq!(strip_html_tags("无标签"), "无标签");
    }
}
