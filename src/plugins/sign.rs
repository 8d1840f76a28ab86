use crate::adapters::onebot::LockedWriter;
use crate::command::match_any;
use crate::config::build_config;
use crate::event::Context;
use crate::mys::{self, models::SignResult};
use crate::plugins::{PluginError, bind, get_config, reply_text};
use crate::{info, warn};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use toml::Value;

#[derive(Serialize, Deserialize)]
struct SignConfig {
    enabled: bool,
}

pub fn default_config() -> Value {
    build_config(SignConfig { enabled: true })
}

/// 签到接口错误码 -> 提示语
fn retcode_message(retcode: i64) -> String {
    match retcode {
        10001 => "绑定cookie失效，请重新绑定".to_string(),
        -10001 => "请求出错，请尝试重新使用`srqr`绑定".to_string(),
        -5003 => "今日已签到".to_string(),
        other => format!("签到失败，请稍后重试（错误代码 {other}）"),
    }
}

pub fn handle(
    ctx: Context,
    writer: LockedWriter,
) -> BoxFuture<'static, Result<Option<Context>, PluginError>> {
    Box::pin(async move {
        let config: SignConfig = get_config(&ctx, "sign").unwrap_or(SignConfig { enabled: true });
        if !config.enabled {
            return Ok(Some(ctx));
        }

        let (group_id, user_id) = match ctx.as_message() {
            Some(m) => (m.group_id(), m.user_id()),
            None => return Ok(Some(ctx)),
        };

        if match_any(&ctx, &["srsign", "星铁签到", "星铁每日签到", "米游社签到"]).is_none() {
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

        info!(target: "Plugin/Sign", "开始为SRUID『{}』签到", sr_uid);
        reply_text(
            &ctx,
            writer.clone(),
            group_id,
            user_id,
            format!("开始为SRUID『{sr_uid}』签到"),
        )
        .await?;

        let msg = match mys::get().sign(&cookie, &sr_uid).await {
            Ok(resp) if !resp.is_ok() => retcode_message(resp.retcode),
            Ok(resp) => match resp.data_as::<SignResult>() {
                Ok(result) if result.is_risk => "签到遇验证码，请手动签到".to_string(),
                Ok(_) => "签到成功".to_string(),
                Err(e) => {
                    warn!(target: "Plugin/Sign", "签到响应解析失败: {}", e);
                    "疑似cookie失效，请重新使用`srck [cookie]`绑定或`srqr`扫码绑定".to_string()
                }
            },
            Err(e) => {
                warn!(target: "Plugin/Sign", "签到请求失败: {}", e);
                "签到失败，请稍后重试".to_string()
            }
        };

        reply_text(&ctx, writer, group_id, user_id, msg).await?;
        Ok(None)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_retcodes_have_friendly_messages() {
        assert_eq!(retcode_message(-5003), "今日已签到");
        assert_eq!(retcode_message(10001), "绑定cookie失效，请重新绑定");
        assert!(retcode_message(-999).contains("-999"));
    }
}
