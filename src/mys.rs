use anyhow::{Result, anyhow};
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use std::time::Duration;

use crate::{info, warn};

pub mod ds;
pub mod models;

use models::{QrLogin, QrStatus};

const TAKUMI_URL: &str = "https://api-takumi.mihoyo.com";
const RECORD_URL: &str = "https://api-takumi-record.mihoyo.com";
const HK4E_SDK_URL: &str = "https://hk4e-sdk.mihoyo.com";
const PASSPORT_URL: &str = "https://passport-api.mihoyo.com";
const PUBLIC_DATA_URL: &str = "https://public-data-api.mihoyo.com";

const APP_VERSION: &str = "2.50.1";
const USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 13_2_3 like Mac OS \
X) AppleWebKit/605.1.15 (KHTML, like Gecko) miHoYoBBS/2.50.1";
const WEB_ORIGIN: &str = "https://webstatic.mihoyo.com";

// 开拓月历与签到共用的活动 ID
const LEDGER_ACT_ID: &str = "e202304121516551";

/// 通过 UID 首位识别服务器区服
pub fn recognize_server(role_uid: &str) -> Option<&'static str> {
    match role_uid.chars().next()? {
        '1' => Some("prod_gf_cn"),
        '2' => Some("cn_gf01"),
        '5' => Some("cn_qd01"),
        _ => None,
    }
}

/// 米游社接口响应封套。retcode != 0 时 data 无意义。
#[derive(Debug)]
pub struct MysResponse {
    pub retcode: i64,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl MysResponse {
    pub fn is_ok(&self) -> bool {
        self.retcode == 0
    }

    /// 将 data 字段反序列化为具体模型
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        let data = self
            .data
            .clone()
            .ok_or_else(|| anyhow!("接口响应缺少 data 字段 (retcode={})", self.retcode))?;
        Ok(serde_json::from_value(data)?)
    }
}

/// 游戏记录类接口
#[derive(Debug, Clone, Copy)]
pub enum Api<'a> {
    /// 米游社游戏记录卡片，携带米游社 ID
    GameRecord { mys_id: &'a str },
    /// 角色基础信息
    BasicInfo,
    /// 角色橱窗信息
    Index,
    /// 角色详细信息 (avatar_id = "0" 表示全部)
    AvatarInfo { avatar_id: &'a str },
    /// 实时便笺
    Note,
    /// 开拓月历
    MonthInfo,
}

pub struct MysApi {
    client: reqwest::Client,
    pub device_id: String,
    pub device_fp: String,
}

static MYS: OnceLock<MysApi> = OnceLock::new();

/// 启动时生成设备指纹并注册全局客户端
pub async fn init() -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let device_id = ds::new_device_id();
    let device_fp = get_fp(&client, &device_id).await;

    let _ = MYS.set(MysApi {
        client,
        device_id,
        device_fp,
    });

    info!(target: "MysApi", "Device id & fp refreshed");
    Ok(())
}

pub fn get() -> &'static MysApi {
    MYS.get().expect("mys::init 未调用")
}

/// 获取设备指纹，失败时退化为随机值
async fn get_fp(client: &reqwest::Client, device_id: &str) -> String {
    let ext_fields = format!(
        "{{\"userAgent\":\"{USER_AGENT}\",\"browserScreenSize\":329280,\"maxTouchPoints\":5,\
\"isTouchSupported\":true,\"browserLanguage\":\"zh-CN\",\"browserPlat\":\"Linux i686\",\
\"browserTimeZone\":\"Asia/Shanghai\",\"webGlRender\":\"Adreno (TM) 640\",\
\"webGlVendor\":\"Qualcomm\",\"numOfPlugins\":0,\"listOfPlugins\":\"unknown\",\
\"screenRatio\":3.75,\"deviceMemory\":\"4\",\"hardwareConcurrency\":\"4\",\
\"cpuClass\":\"unknown\",\"ifNotTrack\":\"unknown\",\"ifAdBlock\":0,\
\"hasLiedResolution\":1,\"hasLiedOs\":0,\"hasLiedBrowser\":0}}"
    );
    let seed_time = chrono::Utc::now().timestamp_millis().to_string();
    let seed_id = ds::random_hex_lower(16);
    let fallback_fp = ds::random_hex_lower(13);

    let result = async {
        let resp = client
            .get(format!("{PUBLIC_DATA_URL}/device-fp/api/getFp"))
            .header("x-rpc-app_version", APP_VERSION)
            .header("User-Agent", USER_AGENT)
            .header("x-rpc-client_type", "5")
            .header("Referer", format!("{WEB_ORIGIN}/"))
            .header("Origin", WEB_ORIGIN)
            .query(&[
                ("device_id", device_id),
                ("seed_id", seed_id.as_str()),
                ("seed_time", seed_time.as_str()),
                ("platform", "5"),
                ("device_fp", fallback_fp.as_str()),
                ("app_name", "account_cn"),
                ("ext_fields", ext_fields.as_str()),
            ])
            .send()
            .await?;
        let value: serde_json::Value = serde_json::from_slice(&resp.bytes().await?)?;
        value["data"]["device_fp"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("响应缺少 device_fp: {value}"))
    }
    .await;

    match result {
        Ok(fp) => fp,
        Err(e) => {
            warn!(target: "MysApi", "获取 device_fp 失败，使用随机值: {}", e);
            ds::random_hex_lower(13)
        }
    }
}

impl MysApi {
    async fn parse_envelope(resp: reqwest::Response) -> Result<MysResponse> {
        let bytes = resp.bytes().await?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        let retcode = value["retcode"]
            .as_i64()
            .ok_or_else(|| anyhow!("接口响应缺少 retcode: {value}"))?;
        let message = value["message"].as_str().unwrap_or("").to_string();
        let data = if value["data"].is_null() {
            None
        } else {
            Some(value["data"].clone())
        };
        Ok(MysResponse {
            retcode,
            message,
            data,
        })
    }

    /// 带 DS 签名的游戏记录类 GET 请求
    async fn signed_get(
        &self,
        url: &str,
        params: &[(&str, &str)],
        cookie: &str,
        page: &str,
        refer: Option<&str>,
    ) -> Result<MysResponse> {
        let query: String = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let resp = self
            .client
            .get(url)
            .header("DS", ds::ds_token(&query, None, false))
            .header("Origin", WEB_ORIGIN)
            .header("Cookie", cookie)
            .header("Referer", refer.unwrap_or(&format!("{WEB_ORIGIN}/")).to_string())
            .header("User-Agent", USER_AGENT)
            .header("X-Rquested-With", "com.mihoyo.hyperion")
            .header("x-rpc-page", page)
            .header("x-rpc-client_type", "5")
            .header("x-rpc-device_id", &self.device_id)
            .header("x-rpc-device_fp", &self.device_fp)
            .header("x-rpc-app_version", APP_VERSION)
            .query(params)
            .send()
            .await?;

        Self::parse_envelope(resp).await
    }

    /// 调用游戏记录类接口。cookie 为空时直接报错。
    pub async fn call(&self, api: Api<'_>, cookie: &str, role_uid: &str) -> Result<MysResponse> {
        if cookie.is_empty() {
            return Err(anyhow!("cookie 为空"));
        }
        let server = recognize_server(role_uid);
        let need_server = || server.ok_or_else(|| anyhow!("无法识别 UID 区服: {role_uid}"));

        match api {
            Api::GameRecord { mys_id } => {
                let url = format!("{RECORD_URL}/game_record/card/wapi/getGameRecordCard");
                self.signed_get(&url, &[("uid", mys_id)], cookie, "", None)
                    .await
            }
            Api::BasicInfo => {
                let url = format!("{RECORD_URL}/game_record/app/hkrpg/api/role/basicInfo");
                let server = need_server()?;
                self.signed_get(
                    &url,
                    &[("role_id", role_uid), ("server", server)],
                    cookie,
                    "3.1.3_#/rpg",
                    None,
                )
                .await
            }
            Api::Index => {
                let url = format!("{RECORD_URL}/game_record/app/hkrpg/api/index");
                let server = need_server()?;
                self.signed_get(
                    &url,
                    &[("role_id", role_uid), ("server", server)],
                    cookie,
                    "3.1.3_#/rpg",
                    None,
                )
                .await
            }
            Api::AvatarInfo { avatar_id } => {
                let url = format!("{RECORD_URL}/game_record/app/hkrpg/api/avatar/info");
                let server = need_server()?;
                let refer = "https://webstatic.mihoyo.com/app/community-game-records/rpg/?bbs_presentation_style=fullscreen";
                self.signed_get(
                    &url,
                    &[
                        ("id", avatar_id),
                        ("need_wiki", "true"),
                        ("role_id", role_uid),
                        ("server", server),
                    ],
                    cookie,
                    "3.1.3_#/rpg/role",
                    Some(refer),
                )
                .await
            }
            Api::Note => {
                let url = format!("{RECORD_URL}/game_record/app/hkrpg/api/note");
                let server = need_server()?;
                self.signed_get(
                    &url,
                    &[("role_id", role_uid), ("server", server)],
                    cookie,
                    "3.1.3_#/rpg",
                    None,
                )
                .await
            }
            Api::MonthInfo => {
                let url = format!("{TAKUMI_URL}/event/srledger/month_info");
                let server = need_server()?;
                self.signed_get(
                    &url,
                    &[
                        ("act_id", LEDGER_ACT_ID),
                        ("region", server),
                        ("uid", role_uid),
                        ("lang", "zh-cn"),
                    ],
                    cookie,
                    "3.1.3_#/rpg",
                    None,
                )
                .await
            }
        }
    }

    /// 米游社每日签到
    pub async fn sign(&self, cookie: &str, role_uid: &str) -> Result<MysResponse> {
        let server =
            recognize_server(role_uid).ok_or_else(|| anyhow!("无法识别 UID 区服: {role_uid}"))?;
        let body = serde_json::json!({
            "act_id": LEDGER_ACT_ID,
            "region": server,
            "uid": role_uid,
        });
        let body_str = serde_json::to_string(&body)?;

        let resp = self
            .client
            .post(format!("{TAKUMI_URL}/event/luna/sign"))
            .header("DS", ds::ds_token("", Some(&body_str), true))
            .header("Origin", WEB_ORIGIN)
            .header("Cookie", cookie)
            .header("Referer", format!("{WEB_ORIGIN}/"))
            .header("User-Agent", USER_AGENT)
            .header("x-rpc-client_type", "5")
            .header("x-rpc-device_id", &self.device_id)
            .header("x-rpc-device_fp", &self.device_fp)
            .header("x-rpc-app_version", APP_VERSION)
            .header("x-rpc-signgame", "hkrpg")
            .header("Content-Type", "application/json")
            .body(body_str)
            .send()
            .await?;

        Self::parse_envelope(resp).await
    }

    // ================= Token 链 =================

    /// login_ticket -> stoken
    pub async fn get_stoken_by_login_ticket(
        &self,
        login_ticket: &str,
        mys_id: &str,
    ) -> Result<Option<String>> {
        let resp = self
            .client
            .get(format!("{TAKUMI_URL}/auth/api/getMultiTokenByLoginTicket"))
            .header("x-rpc-app_version", APP_VERSION)
            .header("User-Agent", USER_AGENT)
            .header("x-rpc-client_type", "5")
            .header("Referer", format!("{WEB_ORIGIN}/"))
            .header("Origin", WEB_ORIGIN)
            .query(&[
                ("login_ticket", login_ticket),
                ("token_types", "3"),
                ("uid", mys_id),
            ])
            .send()
            .await?;
        let envelope = Self::parse_envelope(resp).await?;
        Ok(envelope
            .data
            .as_ref()
            .and_then(|d| d["list"][0]["token"].as_str())
            .map(|s| s.to_string()))
    }

    /// stoken -> cookie_token
    pub async fn get_cookie_token_by_stoken(
        &self,
        stoken: &str,
        mys_id: &str,
    ) -> Result<Option<String>> {
        let resp = self
            .client
            .get(format!("{TAKUMI_URL}/auth/api/getCookieAccountInfoBySToken"))
            .header("x-rpc-app_version", APP_VERSION)
            .header("User-Agent", USER_AGENT)
            .header("x-rpc-client_type", "5")
            .header("Referer", format!("{WEB_ORIGIN}/"))
            .header("Origin", WEB_ORIGIN)
            .header("Cookie", format!("stuid={mys_id};stoken={stoken}"))
            .query(&[("uid", mys_id), ("stoken", stoken)])
            .send()
            .await?;
        let envelope = Self::parse_envelope(resp).await?;
        Ok(envelope
            .data
            .as_ref()
            .and_then(|d| d["cookie_token"].as_str())
            .map(|s| s.to_string()))
    }

    /// game_token -> cookie_token
    pub async fn get_cookie_token_by_game_token(
        &self,
        account_id: i64,
        game_token: &str,
    ) -> Result<Option<String>> {
        let account_id = account_id.to_string();
        let resp = self
            .client
            .get(format!(
                "{TAKUMI_URL}/auth/api/getCookieAccountInfoByGameToken"
            ))
            .query(&[
                ("game_token", game_token),
                ("account_id", account_id.as_str()),
            ])
            .send()
            .await?;
        let envelope = Self::parse_envelope(resp).await?;
        Ok(envelope
            .data
            .as_ref()
            .and_then(|d| d["cookie_token"].as_str())
            .map(|s| s.to_string()))
    }

    /// game_token -> stoken
    pub async fn get_stoken_by_game_token(
        &self,
        account_id: i64,
        game_token: &str,
    ) -> Result<Option<String>> {
        let body = serde_json::json!({
            "account_id": account_id,
            "game_token": game_token,
        });
        let body_str = serde_json::to_string(&body)?;
        let account_id = account_id.to_string();

        let resp = self
            .client
            .post(format!(
                "{PASSPORT_URL}/account/ma-cn-session/app/getTokenByGameToken"
            ))
            .header("DS", ds::ds_token("", Some(&body_str), false))
            .header("x-rpc-aigis", "")
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("x-rpc-game_biz", "bbs_cn")
            .header("x-rpc-sys_version", "11")
            .header("x-rpc-device_id", &self.device_id)
            .header("x-rpc-device_fp", &self.device_fp)
            .header("x-rpc-device_name", "Chrome 108.0.0.0")
            .header("x-rpc-device_model", "Windows 10 64-bit")
            .header("x-rpc-app_id", "bll8iq97cem8")
            .header("User-Agent", "okhttp/4.8.0")
            .query(&[
                ("account_id", account_id.as_str()),
                ("game_token", game_token),
            ])
            .send()
            .await?;
        let envelope = Self::parse_envelope(resp).await?;
        Ok(envelope
            .data
            .as_ref()
            .and_then(|d| d["token"]["token"].as_str())
            .map(|s| s.to_string()))
    }

    // ================= 扫码登录 =================

    /// 创建登录二维码 (app_id: 8 = 崩坏：星穹铁道)
    pub async fn create_login_qr(&self, app_id: u32) -> Result<QrLogin> {
        let app_id_str = app_id.to_string();
        let resp = self
            .client
            .get(format!("{HK4E_SDK_URL}/hk4e_cn/combo/panda/qrcode/fetch"))
            .query(&[
                ("app_id", app_id_str.as_str()),
                ("device", self.device_id.as_str()),
            ])
            .send()
            .await?;
        let envelope = Self::parse_envelope(resp).await?;
        let url = envelope
            .data
            .as_ref()
            .and_then(|d| d["url"].as_str())
            .ok_or_else(|| anyhow!("二维码响应缺少 url"))?
            .to_string();
        let ticket = url
            .split("ticket=")
            .nth(1)
            .ok_or_else(|| anyhow!("二维码 url 缺少 ticket: {url}"))?
            .to_string();
        Ok(QrLogin {
            app_id,
            ticket,
            device: self.device_id.clone(),
            url,
        })
    }

    /// 查询二维码扫描状态
    pub async fn check_login_qr(&self, login: &QrLogin) -> Result<QrStatus> {
        let app_id_str = login.app_id.to_string();
        let resp = self
            .client
            .get(format!("{HK4E_SDK_URL}/hk4e_cn/combo/panda/qrcode/query"))
            .query(&[
                ("app_id", app_id_str.as_str()),
                ("ticket", login.ticket.as_str()),
                ("device", login.device.as_str()),
            ])
            .send()
            .await?;
        let envelope = Self::parse_envelope(resp).await?;

        if envelope.retcode != 0 {
            return Ok(QrStatus::Expired);
        }

        let data = envelope
            .data
            .as_ref()
            .ok_or_else(|| anyhow!("二维码状态响应缺少 data"))?;
        match data["stat"].as_str() {
            Some("Init") => Ok(QrStatus::Init),
            Some("Scanned") => Ok(QrStatus::Scanned),
            Some("Confirmed") => {
                // payload.raw 是一段嵌套的 JSON 字符串
                let raw = data["payload"]["raw"]
                    .as_str()
                    .ok_or_else(|| anyhow!("确认状态缺少 payload.raw"))?;
                let payload: serde_json::Value = serde_json::from_str(raw)?;
                let uid: i64 = payload["uid"]
                    .as_str()
                    .and_then(|s| s.parse().ok())
                    .or_else(|| payload["uid"].as_i64())
                    .ok_or_else(|| anyhow!("payload 缺少 uid"))?;
                let game_token = payload["token"]
                    .as_str()
                    .ok_or_else(|| anyhow!("payload 缺少 token"))?
                    .to_string();
                Ok(QrStatus::Confirmed { uid, game_token })
            }
            other => Err(anyhow!("未知二维码状态: {:?}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_recognized_by_uid_prefix() {
        assert_eq!(recognize_server("100000001"), Some("prod_gf_cn"));
        assert_eq!(recognize_server("200000001"), Some("cn_gf01"));
        assert_eq!(recognize_server("500000001"), Some("cn_qd01"));
        assert_eq!(recognize_server("900000001"), None);
        assert_eq!(recognize_server(""), None);
    }

    #[test]
    fn envelope_data_parses_into_model() {
        let resp = MysResponse {
            retcode: 0,
            message: "OK".to_string(),
            data: Some(serde_json::json!({
                "nickname": "开拓者",
                "level": 70,
                "region": "prod_gf_cn",
            })),
        };
        let info: models::RoleBasicInfo = resp.data_as().unwrap();
        assert_eq!(info.nickname, "开拓者");
        assert_eq!(info.level, 70);
    }

    #[test]
    fn envelope_without_data_errors() {
        let resp = MysResponse {
            retcode: 10001,
            message: "请先登录".to_string(),
            data: None,
        };
        assert!(!resp.is_ok());
        assert!(resp.data_as::<models::RoleBasicInfo>().is_err());
    }
}
