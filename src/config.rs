use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::fs;
use toml::Value;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    // 全局指令前缀（支持多个，如 ["/", ""]，空串表示无前缀直接匹配）
    #[serde(default = "default_prefix")]
    pub command_prefix: Vec<String>,

    // 超级用户（可使用 srpck / srsupdate 等管理指令）
    #[serde(default)]
    pub superusers: Vec<i64>,

    // 米游社 / 资源站配置
    #[serde(default)]
    pub mys: MysConfig,

    // Bot 连接配置
    #[serde(default = "default_bots")]
    pub bots: Vec<BotConfig>,

    // 插件配置
    #[serde(flatten)]
    pub plugins: HashMap<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MysConfig {
    // StarRailRes 资源仓库
    #[serde(default = "default_res_url")]
    pub res_url: String,

    // GitHub 加速代理，留空则直连
    #[serde(default)]
    pub github_proxy: Option<String>,

    // 面板解析服务
    #[serde(default = "default_panel_url")]
    pub panel_url: String,

    // 遗器评分标准
    #[serde(default = "default_score_url")]
    pub score_url: String,

    // 卡片渲染字体（系统字体族名称）
    #[serde(default = "default_font_family")]
    pub font_family: String,
}

impl Default for MysConfig {
    fn default() -> Self {
        Self {
            res_url: default_res_url(),
            github_proxy: None,
            panel_url: default_panel_url(),
            score_url: default_score_url(),
            font_family: default_font_family(),
        }
    }
}

fn default_res_url() -> String {
    "https://raw.githubusercontent.com/Mar-7th/StarRailRes/master".to_string()
}

fn default_panel_url() -> String {
    "https://api.mihomo.me/sr_info_parsed/".to_string()
}

fn default_score_url() -> String {
    "https://raw.githubusercontent.com/Mar-7th/StarRailScore/master/score.json".to_string()
}

fn default_font_family() -> String {
    "sans-serif".to_string()
}

impl AppConfig {
    pub async fn save(&self, path: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string).await?;
        Ok(())
    }

    pub fn is_superuser(&self, user_id: i64) -> bool {
        self.superusers.contains(&user_id)
    }
}

fn default_prefix() -> Vec<String> {
    vec!["".to_string()]
}

fn default_bots() -> Vec<BotConfig> {
    vec![
        // 控制台适配器：本地调试用
        BotConfig {
            enabled: true,
            protocol: "console".to_string(),
            url: None,
            access_token: None,
        },
        // OneBot 适配器：生成配置占位符，默认禁用以防误连
        BotConfig {
            enabled: false,
            protocol: "onebot".to_string(),
            url: Some("ws://127.0.0.1:3001".to_string()),
            access_token: Some("YOUR_TOKEN_HERE".to_string()),
        },
    ]
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BotConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    // 协议类型 (例如 "onebot")
    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_protocol() -> String {
    "onebot".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_prefix(),
            superusers: Vec::new(),
            mys: MysConfig::default(),
            bots: default_bots(),
            plugins: HashMap::new(),
        }
    }
}

/// 辅助函数：构建默认配置 Value，并确保包含 enabled 字段
pub fn build_config<T: Serialize>(data: T) -> Value {
    let mut val = Value::try_from(data).unwrap_or(Value::Table(Default::default()));
    if let Value::Table(ref mut map) = val
        && !map.contains_key("enabled")
    {
        map.insert("enabled".to_string(), Value::Boolean(true));
    }
    val
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let config = AppConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.bots.len(), 2);
        assert_eq!(parsed.mys.panel_url, "https://api.mihomo.me/sr_info_parsed/");
        assert!(parsed.plugins.is_empty());
    }

    #[test]
    fn missing_sections_fall_back() {
        let parsed: AppConfig = toml::from_str("superusers = [10000]").unwrap();
        assert!(parsed.is_superuser(10000));
        assert!(!parsed.is_superuser(10001));
        assert!(parsed.mys.res_url.contains("StarRailRes"));
    }

    #[test]
    fn build_config_injects_enabled() {
        #[derive(Serialize)]
        struct Dummy {
            limit: u32,
        }
        let val = build_config(Dummy { limit: 3 });
        assert_eq!(val.get("enabled").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(val.get("limit").and_then(|v| v.as_integer()), Some(3));
    }
}
