use anyhow::{Result, anyhow};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{OnceLock, RwLock};
use std::time::Duration;
use tokio::fs;

use crate::config::MysConfig;
use crate::{debug, error, info, warn};

const VERSION_FILE: &str = "info.json";

// 需要同步的索引文件（index_min/cn 下）
const INDEX_FILES: &[&str] = &[
    "characters",
    "light_cones",
    "relic_sets",
    "elements",
    "nickname",
];

// ================= 索引模型 =================

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CharacterMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rarity: i64,
    #[serde(default)]
    pub element: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub preview: String,
    #[serde(default)]
    pub portrait: String,
    #[serde(default)]
    pub guide_overview: Vec<String>,
    #[serde(default)]
    pub guide_material: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LightConeMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rarity: i64,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub guide_overview: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RelicSetMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub guide_overview: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ElementMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Default)]
pub struct ResIndex {
    pub characters: HashMap<String, CharacterMeta>,
    pub light_cones: HashMap<String, LightConeMeta>,
    pub relic_sets: HashMap<String, RelicSetMeta>,
    pub elements: HashMap<String, ElementMeta>,
}

// ================= 资源站 =================

pub struct StarRailRes {
    client: reqwest::Client,
    data_dir: PathBuf,
    res_url: String,
    github_proxy: Option<String>,
    index: RwLock<ResIndex>,
    nickname_rev: RwLock<HashMap<String, String>>,
}

static RES: OnceLock<StarRailRes> = OnceLock::new();

/// 启动时构建全局资源站并尝试同步索引。
/// 同步失败只记录日志，不阻止启动（本地缓存仍可用）。
pub async fn init(config: &MysConfig) -> Result<()> {
    let res = StarRailRes::new(config)?;
    res.reload().await;
    if !res.update().await {
        error!(target: "StarRailRes", "索引同步失败，请检查网络连接与配置");
    }
    RES.set(res)
        .map_err(|_| anyhow!("StarRailRes 已经初始化"))?;
    Ok(())
}

pub fn get() -> &'static StarRailRes {
    RES.get().expect("res::init 未调用")
}

impl StarRailRes {
    pub fn new(config: &MysConfig) -> Result<Self> {
        // 手动处理 302 跳转，禁用自动重定向
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            data_dir: PathBuf::from("data/srres"),
            res_url: config.res_url.trim_end_matches('/').to_string(),
            github_proxy: config
                .github_proxy
                .clone()
                .filter(|p| !p.trim().is_empty()),
            index: RwLock::new(ResIndex::default()),
            nickname_rev: RwLock::new(HashMap::new()),
        })
    }

    pub fn proxy_url(&self, url: &str) -> String {
        match &self.github_proxy {
            Some(proxy) => format!("{}/{}", proxy.trim_end_matches('/'), url),
            None => url.to_string(),
        }
    }

    fn res_file_url(&self, file: &str) -> String {
        self.proxy_url(&format!("{}/{}", self.res_url, file))
    }

    /// 下载文件，最多尝试 3 次，302 时跟随 location
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let mut url = url.to_string();
        for attempt in 1..=3u32 {
            let result = self.client.get(&url).send().await;
            match result {
                Ok(resp) => {
                    if resp.status() == reqwest::StatusCode::FOUND {
                        if let Some(location) =
                            resp.headers().get("location").and_then(|v| v.to_str().ok())
                        {
                            url = location.to_string();
                            continue;
                        }
                    }
                    if resp.status().is_success() {
                        return Ok(resp.bytes().await?.to_vec());
                    }
                    warn!(target: "StarRailRes", "下载 {} 失败 ({}/3): HTTP {}", url, attempt, resp.status());
                }
                Err(e) => {
                    warn!(target: "StarRailRes", "下载 {} 失败 ({}/3): {}", url, attempt, e);
                }
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        Err(anyhow!("下载 {url} 失败，已放弃"))
    }

    /// 确保资源文件已缓存到本地，返回本地路径
    pub async fn cache(&self, file: &str) -> Option<PathBuf> {
        self.cache_inner(file, false).await
    }

    async fn cache_inner(&self, file: &str, refresh: bool) -> Option<PathBuf> {
        let path = self.data_dir.join(file);
        if path.exists() && !refresh {
            return Some(path);
        }
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent).await;
        }
        debug!(target: "StarRailRes", "Downloading {}...", file);
        match self.download(&self.res_file_url(file)).await {
            Ok(data) => {
                if let Err(e) = fs::write(&path, data).await {
                    error!(target: "StarRailRes", "写入 {} 失败: {}", file, e);
                    return None;
                }
                Some(path)
            }
            Err(e) => {
                error!(target: "StarRailRes", "{}", e);
                None
            }
        }
    }

    /// 检查版本并同步索引文件
    pub async fn update(&self) -> bool {
        let version_data = match self.download(&self.res_file_url(VERSION_FILE)).await {
            Ok(data) => data,
            Err(e) => {
                error!(target: "StarRailRes", "文件 {} 下载失败: {}", VERSION_FILE, e);
                return false;
            }
        };

        let version_path = self.data_dir.join(VERSION_FILE);
        let mut update_index = !version_path.exists();
        if !update_index {
            let local: Option<serde_json::Value> = fs::read(&version_path)
                .await
                .ok()
                .and_then(|data| serde_json::from_slice(&data).ok());
            let remote: Option<serde_json::Value> = serde_json::from_slice(&version_data).ok();
            let local_ts = local.as_ref().and_then(|v| v["timestamp"].as_i64());
            let remote_ts = remote.as_ref().and_then(|v| v["timestamp"].as_i64());
            if local_ts != remote_ts {
                update_index = true;
            }
        }

        let _ = fs::create_dir_all(&self.data_dir).await;
        if let Err(e) = fs::write(&version_path, &version_data).await {
            error!(target: "StarRailRes", "写入版本文件失败: {}", e);
        }

        debug!(target: "StarRailRes", "正在检查索引文件是否完整");
        let mut status = true;
        for name in INDEX_FILES {
            let file = format!("index/{name}.json");
            let exists = self.data_dir.join(&file).exists();
            if exists && !update_index {
                continue;
            }
            debug!(target: "StarRailRes", "正在下载索引 {}.json...", name);
            let url = self.res_file_url(&format!("index_min/cn/{name}.json"));
            match self.download(&url).await {
                Ok(data) => {
                    let path = self.data_dir.join(&file);
                    if let Some(parent) = path.parent() {
                        let _ = fs::create_dir_all(parent).await;
                    }
                    if let Err(e) = fs::write(&path, data).await {
                        error!(target: "StarRailRes", "写入索引 {} 失败: {}", name, e);
                        status = false;
                    }
                }
                Err(e) => {
                    error!(target: "StarRailRes", "文件 {}.json 下载失败: {}", name, e);
                    status = false;
                }
            }
        }
        info!(target: "StarRailRes", "索引文件检查完毕");

        if status {
            self.reload().await;
        }
        status
    }

    async fn load_index_file<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        let path = self.data_dir.join(format!("index/{name}.json"));
        match fs::read(&path).await {
            Ok(data) => serde_json::from_slice(&data).unwrap_or_else(|e| {
                warn!(target: "StarRailRes", "索引 {} 解析失败: {}", name, e);
                T::default()
            }),
            Err(_) => T::default(),
        }
    }

    /// 从磁盘重新装载索引
    pub async fn reload(&self) {
        let characters = self.load_index_file("characters").await;
        let light_cones = self.load_index_file("light_cones").await;
        let relic_sets = self.load_index_file("relic_sets").await;
        let elements = self.load_index_file("elements").await;
        let nickname: serde_json::Value = self.load_index_file("nickname").await;

        let new_index = ResIndex {
            characters,
            light_cones,
            relic_sets,
            elements,
        };

        let rev = build_nickname_rev(&nickname, &new_index);

        *self.index.write().unwrap() = new_index;
        *self.nickname_rev.write().unwrap() = rev;
    }

    // ================= 查询接口 =================

    pub fn character(&self, id: &str) -> Option<CharacterMeta> {
        self.index.read().unwrap().characters.get(id).cloned()
    }

    pub fn light_cone(&self, id: &str) -> Option<LightConeMeta> {
        self.index.read().unwrap().light_cones.get(id).cloned()
    }

    pub fn relic_set(&self, id: &str) -> Option<RelicSetMeta> {
        self.index.read().unwrap().relic_sets.get(id).cloned()
    }

    pub fn element(&self, id: &str) -> Option<ElementMeta> {
        // 索引键为首字母大写的元素名
        let key = capitalize(id);
        self.index.read().unwrap().elements.get(&key).cloned()
    }

    /// 别名 -> 资源 ID
    pub fn nickname_to_id(&self, name: &str) -> Option<String> {
        let cleaned: String = name
            .chars()
            .filter(|c| !"「」！&".contains(*c))
            .collect();
        self.nickname_rev.read().unwrap().get(&cleaned).cloned()
    }

    /// 角色/光锥/遗器套装图标（按 ID 自动分派）
    pub async fn icon(&self, id: &str) -> Option<PathBuf> {
        // 开拓者的 8000 归一 ID 使用 8002 的图标
        let id = if id == "8000" { "8002" } else { id };
        let file = if let Some(c) = self.character(id) {
            c.icon
        } else if let Some(lc) = self.light_cone(id) {
            lc.icon
        } else if let Some(rs) = self.relic_set(id) {
            rs.icon
        } else {
            return None;
        };
        if file.is_empty() {
            return None;
        }
        self.cache(&file).await
    }

    pub async fn element_icon(&self, id: &str) -> Option<PathBuf> {
        let meta = self.element(id)?;
        if meta.icon.is_empty() {
            return None;
        }
        self.cache(&meta.icon).await
    }

    pub async fn character_preview(&self, id: &str) -> Option<PathBuf> {
        let id = if id == "8000" { "8002" } else { id };
        let meta = self.character(id)?;
        if meta.preview.is_empty() {
            return None;
        }
        self.cache(&meta.preview).await
    }

    /// 攻略图 (角色总览 / 角色材料 / 光锥 / 遗器套装)
    pub async fn guide(&self, id: &str, kind: GuideKind) -> Option<PathBuf> {
        let id = if id == "8000" { "8002" } else { id };
        let file = {
            let index = self.index.read().unwrap();
            match kind {
                GuideKind::CharacterOverview => index
                    .characters
                    .get(id)
                    .and_then(|c| c.guide_overview.first().cloned()),
                GuideKind::CharacterMaterial => index
                    .characters
                    .get(id)
                    .and_then(|c| c.guide_material.first().cloned()),
                GuideKind::LightCone => index
                    .light_cones
                    .get(id)
                    .and_then(|c| c.guide_overview.first().cloned()),
                GuideKind::RelicSet => index
                    .relic_sets
                    .get(id)
                    .and_then(|c| c.guide_overview.first().cloned()),
            }
        }?;
        self.cache(&file).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideKind {
    CharacterOverview,
    CharacterMaterial,
    LightCone,
    RelicSet,
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// 由 nickname 索引和正式名称构建 别名 -> ID 反查表
fn build_nickname_rev(nickname: &serde_json::Value, index: &ResIndex) -> HashMap<String, String> {
    let mut rev = HashMap::new();
    for group in ["characters", "light_cones", "relic_sets"] {
        if let Some(map) = nickname.get(group).and_then(|v| v.as_object()) {
            for (id, aliases) in map {
                if let Some(list) = aliases.as_array() {
                    for alias in list {
                        if let Some(alias) = alias.as_str() {
                            rev.insert(alias.to_string(), id.clone());
                        }
                    }
                }
            }
        }
    }
    // 正式名称同样可以反查
    for (id, c) in &index.characters {
        if !c.name.is_empty() {
            rev.entry(c.name.clone()).or_insert_with(|| id.clone());
        }
    }
    for (id, lc) in &index.light_cones {
        if !lc.name.is_empty() {
            rev.entry(lc.name.clone()).or_insert_with(|| id.clone());
        }
    }
    rev
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> ResIndex {
        let mut characters = HashMap::new();
        characters.insert(
            "1001".to_string(),
            CharacterMeta {
                name: "三月七".to_string(),
                rarity: 4,
                element: "Ice".to_string(),
                ..Default::default()
            },
        );
        let mut light_cones = HashMap::new();
        light_cones.insert(
            "23000".to_string(),
            LightConeMeta {
                name: "银河铁道之夜".to_string(),
                rarity: 5,
                ..Default::default()
            },
        );
        ResIndex {
            characters,
            light_cones,
            ..Default::default()
        }
    }

    #[test]
    fn nickname_rev_covers_aliases_and_names() {
        let nickname = serde_json::json!({
            "characters": { "1001": ["三月", "小三月"] },
            "light_cones": {},
        });
        let rev = build_nickname_rev(&nickname, &sample_index());
        assert_eq!(rev.get("三月"), Some(&"1001".to_string()));
        assert_eq!(rev.get("小三月"), Some(&"1001".to_string()));
        assert_eq!(rev.get("三月七"), Some(&"1001".to_string()));
        assert_eq!(rev.get("银河铁道之夜"), Some(&"23000".to_string()));
        assert_eq!(rev.get("不存在"), None);
    }

    #[test]
    fn capitalize_element_key() {
        assert_eq!(capitalize("ice"), "Ice");
        assert_eq!(capitalize("Ice"), "Ice");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn character_index_parses_minimal_json() {
        let json = r#"{
            "1001": {"name": "三月七", "rarity": 4, "element": "Ice",
                     "path": "Preservation", "icon": "icon/character/1001.png"}
        }"#;
        let parsed: HashMap<String, CharacterMeta> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed["1001"].name, "三月七");
        assert_eq!(parsed["1001"].icon, "icon/character/1001.png");
        assert!(parsed["1001"].guide_overview.is_empty());
    }
}
