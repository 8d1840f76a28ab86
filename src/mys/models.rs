use serde::Deserialize;

// ================= 游戏记录卡片 =================

#[derive(Debug, Deserialize)]
pub struct GameRecordCard {
    #[serde(default)]
    pub list: Vec<GameRecord>,
}

#[derive(Debug, Deserialize)]
pub struct GameRecord {
    pub game_id: i64,
    pub game_role_id: String,
    pub nickname: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub level: i64,
}

// ================= 角色基础信息 =================

#[derive(Debug, Deserialize)]
pub struct RoleBasicInfo {
    pub nickname: String,
    pub level: i64,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub avatar: String,
}

// ================= 角色橱窗 (index) =================

#[derive(Debug, Deserialize)]
pub struct RoleIndex {
    pub stats: RoleStats,
    #[serde(default)]
    pub avatar_list: Vec<AvatarListItem>,
}

#[derive(Debug, Deserialize)]
pub struct RoleStats {
    pub active_days: i64,
    pub avatar_num: i64,
    pub achievement_num: i64,
    pub chest_num: i64,
    #[serde(default)]
    pub abyss_process: String,
}

#[derive(Debug, Deserialize)]
pub struct AvatarListItem {
    pub id: i64,
    pub level: i64,
    pub name: String,
    #[serde(default)]
    pub element: String,
    #[serde(default)]
    pub icon: String,
    pub rarity: i64,
    #[serde(default)]
    pub rank: i64,
}

// ================= 角色详情 (avatar/info) =================

#[derive(Debug, Deserialize)]
pub struct AvatarInfo {
    #[serde(default)]
    pub avatar_list: Vec<AvatarDetail>,
}

#[derive(Debug, Deserialize)]
pub struct AvatarDetail {
    pub id: i64,
    pub equip: Option<Equip>,
}

#[derive(Debug, Deserialize)]
pub struct Equip {
    pub id: i64,
    pub level: i64,
    pub rank: i64,
    pub name: String,
}

// ================= 实时便笺 =================

#[derive(Debug, Deserialize)]
pub struct DailyNote {
    pub current_stamina: i64,
    pub max_stamina: i64,
    pub stamina_recover_time: i64,
    #[serde(default)]
    pub accepted_expedition_num: i64,
    #[serde(default)]
    pub total_expedition_num: i64,
    #[serde(default)]
    pub expeditions: Vec<Expedition>,
}

#[derive(Debug, Deserialize)]
pub struct Expedition {
    #[serde(default)]
    pub avatars: Vec<String>,
    #[serde(default)]
    pub status: String,
    pub remaining_time: i64,
    pub name: String,
}

// ================= 开拓月历 =================

#[derive(Debug, Deserialize)]
pub struct MonthlyAward {
    #[serde(default)]
    pub month: String,
    #[serde(default)]
    pub data_month: String,
    pub month_data: MonthData,
    pub day_data: DayData,
}

#[derive(Debug, Deserialize)]
pub struct MonthData {
    pub current_hcoin: i64,
    pub current_rails_pass: i64,
    pub last_hcoin: i64,
    pub last_rails_pass: i64,
    #[serde(default)]
    pub hcoin_rate: i64,
    #[serde(default)]
    pub rails_rate: i64,
    #[serde(default)]
    pub group_by: Vec<MonthGroup>,
}

#[derive(Debug, Deserialize)]
pub struct MonthGroup {
    pub action: String,
    pub num: i64,
    pub percent: i64,
    pub action_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DayData {
    pub current_hcoin: i64,
    pub current_rails_pass: i64,
    #[serde(default)]
    pub last_hcoin: i64,
    #[serde(default)]
    pub last_rails_pass: i64,
}

// ================= 米游社签到 =================

#[derive(Debug, Deserialize)]
pub struct SignResult {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub risk_code: i64,
    #[serde(default)]
    pub gt: String,
    #[serde(default)]
    pub challenge: String,
    #[serde(default)]
    pub success: i64,
    #[serde(default)]
    pub is_risk: bool,
}

// ================= 扫码登录 =================

#[derive(Debug, Clone)]
pub struct QrLogin {
    pub app_id: u32,
    pub ticket: String,
    pub device: String,
    pub url: String,
}

#[derive(Debug)]
pub enum QrStatus {
    /// 尚未扫描
    Init,
    /// 已扫描，等待确认
    Scanned,
    /// 已确认，携带 uid 与 game_token
    Confirmed { uid: i64, game_token: String },
    /// 二维码已过期
    Expired,
}
