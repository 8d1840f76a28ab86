use rand::Rng;

// 游戏记录接口使用的 Web 盐值
const SALT_WEB: &str = "xV8v4Qu54lUKrEYFZkJhB8cuOh9Asafs";
// 米游社签到接口使用的盐值
const SALT_SIGN: &str = "t0qEgfub6cvueAPgR5m9aQWWVciEer7v";

fn md5_hex(text: &str) -> String {
    format!("{:x}", md5::compute(text.as_bytes()))
}

/// 生成米游社请求头的 DS Token
///
/// 返回格式: "{t},{r},{c}"，其中 c = md5("salt={s}&t={t}&r={r}&b={b}&q={q}")
pub fn ds_token(query: &str, body: Option<&str>, sign: bool) -> String {
    let salt = if sign { SALT_SIGN } else { SALT_WEB };
    let t = chrono::Utc::now().timestamp();
    let r = rand::rng().random_range(100000..=200000);
    make_ds(salt, t, r, query, body.unwrap_or(""))
}

fn make_ds(salt: &str, t: i64, r: i64, query: &str, body: &str) -> String {
    let c = md5_hex(&format!("salt={salt}&t={t}&r={r}&b={body}&q={query}"));
    format!("{t},{r},{c}")
}

/// 生成指定长度的随机 16 进制字符串（小写）
pub fn random_hex_lower(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let n: u8 = rng.random_range(0..16);
            char::from_digit(n as u32, 16).unwrap()
        })
        .collect()
}

/// 生成新的设备 ID
pub fn new_device_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ds_checksum_matches_known_vector() {
        // md5("salt=xV8v4Qu54lUKrEYFZkJhB8cuOh9Asafs&t=1700000000&r=123456&b=&q=uid=1")
        let ds = make_ds(super::SALT_WEB, 1700000000, 123456, "uid=1", "");
        let parts: Vec<&str> = ds.split(',').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "1700000000");
        assert_eq!(parts[1], "123456");
        assert_eq!(
            parts[2],
            md5_hex("salt=xV8v4Qu54lUKrEYFZkJhB8cuOh9Asafs&t=1700000000&r=123456&b=&q=uid=1")
        );
    }

    #[test]
    fn ds_token_shape() {
        let ds = ds_token("role_id=100000001&server=prod_gf_cn", None, false);
        let parts: Vec<&str> = ds.split(',').collect();
        assert_eq!(parts.len(), 3);
        let r: i64 = parts[1].parse().unwrap();
        assert!((100000..=200000).contains(&r));
        assert_eq!(parts[2].len(), 32);
    }

    #[test]
    fn random_hex_has_requested_length() {
        let s = random_hex_lower(13);
        assert_eq!(s.len(), 13);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(s, s.to_lowercase());
    }

    #[test]
    fn device_id_is_uuid() {
        let id = new_device_id();
        assert_eq!(id.len(), 36);
        assert_eq!(id.matches('-').count(), 4);
    }
}
