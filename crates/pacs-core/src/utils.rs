//! 通用工具函数

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// 生成唯一的DICOM标识符
pub fn generate_dicom_uid() -> String {
    format!(
        "{}.{}.{}",
        "1.2.826.0.1.3680043.9.7382", // 企业根标识符
        Uuid::new_v4().as_u128(),
        Utc::now().timestamp()
    )
}

/// 验证DICOM UID格式
pub fn is_valid_dicom_uid(uid: &str) -> bool {
    !uid.is_empty()
        && uid.len() <= 64
        && uid.chars().all(|c| c.is_ascii_digit() || c == '.')
        && !uid.starts_with('.')
        && !uid.ends_with('.')
        && !uid.contains("..")
}

/// 验证AE Title：1-16个字符，不含反斜杠和控制字符，不能全为空格
pub fn is_valid_ae_title(ae_title: &str) -> bool {
    let trimmed = ae_title.trim();
    !trimmed.is_empty()
        && ae_title.len() <= 16
        && ae_title.chars().all(|c| c != '\\' && !c.is_control())
}

/// 下一个更新时间戳，保证严格晚于上一次
pub fn next_update_time(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}
