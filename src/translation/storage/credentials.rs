//! API 密钥轮换

use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct CredentialPool {
    keys: Vec<String>,
    cursor: usize,
}

/// 轮询发放 API 密钥，池的更新与发放共用同一把锁
#[derive(Debug, Default)]
pub struct CredentialRotator {
    pool: Mutex<CredentialPool>,
}

impl CredentialRotator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由逗号分隔的密钥串创建
    pub fn from_config(raw: &str) -> Self {
        let rotator = Self::new();
        rotator.reload(raw);
        rotator
    }

    fn lock(&self) -> MutexGuard<'_, CredentialPool> {
        self.pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 重新解析密钥池，游标归零
    pub fn reload(&self, raw: &str) {
        let keys = parse_keys(raw);
        let mut pool = self.lock();
        pool.keys = keys;
        pool.cursor = 0;
    }

    /// 发放下一个密钥；池为空时返回 None
    pub fn next(&self) -> Option<String> {
        let mut pool = self.lock();
        if pool.keys.is_empty() {
            return None;
        }
        let key = pool.keys[pool.cursor].clone();
        pool.cursor = (pool.cursor + 1) % pool.keys.len();
        Some(key)
    }

    pub fn len(&self) -> usize {
        self.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 解析逗号分隔的密钥，去掉空白与空项
pub fn parse_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

/// 日志中显示的密钥摘要
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
