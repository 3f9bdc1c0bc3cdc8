//! 按客户端划分的对话记忆
//!
//! 所有会话共用一把锁；会话只在锁内被修改，对外只返回历史的副本。

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::translation::config::constants;

/// 一轮对话
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub request: String,
    pub response: String,
}

/// 单个客户端的会话
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub turns: VecDeque<Turn>,
    pub max_len: usize,
}

impl Session {
    fn with_depth(max_len: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_len,
        }
    }

    /// 按当前深度从最旧的一端裁剪
    fn trim_to(&mut self, depth: usize) {
        self.max_len = depth;
        while self.turns.len() > depth {
            self.turns.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// 会话存储
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 取得会话快照，不存在时以当前深度创建空会话
    pub fn get_or_create(&self, client_id: &str, depth: usize) -> Session {
        let mut sessions = self.lock();
        let session = sessions
            .entry(client_id.to_string())
            .or_insert_with(|| Session::with_depth(depth));
        session.trim_to(depth);
        session.clone()
    }

    /// 以当前深度读取历史（最旧在前）
    pub fn history(&self, client_id: &str, depth: usize) -> Vec<Turn> {
        self.get_or_create(client_id, depth).turns.into_iter().collect()
    }

    /// 追加一轮对话，然后按当前深度裁剪
    pub fn append(&self, client_id: &str, request: &str, response: &str, depth: usize) {
        let mut sessions = self.lock();
        let session = sessions
            .entry(client_id.to_string())
            .or_insert_with(|| Session::with_depth(depth));
        session.turns.push_back(Turn {
            request: request.to_string(),
            response: response.to_string(),
        });
        session.trim_to(depth);
    }

    /// 清除所有会话
    pub fn clear_all(&self) {
        self.lock().clear();
    }

    /// 当前会话数
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 由客户端网络地址得到紧凑的会话标识（哈希前缀，接受极低概率的碰撞）
pub fn client_id(address: &str) -> String {
    let hash = blake3::hash(address.as_bytes());
    hash.to_hex()[..constants::CLIENT_ID_LEN].to_string()
}
