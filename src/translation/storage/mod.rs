//! 存储管理模块
//!
//! 进程内共享、由互斥锁保护的状态：密钥池与对话记忆。

pub mod credentials;
pub mod session;

pub use credentials::CredentialRotator;
pub use session::{client_id, Session, SessionStore, Turn};
