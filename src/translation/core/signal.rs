//! 进程级停止信号

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::translation::config::constants;

/// 所有在途请求共享的停止标志
///
/// 克隆得到的是同一个标志。
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// 轮询直到信号被触发
    pub async fn cancelled(&self) {
        while !self.is_raised() {
            sleep(constants::CANCEL_POLL_INTERVAL).await;
        }
    }

    /// 分片睡眠 `total`，每片之间检查信号
    ///
    /// 完整睡完返回 `true`，被打断返回 `false`。
    pub async fn sleep(&self, total: Duration, slice: Duration) -> bool {
        let deadline = Instant::now() + total;
        let slice = slice.max(Duration::from_millis(1));

        loop {
            if self.is_raised() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            sleep(slice.min(deadline - now)).await;
        }
    }
}
