//! 变更通知总线 - 使用 tokio::sync::broadcast 实现
//!
//! 目录监听器把 `(sessionId, path)` 结构化事件发到这里，传输层订阅
//! 后推送给前端。投递是尽力而为的：没有订阅者不算错误，同一批写入
//! 触发的重复/合并通知也可以容忍——消费方总是从游标起重读全部新增
//! 内容，通知次数不影响结果。

use eyre::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 文件变更事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChangeEvent {
    pub session_id: Uuid,
    pub path: PathBuf,
}

/// 变更事件总线
pub struct ChangeBus {
    sender: broadcast::Sender<FileChangeEvent>,
    /// 保留一个接收器以防止通道关闭
    _receiver: broadcast::Receiver<FileChangeEvent>,
}

impl ChangeBus {
    /// 创建新的总线
    ///
    /// # Arguments
    /// * `capacity` - 通道容量
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = broadcast::channel(capacity);
        info!("ChangeBus initialized with capacity: {}", capacity);

        Self {
            sender,
            _receiver: receiver,
        }
    }

    /// 发布事件到所有订阅者
    ///
    /// # Returns
    /// 成功时返回接收到事件的订阅者数量
    pub fn publish(&self, event: FileChangeEvent) -> Result<usize> {
        match self.sender.send(event.clone()) {
            Ok(count) => {
                debug!("Change event published to {} subscribers: {:?}", count, event);
                Ok(count)
            }
            Err(e) => {
                warn!("Failed to publish change event (no active subscribers): {:?}", e);
                Ok(0) // 没有订阅者不算错误
            }
        }
    }

    /// 订阅变更事件
    pub fn subscribe(&self) -> broadcast::Receiver<FileChangeEvent> {
        let receiver = self.sender.subscribe();
        debug!("New subscriber added to ChangeBus");
        receiver
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
