//! 目录监听服务
//!
//! 每个会话按目录分组建立监听：一个 [`DirectoryWatcher`] 非递归地
//! 观察一个目录，只对该组内的文件名做出反应。监听器在会话创建时就
//! 存在；是否真正投递通知由会话的 `track_changes` 标志门控。回调在
//! OS 线程上异步触发，绝不回调进注册表——它只把结构化事件发到
//! [`ChangeBus`](crate::services::change_bus::ChangeBus)。

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::services::change_bus::{ChangeBus, FileChangeEvent};

/// 单个目录组的变更监听器
pub struct DirectoryWatcher {
    directory: PathBuf,
    file_names: BTreeSet<OsString>,
    /// 处置门：`disable` 之后回调立即变为空操作
    enabled: Arc<AtomicBool>,
    /// 保持底层订阅存活
    _watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    /// 建立监听
    ///
    /// # Arguments
    /// * `session_id` - 所属会话
    /// * `directory` - 被观察的目录（非递归）
    /// * `file_names` - 该目录组内跟踪的文件名
    /// * `track_changes` - 会话级投递开关（共享原子标志）
    /// * `bus` - 通知发布目标
    pub fn new(
        session_id: Uuid,
        directory: PathBuf,
        file_names: BTreeSet<OsString>,
        track_changes: Arc<AtomicBool>,
        bus: Arc<ChangeBus>,
    ) -> Result<Self> {
        let enabled = Arc::new(AtomicBool::new(true));

        let callback_enabled = Arc::clone(&enabled);
        let callback_names = file_names.clone();
        let mut watcher = recommended_watcher(move |result: notify::Result<Event>| {
            // 先查处置门，再查会话开关；两者都为真才投递
            if !callback_enabled.load(Ordering::SeqCst) || !track_changes.load(Ordering::SeqCst) {
                return;
            }
            match result {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        return;
                    }
                    for path in event.paths {
                        let tracked = path
                            .file_name()
                            .map(|name| callback_names.contains(name))
                            .unwrap_or(false);
                        if tracked {
                            let _ = bus.publish(FileChangeEvent {
                                session_id,
                                path,
                            });
                        }
                    }
                }
                Err(error) => {
                    warn!(error = %error, "File watcher reported an error");
                }
            }
        })
        .map_err(EngineError::file_watcher)?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(EngineError::file_watcher)?;

        debug!(
            session_id = %session_id,
            directory = %directory.display(),
            files = file_names.len(),
            "Directory watcher registered"
        );

        Ok(Self {
            directory,
            file_names,
            enabled,
            _watcher: watcher,
        })
    }

    /// 停止投递
    ///
    /// 在丢弃监听器之前必须先调用：store 先于 drop 发生，保证不会有
    /// 回调打到已释放的监听器上。
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// 该监听器覆盖的文件名
    pub fn file_names(&self) -> &BTreeSet<OsString> {
        &self.file_names
    }
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("directory", &self.directory)
            .field("file_names", &self.file_names)
            .field("enabled", &self.enabled.load(Ordering::SeqCst))
            .finish()
    }
}
