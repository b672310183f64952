//! 会话注册表
//!
//! 进程级的会话生命周期所有者：从路径创建会话、列举、查询、切换
//! 变更跟踪、按文件重载、删除。注册表是 `DashMap`，每个会话条目再
//! 用自己的锁串行化同会话的导入与查询——不同会话互不竞争，同一会
//! 话上读 `entries` 与追加写不可能交错。

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::models::config::EngineConfig;
use crate::models::log_file::LogFiles;
use crate::models::search::{
    LogSessionSummary, SearchLogEventsRequest, SearchLogEventsResponse,
};
use crate::services::change_bus::ChangeBus;
use crate::services::file_reader;
use crate::services::file_watcher::DirectoryWatcher;
use crate::services::filter::{LogSessionFilterFactory, NameResolver};
use crate::services::query;

/// 单个会话：文件、监听器与跟踪开关
///
/// `files` 的锁同时守护导入与查询；`watchers` 只在创建与删除时碰。
pub struct LogSession {
    id: Uuid,
    files: Mutex<LogFiles>,
    watchers: Mutex<Vec<DirectoryWatcher>>,
    /// 投递开关，默认关闭；监听器回调共享同一个原子标志
    track_changes: Arc<AtomicBool>,
}

impl LogSession {
    /// 每个不同目录一个监听器（供测试与诊断检视）
    pub fn watcher_count(&self) -> usize {
        self.watchers.lock().len()
    }

    /// 某目录监听器覆盖的文件名集合
    pub fn watched_file_names(&self, directory: &std::path::Path) -> Option<BTreeSet<OsString>> {
        self.watchers
            .lock()
            .iter()
            .find(|watcher| watcher.directory() == directory)
            .map(|watcher| watcher.file_names().clone())
    }

    pub fn is_tracking_changes(&self) -> bool {
        self.track_changes.load(Ordering::SeqCst)
    }
}

/// 会话提供者：注册表加引擎操作的门面
pub struct LogSessionProvider {
    sessions: DashMap<Uuid, Arc<LogSession>>,
    filter_factory: LogSessionFilterFactory,
    change_bus: Arc<ChangeBus>,
    config: EngineConfig,
}

impl LogSessionProvider {
    pub fn new(config: EngineConfig) -> Self {
        let change_bus = Arc::new(ChangeBus::new(config.change_bus_capacity));
        Self {
            sessions: DashMap::new(),
            filter_factory: LogSessionFilterFactory::default(),
            change_bus,
            config,
        }
    }

    /// 注入自定义标识符解析器（表达式语法的窄接口）
    pub fn with_resolver(config: EngineConfig, resolver: Arc<dyn NameResolver>) -> Self {
        let change_bus = Arc::new(ChangeBus::new(config.change_bus_capacity));
        Self {
            sessions: DashMap::new(),
            filter_factory: LogSessionFilterFactory::new(resolver),
            change_bus,
            config,
        }
    }

    /// 变更通知的订阅入口（交给传输层）
    pub fn change_bus(&self) -> Arc<ChangeBus> {
        Arc::clone(&self.change_bus)
    }

    /// 从路径导入并建立新会话
    pub fn create_session(&self, paths: &[String], token: &CancellationToken) -> Result<Uuid> {
        let log_files =
            file_reader::read_log_files(paths, &self.config.allowed_extensions, token)?;
        self.add_session(log_files)
    }

    /// 注册已导入的文件为新会话，并按目录建立监听器
    ///
    /// 监听器立即存在，但投递开关默认关闭：通知只在
    /// `set_track_changes(id, true)` 之后流动。
    pub fn add_session(&self, log_files: LogFiles) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let track_changes = Arc::new(AtomicBool::new(false));

        // 按所在目录分组，每组一个监听器，恰好覆盖该组文件名
        let mut groups: BTreeMap<PathBuf, BTreeSet<OsString>> = BTreeMap::new();
        for file in &log_files.files {
            if let Some(name) = file.path().file_name() {
                groups
                    .entry(file.directory_path().to_path_buf())
                    .or_default()
                    .insert(name.to_os_string());
            }
        }

        let mut watchers = Vec::with_capacity(groups.len());
        for (directory, file_names) in groups {
            watchers.push(DirectoryWatcher::new(
                id,
                directory,
                file_names,
                Arc::clone(&track_changes),
                Arc::clone(&self.change_bus),
            )?);
        }

        info!(
            session_id = %id,
            files = log_files.files.len(),
            watchers = watchers.len(),
            "Session created"
        );

        let session = Arc::new(LogSession {
            id,
            files: Mutex::new(log_files),
            watchers: Mutex::new(watchers),
            track_changes,
        });
        self.sessions.insert(id, session);
        Ok(id)
    }

    /// 取会话；不存在返回 NotFound
    pub fn get_session(&self, session_id: Uuid) -> Result<Arc<LogSession>> {
        self.sessions
            .get(&session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| EngineError::not_found("Session", session_id))
    }

    /// 会话摘要列表
    pub fn list_sessions(&self) -> Vec<LogSessionSummary> {
        self.sessions
            .iter()
            .map(|entry| {
                let session = entry.value();
                let files = session.files.lock();
                LogSessionSummary {
                    id: session.id,
                    event_count: files.total_entry_count(),
                    paths: files.paths.clone(),
                }
            })
            .collect()
    }

    /// 切换变更通知投递；监听器原地保留，不做重建
    pub fn set_track_changes(&self, session_id: Uuid, enabled: bool) -> Result<()> {
        let session = self.get_session(session_id)?;
        session.track_changes.store(enabled, Ordering::SeqCst);
        debug!(session_id = %session_id, enabled, "Change tracking toggled");
        Ok(())
    }

    /// 对会话中指定的文件重新执行增量读取
    ///
    /// 不属于会话的路径静默忽略。持有会话锁期间执行，与同会话查询
    /// 串行。
    pub fn reload(
        &self,
        session_id: Uuid,
        paths: &[String],
        token: &CancellationToken,
    ) -> Result<()> {
        let session = self.get_session(session_id)?;
        let requested: HashSet<PathBuf> = paths.iter().map(PathBuf::from).collect();

        let mut files = session.files.lock();
        for file in files
            .files
            .iter_mut()
            .filter(|file| requested.contains(file.path()))
        {
            file_reader::add_log_entries(file, token)?;
        }
        Ok(())
    }

    /// 删除会话
    ///
    /// 先从注册表摘除（之后的请求立即 NotFound），随后的顺序是契约：
    /// 关掉每个监听器的投递（store 先行发生），再丢弃监听器，最后清
    /// 空事件。删除进行中即便有通知在途也不会打到已释放的监听器。
    /// 重复删除返回 NotFound，不崩溃。
    pub fn delete_session(&self, session_id: Uuid) -> Result<()> {
        let (_, session) = self
            .sessions
            .remove(&session_id)
            .ok_or_else(|| EngineError::not_found("Session", session_id))?;

        {
            let mut watchers = session.watchers.lock();
            for watcher in watchers.iter() {
                watcher.disable();
            }
            watchers.clear();
        }

        let mut files = session.files.lock();
        for file in files.files.iter_mut() {
            file.entries.clear();
        }

        info!(session_id = %session_id, "Session deleted");
        Ok(())
    }

    /// 查询一页事件与全集计数
    pub fn search_events(
        &self,
        session_id: Uuid,
        request: &SearchLogEventsRequest,
    ) -> Result<SearchLogEventsResponse> {
        if request.page_number < 1 {
            return Err(EngineError::validation_error("pageNumber must be >= 1"));
        }
        if request.page_size < 1 {
            return Err(EngineError::validation_error("pageSize must be > 0"));
        }

        let session = self.get_session(session_id)?;
        let predicate = self
            .filter_factory
            .try_create_filter(request.expression.as_deref(), request.filters.as_deref());

        let files = session.files.lock();
        let (events, counts) = query::run_query(
            files
                .files
                .iter()
                .flat_map(|file| file.entries.iter().cloned()),
            predicate.as_ref(),
            request,
        );

        debug!(
            session_id = %session_id,
            page = request.page_number,
            returned = events.len(),
            total = counts.total,
            "Search executed"
        );
        Ok(SearchLogEventsResponse { events, counts })
    }
}

impl Default for LogSessionProvider {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
