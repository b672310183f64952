//! CLEF 日志会话引擎
//!
//! 把一组 CLEF 风格的日志文件/目录装进内存中的会话，支持实时的
//! 过滤、排序、分页与聚合查询，并在文件增长时增量地保持会话最新。
//! 传输层（HTTP、IPC 等）是外部协作者：它只需要
//! [`LogSessionProvider`] 这个门面与 [`ChangeBus`] 的订阅端。
//!
//! 典型流程：
//!
//! ```no_run
//! use clef_engine::{LogSessionProvider, SearchLogEventsRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! # fn main() -> clef_engine::Result<()> {
//! let provider = LogSessionProvider::default();
//! let token = CancellationToken::new();
//!
//! let session_id = provider.create_session(&["/var/log/app".to_string()], &token)?;
//! let response = provider.search_events(session_id, &SearchLogEventsRequest::default())?;
//! println!("total: {}", response.counts.total);
//!
//! provider.set_track_changes(session_id, true)?;
//! let mut changes = provider.change_bus().subscribe();
//! # let _ = &mut changes;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod logging;
pub mod models;
pub mod services;

pub use error::{EngineError, Result};
pub use models::{
    EngineConfig, EventCounts, EventFilter, LogEvent, LogFile, LogFiles, LogLevel,
    LogSessionSummary, SearchLogEventsRequest, SearchLogEventsResponse, SortOrder,
};
pub use services::{
    BuiltInNameResolver, ChangeBus, EventPredicate, FileChangeEvent, LogSessionFilterFactory,
    LogSessionProvider, NameResolver,
};
