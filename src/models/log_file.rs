//! 日志文件模型
//!
//! `LogFile` 持有单个文件已解析的事件与字节读取游标；
//! `LogFiles` 是一次导入的结果：原始输入路径加解析出的文件列表。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::models::event::LogEvent;

/// 单个日志文件及其读取进度
///
/// 游标单调不减，只会越过完整解析的记录；`entries` 只追加，
/// 顺序即文件扫描顺序。两者只由增量读取器修改。
#[derive(Debug)]
pub struct LogFile {
    path: PathBuf,
    /// 创建时缓存的所在目录
    directory_path: PathBuf,
    pub entries: Vec<Arc<LogEvent>>,
    read_cursor: u64,
}

impl LogFile {
    pub fn new(path: PathBuf) -> Self {
        let directory_path = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(PathBuf::new);
        Self {
            path,
            directory_path,
            entries: Vec::new(),
            read_cursor: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn directory_path(&self) -> &Path {
        &self.directory_path
    }

    /// 已消费的字节偏移（紧随最后一条完整解析记录之后）
    pub fn read_cursor(&self) -> u64 {
        self.read_cursor
    }

    /// 提交一次读取：追加事件并推进游标
    ///
    /// 读取器要么整体提交，要么（取消时）完全不提交。
    pub(crate) fn commit_read(&mut self, events: Vec<Arc<LogEvent>>, cursor: u64) {
        debug_assert!(cursor >= self.read_cursor, "read cursor must not move backwards");
        self.entries.extend(events);
        self.read_cursor = cursor;
    }
}

/// 一次导入的全部文件
#[derive(Debug)]
pub struct LogFiles {
    /// 调用方传入的原始路径（文件或目录），用于会话摘要
    pub paths: Vec<String>,
    pub files: Vec<LogFile>,
}

impl LogFiles {
    pub fn new(paths: Vec<String>, files: Vec<LogFile>) -> Self {
        Self { paths, files }
    }

    /// 所有文件的事件总数
    pub fn total_entry_count(&self) -> usize {
        self.files.iter().map(|file| file.entries.len()).sum()
    }
}
