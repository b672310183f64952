//! 文件读取服务：路径解析与增量读取
//!
//! 提供两层能力：
//! - 把文件/目录混合输入展开为去重、有序的文件集合
//! - 从每个文件的字节游标处继续读取，只解析新追加的内容
//!
//! 游标只越过完整解析的记录；取消或遇到坏行都不会让游标落在
//! 记录中间。

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{EngineError, Result};
use crate::models::log_file::{LogFile, LogFiles};
use crate::services::clef;

/// 读取缓冲区大小 - 针对大文件使用 64KB 缓冲
const READ_BUFFER_CAPACITY: usize = 64 * 1024;

/// 展开输入路径
///
/// 存在的普通文件原样保留（不检查扩展名）；存在的目录展开为其直接
/// 子文件中扩展名在 `allowed_extensions` 内的那些，按路径字典序排序。
/// 结果为去重后的并集：先文件、后目录展开，顺序确定。不存在的输入
/// 静默丢弃。
pub fn resolve_paths(paths: &[String], allowed_extensions: &[String]) -> Vec<PathBuf> {
    let mut resolved = Vec::new();
    let mut seen = HashSet::new();

    for raw in paths {
        let path = PathBuf::from(raw);
        if path.is_file() && seen.insert(path.clone()) {
            resolved.push(path);
        }
    }

    for raw in paths {
        let directory = PathBuf::from(raw);
        if !directory.is_dir() {
            continue;
        }
        let mut children: Vec<PathBuf> = WalkDir::new(&directory)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| has_allowed_extension(path, allowed_extensions))
            .collect();
        children.sort();
        for child in children {
            if seen.insert(child.clone()) {
                resolved.push(child);
            }
        }
    }

    resolved
}

fn has_allowed_extension(path: &Path, allowed_extensions: &[String]) -> bool {
    match path.extension().and_then(OsStr::to_str) {
        Some(extension) => allowed_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.') == extension),
        None => false,
    }
}

/// 导入：解析路径，为每个文件建立零游标的 [`LogFile`] 并做首次读取
pub fn read_log_files(
    paths: &[String],
    allowed_extensions: &[String],
    token: &CancellationToken,
) -> Result<LogFiles> {
    let mut files = Vec::new();
    for path in resolve_paths(paths, allowed_extensions) {
        if token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let mut file = LogFile::new(path);
        add_log_entries(&mut file, token)?;
        files.push(file);
    }
    Ok(LogFiles::new(paths.to_vec(), files))
}

/// 增量读取：从游标处消费到文件末尾
///
/// 新事件追加到 `entries`，游标推进到最后一条完整解析记录之后。
/// 没有新字节时是精确的空操作。坏行让本次读取停在最后一条好记录
/// 的边界上（坏行之前的事件保留，游标指向坏行起点，修复后重试即可
/// 续读）。取消则丢弃全部部分进度，游标与事件保持原样。
pub fn add_log_entries(log_file: &mut LogFile, token: &CancellationToken) -> Result<()> {
    let mut file = File::open(log_file.path())?;
    let file_size = file.metadata()?.len();
    let start = log_file.read_cursor();

    if file_size < start {
        // 游标单调不减：截断后的文件要等重新长过游标才可见
        warn!(
            file = %log_file.path().display(),
            cursor = start,
            size = file_size,
            "File shrank below the read cursor, waiting for it to grow past it"
        );
        return Ok(());
    }
    if file_size == start {
        return Ok(());
    }

    file.seek(SeekFrom::Start(start))?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_CAPACITY, file);

    let mut parsed = Vec::new();
    let mut cursor = start;
    let mut buf = Vec::new();
    loop {
        if token.is_cancelled() {
            // 部分进度整体丢弃，游标保持不变
            return Err(EngineError::Cancelled);
        }
        buf.clear();
        let consumed = reader.read_until(b'\n', &mut buf)?;
        if consumed == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_matches(['\r', '\n', ' ', '\t']);
        if line.is_empty() {
            cursor += consumed as u64;
            continue;
        }
        match clef::parse_line(line) {
            Ok(event) => {
                parsed.push(std::sync::Arc::new(event));
                cursor += consumed as u64;
            }
            Err(error) => {
                warn!(
                    file = %log_file.path().display(),
                    offset = cursor,
                    error = %error,
                    "Malformed log record, halting read at last good record boundary"
                );
                break;
            }
        }
    }

    debug!(
        file = %log_file.path().display(),
        entries_read = parsed.len(),
        offset_start = start,
        offset_end = cursor,
        "Read new entries from file"
    );
    log_file.commit_read(parsed, cursor);
    Ok(())
}
