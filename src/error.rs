use miette::Diagnostic;
use thiserror::Error;

/**
 * 引擎错误类型 - 使用 miette 提供用户友好的错误诊断
 *
 * 这个枚举用于跨越引擎边界的错误；`NotFound` 和 `Cancelled` 会原样
 * 传播给调用方，`MalformedRecord` 在读取器内部被吸收（停在最后一条
 * 完整记录的边界上）。
 */
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error("IO error: {0}")]
    #[diagnostic(code(engine::io_error))]
    Io(#[from] std::io::Error),

    #[error("{entity} with key {key} was not found")]
    #[diagnostic(code(engine::not_found))]
    NotFound { entity: String, key: String },

    #[error("Malformed log record: {0}")]
    #[diagnostic(
        code(engine::malformed_record),
        help("The line is not a valid CLEF record; reading stops at the last good record until the file is repaired")
    )]
    MalformedRecord(String),

    #[error("Operation was cancelled")]
    #[diagnostic(code(engine::cancelled))]
    Cancelled,

    #[error("File watcher error: {0}")]
    #[diagnostic(code(engine::file_watcher_error))]
    FileWatcher(String),

    #[error("Validation error: {0}")]
    #[diagnostic(
        code(engine::validation_error),
        help("Check that your request meets the required format and constraints")
    )]
    Validation(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(engine::config_error))]
    Config(String),
}

impl EngineError {
    /**
     * 创建未找到错误
     */
    pub fn not_found(entity: impl Into<String>, key: impl ToString) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            key: key.to_string(),
        }
    }

    /**
     * 创建记录解析错误
     */
    pub fn malformed_record(message: impl Into<String>) -> Self {
        EngineError::MalformedRecord(message.into())
    }

    /**
     * 创建文件监听错误
     */
    pub fn file_watcher(message: impl ToString) -> Self {
        EngineError::FileWatcher(message.to_string())
    }

    /**
     * 创建验证错误
     */
    pub fn validation_error(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }
}

/**
 * 统一结果类型
 */
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let error = EngineError::not_found("Session", "42");
        assert_eq!(format!("{}", error), "Session with key 42 was not found");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let engine_error: EngineError = io_error.into();

        assert!(matches!(engine_error, EngineError::Io(_)));
    }

    #[test]
    fn test_malformed_record_display() {
        let error = EngineError::malformed_record("missing @t");
        let display = format!("{}", error);
        assert!(display.contains("Malformed log record"));
        assert!(display.contains("missing @t"));
    }
}
