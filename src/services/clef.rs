//! CLEF 行解析
//!
//! 把一行紧凑 JSON 日志记录解析成规范的 [`LogEvent`]。保留字段以
//! `@` 开头：`@t` 时间戳（必填）、`@mt` 消息模板、`@m` 已渲染消息、
//! `@l` 级别（缺省 Information）、`@x` 异常文本；`@i`/`@r` 接受但忽略。
//! 以 `@@` 开头的键解转义为用户属性 `@...`，其余键都是用户属性。

use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{EngineError, Result};
use crate::models::event::{LogEvent, LogLevel};

/// 解析一行 CLEF 记录
///
/// 失败时返回 [`EngineError::MalformedRecord`]；调用方（增量读取器）
/// 据此停在最后一条完整记录的边界上。
pub fn parse_line(line: &str) -> Result<LogEvent> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| EngineError::malformed_record(format!("invalid JSON: {}", e)))?;
    let record = value
        .as_object()
        .ok_or_else(|| EngineError::malformed_record("line is not a JSON object"))?;

    let timestamp = parse_timestamp(record)?;
    let level = parse_level(record)?;
    let exception = record
        .get("@x")
        .and_then(Value::as_str)
        .map(str::to_string);
    let properties = collect_properties(record);

    match record.get("@mt").and_then(Value::as_str) {
        Some(template) => Ok(LogEvent::new(
            timestamp,
            level,
            template.to_string(),
            exception,
            properties,
        )),
        // 只有 @m 时消息按字面使用，不做占位符代入
        None => match record.get("@m").and_then(Value::as_str) {
            Some(message) => Ok(LogEvent::from_rendered(
                timestamp,
                level,
                message.to_string(),
                exception,
                properties,
            )),
            None => Err(EngineError::malformed_record(
                "record carries neither @mt nor @m",
            )),
        },
    }
}

fn parse_timestamp(record: &Map<String, Value>) -> Result<DateTime<FixedOffset>> {
    let raw = record
        .get("@t")
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::malformed_record("missing required @t timestamp"))?;
    DateTime::parse_from_rfc3339(raw)
        .map_err(|e| EngineError::malformed_record(format!("invalid @t timestamp '{}': {}", raw, e)))
}

fn parse_level(record: &Map<String, Value>) -> Result<LogLevel> {
    match record.get("@l") {
        None | Some(Value::Null) => Ok(LogLevel::Information),
        Some(value) => {
            let raw = value
                .as_str()
                .ok_or_else(|| EngineError::malformed_record("@l must be a string"))?;
            raw.parse().map_err(EngineError::malformed_record)
        }
    }
}

/// 收集用户属性：跳过保留字段，`@@name` 解转义成 `@name`
fn collect_properties(record: &Map<String, Value>) -> BTreeMap<String, Value> {
    let mut properties = BTreeMap::new();
    for (key, value) in record {
        if let Some(escaped) = key.strip_prefix("@@") {
            properties.insert(format!("@{}", escaped), value.clone());
        } else if !key.starts_with('@') {
            properties.insert(key.clone(), value.clone());
        }
    }
    properties
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_minimal_record() {
        let event =
            parse_line(r#"{"@t":"2017-04-20T04:24:47.0251719Z","@mt":"Loop {Counter} done","Counter":0}"#)
                .unwrap();
        assert_eq!(event.level, LogLevel::Information);
        assert_eq!(event.message_template, "Loop {Counter} done");
        assert_eq!(event.rendered_message, "Loop 0 done");
        assert_eq!(event.property("Counter"), Some(&json!(0)));
        assert!(event.exception.is_none());
    }

    #[test]
    fn test_parse_level_and_exception() {
        let event = parse_line(
            r#"{"@t":"2017-04-20T04:24:47.0471689Z","@mt":"Failed to do a thing","@l":"Error","@x":"System.Exception: boom"}"#,
        )
        .unwrap();
        assert_eq!(event.level, LogLevel::Error);
        assert_eq!(event.exception.as_deref(), Some("System.Exception: boom"));
    }

    #[test]
    fn test_parse_sub_millisecond_precision_kept() {
        let first = parse_line(r#"{"@t":"2017-04-20T04:24:47.0251719Z","@mt":"a"}"#).unwrap();
        let second = parse_line(r#"{"@t":"2017-04-20T04:24:47.0251720Z","@mt":"b"}"#).unwrap();
        assert!(first.timestamp < second.timestamp);
    }

    #[test]
    fn test_parse_rendered_message_fallback_is_literal() {
        let event =
            parse_line(r#"{"@t":"2022-06-07T03:44:57Z","@m":"literal {NotAHole} text"}"#).unwrap();
        assert_eq!(event.rendered_message, "literal {NotAHole} text");
        assert_eq!(event.message_template, "literal {NotAHole} text");
    }

    #[test]
    fn test_parse_unescapes_double_at_properties() {
        let event =
            parse_line(r#"{"@t":"2022-06-07T03:44:57Z","@mt":"m","@@special":1,"@i":"ev-1"}"#)
                .unwrap();
        assert_eq!(event.property("@special"), Some(&json!(1)));
        // @i 是保留字段，不进入属性
        assert!(event.property("@i").is_none());
        assert!(event.property("i").is_none());
    }

    #[test]
    fn test_parse_rejects_missing_timestamp() {
        let err = parse_line(r#"{"@mt":"no timestamp"}"#).unwrap_err();
        assert!(matches!(err, EngineError::MalformedRecord(_)));
    }

    #[test]
    fn test_parse_rejects_broken_json() {
        let err = parse_line(r#"{"@t":"2022-06-07T03:44:57Z","@mt":"trunc"#).unwrap_err();
        assert!(matches!(err, EngineError::MalformedRecord(_)));
    }

    #[test]
    fn test_parse_rejects_unknown_level() {
        let err = parse_line(r#"{"@t":"2022-06-07T03:44:57Z","@mt":"m","@l":"Critical"}"#)
            .unwrap_err();
        assert!(matches!(err, EngineError::MalformedRecord(_)));
    }
}
