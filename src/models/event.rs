//! 日志事件模型
//!
//! 一条 CLEF 记录解析后的规范形态：时间戳、级别、消息模板、
//! 渲染后的消息、可选异常文本以及命名属性集合。

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// 日志级别（有序枚举：Verbose < Debug < Information < Warning < Error < Fatal）
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum LogLevel {
    Verbose,
    Debug,
    /// 记录未携带级别时的隐含默认值
    #[default]
    Information,
    Warning,
    Error,
    Fatal,
}

impl LogLevel {
    /// 级别名称（Serilog 拼写）
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Verbose => "Verbose",
            LogLevel::Debug => "Debug",
            LogLevel::Information => "Information",
            LogLevel::Warning => "Warning",
            LogLevel::Error => "Error",
            LogLevel::Fatal => "Fatal",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            v if v.eq_ignore_ascii_case("Verbose") => Ok(LogLevel::Verbose),
            v if v.eq_ignore_ascii_case("Debug") => Ok(LogLevel::Debug),
            v if v.eq_ignore_ascii_case("Information") => Ok(LogLevel::Information),
            v if v.eq_ignore_ascii_case("Warning") => Ok(LogLevel::Warning),
            v if v.eq_ignore_ascii_case("Error") => Ok(LogLevel::Error),
            v if v.eq_ignore_ascii_case("Fatal") => Ok(LogLevel::Fatal),
            other => Err(format!("Unknown log level: {}", other)),
        }
    }
}

/// 日志事件
///
/// 不可变记录；`rendered_message` 在解析时一次性计算，之后不再变化。
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub timestamp: DateTime<FixedOffset>,
    pub level: LogLevel,
    /// 模板与属性代入后的最终消息
    #[serde(rename = "message")]
    pub rendered_message: String,
    pub message_template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    pub properties: BTreeMap<String, Value>,
}

impl LogEvent {
    /// 由模板渲染消息并构造事件
    pub fn new(
        timestamp: DateTime<FixedOffset>,
        level: LogLevel,
        message_template: String,
        exception: Option<String>,
        properties: BTreeMap<String, Value>,
    ) -> Self {
        let rendered_message = render_message(&message_template, &properties);
        Self {
            timestamp,
            level,
            rendered_message,
            message_template,
            exception,
            properties,
        }
    }

    /// 消息已经渲染好（记录只带 `@m`）时的构造方式；模板即消息本身
    pub fn from_rendered(
        timestamp: DateTime<FixedOffset>,
        level: LogLevel,
        message: String,
        exception: Option<String>,
        properties: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            timestamp,
            level,
            rendered_message: message.clone(),
            message_template: message,
            exception,
            properties,
        }
    }

    /// 按名称取属性值
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// 渲染消息模板
///
/// `{name}` 占位符替换为对应属性的文本形式；`{{` 与 `}}` 是大括号转义；
/// 没有匹配属性的占位符按原样保留。占位符名可以携带 `@`/`$` 前缀
/// （解构提示）以及 `,对齐` 和 `:格式` 片段，查找属性时全部忽略。
pub fn render_message(template: &str, properties: &BTreeMap<String, Value>) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                rendered.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                rendered.push('}');
            }
            '{' => {
                let mut hole = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    hole.push(inner);
                }
                if !closed {
                    // 模板在占位符中间结束，按原样输出
                    rendered.push('{');
                    rendered.push_str(&hole);
                    break;
                }
                let name = hole
                    .trim_start_matches(['@', '$'])
                    .split([',', ':'])
                    .next()
                    .unwrap_or("");
                match properties.get(name) {
                    Some(value) => rendered.push_str(&render_value(value)),
                    None => {
                        rendered.push('{');
                        rendered.push_str(&hole);
                        rendered.push('}');
                    }
                }
            }
            other => rendered.push(other),
        }
    }

    rendered
}

/// 属性值的文本形式：字符串不加引号，其余取紧凑 JSON
fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
