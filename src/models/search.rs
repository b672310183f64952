//! 查询请求与响应数据结构
//!
//! 传输层与引擎之间的 DTO：分页查询请求、事件过滤条件、
//! 聚合计数以及会话摘要。字段名按 camelCase 序列化。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::event::{LogEvent, LogLevel};

/// 排序方向
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// 单个字段等值过滤条件
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    pub property: String,
    pub value: String,
}

impl EventFilter {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

/// 分页查询请求
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchLogEventsRequest {
    /// 页号，从 1 开始
    pub page_number: usize,
    pub page_size: usize,
    pub sort_order: SortOrder,
    /// 自由文本表达式（结构化语法或裸文本）
    pub expression: Option<String>,
    /// 字段等值条件，与表达式按 AND 合并
    pub filters: Option<Vec<EventFilter>>,
}

impl Default for SearchLogEventsRequest {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: 40,
            sort_order: SortOrder::Desc,
            expression: None,
            filters: None,
        }
    }
}

/// 过滤后全集上的聚合计数（与分页无关）
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventCounts {
    pub total: usize,
    pub verbose: usize,
    pub debug: usize,
    pub info: usize,
    pub warning: usize,
    pub error: usize,
    pub fatal: usize,
    /// 消息模板 -> 出现次数
    pub message_templates: BTreeMap<String, usize>,
}

impl EventCounts {
    /// 计入一个事件
    pub fn record(&mut self, event: &LogEvent) {
        self.total += 1;
        match event.level {
            LogLevel::Verbose => self.verbose += 1,
            LogLevel::Debug => self.debug += 1,
            LogLevel::Information => self.info += 1,
            LogLevel::Warning => self.warning += 1,
            LogLevel::Error => self.error += 1,
            LogLevel::Fatal => self.fatal += 1,
        }
        *self
            .message_templates
            .entry(event.message_template.clone())
            .or_insert(0) += 1;
    }
}

/// 分页查询响应：一页事件加全集计数
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SearchLogEventsResponse {
    pub events: Vec<Arc<LogEvent>>,
    pub counts: EventCounts,
}

/// 会话摘要
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LogSessionSummary {
    pub id: Uuid,
    pub event_count: usize,
    /// 创建会话时的原始输入路径
    pub paths: Vec<String>,
}
