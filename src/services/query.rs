//! 查询引擎
//!
//! 在会话累积的事件上组合过滤、排序、分页与聚合计数。谓词与排序都
//! 是纯的，所以同一请求的页内容与计数来自同一个过滤后的序列，彼此
//! 必然一致。

use std::sync::Arc;

use crate::models::event::LogEvent;
use crate::models::search::{EventCounts, SearchLogEventsRequest, SortOrder};
use crate::services::filter::EventPredicate;

/// 执行一次查询
///
/// 步骤：过滤 → 按时间戳稳定排序（时间相同保持过滤前相对顺序）→
/// 在全集上聚合计数 → 跳过 `(page_number-1)*page_size` 取一页。
pub fn run_query(
    entries: impl Iterator<Item = Arc<LogEvent>>,
    predicate: Option<&EventPredicate>,
    request: &SearchLogEventsRequest,
) -> (Vec<Arc<LogEvent>>, EventCounts) {
    let mut filtered: Vec<Arc<LogEvent>> = match predicate {
        Some(predicate) => entries.filter(|event| predicate(event)).collect(),
        None => entries.collect(),
    };

    match request.sort_order {
        SortOrder::Asc => filtered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
        SortOrder::Desc => filtered.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
    }

    let mut counts = EventCounts::default();
    for event in &filtered {
        counts.record(event);
    }

    let page = filtered
        .into_iter()
        .skip((request.page_number - 1) * request.page_size)
        .take(request.page_size)
        .collect();

    (page, counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clef;
    use crate::services::filter::LogSessionFilterFactory;

    fn stub_entries() -> Vec<Arc<LogEvent>> {
        [
            r#"{"@t":"2017-04-20T04:24:47.0251719Z","@mt":"Loop {Counter} done","Counter":0}"#,
            r#"{"@t":"2017-04-20T04:24:47.0371689Z","@l":"Warning","@mt":"Loop {Counter} done","Counter":1}"#,
            r#"{"@t":"2017-04-20T04:24:47.0471689Z","@mt":"Failed to do a thing","@l":"Error"}"#,
            r#"{"@t":"2017-04-20T04:24:47.0651719Z","@mt":"Loop {Counter} done","Counter":14}"#,
        ]
        .iter()
        .map(|line| Arc::new(clef::parse_line(line).unwrap()))
        .collect()
    }

    fn request(sort_order: SortOrder) -> SearchLogEventsRequest {
        SearchLogEventsRequest {
            sort_order,
            ..Default::default()
        }
    }

    #[test]
    fn test_sorts_ascending_and_descending() {
        let (asc, _) = run_query(stub_entries().into_iter(), None, &request(SortOrder::Asc));
        assert_eq!(asc[0].rendered_message, "Loop 0 done");

        let (desc, _) = run_query(stub_entries().into_iter(), None, &request(SortOrder::Desc));
        assert_eq!(desc[0].rendered_message, "Loop 14 done");
    }

    #[test]
    fn test_counts_cover_full_filtered_set() {
        let (_, counts) = run_query(stub_entries().into_iter(), None, &request(SortOrder::Desc));
        assert_eq!(counts.total, 4);
        assert_eq!(counts.info, 2);
        assert_eq!(counts.warning, 1);
        assert_eq!(counts.error, 1);
        assert_eq!(counts.fatal, 0);
        assert_eq!(counts.message_templates["Loop {Counter} done"], 3);
        assert_eq!(counts.message_templates["Failed to do a thing"], 1);
    }

    #[test]
    fn test_counts_ignore_pagination() {
        let request = SearchLogEventsRequest {
            page_number: 2,
            page_size: 1,
            ..Default::default()
        };
        let (page, counts) = run_query(stub_entries().into_iter(), None, &request);
        // 默认降序：第 2 页第 1 条是 "Failed to do a thing"
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].rendered_message, "Failed to do a thing");
        assert_eq!(counts.total, 4);
    }

    #[test]
    fn test_page_past_the_end_is_empty() {
        let request = SearchLogEventsRequest {
            page_number: 9,
            page_size: 40,
            ..Default::default()
        };
        let (page, counts) = run_query(stub_entries().into_iter(), None, &request);
        assert!(page.is_empty());
        assert_eq!(counts.total, 4);
    }

    #[test]
    fn test_predicate_applies_before_counts() {
        let factory = LogSessionFilterFactory::default();
        let predicate = factory.try_create_filter(Some("@l = 'Warning'"), None).unwrap();
        let (page, counts) = run_query(
            stub_entries().into_iter(),
            Some(&predicate),
            &request(SortOrder::Desc),
        );
        assert_eq!(page.len(), 1);
        assert_eq!(counts.total, 1);
        assert_eq!(counts.warning, 1);
        assert_eq!(counts.info, 0);
    }

    #[test]
    fn test_equal_timestamps_keep_pre_sort_order() {
        let entries: Vec<Arc<LogEvent>> = [
            r#"{"@t":"2017-04-20T04:24:47Z","@mt":"first"}"#,
            r#"{"@t":"2017-04-20T04:24:47Z","@mt":"second"}"#,
            r#"{"@t":"2017-04-20T04:24:47Z","@mt":"third"}"#,
        ]
        .iter()
        .map(|line| Arc::new(clef::parse_line(line).unwrap()))
        .collect();

        let (asc, _) = run_query(entries.clone().into_iter(), None, &request(SortOrder::Asc));
        let messages: Vec<&str> = asc.iter().map(|e| e.rendered_message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);

        // 降序对全等时间戳同样保持原有相对顺序（稳定排序）
        let (desc, _) = run_query(entries.into_iter(), None, &request(SortOrder::Desc));
        let messages: Vec<&str> = desc.iter().map(|e| e.rendered_message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }
}
