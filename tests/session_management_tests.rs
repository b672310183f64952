//! Session lifecycle integration tests
//!
//! 通过 `LogSessionProvider` 门面走完整流程：建会话、列举、查询、
//! 重载、删除，以及变更跟踪开关对通知投递的门控。

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use clef_engine::{
    EngineError, EventFilter, LogSessionProvider, SearchLogEventsRequest, SortOrder,
};

const EVENT_0: &str =
    r#"{"@t":"2017-04-20T04:24:47.0251719Z","@mt":"Loop {Counter} done","Counter":0}"#;
const EVENT_1: &str =
    r#"{"@t":"2017-04-20T04:24:47.0371689Z","@l":"Warning","@mt":"Loop {Counter} done","Counter":1}"#;
const EVENT_2: &str =
    r#"{"@t":"2017-04-20T04:24:47.0471689Z","@mt":"Failed to do a thing","@l":"Error"}"#;
const EVENT_3: &str =
    r#"{"@t":"2017-04-20T04:24:47.0651719Z","@mt":"Loop {Counter} done","Counter":14}"#;
const APPENDED: &str = r#"{"@t":"2022-06-07T03:44:57.8532799Z","@mt":"Hello, {User}","User":"planet"}"#;

/// 四个样本事件写进一个文件，建好会话
fn provider_with_fixture() -> (TempDir, LogSessionProvider, Uuid) {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("log-1.clef"),
        format!("{EVENT_0}\n{EVENT_1}\n{EVENT_2}\n{EVENT_3}\n"),
    )
    .unwrap();

    let provider = LogSessionProvider::default();
    let session_id = provider
        .create_session(
            &[dir.path().join("log-1.clef").to_string_lossy().into_owned()],
            &CancellationToken::new(),
        )
        .unwrap();
    (dir, provider, session_id)
}

fn request(sort_order: SortOrder) -> SearchLogEventsRequest {
    SearchLogEventsRequest {
        sort_order,
        ..Default::default()
    }
}

#[test]
fn add_session_configures_one_watcher_per_directory() {
    let (dir, provider, session_id) = provider_with_fixture();
    let session = provider.get_session(session_id).unwrap();

    assert_eq!(session.watcher_count(), 1);
    let names = session.watched_file_names(dir.path()).unwrap();
    assert_eq!(names.len(), 1);
    assert!(names.contains(std::ffi::OsStr::new("log-1.clef")));
    // 监听器已建立，但投递默认关闭
    assert!(!session.is_tracking_changes());
}

#[test]
fn list_sessions_maps_id_count_and_paths() {
    let (dir, provider, session_id) = provider_with_fixture();
    let path = dir.path().join("log-1.clef").to_string_lossy().into_owned();

    let sessions = provider.list_sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, session_id);
    assert_eq!(sessions[0].event_count, 4);
    assert_eq!(sessions[0].paths, vec![path]);
}

#[test]
fn search_orders_events_and_aggregates_counts() {
    let (_dir, provider, session_id) = provider_with_fixture();

    let ascending = provider
        .search_events(session_id, &request(SortOrder::Asc))
        .unwrap();
    assert_eq!(ascending.events.len(), 4);
    assert_eq!(ascending.events[0].rendered_message, "Loop 0 done");

    let descending = provider
        .search_events(session_id, &request(SortOrder::Desc))
        .unwrap();
    assert_eq!(descending.events[0].rendered_message, "Loop 14 done");

    let counts = &descending.counts;
    assert_eq!(counts.total, 4);
    assert_eq!(counts.info, 2);
    assert_eq!(counts.warning, 1);
    assert_eq!(counts.error, 1);
    assert_eq!(counts.message_templates["Loop {Counter} done"], 3);
}

#[test]
fn search_pages_the_sorted_sequence() {
    let (_dir, provider, session_id) = provider_with_fixture();
    let request = SearchLogEventsRequest {
        page_number: 2,
        page_size: 1,
        ..Default::default()
    };

    let response = provider.search_events(session_id, &request).unwrap();
    assert_eq!(response.events.len(), 1);
    assert_eq!(response.events[0].rendered_message, "Failed to do a thing");
    // 计数永远覆盖过滤后的全集
    assert_eq!(response.counts.total, 4);
}

#[test]
fn level_filter_without_at_prefix_matches_the_builtin_field() {
    let (_dir, provider, session_id) = provider_with_fixture();
    let request = SearchLogEventsRequest {
        filters: Some(vec![EventFilter::new("Level", "Warning")]),
        ..Default::default()
    };

    let response = provider.search_events(session_id, &request).unwrap();
    assert_eq!(response.events.len(), 1);
    assert_eq!(response.events[0].rendered_message, "Loop 1 done");
}

#[test]
fn expression_and_filter_are_combined_with_and() {
    let (_dir, provider, session_id) = provider_with_fixture();
    let request = SearchLogEventsRequest {
        expression: Some("@MessageTemplate = 'Loop {Counter} done'".to_string()),
        filters: Some(vec![EventFilter::new("Level", "Warning")]),
        ..Default::default()
    };

    let response = provider.search_events(session_id, &request).unwrap();
    assert_eq!(response.events.len(), 1);
    assert_eq!(response.events[0].rendered_message, "Loop 1 done");
    assert_eq!(response.counts.total, 1);
}

#[test]
fn bare_text_expression_is_a_case_insensitive_substring_search() {
    let (_dir, provider, session_id) = provider_with_fixture();
    let request = SearchLogEventsRequest {
        expression: Some("loop".to_string()),
        ..Default::default()
    };

    let response = provider.search_events(session_id, &request).unwrap();
    assert_eq!(response.events.len(), 3);
    assert!(response
        .events
        .iter()
        .all(|event| event.rendered_message.to_lowercase().contains("loop")));
}

#[test]
fn invalid_page_request_is_rejected() {
    let (_dir, provider, session_id) = provider_with_fixture();

    let zero_page = SearchLogEventsRequest {
        page_number: 0,
        ..Default::default()
    };
    assert!(matches!(
        provider.search_events(session_id, &zero_page),
        Err(EngineError::Validation(_))
    ));

    let zero_size = SearchLogEventsRequest {
        page_size: 0,
        ..Default::default()
    };
    assert!(matches!(
        provider.search_events(session_id, &zero_size),
        Err(EngineError::Validation(_))
    ));
}

#[test]
fn unknown_session_fails_with_not_found() {
    let provider = LogSessionProvider::default();
    let missing = Uuid::new_v4();

    assert!(matches!(
        provider.search_events(missing, &SearchLogEventsRequest::default()),
        Err(EngineError::NotFound { .. })
    ));
    assert!(matches!(
        provider.set_track_changes(missing, true),
        Err(EngineError::NotFound { .. })
    ));
    assert!(matches!(
        provider.reload(missing, &[], &CancellationToken::new()),
        Err(EngineError::NotFound { .. })
    ));
}

#[test]
fn deleting_a_session_makes_it_unreachable_and_double_delete_is_safe() {
    let (_dir, provider, session_id) = provider_with_fixture();

    provider.delete_session(session_id).unwrap();

    assert!(matches!(
        provider.search_events(session_id, &SearchLogEventsRequest::default()),
        Err(EngineError::NotFound { .. })
    ));
    // 第二次删除同样报 NotFound，而不是崩溃
    assert!(matches!(
        provider.delete_session(session_id),
        Err(EngineError::NotFound { .. })
    ));
    assert!(provider.list_sessions().is_empty());
}

#[test]
fn reload_reads_only_the_named_files() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("log-1.clef");
    let second = dir.path().join("log-2.clef");
    fs::write(&first, format!("{EVENT_0}\n")).unwrap();
    fs::write(&second, format!("{EVENT_2}\n")).unwrap();

    let provider = LogSessionProvider::default();
    let token = CancellationToken::new();
    let session_id = provider
        .create_session(
            &[
                first.to_string_lossy().into_owned(),
                second.to_string_lossy().into_owned(),
            ],
            &token,
        )
        .unwrap();

    for path in [&first, &second] {
        let mut handle = OpenOptions::new().append(true).open(path).unwrap();
        writeln!(handle, "{APPENDED}").unwrap();
    }

    // 只重载第一个文件：第二个文件的追加内容保持不可见
    provider
        .reload(session_id, &[first.to_string_lossy().into_owned()], &token)
        .unwrap();
    let response = provider
        .search_events(session_id, &SearchLogEventsRequest::default())
        .unwrap();
    assert_eq!(response.counts.total, 3);

    provider
        .reload(session_id, &[second.to_string_lossy().into_owned()], &token)
        .unwrap();
    let response = provider
        .search_events(session_id, &SearchLogEventsRequest::default())
        .unwrap();
    assert_eq!(response.counts.total, 4);
}

#[tokio::test]
async fn change_notifications_flow_only_while_tracking_is_enabled() {
    let (dir, provider, session_id) = provider_with_fixture();
    let path = dir.path().join("log-1.clef");
    let mut changes = provider.change_bus().subscribe();

    // 跟踪关闭：写入不产生任何通知
    {
        let mut handle = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(handle, "{APPENDED}").unwrap();
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(changes.try_recv().is_err());

    // 打开跟踪后，同样的写入开始投递 (sessionId, path)
    provider.set_track_changes(session_id, true).unwrap();
    {
        let mut handle = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(handle, "{APPENDED}").unwrap();
    }
    let event = tokio::time::timeout(Duration::from_secs(10), changes.recv())
        .await
        .expect("expected a change notification")
        .unwrap();
    assert_eq!(event.session_id, session_id);
    assert_eq!(event.path, path);
}

#[tokio::test]
async fn deleted_sessions_stop_notifying_even_when_tracking_was_on() {
    let (dir, provider, session_id) = provider_with_fixture();
    let path = dir.path().join("log-1.clef");
    let mut changes = provider.change_bus().subscribe();

    provider.set_track_changes(session_id, true).unwrap();
    provider.delete_session(session_id).unwrap();

    let mut handle = OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(handle, "{APPENDED}").unwrap();
    drop(handle);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(changes.try_recv().is_err());
}
