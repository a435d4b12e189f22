//! Controller behaviour over in-memory event streams.
use futures::{
    channel::mpsc::{self, UnboundedSender},
    StreamExt,
};
use ops_console::{
    operation::{
        MemoryRegion, OperationController, OperationParams, OperationRegion, OperationState,
        OperationType, OutputBlock, Regions, StatusKind, Statistics,
    },
    stream::{ConnectError, EventSourceConnector, EventStream, TransportError},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use url::Url;

const BASE: &str = "http://ops.local:5000";

type Sender = UnboundedSender<Result<String, TransportError>>;

#[derive(Default)]
struct FakeConnector {
    streams: Mutex<Vec<(Url, Sender)>>,
}

impl FakeConnector {
    fn urls(&self) -> Vec<String> {
        let streams = self.streams.lock().unwrap();
        streams.iter().map(|(url, _)| url.to_string()).collect()
    }

    fn sender(&self, index: usize) -> Sender {
        self.streams.lock().unwrap()[index].1.clone()
    }
}

impl EventSourceConnector for FakeConnector {
    fn connect(&self, url: Url) -> Result<EventStream, ConnectError> {
        let (tx, rx) = mpsc::unbounded();
        self.streams.lock().unwrap().push((url, tx));

        Ok(rx.boxed())
    }
}

struct Harness {
    connector: Arc<FakeConnector>,
    regions: HashMap<OperationType, Arc<MemoryRegion>>,
    controller: OperationController,
}

impl Harness {
    fn new() -> Self {
        Self::with_base(BASE)
    }

    fn with_base(base: &str) -> Self {
        let connector = Arc::new(FakeConnector::default());
        let regions = OperationType::ALL
            .iter()
            .map(|ty| (*ty, Arc::new(MemoryRegion::new())))
            .collect::<HashMap<_, _>>();

        let controller = OperationController::new(
            base,
            connector.clone(),
            Regions::from_fn(|ty| regions[&ty].clone() as Arc<dyn OperationRegion>),
        );

        Self {
            connector,
            regions,
            controller,
        }
    }

    fn region(&self, ty: OperationType) -> &MemoryRegion {
        &self.regions[&ty]
    }
}

fn send(tx: &Sender, data: &str) {
    tx.unbounded_send(Ok(data.to_string())).unwrap();
}

/// Lets the pump tasks drain whatever was sent.
async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

fn task_texts(region: &MemoryRegion, task_id: Option<&str>) -> Vec<String> {
    region
        .output()
        .group(task_id)
        .map(|group| group.lines.iter().map(|line| line.text.clone()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn start_streams_task_lines_until_completed() {
    let h = Harness::new();
    let ty = OperationType::Start;

    h.controller
        .start(ty, "start_game", &OperationParams::new())
        .await;

    assert_eq!(h.controller.state(ty), OperationState::Connecting);
    let status = h.region(ty).status();
    assert!(status.visible);
    assert_eq!(status.kind, Some(StatusKind::Connecting));
    assert!(status.text.contains("start"));
    assert_eq!(
        h.connector.urls(),
        vec![format!("{BASE}/ops_game/operate?script=start_game")]
    );

    let tx = h.connector.sender(0);
    send(&tx, r#"{"task_id":"t1","status":"running","message":"booting"}"#);
    settle().await;

    assert_eq!(h.controller.state(ty), OperationState::Streaming);
    assert!(!h.region(ty).status().visible);
    let lines = task_texts(h.region(ty), Some("t1"));
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with('['));
    assert!(lines[0].ends_with("] booting"));

    send(&tx, r#"{"status":"completed","message":"done"}"#);
    settle().await;

    assert_eq!(h.controller.state(ty), OperationState::Completed);
    assert_eq!(
        h.region(ty).output().blocks().last(),
        Some(&OutputBlock::Completed(String::from("done")))
    );
    assert!(!h.controller.is_connected(ty).await);
    assert!(tx.is_closed());
}

#[tokio::test]
async fn nothing_is_rendered_after_completed() {
    let h = Harness::new();
    let ty = OperationType::Stop;

    h.controller.start(ty, "stop_game", &OperationParams::new()).await;
    let tx = h.connector.sender(0);

    send(&tx, r#"{"status":"completed","message":"done"}"#);
    let _ = tx.unbounded_send(Ok(String::from(
        r#"{"task_id":"late","status":"running","message":"too late"}"#,
    )));
    settle().await;

    assert!(h.region(ty).output().group(Some("late")).is_none());
    assert_eq!(h.controller.state(ty), OperationState::Completed);
}

#[tokio::test]
async fn types_are_isolated() {
    let h = Harness::new();

    h.controller
        .start(OperationType::Stop, "stop_game", &OperationParams::new())
        .await;
    h.controller
        .start(OperationType::Update, "update_game", &OperationParams::new())
        .await;
    assert_eq!(h.controller.open_connections().await, 2);

    send(
        &h.connector.sender(0),
        r#"{"task_id":"s1","status":"running","message":"stopping"}"#,
    );
    send(
        &h.connector.sender(1),
        r#"{"task_id":"u1","status":"running","message":"updating"}"#,
    );
    settle().await;

    let stop = h.region(OperationType::Stop).output();
    let update = h.region(OperationType::Update).output();
    assert!(stop.group(Some("s1")).is_some());
    assert!(stop.group(Some("u1")).is_none());
    assert!(update.group(Some("u1")).is_some());
    assert!(update.group(Some("s1")).is_none());

    // A failure of one type leaves the other running.
    h.connector
        .sender(0)
        .unbounded_send(Err(TransportError::Status(502)))
        .unwrap();
    settle().await;

    assert_eq!(h.controller.state(OperationType::Stop), OperationState::Errored);
    assert_eq!(
        h.controller.state(OperationType::Update),
        OperationState::Streaming
    );
    assert!(h.controller.is_connected(OperationType::Update).await);
}

#[tokio::test]
async fn restart_supersedes_previous_connection() {
    let h = Harness::new();
    let ty = OperationType::Reload;
    let params = OperationParams::new().with("channel", "cn");

    h.controller.start(ty, "reload_game", &params).await;
    let first = h.connector.sender(0);
    send(&first, r#"{"task_id":"a","status":"running","message":"old"}"#);
    settle().await;

    h.controller.start(ty, "reload_game", &params).await;

    assert!(first.is_closed());
    assert_eq!(h.controller.open_connections().await, 1);
    // The output was cleared for the new run.
    assert!(h.region(ty).output().is_empty());

    let second = h.connector.sender(1);
    send(&second, r#"{"task_id":"b","status":"running","message":"new"}"#);
    settle().await;

    let output = h.region(ty).output();
    assert!(output.group(Some("a")).is_none());
    assert!(output.group(Some("b")).is_some());
}

#[tokio::test]
async fn statistics_blocks_report_failure_rate() {
    let h = Harness::new();
    let ty = OperationType::Initial;

    h.controller
        .start(ty, "initial_game", &OperationParams::new())
        .await;
    let tx = h.connector.sender(0);

    send(&tx, r#"{"status":"statistics","total_executions":0,"total_failures":0}"#);
    send(
        &tx,
        r#"{"status":"statistics","message":"stats","data":{"total_executions":10,"total_failures":3}}"#,
    );
    settle().await;

    let rates = h
        .region(ty)
        .output()
        .blocks()
        .iter()
        .filter_map(|block| match block {
            OutputBlock::Statistics(stats) => Some(stats.failure_rate()),
            _ => None,
        })
        .collect::<Vec<_>>();

    assert_eq!(rates, vec!["0.00", "30.00"]);
    assert_eq!(h.controller.state(ty), OperationState::Streaming);
    assert_eq!(
        Statistics {
            total_executions: 10,
            total_failures: 3
        }
        .failure_rate(),
        "30.00"
    );
}

#[tokio::test]
async fn same_task_lines_share_a_group() {
    let h = Harness::new();
    let ty = OperationType::Battle;

    h.controller
        .start(ty, "battle_game", &OperationParams::new())
        .await;
    let tx = h.connector.sender(0);

    send(&tx, r#"{"task_id":"t1","status":"running","message":"one"}"#);
    send(&tx, r#"{"task_id":"t1","status":"success","message":"two"}"#);
    send(&tx, r#"{"status":"warning","message":"no task"}"#);
    settle().await;

    let output = h.region(ty).output();
    let group = output.group(Some("t1")).unwrap();
    assert_eq!(group.status, "success");
    assert_eq!(group.lines.len(), 2);
    assert_eq!(group.lines[0].status, "running");
    assert!(output.group(None).is_some());
    assert_eq!(output.groups().count(), 2);
}

#[tokio::test]
async fn parse_error_does_not_end_the_stream() {
    let h = Harness::new();
    let ty = OperationType::Update;

    h.controller
        .start(ty, "update_game", &OperationParams::new())
        .await;
    let tx = h.connector.sender(0);

    send(&tx, "{not json");
    send(&tx, r#"{"task_id":"t1","status":"running","message":"after"}"#);
    settle().await;

    let output = h.region(ty).output();
    let parse_errors = output
        .blocks()
        .iter()
        .filter_map(|block| match block {
            OutputBlock::ParseError(text) => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(parse_errors.len(), 1);
    assert!(parse_errors[0].contains("Raw payload: {not json"));
    assert!(matches!(output.blocks()[0], OutputBlock::ParseError(_)));
    assert!(output.group(Some("t1")).is_some());
    assert!(h.controller.is_connected(ty).await);
}

#[tokio::test]
async fn invalid_base_url_fails_initialization() {
    let h = Harness::with_base("not a url");
    let ty = OperationType::Rsync;

    h.controller
        .start(
            ty,
            "rsync_game",
            &OperationParams::new().with("rsync_mode", "update"),
        )
        .await;

    assert_eq!(h.controller.state(ty), OperationState::Errored);
    assert!(h.connector.urls().is_empty());
    let status = h.region(ty).status();
    assert!(status.visible);
    assert_eq!(status.kind, Some(StatusKind::Error));
    assert!(status.text.starts_with("Failed to initialize sync connection"));
}

struct RefusingConnector;

impl EventSourceConnector for RefusingConnector {
    fn connect(&self, _url: Url) -> Result<EventStream, ConnectError> {
        Err(ConnectError::Request(String::from("connection refused")))
    }
}

#[tokio::test(start_paused = true)]
async fn connect_failure_status_hides_after_three_seconds() {
    let ty = OperationType::Reload;
    let region = Arc::new(MemoryRegion::new());
    let shared = region.clone();
    let controller = OperationController::new(
        BASE,
        Arc::new(RefusingConnector),
        Regions::from_fn(|_| shared.clone() as Arc<dyn OperationRegion>),
    );

    controller
        .start(ty, "reload_game", &OperationParams::new())
        .await;

    assert_eq!(controller.state(ty), OperationState::Errored);
    assert!(!controller.is_connected(ty).await);
    let status = region.status();
    assert!(status.visible);
    assert_eq!(status.kind, Some(StatusKind::Error));
    assert!(status
        .text
        .starts_with("Failed to initialize hot-reload connection"));
    assert!(status.text.contains("connection refused"));

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;
    assert!(region.status().visible);

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;
    assert!(!region.status().visible);
}

#[tokio::test(start_paused = true)]
async fn transport_error_status_hides_after_three_seconds() {
    let h = Harness::new();
    let ty = OperationType::Start;

    h.controller
        .start(ty, "start_game", &OperationParams::new())
        .await;
    drop(h.connector.streams.lock().unwrap().remove(0));
    settle().await;

    assert_eq!(h.controller.state(ty), OperationState::Errored);
    assert!(!h.controller.is_connected(ty).await);
    let status = h.region(ty).status();
    assert!(status.visible);
    assert_eq!(status.text, "Operation interrupted or failed");

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;
    assert!(h.region(ty).status().visible);

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;
    assert!(!h.region(ty).status().visible);
}

#[tokio::test(start_paused = true)]
async fn pending_hide_does_not_touch_a_newer_status() {
    let h = Harness::new();
    let ty = OperationType::Start;

    h.controller
        .start(ty, "start_game", &OperationParams::new())
        .await;
    h.connector
        .sender(0)
        .unbounded_send(Err(TransportError::Closed))
        .unwrap();
    settle().await;
    assert_eq!(h.controller.state(ty), OperationState::Errored);

    tokio::time::sleep(Duration::from_secs(2)).await;
    h.controller
        .start(ty, "start_game", &OperationParams::new())
        .await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;

    let status = h.region(ty).status();
    assert!(status.visible);
    assert_eq!(status.kind, Some(StatusKind::Connecting));
}

#[tokio::test]
async fn close_all_closes_every_connection() {
    let h = Harness::new();

    for ty in [OperationType::Stop, OperationType::Start, OperationType::Battle] {
        h.controller
            .start(ty, &ty.default_script(), &OperationParams::new())
            .await;
    }
    assert_eq!(h.controller.open_connections().await, 3);

    h.controller.close_all().await;

    assert_eq!(h.controller.open_connections().await, 0);
    for index in 0..3 {
        assert!(h.connector.sender(index).is_closed());
    }

    // Lines arriving after the close are ignored.
    let _ = h.connector.sender(0).unbounded_send(Ok(String::from(
        r#"{"task_id":"t1","status":"running","message":"late"}"#,
    )));
    settle().await;
    assert!(h.region(OperationType::Stop).output().is_empty());
}

#[tokio::test]
async fn close_leaves_region_as_is() {
    let h = Harness::new();
    let ty = OperationType::Update;

    h.controller
        .start(ty, "update_game", &OperationParams::new())
        .await;
    let tx = h.connector.sender(0);
    send(&tx, r#"{"task_id":"t1","status":"running","message":"partial"}"#);
    settle().await;

    h.controller.close(ty).await;

    assert!(tx.is_closed());
    assert!(!h.controller.is_connected(ty).await);
    assert_eq!(task_texts(h.region(ty), Some("t1")).len(), 1);
}

#[tokio::test]
async fn dropping_the_controller_closes_connections() {
    let h = Harness::new();

    h.controller
        .start(OperationType::Stop, "stop_game", &OperationParams::new())
        .await;
    let tx = h.connector.sender(0);
    let Harness { controller, .. } = h;

    drop(controller);
    settle().await;

    assert!(tx.is_closed());
}

#[tokio::test]
async fn states_can_be_awaited() {
    let h = Harness::new();
    let ty = OperationType::Initial;

    h.controller
        .start(ty, "initial_game", &OperationParams::new())
        .await;
    let mut rx = h.controller.subscribe(ty);

    send(
        &h.connector.sender(0),
        r#"{"status":"completed","message":"all servers deployed"}"#,
    );

    let state = *rx.wait_for(OperationState::is_terminal).await.unwrap();
    assert_eq!(state, OperationState::Completed);
}
