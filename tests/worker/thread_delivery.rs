use crate::common::{RecordingTransport, log_request};
use quotientai::resources::LogsResource;
use quotientai::worker::DeliveryConfig;
use quotientai::{CreateLog, DetectionType};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn resource(transport: &Arc<RecordingTransport>) -> LogsResource<RecordingTransport> {
    LogsResource::new(transport.clone(), DeliveryConfig::default()).unwrap()
}

#[test]
fn test_create_returns_uuid_immediately() {
    let transport = Arc::new(RecordingTransport::new().with_post_delay(Duration::from_millis(50)));
    let logs = resource(&transport);

    let id = logs.create(log_request()).unwrap();
    assert_eq!(uuid::Uuid::parse_str(&id).unwrap().get_version_num(), 4);

    logs.shutdown();
    assert_eq!(transport.posted_ids(), vec![id]);
}

#[test]
fn test_records_delivered_in_fifo_order() {
    let transport = Arc::new(RecordingTransport::new());
    let logs = resource(&transport);

    let ids: Vec<String> = (0..200).filter_map(|_| logs.create(log_request())).collect();
    assert_eq!(ids.len(), 200);

    let report = logs.shutdown();
    assert!(report.worker_stopped);
    assert_eq!(transport.posted_ids(), ids);
    assert!(transport.post_paths().iter().all(|path| path == "/logs"));
}

#[test]
fn test_failing_and_panicking_deliveries_do_not_stop_worker() {
    let transport = Arc::new(RecordingTransport::new().fail_on(2).panic_on(5).fail_on(7));
    let logs = resource(&transport);

    for _ in 0..10 {
        logs.create(log_request());
    }
    logs.shutdown();

    assert_eq!(transport.post_count(), 10);
    let stats = logs.stats();
    assert_eq!(stats.delivered, 7);
    assert_eq!(stats.failed, 3);
}

#[test]
fn test_shutdown_drains_a_thousand_records() {
    let transport = Arc::new(RecordingTransport::new());
    let logs = resource(&transport);

    for _ in 0..1000 {
        logs.create(log_request());
    }
    let report = logs.shutdown();

    assert_eq!(transport.post_count(), 1000);
    assert_eq!(report.abandoned, 0);
    assert_eq!(logs.queued(), 0);
}

#[test]
fn test_shutdown_is_idempotent() {
    let transport = Arc::new(RecordingTransport::new());
    let logs = resource(&transport);

    for _ in 0..5 {
        logs.create(log_request());
    }

    let first = logs.shutdown();
    let second = logs.shutdown();
    assert!(!first.already_shut_down);
    assert!(second.already_shut_down);

    drop(logs);
    assert_eq!(transport.post_count(), 5);
}

#[test]
fn test_drop_drains_queue() {
    let transport = Arc::new(RecordingTransport::new().with_post_delay(Duration::from_millis(5)));
    {
        let logs = resource(&transport);
        for _ in 0..20 {
            logs.create(log_request());
        }
    }
    assert_eq!(transport.post_count(), 20);
}

#[test]
fn test_enqueue_does_not_wait_for_delivery() {
    let delay = Duration::from_millis(200);
    let transport = Arc::new(RecordingTransport::new().with_post_delay(delay));
    let logs = resource(&transport);

    let start = Instant::now();
    for _ in 0..10 {
        assert!(logs.create(log_request()).is_some());
    }
    assert!(start.elapsed() < delay, "enqueue blocked for {:?}", start.elapsed());

    logs.shutdown();
    assert_eq!(transport.post_count(), 10);
}

#[test]
fn test_shutdown_timeout_falls_back_to_caller_thread() {
    let transport = Arc::new(RecordingTransport::new().with_post_delay(Duration::from_millis(100)));
    let config = DeliveryConfig {
        shutdown_timeout: Duration::from_millis(50),
        ..DeliveryConfig::default()
    };
    let logs = LogsResource::new(transport.clone(), config).unwrap();

    for _ in 0..5 {
        logs.create(log_request());
    }
    let report = logs.shutdown();

    assert!(!report.drained);
    assert!(report.forced > 0);
    assert_eq!(transport.post_count(), 5);
}

#[test]
fn test_invalid_request_is_not_enqueued() {
    let transport = Arc::new(RecordingTransport::new());
    let logs = resource(&transport);

    let mut request = CreateLog::new("test-app", "test");
    request.detections = vec![DetectionType::Hallucination];
    assert!(logs.create(request).is_none());

    let mut request = log_request();
    request.detection_sample_rate = 2.0;
    assert!(logs.create(request).is_none());

    logs.shutdown();
    assert_eq!(transport.post_count(), 0);
    assert_eq!(logs.stats().enqueued, 0);
}

#[test]
fn test_wire_payload_shape() {
    let transport = Arc::new(RecordingTransport::new());
    let logs = resource(&transport);

    let mut request = log_request();
    request.detections = vec![DetectionType::Hallucination, DetectionType::Hallucination];
    request.detection_sample_rate = 0.5;
    let id = logs.create(request).unwrap();
    logs.shutdown();

    let body = &transport.posted_bodies()[0];
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["app_name"], "test-app");
    assert_eq!(body["environment"], "test");
    assert_eq!(body["detections"], serde_json::json!(["hallucination"]));
    assert_eq!(body["detection_sample_rate"], 0.5);
    assert!(body["created_at"].as_str().is_some());
    assert!(body.get("documents").is_none());
    assert!(body.as_object().unwrap().values().all(|value| !value.is_null()));
}

#[test]
fn test_concurrent_producers_share_one_worker() {
    let transport = Arc::new(RecordingTransport::new());
    let logs = Arc::new(resource(&transport));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let logs = logs.clone();
            std::thread::spawn(move || {
                (0..100)
                    .filter_map(|_| logs.create(log_request()))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let per_thread: Vec<Vec<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    logs.shutdown();

    let posted = transport.posted_ids();
    assert_eq!(posted.len(), 800);
    // Each producer's records keep their relative order.
    for ids in per_thread {
        let positions: Vec<usize> = ids
            .iter()
            .map(|id| posted.iter().position(|p| p == id).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
