use crate::common::{RecordingTransport, rca_response};
use quotientai::LogStatus;
use quotientai::resources::{
    AsyncDetectionsResource, DetectionsResource, MAX_RUNTIME_CLOSED_RETRIES, PollSettings,
};
use quotientai::sender::ClientError;
use std::sync::Arc;
use std::time::{Duration, Instant};

const LOG_ID: &str = "2b5cf4c4-7d0e-4c8e-9d43-9b1ad35f8a61";

fn in_progress() -> Result<serde_json::Value, ClientError> {
    Ok(rca_response(LOG_ID, "log_created_and_detection_in_progress"))
}

#[test]
fn test_poll_returns_terminal_detection_on_third_call() {
    let transport = Arc::new(RecordingTransport::new().script_get([
        Ok(rca_response(LOG_ID, "log_creation_in_progress")),
        in_progress(),
        Ok(rca_response(LOG_ID, "log_created_and_detection_completed")),
    ]));
    let detections = DetectionsResource::new(transport.clone(), PollSettings::default());

    let detection = detections
        .poll(LOG_ID, Duration::from_secs(5), Duration::from_millis(10))
        .unwrap();

    assert_eq!(transport.get_count(), 3);
    assert_eq!(detection.status, Some(LogStatus::LogCreatedAndDetectionCompleted));
    assert_eq!(detection.has_hallucination, Some(true));
    assert_eq!(detection.evaluations.len(), 1);
    assert_eq!(detection.log.user_query.as_deref(), Some("What is the PTO policy?"));
    assert!(
        transport
            .gets()
            .iter()
            .all(|(path, _)| path == &format!("/logs/{LOG_ID}/rca"))
    );
}

#[test]
fn test_no_detections_pending_is_terminal() {
    let response = rca_response(LOG_ID, "log_created_no_detections_pending");
    let transport = Arc::new(RecordingTransport::new().script_get([Ok(response)]));
    let detections = DetectionsResource::new(transport.clone(), PollSettings::default());

    assert!(
        detections
            .poll(LOG_ID, Duration::from_secs(5), Duration::from_millis(10))
            .is_some()
    );
    assert_eq!(transport.get_count(), 1);
}

#[test]
fn test_poll_times_out() {
    let response = rca_response(LOG_ID, "log_created_and_detection_in_progress");
    let transport = Arc::new(RecordingTransport::new().get_fallback(response));
    let detections = DetectionsResource::new(transport.clone(), PollSettings::default());

    let start = Instant::now();
    let result = detections.poll(LOG_ID, Duration::from_secs(1), Duration::from_millis(100));
    let elapsed = start.elapsed();

    assert!(result.is_none());
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_millis(1500), "took {elapsed:?}");
    assert!((8..=11).contains(&transport.get_count()));
}

#[test]
fn test_empty_id_makes_no_request() {
    let transport = Arc::new(RecordingTransport::new());
    let detections = DetectionsResource::new(transport.clone(), PollSettings::default());

    assert!(detections.poll("", Duration::from_secs(1), Duration::from_millis(10)).is_none());
    assert_eq!(transport.get_count(), 0);
}

#[test]
fn test_transport_errors_keep_polling() {
    let transport = Arc::new(RecordingTransport::new().script_get([
        Err(ClientError::RequestTimeout("slow".to_string())),
        Ok(serde_json::Value::Null),
        Ok(rca_response(LOG_ID, "log_created_and_detection_completed")),
    ]));
    let detections = DetectionsResource::new(transport.clone(), PollSettings::default());

    assert!(
        detections
            .poll(LOG_ID, Duration::from_secs(5), Duration::from_millis(10))
            .is_some()
    );
    assert_eq!(transport.get_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_async_poll_returns_terminal_detection_on_third_call() {
    let transport = Arc::new(RecordingTransport::new().script_get([
        in_progress(),
        in_progress(),
        Ok(rca_response(LOG_ID, "log_created_no_detections_pending")),
    ]));
    let settings = PollSettings::default();
    let detections = AsyncDetectionsResource::new(transport.clone(), settings);

    let start = tokio::time::Instant::now();
    let detection = detections.poll_default(LOG_ID).await.unwrap();

    assert_eq!(detection.status, Some(LogStatus::LogCreatedNoDetectionsPending));
    assert_eq!(transport.get_count(), 3);
    // One interval slept between each pair of calls, none after the terminal one.
    assert_eq!(start.elapsed(), 2 * settings.interval);
}

#[tokio::test(start_paused = true)]
async fn test_async_poll_times_out() {
    let transport = Arc::new(
        RecordingTransport::new().get_fallback(rca_response(LOG_ID, "log_not_found")),
    );
    let detections = AsyncDetectionsResource::new(transport.clone(), PollSettings::default());

    let start = tokio::time::Instant::now();
    let result = detections
        .poll(LOG_ID, Duration::from_secs(1), Duration::from_millis(100))
        .await;

    assert!(result.is_none());
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(transport.get_count(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_async_poll_aborts_after_runtime_closed_budget() {
    let closed = || Err(ClientError::RuntimeClosed("runtime shutdown".to_string()));
    let transport = Arc::new(
        RecordingTransport::new()
            .script_get((0..=MAX_RUNTIME_CLOSED_RETRIES).map(|_| closed()))
            .get_fallback(rca_response(LOG_ID, "log_created_and_detection_completed")),
    );
    let detections = AsyncDetectionsResource::new(transport.clone(), PollSettings::default());

    let result = detections
        .poll(LOG_ID, Duration::from_secs(60), Duration::from_millis(100))
        .await;

    assert!(result.is_none());
    assert_eq!(transport.get_count(), MAX_RUNTIME_CLOSED_RETRIES as usize + 1);
}

#[tokio::test(start_paused = true)]
async fn test_async_poll_recovers_within_runtime_closed_budget() {
    let closed = || Err(ClientError::RuntimeClosed("runtime shutdown".to_string()));
    let transport = Arc::new(
        RecordingTransport::new()
            .script_get((0..MAX_RUNTIME_CLOSED_RETRIES).map(|_| closed()))
            .get_fallback(rca_response(LOG_ID, "log_created_and_detection_completed")),
    );
    let detections = AsyncDetectionsResource::new(transport.clone(), PollSettings::default());

    let result = detections
        .poll(LOG_ID, Duration::from_secs(60), Duration::from_millis(100))
        .await;

    assert!(result.is_some());
    assert_eq!(transport.get_count(), MAX_RUNTIME_CLOSED_RETRIES as usize + 1);
}

#[tokio::test]
async fn test_async_empty_id_makes_no_request() {
    let transport = Arc::new(RecordingTransport::new());
    let detections = AsyncDetectionsResource::new(transport.clone(), PollSettings::default());

    assert!(detections.poll("", Duration::from_secs(1), Duration::from_millis(10)).await.is_none());
    assert_eq!(transport.get_count(), 0);
}
