//! Integration tests for the generation queue API: enqueue, remove,
//! snapshot, single-flight dispatch, and the retry policy end to end.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, delete, generation_body, get, post_json, wait_until, MockProvider};
use retroreel_seedance::ProviderError;
use tokio::sync::Semaphore;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Test: enqueue returns 201 with deterministic position and wait estimate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn enqueue_returns_position_and_wait_estimate() {
    // Gate the provider so the first job stays in flight and queue
    // positions stay observable.
    let gate = Arc::new(Semaphore::new(0));
    let harness = common::harness_with(MockProvider::gated(Arc::clone(&gate))).await;

    let first = post_json(&harness.app, "/api/v1/generations", generation_body("first")).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first = body_json(first).await;
    assert_eq!(first["data"]["position"], 1);
    assert_eq!(first["data"]["estimated_wait_secs"], 0);

    // Once the first job is in flight it no longer counts toward the
    // pending position, so the next arrival is front of the line.
    wait_until(Duration::from_secs(5), || async {
        (harness.state.queue.snapshot().stats.processing == 1).then_some(())
    })
    .await;

    let second =
        post_json(&harness.app, "/api/v1/generations", generation_body("second")).await;
    assert_eq!(second.status(), StatusCode::CREATED);
    let second = body_json(second).await;
    assert_eq!(second["data"]["position"], 1);
    assert_eq!(second["data"]["estimated_wait_secs"], 0);

    let third = body_json(
        post_json(&harness.app, "/api/v1/generations", generation_body("third")).await,
    )
    .await;
    assert_eq!(third["data"]["position"], 2);
    assert_eq!(third["data"]["estimated_wait_secs"], 60);

    gate.add_permits(3);
}

// ---------------------------------------------------------------------------
// Test: invalid request body is rejected with 400 and zero attempts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blank_prompt_is_rejected_without_reaching_the_provider() {
    let harness = common::harness().await;

    let response =
        post_json(&harness.app, "/api/v1/generations", generation_body("   ")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");

    // Nothing was enqueued and the provider never ran.
    let snapshot = body_json(get(&harness.app, "/api/v1/queue").await).await;
    assert_eq!(snapshot["data"]["jobs"].as_array().unwrap().len(), 0);
    assert_eq!(harness.provider.attempts(), 0);
}

// ---------------------------------------------------------------------------
// Test: duration is accepted as a number, and out-of-enum values are 400s
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duration_is_validated_in_both_json_forms() {
    let gate = Arc::new(Semaphore::new(0));
    let harness = common::harness_with(MockProvider::gated(Arc::clone(&gate))).await;

    // Number and quoted string are both valid encodings.
    for duration in [serde_json::json!(5), serde_json::json!("10")] {
        let mut body = generation_body("sunrise timelapse");
        body["duration"] = duration;
        let response = post_json(&harness.app, "/api/v1/generations", body).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    // A duration outside the supported set is a validation failure,
    // not a bare body rejection.
    let mut body = generation_body("sunrise timelapse");
    body["duration"] = serde_json::json!(7);
    let response = post_json(&harness.app, "/api/v1/generations", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");

    gate.add_permits(2);
}

// ---------------------------------------------------------------------------
// Test: a queued job runs to completion and lands in the store
// ---------------------------------------------------------------------------

#[tokio::test]
async fn queued_job_completes_and_persists_a_video() {
    let harness = common::harness().await;

    let receipt = body_json(
        post_json(&harness.app, "/api/v1/generations", generation_body("neon city")).await,
    )
    .await;
    let id: Uuid = serde_json::from_value(receipt["data"]["id"].clone()).unwrap();

    let job = wait_until(Duration::from_secs(5), || async {
        harness
            .state
            .queue
            .get(id)
            .filter(|job| job.status.is_terminal())
    })
    .await;

    assert_eq!(job.progress, 100);
    let result = job.result.expect("completed job carries a result");

    let videos = body_json(get(&harness.app, "/api/v1/videos").await).await;
    let videos = videos["data"].as_array().unwrap().clone();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0]["id"], serde_json::json!(result.video_id));
    assert_eq!(videos[0]["params"]["prompt"], "neon city");
}

// ---------------------------------------------------------------------------
// Test: two retryable failures then success = exactly three attempts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transient_upstream_failures_are_retried_to_success() {
    let harness = common::harness_with(MockProvider::scripted(vec![
        ProviderError::Retryable("503 service unavailable".into()),
        ProviderError::Retryable("503 service unavailable".into()),
    ]))
    .await;

    let receipt = body_json(
        post_json(&harness.app, "/api/v1/generations", generation_body("retry me")).await,
    )
    .await;
    let id: Uuid = serde_json::from_value(receipt["data"]["id"].clone()).unwrap();

    let job = wait_until(Duration::from_secs(5), || async {
        harness
            .state
            .queue
            .get(id)
            .filter(|job| job.status.is_terminal())
    })
    .await;

    assert!(job.result.is_some(), "job should complete: {:?}", job.error);
    assert_eq!(harness.provider.attempts(), 3);
}

// ---------------------------------------------------------------------------
// Test: permanent failure fails the job after one attempt, driver lives on
// ---------------------------------------------------------------------------

#[tokio::test]
async fn permanent_failure_takes_one_attempt_and_does_not_stall_the_queue() {
    let harness = common::harness_with(MockProvider::scripted(vec![ProviderError::Permanent(
        "400 prompt rejected".into(),
    )]))
    .await;

    let doomed = body_json(
        post_json(&harness.app, "/api/v1/generations", generation_body("doomed")).await,
    )
    .await;
    let doomed_id: Uuid = serde_json::from_value(doomed["data"]["id"].clone()).unwrap();

    let job = wait_until(Duration::from_secs(5), || async {
        harness
            .state
            .queue
            .get(doomed_id)
            .filter(|job| job.status.is_terminal())
    })
    .await;
    assert!(job.error.unwrap().contains("prompt rejected"));
    assert_eq!(harness.provider.attempts(), 1);

    // The driver keeps dispatching after the failure.
    let next = body_json(
        post_json(&harness.app, "/api/v1/generations", generation_body("survivor")).await,
    )
    .await;
    let next_id: Uuid = serde_json::from_value(next["data"]["id"].clone()).unwrap();
    let job = wait_until(Duration::from_secs(5), || async {
        harness
            .state
            .queue
            .get(next_id)
            .filter(|job| job.status.is_terminal())
    })
    .await;
    assert!(job.result.is_some());
}

// ---------------------------------------------------------------------------
// Test: remove succeeds only for pending jobs (A/B/C scenario)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pending_job_can_be_removed_while_another_is_in_flight() {
    let gate = Arc::new(Semaphore::new(0));
    let harness = common::harness_with(MockProvider::gated(Arc::clone(&gate))).await;

    let mut ids = Vec::new();
    for prompt in ["job a", "job b", "job c"] {
        let receipt =
            body_json(post_json(&harness.app, "/api/v1/generations", generation_body(prompt)).await)
                .await;
        ids.push(
            serde_json::from_value::<Uuid>(receipt["data"]["id"].clone()).unwrap(),
        );
    }
    let (a, b, c) = (ids[0], ids[1], ids[2]);

    // Wait until A is actually in flight.
    wait_until(Duration::from_secs(5), || async {
        let snapshot = harness.state.queue.snapshot();
        (snapshot.stats.processing == 1).then_some(())
    })
    .await;

    // B is pending: removable. A is processing: conflict.
    let response = delete(&harness.app, &format!("/api/v1/generations/{b}")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = delete(&harness.app, &format!("/api/v1/generations/{a}")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response =
        delete(&harness.app, &format!("/api/v1/generations/{}", Uuid::new_v4())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Release A; C must auto-dequeue and run despite B's removal.
    gate.add_permits(2);
    let job = wait_until(Duration::from_secs(5), || async {
        harness
            .state
            .queue
            .get(c)
            .filter(|job| job.status.is_terminal())
    })
    .await;
    assert!(job.result.is_some());
    assert!(harness.state.queue.get(b).is_none());
}

// ---------------------------------------------------------------------------
// Test: single-flight invariant observed through the snapshot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn at_most_one_job_is_ever_processing() {
    let gate = Arc::new(Semaphore::new(0));
    let harness = common::harness_with(MockProvider::gated(Arc::clone(&gate))).await;

    for prompt in ["one", "two", "three"] {
        post_json(&harness.app, "/api/v1/generations", generation_body(prompt)).await;
    }

    wait_until(Duration::from_secs(5), || async {
        (harness.state.queue.snapshot().stats.processing == 1).then_some(())
    })
    .await;

    // With three jobs queued and the gate closed, processing never
    // exceeds one.
    for _ in 0..10 {
        let stats = harness.state.queue.snapshot().stats;
        assert!(stats.processing <= 1);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    gate.add_permits(3);
    wait_until(Duration::from_secs(5), || async {
        (harness.state.queue.snapshot().stats.completed == 3).then_some(())
    })
    .await;
}

// ---------------------------------------------------------------------------
// Test: snapshot is newest-first with per-status counts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn snapshot_reports_jobs_and_stats() {
    let gate = Arc::new(Semaphore::new(0));
    let harness = common::harness_with(MockProvider::gated(Arc::clone(&gate))).await;

    post_json(&harness.app, "/api/v1/generations", generation_body("first")).await;
    post_json(&harness.app, "/api/v1/generations", generation_body("second")).await;

    wait_until(Duration::from_secs(5), || async {
        (harness.state.queue.snapshot().stats.processing == 1).then_some(())
    })
    .await;

    let snapshot = body_json(get(&harness.app, "/api/v1/queue").await).await;
    let jobs = snapshot["data"]["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["request"]["prompt"], "second");
    assert_eq!(snapshot["data"]["stats"]["processing"], 1);
    assert_eq!(snapshot["data"]["stats"]["pending"], 1);

    gate.add_permits(2);
}
