//! Several worker instances sharing one store
//!
//! Claims are atomic in the store, so no job may run twice.

mod common;

use analysis_worker_core::application::Worker;
use analysis_worker_core::domain::JobStatus;
use analysis_worker_core::port::time_provider::SystemTimeProvider;
use analysis_worker_core::port::JobStore;
use common::{fast_config, wait_for_terminal, Enqueuer, RecordingProcessor, TempDb};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_single_winner() {
    let db = TempDb::new();
    let store = db.store().await;
    let enqueuer = Enqueuer::new(store.clone());
    let id = enqueuer.enqueue("food_analysis", 0, 3).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        // Separate pools: each claimant behaves like its own process
        let store = db.store().await;
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            store.claim(&id, &format!("worker-{}", i), 1_000 + i).await.unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let job = store.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Processing);
    assert!(job.worker_id.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_workers_never_double_execute() {
    let db = TempDb::new();
    let store_a = db.store().await;
    let store_b = db.store().await;

    let enqueuer = Enqueuer::new(store_a.clone());
    let mut ids = Vec::new();
    for i in 0..20 {
        ids.push(enqueuer.enqueue("exam_analysis", i % 3, 3).await);
    }

    let processor = Arc::new(RecordingProcessor::new(Duration::from_millis(20)));
    let worker_a = Worker::new(
        fast_config("worker-a", 3),
        store_a.clone(),
        processor.clone(),
        Arc::new(SystemTimeProvider),
    )
    .unwrap();
    let worker_b = Worker::new(
        fast_config("worker-b", 3),
        store_b.clone(),
        processor.clone(),
        Arc::new(SystemTimeProvider),
    )
    .unwrap();

    worker_a.start().unwrap();
    worker_b.start().unwrap();
    let jobs = wait_for_terminal(store_a.as_ref(), &ids).await;
    worker_a.stop().await;
    worker_b.stop().await;

    assert!(jobs.iter().all(|j| j.status == JobStatus::Completed));
    assert!(jobs.iter().all(|j| j.attempts == 1));

    let mut runs: HashMap<String, usize> = HashMap::new();
    for execution in processor.executions() {
        *runs.entry(execution.job_id).or_default() += 1;
    }
    assert_eq!(runs.len(), ids.len());
    assert!(runs.values().all(|&n| n == 1), "double execution: {:?}", runs);

    // Each job records the worker that actually executed it
    for execution in processor.executions() {
        let job = jobs.iter().find(|j| j.id == execution.job_id).unwrap();
        assert_eq!(job.worker_id.as_deref(), Some(execution.worker_id.as_str()));
    }
    assert!(processor.peak_concurrency() <= 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_queue_depth_visible_to_all_instances() {
    let db = TempDb::new();
    let store_a = db.store().await;
    let store_b = db.store().await;

    let enqueuer = Enqueuer::new(store_a.clone());
    for _ in 0..4 {
        enqueuer.enqueue("food_analysis", 0, 3).await;
    }

    assert_eq!(store_b.count_by_status(JobStatus::Pending).await.unwrap(), 4);
    let fetched = store_b.fetch_pending(10).await.unwrap();
    assert!(store_b
        .claim(&fetched[0].id, "worker-b", 5_000)
        .await
        .unwrap());
    assert_eq!(
        enqueuer.service().count(JobStatus::Processing).await.unwrap(),
        1
    );
}
