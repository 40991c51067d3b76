use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};

use raas_lite::clock::{Clock, ManualClock};
use raas_lite::config::RaasConfig;
use raas_lite::error::RaasError;
use raas_lite::scheduler::registry::HardwareRegistry;
use raas_lite::scheduler::{
    Coordinator, Dispatch, JobId, JobOutcome, JobQueue, JobStatus, NewJob, SubmitOutcome,
};
use raas_lite::store::{JobStore, MemoryJobStore};

fn test_config() -> RaasConfig {
    RaasConfig {
        liveness_timeout_ms: 5_000,
        history_capacity: 3,
        ..RaasConfig::default().with_hardware(["rig1", "rig2"])
    }
}

fn setup(config: &RaasConfig) -> (Coordinator, Arc<MemoryJobStore>, Arc<ManualClock>) {
    let store = Arc::new(MemoryJobStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let coordinator = Coordinator::new(config, store.clone(), clock.clone());
    (coordinator, store, clock)
}

fn ok_outcome(output: &str) -> JobOutcome {
    JobOutcome {
        output: output.to_string(),
        result_data: Some(serde_json::json!({"rewards": [0.5, 1.0]})),
        failed: false,
    }
}

async fn submit(coordinator: &Coordinator, user: &str, project: &str) -> JobId {
    coordinator
        .submit(NewJob::new(user, project, "https://example.com/repo"))
        .await
        .unwrap()
        .job()
        .id
}

// ==================== Submit ====================

#[tokio::test]
async fn test_submit_creates_queued_job() {
    let (coordinator, store, clock) = setup(&test_config());

    let outcome = coordinator
        .submit(NewJob::new("alice", "p1", "u"))
        .await
        .unwrap();
    let job = match outcome {
        SubmitOutcome::Created(job) => job,
        other => panic!("expected a new job, got {other:?}"),
    };
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.submit_time, clock.now());
    assert!(job.hardware_name.is_none());

    coordinator.flush().await;
    let stored = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(stored, job);
}

#[tokio::test]
async fn test_duplicate_submission_is_coalesced_regardless_of_url() {
    let (coordinator, store, _clock) = setup(&test_config());

    let first = coordinator
        .submit(NewJob::new("alice", "p1", "https://a"))
        .await
        .unwrap();
    let second = coordinator
        .submit(NewJob::new("alice", "p1", "https://b"))
        .await
        .unwrap();

    assert!(!first.is_duplicate());
    assert!(second.is_duplicate());
    assert_eq!(first.job().id, second.job().id);
    assert_eq!(second.job().source_url, "https://a");

    coordinator.flush().await;
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_duplicate_check_covers_running_jobs() {
    let (coordinator, _store, _clock) = setup(&test_config());

    let id = submit(&coordinator, "alice", "p1").await;
    coordinator.dispatch("rig1").await.unwrap();

    let again = coordinator
        .submit(NewJob::new("alice", "p1", "u"))
        .await
        .unwrap();
    assert!(again.is_duplicate());
    assert_eq!(again.job().id, id);
    assert_eq!(again.job().status, JobStatus::Running);
}

#[tokio::test]
async fn test_resubmission_after_completion_creates_new_job() {
    let (coordinator, store, _clock) = setup(&test_config());

    let first = submit(&coordinator, "alice", "p1").await;
    coordinator.dispatch("rig1").await.unwrap();
    coordinator.complete(first, ok_outcome("ok")).await.unwrap();

    let second = coordinator
        .submit(NewJob::new("alice", "p1", "u"))
        .await
        .unwrap();
    assert!(!second.is_duplicate());
    assert_ne!(second.job().id, first);

    coordinator.flush().await;
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn test_different_user_same_project_is_not_duplicate() {
    let (coordinator, _store, _clock) = setup(&test_config());

    let a = submit(&coordinator, "alice", "p1").await;
    let b = submit(&coordinator, "bob", "p1").await;
    assert_ne!(a, b);
    assert_eq!(coordinator.list_view().await.queued.len(), 2);
}

#[tokio::test]
async fn test_invalid_submission_rejected() {
    let (coordinator, _store, _clock) = setup(&test_config());

    let err = coordinator
        .submit(NewJob::new("alice", "  ", "u"))
        .await
        .unwrap_err();
    assert!(matches!(err, RaasError::Validation(_)));
    assert!(coordinator.list_view().await.is_empty());
}

// ==================== Dispatch ====================

#[tokio::test]
async fn test_dispatch_is_fifo() {
    let (coordinator, _store, clock) = setup(&test_config());

    let mut submitted = Vec::new();
    for n in 0..5 {
        submitted.push(submit(&coordinator, "alice", &format!("p{n}")).await);
        clock.advance(Duration::milliseconds(10));
    }

    let mut dispatched = Vec::new();
    while let Dispatch::Assigned(job) = coordinator.dispatch("rig1").await.unwrap() {
        dispatched.push(job.id);
    }
    assert_eq!(dispatched, submitted);
}

#[tokio::test]
async fn test_dispatch_marks_job_running() {
    let (coordinator, store, clock) = setup(&test_config());

    let id = submit(&coordinator, "alice", "p1").await;
    clock.advance(Duration::seconds(3));

    let job = coordinator.dispatch("rig2").await.unwrap().into_job().unwrap();
    assert_eq!(job.id, id);
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.hardware_name.as_deref(), Some("rig2"));
    assert_eq!(job.start_time, Some(clock.now()));
    assert!(job.start_time.unwrap() >= job.submit_time);

    let view = coordinator.list_view().await;
    assert!(view.queued.is_empty());
    assert_eq!(view.running.len(), 1);

    coordinator.flush().await;
    let stored = store.get_job(id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Running);
    assert_eq!(stored.hardware_name.as_deref(), Some("rig2"));
}

#[tokio::test]
async fn test_dispatch_on_empty_queue_returns_no_job() {
    let (coordinator, _store, _clock) = setup(&test_config());

    let result = coordinator.dispatch("rig1").await.unwrap();
    assert_eq!(result, Dispatch::NoJobAvailable);
}

#[tokio::test]
async fn test_dispatch_rejects_blank_hardware_name() {
    let (coordinator, _store, _clock) = setup(&test_config());
    let id = submit(&coordinator, "alice", "p1").await;

    for name in ["", "   "] {
        let err = coordinator.dispatch(name).await.unwrap_err();
        assert!(matches!(err, RaasError::Validation(_)));
    }
    assert_eq!(coordinator.list_view().await.queued[0].id, id);

    // Surrounding whitespace is not part of the rig name.
    let job = coordinator.dispatch(" rig1 ").await.unwrap().into_job().unwrap();
    assert_eq!(job.hardware_name.as_deref(), Some("rig1"));
    assert!(coordinator.is_alive("rig1").await);
}

#[tokio::test]
async fn test_poll_counts_as_heartbeat_even_without_work() {
    let (coordinator, _store, clock) = setup(&test_config());

    assert!(!coordinator.is_alive("rig1").await);
    coordinator.dispatch("rig1").await.unwrap();
    assert!(coordinator.is_alive("rig1").await);

    clock.advance(Duration::milliseconds(4_999));
    assert!(coordinator.is_alive("rig1").await);

    clock.advance(Duration::milliseconds(1));
    assert!(!coordinator.is_alive("rig1").await);
}

#[tokio::test]
async fn test_unknown_hardware_can_still_dispatch() {
    let (coordinator, _store, _clock) = setup(&test_config());

    let id = submit(&coordinator, "alice", "p1").await;
    let job = coordinator
        .dispatch("mystery-rig")
        .await
        .unwrap()
        .into_job()
        .unwrap();
    assert_eq!(job.id, id);
    assert_eq!(job.hardware_name.as_deref(), Some("mystery-rig"));

    let names: Vec<String> = coordinator
        .hardware_statuses()
        .await
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["rig1", "rig2"]);
}

#[tokio::test]
async fn test_concurrent_dispatch_claims_each_job_once() {
    let (coordinator, _store, _clock) = setup(&test_config());
    let coordinator = Arc::new(coordinator);

    for n in 0..10 {
        submit(&coordinator, "alice", &format!("p{n}")).await;
    }

    let mut handles = Vec::new();
    for n in 0..25 {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            let rig = if n % 2 == 0 { "rig1" } else { "rig2" };
            coordinator.dispatch(rig).await.unwrap().into_job()
        }));
    }

    let mut claimed = HashSet::new();
    let mut empty = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Some(job) => assert!(claimed.insert(job.id), "job claimed twice"),
            None => empty += 1,
        }
    }
    assert_eq!(claimed.len(), 10);
    assert_eq!(empty, 15);
    assert_eq!(coordinator.list_view().await.running.len(), 10);
}

// ==================== Complete ====================

#[tokio::test]
async fn test_complete_moves_job_to_history() {
    let (coordinator, store, clock) = setup(&test_config());

    let id = submit(&coordinator, "alice", "p1").await;
    coordinator.dispatch("rig1").await.unwrap();
    clock.advance(Duration::seconds(30));

    let job = coordinator.complete(id, ok_outcome("ok")).await.unwrap();
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.output.as_deref(), Some("ok"));
    assert_eq!(job.end_time, Some(clock.now()));
    assert!(job.result_data.is_some());

    let view = coordinator.list_view().await;
    assert!(view.running.is_empty());
    assert_eq!(view.completed.len(), 1);

    coordinator.flush().await;
    let stored = store.get_job(id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Complete);
    assert_eq!(stored.output.as_deref(), Some("ok"));
}

#[tokio::test]
async fn test_complete_with_failure_flag() {
    let (coordinator, _store, _clock) = setup(&test_config());

    let id = submit(&coordinator, "alice", "p1").await;
    coordinator.dispatch("rig1").await.unwrap();
    let job = coordinator
        .complete(
            id,
            JobOutcome {
                output: "motor stalled".into(),
                result_data: None,
                failed: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Failed);
}

#[tokio::test]
async fn test_complete_rejects_jobs_not_running() {
    let (coordinator, _store, _clock) = setup(&test_config());

    // Unknown id
    let err = coordinator
        .complete(JobId::new(), ok_outcome("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, RaasError::JobNotFound(_)));

    // Still queued
    let id = submit(&coordinator, "alice", "p1").await;
    let err = coordinator.complete(id, ok_outcome("x")).await.unwrap_err();
    assert!(matches!(err, RaasError::JobNotFound(_)));
    assert_eq!(coordinator.list_view().await.queued.len(), 1);

    // Already finished
    coordinator.dispatch("rig1").await.unwrap();
    coordinator.complete(id, ok_outcome("first")).await.unwrap();
    let err = coordinator
        .complete(id, ok_outcome("second"))
        .await
        .unwrap_err();
    assert!(matches!(err, RaasError::JobNotFound(_)));

    let job = coordinator.get_job(id).await.unwrap();
    assert_eq!(job.output.as_deref(), Some("first"));
}

#[tokio::test]
async fn test_completed_history_is_bounded() {
    let (coordinator, _store, clock) = setup(&test_config());

    let mut ids = Vec::new();
    for n in 0..4 {
        let id = submit(&coordinator, "alice", &format!("p{n}")).await;
        coordinator.dispatch("rig1").await.unwrap();
        clock.advance(Duration::seconds(1));
        coordinator.complete(id, ok_outcome("ok")).await.unwrap();
        ids.push(id);
    }

    let view = coordinator.list_view().await;
    assert_eq!(view.completed.len(), 3);
    let shown: Vec<JobId> = view.completed.iter().map(|j| j.id).collect();
    assert_eq!(shown, vec![ids[3], ids[2], ids[1]]);
}

#[tokio::test]
async fn test_get_job_falls_back_to_store_after_eviction() {
    let (coordinator, _store, clock) = setup(&test_config());

    let mut ids = Vec::new();
    for n in 0..4 {
        let id = submit(&coordinator, "alice", &format!("p{n}")).await;
        coordinator.dispatch("rig1").await.unwrap();
        clock.advance(Duration::seconds(1));
        coordinator.complete(id, ok_outcome("ok")).await.unwrap();
        ids.push(id);
    }
    coordinator.flush().await;

    let oldest = coordinator.get_job(ids[0]).await.unwrap();
    assert_eq!(oldest.status, JobStatus::Complete);

    let err = coordinator.get_job(JobId::new()).await.unwrap_err();
    assert!(matches!(err, RaasError::JobNotFound(_)));
}

// ==================== Listing, reset, recovery ====================

#[tokio::test]
async fn test_list_view_is_newest_first() {
    let (coordinator, _store, clock) = setup(&test_config());

    let a = submit(&coordinator, "alice", "a").await;
    clock.advance(Duration::seconds(1));
    let b = submit(&coordinator, "alice", "b").await;
    clock.advance(Duration::seconds(1));
    let c = submit(&coordinator, "alice", "c").await;
    clock.advance(Duration::seconds(1));
    let d = submit(&coordinator, "alice", "d").await;

    // a then b start
    coordinator.dispatch("rig1").await.unwrap();
    clock.advance(Duration::seconds(1));
    coordinator.dispatch("rig2").await.unwrap();

    let view = coordinator.list_view().await;
    assert_eq!(
        view.queued.iter().map(|j| j.id).collect::<Vec<_>>(),
        vec![d, c]
    );
    assert_eq!(
        view.running.iter().map(|j| j.id).collect::<Vec<_>>(),
        vec![b, a]
    );
}

#[tokio::test]
async fn test_reset_clears_memory_but_not_store() {
    let (coordinator, store, _clock) = setup(&test_config());

    let a = submit(&coordinator, "alice", "a").await;
    submit(&coordinator, "alice", "b").await;
    submit(&coordinator, "alice", "c").await;
    coordinator.dispatch("rig1").await.unwrap();
    coordinator.dispatch("rig1").await.unwrap();
    coordinator.complete(a, ok_outcome("ok")).await.unwrap();

    coordinator.reset().await;
    let view = coordinator.list_view().await;
    assert!(view.is_empty());
    assert_eq!(
        coordinator.dispatch("rig1").await.unwrap(),
        Dispatch::NoJobAvailable
    );

    coordinator.flush().await;
    assert_eq!(store.len().await, 3);

    // The key is free again once memory is cleared.
    let again = coordinator
        .submit(NewJob::new("alice", "b", "u"))
        .await
        .unwrap();
    assert!(!again.is_duplicate());
}

#[tokio::test]
async fn test_recover_restores_state_from_store() {
    let config = test_config();
    let (coordinator, store, clock) = setup(&config);

    let mut ids = Vec::new();
    for n in 0..6 {
        ids.push(submit(&coordinator, "alice", &format!("p{n}")).await);
        clock.advance(Duration::seconds(1));
    }
    // p0..p3 dispatched, p0..p2 finished; p4, p5 stay queued.
    for _ in 0..4 {
        coordinator.dispatch("rig1").await.unwrap();
        clock.advance(Duration::seconds(1));
    }
    for id in &ids[..3] {
        coordinator.complete(*id, ok_outcome("ok")).await.unwrap();
        clock.advance(Duration::seconds(1));
    }
    coordinator.flush().await;

    let restored = Coordinator::new(&config, store.clone(), clock.clone());
    let stats = restored.recover().await.unwrap();
    assert_eq!(stats.queued, 2);
    assert_eq!(stats.running, 1);
    assert_eq!(stats.completed, 3);

    let view = restored.list_view().await;
    assert_eq!(view.running[0].id, ids[3]);
    assert_eq!(view.completed[0].id, ids[2]);

    let next = restored.dispatch("rig2").await.unwrap().into_job().unwrap();
    assert_eq!(next.id, ids[4]);

    // The restored running job can still be completed.
    restored.complete(ids[3], ok_outcome("late")).await.unwrap();
}

#[tokio::test]
async fn test_reset_jobs_stay_gone_after_restart() {
    let config = test_config();
    let (coordinator, store, clock) = setup(&config);

    let old_alice = submit(&coordinator, "alice", "p1").await;
    let old_bob = submit(&coordinator, "bob", "p2").await;
    coordinator.dispatch("rig1").await.unwrap();

    coordinator.reset().await;
    let new_alice = submit(&coordinator, "alice", "p1").await;
    coordinator.flush().await;

    // Lists served from the store no longer show the dropped jobs.
    let queued = store.all_queued().await.unwrap();
    assert_eq!(queued.iter().map(|j| j.id).collect::<Vec<_>>(), vec![new_alice]);
    assert!(store.all_running().await.unwrap().is_empty());
    // The records themselves are kept.
    assert!(store.get_job(old_bob).await.unwrap().is_some());

    let restored = Coordinator::new(&config, store.clone(), clock.clone());
    let stats = restored.recover().await.unwrap();
    assert_eq!((stats.queued, stats.running, stats.completed), (1, 0, 0));

    let view = restored.list_view().await;
    let active_alice = view
        .queued
        .iter()
        .chain(view.running.iter())
        .filter(|j| j.user == "alice" && j.project_name == "p1")
        .count();
    assert_eq!(active_alice, 1);

    let next = restored.dispatch("rig2").await.unwrap().into_job().unwrap();
    assert_eq!(next.id, new_alice);
    assert_ne!(next.id, old_alice);
    assert_eq!(
        restored.dispatch("rig2").await.unwrap(),
        Dispatch::NoJobAvailable
    );
}

#[tokio::test]
async fn test_recover_keeps_fifo_for_equal_submit_times() {
    let config = test_config();
    let (coordinator, store, clock) = setup(&config);

    // The clock never moves, so every job shares one submit_time.
    let mut submitted = Vec::new();
    for n in 0..8 {
        submitted.push(submit(&coordinator, "alice", &format!("p{n}")).await);
    }
    coordinator.flush().await;

    let restored = Coordinator::new(&config, store.clone(), clock.clone());
    restored.recover().await.unwrap();

    // Numbering continues after the restored jobs.
    let late = submit(&restored, "bob", "late").await;
    submitted.push(late);

    let mut dispatched = Vec::new();
    while let Dispatch::Assigned(job) = restored.dispatch("rig1").await.unwrap() {
        dispatched.push(job.id);
    }
    assert_eq!(dispatched, submitted);
}

#[tokio::test]
async fn test_explicit_heartbeat_ignores_unknown_names() {
    let (coordinator, _store, _clock) = setup(&test_config());

    assert!(coordinator.heartbeat("rig2").await);
    assert!(!coordinator.heartbeat("ghost").await);

    let statuses = coordinator.hardware_statuses().await;
    assert_eq!(statuses.len(), 2);
    assert!(!statuses[0].alive);
    assert_eq!(statuses[1].name, "rig2");
    assert!(statuses[1].alive);
}

// ==================== Building blocks ====================

#[test]
fn test_registry_liveness_window() {
    let t0 = Utc::now();
    let mut registry = HardwareRegistry::new(["Omar", "Beth", "Goose"], Duration::seconds(10));

    assert!(!registry.is_alive("Beth", t0));
    assert!(registry.record_heartbeat("Beth", t0));
    assert!(registry.is_alive("Beth", t0 + Duration::seconds(9)));
    assert!(!registry.is_alive("Beth", t0 + Duration::seconds(10)));

    assert!(!registry.record_heartbeat("Nobody", t0));
    assert!(!registry.is_alive("Nobody", t0));

    let statuses = registry.list_statuses(t0);
    let names: Vec<&str> = statuses.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Beth", "Goose", "Omar"]);
    assert_eq!(
        statuses.iter().map(|s| s.alive).collect::<Vec<_>>(),
        vec![true, false, false]
    );
}

#[test]
fn test_job_queue_sets_are_disjoint() {
    let now = Utc::now();
    let mut queue = JobQueue::with_history_capacity(5);
    let job = raas_lite::scheduler::Job::new(NewJob::new("alice", "p1", "u"), now);
    let id = job.id;

    queue.enqueue(job);
    assert_eq!((queue.queued_len(), queue.running_len(), queue.completed_len()), (1, 0, 0));
    assert!(queue.find_active("alice", "p1").is_some());

    let mut job = queue.pop_next().unwrap();
    job.start("rig1", now).unwrap();
    queue.insert_running(job);
    assert_eq!((queue.queued_len(), queue.running_len(), queue.completed_len()), (0, 1, 0));
    assert!(queue.find_active("alice", "p1").is_some());

    let mut job = queue.take_running(&id).unwrap();
    job.finish(
        JobOutcome {
            output: String::new(),
            result_data: None,
            failed: false,
        },
        now,
    )
    .unwrap();
    queue.push_completed(job);
    assert_eq!((queue.queued_len(), queue.running_len(), queue.completed_len()), (0, 0, 1));
    assert!(queue.find_active("alice", "p1").is_none());
    assert_eq!(queue.get(&id).unwrap().status, JobStatus::Complete);
    assert_eq!(queue.len(), 1);
}
