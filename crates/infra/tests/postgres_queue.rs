//! Lock-and-skip claiming against a real Postgres.
//!
//! Requires `DATABASE_URL`; run with `cargo test -p tailor-infra -- --ignored`.

use std::collections::HashSet;
use std::sync::Arc;

use tailor_core::{RunId, TailorError, UserId};
use tailor_infra::db;
use tailor_infra::{
    JobStatus, JobStore, PostgresJobStore, PostgresResumeStore, PostgresRunStore, RunRepository,
};

async fn setup() -> Option<sqlx::PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = db::connect(&url, 10).await.expect("connect");
    db::run_migrations(&pool).await.expect("migrate");
    sqlx::query("TRUNCATE run_artifacts, run_reports, jobs, runs, resumes")
        .execute(&pool)
        .await
        .expect("truncate");
    Some(pool)
}

async fn seed_runs(pool: &sqlx::PgPool, n: usize) -> Vec<RunId> {
    let resumes = PostgresResumeStore::new(pool.clone());
    let runs = PostgresRunStore::new(pool.clone());
    let user = UserId::new();
    let resume = resumes.create_resume(user, "Backend", "Rust").await.expect("resume");
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let run = runs.create_run(user, resume.id, &format!("job {i}")).await.expect("run");
        ids.push(run.id);
    }
    ids
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn concurrent_claimers_never_share_a_job() {
    let Some(pool) = setup().await else { return };
    let store = Arc::new(PostgresJobStore::new(pool.clone()).with_max_attempts(3));

    let mut enqueued = HashSet::new();
    for run_id in seed_runs(&pool, 40).await {
        enqueued.insert(store.enqueue(run_id).await.expect("enqueue"));
    }

    let mut handles = Vec::new();
    for w in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let worker_id = format!("worker-{w}");
            let mut claimed = Vec::new();
            loop {
                match store.claim_next(&worker_id).await {
                    Ok(job) => {
                        assert_eq!(job.status, JobStatus::Running);
                        assert_eq!(job.attempts, 1);
                        claimed.push(job.id);
                    }
                    Err(TailorError::NoWorkAvailable) => break,
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
            claimed
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.expect("join") {
            assert!(seen.insert(id), "job {id} claimed twice");
        }
    }
    assert_eq!(seen, enqueued);
}

#[tokio::test]
#[ignore]
async fn requeue_then_done_keeps_attempts() {
    let Some(pool) = setup().await else { return };
    let store = PostgresJobStore::new(pool.clone()).with_max_attempts(2);
    let run_id = seed_runs(&pool, 1).await[0];
    let job_id = store.enqueue(run_id).await.expect("enqueue");

    let job = store.claim_next("worker-a").await.expect("claim");
    store.mark_failed(job.id, "boom", job.can_retry()).await.expect("requeue");
    let requeued = store.get(job_id).await.expect("get");
    assert_eq!(requeued.status, JobStatus::Queued);
    assert!(requeued.locked_by.is_none());

    let job = store.claim_next("worker-b").await.expect("reclaim");
    assert_eq!(job.attempts, 2);
    store.mark_done(job.id).await.expect("done");

    let done = store.get(job_id).await.expect("get");
    assert_eq!(done.status, JobStatus::Done);
    assert_eq!(done.attempts, 2);
    assert_eq!(store.claim_next("worker-a").await.unwrap_err(), TailorError::NoWorkAvailable);
}

#[tokio::test]
#[ignore]
async fn nil_run_is_rejected_before_insert() {
    let Some(pool) = setup().await else { return };
    let store = PostgresJobStore::new(pool);
    let err = store.enqueue(RunId::nil()).await.unwrap_err();
    assert!(matches!(err, TailorError::InvalidInput(_)));
    assert_eq!(store.stats().await.expect("stats").total(), 0);
}
