
use jobmesh::error::MeshError;
use jobmesh::job::{JobStatus, JobStore};
use test_harness::{job_request, StubExecutor, TestNodeBuilder};

#[tokio::test]
async fn accepted_job_is_persisted_and_launched() {
    let node = TestNodeBuilder::new().build();

    let job = node.admission.submit(job_request(None)).await.unwrap();

    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.status_message, "Job is running");
    assert_eq!(job.host_name.as_deref(), Some("node-a"));
    assert_eq!(
        job.kill_uri.as_deref(),
        Some(format!("http://node-a:7001/api/v1/jobs/{}", job.id).as_str())
    );
    assert_eq!(
        job.output_uri.as_deref(),
        Some(format!("http://node-a:7001/job-output/{}", job.id).as_str())
    );
    assert!(job.process_handle.is_some());
    assert_eq!(job.execution_cluster_id.as_deref(), Some("cluster-1"));

    let stored = node.store.get(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Running);
    assert_eq!(node.executor.launched.lock().await.len(), 1);
    assert_eq!(node.stats.snapshot().submitted, 1);
}

#[tokio::test]
async fn client_supplied_id_is_kept() {
    let node = TestNodeBuilder::new().build();
    let job = node
        .admission
        .submit(job_request(Some("job-42")))
        .await
        .unwrap();
    assert_eq!(job.id, "job-42");
}

#[tokio::test]
async fn invalid_requests_are_rejected_without_side_effects() {
    let node = TestNodeBuilder::new().build();

    let mut missing_owner = job_request(None);
    missing_owner.owner = String::new();
    assert!(matches!(
        node.admission.submit(missing_owner).await,
        Err(MeshError::InvalidRequest(_))
    ));

    let mut missing_command = job_request(None);
    missing_command.command_name = None;
    missing_command.command_id = None;
    assert!(matches!(
        node.admission.submit(missing_command).await,
        Err(MeshError::InvalidRequest(_))
    ));

    let mut bad_type = job_request(None);
    bad_type.job_type = "SPARK".to_string();
    assert!(matches!(
        node.admission.submit(bad_type).await,
        Err(MeshError::InvalidRequest(_))
    ));

    assert!(node.store.all().await.is_empty());
    assert!(node.executor.launched.lock().await.is_empty());
}

#[tokio::test]
async fn duplicate_id_conflicts() {
    let node = TestNodeBuilder::new().build();
    node.admission
        .submit(job_request(Some("job-1")))
        .await
        .unwrap();

    let result = node.admission.submit(job_request(Some("job-1"))).await;
    assert!(matches!(result, Err(MeshError::Conflict(_))));
}

#[tokio::test]
async fn concurrent_same_id_submissions_yield_one_success_one_conflict() {
    let node = TestNodeBuilder::new().build();

    let a = {
        let admission = node.admission.clone();
        tokio::spawn(async move { admission.submit(job_request(Some("dup"))).await })
    };
    let b = {
        let admission = node.admission.clone();
        tokio::spawn(async move { admission.submit(job_request(Some("dup"))).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(MeshError::Conflict(_))))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(node.store.all().await.len(), 1);
}

#[tokio::test]
async fn submissions_beyond_capacity_are_rejected() {
    // forward threshold above the cap so forwarding never triggers
    let node = TestNodeBuilder::new()
        .max_running_jobs(2)
        .forward_threshold(100)
        .build();

    node.admission
        .submit(job_request(Some("a")))
        .await
        .unwrap();
    node.admission
        .submit(job_request(Some("b")))
        .await
        .unwrap();

    let result = node.admission.submit(job_request(Some("c"))).await;
    match result {
        Err(MeshError::CapacityExceeded(message)) => {
            // the configured limit shows up in the message
            assert!(message.contains("(2)"), "message was: {message}");
        }
        other => panic!("expected CapacityExceeded, got {other:?}"),
    }
    assert_eq!(node.store.all().await.len(), 2);
    assert_eq!(node.stats.snapshot().rejected, 1);
}

#[tokio::test]
async fn concurrent_submissions_never_exceed_capacity() {
    let node = TestNodeBuilder::new()
        .max_running_jobs(10)
        .forward_threshold(100)
        .build();

    let mut handles = Vec::new();
    for i in 0..50 {
        let admission = node.admission.clone();
        handles.push(tokio::spawn(async move {
            admission.submit(job_request(Some(&format!("job-{i}")))).await
        }));
    }

    let mut admitted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(MeshError::CapacityExceeded(_)) => rejected += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(admitted, 10);
    assert_eq!(rejected, 40);
    assert_eq!(node.store.count_active().await, 10);
}

#[tokio::test]
async fn over_threshold_submission_is_forwarded_to_idler_peer() {
    let node = TestNodeBuilder::new()
        .max_running_jobs(10)
        .forward_threshold(1)
        .idlest("node-b")
        .build();

    // occupy one slot so the forward threshold is reached
    node.admission
        .submit(job_request(Some("local")))
        .await
        .unwrap();

    let job = node
        .admission
        .submit(job_request(Some("roaming")))
        .await
        .unwrap();

    // the peer's response is returned verbatim
    assert_eq!(job.host_name.as_deref(), Some("peer-host"));

    let submits = node.peers.submits.lock().await;
    assert_eq!(submits.len(), 1);
    let (uri, forwarded_request) = &submits[0];
    assert_eq!(uri, "http://node-b:7001/api/v1/jobs");
    assert!(forwarded_request.forwarded);
    assert_eq!(forwarded_request.id.as_deref(), Some("roaming"));

    // nothing persisted locally for the forwarded job
    assert!(node.store.get("roaming").await.is_err());
    assert_eq!(node.stats.snapshot().forwarded, 1);
}

#[tokio::test]
async fn forwarded_job_is_never_forwarded_again() {
    // this node is over its forward threshold and a idler peer exists,
    // but the incoming request was already forwarded once
    let node = TestNodeBuilder::new()
        .max_running_jobs(10)
        .forward_threshold(0)
        .idlest("node-b")
        .build();

    let mut request = job_request(Some("hop-1"));
    request.forwarded = true;
    let job = node.admission.submit(request).await.unwrap();

    // ran locally instead of bouncing to node-b
    assert_eq!(job.host_name.as_deref(), Some("node-a"));
    assert!(job.forwarded);
    assert!(node.peers.submits.lock().await.is_empty());
    assert!(node.store.get("hop-1").await.is_ok());
}

#[tokio::test]
async fn forwarded_job_is_rejected_when_peer_is_also_full() {
    let node = TestNodeBuilder::new()
        .max_running_jobs(0)
        .forward_threshold(0)
        .idlest("node-b")
        .build();

    let mut request = job_request(Some("hop-1"));
    request.forwarded = true;
    let result = node.admission.submit(request).await;

    assert!(matches!(result, Err(MeshError::CapacityExceeded(_))));
    assert!(node.peers.submits.lock().await.is_empty());
}

#[tokio::test]
async fn no_forward_when_this_node_is_the_idlest() {
    let node = TestNodeBuilder::new()
        .max_running_jobs(10)
        .forward_threshold(0)
        .idlest("node-a")
        .build();

    let job = node.admission.submit(job_request(None)).await.unwrap();
    assert_eq!(job.host_name.as_deref(), Some("node-a"));
    assert!(!job.forwarded);
    assert!(node.peers.submits.lock().await.is_empty());
}

#[tokio::test]
async fn launch_failure_leaves_job_failed_with_message() {
    let node = TestNodeBuilder::new()
        .executor(StubExecutor::failing("no cluster matched"))
        .build();

    let job = node.admission.submit(job_request(Some("doomed"))).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.status_message.contains("no cluster matched"));

    let stored = node.store.get("doomed").await.unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(node.stats.snapshot().failed, 1);
}
