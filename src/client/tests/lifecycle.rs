use super::*;

fn params() -> Vec<ParamAssignment> {
    vec![ParamAssignment::new("6", "text", "a red fox")]
}

#[tokio::test]
async fn test_submit_returns_task_id_and_emits_event() {
    let transport = StubTransport::new();
    transport.script_submit([SubmitStep::Accept("1869000000000000001".into())]);
    let (client, _temp_dir) = create_test_client(transport.clone());
    let mut events = client.subscribe();

    let task_id = client.submit(params(), true).await.unwrap();

    assert_eq!(task_id.as_str(), "1869000000000000001");
    let submitted = transport.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].workflow_or_app_id, "1900000000000000001");
    assert!(submitted[0].high_performance);
    assert_eq!(submitted[0].params, params());
    assert_eq!(
        drain_events(&mut events),
        vec![Event::TaskSubmitted { task_id }]
    );
}

#[tokio::test]
async fn test_submit_fixed_rejections_are_not_retried() {
    for msg in [
        "WORKFLOW_NOT_SAVED_OR_NOT_RUNNING",
        "WORKFLOW_NOT_FOUND",
        "INVALID_WORKFLOW_ID",
        "INVALID_API_KEY",
        "INSUFFICIENT_BALANCE",
    ] {
        let transport = StubTransport::new();
        transport.script_submit([SubmitStep::Reject {
            code: 1,
            msg: msg.into(),
        }]);
        let (client, _temp_dir) = create_test_client(transport.clone());

        let err = client.submit(params(), false).await.unwrap_err();

        assert!(matches!(err, Error::Business(_)), "{msg}: {err:?}");
        assert_eq!(transport.submit_calls.load(Ordering::SeqCst), 1, "{msg}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_submit_retries_transient_faults_with_backoff() {
    let transport = StubTransport::new();
    transport.script_submit([
        SubmitStep::Fault,
        SubmitStep::Reject {
            code: 500,
            msg: "SERVER_BUSY".into(),
        },
        SubmitStep::Accept("abc".into()),
    ]);
    let (client, _temp_dir) = create_test_client(transport.clone());

    let start = tokio::time::Instant::now();
    let task_id = client.submit(params(), false).await.unwrap();

    assert_eq!(task_id.as_str(), "abc");
    assert_eq!(transport.submit_calls.load(Ordering::SeqCst), 3);
    // 1s then 2s
    assert!(start.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_submit_exhaustion_wraps_last_error() {
    let transport = StubTransport::new();
    transport.script_submit([SubmitStep::Fault, SubmitStep::Fault, SubmitStep::Fault]);
    let (client, _temp_dir) = create_test_client(transport.clone());

    let err = client.submit(params(), false).await.unwrap_err();

    match err {
        Error::RetryExhausted {
            attempts, source, ..
        } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*source, Error::Transport(_)));
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
    assert_eq!(transport.submit_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_submit_requires_workflow_id() {
    let transport = StubTransport::new();
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.workflow_or_app_id = "  ".into();
    let client =
        RunningHubClient::with_parts(config, transport.clone(), Arc::new(crate::media::NoOpMediaTool))
            .unwrap();

    let err = client.submit(params(), false).await.unwrap_err();

    assert!(matches!(err, Error::Config { .. }));
    assert_eq!(transport.submit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_monitor_stops_at_first_artifacts() {
    let transport = StubTransport::new();
    transport.always(
        "t1",
        StatusResult::Artifacts(vec![artifact("https://cdn/a.png", "png")]),
    );
    let (client, _temp_dir) = create_test_client(transport.clone());

    let completion = client
        .monitor(&TaskId::new("t1"), Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(
        completion,
        Completion::Artifacts(vec![artifact("https://cdn/a.png", "png")])
    );
    assert_eq!(transport.poll_count("t1"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_times_out_within_one_interval() {
    let transport = StubTransport::new();
    let (client, _temp_dir) = create_test_client(transport.clone());
    let mut events = client.subscribe();
    let timeout = Duration::from_secs(1);

    let start = tokio::time::Instant::now();
    let err = client
        .monitor(&TaskId::new("slow"), timeout)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout { seconds: 1, .. }), "{err:?}");
    assert!(start.elapsed() <= timeout + client.config.polling.poll_interval);
    assert!(transport.poll_count("slow") >= 1);
    assert!(drain_events(&mut events).iter().any(|e| matches!(
        e,
        Event::TaskFailed {
            state: TaskState::TimedOut,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_monitor_treats_transport_faults_as_running() {
    let transport = StubTransport::new();
    transport.script_polls(
        "t1",
        [
            PollStep::Fault,
            PollStep::Fault,
            PollStep::Status(StatusResult::CompletedNoOutput),
        ],
    );
    let (client, _temp_dir) = create_test_client(transport.clone());

    let completion = client
        .monitor(&TaskId::new("t1"), Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(completion, Completion::NoOutput);
    assert_eq!(transport.poll_count("t1"), 3);
}

#[tokio::test]
async fn test_monitor_fails_on_error_status() {
    let transport = StubTransport::new();
    transport.always(
        "t1",
        StatusResult::Error {
            message: "APIKEY_TASK_STATUS_ERROR: node 3 failed".into(),
        },
    );
    let (client, _temp_dir) = create_test_client(transport.clone());
    let mut events = client.subscribe();

    let err = client
        .monitor(&TaskId::new("t1"), Duration::from_secs(60))
        .await
        .unwrap_err();

    match err {
        Error::TaskFailed { task_id, message } => {
            assert_eq!(task_id.as_str(), "t1");
            assert!(message.contains("node 3 failed"));
        }
        other => panic!("expected TaskFailed, got {other:?}"),
    }
    assert_eq!(transport.poll_count("t1"), 1);
    assert!(drain_events(&mut events).iter().any(|e| matches!(
        e,
        Event::TaskFailed {
            state: TaskState::Error,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_monitor_reports_changes_and_heartbeats() {
    let transport = StubTransport::new();
    let mut steps = vec![PollStep::Status(StatusResult::Queued)];
    steps.extend(std::iter::repeat_n(PollStep::Status(StatusResult::Running), 5));
    steps.push(PollStep::Status(StatusResult::Artifacts(vec![artifact(
        "https://cdn/a.png",
        "png",
    )])));
    transport.script_polls("t1", steps);
    let (client, _temp_dir) = create_test_client(transport.clone());
    let mut events = client.subscribe();

    client
        .monitor(&TaskId::new("t1"), Duration::from_secs(600))
        .await
        .unwrap();

    let events = drain_events(&mut events);
    let changes: Vec<TaskState> = events
        .iter()
        .filter_map(|e| match e {
            Event::TaskStatusChanged { state, .. } => Some(*state),
            _ => None,
        })
        .collect();
    assert_eq!(
        changes,
        vec![TaskState::Queued, TaskState::Running, TaskState::Completed]
    );
    assert!(
        events
            .iter()
            .any(|e| matches!(e, Event::TaskHeartbeat { state: TaskState::Running, .. }))
    );
    assert!(events.contains(&Event::TaskCompleted {
        task_id: TaskId::new("t1"),
        artifacts: 1,
        state: TaskState::Completed,
    }));
}

#[tokio::test]
async fn test_execute_materializes_outputs() {
    let transport = StubTransport::new();
    transport.script_submit([SubmitStep::Accept("t1".into())]);
    transport.always(
        "t1",
        StatusResult::Artifacts(vec![
            artifact("https://cdn/a.png", "png"),
            artifact("https://cdn/a.txt", "txt"),
        ]),
    );
    transport.serve("https://cdn/a.png", png_bytes(4, 3, [255, 0, 0]));
    transport.serve("https://cdn/a.txt", b"caption".to_vec());
    let (client, _temp_dir) = create_test_client(transport.clone());

    let output = client
        .execute(params(), Duration::from_secs(60), false, false, "RH")
        .await
        .unwrap();

    assert_eq!(output.task_id.as_str(), "t1");
    assert_eq!(output.result.images.len(), 1);
    assert_eq!(output.result.images[0].shape(), (3, 4, 3));
    assert_eq!(output.result.text, "caption");
    // the manifest from monitoring is reused
    assert_eq!(transport.poll_count("t1"), 1);
}

#[tokio::test]
async fn test_execute_without_output_yields_placeholders() {
    let transport = StubTransport::new();
    transport.script_submit([SubmitStep::Accept("t1".into())]);
    transport.always("t1", StatusResult::CompletedNoOutput);
    let (client, _temp_dir) = create_test_client(transport.clone());

    let output = client
        .execute(params(), Duration::from_secs(60), false, true, "RH")
        .await
        .unwrap();

    assert_eq!(output.result, AggregatedResult::no_output());
    assert_eq!(
        output.result.images[0].label.as_deref(),
        Some("No image output")
    );
}
