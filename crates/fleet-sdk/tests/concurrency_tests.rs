//! 并发与生命周期测试
//!
//! 验证两个相互独立的时间域（采样定时器、传输层投递路径）同时工作时：
//! 1. 命令在独立投递线程上被处理，不阻塞采样与发布
//! 2. 发布与采样交错时快照中的值不会被撕裂
//! 3. stop() 与 close() 在任意时刻调用都不会死锁
//! 4. 传输层关闭使客户端进入终态

use bytes::Bytes;
use crossbeam_channel::bounded;
use fleet_sdk::client::RecordingReporter;
use fleet_sdk::prelude::*;
use fleet_sdk::protocol::decode_state;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn threaded_client(name: &str) -> (FleetClient, Arc<LoopbackTransport>) {
    let transport = Arc::new(LoopbackTransport::threaded());
    let client = FleetClient::builder(name)
        .transport(transport.clone())
        .reporter(Arc::new(RecordingReporter::new()))
        .publish_interval(Duration::from_millis(5))
        .build()
        .unwrap();
    (client, transport)
}

#[test]
fn test_commands_delivered_on_separate_thread() {
    let (client, transport) = threaded_client("r1");
    let (tx, rx) = bounded(16);
    client.on_resume(move |task_id| {
        let _ = tx.try_send((thread::current().id(), task_id.to_string()));
    });

    let handle = client.run_async().unwrap();
    for i in 0..10 {
        let payload = format!(r#"{{"type":"resume_request","task_id":"t-{}"}}"#, i);
        transport
            .inject(client.command_topic(), Bytes::from(payload))
            .unwrap();
    }

    let mut received = Vec::new();
    for _ in 0..10 {
        let (thread_id, task_id) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_ne!(thread_id, thread::current().id());
        received.push(task_id);
    }
    // 回环投递线程按入队顺序投递
    let expected: Vec<String> = (0..10).map(|i| format!("t-{}", i)).collect();
    assert_eq!(received, expected);

    handle.stop();
    assert!(handle.wait().is_ok());
}

#[test]
fn test_samplers_and_publisher_run_independently() {
    let (client, transport) = threaded_client("r1");
    let pose_samples = Arc::new(AtomicUsize::new(0));
    let pose_samples_clone = pose_samples.clone();

    client
        .register_provider(Arc::new(
            PoseProvider::from_fn(
                move |_, _, _| {
                    let n = pose_samples_clone.fetch_add(1, Ordering::SeqCst) as f64;
                    // x 与 y 总是成对出现，用于检测撕裂
                    Ok(Pose2D::new(n, n * 2.0, 0.0))
                },
                "base_link",
                "L1",
            )
            .with_interval(Duration::from_millis(1)),
        ))
        .unwrap();
    client
        .register_provider(Arc::new(
            BatteryLevelProvider::from_fn(|| Ok(0.75)).with_interval(Duration::from_millis(3)),
        ))
        .unwrap();

    let handle = client.run_async().unwrap();
    let state_topic = client.state_topic().to_string();
    assert!(wait_until(Duration::from_secs(3), || {
        transport.published(&state_topic).len() >= 5
    }));
    handle.stop();

    assert!(pose_samples.load(Ordering::SeqCst) > 0);
    for payload in transport.published(&state_topic) {
        let state = decode_state(&payload).unwrap();
        if let Some(location) = state.location {
            assert_eq!(location.y, location.x * 2.0);
        }
    }
    let metrics = client.metrics().snapshot();
    assert!(metrics.samples_ok >= 2);
    assert_eq!(metrics.sample_failures, 0);
}

#[test]
fn test_stop_from_command_handler() {
    let (client, transport) = threaded_client("r1");
    let client = Arc::new(client);
    let weak = Arc::downgrade(&client);
    let (tx, rx) = bounded(1);
    client.on_action(move |request| {
        if request.action_name == "shutdown"
            && let Some(client) = weak.upgrade()
        {
            // 在投递线程上停止：不能 join 投递线程自身
            client.stop();
            let _ = tx.try_send(());
        }
    });

    let handle = client.run_async().unwrap();
    assert_eq!(
        client.handle_command_payload(
            br#"{"type":"action_request","task_id":"t-1","action_name":"noop"}"#
        ),
        CommandOutcome::Dispatched(CommandKind::Action)
    );
    assert!(!handle.wait_timeout(Duration::from_millis(20)));

    transport
        .inject(
            client.command_topic(),
            Bytes::from_static(
                br#"{"type":"action_request","task_id":"t-2","action_name":"shutdown"}"#,
            ),
        )
        .unwrap();
    rx.recv_timeout(Duration::from_secs(2)).unwrap();

    assert!(handle.wait_timeout(Duration::from_secs(2)));
    assert_eq!(client.state(), ClientState::Stopped);
    assert!(transport.is_closed());
    assert!(handle.wait().is_ok());
}

#[test]
fn test_close_from_delivery_thread_stops_client() {
    let (client, transport) = threaded_client("r1");
    let weak_transport = Arc::downgrade(&transport);
    let (tx, rx) = bounded(1);
    client.on_pause(move |_task_id| {
        if let Some(transport) = weak_transport.upgrade() {
            transport.close();
        }
        let _ = tx.try_send(());
    });

    let handle = client.run_async().unwrap();
    transport
        .inject(
            client.command_topic(),
            Bytes::from_static(br#"{"type":"pause_request","task_id":"t-1"}"#),
        )
        .unwrap();
    rx.recv_timeout(Duration::from_secs(2)).unwrap();

    // 下一次发布发现通道已关闭，客户端进入终态
    let result = handle.wait();
    assert!(matches!(result, Err(ClientError::Transport(TransportError::Closed))));
    assert_eq!(client.state(), ClientState::Stopped);
    assert!(matches!(client.run_async(), Err(ClientError::AlreadyStopped)));
}

#[test]
fn test_concurrent_stop_calls() {
    let (client, _transport) = threaded_client("r1");
    client
        .register_provider(Arc::new(BatteryLevelProvider::from_fn(|| Ok(0.5))))
        .unwrap();
    let client = Arc::new(client);
    let handle = client.run_async().unwrap();

    let stoppers: Vec<_> = (0..4)
        .map(|_| {
            let client = client.clone();
            thread::spawn(move || client.stop())
        })
        .collect();
    for stopper in stoppers {
        stopper.join().unwrap();
    }

    assert!(handle.wait_timeout(Duration::from_secs(2)));
    assert_eq!(client.state(), ClientState::Stopped);
}

#[test]
fn test_run_blocks_until_stopped() {
    let (client, _transport) = threaded_client("r1");
    let client = Arc::new(client);

    let runner = {
        let client = client.clone();
        thread::spawn(move || client.run())
    };

    assert!(wait_until(Duration::from_secs(2), || client.is_running()));
    assert!(!runner.is_finished());
    client.stop();

    let result = runner.join().unwrap();
    assert!(result.is_ok());
}
