//! End-to-end tests driving a fake bundler through both dispatch modes

#![cfg(unix)]

mod common;

use std::io::Write;

use common::{fake_bundler, orchestrator, recorded_argv, settle, FAILED, FINISHED};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use warmpack_process::ProcessError;
use warmpack_worker::{
    args_file_path, run_persistent, run_standalone, WorkResponse, WorkerError, WorkerLoop,
};

fn args_file(dir: &TempDir, lines: &[&str]) -> String {
    let path = dir.path().join("args.params");
    let mut file = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    format!("@{}", path.display())
}

#[tokio::test]
async fn test_standalone_build_succeeds_and_closes_process() {
    let dir = TempDir::new().unwrap();
    let bundler = fake_bundler(&dir, &format!("echo {}", FINISHED));
    let arg = args_file(
        &dir,
        &[&bundler.to_string_lossy(), "base.json", "", "--stats"],
    );
    let orchestrator = orchestrator();

    let ok = run_standalone(
        &orchestrator,
        "Webpack",
        &args_file_path(&arg),
    )
    .await
    .unwrap();

    assert!(ok);
    assert_eq!(recorded_argv(&dir), "--config base.json --stats");

    settle().await;
    let process = orchestrator.supervisor().current().unwrap();
    assert!(!process.is_running().await);
}

#[tokio::test]
async fn test_standalone_merges_user_config() {
    let dir = TempDir::new().unwrap();
    let bundler = fake_bundler(&dir, &format!("echo {}", FINISHED));
    let arg = args_file(
        &dir,
        &[&bundler.to_string_lossy(), "base.json", "user.json", "--stats"],
    );
    let orchestrator = orchestrator();

    let ok = run_standalone(&orchestrator, "Webpack", &args_file_path(&arg))
        .await
        .unwrap();

    assert!(ok);
    assert_eq!(
        recorded_argv(&dir),
        "--config base.json --config user.json --merge --stats"
    );
}

#[tokio::test]
async fn test_standalone_args_reach_the_bundler_verbatim() {
    let dir = TempDir::new().unwrap();
    let arg = args_file(&dir, &["cfg.json", "", "user.json", "--verbose"]);
    let orchestrator = orchestrator();

    let err = run_standalone(&orchestrator, "Webpack", &args_file_path(&arg))
        .await
        .unwrap_err();

    // `cfg.json` is taken as the bundler and the empty base config is kept
    match err {
        WorkerError::Process(ProcessError::SpawnFailed { command, .. }) => {
            assert_eq!(command, "cfg.json --config  --config user.json --merge --verbose");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(orchestrator.supervisor().monitor().pending(), 0);
}

#[tokio::test]
async fn test_standalone_empty_base_config_is_passed_to_bundler() {
    let dir = TempDir::new().unwrap();
    let bundler = fake_bundler(&dir, &format!("echo {}", FINISHED));
    let arg = args_file(&dir, &[&bundler.to_string_lossy(), "", "user.json", "--verbose"]);
    let orchestrator = orchestrator();

    let ok = run_standalone(&orchestrator, "Webpack", &args_file_path(&arg))
        .await
        .unwrap();

    assert!(ok);
    assert_eq!(
        recorded_argv(&dir),
        "--config  --config user.json --merge --verbose"
    );
}

#[tokio::test]
async fn test_standalone_failure_is_error_and_still_closes_process() {
    let dir = TempDir::new().unwrap();
    let bundler = fake_bundler(&dir, &format!("echo 'ERROR in ./a.js'\necho {}", FAILED));
    let arg = args_file(&dir, &[&bundler.to_string_lossy(), "base.json"]);
    let orchestrator = orchestrator();

    let err = run_standalone(&orchestrator, "Webpack", &args_file_path(&arg))
        .await
        .unwrap_err();

    match err {
        WorkerError::CompilationFailed { diagnostics } => {
            assert_eq!(diagnostics, vec!["ERROR in ./a.js".to_string()]);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    settle().await;
    let process = orchestrator.supervisor().current().unwrap();
    assert!(!process.is_running().await);
}

#[tokio::test]
async fn test_persistent_worker_reuses_one_process() {
    let dir = TempDir::new().unwrap();
    let bundler = fake_bundler(
        &dir,
        &format!("echo {m}\nsleep 0.3\necho {m}\nsleep 0.3\necho {m}", m = FINISHED),
    );
    let bundler = bundler.to_string_lossy().to_string();
    let orchestrator = orchestrator();

    // Singleplex: one request at a time, each answered before the next
    for request_id in 0..3 {
        let input = format!(
            "{{\"arguments\":[\"{}\",\"base.json\"],\"requestId\":{}}}\n",
            bundler, request_id
        );
        let mut worker = WorkerLoop::new(input.as_bytes(), Vec::new(), "Webpack");
        worker.run(orchestrator.clone()).await.unwrap();

        let output = String::from_utf8(worker.into_writer()).unwrap();
        let response: WorkResponse = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(response.request_id, request_id);
        assert_eq!(response.exit_code, 0, "output: {}", response.output);
    }

    assert_eq!(orchestrator.supervisor().launch_count(), 1);
    orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_persistent_worker_reports_superseded_request_as_failed() {
    let dir = TempDir::new().unwrap();
    let bundler = fake_bundler(
        &dir,
        &format!("sleep 0.5\necho {m}\nsleep 0.3\necho {m}", m = FINISHED),
    );
    let bundler = bundler.to_string_lossy().to_string();
    let input = format!(
        "{{\"arguments\":[\"{b}\",\"base.json\"],\"requestId\":1}}\n\
         {{\"arguments\":[\"{b}\",\"base.json\"],\"requestId\":2}}\n",
        b = bundler
    );

    let (mut client, server) = tokio::io::duplex(64 * 1024);
    run_persistent(orchestrator(), "Webpack", input.as_bytes(), server)
        .await
        .unwrap();

    let mut output = String::new();
    client.read_to_string(&mut output).await.unwrap();
    let mut responses: Vec<WorkResponse> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    responses.sort_by_key(|r| r.request_id);

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].request_id, 1);
    assert_eq!(responses[0].exit_code, 1);
    assert_eq!(responses[1].request_id, 2);
    assert_eq!(responses[1].exit_code, 0);
}

#[tokio::test]
async fn test_persistent_worker_survives_failed_request() {
    let dir = TempDir::new().unwrap();
    let bundler = fake_bundler(
        &dir,
        &format!("echo {}\nsleep 0.3\necho {}", FAILED, FINISHED),
    );
    let bundler = bundler.to_string_lossy().to_string();
    let orchestrator = orchestrator();

    let first = orchestrator
        .emit_once(vec![bundler.clone(), "base.json".to_string()])
        .await;
    assert!(matches!(first, Err(WorkerError::CompilationFailed { .. })));

    let second = orchestrator
        .emit_once(vec![bundler, "base.json".to_string()])
        .await
        .unwrap();
    assert!(second);
    orchestrator.shutdown().await.unwrap();
}
