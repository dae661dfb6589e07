//! Start, stop and restart against real child processes.

use std::collections::HashSet;
use std::fs;
use std::time::{Duration, Instant};

use biome_monorepo_engine::{ExtensionState, OrchestratorEvent, StatusGlyph};

use crate::common::{
    RecordingHost, SERIAL, Workspace, eventually, initialize_request, orchestrator, starts,
};

/// Root install shared by the root and `packages/app` (hoisted), plus a
/// `packages/legacy` project pinned to its own install.
fn monorepo() -> (Workspace, std::path::PathBuf, std::path::PathBuf) {
    let ws = Workspace::new();
    ws.project("");
    ws.project("packages/app");
    ws.project("packages/legacy");
    ws.write("packages/docs/package.json", r#"{"name":"docs"}"#);
    let root_bin = ws.install_biome("", "1.9.4");
    let legacy_bin = ws.install_biome("packages/legacy", "1.8.3");
    (ws, root_bin, legacy_bin)
}

#[tokio::test]
async fn one_session_per_installation() {
    let _serial = SERIAL.lock().await;
    let (ws, root_bin, legacy_bin) = monorepo();
    let host = RecordingHost::default();
    let mut orch = orchestrator(&ws);

    let report = orch.start(&host).await;

    assert_eq!(report.started, 2, "failures: {:?}", report.failures);
    assert!(report.failures.is_empty());
    assert_eq!(orch.state(), ExtensionState::Running);
    assert_eq!(host.last_status(), Some(StatusGlyph::Ready));

    let mut versions: Vec<&str> = orch
        .sessions()
        .iter()
        .map(|s| s.version().as_str())
        .collect();
    versions.sort_unstable();
    assert_eq!(versions, vec!["1.8.3", "1.9.4"]);

    for session in orch.sessions() {
        assert!(session.is_running());
        assert_eq!(session.server_version(), Some(session.version().as_str()));
    }

    let root_session = orch
        .sessions()
        .iter()
        .find(|s| s.version().as_str() == "1.9.4")
        .unwrap();
    let names: Vec<String> = root_session.projects().iter().map(|p| p.name()).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"app".to_string()));

    assert_eq!(starts(&root_bin), 1);
    assert_eq!(starts(&legacy_bin), 1);

    orch.stop(&host).await;
}

#[tokio::test]
async fn initialize_advertises_only_the_sessions_projects() {
    let _serial = SERIAL.lock().await;
    let (ws, root_bin, legacy_bin) = monorepo();
    let host = RecordingHost::default();
    let mut orch = orchestrator(&ws);
    orch.start(&host).await;

    let legacy = initialize_request(&legacy_bin);
    let folders = legacy["params"]["workspaceFolders"].as_array().unwrap();
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0]["name"], "legacy");
    assert_eq!(legacy["params"]["rootUri"], folders[0]["uri"]);

    let root = initialize_request(&root_bin);
    let folders = root["params"]["workspaceFolders"].as_array().unwrap();
    assert_eq!(folders.len(), 2);
    let uris: Vec<&str> = folders.iter().map(|f| f["uri"].as_str().unwrap()).collect();
    assert!(uris.iter().any(|u| u.ends_with("/packages/app")));
    assert!(uris.iter().all(|u| !u.contains("legacy")));
    assert_eq!(root["params"]["clientInfo"]["name"], "biome-monorepo-lsp");

    orch.stop(&host).await;
}

#[tokio::test]
async fn stop_shuts_everything_down_once() {
    let _serial = SERIAL.lock().await;
    let (ws, _root_bin, _legacy_bin) = monorepo();
    ws.write("pnpm-lock.yaml", "lockfileVersion: '9.0'\n");
    let host = RecordingHost::default();
    let mut orch = orchestrator(&ws);
    orch.start(&host).await;
    assert!(orch.is_watching());

    orch.stop(&host).await;
    orch.stop(&host).await;

    assert_eq!(orch.state(), ExtensionState::Stopped);
    assert!(orch.sessions().is_empty());
    assert!(!orch.is_watching());
    assert_eq!(host.last_status(), None);
    let hides = host
        .statuses
        .lock()
        .unwrap()
        .iter()
        .filter(|s| s.is_none())
        .count();
    assert_eq!(hides, 1);
}

#[tokio::test]
async fn unanswered_shutdown_is_bounded_by_shutdown_timeout() {
    let _serial = SERIAL.lock().await;
    let ws = Workspace::new();
    ws.project("");
    let bin = ws.install_biome("", "1.9.4");
    fs::write(bin.join("hang-on-shutdown"), "").unwrap();
    let host = RecordingHost::default();
    let mut orch = orchestrator(&ws);
    assert_eq!(orch.start(&host).await.started, 1);

    // Requests may take 10s, shutdown gets 1s.
    let began = Instant::now();
    orch.stop(&host).await;

    assert!(
        began.elapsed() < Duration::from_secs(5),
        "stop took {:?}",
        began.elapsed()
    );
    assert_eq!(orch.state(), ExtensionState::Stopped);
}

#[tokio::test]
async fn restart_replaces_every_session() {
    let _serial = SERIAL.lock().await;
    let (ws, root_bin, legacy_bin) = monorepo();
    let host = RecordingHost::default();
    let mut orch = orchestrator(&ws);
    orch.start(&host).await;
    let before: HashSet<_> = orch.sessions().iter().map(|s| s.id()).collect();

    let report = orch.restart(&host).await;

    assert_eq!(report.started, 2);
    let after: HashSet<_> = orch.sessions().iter().map(|s| s.id()).collect();
    assert_eq!(after.len(), 2);
    assert!(before.is_disjoint(&after));
    assert_eq!(starts(&root_bin), 2);
    assert_eq!(starts(&legacy_bin), 2);
    assert_eq!(orch.restart_count(), 1);

    orch.stop(&host).await;
}

#[tokio::test]
async fn missing_binary_skips_only_that_installation() {
    let _serial = SERIAL.lock().await;
    let ws = Workspace::new();
    ws.project("apps/web");
    ws.project("apps/api");
    ws.install_biome("apps/web", "1.9.4");
    ws.install_package_only("apps/api", "1.9.4");
    let host = RecordingHost::default();
    let mut orch = orchestrator(&ws);

    let report = orch.start(&host).await;

    assert_eq!(report.started, 1);
    assert!(report.failures.is_empty());
    assert_eq!(orch.sessions().len(), 1);
    assert_eq!(orch.sessions()[0].projects()[0].name(), "web");

    orch.stop(&host).await;
}

#[tokio::test]
async fn failing_server_does_not_cancel_siblings() {
    let _serial = SERIAL.lock().await;
    let (ws, _root_bin, legacy_bin) = monorepo();
    fs::write(legacy_bin.join("fail-on-start"), "").unwrap();
    let host = RecordingHost::default();
    let mut orch = orchestrator(&ws);

    let report = orch.start(&host).await;

    assert_eq!(report.started, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].version.as_str(), "1.8.3");
    assert_eq!(orch.state(), ExtensionState::Running);
    assert_eq!(host.last_status(), Some(StatusGlyph::Ready));

    orch.stop(&host).await;
}

#[tokio::test]
async fn lock_file_change_restarts_once() {
    let _serial = SERIAL.lock().await;
    let (ws, root_bin, _legacy_bin) = monorepo();
    let lock = ws.write("package-lock.json", r#"{"lockfileVersion":3}"#);
    let host = RecordingHost::default();
    let mut orch = orchestrator(&ws);
    orch.start(&host).await;
    assert!(orch.is_watching());

    let events = orch.events();
    let driver = async {
        fs::write(&lock, r#"{"lockfileVersion":3,"packages":{}}"#).unwrap();
        let restarted = eventually(|| starts(&root_bin) == 2).await;
        // Give a duplicate event a chance to show up before shutting down.
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        events.send(OrchestratorEvent::Shutdown).await.unwrap();
        restarted
    };

    let ((), restarted) = tokio::join!(orch.run(&host), driver);

    assert!(restarted);
    assert_eq!(orch.restart_count(), 1);
    assert_eq!(starts(&root_bin), 2);
    assert_eq!(orch.state(), ExtensionState::Stopped);
}

#[tokio::test]
async fn channels_write_log_files() {
    let _serial = SERIAL.lock().await;
    let (ws, _root_bin, _legacy_bin) = monorepo();
    let logs = tempfile::tempdir().unwrap();
    let host = RecordingHost::default();
    let mut orch = biome_monorepo_engine::Orchestrator::new(crate::common::options(
        &ws,
        Some(logs.path().to_path_buf()),
    ))
    .unwrap();
    orch.start(&host).await;
    orch.stop(&host).await;

    let extension_log = orch.channel().log_path().unwrap().to_path_buf();
    let content = fs::read_to_string(extension_log).unwrap();
    assert!(content.contains("Starting extension..."));
    assert!(content.contains("find biome binaries"));

    let names: Vec<String> = fs::read_dir(logs.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.len() >= 3, "log files: {names:?}");
}
