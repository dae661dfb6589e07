//! Document routing, diagnostics aggregation and autofix.

use std::path::PathBuf;

use biome_monorepo_engine::{Command, OrchestratorEvent};

use crate::common::{RecordingHost, SERIAL, Workspace, orchestrator};

fn two_installs() -> (Workspace, PathBuf, PathBuf) {
    let ws = Workspace::new();
    ws.project("apps/web");
    ws.project("apps/api");
    ws.install_biome("apps/web", "2.0.0");
    ws.install_biome("apps/api", "1.9.4");
    let web = ws.write("apps/web/src/index.ts", "let a = 1;\n");
    let api = ws.write("apps/api/src/server.js", "let b = 2;\n");
    (ws, web, api)
}

async fn wait_for_diagnostics(
    orch: &mut biome_monorepo_engine::Orchestrator,
    files: usize,
) -> bool {
    for _ in 0..100 {
        orch.poll_lsp_events(32).await;
        if orch.diagnostics_snapshot().files().len() >= files {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn documents_go_to_the_session_that_owns_them() {
    let _serial = SERIAL.lock().await;
    let (ws, web, api) = two_installs();
    let host = RecordingHost::default();
    let mut orch = orchestrator(&ws);
    orch.start(&host).await;

    let web_session = orch.open_document(&web, "let a = 1;\n").await.unwrap();
    let api_session = orch.open_document(&api, "let b = 2;\n").await.unwrap();

    assert!(web_session.is_some());
    assert!(api_session.is_some());
    assert_ne!(web_session, api_session);
    assert_eq!(orch.session_for(&web).unwrap().version().as_str(), "2.0.0");
    assert_eq!(orch.session_for(&api).unwrap().version().as_str(), "1.9.4");
    assert!(orch.session_for(&web).unwrap().has_open(&web));

    let readme = ws.write("apps/web/README.md", "# web\n");
    assert_eq!(orch.open_document(&readme, "# web\n").await.unwrap(), None);
    let outside = ws.write("scripts/tool.ts", "export {};\n");
    assert_eq!(orch.open_document(&outside, "export {};\n").await.unwrap(), None);

    orch.stop(&host).await;
}

#[tokio::test]
async fn diagnostics_from_all_sessions_are_aggregated() {
    let _serial = SERIAL.lock().await;
    let (ws, web, api) = two_installs();
    let host = RecordingHost::default();
    let mut orch = orchestrator(&ws);
    orch.start(&host).await;

    orch.open_document(&web, "let a = 1;\n").await.unwrap();
    orch.open_document(&api, "let b = 2;\n").await.unwrap();
    assert!(wait_for_diagnostics(&mut orch, 2).await);

    let snapshot = orch.diagnostics_snapshot();
    assert_eq!(snapshot.warning_count(), 2);
    let messages: Vec<&str> = snapshot
        .files()
        .iter()
        .flat_map(|(_, items)| items.iter().map(|d| d.message()))
        .collect();
    assert!(messages.contains(&"reported by 2.0.0"));
    assert!(messages.contains(&"reported by 1.9.4"));

    orch.stop(&host).await;
    assert!(orch.diagnostics_snapshot().is_empty());
}

#[tokio::test]
async fn autofix_requests_fix_all_for_active_document() {
    let _serial = SERIAL.lock().await;
    let (ws, web, _api) = two_installs();
    let host = RecordingHost::default();
    *host.active.lock().unwrap() = Some(web.clone());
    let mut orch = orchestrator(&ws);
    orch.start(&host).await;

    orch.execute_command(Command::ExecuteAutofix, &host).await;

    let applied = host.applied.lock().unwrap().clone();
    assert_eq!(applied.len(), 1);
    let (kind, path, actions) = &applied[0];
    assert_eq!(kind, "source.fixAll.biome");
    assert_eq!(path, &web);
    assert_eq!(actions[0]["kind"], "source.fixAll.biome");

    orch.stop(&host).await;
}

#[tokio::test]
async fn show_commands_dispatches_picked_restart() {
    let _serial = SERIAL.lock().await;
    let (ws, _web, _api) = two_installs();
    let host = RecordingHost {
        pick: Some(Command::Restart),
        ..RecordingHost::default()
    };
    let mut orch = orchestrator(&ws);
    orch.start(&host).await;

    orch.execute_command(Command::ShowCommands, &host).await;

    assert_eq!(orch.restart_count(), 1);
    assert_eq!(orch.sessions().len(), 2);
    orch.stop(&host).await;
}

#[tokio::test]
async fn open_documents_follow_a_restart() {
    let _serial = SERIAL.lock().await;
    let (ws, web, _api) = two_installs();
    let host = RecordingHost::default();
    let mut orch = orchestrator(&ws);
    orch.start(&host).await;
    let before = orch.open_document(&web, "let a = 1;\n").await.unwrap();

    orch.restart(&host).await;

    let session = orch.session_for(&web).expect("document reopened");
    assert_ne!(Some(session.id()), before);
    assert!(session.has_open(&web));
    orch.stop(&host).await;
}

#[tokio::test]
async fn crashed_server_is_retired() {
    let _serial = SERIAL.lock().await;
    let (ws, _web, _api) = two_installs();
    let crash = ws.write("apps/web/src/crash.ts", "boom\n");
    let host = RecordingHost::default();
    let mut orch = orchestrator(&ws);
    orch.start(&host).await;

    orch.open_document(&crash, "boom\n").await.unwrap();

    let mut retired = false;
    for _ in 0..100 {
        orch.poll_lsp_events(32).await;
        if orch
            .sessions()
            .iter()
            .any(|s| s.version().as_str() == "2.0.0" && !s.is_running())
        {
            retired = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    assert!(retired);
    assert!(orch.session_for(&crash).is_none());
    assert!(
        orch.sessions()
            .iter()
            .any(|s| s.version().as_str() == "1.9.4" && s.is_running())
    );

    orch.stop(&host).await;
}

#[tokio::test]
async fn control_loop_routes_document_events() {
    let _serial = SERIAL.lock().await;
    let (ws, web, _api) = two_installs();
    let host = RecordingHost::default();
    let mut orch = orchestrator(&ws);
    orch.start(&host).await;

    let events = orch.events();
    events
        .send(OrchestratorEvent::DocumentOpened {
            path: web.clone(),
            text: "let a = 1;\n".to_string(),
        })
        .await
        .unwrap();
    events
        .send(OrchestratorEvent::DocumentChanged {
            path: web.clone(),
            text: "const a = 1;\n".to_string(),
        })
        .await
        .unwrap();
    events
        .send(OrchestratorEvent::DocumentClosed(web.clone()))
        .await
        .unwrap();
    events
        .send(OrchestratorEvent::Command(Command::ShowOutputChannel))
        .await
        .unwrap();
    events.send(OrchestratorEvent::Shutdown).await.unwrap();

    orch.run(&host).await;

    assert_eq!(*host.shown.lock().unwrap(), vec!["Biome Monorepo".to_string()]);
    assert_eq!(orch.restart_count(), 0);
}
