mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{game, FakeRemote, Harness, MAIN_BINARY, RELEASE_V1, RELEASE_V2};
use launcher::{Activity, InstallError, LauncherEvent, TERMINATED};
use tokio::sync::broadcast;

async fn next_event(events: &mut broadcast::Receiver<LauncherEvent>) -> LauncherEvent {
    events.recv().await.unwrap()
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    while !done() {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn install_commits_record_and_files() {
    let h = Harness::new();
    let mut events = h.manager.subscribe();
    let g = game("g1", Some(RELEASE_V1));

    let record = h.manager.install(&g).await.unwrap();

    assert!(record.installed);
    assert_eq!(record.version, RELEASE_V1);
    assert_eq!(record.name, "Game g1");
    assert_eq!(record.exe, MAIN_BINARY);
    assert_eq!(record.path, h.install_dir().join("g1"));
    assert!(record.exe_path().is_file());
    assert!(record.path.join("icon.png").is_file());
    assert!(!h.install_dir().join("g1.download").exists());

    let shortcut = record.shortcut.clone().unwrap();
    let entry = std::fs::read_to_string(&shortcut).unwrap();
    assert!(entry.contains("Name=Game g1"));

    assert!(h.manager.is_installed("g1"));
    assert!(!h.manager.is_downloading("g1"));
    assert_eq!(h.manager.install_record("g1"), Some(record));
    assert_eq!(
        next_event(&mut events).await,
        LauncherEvent::DownloadStarted {
            game_id: "g1".into(),
            is_update: false,
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        LauncherEvent::Installed {
            game_id: "g1".into(),
            version: RELEASE_V1.into(),
        }
    );
}

#[tokio::test]
async fn install_survives_reopen() {
    let h = Harness::new();
    h.manager.install(&game("g1", Some(RELEASE_V1))).await.unwrap();

    let reopened = h.reopen();
    let installed = reopened.installed_games();
    assert_eq!(installed.len(), 1);
    assert_eq!(installed[0].game_id, "g1");
    assert!(reopened.is_installed("g1"));
}

#[tokio::test]
async fn install_without_platform_release_is_unsupported() {
    let h = Harness::new();
    for release in [None, Some(""), Some("   ")] {
        let err = h.manager.install(&game("g1", release)).await.unwrap_err();
        assert!(matches!(err, InstallError::Unsupported { .. }), "{err}");
    }
    assert!(h.manager.installed_games().is_empty());
    assert_eq!(h.remote.downloads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn install_twice_is_rejected() {
    let h = Harness::new();
    let g = game("g1", Some(RELEASE_V1));
    h.manager.install(&g).await.unwrap();
    let err = h.manager.install(&g).await.unwrap_err();
    assert!(matches!(err, InstallError::AlreadyInstalled(_)));
}

#[tokio::test]
async fn concurrent_installs_of_one_game() {
    let (remote, gate) = FakeRemote::gated();
    let h = Harness::with_remote(remote);
    let g = game("g1", Some(RELEASE_V1));

    let first = tokio::spawn({
        let manager = h.manager.clone();
        let g = g.clone();
        async move { manager.install(&g).await }
    });
    wait_until(|| h.manager.is_downloading("g1")).await;

    let err = h.manager.install(&g).await.unwrap_err();
    assert!(matches!(err, InstallError::AlreadyInstalling(_)));

    let downloads = h.manager.active_downloads();
    assert_eq!(downloads.len(), 1);
    assert!(!downloads[0].is_update);
    let mut progress = h.manager.download_progress("g1").unwrap();

    gate.add_permits(1);
    let record = first.await.unwrap().unwrap();
    assert_eq!(record.version, RELEASE_V1);
    assert_eq!(h.manager.installed_games().len(), 1);
    assert_eq!(h.remote.downloads.load(Ordering::SeqCst), 1);

    progress.wait_for(|p| *p < 0.0).await.unwrap();
    assert!((*progress.borrow() - TERMINATED).abs() < f64::EPSILON);
    assert!(h.manager.active_downloads().is_empty());
}

#[tokio::test]
async fn different_games_install_independently() {
    let (remote, gate) = FakeRemote::gated();
    let h = Harness::with_remote(remote);

    let first = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.install(&game("a", Some(RELEASE_V1))).await }
    });
    let second = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.install(&game("b", Some(RELEASE_V1))).await }
    });
    wait_until(|| h.manager.active_downloads().len() == 2).await;

    gate.add_permits(2);
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    let ids: Vec<_> = h
        .manager
        .installed_games()
        .into_iter()
        .map(|r| r.game_id)
        .collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn download_failure_leaves_nothing_behind() {
    let h = Harness::new();
    h.remote.fail_download.store(true, Ordering::SeqCst);

    let err = h
        .manager
        .install(&game("g1", Some(RELEASE_V1)))
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::DownloadFailed { .. }), "{err}");
    assert!(!h.manager.is_installed("g1"));
    assert!(!h.manager.is_downloading("g1"));
    assert!(h.manager.download_progress("g1").is_none());
    assert!(!h.install_dir().join("g1.download").exists());
    assert!(!h.install_dir().join("g1").exists());

    // A retry starts from a clean slate.
    h.remote.fail_download.store(false, Ordering::SeqCst);
    h.manager.install(&game("g1", Some(RELEASE_V1))).await.unwrap();
}

#[tokio::test]
async fn extraction_failure_removes_partial_directory() {
    let h = Harness::new();
    h.extractor.fail.store(true, Ordering::SeqCst);

    let err = h
        .manager
        .install(&game("g1", Some(RELEASE_V1)))
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::ExtractionFailed { .. }), "{err}");
    assert!(!h.install_dir().join("g1").exists());
    assert!(!h.install_dir().join("g1.download").exists());
    assert!(h.manager.installed_games().is_empty());
    assert!(!h.manager.is_downloading("g1"));
}

#[tokio::test]
async fn missing_icon_is_not_fatal() {
    let remote = FakeRemote {
        icon: None,
        ..FakeRemote::new()
    };
    let h = Harness::with_remote(remote);
    let record = h.manager.install(&game("g1", Some(RELEASE_V1))).await.unwrap();
    assert!(!record.path.join("icon.png").exists());
    let entry = std::fs::read_to_string(record.shortcut.unwrap()).unwrap();
    assert!(!entry.contains("Icon="));
}

#[tokio::test]
async fn update_detection() {
    let h = Harness::new();
    assert!(!h.manager.is_update_available(&game("g1", Some(RELEASE_V1))));

    h.manager.install(&game("g1", Some(RELEASE_V1))).await.unwrap();
    assert!(!h.manager.is_update_available(&game("g1", Some(RELEASE_V1))));
    assert!(h.manager.is_update_available(&game("g1", Some(RELEASE_V2))));
    assert!(!h.manager.is_update_available(&game("g1", Some("not-a-uuid"))));
    assert!(!h.manager.is_update_available(&game("g1", None)));
    // Case and surrounding whitespace do not make a different release.
    let upper = format!(" {} ", RELEASE_V1.to_uppercase());
    assert!(!h.manager.is_update_available(&game("g1", Some(&upper))));
}

#[tokio::test]
async fn update_replaces_installation() {
    let h = Harness::new();
    h.manager.install(&game("g1", Some(RELEASE_V1))).await.unwrap();
    let mut events = h.manager.subscribe();

    let record = h.manager.update(&game("g1", Some(RELEASE_V2))).await.unwrap();

    assert_eq!(record.version, RELEASE_V2);
    assert_eq!(h.manager.install_record("g1").unwrap().version, RELEASE_V2);
    assert!(!h.manager.is_update_available(&game("g1", Some(RELEASE_V2))));
    assert_eq!(
        next_event(&mut events).await,
        LauncherEvent::Uninstalled {
            game_id: "g1".into()
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        LauncherEvent::DownloadStarted {
            game_id: "g1".into(),
            is_update: true,
        }
    );
}

#[tokio::test]
async fn failed_update_leaves_game_uninstalled() {
    let h = Harness::new();
    h.manager.install(&game("g1", Some(RELEASE_V1))).await.unwrap();
    h.remote.fail_download.store(true, Ordering::SeqCst);

    let err = h
        .manager
        .update(&game("g1", Some(RELEASE_V2)))
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::DownloadFailed { .. }));
    assert!(!h.manager.is_installed("g1"));
    assert!(!h.install_dir().join("g1").exists());
}

#[tokio::test]
async fn update_requires_installation() {
    let h = Harness::new();
    let err = h
        .manager
        .update(&game("g1", Some(RELEASE_V2)))
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::NotInstalled(_)));
}

#[tokio::test]
async fn overlapping_updates_report_already_installing() {
    let (remote, gate) = FakeRemote::gated();
    let h = Harness::with_remote(remote);
    gate.add_permits(1);
    h.manager.install(&game("g1", Some(RELEASE_V1))).await.unwrap();
    let g = game("g1", Some(RELEASE_V2));

    let first = tokio::spawn({
        let manager = h.manager.clone();
        let g = g.clone();
        async move { manager.update(&g).await }
    });
    wait_until(|| h.manager.is_downloading("g1")).await;

    let err = h.manager.update(&g).await.unwrap_err();
    assert!(matches!(err, InstallError::AlreadyInstalling(_)));
    assert_eq!(
        h.manager.activity("g1"),
        Some(Activity::Downloading { is_update: true })
    );

    gate.add_permits(1);
    let record = first.await.unwrap().unwrap();
    assert_eq!(record.version, RELEASE_V2);
    assert_eq!(h.remote.downloads.load(Ordering::SeqCst), 2);
    assert_eq!(h.manager.activity("g1"), None);
}

#[tokio::test]
async fn update_after_uninstall_does_nothing() {
    let h = Harness::new();
    h.manager.install(&game("g1", Some(RELEASE_V1))).await.unwrap();
    h.manager.uninstall("g1").await.unwrap();
    let mut events = h.manager.subscribe();

    let err = h
        .manager
        .update(&game("g1", Some(RELEASE_V2)))
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::NotInstalled(_)));
    assert_eq!(h.remote.downloads.load(Ordering::SeqCst), 1);
    assert!(events.try_recv().is_err());
    assert_eq!(h.manager.activity("g1"), None);
    assert!(!h.manager.is_installed("g1"));
}

#[tokio::test(start_paused = true)]
async fn natural_exit_reports_playtime_once() {
    let h = Harness::new();
    let record = h.manager.install(&game("g1", Some(RELEASE_V1))).await.unwrap();
    let mut events = h.manager.subscribe();

    h.manager.launch("g1").await.unwrap();
    assert!(h.manager.is_running("g1"));
    let spawned = h.spawner.spawned();
    assert_eq!(spawned.len(), 1);
    assert_eq!(spawned[0].exe, record.exe_path());
    assert_eq!(spawned[0].cwd, record.path);
    assert_eq!(spawned[0].args, vec!["--windowed", "--lang", "en"]);

    tokio::time::advance(Duration::from_secs(150)).await;
    assert_eq!(h.manager.uptime("g1"), Some(Duration::from_secs(150)));
    h.spawner.exit(&record.exe_path());

    assert_eq!(
        next_event(&mut events).await,
        LauncherEvent::GameClosed {
            game_id: "g1".into(),
            minutes: 2,
        }
    );
    assert_eq!(h.remote.playtime(), vec![("g1".to_owned(), 2)]);
    assert!(!h.manager.is_running("g1"));
    assert!(!spawned[0].killed.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn kill_reports_playtime_once() {
    let h = Harness::new();
    h.manager.install(&game("g1", Some(RELEASE_V1))).await.unwrap();
    h.manager.launch("g1").await.unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;
    h.manager.kill("g1").await.unwrap();

    assert!(!h.manager.is_running("g1"));
    assert_eq!(h.remote.playtime(), vec![("g1".to_owned(), 1)]);
    assert!(h.spawner.spawned()[0].killed.load(Ordering::SeqCst));

    let err = h.manager.kill("g1").await.unwrap_err();
    assert!(matches!(err, InstallError::NotRunning(_)));
    assert_eq!(h.remote.playtime().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn short_sessions_report_zero_minutes() {
    let h = Harness::new();
    let record = h.manager.install(&game("g1", Some(RELEASE_V1))).await.unwrap();
    let mut events = h.manager.subscribe();
    h.manager.launch("g1").await.unwrap();

    tokio::time::advance(Duration::from_secs(59)).await;
    h.spawner.exit(&record.exe_path());

    assert!(matches!(
        next_event(&mut events).await,
        LauncherEvent::GameClosed { minutes: 0, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn playtime_is_reported_without_a_login() {
    let h = Harness::new();
    let record = h.manager.install(&game("g1", Some(RELEASE_V1))).await.unwrap();
    let mut events = h.manager.subscribe();
    h.manager.launch("g1").await.unwrap();
    h.session.logout();

    tokio::time::advance(Duration::from_secs(180)).await;
    h.spawner.exit(&record.exe_path());

    assert_eq!(
        next_event(&mut events).await,
        LauncherEvent::GameClosed {
            game_id: "g1".into(),
            minutes: 3,
        }
    );
    assert_eq!(h.remote.playtime(), vec![("g1".to_owned(), 3)]);
    assert!(!h.manager.session().is_logged_in());
}

#[tokio::test]
async fn launch_preconditions() {
    let h = Harness::new();
    let err = h.manager.launch("g1").await.unwrap_err();
    assert!(matches!(err, InstallError::NotInstalled(_)));

    let record = h.manager.install(&game("g1", Some(RELEASE_V1))).await.unwrap();
    h.manager.launch("g1").await.unwrap();
    let err = h.manager.launch("g1").await.unwrap_err();
    assert!(matches!(
        err,
        InstallError::Busy {
            activity: Activity::Running,
            ..
        }
    ));
    h.manager.kill("g1").await.unwrap();

    std::fs::remove_file(record.exe_path()).unwrap();
    let err = h.manager.launch("g1").await.unwrap_err();
    assert!(matches!(err, InstallError::ExecutableMissing { .. }));
    assert_eq!(h.spawner.spawned().len(), 1);
}

#[tokio::test]
async fn failed_spawn_frees_the_game() {
    let h = Harness::new();
    h.manager.install(&game("g1", Some(RELEASE_V1))).await.unwrap();
    h.spawner.fail.store(true, Ordering::SeqCst);

    let err = h.manager.launch("g1").await.unwrap_err();
    assert!(matches!(err, InstallError::Spawn { .. }));
    assert_eq!(h.manager.activity("g1"), None);
    assert!(!h.manager.is_running("g1"));

    h.spawner.fail.store(false, Ordering::SeqCst);
    h.manager.launch("g1").await.unwrap();
    assert!(h.manager.is_running("g1"));
    h.manager.kill("g1").await.unwrap();
}

#[tokio::test]
async fn running_game_blocks_uninstall_and_update() {
    let h = Harness::new();
    h.manager.install(&game("g1", Some(RELEASE_V1))).await.unwrap();
    h.manager.launch("g1").await.unwrap();

    let err = h.manager.uninstall("g1").await.unwrap_err();
    assert!(matches!(err, InstallError::Busy { .. }));
    let err = h
        .manager
        .update(&game("g1", Some(RELEASE_V2)))
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::Busy { .. }));
    assert!(h.manager.is_installed("g1"));

    h.manager.kill("g1").await.unwrap();
    h.manager.uninstall("g1").await.unwrap();
}

#[tokio::test]
async fn uninstall_removes_files_shortcut_and_record() {
    let h = Harness::new();
    let record = h.manager.install(&game("g1", Some(RELEASE_V1))).await.unwrap();
    let shortcut = record.shortcut.clone().unwrap();
    let mut events = h.manager.subscribe();

    h.manager.uninstall("g1").await.unwrap();

    assert!(!record.path.exists());
    assert!(!shortcut.exists());
    assert!(!h.manager.is_installed("g1"));
    assert!(h.reopen().installed_games().is_empty());
    assert_eq!(
        next_event(&mut events).await,
        LauncherEvent::Uninstalled {
            game_id: "g1".into()
        }
    );

    let err = h.manager.uninstall("g1").await.unwrap_err();
    assert!(matches!(err, InstallError::NotInstalled(_)));
}

#[cfg(unix)]
#[tokio::test]
async fn uninstall_keeps_record_when_files_cannot_be_removed() {
    let h = Harness::new();
    let record = h.manager.install(&game("g1", Some(RELEASE_V1))).await.unwrap();
    let mut events = h.manager.subscribe();
    // A plain file where the install directory was makes the removal fail.
    std::fs::remove_dir_all(&record.path).unwrap();
    std::fs::write(&record.path, b"not a directory").unwrap();

    let err = h.manager.uninstall("g1").await.unwrap_err();

    assert!(matches!(err, InstallError::RemoveFiles { .. }));
    assert!(h.manager.is_installed("g1"));
    assert!(h.reopen().is_installed("g1"));
    assert_eq!(h.manager.activity("g1"), None);
    assert!(events.try_recv().is_err());
}
