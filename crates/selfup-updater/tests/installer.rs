//! Integration tests for preflight and executable replacement.

mod common;

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::TempDir;

use selfup_updater::permissions::is_writable;
use selfup_updater::{
    InstallContext, InstallEvent, InstallStatus, Installer, ResolvedRelease, StabilityPolicy,
    UpdateError, WriteTarget, self_update,
};

use common::{MockTransport, asset_url, config, latest_url, release, releases_url};

const OLD_CONTENTS: &[u8] = b"old executable contents";

/// An installed executable in a fresh directory.
fn installed_tool() -> (TempDir, InstallContext) {
    let dir = tempfile::tempdir().unwrap();
    let exe = dir.path().join("tool");
    fs::write(&exe, OLD_CONTENTS).unwrap();
    let context = InstallContext::for_executable(exe).unwrap();
    (dir, context)
}

/// Bytes of a real executable for this platform.
fn native_executable() -> Vec<u8> {
    fs::read(std::env::current_exe().unwrap()).unwrap()
}

fn resolved(tag: &str) -> ResolvedRelease {
    ResolvedRelease {
        version: tag.to_string(),
        download_url: asset_url(tag),
    }
}

fn dir_entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    entries.sort();
    entries
}

#[test]
fn test_same_version_is_a_no_op() {
    let (dir, context) = installed_tool();
    let transport = MockTransport::new();
    let installer = Installer::new(&transport, "1.2.0");

    let preflight = installer.preflight(&context).unwrap();
    let status = installer.install(&resolved("1.2.0"), &preflight).unwrap();

    assert_eq!(
        status,
        InstallStatus::NoUpdateNeeded {
            version: "1.2.0".to_string()
        }
    );
    assert_eq!(status.exit_code(), 0);
    assert_eq!(transport.calls(), 0);
    assert_eq!(dir_entries(dir.path()), [context.executable_path().to_path_buf()]);
    assert_eq!(fs::read(context.executable_path()).unwrap(), OLD_CONTENTS);
}

#[test]
fn test_version_compare_is_exact() {
    let (_dir, context) = installed_tool();
    let transport = MockTransport::new().with_file(asset_url("v1.2.0"), native_executable());
    let installer = Installer::new(&transport, "1.2.0");

    let preflight = installer.preflight(&context).unwrap();
    let status = installer.install(&resolved("v1.2.0"), &preflight).unwrap();

    assert!(matches!(status, InstallStatus::Updated { .. }));
}

#[test]
fn test_successful_swap() {
    let (dir, context) = installed_tool();
    let payload = native_executable();
    let transport = MockTransport::new().with_file(asset_url("1.3.0"), payload.clone());
    let events = RefCell::new(Vec::new());
    let installer = Installer::new(&transport, "1.2.0").with_observer(|event| {
        events.borrow_mut().push(match event {
            InstallEvent::DownloadStarted { version, .. } => format!("started {version}"),
            InstallEvent::DownloadFinished { bytes } => format!("finished {bytes}"),
            InstallEvent::Swapped { .. } => "swapped".to_string(),
            InstallEvent::Cleaned { .. } => "cleaned".to_string(),
        });
    });

    let preflight = installer.preflight(&context).unwrap();
    let status = installer.install(&resolved("1.3.0"), &preflight).unwrap();

    assert_eq!(
        status,
        InstallStatus::Updated {
            version: "1.3.0".to_string()
        }
    );
    assert_eq!(fs::read(context.executable_path()).unwrap(), payload);
    assert!(!context.temp_path().exists());
    assert_eq!(dir_entries(dir.path()), [context.executable_path().to_path_buf()]);
    assert_eq!(
        *events.borrow(),
        [
            "started 1.3.0".to_string(),
            format!("finished {}", payload.len()),
            "swapped".to_string(),
        ]
    );
}

#[cfg(unix)]
#[test]
fn test_swapped_executable_gets_default_mode() {
    use std::os::unix::fs::PermissionsExt;

    use selfup_updater::permissions::default_mode;

    let (_dir, context) = installed_tool();
    let transport = MockTransport::new().with_file(asset_url("1.3.0"), native_executable());
    let installer = Installer::new(&transport, "1.2.0");

    let preflight = installer.preflight(&context).unwrap();
    installer.install(&resolved("1.3.0"), &preflight).unwrap();

    let mode = fs::metadata(context.executable_path())
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, default_mode());
}

#[cfg(unix)]
#[test]
fn test_open_handle_keeps_old_contents() {
    use std::io::Read;

    let (_dir, context) = installed_tool();
    let payload = native_executable();
    let transport = MockTransport::new().with_file(asset_url("1.3.0"), payload.clone());
    let installer = Installer::new(&transport, "1.2.0");
    let mut running = fs::File::open(context.executable_path()).unwrap();

    let preflight = installer.preflight(&context).unwrap();
    installer.install(&resolved("1.3.0"), &preflight).unwrap();

    let mut old = Vec::new();
    running.read_to_end(&mut old).unwrap();
    assert_eq!(old, OLD_CONTENTS);
    assert_eq!(fs::read(context.executable_path()).unwrap(), payload);
}

#[test]
fn test_corrupt_download_is_removed() {
    let (dir, context) = installed_tool();
    let transport = MockTransport::new().with_file(
        asset_url("1.3.0"),
        b"<html><body>Not Found</body></html>".to_vec(),
    );
    let cleaned = RefCell::new(None);
    let installer = Installer::new(&transport, "1.2.0").with_observer(|event| {
        if let InstallEvent::Cleaned { path } = event {
            *cleaned.borrow_mut() = Some(path.to_path_buf());
        }
    });

    let preflight = installer.preflight(&context).unwrap();
    let status = installer.install(&resolved("1.3.0"), &preflight).unwrap();

    assert!(matches!(status, InstallStatus::CorruptDownload { .. }));
    assert_eq!(status.exit_code(), 1);
    assert!(!context.temp_path().exists());
    assert_eq!(fs::read(context.executable_path()).unwrap(), OLD_CONTENTS);
    assert_eq!(dir_entries(dir.path()), [context.executable_path().to_path_buf()]);
    assert_eq!(
        cleaned.borrow().as_deref(),
        Some(context.temp_path())
    );
}

#[test]
fn test_empty_download_is_corrupt() {
    let (_dir, context) = installed_tool();
    let transport = MockTransport::new().with_file(asset_url("1.3.0"), Vec::new());
    let installer = Installer::new(&transport, "1.2.0");

    let preflight = installer.preflight(&context).unwrap();
    let status = installer.install(&resolved("1.3.0"), &preflight).unwrap();

    assert!(matches!(status, InstallStatus::CorruptDownload { .. }));
    assert!(!context.temp_path().exists());
    assert_eq!(fs::read(context.executable_path()).unwrap(), OLD_CONTENTS);
}

#[test]
fn test_cut_off_download_is_corrupt() {
    let (dir, context) = installed_tool();
    let mut payload = native_executable();
    payload.truncate(payload.len() / 2);
    let transport = MockTransport::new().with_file(asset_url("1.3.0"), payload);
    let installer = Installer::new(&transport, "1.2.0");

    let preflight = installer.preflight(&context).unwrap();
    let status = installer.install(&resolved("1.3.0"), &preflight).unwrap();

    match &status {
        InstallStatus::CorruptDownload { reason } => assert!(reason.contains("truncated")),
        other => panic!("expected CorruptDownload, got {other:?}"),
    }
    assert_eq!(status.exit_code(), 1);
    assert!(!context.temp_path().exists());
    assert_eq!(fs::read(context.executable_path()).unwrap(), OLD_CONTENTS);
    assert_eq!(dir_entries(dir.path()), [context.executable_path().to_path_buf()]);
}

#[test]
fn test_failed_download_removes_partial_file() {
    let (_dir, context) = installed_tool();
    let transport = MockTransport::new().with_failing_download(asset_url("1.3.0"), 502);
    let installer = Installer::new(&transport, "1.2.0");

    let preflight = installer.preflight(&context).unwrap();
    let err = installer
        .install(&resolved("1.3.0"), &preflight)
        .unwrap_err();

    assert!(matches!(err, UpdateError::Http { status: 502, .. }));
    assert!(!context.temp_path().exists());
    assert_eq!(fs::read(context.executable_path()).unwrap(), OLD_CONTENTS);
}

#[test]
fn test_missing_directory_fails_preflight() {
    let dir = tempfile::tempdir().unwrap();
    let exe = dir.path().join("missing").join("tool");
    let context = InstallContext::for_executable(&exe).unwrap();
    let transport = MockTransport::new()
        .with_document(latest_url(), &release("1.3.0", true))
        .with_file(asset_url("1.3.0"), native_executable());

    let err = self_update(
        &transport,
        &config("1.2.0"),
        &context,
        StabilityPolicy::Stable,
        |_| {},
    )
    .unwrap_err();

    match err {
        UpdateError::PermissionDenied { path, target } => {
            assert_eq!(path, dir.path().join("missing"));
            assert_eq!(target, WriteTarget::Directory);
        }
        other => panic!("expected PermissionDenied, got {other:?}"),
    }
    assert_eq!(transport.calls(), 0);
}

#[cfg(unix)]
#[test]
fn test_read_only_executable_fails_preflight() {
    use std::os::unix::fs::PermissionsExt;

    let (_dir, context) = installed_tool();
    fs::set_permissions(
        context.executable_path(),
        fs::Permissions::from_mode(0o555),
    )
    .unwrap();
    if is_writable(context.executable_path()) {
        // Privileged users bypass mode bits.
        return;
    }
    let transport = MockTransport::new();

    let err = self_update(
        &transport,
        &config("1.2.0"),
        &context,
        StabilityPolicy::Preview,
        |_| {},
    )
    .unwrap_err();

    assert!(matches!(
        err,
        UpdateError::PermissionDenied {
            target: WriteTarget::Executable,
            ..
        }
    ));
    assert_eq!(transport.calls(), 0);
    assert_eq!(fs::read(context.executable_path()).unwrap(), OLD_CONTENTS);
}

#[test]
fn test_cargo_build_output_fails_preflight() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"tool\"\n").unwrap();
    let build_dir = dir.path().join("target").join("debug");
    fs::create_dir_all(&build_dir).unwrap();
    let exe = build_dir.join("tool");
    fs::write(&exe, OLD_CONTENTS).unwrap();
    assert!(is_writable(&exe));

    let context = InstallContext::for_executable(&exe).unwrap();
    let transport = MockTransport::new();

    let err = self_update(
        &transport,
        &config("1.2.0"),
        &context,
        StabilityPolicy::Stable,
        |_| {},
    )
    .unwrap_err();

    assert!(matches!(err, UpdateError::NotPackaged { .. }));
    assert_eq!(transport.calls(), 0);
}

#[test]
fn test_self_update_end_to_end() {
    let (_dir, context) = installed_tool();
    let payload = native_executable();
    let transport = MockTransport::new()
        .with_document(
            releases_url(),
            &json!([release("1.4.0-beta1", true), release("1.3.0", true)]),
        )
        .with_file(asset_url("1.4.0-beta1"), payload.clone());

    let status = self_update(
        &transport,
        &config("1.2.0"),
        &context,
        StabilityPolicy::Preview,
        |_| {},
    )
    .unwrap();

    assert_eq!(
        status,
        InstallStatus::Updated {
            version: "1.4.0-beta1".to_string()
        }
    );
    assert_eq!(fs::read(context.executable_path()).unwrap(), payload);
}

#[test]
fn test_self_update_already_current() {
    let (dir, context) = installed_tool();
    let transport = MockTransport::new().with_document(latest_url(), &release("1.2.0", true));

    let status = self_update(
        &transport,
        &config("1.2.0"),
        &context,
        StabilityPolicy::Stable,
        |_| {},
    )
    .unwrap();

    assert!(matches!(status, InstallStatus::NoUpdateNeeded { .. }));
    assert_eq!(transport.fetched(), [latest_url()]);
    assert_eq!(dir_entries(dir.path()), [context.executable_path().to_path_buf()]);
}
