#![allow(dead_code)]

use flutter_keystore_setup::{KeytoolLocator, Settings};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

pub const FAKE_KEYSTORE: &[u8] = b"FAKE-JKS-CONTENT";

pub const BUILD_GRADLE_KTS: &str = r#"plugins {
    id("com.android.application")
    id("dev.flutter.flutter-gradle-plugin")
}

android {
    namespace = "com.example.app"

    defaultConfig {
        applicationId = "com.example.app"
    }

    buildTypes {
        release {
            signingConfig = signingConfigs.getByName("debug")
        }
    }
}
"#;

/// A scratch Flutter project with an `android/app/build.gradle.kts`.
pub fn flutter_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let app = dir.path().join("android").join("app");
    fs::create_dir_all(&app).unwrap();
    fs::write(app.join("build.gradle.kts"), BUILD_GRADLE_KTS).unwrap();
    fs::write(
        dir.path().join("pubspec.yaml"),
        "name: example\ndependencies:\n  flutter:\n    sdk: flutter\n",
    )
    .unwrap();
    dir
}

pub fn settings_for(project: &Path) -> Settings {
    Settings {
        project_dir: project.to_path_buf(),
        keystore_dir: "out".to_string(),
        key_alias: "upload".to_string(),
        password: "123456".to_string(),
        validity_days: 10000,
        ..Settings::default()
    }
}

/// Locator that can only ever see `bin_dir`.
pub fn locator_in(bin_dir: &Path) -> KeytoolLocator {
    KeytoolLocator::new(Some(bin_dir.as_os_str().to_os_string()), vec![])
}

/// Install a shell script standing in for keytool. `-genkey` writes
/// [`FAKE_KEYSTORE`] to the `-keystore` path and records its arguments.
#[cfg(unix)]
pub fn install_fake_keytool(bin_dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(bin_dir).unwrap();
    let script = format!(
        r#"#!/bin/sh
if [ "$1" = "-help" ]; then exit 0; fi
printf '%s\n' "$@" > "${{0%/*}}/keytool-args.txt"
while [ $# -gt 0 ]; do
  if [ "$1" = "-keystore" ]; then shift; printf '{}' > "$1"; fi
  shift
done
exit 0
"#,
        String::from_utf8_lossy(FAKE_KEYSTORE)
    );
    let path = bin_dir.join("keytool");
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Relative paths of every file under `root`, sorted.
pub fn list_files(root: &Path) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    out.sort();
    out
}

/// Install a keytool stand-in whose `-help` fails, so it is found but unusable.
#[cfg(unix)]
pub fn install_broken_keytool(bin_dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(bin_dir).unwrap();
    let path = bin_dir.join("keytool");
    fs::write(&path, "#!/bin/sh\necho 'broken JDK' >&2\nexit 1\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}
