//! End-to-end runs of the setup pipeline against scratch Flutter projects.
//!
//! Runs that need keytool use a shell script stand-in, so they are unix-only.

mod common;

use common::*;
use flutter_keystore_setup::firebase::BackupOutcome;
use flutter_keystore_setup::gradle::PatchOutcome;
use flutter_keystore_setup::{Outcome, Preset, Steps, run};
use std::fs;
use tempfile::TempDir;

#[test]
fn missing_keytool_fails_without_writing_anything() {
    let project = flutter_project();
    let empty_bin = TempDir::new().unwrap();
    let before = list_files(project.path());

    let settings = settings_for(project.path());
    let result = run(
        &settings,
        &locator_in(empty_bin.path()),
        &Preset(true),
        Steps::default(),
    );

    assert!(result.is_err());
    assert!(!settings.output_dir().exists());
    assert_eq!(list_files(project.path()), before);
}

#[cfg(unix)]
#[test]
fn full_run_writes_signing_files_and_patches_gradle() {
    let project = flutter_project();
    let bin = TempDir::new().unwrap();
    install_fake_keytool(bin.path());
    let settings = settings_for(project.path());

    let outcome = run(&settings, &locator_in(bin.path()), &Preset(false), Steps::default()).unwrap();
    let Outcome::Completed(summary) = outcome else {
        panic!("run was cancelled");
    };

    let out = project.path().join("out");
    let key_properties = fs::read_to_string(out.join("key.properties")).unwrap();
    let lines: Vec<&str> = key_properties.lines().collect();
    assert_eq!(
        lines,
        vec![
            "storePassword=123456",
            "keyPassword=123456",
            "keyAlias=upload",
            "storeFile=../out/upload-keystore.jks",
        ]
    );

    assert_eq!(fs::read(out.join("upload-keystore.jks")).unwrap(), FAKE_KEYSTORE);
    let guide = fs::read_to_string(out.join("github-secrets-guide.txt")).unwrap();
    assert!(guide.contains("RkFLRS1KS1MtQ09OVEVOVA=="));
    assert!(out.join("key.properties.example").exists());
    assert!(out.join("keystore-info.txt").exists());
    assert!(out.join(".setup_complete").exists());
    assert!(out.join(".gitignore").exists());

    let args = fs::read_to_string(bin.path().join("keytool-args.txt")).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert!(args.windows(2).any(|w| w == ["-keysize", "2048"]));
    assert!(args.windows(2).any(|w| w == ["-validity", "10000"]));
    assert!(args.contains(&settings.distinguished_name().as_str()));

    // No Firebase packages in pubspec, so the backup step is skipped.
    assert!(summary.firebase.is_none());
    assert!(matches!(summary.gradle, Some(PatchOutcome::Patched { .. })));
    let gradle = fs::read_to_string(project.path().join("android/app/build.gradle.kts")).unwrap();
    assert!(gradle.contains("rootProject.file(\"../out/key.properties\")"));
    assert_eq!(
        fs::read_to_string(project.path().join("android/app/build.gradle.kts.backup")).unwrap(),
        BUILD_GRADLE_KTS
    );
}

#[cfg(unix)]
#[test]
fn key_properties_are_identical_across_runs() {
    let project = flutter_project();
    let bin = TempDir::new().unwrap();
    install_fake_keytool(bin.path());
    let settings = settings_for(project.path());
    let key_properties = project.path().join("out").join("key.properties");

    run(&settings, &locator_in(bin.path()), &Preset(true), Steps::default()).unwrap();
    let first = fs::read(&key_properties).unwrap();
    let gradle_once =
        fs::read_to_string(project.path().join("android/app/build.gradle.kts")).unwrap();

    let outcome = run(&settings, &locator_in(bin.path()), &Preset(true), Steps::default()).unwrap();
    let Outcome::Completed(summary) = outcome else {
        panic!("confirmed overwrite must not cancel");
    };
    assert_eq!(fs::read(&key_properties).unwrap(), first);

    // Second patch finds nothing to do.
    assert!(matches!(summary.gradle, Some(PatchOutcome::AlreadyPatched { .. })));
    let gradle_twice =
        fs::read_to_string(project.path().join("android/app/build.gradle.kts")).unwrap();
    assert_eq!(gradle_once, gradle_twice);
    assert_eq!(gradle_twice.matches("signingConfigs {").count(), 1);
}

#[cfg(unix)]
#[test]
fn declined_overwrite_cancels_and_touches_nothing() {
    let project = flutter_project();
    let bin = TempDir::new().unwrap();
    install_fake_keytool(bin.path());
    let settings = settings_for(project.path());

    fs::create_dir_all(settings.output_dir()).unwrap();
    fs::write(settings.keystore_path(), b"existing keystore").unwrap();
    let before = list_files(project.path());

    let outcome = run(&settings, &locator_in(bin.path()), &Preset(false), Steps::default()).unwrap();

    assert!(matches!(outcome, Outcome::Cancelled));
    assert_eq!(list_files(project.path()), before);
    assert_eq!(fs::read(settings.keystore_path()).unwrap(), b"existing keystore");
    assert_eq!(
        fs::read_to_string(project.path().join("android/app/build.gradle.kts")).unwrap(),
        BUILD_GRADLE_KTS
    );
    assert!(!bin.path().join("keytool-args.txt").exists());
}

#[cfg(unix)]
#[test]
fn firebase_project_without_config_files_gets_no_backup() {
    let project = flutter_project();
    fs::write(
        project.path().join("pubspec.yaml"),
        "name: example\ndependencies:\n  firebase_core: ^3.0.0\n",
    )
    .unwrap();
    let bin = TempDir::new().unwrap();
    install_fake_keytool(bin.path());
    let settings = settings_for(project.path());

    let steps = Steps {
        skip_gradle: true,
        ..Steps::default()
    };
    let Outcome::Completed(summary) =
        run(&settings, &locator_in(bin.path()), &Preset(false), steps).unwrap()
    else {
        panic!("run was cancelled");
    };

    assert!(matches!(summary.firebase, Some(BackupOutcome::NotFound)));
    assert!(summary.gradle.is_none());
    let out = settings.output_dir();
    assert!(!out.join("google-services.json").exists());
    assert!(!out.join("GoogleService-Info.plist").exists());
    assert!(!out.join("firebase-info.txt").exists());
    assert_eq!(
        fs::read_to_string(project.path().join("android/app/build.gradle.kts")).unwrap(),
        BUILD_GRADLE_KTS
    );
}
