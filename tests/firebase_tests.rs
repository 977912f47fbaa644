//! Firebase config backup against scratch project trees.

mod common;

use common::*;
use flutter_keystore_setup::firebase::{
    BackupOutcome, FIREBASE_INFO_FILE, Platform, backup_firebase_files, detect_firebase_packages,
};
use std::fs;
use std::time::{Duration, SystemTime};

#[test]
fn no_config_files_means_not_found_and_no_new_files() {
    let project = flutter_project();
    let settings = settings_for(project.path());
    fs::create_dir_all(settings.output_dir()).unwrap();

    let outcome = backup_firebase_files(&settings).unwrap();

    assert!(matches!(outcome, BackupOutcome::NotFound));
    assert!(list_files(&settings.output_dir()).is_empty());
}

#[test]
fn present_configs_are_copied_and_ignored() {
    let project = flutter_project();
    let settings = settings_for(project.path());
    fs::create_dir_all(settings.output_dir()).unwrap();

    let google_services = project.path().join("android/app/google-services.json");
    fs::write(&google_services, r#"{"project_info":{"project_id":"demo"}}"#).unwrap();
    fs::write(project.path().join(".gitignore"), "build/\n").unwrap();
    fs::write(settings.output_dir().join(".gitignore"), "*.jks\n").unwrap();

    let BackupOutcome::Copied { files, summary } = backup_firebase_files(&settings).unwrap() else {
        panic!("google-services.json was not picked up");
    };

    assert_eq!(files.len(), 1);
    assert_eq!(files[0].platform, Platform::Android);
    assert_eq!(files[0].original, google_services);
    assert_eq!(
        fs::read(&files[0].backup).unwrap(),
        fs::read(&google_services).unwrap()
    );
    assert_eq!(summary, settings.output_dir().join(FIREBASE_INFO_FILE));
    let info = fs::read_to_string(&summary).unwrap();
    assert!(info.contains("Platform: ANDROID"));
    assert!(!info.contains("Platform: IOS"));

    let root_ignore = fs::read_to_string(project.path().join(".gitignore")).unwrap();
    assert!(root_ignore.lines().any(|l| l == "out/google-services.json"));
    assert!(root_ignore.lines().any(|l| l == "out/firebase-info.txt"));

    let local_ignore = fs::read_to_string(settings.output_dir().join(".gitignore")).unwrap();
    assert!(local_ignore.starts_with("*.jks\n"));
    assert!(local_ignore.lines().any(|l| l == "GoogleService-Info.plist"));

    // A second backup must not repeat any ignore rule.
    backup_firebase_files(&settings).unwrap();
    let root_again = fs::read_to_string(project.path().join(".gitignore")).unwrap();
    assert_eq!(root_again, root_ignore);
    let local_again = fs::read_to_string(settings.output_dir().join(".gitignore")).unwrap();
    assert_eq!(local_again, local_ignore);
}

#[test]
fn missing_ignore_files_are_not_created() {
    let project = flutter_project();
    let settings = settings_for(project.path());
    fs::create_dir_all(settings.output_dir()).unwrap();
    fs::create_dir_all(project.path().join("ios/Runner")).unwrap();
    fs::write(
        project.path().join("ios/Runner/GoogleService-Info.plist"),
        "<plist></plist>",
    )
    .unwrap();

    let outcome = backup_firebase_files(&settings).unwrap();

    assert!(matches!(outcome, BackupOutcome::Copied { ref files, .. } if files.len() == 1));
    assert!(!project.path().join(".gitignore").exists());
    assert!(!settings.output_dir().join(".gitignore").exists());
}

#[test]
fn packages_are_detected_from_pubspec() {
    let project = flutter_project();
    assert!(detect_firebase_packages(project.path()).unwrap().is_empty());

    fs::write(
        project.path().join("pubspec.yaml"),
        "dependencies:\n  firebase_core: ^3.0.0\n  firebase_messaging: ^15.0.0\n",
    )
    .unwrap();
    assert_eq!(
        detect_firebase_packages(project.path()).unwrap(),
        vec!["firebase_core", "firebase_messaging"]
    );

    fs::remove_file(project.path().join("pubspec.yaml")).unwrap();
    assert!(detect_firebase_packages(project.path()).unwrap().is_empty());
}

#[test]
fn backup_keeps_the_original_modification_time() {
    let project = flutter_project();
    let settings = settings_for(project.path());
    fs::create_dir_all(settings.output_dir()).unwrap();

    let google_services = project.path().join("android/app/google-services.json");
    fs::write(&google_services, "{}").unwrap();
    let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
    fs::File::options()
        .write(true)
        .open(&google_services)
        .unwrap()
        .set_modified(stamp)
        .unwrap();

    let BackupOutcome::Copied { files, .. } = backup_firebase_files(&settings).unwrap() else {
        panic!("google-services.json was not picked up");
    };

    let copied = fs::metadata(&files[0].backup).unwrap().modified().unwrap();
    assert_eq!(copied, stamp);
}
