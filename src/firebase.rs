//! Backup of the Firebase client configs into the signing output directory.
//!
//! Backups keep the permissions and the modification time of the original.

use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifacts::{append_lines, missing_lines, timestamp};
use crate::config::Settings;
use crate::ui;

pub const FIREBASE_INFO_FILE: &str = "firebase-info.txt";

const PUBSPEC: &str = "pubspec.yaml";
const GITIGNORE: &str = ".gitignore";
const LOCAL_IGNORE_MARKER: &str = "google-services.json";

/// Package names that indicate the app talks to Firebase.
pub const FIREBASE_PACKAGES: &[&str] = &[
    "firebase_core",
    "firebase_auth",
    "firebase_analytics",
    "firebase_messaging",
    "cloud_firestore",
    "firebase_storage",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Android,
    Ios,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Android => write!(f, "android"),
            Platform::Ios => write!(f, "ios"),
        }
    }
}

/// A config file Flutter tooling places in the platform project.
pub struct FirebaseFile {
    pub platform: Platform,
    pub relative_path: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const FIREBASE_FILES: &[FirebaseFile] = &[
    FirebaseFile {
        platform: Platform::Android,
        relative_path: "android/app/google-services.json",
        name: "google-services.json",
        description: "Android Firebase config",
    },
    FirebaseFile {
        platform: Platform::Ios,
        relative_path: "ios/Runner/GoogleService-Info.plist",
        name: "GoogleService-Info.plist",
        description: "iOS Firebase config",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackedUpFile {
    pub platform: Platform,
    pub name: String,
    pub original: PathBuf,
    pub backup: PathBuf,
}

#[derive(Debug)]
pub enum BackupOutcome {
    NotFound,
    Copied {
        files: Vec<BackedUpFile>,
        summary: PathBuf,
    },
}

/// Firebase packages mentioned in `pubspec.yaml`. Plain substring match.
pub fn detect_firebase_packages(project_dir: &Path) -> Result<Vec<&'static str>> {
    let pubspec = project_dir.join(PUBSPEC);
    if !pubspec.exists() {
        ui::info(&format!("{} not found", pubspec.display()));
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(&pubspec)
        .with_context(|| format!("Failed to read {}", pubspec.display()))?;
    Ok(packages_in(&content))
}

fn packages_in(pubspec: &str) -> Vec<&'static str> {
    FIREBASE_PACKAGES
        .iter()
        .copied()
        .filter(|pkg| pubspec.contains(pkg))
        .collect()
}

/// Copy any Firebase configs found into the output directory.
///
/// Absence is not an error. A file that fails to copy is reported and skipped.
pub fn backup_firebase_files(settings: &Settings) -> Result<BackupOutcome> {
    let out = settings.output_dir();
    let mut files = Vec::new();

    for file in FIREBASE_FILES {
        let original = settings.project_dir.join(file.relative_path);
        if !original.exists() {
            ui::info(&format!("Not present: {}", file.description));
            continue;
        }
        ui::success(&format!("Found: {}", file.description));

        let backup = out.join(file.name);
        match fs::copy(&original, &backup) {
            Ok(_) => {
                keep_modified_time(&original, &backup);
                ui::success(&format!("Copied {} → {}", file.name, out.display()));
                files.push(BackedUpFile {
                    platform: file.platform,
                    name: file.name.to_string(),
                    original,
                    backup,
                });
            }
            Err(err) => ui::error(&format!("Failed to copy {}: {err}", file.name)),
        }
    }

    if files.is_empty() {
        ui::info("No Firebase config files found");
        ui::info("If the app uses Firebase, run `flutterfire configure` and check the file locations");
        return Ok(BackupOutcome::NotFound);
    }

    ui::success(&format!("Backed up {} Firebase file(s)", files.len()));
    let summary = out.join(FIREBASE_INFO_FILE);
    fs::write(&summary, render_firebase_info(&files, &timestamp()))
        .with_context(|| format!("Failed to write: {}", summary.display()))?;
    ui::success(&format!("Created: {}", summary.display()));

    update_firebase_ignores(settings)?;
    Ok(BackupOutcome::Copied { files, summary })
}

fn keep_modified_time(from: &Path, to: &Path) {
    let result = fs::metadata(from)
        .and_then(|meta| meta.modified())
        .and_then(|time| fs::File::options().write(true).open(to)?.set_modified(time));
    if let Err(err) = result {
        log::warn!("could not copy modification time to {}: {err}", to.display());
    }
}

pub fn render_firebase_info(files: &[BackedUpFile], copied_at: &str) -> String {
    let rule = ui::rule();
    let mut content = format!(
        "{rule}
Firebase config backup
{rule}

The following Firebase files were copied into the signing directory:

"
    );

    for file in files {
        content.push_str(&format!(
            "
Platform: {platform}
━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
📁 File: {name}
📍 Original: {original}
💾 Backup: {backup}

",
            platform = file.platform.to_string().to_uppercase(),
            name = file.name,
            original = file.original.display(),
            backup = file.backup.display(),
        ));
    }

    content.push_str(&format!(
        "
{rule}
Important
{rule}

⚠️  These files contain Firebase API keys
⚠️  They were added to .gitignore
⚠️  Keep a copy somewhere safe

{rule}
Copied: {copied_at}
{rule}
"
    ));
    content
}

fn update_firebase_ignores(settings: &Settings) -> Result<()> {
    let dir = settings.keystore_dir.trim_end_matches(['/', '\\']);
    let root_ignore = settings.project_dir.join(GITIGNORE);

    if root_ignore.exists() {
        let existing = fs::read_to_string(&root_ignore)
            .with_context(|| format!("Failed to read: {}", root_ignore.display()))?;
        let wanted = vec![
            "# Firebase configuration files backup".to_string(),
            format!("{dir}/google-services.json"),
            format!("{dir}/GoogleService-Info.plist"),
            format!("{dir}/{FIREBASE_INFO_FILE}"),
        ];
        let lines = missing_lines(&existing, &wanted);
        if !lines.is_empty() {
            append_lines(&root_ignore, &existing, &lines)?;
            ui::success(&format!("Updated {} for Firebase files", root_ignore.display()));
        }
    }

    let local_ignore = settings.output_dir().join(GITIGNORE);
    if local_ignore.exists() {
        let existing = fs::read_to_string(&local_ignore)
            .with_context(|| format!("Failed to read: {}", local_ignore.display()))?;
        if !existing.contains(LOCAL_IGNORE_MARKER) {
            append_lines(
                &local_ignore,
                &existing,
                &[
                    "# Firebase configuration files",
                    "google-services.json",
                    "GoogleService-Info.plist",
                    FIREBASE_INFO_FILE,
                ],
            )?;
            ui::success(&format!("Updated {}", local_ignore.display()));
        }
    }
    Ok(())
}
