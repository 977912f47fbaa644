//! One-shot Android release signing setup for a Flutter project.
//!
//! [`run`] walks the whole pipeline: find `keytool`, generate the upload
//! keystore, write the derived artifacts, back up Firebase configs and patch
//! the app's Gradle build file.

pub mod artifacts;
pub mod config;
pub mod firebase;
pub mod gradle;
pub mod keytool;
pub mod logging;
pub mod prompt;
pub mod ui;

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

pub use config::{Overrides, Settings, load_settings};
pub use keytool::KeytoolLocator;
pub use prompt::{Confirm, Preset, StdinConfirm};

use artifacts::Artifacts;
use firebase::BackupOutcome;
use gradle::PatchOutcome;

/// Optional steps that can be switched off from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Steps {
    pub skip_firebase: bool,
    pub skip_gradle: bool,
}

#[derive(Debug)]
pub struct Summary {
    pub keystore: PathBuf,
    pub artifacts: Artifacts,
    pub firebase: Option<BackupOutcome>,
    pub gradle: Option<PatchOutcome>,
}

#[derive(Debug)]
pub enum Outcome {
    Completed(Summary),
    /// The user declined to replace an existing keystore. Nothing was touched.
    Cancelled,
}

pub fn run(
    settings: &Settings,
    locator: &KeytoolLocator,
    confirm: &dyn Confirm,
    steps: Steps,
) -> Result<Outcome> {
    ui::header("Android keystore setup");

    ui::info("Checking for keytool...");
    let keytool = match keytool::find_working_keytool(locator) {
        Ok(keytool) => keytool,
        Err(err) => {
            ui::error("keytool is not available");
            ui::info("Install a Java JDK (or Android Studio) and make sure its bin directory is on PATH");
            return Err(err);
        }
    };
    ui::success(&format!("keytool found: {}", keytool.program().display()));

    let keystore_path = settings.keystore_path();
    if keystore_path.exists() {
        ui::warn(&format!("Keystore already exists: {}", keystore_path.display()));
        if !confirm.confirm("Create a new one? This deletes the existing keystore")? {
            ui::info("Cancelled");
            return Ok(Outcome::Cancelled);
        }
        fs::remove_file(&keystore_path)
            .with_context(|| format!("Failed to remove {}", keystore_path.display()))?;
    }

    let out = settings.output_dir();
    fs::create_dir_all(&out)
        .with_context(|| format!("Failed to create directory: {}", out.display()))?;
    ui::success(&format!("Output directory: {}", out.display()));

    ui::header("Generating keystore");
    ui::info("Running keytool...");
    let keystore = keytool.generate_keystore(settings)?;
    ui::success(&format!("Keystore created: {}", keystore.display()));

    ui::header("Writing signing files");
    let artifacts = artifacts::write_all(settings)?;

    ui::header("Updating .gitignore");
    artifacts::update_secret_ignores(settings)?;

    let firebase = if steps.skip_firebase {
        None
    } else {
        backup_firebase(settings)?
    };

    let gradle = if steps.skip_gradle {
        None
    } else {
        ui::header("Updating Android build configuration");
        let outcome = gradle::patch_build_file(settings)?;
        report_patch(&outcome);
        Some(outcome)
    };

    let summary = Summary {
        keystore,
        artifacts,
        firebase,
        gradle,
    };
    print_next_steps(settings, &summary);
    Ok(Outcome::Completed(summary))
}

/// Back up Firebase configs, but only for projects that depend on Firebase.
fn backup_firebase(settings: &Settings) -> Result<Option<BackupOutcome>> {
    ui::header("Checking Firebase");
    let packages = firebase::detect_firebase_packages(&settings.project_dir)?;
    if packages.is_empty() {
        ui::info("No Firebase packages in pubspec.yaml");
        return Ok(None);
    }
    ui::success(&format!("Found {} Firebase package(s):", packages.len()));
    for package in &packages {
        ui::info(&format!("  • {package}"));
    }

    ui::header("Backing up Firebase files");
    firebase::backup_firebase_files(settings).map(Some)
}

fn report_patch(outcome: &PatchOutcome) {
    match outcome {
        PatchOutcome::Patched {
            path,
            backup,
            flavor,
        } => {
            ui::success(&format!("Patched {} ({flavor})", path.display()));
            ui::info(&format!("Original saved as {}", backup.display()));
        }
        PatchOutcome::AlreadyPatched { path } => {
            ui::info(&format!("{} is already up to date", path.display()));
        }
        PatchOutcome::NotFound => {
            ui::warn("No android/app/build.gradle or build.gradle.kts found");
            ui::info("Add the signing config to your build file by hand");
        }
        PatchOutcome::MissingAnchor { path, anchor } => {
            ui::warn(&format!(
                "Could not patch {}: no `{anchor}` block",
                path.display()
            ));
            ui::info("Add the signing config to your build file by hand");
        }
    }
}

fn print_next_steps(settings: &Settings, summary: &Summary) {
    let has_firebase = matches!(summary.firebase, Some(BackupOutcome::Copied { .. }));

    ui::header("Setup complete");
    println!("Next steps:");
    let mut steps = vec![
        format!("Review the files in {}", settings.output_dir().display()),
        format!("Open {} and store the passwords safely", artifacts::KEYSTORE_INFO_FILE),
        format!("Open {} and copy the secrets", artifacts::SECRETS_GUIDE_FILE),
        "Add the secrets to GitHub".to_string(),
    ];
    if has_firebase {
        steps.push(format!(
            "Review {} (Firebase files are backed up)",
            firebase::FIREBASE_INFO_FILE
        ));
    }
    steps.push("Never commit the sensitive files".to_string());
    steps.push("Keep a backup of the keystore".to_string());
    for (i, step) in steps.iter().enumerate() {
        println!("{}. {step}", i + 1);
    }

    ui::header("Important");
    println!("• Losing the keystore means you can no longer update the app");
    println!("• Keep a backup somewhere safe");
    println!("• Never share the passwords");

    ui::header("Files created");
    let a = &summary.artifacts;
    for path in [
        &summary.keystore,
        &a.key_properties,
        &a.key_properties_template,
        &a.keystore_info,
        &a.secrets_guide,
        &a.setup_marker,
    ] {
        ui::success(&path.display().to_string());
    }
    if let Some(PatchOutcome::Patched { path, backup, .. }) = &summary.gradle {
        ui::success(&format!("{} (patched)", path.display()));
        ui::success(&backup.display().to_string());
    }
    if let Some(BackupOutcome::Copied { files, summary: info }) = &summary.firebase {
        for file in files {
            ui::success(&format!("{} (backup)", file.backup.display()));
        }
        ui::success(&info.display().to_string());
    }
}
