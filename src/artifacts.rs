//! Text artifacts derived from the settings and the generated keystore.
//!
//! `keystore-info.txt` and `github-secrets-guide.txt` carry the store and key
//! passwords in clear text, and the guide embeds the whole keystore as base64.
//! They exist so the values can be pasted into a CI secret store by hand.
//! Treat both as secrets: they are listed in the ignore rules written by
//! [`update_secret_ignores`] and must never be committed.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use java_properties::PropertiesWriter;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{KEY_PROPERTIES_FILE, Settings};
use crate::ui;

pub const KEY_PROPERTIES_TEMPLATE_FILE: &str = "key.properties.example";
pub const KEYSTORE_INFO_FILE: &str = "keystore-info.txt";
pub const SECRETS_GUIDE_FILE: &str = "github-secrets-guide.txt";
pub const SETUP_MARKER_FILE: &str = ".setup_complete";

const GITIGNORE: &str = ".gitignore";
const SECRETS_IGNORE_HEADER: &str = "# Android signing secrets";

/// Local time in the form used by every generated document.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn write_text(path: &Path, content: impl AsRef<[u8]>) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write: {}", path.display()))?;
    ui::success(&format!("Created: {}", path.display()));
    Ok(())
}

fn render_properties(comments: &[&str], entries: &[(&str, &str)]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_properties(&mut buf, comments, entries).context("Failed to render properties")?;
    Ok(buf)
}

fn write_properties(
    buf: &mut Vec<u8>,
    comments: &[&str],
    entries: &[(&str, &str)],
) -> Result<(), java_properties::PropertiesError> {
    let mut writer = PropertiesWriter::new(buf);
    for comment in comments {
        writer.write_comment(comment)?;
    }
    for (key, value) in entries {
        writer.write(key, value)?;
    }
    writer.finish()
}

/// `key.properties` as read by the Gradle signing config. Exactly four entries.
pub fn render_key_properties(settings: &Settings) -> Result<Vec<u8>> {
    let store_file = settings.store_file();
    render_properties(
        &[],
        &[
            ("storePassword", settings.password.as_str()),
            ("keyPassword", settings.password.as_str()),
            ("keyAlias", settings.key_alias.as_str()),
            ("storeFile", store_file.as_str()),
        ],
    )
}

/// Commit-safe copy of `key.properties` with the secrets replaced.
pub fn render_key_properties_template(settings: &Settings) -> Result<Vec<u8>> {
    let store_file = settings.store_file();
    render_properties(
        &[
            "Android keystore configuration template",
            "Copy to key.properties and fill in your own passwords.",
            "Never commit key.properties itself.",
        ],
        &[
            ("storePassword", "YOUR_KEYSTORE_PASSWORD"),
            ("keyPassword", "YOUR_KEY_PASSWORD"),
            ("keyAlias", settings.key_alias.as_str()),
            ("storeFile", store_file.as_str()),
        ],
    )
}

/// Human readable summary, passwords included.
pub fn render_keystore_info(settings: &Settings, generated_at: &str) -> String {
    let rule = ui::rule();
    let years = settings.validity_days / 365;
    format!(
        "{rule}
Android Keystore Information
{rule}

📁 Keystore file: {keystore}
🔑 Key alias: {alias}
🔒 Keystore password: {password}
🔐 Key password: {password}
⏰ Validity: {days} days (~{years} years)

{rule}
Developer
{rule}

👤 Name: {name}
🏢 Company: {company}
🏛️ Organizational unit: {unit}
🌍 Location: {city}, {state}, {country}

{rule}
Important
{rule}

⚠️  Store this file somewhere safe!
⚠️  Never share these passwords!
⚠️  Never commit the keystore to version control!
⚠️  Losing the keystore means you can no longer publish updates to Google Play!
⚠️  Keep a backup of the keystore!

{rule}
Generated
{rule}

📅 {generated_at}

{rule}
",
        keystore = settings.keystore_name,
        alias = settings.key_alias,
        password = settings.password,
        days = settings.validity_days,
        name = settings.developer_name,
        company = settings.company,
        unit = settings.organizational_unit,
        city = settings.city,
        state = settings.state,
        country = settings.country,
    )
}

/// Copy-paste values for the CI secret store, keystore included as base64.
pub fn render_secrets_guide(settings: &Settings, keystore: &[u8]) -> String {
    let rule = ui::rule();
    let keystore_base64 = STANDARD.encode(keystore);
    format!(
        "{rule}
GitHub Secrets Guide
{rule}

Go to:
Settings → Secrets and variables → Actions → New repository secret

Add these secrets:

{rule}
1. ANDROID_KEYSTORE_BASE64
{rule}
Value:
{keystore_base64}

{rule}
2. ANDROID_KEY_ALIAS
{rule}
Value:
{alias}

{rule}
3. ANDROID_KEY_PASSWORD
{rule}
Value:
{password}

{rule}
4. ANDROID_STORE_PASSWORD
{rule}
Value:
{password}

{rule}
Quick steps
{rule}

1. Open the repository on GitHub
2. Settings → Secrets and variables → Actions
3. Click \"New repository secret\"
4. Copy and paste each secret from above
5. Save

✓ Done!

{rule}
",
        alias = settings.key_alias,
        password = settings.password,
    )
}

#[derive(Debug, Serialize)]
struct SetupMarker<'a> {
    setup_completed: bool,
    setup_date: String,
    keystore_name: &'a str,
    key_alias: &'a str,
    version: &'a str,
}

pub fn render_setup_marker(settings: &Settings, setup_date: String) -> Result<String> {
    let marker = SetupMarker {
        setup_completed: true,
        setup_date,
        keystore_name: &settings.keystore_name,
        key_alias: &settings.key_alias,
        version: env!("CARGO_PKG_VERSION"),
    };
    serde_json::to_string_pretty(&marker).context("Failed to serialize setup marker")
}

/// Every file written by [`write_all`], in write order.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub key_properties: PathBuf,
    pub key_properties_template: PathBuf,
    pub keystore_info: PathBuf,
    pub secrets_guide: PathBuf,
    pub setup_marker: PathBuf,
}

/// Write all derived artifacts into the output directory.
///
/// Stops at the first failure; files already written are left in place.
pub fn write_all(settings: &Settings) -> Result<Artifacts> {
    let out = settings.output_dir();
    let artifacts = Artifacts {
        key_properties: out.join(KEY_PROPERTIES_FILE),
        key_properties_template: out.join(KEY_PROPERTIES_TEMPLATE_FILE),
        keystore_info: out.join(KEYSTORE_INFO_FILE),
        secrets_guide: out.join(SECRETS_GUIDE_FILE),
        setup_marker: out.join(SETUP_MARKER_FILE),
    };

    write_text(&artifacts.key_properties, render_key_properties(settings)?)?;
    write_text(
        &artifacts.key_properties_template,
        render_key_properties_template(settings)?,
    )?;
    write_text(
        &artifacts.keystore_info,
        render_keystore_info(settings, &timestamp()),
    )?;

    let keystore_path = settings.keystore_path();
    let keystore = fs::read(&keystore_path)
        .with_context(|| format!("Failed to read keystore: {}", keystore_path.display()))?;
    write_text(
        &artifacts.secrets_guide,
        render_secrets_guide(settings, &keystore),
    )?;

    let setup_date = chrono::Local::now().to_rfc3339();
    write_text(
        &artifacts.setup_marker,
        render_setup_marker(settings, setup_date)?,
    )?;

    Ok(artifacts)
}

/// File names inside the output directory that hold signing secrets.
fn secret_file_names(settings: &Settings) -> Vec<String> {
    vec![
        settings.keystore_name.clone(),
        KEY_PROPERTIES_FILE.to_string(),
        KEYSTORE_INFO_FILE.to_string(),
        SECRETS_GUIDE_FILE.to_string(),
        SETUP_MARKER_FILE.to_string(),
    ]
}

/// Lines from `wanted` that do not already appear as a line of `existing`.
pub fn missing_lines<'a>(existing: &str, wanted: &'a [String]) -> Vec<&'a str> {
    wanted
        .iter()
        .map(String::as_str)
        .filter(|line| !existing.lines().any(|l| l.trim() == *line))
        .collect()
}

/// Append `lines` to an ignore file, starting on a fresh line.
pub fn append_lines(path: &Path, existing: &str, lines: &[&str]) -> Result<()> {
    let mut content = existing.to_string();
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    fs::write(path, content).with_context(|| format!("Failed to update: {}", path.display()))
}

/// Keep the signing secrets out of version control.
///
/// The project's top-level `.gitignore` is amended only when it exists; the
/// output directory gets its own `.gitignore` when it has none yet.
pub fn update_secret_ignores(settings: &Settings) -> Result<()> {
    let root_ignore = settings.project_dir.join(GITIGNORE);
    if root_ignore.exists() {
        let existing = fs::read_to_string(&root_ignore)
            .with_context(|| format!("Failed to read: {}", root_ignore.display()))?;
        let dir = settings.keystore_dir.trim_end_matches(['/', '\\']);
        let mut wanted = vec![SECRETS_IGNORE_HEADER.to_string()];
        wanted.extend(
            secret_file_names(settings)
                .into_iter()
                .map(|name| format!("{dir}/{name}")),
        );

        let lines = missing_lines(&existing, &wanted);
        // A lone header means every rule is already there.
        if lines.iter().any(|l| *l != SECRETS_IGNORE_HEADER) {
            append_lines(&root_ignore, &existing, &lines)?;
            ui::success(&format!("Updated {}", root_ignore.display()));
        } else {
            ui::info(&format!("{} already ignores the signing files", root_ignore.display()));
        }
    } else {
        log::debug!("no {} in project, skipping", root_ignore.display());
    }

    let local_ignore = settings.output_dir().join(GITIGNORE);
    if !local_ignore.exists() {
        let mut wanted = vec![SECRETS_IGNORE_HEADER.to_string()];
        wanted.extend(secret_file_names(settings));
        let lines: Vec<&str> = wanted.iter().map(String::as_str).collect();
        append_lines(&local_ignore, "", &lines)?;
        ui::success(&format!("Created: {}", local_ignore.display()));
    }
    Ok(())
}
