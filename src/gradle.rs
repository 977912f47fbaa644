//! Release-signing patch for the app module's Gradle build file.
//!
//! The build file is treated as flat text. Blocks are found by a regex on
//! their opener and sized with a brace scanner that skips strings and
//! comments, so nested blocks are removed whole. Everything this module
//! inserts sits between marker comments; every run strips those regions
//! first, which makes patching an already patched file a no-op.

use anyhow::{Context, Result};
use regex::Regex;
use std::fmt;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::config::{KEY_PROPERTIES_FILE, Settings};

pub const BACKUP_SUFFIX: &str = ".backup";

const BEGIN_MARKER: &str = "// >>> flutter-keystore-setup";
const END_MARKER: &str = "// <<< flutter-keystore-setup";

const KOTLIN_IMPORTS: &[&str] = &["import java.util.Properties", "import java.io.FileInputStream"];

static ANDROID_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*android\s*\{").expect("valid regex"));
static DEFAULT_CONFIG_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bdefaultConfig\s*\{").expect("valid regex"));
static SIGNING_CONTAINER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:buildTypes|signingConfigs)\s*\{").expect("valid regex")
});
static RELEASE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\brelease\b").expect("valid regex"));
static PROPERTIES_LOADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bkeystorePropertiesFile\b").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradleFlavor {
    Groovy,
    Kotlin,
}

impl fmt::Display for GradleFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradleFlavor::Groovy => write!(f, "Groovy DSL"),
            GradleFlavor::Kotlin => write!(f, "Kotlin DSL"),
        }
    }
}

/// Build files tried in order, relative to the project directory.
pub const BUILD_FILES: &[(&str, GradleFlavor)] = &[
    ("android/app/build.gradle", GradleFlavor::Groovy),
    ("android/app/build.gradle.kts", GradleFlavor::Kotlin),
];

#[derive(Debug, PartialEq, Eq)]
pub enum PatchOutcome {
    Patched {
        path: PathBuf,
        backup: PathBuf,
        flavor: GradleFlavor,
    },
    AlreadyPatched {
        path: PathBuf,
    },
    NotFound,
    /// A block the patch is anchored on does not exist in the file.
    MissingAnchor {
        path: PathBuf,
        anchor: &'static str,
    },
}

/// Result of patching text in memory.
#[derive(Debug, PartialEq, Eq)]
pub enum Patch {
    Text(String),
    MissingAnchor(&'static str),
}

pub fn locate_build_file(project_dir: &Path) -> Option<(PathBuf, GradleFlavor)> {
    BUILD_FILES
        .iter()
        .map(|(relative, flavor)| (project_dir.join(relative), *flavor))
        .find(|(path, _)| path.is_file())
}

pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Patch the app build file in place, keeping the original as `<file>.backup`.
///
/// Only I/O failures are errors; a missing file or anchor is an outcome.
pub fn patch_build_file(settings: &Settings) -> Result<PatchOutcome> {
    let Some((path, flavor)) = locate_build_file(&settings.project_dir) else {
        return Ok(PatchOutcome::NotFound);
    };
    log::debug!("patching {} ({flavor})", path.display());

    let original = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read: {}", path.display()))?;

    let patched = match patch_content(&original, flavor, settings) {
        Patch::Text(text) => text,
        Patch::MissingAnchor(anchor) => return Ok(PatchOutcome::MissingAnchor { path, anchor }),
    };
    if patched == original {
        return Ok(PatchOutcome::AlreadyPatched { path });
    }

    let backup = backup_path(&path);
    fs::write(&backup, &original)
        .with_context(|| format!("Failed to write backup: {}", backup.display()))?;
    fs::write(&path, &patched).with_context(|| format!("Failed to write: {}", path.display()))?;

    Ok(PatchOutcome::Patched {
        path,
        backup,
        flavor,
    })
}

/// Apply the signing patch to build file text.
pub fn patch_content(content: &str, flavor: GradleFlavor, settings: &Settings) -> Patch {
    let eol = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let mut text = strip_managed_regions(content);

    if flavor == GradleFlavor::Kotlin {
        text = ensure_kotlin_imports(&text, eol);
    }

    text = remove_release_blocks(&text);

    if !contains_code(&text, &PROPERTIES_LOADER) {
        let Some(at) = find_code(&text, &ANDROID_BLOCK) else {
            return Patch::MissingAnchor("android {");
        };
        text.insert_str(at.start, &render_region(&loader_lines(flavor, settings), eol));
    }

    let Some(at) = find_code(&text, &DEFAULT_CONFIG_BLOCK) else {
        return Patch::MissingAnchor("defaultConfig {");
    };
    let Some(close) = matching_brace(&text, at.end - 1) else {
        return Patch::MissingAnchor("defaultConfig { ... }");
    };
    let insert_at = match text[close..].find('\n') {
        Some(offset) => close + offset + 1,
        None => {
            text.push_str(eol);
            text.len()
        }
    };
    text.insert_str(insert_at, &render_region(&signing_lines(flavor), eol));

    Patch::Text(text)
}

/// Marker-wrapped lines followed by one blank line, which stripping removes too.
fn render_region(lines: &[String], eol: &str) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push_str(eol);
    }
    out.push_str(eol);
    out
}

fn loader_lines(flavor: GradleFlavor, settings: &Settings) -> Vec<String> {
    let properties = format!(
        "../{}/{KEY_PROPERTIES_FILE}",
        settings
            .keystore_dir
            .trim_end_matches(['/', '\\'])
            .replace('\\', "/")
    );
    let body = match flavor {
        GradleFlavor::Kotlin => vec![
            format!("val keystorePropertiesFile = rootProject.file(\"{properties}\")"),
            "val keystoreProperties = Properties()".to_string(),
            "if (keystorePropertiesFile.exists()) {".to_string(),
            "    keystoreProperties.load(FileInputStream(keystorePropertiesFile))".to_string(),
            "}".to_string(),
        ],
        GradleFlavor::Groovy => vec![
            "def keystoreProperties = new Properties()".to_string(),
            format!("def keystorePropertiesFile = rootProject.file('{properties}')"),
            "if (keystorePropertiesFile.exists()) {".to_string(),
            "    keystoreProperties.load(new FileInputStream(keystorePropertiesFile))".to_string(),
            "}".to_string(),
        ],
    };

    let mut lines = vec![format!("{BEGIN_MARKER}: keystore properties")];
    lines.extend(body);
    lines.push(END_MARKER.to_string());
    lines
}

fn signing_lines(flavor: GradleFlavor) -> Vec<String> {
    let body: &[&str] = match flavor {
        GradleFlavor::Kotlin => &[
            "signingConfigs {",
            "    create(\"release\") {",
            "        if (keystorePropertiesFile.exists()) {",
            "            keyAlias = keystoreProperties[\"keyAlias\"] as String",
            "            keyPassword = keystoreProperties[\"keyPassword\"] as String",
            "            storeFile = rootProject.file(keystoreProperties[\"storeFile\"] as String)",
            "            storePassword = keystoreProperties[\"storePassword\"] as String",
            "        }",
            "    }",
            "}",
            "",
            "buildTypes {",
            "    getByName(\"release\") {",
            "        signingConfig = signingConfigs.getByName(\"release\")",
            "    }",
            "}",
        ],
        GradleFlavor::Groovy => &[
            "signingConfigs {",
            "    release {",
            "        if (keystorePropertiesFile.exists()) {",
            "            keyAlias keystoreProperties['keyAlias']",
            "            keyPassword keystoreProperties['keyPassword']",
            "            storeFile keystoreProperties['storeFile'] ? rootProject.file(keystoreProperties['storeFile']) : null",
            "            storePassword keystoreProperties['storePassword']",
            "        }",
            "    }",
            "}",
            "",
            "buildTypes {",
            "    release {",
            "        signingConfig signingConfigs.release",
            "    }",
            "}",
        ],
    };

    const INDENT: &str = "    ";
    let mut lines = vec![format!("{INDENT}{BEGIN_MARKER}: release signing")];
    lines.extend(body.iter().map(|line| {
        if line.is_empty() {
            String::new()
        } else {
            format!("{INDENT}{line}")
        }
    }));
    lines.push(format!("{INDENT}{END_MARKER}"));
    lines
}

/// Drop every marker-delimited region plus the blank line that follows it.
/// A begin marker without an end marker is left alone.
fn strip_managed_regions(content: &str) -> String {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let mut out = String::with_capacity(content.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if line.trim_start().starts_with(BEGIN_MARKER) {
            let end = (i + 1..lines.len()).find(|&j| lines[j].trim_start().starts_with(END_MARKER));
            if let Some(end) = end {
                i = end + 1;
                if i < lines.len() && lines[i].trim().is_empty() {
                    i += 1;
                }
                continue;
            }
            log::warn!("unterminated managed region at line {}, left in place", i + 1);
        }
        out.push_str(line);
        i += 1;
    }
    out
}

fn ensure_kotlin_imports(content: &str, eol: &str) -> String {
    let missing: Vec<&str> = KOTLIN_IMPORTS
        .iter()
        .copied()
        .filter(|import| !content.lines().any(|line| line.trim() == *import))
        .collect();
    if missing.is_empty() {
        return content.to_string();
    }

    let mut out = String::new();
    for import in &missing {
        out.push_str(import);
        out.push_str(eol);
    }
    out.push_str(eol);
    out.push_str(content);
    out
}

/// Remove `buildTypes { }` / `signingConfigs { }` blocks that configure `release`.
fn remove_release_blocks(content: &str) -> String {
    let mut text = content.to_string();
    let mut from = 0;

    while let Some(m) = SIGNING_CONTAINER.find_at(&text, from) {
        let (block_start, opener_end) = (m.start(), m.end());
        if !is_code_at(&text, block_start) {
            from = opener_end;
            continue;
        }
        let open = opener_end - 1;
        let Some(close) = matching_brace(&text, open) else {
            log::warn!("unbalanced braces in block at byte {block_start}, left in place");
            from = opener_end;
            continue;
        };

        if RELEASE_WORD.is_match(&without_comments(&text[open + 1..close])) {
            let (start, end) = widen_to_lines(&text, block_start, close + 1);
            log::debug!("removing existing release block at byte {block_start}");
            text.replace_range(start..end, "");
            from = start;
        } else {
            from = opener_end;
        }
    }
    text
}

/// Grow `start..end` to whole lines when nothing else shares them.
fn widen_to_lines(text: &str, start: usize, end: usize) -> (usize, usize) {
    let bytes = text.as_bytes();

    let mut s = start;
    while s > 0 && matches!(bytes[s - 1], b' ' | b'\t') {
        s -= 1;
    }
    if s != 0 && bytes[s - 1] != b'\n' {
        return (start, end);
    }

    let mut e = end;
    while e < bytes.len() && matches!(bytes[e], b' ' | b'\t' | b'\r') {
        e += 1;
    }
    if e == bytes.len() {
        return (s, e);
    }
    if bytes[e] == b'\n' {
        return (s, e + 1);
    }
    (start, end)
}

fn find_code(text: &str, pattern: &Regex) -> Option<Range<usize>> {
    pattern
        .find_iter(text)
        .find(|m| is_code_at(text, m.start()))
        .map(|m| m.range())
}

fn contains_code(text: &str, pattern: &Regex) -> bool {
    find_code(text, pattern).is_some()
}

fn is_code_at(text: &str, idx: usize) -> bool {
    CodeBytes::new(text, 0)
        .take_while(|(i, _)| *i <= idx)
        .any(|(i, _)| i == idx)
}

/// `text` with comments blanked out. String literals are kept, since
/// `create("release")` names a block by string.
fn without_comments(text: &str) -> String {
    let scan = CodeBytes::new(text, 0);
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut out = String::with_capacity(len);
    let mut i = 0;

    while i < len {
        let rest = &bytes[i..];
        if rest.starts_with(b"//") {
            out.push(' ');
            i = scan.position_of(i, b"\n").unwrap_or(len);
        } else if rest.starts_with(b"/*") {
            out.push(' ');
            i = scan.position_of(i + 2, b"*/").map_or(len, |e| e + 2);
        } else if rest.starts_with(b"\"\"\"") || rest.starts_with(b"'''") {
            let end = scan.position_of(i + 3, &rest[..3]).map_or(len, |e| e + 3);
            out.push_str(&text[i..end]);
            i = end;
        } else if rest[0] == b'"' || rest[0] == b'\'' {
            let end = scan.skip_quoted(i).min(len);
            out.push_str(&text[i..end]);
            i = end;
        } else {
            let Some(ch) = text[i..].chars().next() else {
                break;
            };
            out.push(ch);
            i += ch.len_utf8();
        }
    }
    out
}

/// Offset of the `}` closing the `{` at `open`.
fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in CodeBytes::new(text, open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Bytes outside comments and string literals, with their offsets.
///
/// Works on bytes: every delimiter is ASCII, so offsets are char boundaries.
struct CodeBytes<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> CodeBytes<'a> {
    fn new(text: &'a str, from: usize) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: from,
        }
    }

    fn position_of(&self, from: usize, needle: &[u8]) -> Option<usize> {
        self.bytes
            .get(from..)?
            .windows(needle.len())
            .position(|w| w == needle)
            .map(|p| from + p)
    }

    fn skip_quoted(&self, start: usize) -> usize {
        let quote = self.bytes[start];
        let mut j = start + 1;
        while j < self.bytes.len() {
            match self.bytes[j] {
                b'\\' => j += 2,
                b'\n' => return j,
                b if b == quote => return j + 1,
                _ => j += 1,
            }
        }
        self.bytes.len()
    }
}

impl Iterator for CodeBytes<'_> {
    type Item = (usize, u8);

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.bytes;
        let len = bytes.len();
        while self.pos < len {
            let i = self.pos;
            let rest = &bytes[i..];

            if rest.starts_with(b"//") {
                self.pos = self.position_of(i, b"\n").unwrap_or(len);
            } else if rest.starts_with(b"/*") {
                self.pos = self.position_of(i + 2, b"*/").map_or(len, |e| e + 2);
            } else if rest.starts_with(b"\"\"\"") || rest.starts_with(b"'''") {
                let delimiter = &rest[..3];
                self.pos = self.position_of(i + 3, delimiter).map_or(len, |e| e + 3);
            } else if rest[0] == b'"' || rest[0] == b'\'' {
                self.pos = self.skip_quoted(i);
            } else {
                self.pos = i + 1;
                return Some((i, rest[0]));
            }
        }
        None
    }
}
