//! Locating `keytool` and generating the upload keystore with it.

use anyhow::{Context, Result, bail};
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::Settings;

pub const KEY_ALGORITHM: &str = "RSA";
pub const KEY_SIZE: u32 = 2048;

/// Known JDK / Android Studio install locations, checked after the search path.
const FALLBACK_INSTALLS: &[&str] = &[
    r"C:\Program Files\Java\jdk-21\bin\keytool.exe",
    r"C:\Program Files\Java\jdk-22\bin\keytool.exe",
    r"C:\Program Files\Java\jdk-20\bin\keytool.exe",
    r"C:\Program Files\Java\jdk-17\bin\keytool.exe",
    r"C:\Program Files\Android\Android Studio\jbr\bin\keytool.exe",
    "/Applications/Android Studio.app/Contents/jbr/Contents/Home/bin/keytool",
    "/opt/homebrew/opt/openjdk/bin/keytool",
    "/usr/local/opt/openjdk/bin/keytool",
    "/usr/lib/jvm/default-java/bin/keytool",
    "/usr/lib/jvm/java-21-openjdk/bin/keytool",
    "/usr/lib/jvm/java-17-openjdk/bin/keytool",
];

fn keytool_file_name() -> &'static str {
    if cfg!(windows) { "keytool.exe" } else { "keytool" }
}

/// A usable keytool together with the search path its child processes get.
#[derive(Debug, Clone)]
pub struct Keytool {
    program: PathBuf,
    search_path: Option<OsString>,
}

impl Keytool {
    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn search_path(&self) -> Option<&OsString> {
        self.search_path.as_ref()
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        if let Some(path) = &self.search_path {
            command.env("PATH", path);
        }
        command
    }

    /// Run `keytool -help`; anything but a clean exit means it is unusable.
    pub fn verify(&self) -> Result<()> {
        let output = self
            .command()
            .arg("-help")
            .output()
            .with_context(|| format!("Failed to run {}", self.program.display()))?;
        if !output.status.success() {
            bail!(
                "{} -help exited with status: {}",
                self.program.display(),
                output.status
            );
        }
        Ok(())
    }

    /// Generate a keystore holding a single self-signed RSA key pair.
    ///
    /// Store and key share `settings.password`. A failed run removes whatever
    /// keytool left at the target path.
    pub fn generate_keystore(&self, settings: &Settings) -> Result<PathBuf> {
        let keystore_path = settings.keystore_path();
        let args = genkey_args(settings, &keystore_path);
        log::debug!(
            "running {} {}",
            self.program.display(),
            redact(&args, &settings.password).join(" ")
        );

        let output = self
            .command()
            .args(&args)
            .output()
            .context("Failed to run keytool")?;

        if !output.status.success() {
            discard_partial(&keystore_path);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() {
                stdout.trim()
            } else {
                stderr.trim()
            };
            bail!("keytool failed with status {}: {}", output.status, detail);
        }

        if !keystore_path.exists() {
            bail!(
                "keytool reported success but no keystore was written at {}",
                keystore_path.display()
            );
        }
        Ok(keystore_path)
    }
}

fn discard_partial(path: &Path) {
    if path.exists() {
        if let Err(err) = fs::remove_file(path) {
            log::warn!("could not remove partial keystore {}: {err}", path.display());
        }
    }
}

/// Full `keytool -genkey` argument list, in the order keytool documents it.
pub fn genkey_args(settings: &Settings, keystore_path: &Path) -> Vec<String> {
    vec![
        "-genkey".to_string(),
        "-v".to_string(),
        "-keystore".to_string(),
        keystore_path.to_string_lossy().into_owned(),
        "-keyalg".to_string(),
        KEY_ALGORITHM.to_string(),
        "-keysize".to_string(),
        KEY_SIZE.to_string(),
        "-validity".to_string(),
        settings.validity_days.to_string(),
        "-alias".to_string(),
        settings.key_alias.clone(),
        "-storepass".to_string(),
        settings.password.clone(),
        "-keypass".to_string(),
        settings.password.clone(),
        "-dname".to_string(),
        settings.distinguished_name(),
    ]
}

fn redact(args: &[String], secret: &str) -> Vec<String> {
    args.iter()
        .map(|arg| {
            if arg == secret {
                "******".to_string()
            } else {
                arg.clone()
            }
        })
        .collect()
}

/// Where to look for keytool: a search path, then fixed install locations.
#[derive(Debug, Clone, Default)]
pub struct KeytoolLocator {
    search_path: Option<OsString>,
    fallbacks: Vec<PathBuf>,
}

impl KeytoolLocator {
    pub fn new(search_path: Option<OsString>, fallbacks: Vec<PathBuf>) -> Self {
        Self {
            search_path,
            fallbacks,
        }
    }

    /// Inherited `PATH`, then `$JAVA_HOME/bin`, then the known install list.
    pub fn from_env() -> Self {
        let mut fallbacks = Vec::new();
        if let Some(java_home) = env::var_os("JAVA_HOME") {
            fallbacks.push(PathBuf::from(java_home).join("bin").join(keytool_file_name()));
        }
        fallbacks.extend(FALLBACK_INSTALLS.iter().map(PathBuf::from));
        Self::new(env::var_os("PATH"), fallbacks)
    }

    pub fn locate(&self) -> Result<Keytool> {
        if let Some(search_path) = &self.search_path {
            let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            if let Ok(program) = which::which_in(keytool_file_name(), Some(search_path), &cwd) {
                log::debug!("keytool found on search path: {}", program.display());
                return Ok(Keytool {
                    program,
                    search_path: None,
                });
            }
        }

        for candidate in &self.fallbacks {
            if !candidate.is_file() {
                continue;
            }
            log::debug!("keytool found at fallback location: {}", candidate.display());
            let search_path = match candidate.parent() {
                Some(dir) => Some(self.prepend_to_search_path(dir)?),
                None => self.search_path.clone(),
            };
            return Ok(Keytool {
                program: candidate.clone(),
                search_path,
            });
        }

        bail!("keytool not found in PATH or any known JDK location. Install a JDK.")
    }

    fn prepend_to_search_path(&self, dir: &Path) -> Result<OsString> {
        let inherited = self
            .search_path
            .as_ref()
            .map(|p| env::split_paths(p).collect::<Vec<_>>())
            .unwrap_or_default();
        env::join_paths(std::iter::once(dir.to_path_buf()).chain(inherited))
            .with_context(|| format!("Cannot add {} to the search path", dir.display()))
    }
}

/// Locate keytool and make sure it actually runs.
pub fn find_working_keytool(locator: &KeytoolLocator) -> Result<Keytool> {
    let keytool = locator.locate()?;
    keytool
        .verify()
        .with_context(|| format!("keytool at {} is not usable", keytool.program().display()))?;
    Ok(keytool)
}
