use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Config file looked up inside the project directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "keystore.toml";

/// Name of the properties file the Gradle build reads signing values from.
pub const KEY_PROPERTIES_FILE: &str = "key.properties";

/// keytool refuses store passwords shorter than this.
const MIN_PASSWORD_LEN: usize = 6;

static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{(?P<braced>[^}]*)\}|\$(?P<bare>[A-Za-z_][A-Za-z0-9_]*)")
        .expect("valid regex")
});

/// Immutable signing setup for one run.
///
/// Built once from defaults, the optional TOML file and the command line,
/// then passed by reference to every step of the pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    #[serde(skip)]
    pub project_dir: PathBuf,
    pub developer_name: String,
    pub organizational_unit: String,
    pub company: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub keystore_dir: String,
    pub keystore_name: String,
    pub key_alias: String,
    pub validity_days: u32,
    pub password: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            developer_name: "Android Developer".to_string(),
            organizational_unit: "Development".to_string(),
            company: "Unknown".to_string(),
            city: "Unknown".to_string(),
            state: "Unknown".to_string(),
            country: "US".to_string(),
            keystore_dir: "necessary_files".to_string(),
            keystore_name: "upload-keystore.jks".to_string(),
            key_alias: "upload".to_string(),
            validity_days: 10000,
            password: "123456".to_string(),
        }
    }
}

/// Values given on the command line. `None` keeps the file/default value.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub developer_name: Option<String>,
    pub organizational_unit: Option<String>,
    pub company: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub keystore_dir: Option<String>,
    pub keystore_name: Option<String>,
    pub key_alias: Option<String>,
    pub validity_days: Option<u32>,
    pub password: Option<String>,
}

impl Settings {
    /// Directory all generated artifacts are written to.
    pub fn output_dir(&self) -> PathBuf {
        self.project_dir.join(&self.keystore_dir)
    }

    pub fn keystore_path(&self) -> PathBuf {
        self.output_dir().join(&self.keystore_name)
    }

    /// `storeFile` value, relative to the Android project directory.
    pub fn store_file(&self) -> String {
        format!(
            "../{}/{}",
            self.keystore_dir.trim_end_matches(['/', '\\']),
            self.keystore_name
        )
    }

    /// Certificate subject in keytool's `-dname` form.
    pub fn distinguished_name(&self) -> String {
        format!(
            "CN={}, OU={}, O={}, L={}, ST={}, C={}",
            self.developer_name,
            self.organizational_unit,
            self.company,
            self.city,
            self.state,
            self.country
        )
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        let Overrides {
            developer_name,
            organizational_unit,
            company,
            city,
            state,
            country,
            keystore_dir,
            keystore_name,
            key_alias,
            validity_days,
            password,
        } = overrides;

        replace_if_some(&mut self.developer_name, developer_name);
        replace_if_some(&mut self.organizational_unit, organizational_unit);
        replace_if_some(&mut self.company, company);
        replace_if_some(&mut self.city, city);
        replace_if_some(&mut self.state, state);
        replace_if_some(&mut self.country, country);
        replace_if_some(&mut self.keystore_dir, keystore_dir);
        replace_if_some(&mut self.keystore_name, keystore_name);
        replace_if_some(&mut self.key_alias, key_alias);
        replace_if_some(&mut self.validity_days, validity_days);
        replace_if_some(&mut self.password, password);
    }

    /// Expand `${VAR}` / `$VAR` references in every string field.
    pub fn expand(&mut self) -> Result<()> {
        for value in [
            &mut self.developer_name,
            &mut self.organizational_unit,
            &mut self.company,
            &mut self.city,
            &mut self.state,
            &mut self.country,
            &mut self.keystore_dir,
            &mut self.keystore_name,
            &mut self.key_alias,
            &mut self.password,
        ] {
            *value = expand_env_vars(value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.keystore_dir.trim().is_empty() {
            bail!("keystore_dir must not be empty");
        }
        // Gradle resolves storeFile relative to android/, so the directory
        // has to live inside the project.
        let dir = Path::new(&self.keystore_dir);
        if dir.is_absolute() || dir.has_root() {
            bail!(
                "keystore_dir must be relative to the project, got: {}",
                self.keystore_dir
            );
        }
        if self.keystore_name.trim().is_empty() {
            bail!("keystore_name must not be empty");
        }
        if self.keystore_name.contains(['/', '\\']) {
            bail!(
                "keystore_name must be a plain file name, got: {}",
                self.keystore_name
            );
        }
        if self.key_alias.trim().is_empty() {
            bail!("key_alias must not be empty");
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            bail!("password must be at least {MIN_PASSWORD_LEN} characters (keytool requirement)");
        }
        if self.validity_days == 0 {
            bail!("validity_days must be greater than zero");
        }
        if self.country.len() != 2 || !self.country.chars().all(|c| c.is_ascii_alphabetic()) {
            bail!(
                "country must be a two-letter ISO code, got: {}",
                self.country
            );
        }
        Ok(())
    }
}

fn replace_if_some<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// Parse settings from TOML text. Missing keys keep their defaults.
pub fn parse_settings(content: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(content).context("Failed to parse config")?;
    Ok(settings)
}

/// Build the settings for one run.
///
/// `config_path` is an explicit `--config` value and must exist; without it
/// `keystore.toml` in the project directory is used when present.
pub fn load_settings(
    project_dir: &Path,
    config_path: Option<&Path>,
    overrides: Overrides,
) -> Result<Settings> {
    let file = match config_path {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            Some(path.to_path_buf())
        }
        None => Some(project_dir.join(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
    };

    let mut settings = match &file {
        Some(path) => {
            log::debug!("loading config from {}", path.display());
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            parse_settings(&content)
                .with_context(|| format!("Invalid config: {}", path.display()))?
        }
        None => Settings::default(),
    };

    // Only file values are expanded; command-line values are taken verbatim.
    settings.expand()?;
    settings.project_dir = project_dir.to_path_buf();
    settings.apply_overrides(overrides);
    settings.validate()?;
    Ok(settings)
}

/// `${NAME}` must resolve; a bare `$NAME` is replaced only when set, so
/// passwords such as `Pa$$word` pass through untouched.
fn expand_env_vars(input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;

    for caps in ENV_REFERENCE.captures_iter(input) {
        let whole = caps.get_match();
        out.push_str(&input[last..whole.start()]);
        if let Some(name) = caps.name("braced") {
            let value = env::var(name.as_str())
                .with_context(|| format!("Missing env var: {}", name.as_str()))?;
            out.push_str(&value);
        } else if let Some(name) = caps.name("bare") {
            match env::var(name.as_str()) {
                Ok(value) => out.push_str(&value),
                Err(_) => out.push_str(whole.as_str()),
            }
        }
        last = whole.end();
    }

    let rest = &input[last..];
    if rest.contains("${") {
        bail!("Unclosed `${{` in config value");
    }
    out.push_str(rest);
    Ok(out)
}
