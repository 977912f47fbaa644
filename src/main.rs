use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use flutter_keystore_setup::{
    Confirm, KeytoolLocator, Outcome, Overrides, Preset, StdinConfirm, Steps, load_settings,
    logging, run, ui,
};

#[derive(Parser, Debug)]
#[command(
    name = "flutter-keystore-setup",
    version,
    about = "Generate an Android upload keystore and wire it into a Flutter project"
)]
struct Args {
    /// TOML config file. Defaults to keystore.toml in the project directory, if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Flutter project root
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,

    /// Directory (relative to the project) that receives the keystore and generated files
    #[arg(long)]
    output_dir: Option<String>,

    /// Keystore file name
    #[arg(long)]
    keystore_name: Option<String>,

    /// Key alias
    #[arg(long)]
    alias: Option<String>,

    /// Password for both the keystore and the key
    #[arg(long)]
    password: Option<String>,

    /// Certificate validity in days
    #[arg(long)]
    validity_days: Option<u32>,

    /// Certificate CN
    #[arg(long)]
    developer_name: Option<String>,

    /// Certificate OU
    #[arg(long)]
    organizational_unit: Option<String>,

    /// Certificate O
    #[arg(long)]
    company: Option<String>,

    /// Certificate L
    #[arg(long)]
    city: Option<String>,

    /// Certificate ST
    #[arg(long)]
    state: Option<String>,

    /// Certificate C (two-letter code)
    #[arg(long)]
    country: Option<String>,

    /// Overwrite an existing keystore without asking
    #[arg(short, long)]
    yes: bool,

    /// Do not look for Firebase config files
    #[arg(long)]
    skip_firebase: bool,

    /// Do not patch android/app/build.gradle(.kts)
    #[arg(long)]
    skip_gradle: bool,

    /// Log level for diagnostics (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            developer_name: self.developer_name.clone(),
            organizational_unit: self.organizational_unit.clone(),
            company: self.company.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            country: self.country.clone(),
            keystore_dir: self.output_dir.clone(),
            keystore_name: self.keystore_name.clone(),
            key_alias: self.alias.clone(),
            validity_days: self.validity_days,
            password: self.password.clone(),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logger(&args.log_level);

    ctrlc::set_handler(|| {
        ui::error("Cancelled by user");
        std::process::exit(1);
    })
    .context("Failed to install Ctrl-C handler")?;

    let settings = load_settings(&args.project_dir, args.config.as_deref(), args.overrides())?;

    let confirm: Box<dyn Confirm> = if args.yes {
        Box::new(Preset(true))
    } else {
        Box::new(StdinConfirm)
    };
    let steps = Steps {
        skip_firebase: args.skip_firebase,
        skip_gradle: args.skip_gradle,
    };

    match run(&settings, &KeytoolLocator::from_env(), confirm.as_ref(), steps)? {
        Outcome::Completed(summary) => {
            log::info!("setup finished, keystore at {}", summary.keystore.display())
        }
        Outcome::Cancelled => log::info!("setup cancelled, nothing changed"),
    }
    Ok(())
}
