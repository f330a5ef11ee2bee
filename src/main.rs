/// Version injected at compile time via VIRTFUSION_PROVIDER_VERSION env var
/// (set by CI/CD), or "dev" for local builds.
pub const VERSION: &str = match option_env!("VIRTFUSION_PROVIDER_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use virtfusion_provider::config::Config;
use virtfusion_provider::resource::registry::{get_data_source, get_resource, FieldRole};
use virtfusion_provider::state::{refresh_all, StateFile};
use virtfusion_provider::virtfusion::error::status_hint;
use virtfusion_provider::{ApiError, DataSource, Provider, Record, Resource};

/// Exit code of `read` when the remote object does not exist
const EXIT_ABSENT: u8 = 3;

/// Drive VirtFusion resources from the command line
#[derive(Parser, Debug)]
#[command(name = "virtfusion", version, about, long_about = None)]
struct Args {
    /// Control panel host or URL (overrides config and VIRTFUSION_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// API token (overrides config and VIRTFUSION_API_TOKEN)
    #[arg(long, global = true)]
    api_token: Option<String>,

    /// Config file to load instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List resource and data source kinds, or the fields of one kind
    Kinds { kind: Option<String> },
    /// Create a resource from a JSON or YAML record
    Create {
        kind: String,
        /// Input file, `-` for stdin
        #[arg(long)]
        input: String,
        /// Track the created record in this state file
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Read a resource by id
    Read { kind: String, id: i64 },
    /// Update a resource against its current remote state
    Update {
        kind: String,
        id: i64,
        #[arg(long)]
        input: String,
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Delete a resource by id
    Delete {
        kind: String,
        id: i64,
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Import an existing resource by id
    Import {
        kind: String,
        id: i64,
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Read a data source by id
    Data { kind: String, id: i64 },
    /// Re-read every record in a state file
    Refresh {
        #[arg(long)]
        state: PathBuf,
    },
    /// Store the endpoint and resource defaults in the config file
    Configure(Settings),
}

/// Settings persisted by `configure`. The API token is never stored.
#[derive(clap::Args, Debug)]
struct Settings {
    #[arg(long)]
    default_os_template: Option<String>,
    #[arg(long)]
    default_package_id: Option<i64>,
    #[arg(long)]
    default_public_ipv4: Option<i64>,
    #[arg(long)]
    default_private_ipv4: Option<i64>,
    #[arg(long)]
    default_hypervisor_group_id: Option<i64>,
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // RUST_LOG wins over --log-level when set
    let filter = match (EnvFilter::try_from_default_env(), level.to_tracing_level()) {
        (Ok(filter), _) => filter,
        (Err(_), Some(tracing_level)) => EnvFilter::new(tracing_level.to_string().to_lowercase()),
        (Err(_), None) => return None,
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: cannot open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("virtfusion {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("virtfusion").join("virtfusion.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".virtfusion").join("virtfusion.log");
    }
    PathBuf::from("virtfusion.log")
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            match err.downcast_ref::<ApiError>() {
                Some(api_err) if api_err.is_local() => {
                    eprintln!("Hint: nothing was sent to the server. Fix the input and retry.");
                }
                Some(api_err) => {
                    if let Some(hint) = api_err.status().and_then(status_hint) {
                        eprintln!("Hint: {hint}");
                    }
                }
                None => {}
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    if let Command::Kinds { kind } = &args.command {
        print_kinds(kind.as_deref())?;
        return Ok(ExitCode::SUCCESS);
    }

    if let Command::Configure(settings) = &args.command {
        let path = save_settings(&args, settings)?;
        println!("Saved configuration to {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let provider = configure(&args)?;

    match args.command {
        Command::Kinds { .. } | Command::Configure(_) => {}
        Command::Create { kind, input, state } => {
            let adapter = provider.resource(&kind)?;
            let planned = load_record(&kind, &input)?;
            let record = adapter.create(planned).await?;
            if let Some(path) = state {
                track(&path, &kind, record.clone())?;
            }
            print_record(&record)?;
        }
        Command::Read { kind, id } => {
            let adapter = provider.resource(&kind)?;
            match adapter.read(Record::with_id(id)).await? {
                Some(record) => print_record(&record)?,
                None => {
                    eprintln!("{} {} does not exist", kind, id);
                    return Ok(ExitCode::from(EXIT_ABSENT));
                }
            }
        }
        Command::Update { kind, id, input, state } => {
            let adapter = provider.resource(&kind)?;
            let planned = load_record(&kind, &input)?;
            // Write-only inputs are only known from the tracked copy
            let seed = match &state {
                Some(path) => StateFile::load(path)?.seed(&kind, id),
                None => Record::with_id(id),
            };
            let prior = adapter
                .read(seed)
                .await?
                .with_context(|| format!("{} {} does not exist", kind, id))?;
            let record = adapter.update(&prior, planned).await?;
            if let Some(path) = state {
                track(&path, &kind, record.clone())?;
            }
            print_record(&record)?;
        }
        Command::Delete { kind, id, state } => {
            let adapter = provider.resource(&kind)?;
            adapter.delete(&Record::with_id(id)).await?;
            if let Some(path) = state {
                let mut tracked = StateFile::load(&path)?;
                if tracked.remove(&kind, id) {
                    tracked.save(&path)?;
                }
            }
            println!("Deleted {} {}", kind, id);
        }
        Command::Import { kind, id, state } => {
            let adapter = provider.resource(&kind)?;
            let record = adapter
                .import(id)
                .await?
                .with_context(|| format!("{} {} does not exist", kind, id))?;
            if let Some(path) = state {
                track(&path, &kind, record.clone())?;
            }
            print_record(&record)?;
        }
        Command::Data { kind, id } => {
            let source = provider.data_source(&kind)?;
            let record = source.read(Record::with_id(id)).await?;
            print_record(&record)?;
        }
        Command::Refresh { state } => {
            let mut tracked = StateFile::load(&state)?;
            let summary = refresh_all(&provider, &mut tracked).await;
            tracked.save(&state)?;

            println!("Refreshed {} record(s)", summary.refreshed);
            for (kind, id) in &summary.removed {
                println!("Removed {} {} (no longer exists)", kind, id);
            }
            for (kind, id, error) in &summary.failed {
                eprintln!("Failed to refresh {} {:?}: {}", kind, id, error);
            }
            if !summary.failed.is_empty() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Config file named by `--config`, or the default location
fn load_config(args: &Args) -> Config {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    config.overlay(Config {
        endpoint: args.endpoint.clone(),
        api_token: args.api_token.clone(),
        ..Default::default()
    });
    config
}

/// Merge `configure` flags into the config file and write it back
fn save_settings(args: &Args, settings: &Settings) -> Result<PathBuf> {
    let mut config = load_config(args);
    config.overlay(Config {
        default_os_template: settings.default_os_template.clone(),
        default_package_id: settings.default_package_id,
        default_public_ipv4: settings.default_public_ipv4,
        default_private_ipv4: settings.default_private_ipv4,
        default_hypervisor_group_id: settings.default_hypervisor_group_id,
        timeout_secs: settings.timeout_secs,
        ..Default::default()
    });

    let path = match &args.config {
        Some(path) => path.clone(),
        None => Config::config_path().context("No config directory on this system")?,
    };
    config.save_to(&path).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Load config, apply CLI overrides, resolve against the environment
fn configure(args: &Args) -> Result<Provider> {
    let config = load_config(args);

    let resolved = config.resolve()?;
    let provider = Provider::configure(&resolved).context("Failed to configure provider")?;
    Ok(provider)
}

/// Read a record from a JSON or YAML file, `-` meaning stdin
fn load_record(kind: &str, input: &str) -> Result<Record> {
    let def = get_resource(kind).ok_or_else(|| ApiError::UnknownKind(kind.to_string()))?;

    let content = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read input from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))?
    };

    let is_yaml = Path::new(input)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    let value: Value = if is_yaml {
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse YAML from {}", input))?
    } else {
        serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON from {}", input))?
    };

    Ok(Record::from_input(kind, def, &value)?)
}

fn track(path: &Path, kind: &str, record: Record) -> Result<()> {
    let mut tracked = StateFile::load(path)?;
    tracked.upsert(kind, record);
    tracked.save(path)
}

fn print_record(record: &Record) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&record.to_json())?);
    Ok(())
}

fn print_kinds(kind: Option<&str>) -> Result<()> {
    let Some(kind) = kind else {
        println!("Resources:");
        for key in virtfusion_provider::resource::get_all_resource_keys() {
            println!("  {}", key);
        }
        println!("Data sources:");
        for key in virtfusion_provider::resource::get_all_data_source_keys() {
            println!("  {}", key);
        }
        return Ok(());
    };

    let Some(def) = get_resource(kind).or_else(|| get_data_source(kind)) else {
        bail!("unknown kind `{}`", kind);
    };

    println!("{} ({})", def.display_name, def.collection);
    for field in &def.fields {
        let role = match field.role {
            FieldRole::Required => "required",
            FieldRole::Optional => "optional",
            FieldRole::Computed => "computed",
        };
        let immutable = if field.immutable { ", immutable" } else { "" };
        println!(
            "  {:<24} {:<10} {}{}  {}",
            field.name,
            field.field_type.describe(),
            role,
            immutable,
            field.description
        );
    }
    Ok(())
}
