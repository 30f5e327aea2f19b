use std::env;
use std::io::{self, IsTerminal, Write};
use std::net::SocketAddr;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use log::{LevelFilter, debug, info, warn};
use serde::Serialize;
use tokio::net::TcpListener;

use careline::auth::{AuthConfig, AuthState, Role};
use careline::config::{self, APP_NAME, AppConfig, AppPaths};
use careline::user::{CreateUserRequest, UserInfo, UserRepository, UserService};
use careline::{api, db, notify};

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn async_serve(ctx: RuntimeContext, cmd: ServeCommand) -> Result<()> {
    handle_serve(&ctx, cmd).await
}

#[tokio::main]
async fn async_staff(ctx: RuntimeContext, cmd: StaffCommand) -> Result<()> {
    handle_staff(&ctx, cmd).await
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common)?;
    ctx.init_logging()?;
    debug!("resolved paths: {}", ctx.paths);

    match cli.command {
        Command::Serve(cmd) => async_serve(ctx, cmd),
        Command::Init { force } => handle_init(&ctx, force),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Staff { command } => async_staff(ctx, command),
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), APP_NAME, &mut io::stdout());
            Ok(())
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Careline membership and intake backend",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Config file, or a directory holding config.toml
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    /// More log output; repeat for trace
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Same as -v
    #[arg(long, global = true)]
    debug: bool,
    /// Log everything
    #[arg(long, global = true)]
    trace: bool,
    /// JSON output and JSON log lines
    #[arg(long, global = true, conflicts_with = "yaml")]
    json: bool,
    /// YAML output
    #[arg(long, global = true)]
    yaml: bool,
    /// Never colour log output
    #[arg(long = "no-color", global = true, conflicts_with = "color")]
    no_color: bool,
    /// When to colour log output
    #[arg(long, value_enum, default_value_t = ColorOption::Auto, global = true)]
    color: ColorOption,
    /// Report what would change without writing anything
    #[arg(long = "dry-run", global = true)]
    dry_run: bool,
    /// Answer yes to confirmations such as overwriting the config
    #[arg(short = 'y', long = "yes", global = true)]
    assume_yes: bool,
    /// Include target, file and line in log lines
    #[arg(long, global = true)]
    diagnostics: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorOption {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the API server
    Serve(ServeCommand),
    /// Write a default config file
    Init {
        /// Replace an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Show or reset the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Manage clinician and admin accounts
    Staff {
        #[command(subcommand)]
        command: StaffCommand,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
struct ServeCommand {
    /// Bind address (default: server.host)
    #[arg(long)]
    host: Option<String>,
    /// Port (default: server.port)
    #[arg(short, long)]
    port: Option<u16>,
    /// SQLite file (default: database.path)
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Overwrite the config file with defaults
    Reset,
}

#[derive(Debug, Subcommand)]
enum StaffCommand {
    /// Create a clinician or admin account
    Add(StaffAddCommand),
    /// List clinician and admin accounts
    List,
}

#[derive(Debug, Args)]
struct StaffAddCommand {
    #[arg(long)]
    email: String,
    /// Name shown in the consoles
    #[arg(long)]
    name: String,
    #[arg(long, value_enum, default_value_t = StaffRole::Clinician)]
    role: StaffRole,
    #[arg(long, env = "CARELINE_STAFF_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StaffRole {
    Clinician,
    Admin,
}

impl From<StaffRole> for Role {
    fn from(role: StaffRole) -> Self {
        match role {
            StaffRole::Clinician => Role::Clinician,
            StaffRole::Admin => Role::Admin,
        }
    }
}

struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let paths = AppPaths::discover(common.config.as_deref())?;

        // First run: leave a config file behind to edit.
        if !paths.config_file.exists() && !common.dry_run {
            AppConfig::write_default(&paths.config_file)?;
        }
        let config = AppConfig::load(&paths.config_file)?;
        let paths = paths.with_overrides(&config.paths)?;

        if !common.dry_run {
            paths.create_dirs()?;
        }

        Ok(Self {
            common,
            paths,
            config,
        })
    }

    fn init_logging(&self) -> Result<()> {
        use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

        let level = self.log_level();
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = level.as_str().to_lowercase();
            EnvFilter::new(format!("careline={level},tower_http={level}"))
        });

        let file_layer = match self.config.logging.file.as_deref() {
            Some(path) => {
                let file = open_log_file(Path::new(path))?;
                Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
            }
            None => None,
        };

        let registry = tracing_subscriber::registry().with(filter).with(file_layer);
        if self.common.json {
            registry.with(fmt::layer().json()).try_init().ok();
        } else {
            let diagnostics = self.common.diagnostics;
            registry
                .with(
                    fmt::layer()
                        .with_writer(io::stderr)
                        .with_ansi(self.use_color())
                        .with_target(diagnostics)
                        .with_file(diagnostics)
                        .with_line_number(diagnostics),
                )
                .try_init()
                .ok();
        }

        // `log` records from the auth middleware.
        env_logger::Builder::new()
            .filter_level(level)
            .try_init()
            .ok();
        log::set_max_level(level);
        Ok(())
    }

    /// Flags first, then `logging.level`.
    fn log_level(&self) -> LevelFilter {
        let common = &self.common;
        if common.quiet {
            LevelFilter::Error
        } else if common.trace || common.verbose >= 2 {
            LevelFilter::Trace
        } else if common.debug || common.verbose == 1 {
            LevelFilter::Debug
        } else {
            self.config
                .logging
                .level
                .parse()
                .unwrap_or(LevelFilter::Info)
        }
    }

    fn use_color(&self) -> bool {
        match self.common.color {
            _ if self.common.no_color => false,
            ColorOption::Never => false,
            ColorOption::Always => true,
            ColorOption::Auto => {
                env::var_os("NO_COLOR").is_none()
                    && (env::var_os("FORCE_COLOR").is_some() || io::stderr().is_terminal())
            }
        }
    }

    fn database_path(&self, override_path: Option<PathBuf>) -> Result<PathBuf> {
        match override_path {
            Some(path) => config::expand_path(&path),
            None => self.config.database_path(&self.paths.data_dir),
        }
    }

    /// Print `value` as JSON or YAML when asked, otherwise with `plain`.
    fn emit<T: Serialize>(&self, value: &T, plain: impl FnOnce(&T)) -> Result<()> {
        if self.common.json {
            let text = serde_json::to_string_pretty(value).context("serializing to JSON")?;
            println!("{text}");
        } else if self.common.yaml {
            let text = serde_yaml::to_string(value).context("serializing to YAML")?;
            print!("{text}");
        } else {
            plain(value);
        }
        Ok(())
    }
}

fn handle_init(ctx: &RuntimeContext, force: bool) -> Result<()> {
    let path = &ctx.paths.config_file;
    if path.exists() && !(force || ctx.common.assume_yes) {
        return Err(anyhow!(
            "{} already exists (pass --force to replace it)",
            path.display()
        ));
    }
    if ctx.common.dry_run {
        info!("dry-run: would write {}", path.display());
        return Ok(());
    }
    AppConfig::write_default(path)?;
    info!("wrote {}", path.display());
    Ok(())
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => ctx.emit(&ctx.config, |config| println!("{config:#?}")),
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Reset if ctx.common.dry_run => {
            info!("dry-run: would reset {}", ctx.paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Reset => AppConfig::write_default(&ctx.paths.config_file),
    }
}

async fn handle_staff(ctx: &RuntimeContext, cmd: StaffCommand) -> Result<()> {
    let database = db::Database::new(&ctx.database_path(None)?).await?;
    let users = UserService::new(UserRepository::new(database.pool().clone()));

    let accounts: Vec<UserInfo> = match cmd {
        StaffCommand::Add(add) => {
            let role = Role::from(add.role);
            if ctx.common.dry_run {
                info!("dry-run: would create {role} account {}", add.email);
                return Ok(());
            }
            let user = users
                .create_staff(CreateUserRequest {
                    email: add.email,
                    password: add.password,
                    display_name: add.name,
                    role,
                })
                .await
                .context("creating staff account")?;
            info!("created {role} account {}", user.id);
            vec![user.into()]
        }
        StaffCommand::List => users
            .list_staff()
            .await
            .context("listing staff accounts")?
            .into_iter()
            .map(UserInfo::from)
            .collect(),
    };

    ctx.emit(&accounts, |accounts| {
        for account in accounts {
            println!(
                "{}\t{}\t{}\t{}",
                account.id, account.role, account.email, account.display_name
            );
        }
    })
}

async fn handle_serve(ctx: &RuntimeContext, cmd: ServeCommand) -> Result<()> {
    let db_path = ctx.database_path(cmd.database)?;
    info!("Database: {}", db_path.display());
    let database = db::Database::new(&db_path).await?;

    let mut auth_config: AuthConfig = ctx.config.auth.clone();
    if auth_config.dev_mode && auth_config.jwt_secret.is_none() {
        warn!("auth.jwt_secret is not set; using a throwaway secret for this dev-mode run");
        auth_config.jwt_secret = Some(AuthConfig::generate_jwt_secret());
    }
    auth_config
        .validate()
        .context("Invalid auth configuration")?;
    if auth_config.dev_mode {
        warn!("Dev mode is on: dev users and X-Dev-User are accepted");
    }

    let notifier = notify::from_config(&ctx.config.notifications)
        .context("configuring notifications")?;
    let state =
        api::AppState::new(database, AuthState::new(auth_config)).with_notifier(notifier);
    let app = api::create_router(state);

    let host = cmd.host.as_deref().unwrap_or(&ctx.config.server.host);
    let port = cmd.port.unwrap_or(ctx.config.server.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running server")?;

    info!("Server stopped");
    Ok(())
}

/// Open `logging.file` for appending, creating its directory.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_is_created_and_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("careline.log");

        let mut file = open_log_file(&path).unwrap();
        writeln!(file, "first").unwrap();
        drop(file);
        let mut file = open_log_file(&path).unwrap();
        writeln!(file, "second").unwrap();
        drop(file);

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }
}
