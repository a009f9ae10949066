//! Headless kitchen display.
//!
//! Keeps the live order board in sync, rings the terminal bell on new orders
//! and takes operator commands on stdin.

use std::io::Write;
use std::path::PathBuf;

use chrono::Local;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use kitchen_display_client::{
    config::DEFAULT_CONFIG_PATH, init_logging, AppConfig, ConnectionManager, ConnectionState,
    KitchenSession, LogFormat, Order, OrderStatus, SessionUpdate,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser)]
#[command(name = "kitchen_display")]
#[command(version, about = "Kitchen display order client", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Override the base API URL
    #[arg(long, env = "KDS_API_URL")]
    api_url: Option<String>,

    /// Log level or filter directives
    #[arg(long)]
    log_level: Option<String>,

    /// Output format (pretty, json, compact)
    #[arg(long)]
    log_format: Option<String>,

    /// Also write JSON logs to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Do not ring the terminal bell on new orders
    #[arg(long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a sample config file
    GenerateConfig {
        /// Output file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        output: String,
    },
    /// Validate config without connecting
    ValidateConfig,
    /// Run the display (default)
    Run,
}

const HELP: &str =
    "commands: list | done <id> | deliver <id> | cancel <id> | refresh | retry | status | quit";

// ============================================================================
// Main
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if it exists (before parsing CLI args)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::GenerateConfig { output }) => {
            generate_sample_config(output)?;
            return Ok(());
        }
        Some(Commands::ValidateConfig) => {
            let config = load_config(&cli)?;
            config.validate()?;
            println!("Configuration is valid:\n{:#?}", config);
            return Ok(());
        }
        Some(Commands::Run) | None => {}
    }

    let config = load_config(&cli)?;
    let _log_guard = init_logging(&config.logging, None)?;
    let connection = config.connection_config()?;
    info!(endpoint = %connection.endpoint, "Starting kitchen display");

    let mut session = KitchenSession::new(ConnectionManager::new(connection))?;
    if !cli.quiet {
        session.on_new_order(|_| {
            print!("\x07");
            let _ = std::io::stdout().flush();
        });
    }

    let mut status = session.connection().watch_status();
    if let Err(err) = session.start().await {
        error!(%err, "Initial connection failed, type `retry` to try again");
    }
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            update = session.next_update() => match update {
                Some(update) => report(&session, &update),
                None => {
                    warn!("Connection task stopped");
                    break;
                }
            },
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                match current.state {
                    ConnectionState::Failed => error!(
                        attempts = current.attempts,
                        last_error = current.last_error.as_deref().unwrap_or_default(),
                        "Gave up reconnecting, type `retry` to try again"
                    ),
                    state => info!(
                        state = %state,
                        attempts = current.attempts,
                        retry_in_ms = current.next_retry_in.map(|d| d.as_millis() as u64).unwrap_or_default(),
                        "Connection state changed"
                    ),
                }
            }
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    if !handle_command(&mut session, line.trim())? {
                        break;
                    }
                }
                None => {
                    info!("stdin closed, running without operator commands");
                    stdin_open = false;
                }
            },
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    session.stop().await?;
    info!("Kitchen display stopped");
    Ok(())
}

// ============================================================================
// Operator commands
// ============================================================================

/// Returns `false` when the operator asked to quit.
fn handle_command(
    session: &mut KitchenSession,
    line: &str,
) -> Result<bool, Box<dyn std::error::Error>> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (None, _) => {}
        (Some("list"), _) => print_board(session),
        (Some("done"), Some(id)) => set_status(session, id, OrderStatus::Completed)?,
        (Some("deliver"), Some(id)) => set_status(session, id, OrderStatus::Delivered)?,
        (Some("cancel"), Some(id)) => set_status(session, id, OrderStatus::Cancelled)?,
        (Some("refresh"), _) => session.refresh()?,
        (Some("retry"), _) => session.connection().resume()?,
        (Some("status"), _) => {
            let status = session.connection_status();
            println!(
                "{} (attempts {}){}",
                status.state,
                status.attempts,
                status
                    .last_error
                    .map(|err| format!(", last error: {err}"))
                    .unwrap_or_default()
            );
        }
        (Some("quit" | "exit"), _) => return Ok(false),
        _ => println!("{HELP}"),
    }
    Ok(true)
}

fn set_status(
    session: &mut KitchenSession,
    id: &str,
    status: OrderStatus,
) -> Result<(), Box<dyn std::error::Error>> {
    if session.update_order_status(id, status.clone())? {
        println!("order {id} -> {status}");
    } else {
        println!("order {id} is not on the board, sent {status} anyway");
    }
    Ok(())
}

fn report(session: &KitchenSession, update: &SessionUpdate) {
    match update {
        SessionUpdate::Snapshot { count } => {
            info!(count, "Order board replaced");
            print_board(session);
        }
        SessionUpdate::NewOrder { id, .. } => {
            if let Some(order) = session.order(id) {
                print_order(order);
            }
        }
        SessionUpdate::StatusChanged { id, to, .. } => println!("order {id} -> {to}"),
        SessionUpdate::Confirmed(_)
        | SessionUpdate::UnknownOrder { .. }
        | SessionUpdate::Ignored { .. } => {}
    }
}

fn print_board(session: &KitchenSession) {
    let active: Vec<&Order> = session.book().active().collect();
    if active.is_empty() {
        println!("no open orders");
        return;
    }
    for order in active {
        print_order(order);
    }
}

fn print_order(order: &Order) {
    println!(
        "#{} [{}] {} {} ({} items)",
        order.display_number,
        order.status,
        order.created_at.with_timezone(&Local).format("%H:%M"),
        order.receiving_method,
        order.total_quantity()
    );
    for item in &order.items {
        println!("    {} x {}", item.quantity, item.name);
        if let Some(addons) = &item.addons {
            println!("        + {}", addons.join(", "));
        }
        if let Some(comment) = &item.comment {
            println!("        ! {comment}");
        }
    }
    if let Some(note) = &order.note {
        println!("    note: {note}");
    }
    if let Some(phone) = &order.phone_number {
        println!("    phone: {phone}");
    }
}

// ============================================================================
// Config Loading
// ============================================================================

fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = AppConfig::load(&cli.config)?;

    if let Some(api_url) = &cli.api_url {
        config.server.api_url = api_url.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = parse_log_format(format)?;
    }
    if let Some(log_dir) = &cli.log_dir {
        config.logging.log_dir = Some(log_dir.clone());
    }
    Ok(config)
}

fn parse_log_format(s: &str) -> Result<LogFormat, Box<dyn std::error::Error>> {
    match s.to_lowercase().as_str() {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        "compact" => Ok(LogFormat::Compact),
        _ => Err(format!("Unknown log format '{}'. Use: pretty, json, compact", s).into()),
    }
}

fn generate_sample_config(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let content = AppConfig::default().to_toml_string()?;

    let with_comments = format!(
        r#"# Kitchen Display Configuration
# See: kitchen_display --help
#
# KDS_API_URL (environment or .env) overrides server.api_url.

{}"#,
        content
    );

    std::fs::write(path, with_comments)?;
    println!("Sample config written to: {}", path);
    Ok(())
}
