mod app;
mod render;

use std::path::PathBuf;

use {
    anyhow::Result,
    clap::{Parser, Subcommand},
    pjman_config::Layout,
    serde_json::Value,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::{app::App, render::EventStream};

#[derive(Parser)]
#[command(name = "pjman", version, about = "Run reversible, plugin-defined operations on a project")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Stream progress events to stdout as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    events: bool,

    /// pjman directory (defaults to ./.pjman).
    #[arg(long, global = true, env = "PJMAN_DIR")]
    dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the .pjman directory with a default config and plugin.
    Init,
    /// Execute an operation against a target and record it.
    Run {
        /// Operation (plugin) name.
        operation: String,
        /// Target the operation acts on.
        #[arg(default_value = "package.json")]
        target: String,
        /// Parse the target as JSON instead of passing it as a string.
        #[arg(long)]
        json_target: bool,
    },
    /// Undo the most recent command, a specific one, or several.
    Undo {
        /// Undo this many of the most recent commands, newest first.
        #[arg(short, long, default_value_t = 0, conflicts_with = "id")]
        count: usize,
        /// Undo the command with this id.
        #[arg(long)]
        id: Option<String>,
    },
    /// Forget a command without undoing it.
    Delete { id: String },
    /// Forget every recorded command.
    Clear,
    /// Show the command log.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List registered operations.
    Plugins,
    /// Validate the configuration.
    Check,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let layout = match &cli.dir {
        Some(dir) => Layout::at(dir),
        None => Layout::discover()?,
    };
    info!(version = env!("CARGO_PKG_VERSION"), root = %layout.root().display(), "pjman starting");

    let stream_events = cli.events;
    match cli.command {
        Commands::Init => {
            let created = layout.ensure().await?;
            if created.is_empty() {
                println!("{} is already initialized.", layout.root().display());
            }
            for path in created {
                println!("created {}", path.display());
            }
        },
        Commands::Check => {
            app::load_config(&layout)?;
            println!("{} is valid.", layout.find_config_file().display());
        },
        Commands::Plugins => {
            let app = App::open(&layout).await?;
            let operations = app.registry.operations();
            for name in app.registry.names() {
                let kind = operations.get(&name).map_or("?", |p| p.kind());
                println!("{name:<24} {kind}");
            }
        },
        Commands::Run {
            operation,
            target,
            json_target,
        } => {
            let target = if json_target {
                serde_json::from_str(&target)?
            } else {
                Value::String(target)
            };
            let app = App::open(&layout).await?;
            let progress = app.commander.progress();
            let events = stream_events.then(|| EventStream::attach(progress, std::io::stdout()));
            let result = app.commander.execute(&operation, target).await;
            if let Some(events) = events {
                events.finish(progress).await;
            }
            print_json(&result?)?;
        },
        Commands::Undo { count, id } => {
            let app = App::open(&layout).await?;
            let progress = app.commander.progress();
            let events = stream_events.then(|| EventStream::attach(progress, std::io::stdout()));
            let results = app.commander.undo(count, id.as_deref()).await;
            if let Some(events) = events {
                events.finish(progress).await;
            }
            for result in results? {
                print_json(&result)?;
            }
        },
        Commands::Delete { id } => {
            let app = App::open(&layout).await?;
            let record = app.commander.delete_command(&id).await?;
            println!("deleted {} ({})", record.id, record.operation);
        },
        Commands::Clear => {
            let app = App::open(&layout).await?;
            let dropped = app.commander.clear().await?;
            println!("cleared {dropped} command(s)");
        },
        Commands::List { json } => {
            let app = App::open(&layout).await?;
            let records = app.commander.show_commands().await;
            if json {
                print_json(&serde_json::to_value(&records)?)?;
            } else {
                print!("{}", render::command_table(&records));
            }
        },
    }

    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_defaults_target() {
        let cli = Cli::try_parse_from(["pjman", "run", "backup"]).unwrap();
        match cli.command {
            Commands::Run { operation, target, json_target } => {
                assert_eq!(operation, "backup");
                assert_eq!(target, "package.json");
                assert!(!json_target);
            },
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn undo_count_and_id_conflict() {
        assert!(Cli::try_parse_from(["pjman", "undo", "--count", "2", "--id", "x"]).is_err());
        let cli = Cli::try_parse_from(["pjman", "undo", "-c", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Undo { count: 3, id: None }));
    }

    #[tokio::test]
    async fn init_then_open() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::new(tmp.path());
        layout.ensure().await.unwrap();

        let app = App::open(&layout).await.unwrap();
        assert_eq!(app.registry.names(), ["backup", "default"]);
        assert!(app.commander.show_commands().await.is_empty());

        app.commander.execute("default", Value::String("x".into())).await.unwrap();
        assert_eq!(render::command_table(&app.commander.show_commands().await).lines().count(), 2);
    }
}
