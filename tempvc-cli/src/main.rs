use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempvc_cli::simulate::{check_script, Simulation};
use tempvc_cli::Script;
use tempvc_core::config::Config;
use tempvc_core::core_voice::GuildConfigStore;
use tempvc_core::logging::{init_logging_with_config, LogConfig};
use tempvc_core::shutdown::{install_signal_handlers, ShutdownCoordinator};
use tempvc_core::telemetry;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "tempvc")]
#[command(author, version, about = "Temporary voice channel bot tooling", long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// TOML config file; defaults plus TEMPVC_* variables when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSONL script against a simulated guild
    Simulate {
        script: PathBuf,

        /// Wait in wall-clock time instead of on a virtual clock
        #[arg(long)]
        real_time: bool,
    },
    /// Validate the config and the guild config file
    CheckConfig,
    /// List configured guilds
    Guilds,
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let mut config = Config::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            config.apply_env()?;
            config.validate()?;
            Ok(config)
        }
        None => Ok(Config::from_env()?),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    let mut log_config = LogConfig::from_settings(&config.logging)?;
    if let Some(level) = &args.log_level {
        log_config.level = level.parse()?;
    }
    if args.json_logs {
        log_config = log_config.json_format(true);
    }
    init_logging_with_config(log_config)?;
    telemetry::init_metrics();

    match args.command {
        Command::Simulate { script, real_time } => simulate(&config, &script, real_time).await,
        Command::CheckConfig => check_config(&config).await,
        Command::Guilds => list_guilds(&config).await,
    }
}

async fn simulate(config: &Config, path: &Path, real_time: bool) -> Result<()> {
    let script = Script::load(path)?;
    check_script(&script)?;

    let shutdown = Arc::new(ShutdownCoordinator::new(Duration::from_millis(100)));
    install_signal_handlers(Arc::clone(&shutdown))?;

    if !real_time {
        tokio::time::pause();
    }

    // Guild configs stay in memory so a simulation never touches the real file
    let mut sim = Simulation::new(config);
    info!(steps = script.len(), path = %path.display(), "Running simulation");

    for (line, step) in &script.steps {
        if shutdown.is_shutting_down().await {
            warn!(line, "Simulation interrupted");
            break;
        }
        sim.step(step)
            .await
            .with_context(|| format!("step on line {} failed", line))?;
        for entry in sim.drain_transcript() {
            println!("{}", entry);
        }
    }

    let state = sim.state().await;
    sim.finish();
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

async fn check_config(config: &Config) -> Result<()> {
    let store = GuildConfigStore::load(&config.storage.guild_config_path).await?;

    println!("Configuration OK");
    println!("  category:         {}", config.channels.category_name);
    println!("  creator channel:  {}", config.channels.creator_channel_name);
    println!("  name template:    {}", config.channels.name_template);
    println!(
        "  empty grace:      {}",
        humantime_serde::re::humantime::format_duration(config.lifecycle.empty_channel_grace)
    );
    println!(
        "  session timeout:  {}",
        humantime_serde::re::humantime::format_duration(config.session.timeout)
    );
    println!(
        "  guild configs:    {} ({} guilds)",
        config.storage.guild_config_path.display(),
        store.guilds().await.len()
    );
    Ok(())
}

async fn list_guilds(config: &Config) -> Result<()> {
    let store = GuildConfigStore::load(&config.storage.guild_config_path).await?;
    let guilds = store.guilds().await;

    if guilds.is_empty() {
        println!("No configured guilds");
    }
    for (guild_id, guild) in guilds {
        println!(
            "{}\tcategory={}\tcreator={}",
            guild_id, guild.category_id, guild.creator_channel_id
        );
    }
    Ok(())
}
