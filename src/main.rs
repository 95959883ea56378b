use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use logrollup::{init_store, init_tracing, plan_report, run_rollup};
use logrollup_config::RuntimeConfig;
use logrollup_core::{Granularity, ParseFailurePolicy};
use std::path::PathBuf;

/// Roll small timestamped log objects up into time-bucketed aggregates
#[derive(Parser)]
#[command(name = "logrollup")]
#[command(version)]
#[command(about = "Roll small timestamped log objects up into time-bucketed aggregates", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level or EnvFilter directive (overrides config file)
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge source objects into their destinations and delete the sources
    Run(RunArgs),
    /// Print the destination -> sources plan as JSON without touching any object
    Plan(RollupArgs),
}

#[derive(Args)]
struct RollupArgs {
    /// Source location, [scheme://]container[/prefix]
    #[arg(short, long, value_name = "LOCATION")]
    source: Option<String>,

    /// Destination location, [scheme://]container[/prefix]
    #[arg(short, long, value_name = "LOCATION")]
    dest: Option<String>,

    /// Rollup granularity: 10min, hour, day, month
    #[arg(short, long, value_name = "GRANULARITY")]
    granularity: Option<Granularity>,

    /// What to do with objects whose names carry no timestamp: skip, abort
    #[arg(long, value_name = "POLICY")]
    on_parse_error: Option<ParseFailurePolicy>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    rollup: RollupArgs,

    /// Destination groups processed at once
    #[arg(short = 'j', long, value_name = "N")]
    concurrency: Option<usize>,

    /// Write destinations but keep the source objects
    #[arg(long)]
    keep: bool,

    /// Compute and log everything, write and delete nothing
    #[arg(long)]
    dry_run: bool,

    /// Replace existing destination content instead of appending to it
    #[arg(long)]
    overwrite: bool,

    /// Colon-separated debug flags, e.g. keep:dryrun
    #[arg(long, value_name = "FLAGS")]
    debug: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Step 1: Load base configuration
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load_or_default().context("Failed to load configuration")?
    };

    // Step 2: Apply CLI overrides (highest priority)
    apply_cli_overrides(&mut config, &cli);

    // Step 3: Logging, then validation before any storage is touched
    init_tracing(&config);
    config.validate().context("Invalid configuration")?;

    let store = init_store(&config)?;

    match cli.command {
        Command::Run(_) => {
            run_rollup(&store, &config).await?;
        }
        Command::Plan(_) => {
            let report = plan_report(&store, &config).await?;
            println!("{}", report);
        }
    }

    Ok(())
}

fn apply_rollup_overrides(config: &mut RuntimeConfig, args: &RollupArgs) {
    if let Some(source) = &args.source {
        config.rollup.source = source.clone();
    }
    if let Some(dest) = &args.dest {
        config.rollup.dest = dest.clone();
    }
    if let Some(granularity) = args.granularity {
        config.rollup.granularity = granularity;
    }
    if let Some(policy) = args.on_parse_error {
        config.rollup.on_parse_error = policy;
    }
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) {
    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }

    match &cli.command {
        Command::Run(args) => {
            apply_rollup_overrides(config, &args.rollup);

            if let Some(concurrency) = args.concurrency {
                config.rollup.concurrency = concurrency;
            }
            if let Some(flags) = &args.debug {
                config.apply_debug_flags(flags);
            }
            // Flags only switch modes on
            config.policy.keep |= args.keep;
            config.policy.dryrun |= args.dry_run;
            config.policy.overwrite |= args.overwrite;
        }
        Command::Plan(args) => apply_rollup_overrides(config, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logrollup_config::Platform;

    fn apply(args: &[&str]) -> RuntimeConfig {
        let cli = Cli::try_parse_from(args).unwrap();
        let mut config = RuntimeConfig::from_platform_defaults(Platform::Cli);
        apply_cli_overrides(&mut config, &cli);
        config
    }

    #[test]
    fn test_run_flags() {
        let config = apply(&[
            "logrollup",
            "run",
            "--source",
            "s3://logs/raw",
            "--dest",
            "s3://logs/rolled",
            "--granularity",
            "hour",
            "-j",
            "4",
            "--keep",
            "--debug",
            "overwrite",
        ]);

        assert_eq!(config.rollup.source, "s3://logs/raw");
        assert_eq!(config.rollup.dest, "s3://logs/rolled");
        assert_eq!(config.rollup.granularity, Granularity::Hour);
        assert_eq!(config.rollup.concurrency, 4);
        assert!(config.policy.keep);
        assert!(config.policy.overwrite);
        assert!(!config.policy.dryrun);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_plan_args_and_global_flags() {
        let config = apply(&[
            "logrollup",
            "plan",
            "-s",
            "logs/raw",
            "-d",
            "logs/rolled",
            "--on-parse-error",
            "abort",
            "--log-level",
            "debug",
        ]);

        assert_eq!(config.rollup.on_parse_error, ParseFailurePolicy::Abort);
        assert_eq!(config.log.level, "debug");
        assert!(!config.policy.dryrun);
    }

    #[test]
    fn test_invalid_granularity_is_rejected() {
        assert!(Cli::try_parse_from(["logrollup", "run", "--granularity", "week"]).is_err());
    }

    #[test]
    fn test_command_is_required() {
        assert!(Cli::try_parse_from(["logrollup"]).is_err());
    }
}
