use anyhow::{bail, Context, Result};
use catalog_engine::{repair_missing_profile, EngineConfig, ProfileRepairOutcome, Reconciler};
use catalog_protocol::{RecordKind, RunMode};
use catalog_rules::{ImageIntent, RuleRegistry};
use catalog_store::{CatalogStore, InMemoryPrincipals, PrincipalDirectory};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

mod render;
mod snapshot;

use snapshot::Snapshot;

#[derive(Parser)]
#[command(name = "catalog-reconcile")]
#[command(about = "Detect and repair structural defects in catalog records", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the catalog and repair invariant violations
    Run(RunArgs),

    /// Create the missing Profile for an existing authentication principal
    #[command(name = "repair-profile")]
    RepairProfile(RepairProfileArgs),

    /// List the rules a run can carry
    Rules,
}

#[derive(Args)]
struct RunArgs {
    /// Record kind to scan, or "all"
    #[arg(default_value = "all")]
    kind: String,

    /// Write patches instead of reporting them (default is dry-run)
    #[arg(long)]
    commit: bool,

    /// Rule allow-list (comma separated); empty means every registered rule
    #[arg(long, value_delimiter = ',')]
    rules: Vec<String>,

    /// Image pass to activate: seed placeholders or clean them out
    #[arg(long, value_enum, default_value_t = ImageIntentFlag::Off)]
    images: ImageIntentFlag,

    /// Engine config file (TOML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Catalog snapshot to operate on (JSON)
    #[arg(long)]
    snapshot: PathBuf,

    /// Print the report as JSON instead of the human summary
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct RepairProfileArgs {
    /// Email of the authentication principal missing a profile
    #[arg(long)]
    email: String,

    /// Perform the insert instead of reporting it
    #[arg(long)]
    commit: bool,

    /// Catalog snapshot to operate on (JSON)
    #[arg(long)]
    snapshot: PathBuf,
}

#[derive(Copy, Clone, ValueEnum)]
enum ImageIntentFlag {
    Off,
    Seed,
    Clean,
}

impl ImageIntentFlag {
    const fn as_domain(self) -> ImageIntent {
        match self {
            ImageIntentFlag::Off => ImageIntent::Off,
            ImageIntentFlag::Seed => ImageIntent::Seed,
            ImageIntentFlag::Clean => ImageIntent::Clean,
        }
    }
}

pub async fn main_entry() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Run(args) => run_reconciliation(args).await,
        Commands::RepairProfile(args) => run_profile_repair(args).await,
        Commands::Rules => {
            for name in RuleRegistry::known_rule_names() {
                println!("{name}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level),
    )
    .try_init();
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

fn validate_rules(allowlist: &[String]) -> Result<()> {
    let known = RuleRegistry::known_rule_names();
    for name in allowlist {
        if !known.iter().any(|k| k == name) {
            bail!("unknown rule `{name}`; see `catalog-reconcile rules`");
        }
    }
    Ok(())
}

async fn run_reconciliation(args: RunArgs) -> Result<ExitCode> {
    validate_rules(&args.rules)?;
    let mut config = load_config(args.config.as_ref())?;
    if args.kind != "all" {
        let kind: RecordKind = args
            .kind
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
        config = config.with_only_kind(kind);
    }
    let mode = if args.commit {
        RunMode::Commit
    } else {
        RunMode::DryRun
    };

    let loaded = Snapshot::load(&args.snapshot)?;
    let principals_list = loaded.principals.clone();
    let memory = Arc::new(loaded.into_store());
    let store: Arc<dyn CatalogStore> = memory.clone();
    let principals: Arc<dyn PrincipalDirectory> =
        Arc::new(InMemoryPrincipals::new(principals_list.clone()));

    let registry =
        RuleRegistry::standard(args.images.as_domain()).with_allowlist(&args.rules);
    if registry.is_empty() {
        bail!("rule allow-list excludes every registered rule");
    }
    let engine = Reconciler::new(store, principals, registry, config);

    // Ctrl-C requests cooperative cancellation; the in-flight record
    // finishes before the run stops.
    let cancel = engine.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("cancellation requested; finishing current record");
            cancel.cancel();
        }
    });

    let report = engine.run(mode).await;

    // Patches are per-record transactional: whatever landed before an
    // abort stays applied, so the snapshot must reflect it.
    if should_persist(mode, memory.write_count()) {
        if report.aborted {
            log::warn!(
                "run aborted; persisting {} patch(es) already applied",
                report.patched
            );
        }
        Snapshot::from_store(&memory, principals_list)
            .await?
            .save(&args.snapshot)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render::render_report(&report));
    }

    Ok(if report.completed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// A commit run persists whenever any write landed, aborted or not;
/// applied patches are never rolled back.
fn should_persist(mode: RunMode, writes: u64) -> bool {
    mode.is_commit() && writes > 0
}

async fn run_profile_repair(args: RepairProfileArgs) -> Result<ExitCode> {
    let mode = if args.commit {
        RunMode::Commit
    } else {
        RunMode::DryRun
    };
    let loaded = Snapshot::load(&args.snapshot)?;
    let principals_list = loaded.principals.clone();
    let memory = Arc::new(loaded.into_store());
    let store: Arc<dyn CatalogStore> = memory.clone();
    let principals: Arc<dyn PrincipalDirectory> =
        Arc::new(InMemoryPrincipals::new(principals_list.clone()));

    let outcome = repair_missing_profile(&store, &principals, &args.email, mode).await?;
    match &outcome {
        ProfileRepairOutcome::NoPrincipal => {
            println!("no authentication principal for that email; nothing created");
        }
        ProfileRepairOutcome::AlreadyExists(id) => {
            println!("profile {id} already exists; nothing created");
        }
        ProfileRepairOutcome::WouldCreate => {
            println!("dry-run: a profile would be created (re-run with --commit)");
        }
        ProfileRepairOutcome::Created(id) => {
            println!("created profile {id}");
            Snapshot::from_store(&memory, principals_list)
                .await?
                .save(&args.snapshot)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborted_commit_with_writes_still_persists() {
        // An abort interrupts the scan, not the writes that already landed.
        assert!(should_persist(RunMode::Commit, 2));
    }

    #[test]
    fn dry_run_and_writeless_commit_skip_persistence() {
        assert!(!should_persist(RunMode::DryRun, 2));
        assert!(!should_persist(RunMode::Commit, 0));
    }
}
