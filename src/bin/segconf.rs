use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use segconf::remote::{preparation_phases, run_phases, start_phase};
use segconf::{
    Dbid, FanOut, FanOutConfig, InMemorySegmentCatalog, ReconcileError, ReconcileOptions,
    Reconciler, SegmentDiff, ShellExecutor, TopologySnapshot, check_port_and_directory_conflicts,
    dump_snapshot, load_snapshot, plan_against, topology::load_segments, validate_expansion,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "segconf")]
#[command(about = "Reconcile a cluster's segment configuration against a goal topology")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct PlanArgs {
    /// Segment file holding the current configuration
    #[arg(long)]
    current: PathBuf,
    /// Segment file holding the goal configuration
    #[arg(long)]
    goal: PathBuf,
    /// Treat this dbid as removed and re-added even if unchanged
    #[arg(long = "force", value_name = "DBID")]
    force: Vec<Dbid>,
    #[arg(long)]
    allow_primary_changes: bool,
    #[arg(long)]
    utility_mode: bool,
    /// Skip the port and data directory conflict check
    #[arg(long)]
    no_host_check: bool,
}

impl PlanArgs {
    fn options(&self) -> ReconcileOptions {
        self.force.iter().fold(
            ReconcileOptions::new()
                .authorize_primary_changes(self.allow_primary_changes)
                .utility_mode(self.utility_mode)
                .check_host_conflicts(!self.no_host_check),
            |options, dbid| options.force_remove_and_add(*dbid),
        )
    }
}

#[derive(Subcommand)]
enum Command {
    /// Classify every segment and validate the result
    Diff {
        #[command(flatten)]
        plan: PlanArgs,
        #[arg(long)]
        json: bool,
        /// Write the reconciled configuration back to the current file
        #[arg(long)]
        apply: bool,
    },
    /// Show (or run) the host commands that prepare new and relocated segments
    Rebuild {
        #[command(flatten)]
        plan: PlanArgs,
        /// Fan-out configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        execute: bool,
    },
    /// Check a segment configuration for layout and replication problems
    Check {
        /// Segment file to check
        #[arg(long)]
        config: PathBuf,
        /// Fan-out configuration (JSON) to validate as well
        #[arg(long)]
        fanout: Option<PathBuf>,
    },
    /// Validate new segments against a cluster and print the expanded configuration
    Expand {
        #[arg(long)]
        current: PathBuf,
        #[arg(long)]
        new: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Diff { plan, json, apply } => diff(&plan, json, apply).await,
        Command::Rebuild {
            plan,
            config,
            execute,
        } => rebuild(&plan, config.as_deref(), execute).await,
        Command::Check { config, fanout } => check(&config, fanout.as_deref()),
        Command::Expand { current, new, out } => expand(&current, &new, out.as_deref()),
    }
}

fn load_pair(plan: &PlanArgs) -> Result<(TopologySnapshot, TopologySnapshot)> {
    let current = load_snapshot(&plan.current)
        .with_context(|| format!("loading {}", plan.current.display()))?;
    let goal =
        load_snapshot(&plan.goal).with_context(|| format!("loading {}", plan.goal.display()))?;
    Ok((current, goal))
}

fn rejected(err: ReconcileError) -> anyhow::Error {
    match err {
        ReconcileError::Validation(cause) => {
            anyhow!("{} (rule: {:?}); no changes were made", cause, cause.rule())
        }
        other => other.into(),
    }
}

fn print_diff(diff: &SegmentDiff, json: bool) -> Result<()> {
    let summary = diff.summary();
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    for (name, dbids) in summary.sets() {
        let ids = dbids
            .iter()
            .map(|dbid| dbid.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        println!("{:<26} {}", name, ids);
    }
    Ok(())
}

async fn diff(plan: &PlanArgs, json: bool, apply: bool) -> Result<()> {
    let (current, goal) = load_pair(plan)?;
    let options = plan.options();

    if !apply {
        let diff = plan_against(&current, &goal, &options).map_err(rejected)?;
        return print_diff(&diff, json);
    }

    let catalog = Arc::new(InMemorySegmentCatalog::new(current));
    let reconciler = Reconciler::new(catalog.clone());
    let diff = reconciler.reconcile(&goal, &options).await.map_err(rejected)?;
    print_diff(&diff, json)?;
    if diff.has_changes() {
        dump_snapshot(&catalog.snapshot().await, &plan.current)?;
        eprintln!("wrote {}", plan.current.display());
    }
    Ok(())
}

async fn rebuild(plan: &PlanArgs, config: Option<&Path>, execute: bool) -> Result<()> {
    let (current, goal) = load_pair(plan)?;
    let diff = plan_against(&current, &goal, &plan.options()).map_err(rejected)?;
    let phases = preparation_phases(&diff);
    let start = start_phase(&diff);

    for phase in phases.iter().chain(std::iter::once(&start)) {
        println!("{}:", phase.name);
        for command in &phase.commands {
            println!("  {}", command);
        }
    }
    if !execute {
        return Ok(());
    }

    let config = match config {
        Some(path) => FanOutConfig::from_json_file(path)?,
        None => FanOutConfig::default(),
    };
    let executor = Arc::new(ShellExecutor::new(config.clone()));
    let fanout = FanOut::new(executor, config)?;
    let (reports, outcome) = run_phases(&fanout, phases).await;
    for report in &reports {
        print!("{}", report);
    }
    outcome?;
    println!("segments prepared; copy data before running the start phase");
    Ok(())
}

fn check(path: &Path, fanout: Option<&Path>) -> Result<()> {
    let snapshot =
        load_snapshot(path).with_context(|| format!("loading {}", path.display()))?;
    let mut problems = Vec::new();

    if let Err(err) = snapshot.check_dispatchers() {
        problems.push(err.to_string());
    }
    if let Err(err) = check_port_and_directory_conflicts(&snapshot) {
        problems.push(err.to_string());
    }
    for content_id in snapshot.invalid_pairs() {
        problems.push(format!("content {} has an invalid replication state", content_id));
    }
    for segment in snapshot.unbalanced_segments() {
        println!(
            "dbid {} on {} is not in its preferred role",
            segment.dbid(),
            segment.hostname()
        );
    }
    if let Some(fanout) = fanout {
        let config = FanOutConfig::from_json_file(fanout)?;
        println!("{}", serde_json::to_string_pretty(&config)?);
    }

    if problems.is_empty() {
        println!("{} segments on {} hosts: ok", snapshot.len(), snapshot.hosts().len());
        return Ok(());
    }
    for problem in &problems {
        println!("{}", problem);
    }
    Err(anyhow!("{} problem(s) found in {}", problems.len(), path.display()))
}

fn expand(current: &Path, new: &Path, out: Option<&Path>) -> Result<()> {
    let current_snapshot =
        load_snapshot(current).with_context(|| format!("loading {}", current.display()))?;
    let new_segments =
        load_segments(new).with_context(|| format!("loading {}", new.display()))?;
    let expanded = validate_expansion(&current_snapshot, &new_segments)?;

    match out {
        Some(path) => {
            dump_snapshot(&expanded, path)?;
            eprintln!("wrote {}", path.display());
        }
        None => {
            for segment in &expanded {
                println!("{}", segment);
            }
        }
    }
    Ok(())
}
