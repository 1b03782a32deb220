//! wheelsmith CLI

use std::env;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use serde::Serialize;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use wheelsmith_core::config::{
    locate_plan_file, project_root_override, BuildPlan, PlanFile, PROJECT_ROOT_ENV,
};
use wheelsmith_core::discovery::discover_interpreters;
use wheelsmith_core::error::step_exit_code;
use wheelsmith_core::interpreter::Interpreter;
use wheelsmith_core::output::{
    write_commands_plain, write_json_pretty, write_ndjson, write_report_plain,
};
use wheelsmith_core::pipeline::{plan_commands, summarize_artifacts, BuildReport, BuildSession};
use wheelsmith_core::runner::{CommandRecord, SystemRunner};
use wheelsmith_core::search_path::SearchPath;
use wheelsmith_core::toolchain::{HttpFetch, NoFetch};

/// CLI entrypoint for wheelsmith.
#[derive(Debug, Parser)]
#[command(
    name = "wheelsmith",
    about = "Build a project's wheels under every configured interpreter and repair them into portable wheels"
)]
pub struct Cli {
    /// Log every step with source locations
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        action = ArgAction::SetTrue,
        conflicts_with = "verbose"
    )]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Install the toolchain, build every interpreter, repair every wheel (default)
    Build(BuildArgs),
    /// Print the commands `build` would run, without running anything
    Plan(PlanArgs),
    /// Only repair the wheels already in the output directory
    Repair(BuildArgs),
    /// List the interpreter installations a build would use
    Interpreters(ListArgs),
}

/// Overrides layered on top of defaults, plan file and environment.
#[derive(Debug, Default, Args)]
struct PlanOptions {
    /// Plan file (default: <project root>/wheelsmith.toml when present)
    #[arg(long = "config", value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Project directory holding the build entry point
    #[arg(long = "project-root", value_hint = ValueHint::DirPath)]
    project_root: Option<PathBuf>,

    /// Interpreter installation root; repeat to build several (replaces the configured list)
    #[arg(short = 'i', long = "interpreter", value_hint = ValueHint::DirPath)]
    interpreters: Vec<PathBuf>,

    /// Use every interpreter found under this prefix (e.g. /opt/python)
    #[arg(
        long = "all-interpreters",
        value_hint = ValueHint::DirPath,
        conflicts_with = "interpreters"
    )]
    all_interpreters: Option<PathBuf>,

    /// Directory the build writes wheels into (relative to the project root)
    #[arg(short = 'o', long = "output-dir", value_hint = ValueHint::DirPath)]
    output_dir: Option<PathBuf>,

    /// Assume the toolchain is already installed and pinned
    #[arg(long = "skip-toolchain", action = ArgAction::SetTrue)]
    skip_toolchain: bool,

    /// Extra attempts for the installer and dependency installs
    #[arg(long = "retries")]
    retries: Option<u32>,
}

#[derive(Debug, Default, Args)]
struct OutputArgs {
    /// Emit a single JSON document
    #[arg(long = "json", action = ArgAction::SetTrue, conflicts_with = "ndjson")]
    json: bool,

    /// Emit newline-delimited JSON, one artifact per line
    #[arg(long = "ndjson", action = ArgAction::SetTrue)]
    ndjson: bool,
}

#[derive(Debug, Default, Args)]
struct BuildArgs {
    #[command(flatten)]
    plan: PlanOptions,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Default, Args)]
struct PlanArgs {
    #[command(flatten)]
    plan: PlanOptions,

    /// Emit the commands as a JSON array
    #[arg(long = "json", action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Debug, Default, Args)]
struct ListArgs {
    #[command(flatten)]
    plan: PlanOptions,

    /// Emit a JSON array
    #[arg(long = "json", action = ArgAction::SetTrue)]
    json: bool,
}

/// Parse CLI args and execute the selected command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    match cli.command {
        None => run_build(BuildArgs::default()),
        Some(Command::Build(args)) => run_build(args),
        Some(Command::Plan(args)) => run_plan(args),
        Some(Command::Repair(args)) => run_repair(args),
        Some(Command::Interpreters(args)) => run_interpreters(args),
    }
}

/// Exit code for a failed run: the failing command's own code, else 1.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    step_exit_code(err).unwrap_or(1)
}

fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };

    let mut subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .without_time();

    if level == Level::DEBUG {
        subscriber = subscriber.with_file(true).with_line_number(true);
    }

    tracing::subscriber::set_global_default(subscriber.finish())
        .context("failed to install log subscriber")
}

fn run_build(args: BuildArgs) -> Result<()> {
    let plan = resolve_plan(&args.plan)?;
    let mut session = BuildSession::new(&plan, SystemRunner, HttpFetch::default());
    let report = session.run()?;

    let missing = report.interpreters_without_portable_artifact();
    if !missing.is_empty() {
        warn!(interpreters = %missing.join(", "), "no portable wheel found for some interpreters");
    }
    info!(
        wheels = report.portable_artifacts().count(),
        "build finished"
    );

    emit_report(&report, &args.output)
}

fn run_plan(args: PlanArgs) -> Result<()> {
    let plan = resolve_plan(&args.plan)?;
    let commands = plan_commands(&plan, SearchPath::from_env())?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if args.json {
        let records: Vec<CommandRecord> = commands.iter().map(|c| c.to_record()).collect();
        write_json_pretty(&records, &mut handle)
    } else {
        write_commands_plain(&commands, &mut handle)
    }
}

fn run_repair(args: BuildArgs) -> Result<()> {
    let plan = resolve_plan(&args.plan)?;
    let mut session = BuildSession::new(&plan, SystemRunner, NoFetch);
    session.repair_all()?;

    let report = BuildReport {
        repaired: session.report().repaired.clone(),
        artifacts: summarize_artifacts(&plan.resolved_output_dir())?,
        ..BuildReport::default()
    };
    emit_report(&report, &args.output)
}

#[derive(Debug, Serialize)]
struct InterpreterEntry {
    tag: String,
    root: PathBuf,
    exists: bool,
}

fn run_interpreters(args: ListArgs) -> Result<()> {
    let plan = resolve_plan(&args.plan)?;
    let entries = interpreter_entries(&plan.interpreters);

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if args.json {
        write_json_pretty(&entries, &mut handle)
    } else {
        write_interpreters_plain(&entries, &mut handle)
    }
}

fn interpreter_entries(interpreters: &[Interpreter]) -> Vec<InterpreterEntry> {
    interpreters
        .iter()
        .map(|interp| InterpreterEntry {
            tag: interp.tag(),
            root: interp.root().to_path_buf(),
            exists: interp.exists(),
        })
        .collect()
}

fn write_interpreters_plain(entries: &[InterpreterEntry], mut w: impl Write) -> Result<()> {
    let width = entries.iter().map(|e| e.tag.len()).max().unwrap_or(0);
    for entry in entries {
        let marker = if entry.exists { "ok" } else { "missing" };
        writeln!(
            w,
            "{:<width$}  {:<7}  {}",
            entry.tag,
            marker,
            entry.root.display()
        )?;
    }
    Ok(())
}

fn emit_report(report: &BuildReport, output: &OutputArgs) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    if output.ndjson {
        write_ndjson(&report.artifacts, &mut handle)
    } else if output.json {
        write_json_pretty(report, &mut handle)
    } else {
        write_report_plain(report, &mut handle)
    }
}

/// Defaults, then the plan file, then `WHEELSMITH_*` variables, then flags.
fn resolve_plan(opts: &PlanOptions) -> Result<BuildPlan> {
    let mut plan = BuildPlan::default();

    let root_hint = opts
        .project_root
        .clone()
        .or_else(|| project_root_override(env::var_os(PROJECT_ROOT_ENV)))
        .unwrap_or_else(|| plan.project_root.clone());
    if let Some(path) = locate_plan_file(opts.config.as_deref(), &root_hint) {
        info!(file = %path.display(), "loading plan file");
        plan.apply_file(PlanFile::load(&path)?);
    }

    plan.apply_env()?;
    apply_flags(&mut plan, opts)?;
    plan.make_absolute()?;
    plan.validate().context("invalid build plan")?;
    Ok(plan)
}

fn apply_flags(plan: &mut BuildPlan, opts: &PlanOptions) -> Result<()> {
    if let Some(root) = &opts.project_root {
        plan.project_root = root.clone();
    }
    if !opts.interpreters.is_empty() {
        plan.interpreters = opts.interpreters.iter().map(Interpreter::new).collect();
    }
    if let Some(prefix) = &opts.all_interpreters {
        plan.interpreters = discover_interpreters(prefix)?;
    }
    if let Some(dir) = &opts.output_dir {
        plan.output_dir = dir.clone();
    }
    if opts.skip_toolchain {
        plan.skip_toolchain = true;
    }
    if let Some(retries) = opts.retries {
        plan.retries = retries;
    }
    Ok(())
}
