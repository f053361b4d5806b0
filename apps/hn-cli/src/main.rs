use clap::{Parser, Subcommand};
use hn_app::{
    AppResult, RunOptions, RunProgressEvent, RunRequest, RunStage, project_service, query,
    run_service,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hydronet")]
#[command(about = "Hydronet - extended-period water network simulation", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate project file syntax and structure
    Validate {
        /// Path to the project YAML or JSON file
        project_path: PathBuf,
    },
    /// Run an extended-period simulation
    Run {
        /// Path to the project YAML or JSON file
        project_path: PathBuf,
        /// Skip cache and force re-run
        #[arg(long)]
        no_cache: bool,
        /// Log every solver iteration
        #[arg(long)]
        tee: bool,
    },
    /// List cached runs for a project
    Runs {
        /// Path to the project YAML or JSON file
        project_path: PathBuf,
    },
    /// Show details of a cached run
    ShowRun {
        /// Path to the project YAML or JSON file
        project_path: PathBuf,
        /// Run ID to display
        run_id: String,
    },
    /// Export time series data from a run
    ExportSeries {
        /// Path to the project YAML or JSON file
        project_path: PathBuf,
        /// Run ID
        run_id: String,
        /// Node or pipe name
        entity_id: String,
        /// Attribute (head, demand, pressure, flowrate, velocity)
        attribute: String,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> AppResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Validate { project_path } => cmd_validate(&project_path),
        Commands::Run {
            project_path,
            no_cache,
            tee,
        } => cmd_run(&project_path, !no_cache, tee),
        Commands::Runs { project_path } => cmd_runs(&project_path),
        Commands::ShowRun {
            project_path,
            run_id,
        } => cmd_show_run(&project_path, &run_id),
        Commands::ExportSeries {
            project_path,
            run_id,
            entity_id,
            attribute,
            output,
        } => cmd_export_series(
            &project_path,
            &run_id,
            &entity_id,
            &attribute,
            output.as_deref(),
        ),
    }
}

fn cmd_validate(project_path: &Path) -> AppResult<()> {
    println!("Validating project: {}", project_path.display());
    let project = project_service::load_project(project_path)?;
    project_service::validate_project(&project)?;
    let summary = project_service::summarize(&project);
    println!("✓ Project is valid");
    println!(
        "  {} - {} ({} junctions, {} reservoirs, {} tanks, {} pipes, {} closed)",
        summary.id,
        summary.name,
        summary.junction_count,
        summary.reservoir_count,
        summary.tank_count,
        summary.pipe_count,
        summary.closed_pipe_count
    );
    println!(
        "  duration = {:.0} s, step = {:.0} s, {} steps, solver = {}",
        summary.duration_s, summary.hydraulic_timestep_s, summary.expected_steps, summary.solver
    );
    Ok(())
}

fn cmd_run(project_path: &Path, use_cache: bool, tee: bool) -> AppResult<()> {
    println!("Running simulation: {}", project_path.display());

    let request = RunRequest {
        project_path,
        options: RunOptions {
            use_cache,
            tee,
            ..RunOptions::default()
        },
    };

    let mut last_emit = Instant::now();
    let mut last_stage = None;
    let response = run_service::ensure_run_with_progress(
        &request,
        Some(&mut |event: RunProgressEvent| {
            let emit_now = last_stage != Some(event.stage)
                || event.step.is_some()
                || last_emit.elapsed().as_millis() >= 100;
            if emit_now {
                render_cli_progress(&event);
                last_stage = Some(event.stage);
                last_emit = Instant::now();
            }
        }),
    )?;
    clear_progress_line();

    if response.loaded_from_cache {
        println!("✓ Loaded from cache: {}", response.run_id);
    } else {
        println!("✓ Simulation completed: {}", response.run_id);
    }
    println!("  Elapsed: {:.3}s", response.elapsed_s);

    let (_manifest, results) = run_service::load_run(project_path, &response.run_id)?;
    print_summary(&query::run_summary(&results)?);

    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(120));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &RunProgressEvent) {
    match (&event.stage, &event.step) {
        (RunStage::Stepping, Some(p)) => {
            let width = 28usize;
            let filled = ((p.fraction_complete * width as f64).round() as usize).min(width);
            let bar = format!(
                "{}{}",
                "#".repeat(filled),
                "-".repeat(width.saturating_sub(filled))
            );
            print!(
                "\r[{}] {:>6.2}%  t={}/{:.0}s  step={}  status={}  dropped={}  elapsed={:.1}s",
                bar,
                p.fraction_complete * 100.0,
                p.time_s,
                p.duration_s,
                p.step,
                p.status,
                p.dropped,
                event.elapsed_wall_s
            );
        }
        _ => {
            let spinner = ['|', '/', '-', '\\'];
            let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
            let mut line = format!(
                "\r{} {}  elapsed={:.2}s",
                spinner[spin_idx],
                event.stage.label(),
                event.elapsed_wall_s
            );
            if let Some(msg) = &event.message {
                line.push_str(&format!("  {}", msg));
            }
            print!("{}", line);
        }
    }
    let _ = io::stdout().flush();
}

fn print_summary(summary: &query::RunSummary) {
    println!("  Network: {}", summary.network_name);
    println!("  Time points: {}", summary.step_count);
    println!(
        "  Time range: {} - {} s",
        summary.time_range.0, summary.time_range.1
    );
    println!("  Nodes: {}", summary.node_count);
    println!("  Links: {}", summary.link_count);
    println!("  Converged: {}", if summary.converged { "yes" } else { "no" });
    if summary.dropped_constraints > 0 {
        println!("  Dropped constraints: {}", summary.dropped_constraints);
    }
    if let Some(error) = &summary.error {
        println!("  Error: {}", error);
    }
}

fn cmd_runs(project_path: &Path) -> AppResult<()> {
    let runs = run_service::list_runs(project_path)?;

    if runs.is_empty() {
        println!("No cached runs found for: {}", project_path.display());
    } else {
        println!("Cached runs:");
        for manifest in runs {
            println!(
                "  {} ({}, {} steps{})",
                manifest.run_id,
                manifest.timestamp,
                manifest.steps,
                if manifest.converged { "" } else { ", not converged" }
            );
        }
    }
    Ok(())
}

fn cmd_show_run(project_path: &Path, run_id: &str) -> AppResult<()> {
    println!("Loading run: {}", run_id);

    let (manifest, results) = run_service::load_run(project_path, run_id)?;
    let summary = query::run_summary(&results)?;

    println!("\nRun Summary:");
    println!(
        "  Solver: {} {}",
        manifest.solver, manifest.solver_version
    );
    print_summary(&summary);

    println!("\nNodes:");
    for id in query::list_node_ids(&results) {
        println!("  {}", id);
    }

    println!("\nLinks:");
    for id in query::list_link_ids(&results) {
        println!("  {}", id);
    }

    println!("\nSteps:");
    for step in &results.steps {
        println!(
            "  t={:>8}  {:<15} iters={:<3} residual={:.3e}{}",
            step.time,
            step.status,
            step.iterations,
            step.residual_norm,
            if step.dropped.is_empty() {
                String::new()
            } else {
                format!("  dropped: {}", step.dropped.join(", "))
            }
        );
    }

    Ok(())
}

fn cmd_export_series(
    project_path: &Path,
    run_id: &str,
    entity_id: &str,
    attribute: &str,
    output: Option<&Path>,
) -> AppResult<()> {
    let (_manifest, results) = run_service::load_run(project_path, run_id)?;
    let series = query::entity_series(&results, entity_id, attribute)?;

    let mut csv = String::from("time_s,value\n");
    for (t, val) in &series {
        csv.push_str(&format!("{},{}\n", t, val));
    }

    if let Some(path) = output {
        std::fs::write(path, csv)?;
        println!(
            "✓ Exported {} data points to {}",
            series.len(),
            path.display()
        );
    } else {
        print!("{}", csv);
    }

    Ok(())
}
