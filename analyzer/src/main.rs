use anyhow::Context;
use clap::{Parser, Subcommand};
use galrotcore::processing::VelocityReport;
use generator::observation::{write_survey, GeneratorConfig};
use log::info;
use report::view::{
    averaging_json, averaging_text, conversion_json, conversion_text, RotationCurveView,
};
use std::path::PathBuf;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod report;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Galactic rotation-curve analysis driver")]
struct Args {
    /// Load a workflow config from YAML; flags override its values
    #[arg(long, global = true)]
    workflow: Option<PathBuf>,
    /// Print results as JSON instead of a text table
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert legacy `.tra` exports under a folder to CSV
    Convert { dir: PathBuf },
    /// Average raw scans per longitude and band
    Average(AnalysisArgs),
    /// Extract peaks and compute rotation speeds from averaged spectra
    Velocity(AnalysisArgs),
    /// Convert (when needed), average and compute velocities in one go
    Run(AnalysisArgs),
    /// Write a synthetic survey and reference tables
    Synth(SynthArgs),
}

#[derive(clap::Args)]
struct AnalysisArgs {
    #[arg(long)]
    data_root: Option<PathBuf>,
    /// Observation set folder, relative to the data root
    #[arg(long)]
    target: Option<PathBuf>,
    #[arg(long)]
    tables: Option<PathBuf>,
    #[arg(long)]
    max_angle: Option<u32>,
    #[arg(long)]
    step: Option<u32>,
    /// Use the median-baseline peak search on the on-source band only
    #[arg(long, default_value_t = false)]
    no_background: bool,
    /// Export the rotation curve (`.json` or Shift-JIS `.csv`)
    #[arg(long)]
    export: Option<PathBuf>,
}

#[derive(clap::Args)]
struct SynthArgs {
    /// Folder receiving the raw scans
    dir: PathBuf,
    #[arg(long, default_value = "tables")]
    tables: PathBuf,
    #[arg(long, default_value_t = 60)]
    max_angle: u32,
    #[arg(long, default_value_t = 5)]
    step: u32,
    #[arg(long, default_value_t = 2)]
    scans: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Write receiver `.tra` files instead of CSV
    #[arg(long, default_value_t = false)]
    legacy: bool,
}

fn workflow_config(base: Option<&PathBuf>, args: AnalysisArgs) -> anyhow::Result<WorkflowConfig> {
    let mut config = match base {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::default(),
    };
    if let Some(data_root) = args.data_root {
        config.data_root = data_root;
    }
    if let Some(target) = args.target {
        config.target = target;
    }
    if let Some(tables) = args.tables {
        config.tables_dir = tables;
    }
    if let Some(max_angle) = args.max_angle {
        config.max_angle = max_angle;
    }
    if let Some(step) = args.step {
        config.angle_step = step;
    }
    if args.no_background {
        config.background_subtraction = false;
    }
    if args.export.is_some() {
        config.export = args.export;
    }
    Ok(config)
}

fn print_curve(runner: &Runner, report: &VelocityReport, json: bool) -> anyhow::Result<()> {
    let config = runner.config();
    let view = RotationCurveView::new(
        config.target_dir().display().to_string(),
        config.peak_mode(),
        report,
    );
    if json {
        println!("{}", view.to_json()?);
    } else {
        print!("{}", view.render_text());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Convert { dir } => {
            let config = match &args.workflow {
                Some(path) => WorkflowConfig::load(path)?,
                None => WorkflowConfig::default(),
            };
            let summary = Runner::new(config).convert(&dir)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&conversion_json(&summary))?);
            } else {
                print!("{}", conversion_text(&summary));
            }
        }
        Command::Average(analysis) => {
            let runner = Runner::new(workflow_config(args.workflow.as_ref(), analysis)?);
            let summary = runner.average()?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&averaging_json(&summary))?);
            } else {
                print!("{}", averaging_text(&summary));
            }
        }
        Command::Velocity(analysis) => {
            let runner = Runner::new(workflow_config(args.workflow.as_ref(), analysis)?);
            let report = runner.velocity()?;
            runner.export(&report)?;
            print_curve(&runner, &report, args.json)?;
        }
        Command::Run(analysis) => {
            let runner = Runner::new(workflow_config(args.workflow.as_ref(), analysis)?);
            let result = runner.execute()?;
            if !args.json {
                if let Some(conversion) = &result.conversion {
                    print!("{}", conversion_text(conversion));
                }
                print!("{}", averaging_text(&result.averaging));
            }
            print_curve(&runner, &result.velocity, args.json)?;
            if let Some(path) = result.exported {
                info!("results written to {}", path.display());
            }
        }
        Command::Synth(synth) => {
            let config = GeneratorConfig {
                max_angle: synth.max_angle,
                angle_step: synth.step,
                scans_per_band: synth.scans,
                seed: synth.seed,
                legacy: synth.legacy,
                ..Default::default()
            };
            let summary = write_survey(&config, &synth.dir, &synth.tables)
                .with_context(|| format!("generating synthetic survey in {}", synth.dir.display()))?;
            println!(
                "wrote {} scans to {} and reference tables to {}",
                summary.scans,
                summary.target.display(),
                summary.tables_dir.display()
            );
        }
    }

    Ok(())
}
