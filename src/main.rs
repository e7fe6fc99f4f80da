//! gtifilt: Good Time Interval filtering for X-ray timing event lists
//!
//! Usage: gtifilt <COMMAND> [OPTIONS]

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use gtifilt::commands::{
    ApplyGtiCommand, BatchCommand, EnergyCommand, SimulateCommand, SimulateConfig,
};
use gtifilt::config::{FilterConfig, GtiFrame, IntervalPolicy};
use gtifilt::error::{GtiError, Result};
use gtifilt::parallel::configure_threads;
use gtifilt::table::SinkFormat;

#[derive(Parser)]
#[command(name = "gtifilt")]
#[command(version)]
#[command(about = "gtifilt: apply Good Time Intervals to X-ray timing event lists", long_about = None)]
struct Cli {
    /// Number of threads to use (default: number of CPUs)
    #[arg(long, short = 't', global = true)]
    threads: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the filtering commands.
#[derive(Args, Clone)]
struct FilterArgs {
    /// Frame of the GTI boundaries: raw (TIMEZERO not yet applied) or corrected
    #[arg(long, default_value = "raw")]
    gti_frame: String,

    /// Interval policy: as-given (overlaps emit duplicates) or require-disjoint
    #[arg(long, default_value = "as-given")]
    policy: String,

    /// Reject GTIs whose start is after their stop
    #[arg(long)]
    check_bounds: bool,

    /// Keep only these detector ids (comma-separated, e.g. "0,2")
    #[arg(long, value_delimiter = ',')]
    pcu: Option<Vec<u8>>,

    /// Clock offset to use instead of the TIMEZERO recorded in the event list
    #[arg(long, allow_hyphen_values = true)]
    timezero: Option<f64>,

    /// Skip time-order validation (faster for pre-sorted input)
    #[arg(long)]
    assume_sorted: bool,

    /// Output format: text|fits (default: from the output extension)
    #[arg(long)]
    format: Option<String>,

    /// Print filter statistics to stderr
    #[arg(long)]
    stats: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep the events of one event list that fall inside good time intervals
    Apply {
        /// Event list (text or FITS)
        events: PathBuf,

        /// GTI list (text or FITS)
        gti: PathBuf,

        /// Output event list (.dat or .fits)
        output: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Apply GTIs to every job of a manifest in parallel
    Batch {
        /// Manifest file: one "events gti output" line per job
        manifest: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Convert absolute-channel energies to lower energy boundaries per mode channel
    Energy {
        /// Energy/absolute-channel table
        ec_table: PathBuf,

        /// Channel binning table (group sizes in column 3)
        chan_bin: PathBuf,

        /// Output file, one boundary per line
        output: PathBuf,

        /// Observation epoch (1-5)
        #[arg(long)]
        epoch: u32,
    },

    /// Generate a synthetic event list and GTI file
    Simulate {
        /// Output directory
        #[arg(short, long, default_value = "./gtifilt_sim_data")]
        output: PathBuf,

        /// Observation length in seconds
        #[arg(long, default_value = "1000")]
        duration: f64,

        /// Mean event rate (counts/s)
        #[arg(long, default_value = "100")]
        rate: f64,

        /// Number of good time intervals
        #[arg(long, default_value = "10")]
        gtis: usize,

        /// Share of each GTI slot that is good
        #[arg(long, default_value = "0.8")]
        good_fraction: f64,

        /// Number of energy channels
        #[arg(long, default_value = "64")]
        channels: u16,

        /// Number of detectors
        #[arg(long, default_value = "5")]
        detectors: u8,

        /// Raw start time of the observation
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        start_time: f64,

        /// Clock offset recorded with the event list
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        timezero: f64,

        /// Random seed for reproducibility
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output format: text|fits
        #[arg(long, default_value = "text")]
        format: String,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(n) = cli.threads {
        if let Err(e) = configure_threads(n) {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }

    let result = match cli.command {
        Commands::Apply {
            events,
            gti,
            output,
            filter,
        } => run_apply(events, gti, output, filter),

        Commands::Batch { manifest, filter } => run_batch(manifest, filter),

        Commands::Energy {
            ec_table,
            chan_bin,
            output,
            epoch,
        } => EnergyCommand::new(epoch)
            .run(&ec_table, &chan_bin, &output)
            .map(|_| ()),

        Commands::Simulate {
            output,
            duration,
            rate,
            gtis,
            good_fraction,
            channels,
            detectors,
            start_time,
            timezero,
            seed,
            format,
            force,
        } => parse_format(&format).and_then(|format| {
            let config = SimulateConfig {
                output_dir: output,
                duration,
                rate,
                gti_count: gtis,
                good_fraction,
                channels,
                detectors,
                start_time,
                timezero,
                seed,
                format,
                force,
            };
            let stats = SimulateCommand::new(config).run()?;
            eprintln!("{}", stats);
            Ok(())
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn parse_format(s: &str) -> Result<SinkFormat> {
    SinkFormat::from_str(s).ok_or_else(|| {
        GtiError::InvalidFormat(format!("Invalid format '{}'. Use: text, fits", s))
    })
}

fn build_apply(args: &FilterArgs) -> Result<ApplyGtiCommand> {
    let frame = GtiFrame::from_str(&args.gti_frame).ok_or_else(|| {
        GtiError::InvalidFormat(format!(
            "Invalid GTI frame '{}'. Use: raw, corrected",
            args.gti_frame
        ))
    })?;
    let policy = IntervalPolicy::from_str(&args.policy).ok_or_else(|| {
        GtiError::InvalidFormat(format!(
            "Invalid interval policy '{}'. Use: as-given, require-disjoint",
            args.policy
        ))
    })?;

    let mut cmd = ApplyGtiCommand::new();
    cmd.config = FilterConfig::new()
        .with_frame(frame)
        .with_policy(policy)
        .with_bounds_check(args.check_bounds);
    cmd.timezero = args.timezero;
    cmd.detectors = args.pcu.clone();
    cmd.assume_sorted = args.assume_sorted;
    cmd.format = args.format.as_deref().map(parse_format).transpose()?;
    Ok(cmd)
}

fn run_apply(events: PathBuf, gti: PathBuf, output: PathBuf, args: FilterArgs) -> Result<()> {
    let cmd = build_apply(&args)?;
    let report = cmd.run(&events, &gti, &output)?;
    if args.stats {
        eprintln!("{}", report);
    }
    Ok(())
}

fn run_batch(manifest: PathBuf, args: FilterArgs) -> Result<()> {
    let cmd = BatchCommand::new(build_apply(&args)?);
    let summary = cmd.run(&manifest)?;
    if args.stats {
        for report in &summary.reports {
            eprintln!("{}", report);
        }
    }
    summary.into_result().map(|_| ())
}
