// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * ParamSweep - Batched Parameter Fuzzer
 * Standalone CLI for reflection and conflict discovery
 *
 * Features:
 * - Reflection mode: find query parameters echoed into the rendered page
 * - Status mode: find parameters that break the response status
 * - URL probing with status, length and screenshots
 * - Chrome or plain HTTP rendering
 * - JSON run reports and HTML screenshot indexes
 *
 * (c) 2026 Bountyy Oy
 */

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use paramsweep::config::{load_config_with_overrides, ConfigLoader, ConfigValidator, FuzzerConfig};
use paramsweep::fuzzer::{DispatchSettings, Dispatcher};
use paramsweep::inputs;
use paramsweep::prober::{ProbeSettings, UrlProber};
use paramsweep::renderer::{build_renderer, RendererKind};
use paramsweep::reporting::{ArtifactStore, HtmlReportGenerator, JsonReportGenerator};
use paramsweep::types::{FuzzMode, RunReport};

/// ParamSweep - Batched reflected-parameter fuzzer
#[derive(Parser)]
#[command(name = "paramsweep")]
#[command(author = "Bountyy Oy <info@bountyy.fi>")]
#[command(version)]
#[command(about = "Find reflected and page-breaking query parameters in bulk.", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Quiet mode - only show results
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file path (toml, yaml or json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Find parameters whose value is reflected into the rendered page
    Reflect(FuzzArgs),

    /// Find parameters that turn the response status into an error
    Status(FuzzArgs),

    /// Visit a list of URLs and report status, length and title
    Probe(ProbeArgs),

    /// Write a default configuration file
    Init {
        /// Output path; the extension picks the format
        #[arg(short, long, default_value = "paramsweep.toml")]
        output: PathBuf,
    },
}

#[derive(Args)]
struct FuzzArgs {
    /// File with one parameter name per line
    #[arg(short = 'P', long = "params", visible_alias = "pf")]
    params: PathBuf,

    /// File with one target URL per line
    #[arg(short = 'U', long = "urls", visible_alias = "uf")]
    urls: PathBuf,

    /// Concurrent render sessions per target
    #[arg(short, long)]
    workers: Option<usize>,

    /// Maximum length of a generated test URL
    #[arg(long)]
    max_url_length: Option<usize>,

    /// Proxy URL for every request
    #[arg(short, long)]
    proxy: Option<String>,

    /// Screenshot pages with reflections
    #[arg(short, long)]
    screenshots: bool,

    /// Save the rendered content of every batch
    #[arg(long)]
    save_responses: bool,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Write the JSON run report here
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Control parameter name; empty disables the control
    #[arg(long)]
    control: Option<String>,

    /// Marker prefix placed before each parameter name
    #[arg(long)]
    marker_prefix: Option<String>,

    /// Rendering backend
    #[arg(long)]
    renderer: Option<RendererArg>,

    /// Open a new session for every batch
    #[arg(long)]
    fresh_sessions: bool,

    /// Navigation timeout in seconds, 0 disables it
    #[arg(long)]
    timeout: Option<u64>,

    /// Accept invalid TLS certificates
    #[arg(short = 'k', long)]
    insecure: bool,

    /// Desktop browser user agent and Accept-Language
    #[arg(long)]
    stealth: bool,

    /// Extra request header, "Name: value"
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Check that the unmodified target renders before fuzzing
    #[arg(long)]
    baseline: bool,

    /// Abort the run when a target's baseline is not 2xx (implies --baseline)
    #[arg(long)]
    fail_on_unstable_baseline: bool,

    /// Artifact directory for screenshots and saved responses
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,
}

#[derive(Args)]
struct ProbeArgs {
    /// File with one URL per line
    #[arg(short, long)]
    list: PathBuf,

    /// Show status codes
    #[arg(long = "sc")]
    status_code: bool,

    /// Show content lengths
    #[arg(long = "cl")]
    content_length: bool,

    /// Screenshot every page
    #[arg(long = "ss")]
    screenshots: bool,

    /// Proxy URL for every request
    #[arg(short, long)]
    proxy: Option<String>,

    /// Concurrent render sessions
    #[arg(short, long)]
    workers: Option<usize>,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Append result lines to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Rendering backend
    #[arg(long)]
    renderer: Option<RendererArg>,

    /// Navigation timeout in seconds, 0 disables it
    #[arg(long, default_value = "20")]
    timeout: u64,

    /// Accept invalid TLS certificates
    #[arg(short = 'k', long)]
    insecure: bool,

    /// Desktop browser user agent and Accept-Language
    #[arg(long)]
    stealth: bool,

    /// Artifact directory for screenshots
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum RendererArg {
    Chrome,
    Http,
}

impl From<RendererArg> for RendererKind {
    fn from(arg: RendererArg) -> Self {
        match arg {
            RendererArg::Chrome => RendererKind::Chrome,
            RendererArg::Http => RendererKind::Http,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over the flags
    let default_filter = if cli.debug {
        "debug"
    } else if cli.verbose {
        "paramsweep=debug,warn"
    } else if cli.quiet {
        "error"
    } else {
        "paramsweep=info,warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_thread_ids(false)
        .init();

    // Create async runtime
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("paramsweep")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Reflect(args) => run_fuzz(cli.config, args, FuzzMode::Reflection, cli.quiet).await,
        Commands::Status(args) => run_fuzz(cli.config, args, FuzzMode::Status, cli.quiet).await,
        Commands::Probe(args) => run_probe(cli.config, args, cli.quiet).await,
        Commands::Init { output } => generate_config(output),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<FuzzerConfig> {
    let config = load_config_with_overrides(path.as_deref())?;
    if let Some(path) = &path {
        info!("Loaded configuration from {}", path.display());
    }
    Ok(config)
}

/// Fail on invalid settings, log warnings and notes for the rest
fn check_config(config: &FuzzerConfig) -> Result<()> {
    ConfigValidator::validate(config).context("Invalid configuration")?;

    let report = ConfigValidator::generate_validation_report(config);
    for (field, messages) in &report.warnings {
        for message in messages {
            warn!("[Config] {}: {}", field, message);
        }
    }
    for (field, messages) in &report.info {
        for message in messages {
            info!("[Config] {}: {}", field, message);
        }
    }
    Ok(())
}

fn parse_headers(raw: &[String]) -> Vec<(String, String)> {
    raw.iter()
        .filter_map(|h| match h.split_once(':') {
            Some((key, value)) => Some((key.trim().to_string(), value.trim().to_string())),
            None => {
                warn!("Ignoring malformed header: {}", h);
                None
            }
        })
        .collect()
}

fn apply_fuzz_args(config: &mut FuzzerConfig, args: &FuzzArgs) {
    if let Some(workers) = args.workers {
        config.fuzzing.workers = workers;
    }
    if let Some(max) = args.max_url_length {
        config.fuzzing.max_url_length = max;
    }
    if let Some(control) = &args.control {
        config.fuzzing.control_parameter = if control.is_empty() {
            None
        } else {
            Some(control.clone())
        };
    }
    if let Some(prefix) = &args.marker_prefix {
        config.fuzzing.marker_prefix = prefix.clone();
    }
    if args.fresh_sessions {
        config.fuzzing.fresh_session_per_batch = true;
    }
    if args.baseline {
        config.fuzzing.baseline_check = true;
    }
    if args.fail_on_unstable_baseline {
        config.fuzzing.baseline_check = true;
        config.fuzzing.fail_on_unstable_baseline = true;
    }

    if let Some(proxy) = &args.proxy {
        config.browser.proxy = Some(proxy.clone());
    }
    if let Some(renderer) = args.renderer {
        config.browser.renderer = renderer.into();
    }
    if let Some(timeout) = args.timeout {
        config.browser.navigation_timeout_secs = (timeout > 0).then_some(timeout);
    }
    if args.headful {
        config.browser.headless = false;
    }
    if args.insecure {
        config.browser.insecure = true;
    }
    if args.stealth {
        config.browser.stealth = true;
    }
    for (name, value) in parse_headers(&args.headers) {
        config.browser.headers.insert(name, value);
    }

    if let Some(output) = &args.output {
        config.output.path = Some(output.clone());
    }
    if let Some(dir) = &args.artifacts_dir {
        config.output.artifacts_dir = dir.clone();
    }
    if args.screenshots {
        config.output.screenshots = true;
    }
    if args.save_responses {
        config.output.save_responses = true;
    }
}

async fn run_fuzz(
    config_path: Option<PathBuf>,
    args: FuzzArgs,
    mode: FuzzMode,
    quiet: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    apply_fuzz_args(&mut config, &args);
    check_config(&config)?;

    let parameters = inputs::load_list(&args.params, "parameter").await?;
    let targets = inputs::load_targets(&args.urls).await?;

    let settings = DispatchSettings::from_config(&config, mode)?;
    // Reject colliding names before any browser is started
    settings.codec.validate_parameters(&parameters)?;

    if !quiet {
        print_banner();
    }

    info!("Mode: {}", mode.as_str());
    info!("Targets: {}", targets.len());
    info!("Parameters: {}", parameters.len());
    info!(
        "Workers: {}, URL budget: {}",
        settings.workers, settings.max_url_length
    );

    let store = ArtifactStore::new(config.output.artifacts_dir.clone());
    let screenshots = settings.screenshots;
    store
        .prepare(screenshots, settings.save_responses)
        .await
        .context("Failed to prepare artifact directory")?;

    let renderer = build_renderer(config.browser.renderer, config.browser.session_options())
        .await
        .context("Failed to start renderer")?;

    let started = Instant::now();
    let dispatcher = Dispatcher::new(renderer, settings).with_artifacts(store.clone());
    let report = dispatcher.run(&targets, &parameters).await?;
    let elapsed = started.elapsed();

    print_run_summary(&report);
    println!("Completed in {:.1}s", elapsed.as_secs_f64());

    if let Some(path) = &config.output.path {
        JsonReportGenerator::new().write(&report, path).await?;
        info!("Report written to {}", path.display());
    }

    if screenshots {
        let rows = HtmlReportGenerator::rows_from_run(&report);
        if !rows.is_empty() {
            let html = HtmlReportGenerator::new().generate("Reflection Screenshots", &rows);
            let path = store.write_screenshot_index(&html).await?;
            info!("Screenshot report written to {}", path.display());
        }
    }

    Ok(())
}

async fn run_probe(config_path: Option<PathBuf>, args: ProbeArgs, quiet: bool) -> Result<()> {
    let mut config = load_config(config_path)?;

    if let Some(proxy) = &args.proxy {
        config.browser.proxy = Some(proxy.clone());
    }
    if let Some(renderer) = args.renderer {
        config.browser.renderer = renderer.into();
    }
    if args.headful {
        config.browser.headless = false;
    }
    if args.insecure {
        config.browser.insecure = true;
    }
    if args.stealth {
        config.browser.stealth = true;
    }
    if let Some(dir) = &args.artifacts_dir {
        config.output.artifacts_dir = dir.clone();
    }
    config.browser.navigation_timeout_secs = (args.timeout > 0).then_some(args.timeout);
    check_config(&config)?;

    let urls = inputs::load_list(&args.list, "URL").await?;

    if !quiet {
        print_banner();
    }
    info!("Probing {} URLs", urls.len());

    let store = ArtifactStore::new(config.output.artifacts_dir.clone());
    store
        .prepare(args.screenshots, false)
        .await
        .context("Failed to prepare artifact directory")?;

    let renderer = build_renderer(config.browser.renderer, config.browser.session_options())
        .await
        .context("Failed to start renderer")?;

    let settings = ProbeSettings {
        workers: args.workers.unwrap_or(config.fuzzing.workers),
        show_status: args.status_code,
        show_length: args.content_length,
        screenshots: args.screenshots,
        navigation_timeout: config.browser.navigation_timeout(),
        output: args.output.clone(),
        print: true,
        ..ProbeSettings::default()
    };

    let started = Instant::now();
    let records = UrlProber::new(renderer, settings)
        .with_artifacts(store)
        .probe(&urls)
        .await?;

    let failed = records.iter().filter(|r| r.error.is_some()).count();
    info!(
        "Probed {} URLs ({} failed) in {:.1}s",
        records.len(),
        failed,
        started.elapsed().as_secs_f64()
    );

    Ok(())
}

fn print_banner() {
    print!("\x1b[96m");
    println!("   ___                           ____");
    println!("  / _ \\___ ________ ___ _  ___ / __/    _____ ___ ___");
    println!(" / ___/ _ `/ __/ _ `/  ' \\(_-<_\\ \\| |/|/ / -_) -_) _ \\");
    println!("/_/   \\_,_/_/  \\_,_/_/_/_/___/___/|__,__/\\__/\\__/ .__/");
    println!("                                              /_/");
    print!("\x1b[0m");
    println!();
}

fn print_run_summary(report: &RunReport) {
    println!();
    println!("{}", "-".repeat(60));
    println!("RESULTS ({})", report.mode.as_str());
    println!("{}", "-".repeat(60));

    for target in &report.targets {
        let found: Vec<&str> = match report.mode {
            FuzzMode::Reflection => target.reflected.iter().map(|s| s.as_str()).collect(),
            FuzzMode::Status => target.bad_parameters.iter().map(|s| s.as_str()).collect(),
        };

        if found.is_empty() {
            println!("[-] {}", target.target);
        } else {
            println!("[+] {} : {}", target.target, found.join(", "));
        }

        if let Some(redirect) = &target.redirect {
            println!("    redirect: {}", redirect);
        }
        if report.mode == FuzzMode::Reflection && !target.bad_parameters.is_empty() {
            let bad: Vec<&str> = target.bad_parameters.iter().map(|s| s.as_str()).collect();
            println!("    removed: {}", bad.join(", "));
        }
        if target.batches_failed > 0 || target.unlocalized_anomalies > 0 {
            println!(
                "    batches: {} tested, {} failed, {} unlocalized",
                target.batches_tested, target.batches_failed, target.unlocalized_anomalies
            );
        }
    }

    println!("{}", "-".repeat(60));
    match report.mode {
        FuzzMode::Reflection => println!(
            "{} reflected parameter(s) across {} target(s)",
            report.total_reflected(),
            report.targets.len()
        ),
        FuzzMode::Status => println!(
            "{} bad parameter(s) across {} target(s)",
            report.all_bad_parameters().len(),
            report.targets.len()
        ),
    }
}

fn generate_config(output: PathBuf) -> Result<()> {
    let loader = ConfigLoader::new(&output)?;
    loader
        .save_config(&FuzzerConfig::default())
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Configuration written to {}", output.display());
    Ok(())
}
