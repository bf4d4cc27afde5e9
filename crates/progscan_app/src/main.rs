//! progscan: harvest university program listings into CSV.
//!
//! Usage:
//!   progscan <university> [--headful] [--workers N] [--output DIR] [--warm]
//!            [--log file|terminal|both]
//!   progscan --list
//!   progscan            (interactive university selection)

mod failures;
mod logging;
mod registry;
mod sink;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use engine_logging::{engine_info, engine_warn};
use progscan_engine::{
    sites, Coordinator, RunSettings, Visibility, WebDriverFactory, WebDriverSettings,
};

use crate::failures::write_failure_log;
use crate::registry::{UniversityConfig, UNIVERSITIES};
use crate::sink::{CsvSink, RecordSink};

struct CliArgs {
    university: Option<String>,
    headful: bool,
    workers: usize,
    output: PathBuf,
    warm: bool,
    list: bool,
    log: logging::LogDestination,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut parsed = CliArgs {
        university: None,
        headful: false,
        workers: 8,
        output: PathBuf::from("output"),
        warm: false,
        list: false,
        log: logging::LogDestination::Both,
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--headful" => parsed.headful = true,
            "--warm" => parsed.warm = true,
            "--list" => parsed.list = true,
            "--workers" => {
                let value = args.next().context("--workers needs a number")?;
                parsed.workers = value
                    .parse()
                    .with_context(|| format!("invalid worker count {value:?}"))?;
                anyhow::ensure!(parsed.workers >= 1, "--workers must be at least 1");
            }
            "--output" => {
                let value = args.next().context("--output needs a directory")?;
                parsed.output = PathBuf::from(value);
            }
            "--log" => {
                let value = args.next().context("--log needs file, terminal or both")?;
                parsed.log = logging::LogDestination::from_flag(&value)
                    .with_context(|| format!("invalid --log destination {value:?}"))?;
            }
            other if other.starts_with('-') => {
                anyhow::bail!("unknown flag {other:?}");
            }
            other => {
                anyhow::ensure!(
                    parsed.university.is_none(),
                    "only one university may be given"
                );
                parsed.university = Some(other.to_string());
            }
        }
    }
    Ok(parsed)
}

fn print_registry() {
    println!("Available universities:");
    for (idx, uni) in UNIVERSITIES.iter().enumerate() {
        let implemented = if sites::extractor_for(uni.key).is_some() {
            ""
        } else {
            "  (configured, no extractor yet)"
        };
        println!(
            "  {}. {:8} {:6} {}{}",
            idx + 1,
            uni.key,
            uni.code,
            uni.name,
            implemented
        );
    }
}

/// Prompt for a university when none was given on the command line.
/// Accepts either a list number or a key.
fn select_interactively() -> anyhow::Result<String> {
    print_registry();
    print!("Select a university (number or key): ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("could not read selection")?;
    let choice = line.trim();
    anyhow::ensure!(!choice.is_empty(), "no university selected");

    if let Ok(index) = choice.parse::<usize>() {
        let uni = UNIVERSITIES
            .get(index.checked_sub(1).unwrap_or(usize::MAX))
            .with_context(|| format!("no university numbered {index}"))?;
        return Ok(uni.key.to_string());
    }
    Ok(choice.to_string())
}

fn run_settings(args: &CliArgs, config: &UniversityConfig) -> RunSettings {
    let visibility = if args.headful {
        Visibility::Headful
    } else {
        config.visibility
    };
    RunSettings {
        concurrency: args.workers,
        pool_capacity: args.workers,
        visibility,
        acquire_timeout: Duration::from_secs(30),
        acquire_retries: 3,
        acquire_backoff: Duration::from_millis(250),
        warm_start: args.warm,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    if args.list {
        print_registry();
        return Ok(());
    }

    logging::initialize(args.log);

    let key = match &args.university {
        Some(key) => key.clone(),
        None => select_interactively()?,
    };
    let config = registry::find(&key)
        .with_context(|| format!("unknown university {key:?}; try --list"))?;
    let extractor = sites::extractor_for(&key)
        .with_context(|| format!("no extractor implemented for {key:?} yet"))?;

    let settings = run_settings(&args, config);
    engine_info!(
        "harvesting {} ({}) with {} workers, {:?}",
        config.name,
        config.code,
        settings.concurrency,
        settings.visibility
    );

    let factory = Arc::new(WebDriverFactory::new(WebDriverSettings::default()));
    let coordinator = Coordinator::new(factory, settings);

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            engine_warn!("interrupt received, finishing in-flight tasks");
            cancel.cancel();
        }
    });

    let report = coordinator
        .run(extractor, config.list_url)
        .await
        .context("harvest run failed")?;

    println!();
    println!("Run summary for {}:", config.name);
    println!("  succeeded:  {}", report.succeeded.len());
    println!("  failed:     {}", report.failed.len());
    println!("  duplicates: {}", report.duplicates);
    println!("  elapsed:    {:.1?}", report.elapsed);

    let csv_sink = CsvSink::new(args.output.clone(), key.clone());
    let csv_path = csv_sink
        .write(&report.succeeded)
        .context("could not write CSV output")?;
    println!("  records:    {}", csv_path.display());

    if let Some(failure_path) = write_failure_log(&args.output, &key, &report.failed)? {
        println!("  failures:   {}", failure_path.display());
    }

    Ok(())
}
