use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use log::{LevelFilter, debug, info, warn};
use serde::Serialize;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use similar_images::cli::{Command, DedupArgs, PreviewArgs, ScanArgs, ShowArgs};
use similar_images::{
    Action, AverageHasher, Clarity, Cli, Config, ContentId, DuplicateGroup, Error, Evaluation,
    HashCache, KeepPolicy, NamePolicy, PerceptualHash, RankedGroup, categorize, find_duplicates,
    plan_actions, write_preview_dir,
};

fn init_logging(cli: &Cli, config: &Config) -> Result<()> {
    let level = if cli.quiet {
        LevelFilter::Error
    } else if cli.verbose >= 2 {
        LevelFilter::Trace
    } else if cli.verbose == 1 {
        LevelFilter::Debug
    } else {
        match config.log_level.as_deref() {
            Some(level) => LevelFilter::from_str(level)
                .with_context(|| format!("Invalid log_level in config: '{level}'"))?,
            None => LevelFilter::Info,
        }
    };

    let mut builder = ConfigBuilder::new();
    // Falls back to UTC when the local offset can't be determined.
    let _ = builder.set_time_offset_to_local();
    builder.set_time_format_rfc3339();
    TermLogger::init(level, builder.build(), TerminalMode::Stderr, ColorChoice::Auto)
        .context("Failed to initialize logger")?;
    Ok(())
}

/// Finds duplicate sets under the given directories using the on-disk cache.
fn scan(args: &ScanArgs, config: &Config, cache_dir: &Path) -> Result<Vec<DuplicateGroup>> {
    if let Some(threads) = args.threads.or(config.threads) {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure thread pool")?;
        debug!("Using {threads} hashing threads");
    }
    let show_progress = !args.no_progress_bar && config.progress_bar.unwrap_or(true);

    let mut cache = HashCache::open(cache_dir)
        .with_context(|| format!("Failed to open hash cache in '{}'", cache_dir.display()))?;
    let groups = find_duplicates(&args.dirs, &AverageHasher::new(), &mut cache, show_progress)?;
    Ok(groups)
}

fn policies(args: &DedupArgs, config: &Config) -> (KeepPolicy, NamePolicy) {
    (
        args.keep_by.or(config.keep_by).unwrap_or_default(),
        args.name_by.or(config.name_by).unwrap_or_default(),
    )
}

fn preview(args: PreviewArgs, config: &Config, cache_dir: &Path) -> Result<()> {
    let groups = scan(&args.scan, config, cache_dir)?;
    write_preview_dir(&args.preview_dir, args.force, &groups)?;
    println!(
        "Wrote {} sets of similar images to {}",
        groups.len(),
        args.preview_dir.display()
    );
    Ok(())
}

#[derive(Serialize)]
struct FileReport<'a> {
    path: &'a Path,
    content_id: &'a ContentId,
    hash: &'a PerceptualHash,
    bytes: u64,
    width: u32,
    height: u32,
    evaluation: Evaluation,
}

#[derive(Serialize)]
struct SetReport<'a> {
    number: usize,
    clarity: Clarity,
    files: Vec<FileReport<'a>>,
    /// Absent when the keep policy can't decide for this set.
    actions: Option<Vec<Action>>,
}

fn set_report(ranked: &RankedGroup, keep: KeepPolicy, name: NamePolicy) -> Result<SetReport<'_>> {
    let evaluations = ranked.ranking.evaluations(ranked.group.len());
    let files = ranked
        .group
        .files
        .iter()
        .zip(evaluations)
        .map(|(file, evaluation)| FileReport {
            path: &file.path,
            content_id: &file.content_id,
            hash: &file.hash,
            bytes: file.bytes,
            width: file.width,
            height: file.height,
            evaluation,
        })
        .collect();
    let actions = match plan_actions(&ranked.group, &ranked.ranking, keep, name) {
        Ok(actions) => Some(actions),
        Err(Error::AmbiguousBest) => None,
        Err(e) => return Err(e.into()),
    };
    Ok(SetReport {
        number: ranked.number,
        clarity: ranked.clarity(),
        files,
        actions,
    })
}

fn print_evaluations(ranked: &RankedGroup) {
    let evaluations = ranked.ranking.evaluations(ranked.group.len());
    for (j, (path, evaluation)) in ranked.group.paths().zip(evaluations).enumerate() {
        println!(
            "{}",
            format!("    # {}: {:<11}: {}", j, evaluation.as_str(), path.display()).blue()
        );
    }
}

fn show(args: ShowArgs, config: &Config, cache_dir: &Path) -> Result<()> {
    let json = args.json;
    let args = args.dedup;
    let (keep, name) = policies(&args, config);
    let groups = scan(&args.scan, config, cache_dir)?;
    let (obvious, unclear) = categorize(groups, &args.dups.clone().unwrap_or_default());

    if json {
        let reports = obvious
            .iter()
            .chain(&unclear)
            .map(|ranked| set_report(ranked, keep, name))
            .collect::<Result<Vec<_>>>()?;
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    if obvious.is_empty() && unclear.is_empty() {
        println!("{}", "No similar images found!".green());
        return Ok(());
    }

    for ranked in obvious.iter().chain(&unclear) {
        let header = format!("{}-{}", ranked.clarity(), ranked.number);
        match ranked.clarity() {
            Clarity::Obvious => println!("{}", header.green()),
            Clarity::Unclear => println!("{}", header.magenta()),
        }
        match plan_actions(&ranked.group, &ranked.ranking, keep, name) {
            Ok(actions) => {
                for action in actions {
                    println!("    {}", action.command(&ranked.group));
                }
            }
            Err(Error::AmbiguousBest) => {
                println!("{}", "    *Warning*: unclear which is best".red());
            }
            Err(e) => return Err(e.into()),
        }
        print_evaluations(ranked);
    }
    Ok(())
}

fn dedup(args: DedupArgs, config: &Config, cache_dir: &Path) -> Result<()> {
    let (keep, name) = policies(&args, config);
    let groups = scan(&args.scan, config, cache_dir)?;
    let (obvious, unclear) = categorize(groups, &args.dups.clone().unwrap_or_default());

    let summary = similar_images::dedup(obvious.iter().chain(&unclear), keep, name)?;
    for (clarity, number) in &summary.skipped {
        println!(
            "{}",
            format!("*Warning*: {clarity}-{number}: unclear which is best, skipped").red()
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_logging(&cli, &config)?;
    match &config.source {
        Some(path) => debug!("Loaded config from '{}': {:?}", path.display(), config),
        None => debug!("No config file, using defaults"),
    }

    ctrlc::set_handler(|| {
        warn!("Interrupted, the hash cache keeps its last committed state");
        std::process::exit(130);
    })
    .context("Failed to install Ctrl-C handler")?;

    info!("Starting similar-images v{}", env!("CARGO_PKG_VERSION"));
    debug!("Command line arguments: {:?}", cli);

    let cache_dir = config.resolve_cache_dir(cli.app_cache_dir.clone())?;
    debug!("Cache directory: '{}'", cache_dir.display());

    match cli.command {
        Command::Preview(args) => preview(args, &config, &cache_dir)?,
        Command::Show(args) => show(args, &config, &cache_dir)?,
        Command::Dedup(args) => dedup(args, &config, &cache_dir)?,
    }

    info!("Completed in {:.2?}", start_time.elapsed());
    Ok(())
}
