use std::fs;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::SecondsFormat;
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use nrc_track::{
    activity_to_track, collect_running_ids, epoch_ms_to_utc, Activity, MemoryPages, Track,
};
use rayon::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "NRC activity to aligned track converter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert activity JSON dumps into per-activity track CSV files
    Convert(ConvertArgs),
    /// List running activities with GPS from a dump of listing pages
    Ids(IdsArgs),
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Activity JSON files (as returned with `metrics=ALL`)
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Output directory (`-` writes every track to stdout)
    #[arg(short, long, default_value = "activities", value_hint = ValueHint::DirPath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct IdsArgs {
    /// JSON object mapping each `after_time` cursor to its listing page
    #[arg(value_hint = ValueHint::FilePath)]
    pages: PathBuf,

    /// Start listing after this epoch millisecond
    #[arg(long, default_value_t = 0.0)]
    after_time: f64,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

struct Converted {
    id: String,
    track: Track,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Convert(args) => args.verbose,
        Command::Ids(args) => args.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Convert(args) => handle_convert(args),
        Command::Ids(args) => handle_ids(args),
    }
}

fn handle_convert(args: ConvertArgs) -> Result<()> {
    let results: Vec<(&PathBuf, Result<Option<Converted>>)> = args
        .inputs
        .par_iter()
        .map(|path| (path, convert_file(path)))
        .collect();

    let to_stdout = args.output.as_os_str() == "-";
    if !to_stdout {
        fs::create_dir_all(&args.output)
            .with_context(|| format!("failed to create {}", args.output.display()))?;
    }

    let mut stdout_writer = if to_stdout {
        let mut writer = csv::Writer::from_writer(io::stdout().lock());
        write_header(&mut writer, true)?;
        Some(writer)
    } else {
        None
    };

    let mut failures = 0usize;
    let mut written = 0usize;
    for (path, result) in results {
        let converted = match result {
            Ok(Some(converted)) => converted,
            Ok(None) => continue,
            Err(err) => {
                error!("{}: {:#}", path.display(), err);
                failures += 1;
                continue;
            }
        };
        let outcome = match stdout_writer.as_mut() {
            Some(writer) => write_track_rows(&converted.track, Some(&converted.id), writer),
            None => {
                let out = args
                    .output
                    .join(format!("{}.csv", converted.track.file_stem(&converted.id)));
                write_track_csv(&converted.track, &out).map(|()| {
                    info!(
                        "Wrote {} ({} points): {}",
                        converted.track.name,
                        converted.track.points.len(),
                        out.display()
                    );
                })
            }
        };
        if let Err(err) = outcome {
            error!("{}: {:#}", path.display(), err);
            failures += 1;
            continue;
        }
        written += 1;
    }
    if let Some(mut writer) = stdout_writer {
        writer.flush()?;
    }

    info!("Converted {} of {} activities", written, args.inputs.len());
    if failures > 0 {
        return Err(anyhow!("{} activities failed to convert", failures));
    }
    Ok(())
}

fn convert_file(path: &Path) -> Result<Option<Converted>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let activity = Activity::from_json(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    if !activity.is_running_with_gps() {
        warn!(
            "Skipping {} ({}): not a run with GPS",
            activity.id,
            path.display()
        );
        return Ok(None);
    }
    let track = activity_to_track(&activity)
        .with_context(|| format!("failed to convert activity {}", activity.id))?;
    Ok(Some(Converted {
        id: activity.id,
        track,
    }))
}

fn handle_ids(args: IdsArgs) -> Result<()> {
    let text = fs::read_to_string(&args.pages)
        .with_context(|| format!("failed to read {}", args.pages.display()))?;
    let mut pages = MemoryPages::from_json(&text)
        .with_context(|| format!("failed to parse {}", args.pages.display()))?;
    let ids = collect_running_ids(&mut pages, args.after_time)?;
    info!("got {} ids from {} pages", ids.len(), pages.len());

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for id in &ids {
        writeln!(handle, "{}", id)?;
    }
    Ok(())
}

fn write_track_csv(track: &Track, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    let written = write_header(&mut writer, false)
        .and_then(|()| write_track_rows(track, None, &mut writer))
        .and_then(|()| writer.flush().map_err(Into::into));
    if written.is_err() {
        drop(writer);
        let _ = fs::remove_file(path);
    }
    written.with_context(|| format!("failed to write {}", path.display()))
}

fn write_header<W: Write>(writer: &mut csv::Writer<W>, with_id: bool) -> Result<()> {
    let columns = ["time", "lat", "lon", "elevation", "heart_rate"];
    if with_id {
        writer.write_field("activity_id")?;
    }
    writer.write_record(columns)?;
    Ok(())
}

fn write_track_rows<W: Write>(
    track: &Track,
    activity_id: Option<&str>,
    writer: &mut csv::Writer<W>,
) -> Result<()> {
    for point in &track.points {
        let time =
            epoch_ms_to_utc(point.timestamp_ms)?.to_rfc3339_opts(SecondsFormat::Millis, true);
        if let Some(id) = activity_id {
            writer.write_field(id)?;
        }
        writer.write_record([
            time,
            point.lat.to_string(),
            point.lon.to_string(),
            point.elevation.to_string(),
            point
                .heart_rate
                .map(|v| v.to_string())
                .unwrap_or_else(|| "".into()),
        ])?;
    }
    Ok(())
}
