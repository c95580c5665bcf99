//! Offer feed CLI
//!
//! Command-line tool for converting marketplace offer exports into XML feeds.

use clap::{Parser, Subcommand};
use feed_core::profile::BUILTIN;
use feed_core::{
    convert_directory, load_validated, postprocess_file, ColumnNames, PhraseHeaderDetector,
    RetailerProfile,
};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "feed-cli")]
#[command(about = "Convert offer spreadsheets into XML offer feeds", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every export in a directory
    Convert {
        /// Directory holding .xlsx/.xls/.csv exports
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for the generated feeds
        #[arg(short, long)]
        output: PathBuf,

        /// Built-in profile (repeatable, defaults to "base")
        #[arg(short, long)]
        profile: Vec<String>,

        /// Profile loaded from a JSON file (repeatable)
        #[arg(long)]
        profile_file: Vec<PathBuf>,

        /// Write the batch report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show how a single export is read
    Inspect {
        /// Path to the export
        #[arg(short, long)]
        file: PathBuf,

        /// Number of records to print
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },

    /// Re-run a profile's rules on an existing feed
    Postprocess {
        /// Feed to read
        #[arg(short, long)]
        input: PathBuf,

        /// Feed to write (may equal the input)
        #[arg(short, long)]
        output: PathBuf,

        /// Built-in profile name
        #[arg(short, long, conflicts_with = "profile_file")]
        profile: Option<String>,

        /// Profile loaded from a JSON file
        #[arg(long)]
        profile_file: Option<PathBuf>,
    },

    /// List built-in profiles or dump one as JSON
    Profiles {
        /// Profile to write out
        #[arg(long, requires = "output")]
        dump: Option<String>,

        /// Destination for --dump
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> feed_core::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Convert {
            input,
            output,
            profile,
            profile_file,
            report,
        } => cmd_convert(&input, &output, &profile, &profile_file, report.as_deref()),
        Commands::Inspect { file, limit } => cmd_inspect(&file, limit),
        Commands::Postprocess {
            input,
            output,
            profile,
            profile_file,
        } => cmd_postprocess(&input, &output, profile.as_deref(), profile_file.as_deref()),
        Commands::Profiles { dump, output } => cmd_profiles(dump.as_deref(), output.as_deref()),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_profiles(
    names: &[String],
    files: &[PathBuf],
) -> feed_core::Result<Vec<RetailerProfile>> {
    let mut profiles = names
        .iter()
        .map(|name| RetailerProfile::builtin(name))
        .collect::<feed_core::Result<Vec<_>>>()?;
    for path in files {
        profiles.push(RetailerProfile::load(path)?);
    }
    if profiles.is_empty() {
        profiles.push(RetailerProfile::base());
    }
    debug!(
        profiles = ?profiles.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        "profiles resolved"
    );
    Ok(profiles)
}

fn cmd_convert(
    input: &Path,
    output: &Path,
    names: &[String],
    files: &[PathBuf],
    report_path: Option<&Path>,
) -> feed_core::Result<()> {
    let profiles = resolve_profiles(names, files)?;
    let report = convert_directory(input, output, &profiles)?;

    println!(
        "Converted {} file(s) with {} profile(s):",
        report.files.len(),
        profiles.len()
    );
    for file in &report.files {
        let status = if file.missing_columns.is_empty() {
            format!("{} offers, {} available", file.offers, file.available)
        } else {
            format!("EMPTY (missing: {})", file.missing_columns.join(", "))
        };
        println!("  [{}] {} -> {}", file.profile, file.input.display(), file.output.display());
        println!("      {}", status);
        if file.skipped > 0 {
            println!("      {} row(s) skipped", file.skipped);
        }
    }

    if !report.errors.is_empty() {
        println!();
        println!("Errors ({}):", report.errors.len());
        for (path, error) in &report.errors {
            println!("  {}: {}", path.display(), error);
        }
    }

    println!();
    println!("Total offers written: {}", report.offers_written());

    if let Some(path) = report_path {
        report.save(path)?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}

fn cmd_inspect(file: &Path, limit: usize) -> feed_core::Result<()> {
    let names = ColumnNames::default();
    let detector = PhraseHeaderDetector::default();
    let outcome = load_validated(file, &names, &detector)?;
    let table = &outcome.table;

    println!("File: {}", file.display());
    println!("Layout: {}", table.layout);
    println!("Read mode: {:?}", outcome.mode);
    println!("Header row: {}", table.header_row + 1);
    println!("Records: {}", table.record_count());
    println!();

    println!("Columns ({}):", table.column_count());
    for column in &table.columns {
        println!("  [{}] {}", column.index, column.name);
    }

    if outcome.is_valid() {
        println!();
        println!("All required columns present");
    } else {
        println!();
        println!("Missing required columns:");
        for name in &outcome.missing {
            println!("  {}", name);
        }
    }

    println!();
    let headers = table.headers();
    println!("{}", headers.join("\t"));
    println!("{}", "-".repeat(headers.len() * 12));
    for record in table.records.iter().take(limit) {
        let values: Vec<&str> = record.iter().map(|(_, value)| value).collect();
        println!("{}", values.join("\t"));
    }
    if table.record_count() > limit {
        println!("... ({} more rows)", table.record_count() - limit);
    }

    Ok(())
}

fn cmd_postprocess(
    input: &Path,
    output: &Path,
    name: Option<&str>,
    file: Option<&Path>,
) -> feed_core::Result<()> {
    let profile = match (name, file) {
        (_, Some(path)) => RetailerProfile::load(path)?,
        (Some(name), None) => RetailerProfile::builtin(name)?,
        (None, None) => RetailerProfile::base(),
    };

    let report = postprocess_file(input, output, &profile)?;

    println!(
        "Applied {} rule(s) of profile '{}' to {} offer(s)",
        profile.rules.len(),
        profile.name,
        report.offers
    );
    println!("  {} offer(s) changed", report.changed);
    println!("  Written to {}", output.display());

    Ok(())
}

fn cmd_profiles(dump: Option<&str>, output: Option<&Path>) -> feed_core::Result<()> {
    if let (Some(name), Some(path)) = (dump, output) {
        let profile = RetailerProfile::builtin(name)?;
        profile.save(path)?;
        println!("Profile '{}' written to {}", name, path.display());
        return Ok(());
    }

    println!("Built-in profiles ({}):", BUILTIN.len());
    for name in BUILTIN {
        let profile = RetailerProfile::builtin(name)?;
        println!(
            "  {:<8} {:<22} {} rule(s)",
            profile.name,
            profile.output_file,
            profile.rules.len()
        );
    }

    Ok(())
}
