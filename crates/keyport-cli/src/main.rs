//! `keyport`: convert an exported password vault and print what it holds.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

mod cli_args;
mod report;

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use keyport_vault::{convert, ImportFormat, ImportOptions};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use cli_args::Args;
use report::{render_tree, render_warnings, Summary};

fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_logging(args.log_file.as_deref())?;

    if let Err(e) = keyport_crypto_core::disable_core_dumps() {
        tracing::warn!("could not disable core dumps: {e}");
    }

    let format = match args.format {
        Some(format) => format,
        None => ImportFormat::detect(&args.path)
            .with_context(|| format!("cannot guess the format of {}", args.path.display()))?,
    };
    let options = args
        .config
        .as_deref()
        .map_or_else(ImportOptions::default, ImportOptions::load);
    let password = read_password(&args)?;

    tracing::info!(%format, path = %args.path.display(), "importing");
    let report = convert(format, &args.path, password.as_ref().map(|p| p.as_str()), &options)
        .with_context(|| format!("{format} import of {} failed", args.path.display()))?;
    drop(password);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        let summary = Summary::new(format, &report);
        serde_json::to_writer_pretty(&mut out, &summary)?;
        writeln!(out)?;
    } else {
        write!(out, "{}", render_tree(&report.database))?;
        writeln!(
            out,
            "{} entries imported from {}",
            report.database.entry_count(),
            args.path.display()
        )?;
        if !report.warnings.is_empty() {
            write!(io::stderr(), "{}", render_warnings(&report.warnings))?;
        }
    }
    Ok(())
}

/// Logs go to stderr, or to `log_file` through a non-blocking writer. The
/// returned guard flushes the file writer on drop.
fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_timer(UtcTime::rfc_3339())
        .with_env_filter(filter);

    let Some(path) = log_file else {
        builder.with_writer(io::stderr).init();
        return Ok(None);
    };
    let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let Some(name) = path.file_name() else {
        bail!("--log-file must name a file: {}", path.display());
    };
    let appender = tracing_appender::rolling::never(dir, name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    builder.with_writer(writer).with_ansi(false).init();
    Ok(Some(guard))
}

fn read_password(args: &Args) -> Result<Option<Zeroizing<String>>> {
    if let Some(var) = &args.password_env {
        let value = std::env::var(var)
            .with_context(|| format!("environment variable {var} is not set"))?;
        return Ok(Some(Zeroizing::new(value)));
    }
    if args.password_stdin {
        let mut line = Zeroizing::new(String::new());
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("cannot read the password from standard input")?;
        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        return Ok(Some(line));
    }
    Ok(None)
}
