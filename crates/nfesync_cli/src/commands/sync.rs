//! `sync` command: run the distribution feed for one taxpayer, or look up
//! a single document by access key.

use super::Status;
use crate::context::Context;
use crate::error::CliResult;
use nfesync_engine::{
    record_cancellation, CancellationOutcome, Clock, DistributionTransport, SyncOutcome,
    SyncReport, SyncedDocument,
};
use nfesync_protocol::{AccessKey, DocumentKind, Taxpayer};
use std::io::Write;
use tracing::warn;

/// Options of the `sync` command.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Start from this sequence instead of the persisted one.
    pub start_sequence: Option<u64>,
    /// Reset the persisted sequence to 0 first.
    pub reset_sequence: bool,
    /// Look up this access key instead of running the feed.
    pub key: Option<String>,
}

/// Runs the sync command.
pub fn run<T, C>(
    ctx: &Context<T, C>,
    name: &str,
    options: &SyncOptions,
    out: &mut dyn Write,
) -> CliResult<Status>
where
    T: DistributionTransport,
    C: Clock,
{
    let taxpayer = ctx.taxpayer(name)?;

    if let Some(raw_key) = &options.key {
        let key = AccessKey::parse(raw_key)?;
        return lookup(ctx, &taxpayer, &key, out);
    }

    if options.reset_sequence {
        let mut state = ctx.state_file.load()?;
        state.reset_last_sequence(&taxpayer.id, taxpayer.environment);
        ctx.state_file.save(&state)?;
        writeln!(out, "NSU reset to 0 for {} [{}]", taxpayer.name, taxpayer.environment)?;
    }

    sync_taxpayer(ctx, &taxpayer, options.start_sequence, out)
}

/// Runs the feed loop for one taxpayer and prints the report.
pub fn sync_taxpayer<T, C>(
    ctx: &Context<T, C>,
    taxpayer: &Taxpayer,
    start_sequence: Option<u64>,
    out: &mut dyn Write,
) -> CliResult<Status>
where
    T: DistributionTransport,
    C: Clock,
{
    let mut state = ctx.state_file.load()?;
    let from = start_sequence
        .unwrap_or_else(|| state.last_sequence(&taxpayer.id, taxpayer.environment));
    writeln!(
        out,
        "{} ({}) [{}] from NSU {from}",
        taxpayer.name, taxpayer.id, taxpayer.environment
    )?;

    let mut progress_error = None;
    let result = ctx.engine.sync(taxpayer, &mut state, start_sequence, |p| {
        if let Err(e) = writeln!(
            out,
            "  page {}: {} document(s), NSU {}/{}",
            p.page, p.documents, p.last_sequence, p.max_sequence
        ) {
            progress_error.get_or_insert(e);
        }
    });

    let status = match result {
        Ok(SyncOutcome::Blocked(block)) => {
            writeln!(out, "  {}", block.message())?;
            Status::Blocked
        }
        Ok(SyncOutcome::Completed(report)) => {
            print_report(ctx, taxpayer, &report, out)?;
            if report.is_success() {
                Status::Success
            } else {
                Status::Rejected
            }
        }
        Err(err) => {
            if let Some(partial) = err.partial_report() {
                writeln!(out, "  interrupted, partial results follow")?;
                print_report(ctx, taxpayer, partial, out)?;
            }
            return Err(err.into());
        }
    };

    match progress_error {
        Some(e) => Err(e.into()),
        None => Ok(status),
    }
}

fn print_report<T, C>(
    ctx: &Context<T, C>,
    taxpayer: &Taxpayer,
    report: &SyncReport,
    out: &mut dyn Write,
) -> CliResult<()>
where
    T: DistributionTransport,
    C: Clock,
{
    writeln!(
        out,
        "  status: {} - {}",
        report.status_code().unwrap_or("(none)"),
        report.message.as_deref().unwrap_or("")
    )?;
    writeln!(
        out,
        "  NSU: last {} / max {} ({} page(s))",
        report.last_sequence, report.max_sequence, report.pages
    )?;

    for (index, response) in report.responses.iter().enumerate() {
        let reference = format!("{}-p{:03}", taxpayer.id, index + 1);
        if let Some(path) = ctx.save_response("dist-dfe", &reference, response) {
            writeln!(out, "  response saved: {}", path.display())?;
        }
    }

    for document in &report.documents {
        print_document(document, out)?;
    }

    if let Some(until) = report.cooldown_until {
        writeln!(out, "  cooldown armed until {}", until.format("%Y-%m-%d %H:%M:%S"))?;
    }

    print_pending(ctx, taxpayer, out)
}

/// One line per document.
pub(crate) fn print_document(document: &SyncedDocument, out: &mut dyn Write) -> CliResult<()> {
    match document {
        SyncedDocument::Stored {
            document,
            path,
            replaced_summary,
        } => {
            let label = match (document.kind(), replaced_summary) {
                (DocumentKind::Complete, true) => "complete (replaced summary)",
                (DocumentKind::Complete, false) => "complete",
                (DocumentKind::Summary, _) => "summary",
                (DocumentKind::Event, _) => "event",
                (DocumentKind::Other, _) => "other",
            };
            let name = match &document.access_key {
                Some(key) => format!("key={key}"),
                None => format!("name={}", document.base_name),
            };
            writeln!(out, "  {label} {name} -> {}", path.display())?;
        }
        SyncedDocument::Failed(failed) => {
            writeln!(
                out,
                "  NSU {} ({}) - ERROR {}",
                failed.sequence, failed.schema, failed.error
            )?;
        }
    }
    Ok(())
}

fn print_pending<T, C>(
    ctx: &Context<T, C>,
    taxpayer: &Taxpayer,
    out: &mut dyn Write,
) -> CliResult<()>
where
    T: DistributionTransport,
    C: Clock,
{
    match ctx.store().list_pending_summaries(&taxpayer.id) {
        Ok(pending) if pending.is_empty() => Ok(()),
        Ok(pending) => {
            writeln!(out, "  pending summaries ({}):", pending.len())?;
            for key in pending {
                writeln!(out, "    {key}")?;
            }
            Ok(())
        }
        Err(e) => {
            warn!(taxpayer = %taxpayer.id, error = %e, "cannot list pending summaries");
            Ok(())
        }
    }
}

fn lookup<T, C>(
    ctx: &Context<T, C>,
    taxpayer: &Taxpayer,
    key: &AccessKey,
    out: &mut dyn Write,
) -> CliResult<Status>
where
    T: DistributionTransport,
    C: Clock,
{
    writeln!(
        out,
        "{} ({}) [{}] lookup {key}",
        taxpayer.name, taxpayer.id, taxpayer.environment
    )?;

    let lookup = ctx.engine.fetch_by_key(taxpayer, key)?;
    if let Some(path) = ctx.save_response("dist-dfe-chave", key.as_str(), &lookup.response) {
        writeln!(out, "  response saved: {}", path.display())?;
    }
    writeln!(
        out,
        "  status: {} - {}",
        lookup.status.as_ref().map_or("(none)", |s| s.as_str()),
        lookup.message.as_deref().unwrap_or("")
    )?;
    for document in &lookup.documents {
        print_document(document, out)?;
    }

    let Some(response) = lookup.cancellation.as_deref() else {
        return Ok(if lookup.is_success() {
            Status::Success
        } else {
            Status::Rejected
        });
    };

    let record = record_cancellation(ctx.store(), &taxpayer.id, key, response)?;
    writeln!(out, "  canceled, record saved: {}", record.record.display())?;
    match record.outcome {
        Some(CancellationOutcome::SummaryRemoved) => writeln!(out, "  summary removed")?,
        Some(CancellationOutcome::Renamed(path)) => {
            writeln!(out, "  stored document renamed to {}", path.display())?
        }
        Some(CancellationOutcome::NotStored) => writeln!(out, "  no stored document")?,
        None => writeln!(out, "  transition failed, see log")?,
    }
    Ok(Status::Success)
}
