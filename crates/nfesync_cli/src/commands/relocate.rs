//! `relocate` command: rename legacy sequence-named files.
//!
//! Older deployments stored documents under their feed sequence number.
//! Each `.xml` file in the source directory is parsed, given the name the
//! classifier would derive today, and moved into the taxpayer directory.
//! Nothing changes unless `execute` is set.

use super::Status;
use crate::context::Context;
use crate::error::{CliError, CliResult};
use nfesync_engine::{Clock, DistributionTransport};
use nfesync_protocol::{file_base_name, infer_schema, xml};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Counters of a relocation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelocationSummary {
    /// Files moved, or that would be moved in a dry run.
    pub moved: usize,
    /// Files whose target name is already stored.
    pub skipped: usize,
    /// Files that could not be read or parsed.
    pub failed: usize,
}

fn legacy_files(source: &Path) -> CliResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(source).map_err(|e| CliError::io(source, e))? {
        let path = entry.map_err(|e| CliError::io(source, e))?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("xml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Relocates the files in `source` for taxpayer `name`.
pub fn run<T, C>(
    ctx: &Context<T, C>,
    name: &str,
    source: &Path,
    execute: bool,
    out: &mut dyn Write,
) -> CliResult<Status>
where
    T: DistributionTransport,
    C: Clock,
{
    let summary = relocate(ctx, name, source, execute, out)?;
    writeln!(
        out,
        "{} {}, {} skipped, {} failed{}",
        summary.moved,
        if execute { "moved" } else { "to move" },
        summary.skipped,
        summary.failed,
        if execute { "" } else { " (dry run, pass --execute to apply)" }
    )?;
    Ok(Status::Success)
}

/// Performs the pass and returns its counters.
pub fn relocate<T, C>(
    ctx: &Context<T, C>,
    name: &str,
    source: &Path,
    execute: bool,
    out: &mut dyn Write,
) -> CliResult<RelocationSummary>
where
    T: DistributionTransport,
    C: Clock,
{
    let taxpayer = ctx.taxpayer(name)?;
    let store = ctx.store();
    let mut summary = RelocationSummary::default();

    for path in legacy_files(source)? {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read legacy file");
                summary.failed += 1;
                continue;
            }
        };
        let name = xml::parse(&text).and_then(|doc| {
            let schema = infer_schema(doc.root_element().tag_name().name());
            file_base_name(&doc, schema, &stem).validated()
        });
        let target = match name {
            Ok(name) => format!("{}.xml", name.base_name),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot name legacy file");
                writeln!(out, "  {file_name}: unreadable, left in place")?;
                summary.failed += 1;
                continue;
            }
        };

        if store.exists(&taxpayer.id, &target) {
            writeln!(out, "  {file_name} -> {target} (already stored, skipped)")?;
            summary.skipped += 1;
            continue;
        }

        writeln!(out, "  {file_name} -> {target}")?;
        summary.moved += 1;
        if !execute {
            continue;
        }

        store.save(&taxpayer.id, &target, &xml::with_declaration(&text))?;
        if let Err(e) = fs::remove_file(&path) {
            warn!(path = %path.display(), error = %e, "relocated file could not be removed");
        }
    }

    Ok(summary)
}
