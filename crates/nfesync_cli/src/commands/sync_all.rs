//! `sync-all` command: every configured taxpayer, one after another.

use super::sync::sync_taxpayer;
use super::Status;
use crate::context::Context;
use crate::error::CliResult;
use nfesync_engine::{Clock, DistributionTransport};
use std::io::Write;
use tracing::error;

/// Runs the feed for each taxpayer in name order.
///
/// A blocked, rejected or failed taxpayer does not stop the others. The
/// returned status is the worst seen; a failure counts as rejected.
pub fn run<T, C>(ctx: &Context<T, C>, out: &mut dyn Write) -> CliResult<Status>
where
    T: DistributionTransport,
    C: Clock,
{
    let mut worst = Status::Success;
    let mut failures = 0usize;

    for taxpayer in ctx.taxpayers()? {
        writeln!(out, "=== {} ===", taxpayer.name)?;
        let status = match sync_taxpayer(ctx, &taxpayer, None, out) {
            Ok(status) => status,
            Err(e) => {
                error!(taxpayer = %taxpayer.id, error = %e, "sync failed");
                writeln!(out, "  error: {e}")?;
                failures += 1;
                Status::Rejected
            }
        };
        worst = worst.max(status);
    }

    if failures > 0 {
        writeln!(out, "{failures} taxpayer(s) failed")?;
    }
    Ok(worst)
}
