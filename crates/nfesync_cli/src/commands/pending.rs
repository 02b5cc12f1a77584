//! `pending` command: summaries still waiting for their complete form.

use super::Status;
use crate::context::Context;
use crate::error::CliResult;
use nfesync_engine::{Clock, DistributionTransport};
use std::io::Write;

/// Lists pending summaries for `name`, or for every taxpayer.
pub fn run<T, C>(ctx: &Context<T, C>, name: Option<&str>, out: &mut dyn Write) -> CliResult<Status>
where
    T: DistributionTransport,
    C: Clock,
{
    let taxpayers = match name {
        Some(name) => vec![ctx.taxpayer(name)?],
        None => ctx.taxpayers()?,
    };

    for taxpayer in taxpayers {
        let pending = ctx.store().list_pending_summaries(&taxpayer.id)?;
        writeln!(
            out,
            "{} ({}): {} pending summar{}",
            taxpayer.name,
            taxpayer.id,
            pending.len(),
            if pending.len() == 1 { "y" } else { "ies" }
        )?;
        for key in pending {
            writeln!(out, "  {key}")?;
        }
    }
    Ok(Status::Success)
}
