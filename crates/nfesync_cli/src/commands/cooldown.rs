//! `cooldown-reset` command: manual override of an armed cooldown.

use super::Status;
use crate::context::Context;
use crate::error::CliResult;
use nfesync_engine::{Clock, DistributionTransport};
use std::io::Write;
use tracing::info;

/// Clears the cooldown of `name` in its current environment.
pub fn run<T, C>(ctx: &Context<T, C>, name: &str, out: &mut dyn Write) -> CliResult<Status>
where
    T: DistributionTransport,
    C: Clock,
{
    let taxpayer = ctx.taxpayer(name)?;
    let mut state = ctx.state_file.load()?;

    match state.clear_cooldown(&taxpayer.id, taxpayer.environment) {
        Some(until) => {
            ctx.state_file.save(&state)?;
            info!(taxpayer = %taxpayer.id, environment = %taxpayer.environment, %until, "cooldown cleared");
            writeln!(
                out,
                "cooldown cleared for {} [{}] (was until {})",
                taxpayer.name,
                taxpayer.environment,
                until.format("%Y-%m-%d %H:%M:%S")
            )?;
        }
        None => writeln!(
            out,
            "no cooldown set for {} [{}]",
            taxpayer.name, taxpayer.environment
        )?,
    }
    Ok(Status::Success)
}
