use anyhow::Result;

use tome_sync::{verify_cache, VerifyStatus};

use crate::commands::{ExitStatus, GlobalArgs};
use crate::printer;
use crate::JsonArgs;

pub(crate) fn verify(args: JsonArgs, globals: GlobalArgs) -> Result<ExitStatus> {
    let report = verify_cache(&globals.sync_options())?;

    if args.json {
        printer::json(&report);
    } else {
        for entry in &report.entries {
            match &entry.status {
                VerifyStatus::Ok => printer::stdout(&format!("  ok       {}", entry.id)),
                VerifyStatus::NotLocked => {
                    printer::stdout(&format!("  unlocked {}", entry.id));
                }
                VerifyStatus::MissingCache => {
                    printer::stdout(&format!("  missing  {}", entry.id));
                }
                VerifyStatus::Drifted { expected, actual } => printer::stdout(&format!(
                    "  drifted  {} (locked {}, found {})",
                    entry.id,
                    &expected[..expected.len().min(12)],
                    &actual[..actual.len().min(12)]
                )),
            }
        }
    }

    Ok(if report.ok() {
        ExitStatus::Success
    } else {
        ExitStatus::Failure
    })
}
