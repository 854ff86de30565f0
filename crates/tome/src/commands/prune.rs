use anyhow::Result;

use tome_sync::prune_cache;

use crate::commands::{ExitStatus, GlobalArgs};
use crate::printer;
use crate::JsonArgs;

pub(crate) fn prune(args: JsonArgs, globals: GlobalArgs) -> Result<ExitStatus> {
    let report = prune_cache(&globals.sync_options())?;

    if args.json {
        printer::json(&report);
    } else if report.removed.is_empty() {
        printer::stdout("nothing to prune");
    } else {
        for path in &report.removed {
            printer::stdout(&format!("  removed {}", path.display()));
        }
        printer::stdout(&format!("reclaimed {} bytes", report.reclaimed_bytes));
    }

    Ok(ExitStatus::Success)
}
