use anyhow::Result;

use tome_sync::pin_sources;

use crate::commands::{ExitStatus, GlobalArgs};
use crate::printer;
use crate::SourcesArgs;

pub(crate) fn pin(args: SourcesArgs, globals: GlobalArgs) -> Result<ExitStatus> {
    let filter = (!args.sources.is_empty()).then_some(args.sources.as_slice());
    let pinned = pin_sources(&globals.sync_options(), filter)?;

    if args.json {
        printer::json(&pinned);
    } else if pinned.is_empty() {
        printer::stdout("nothing to pin: no locked sources changed");
    } else {
        for id in &pinned {
            printer::stdout(&format!("  pinned {id}"));
        }
    }

    Ok(ExitStatus::Success)
}
