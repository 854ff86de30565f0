use anyhow::Result;

use tome_sync::{update_sources, SyncDeps};

use crate::commands::{ExitStatus, GlobalArgs};
use crate::printer;
use crate::SourcesArgs;

pub(crate) async fn update(args: SourcesArgs, globals: GlobalArgs) -> Result<ExitStatus> {
    let options = globals.sync_options();
    let deps = SyncDeps::production()?;
    let ids = (!args.sources.is_empty()).then_some(args.sources);

    let report = update_sources(&options, &deps, ids).await?;

    if args.json {
        printer::json(&report);
    } else {
        super::sync::render(&report);
    }

    Ok(if report.success() {
        ExitStatus::Success
    } else {
        ExitStatus::Failure
    })
}
