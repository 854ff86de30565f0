use std::time::Duration;

use anyhow::Result;

use tome_sync::{run_sync, SourceAction, SyncDeps, SyncReport};

use crate::commands::{ExitStatus, GlobalArgs};
use crate::printer;
use crate::SyncArgs;

pub(crate) async fn sync(args: SyncArgs, globals: GlobalArgs) -> Result<ExitStatus> {
    let mut options = globals.sync_options();
    options.offline = args.offline;
    options.fail_on_miss = args.fail_on_miss;
    options.lock_only = args.lock_only;
    options.frozen = args.frozen;
    options.concurrency = args.concurrency;
    if let Some(timeout_ms) = args.timeout_ms {
        options.timeout = Duration::from_millis(timeout_ms);
    }
    if !args.sources.is_empty() {
        options.source_filter = Some(args.sources.clone());
    }

    let deps = SyncDeps::production()?;
    let report = run_sync(&options, &deps).await?;

    if args.json {
        printer::json(&report);
    } else {
        render(&report);
    }

    Ok(if report.success() {
        ExitStatus::Success
    } else {
        ExitStatus::Failure
    })
}

pub(crate) fn render(report: &SyncReport) {
    for result in &report.results {
        let commit = result
            .commit
            .as_deref()
            .map(|commit| &commit[..commit.len().min(12)])
            .unwrap_or("-");
        match result.action {
            SourceAction::Synced => printer::stdout(&format!(
                "  synced   {} @ {commit} ({} files, {} bytes)",
                result.id, result.file_count, result.bytes
            )),
            SourceAction::Skipped => {
                printer::stdout(&format!("  ok       {} @ {commit}", result.id));
            }
            SourceAction::LockOnly => {
                printer::stdout(&format!("  locked   {} @ {commit}", result.id));
            }
            SourceAction::Failed => {
                let detail = result.error.as_deref().unwrap_or("unknown error");
                if result.required {
                    printer::stdout(&format!("  failed   {}: {detail}", result.id));
                } else {
                    printer::warning(&format!("optional source `{}` failed: {detail}", result.id));
                }
            }
        }
    }
    if !report.lock_written {
        printer::warning("lockfile not updated because a required source failed");
    }
}
