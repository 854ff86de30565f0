use anyhow::Result;
use serde::Serialize;

use tome_sync::{get_sync_plan, SourceStatus, SyncDeps};

use crate::commands::{ExitStatus, GlobalArgs};
use crate::printer;
use crate::StatusArgs;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusLine {
    id: String,
    status: SourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    locked_commit: Option<String>,
}

pub(crate) async fn status(args: StatusArgs, globals: GlobalArgs) -> Result<ExitStatus> {
    let mut options = globals.sync_options();
    options.offline = args.offline;

    let deps = SyncDeps::production()?;
    let plan = get_sync_plan(&options, &deps).await?;

    let lines = plan
        .sources
        .iter()
        .map(|planned| StatusLine {
            id: planned.source.id.as_str().to_string(),
            status: planned.status,
            commit: planned.resolved_commit.clone(),
            locked_commit: planned
                .locked
                .as_ref()
                .map(|entry| entry.resolved_commit.clone()),
        })
        .collect::<Vec<_>>();

    if args.json {
        printer::json(&lines);
    } else {
        for line in &lines {
            let label = match line.status {
                SourceStatus::UpToDate => "up-to-date",
                SourceStatus::Changed => "changed",
                SourceStatus::Missing => "missing",
            };
            let commit = line.commit.as_deref().unwrap_or("-");
            printer::stdout(&format!(
                "  {label:<10} {} @ {}",
                line.id,
                &commit[..commit.len().min(12)]
            ));
        }
    }

    Ok(ExitStatus::Success)
}
