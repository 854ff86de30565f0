use anyhow::Result;

use tome_sync::{clean_cache, clean_git_cache, default_git_store};

use crate::commands::{ExitStatus, GlobalArgs};
use crate::printer;
use crate::CleanArgs;

pub(crate) fn clean(args: CleanArgs, globals: GlobalArgs) -> Result<ExitStatus> {
    let removal = if args.git {
        let store = default_git_store()?;
        let removal = clean_git_cache(&store)?;
        printer::stdout(&format!("removed git store at {}", store.root().display()));
        removal
    } else {
        clean_cache(&globals.sync_options())?
    };

    printer::stdout(&format!(
        "removed {} files ({} bytes)",
        removal.files, removal.bytes
    ));
    Ok(ExitStatus::Success)
}
