//! `flotilla update` command

use anyhow::Result;

use crate::cli::{GlobalArgs, UpdateArgs};
use crate::commands::Session;
use flotilla::ops::{
    resolve_selection, update, update_configuration, validate_selection, ConfigUpdate,
    ImportOptions, SelectionOptions, UpdateOptions,
};
use flotilla::util::Status;

pub fn execute(args: UpdateArgs, global: &GlobalArgs) -> Result<()> {
    let mut session = Session::open(global)?;
    if args.osdeps {
        tracing::warn!("--osdeps is not supported, operating system dependencies are left alone");
    }

    let only_local = args.local || session.config.only_local();

    // The configuration goes first so that packages are imported with the
    // updated definitions
    let update_config = args.config.unwrap_or(args.selectors.is_empty());
    if update_config && !args.checkout {
        let span = session.shell.span(Status::Importing, "workspace configuration");
        match update_configuration(&session.ws, only_local)? {
            ConfigUpdate::Updated => {
                span.finish_with_message("updated workspace configuration");
                session.reload()?;
            }
            ConfigUpdate::NotVersioned => {
                drop(span);
                tracing::info!("workspace configuration is not versioned, leaving it alone");
            }
        }
    }

    let selection_opts = SelectionOptions::new(session.ctx.cwd());
    let mut selection = resolve_selection(&mut session.ws, &args.selectors, &selection_opts)?;
    validate_selection(&args.selectors, &selection)?;

    let opts = UpdateOptions {
        import: ImportOptions {
            only_local,
            only_checkout: args.checkout,
        },
        deps: args.deps().unwrap_or(true),
    };
    let mut progress = session.import_progress();
    let enabled = update(&mut session.ws, &mut selection, &opts, &mut progress)?;
    progress.finish();

    session
        .shell
        .status(Status::Updated, format!("{} packages", enabled.len()));
    Ok(())
}
