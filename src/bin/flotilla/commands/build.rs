//! `flotilla build` command

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use inquire::InquireError;

use crate::cli::{BuildArgs, GlobalArgs};
use crate::commands::Session;
use flotilla::ops::{
    build, import_packages, resolve_selection, validate_selection, BuildMode, BuildOptions,
    ImportOptions, PlanPrinter, SelectionOptions,
};
use flotilla::util::Status;

pub fn execute(args: BuildArgs, global: &GlobalArgs) -> Result<()> {
    let mut session = Session::open(global)?;
    if args.osdeps {
        tracing::warn!("--osdeps is not supported, operating system dependencies are left alone");
    }

    let selection_opts = SelectionOptions::new(session.ctx.cwd());
    let mut selection = resolve_selection(&mut session.ws, &args.selectors, &selection_opts)?;
    validate_selection(&args.selectors, &selection)?;

    // Building never updates existing checkouts, it only fetches what is missing
    let import_opts = ImportOptions {
        only_local: session.config.only_local(),
        only_checkout: true,
    };
    let mut progress = session.import_progress();
    let enabled = import_packages(&mut session.ws, &mut selection, &import_opts, &mut progress)?;
    progress.finish();

    let selected: BTreeSet<String> = selection.packages().map(str::to_string).collect();

    let opts = BuildOptions {
        mode: BuildMode::from_flags(args.force, args.rebuild),
        with_depends: args.with_depends || session.config.with_depends(),
        deps: args.deps().unwrap_or_else(|| session.config.deps()),
        whole_workspace: args.selectors.is_empty(),
    };
    let mut confirm = ask;
    let mut printer = PlanPrinter::new(session.shell.is_json());
    let plan = build(
        &mut session.ws,
        &selected,
        &enabled,
        &opts,
        &mut confirm,
        &mut printer,
    )?;

    session.shell.status(
        Status::Finished,
        format!("{} build of {} packages", plan.mode, plan.packages.len()),
    );
    Ok(())
}

/// Ask a yes/no question on the terminal.
///
/// Without a terminal the default answer is taken.
fn ask(question: &str, default: bool) -> Result<bool> {
    match inquire::Confirm::new(question).with_default(default).prompt() {
        Ok(answer) => Ok(answer),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(false),
        Err(InquireError::NotTTY) => {
            tracing::warn!(
                "no terminal to answer \"{}\", assuming {}",
                question,
                if default { "yes" } else { "no" }
            );
            Ok(default)
        }
        Err(e) => Err(e).context("failed to read the answer"),
    }
}
