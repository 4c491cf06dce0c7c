//! `flotilla status` command

use anyhow::Result;

use crate::cli::{GlobalArgs, StatusArgs};
use crate::commands::Session;
use flotilla::ops::{
    collect_status, configuration_package, resolve_selection, validate_selection,
    SelectionOptions, StatusReport, StatusResult,
};

/// Print the status report. Returns the process exit code.
pub fn execute(args: StatusArgs, global: &GlobalArgs) -> Result<i32> {
    let mut session = Session::open(global)?;
    let selection_opts = SelectionOptions::new(session.ctx.cwd());
    let selection = resolve_selection(&mut session.ws, &args.selectors, &selection_opts)?;
    validate_selection(&args.selectors, &selection)?;

    let color = session.shell.use_color();
    let mut result = StatusResult::default();

    if args.config.unwrap_or(args.selectors.is_empty()) {
        if let Some(record) = configuration_package(&session.ws)? {
            session.shell.note("status of the workspace configuration");
            let mut report = StatusReport::new();
            report.add(&record, args.local);
            let report = report.finish();
            print!("{}", report.render(color));
            result = result | report.result();
        }
    }

    session.shell.note("status of packages");
    let report = collect_status(&session.ws, selection.packages(), args.local);
    print!("{}", report.render(color));
    result = result | report.result();

    Ok(if args.exit_code { result.exit_code() } else { 0 })
}
