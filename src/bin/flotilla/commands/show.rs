//! `flotilla show` command

use anyhow::Result;

use crate::cli::{GlobalArgs, ShowArgs};
use crate::commands::Session;
use flotilla::ops::show;

pub fn execute(args: ShowArgs, global: &GlobalArgs) -> Result<()> {
    let mut session = Session::open(global)?;
    let infos = show(&mut session.ws, &args.selectors, session.ctx.cwd())?;

    let color = session.shell.use_color();
    let blocks: Vec<String> = infos.iter().map(|info| info.render(color)).collect();
    print!("{}", blocks.join("\n"));

    Ok(())
}
