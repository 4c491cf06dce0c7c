//! Command implementations

pub mod build;
pub mod completions;
pub mod show;
pub mod status;
pub mod update;

use std::sync::Arc;

use anyhow::Result;

use crate::cli::{GlobalArgs, MessageFormat};
use flotilla::core::Workspace;
use flotilla::util::{ColorChoice, Config, GlobalContext, Shell};

/// State shared by the commands that run inside a workspace.
pub struct Session {
    pub ctx: GlobalContext,
    pub ws: Workspace,
    pub config: Config,
    pub shell: Arc<Shell>,
}

impl Session {
    /// Find and load the workspace, then the user configuration for it.
    pub fn open(global: &GlobalArgs) -> Result<Self> {
        let ctx = GlobalContext::new()?.with_workspace_dir(global.workspace.clone());
        let ws = ctx.load_workspace()?;
        let config = ctx.load_config(ws.root());

        // An explicit --color beats the configured one
        let color = match (global.color, config.color()) {
            (ColorChoice::Auto, Some(configured)) => configured,
            (flag, _) => flag,
        };
        let shell = Arc::new(Shell::from_flags(
            global.quiet,
            global.verbose,
            color,
            global.message_format == MessageFormat::Json,
        ));

        Ok(Session {
            ctx,
            ws,
            config,
            shell,
        })
    }

    /// Load the workspace definition again, e.g. after updating it.
    pub fn reload(&mut self) -> Result<()> {
        self.ws = self.ctx.load_workspace()?;
        Ok(())
    }

    /// Progress display for imports, honoring `[ui] progress`.
    pub fn import_progress(&self) -> flotilla::util::Progress {
        let progress = self.shell.progress(0, "importing");
        if self.config.progress() {
            progress
        } else {
            progress.without_bar()
        }
    }
}
