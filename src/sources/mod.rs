//! Package sources.
//!
//! Importers fetch and update package source directories from their
//! version control system (git, svn, tarball archives). Packages without a
//! VCS are local-only and have no importer.

pub mod archive;
pub mod autoadd;
pub mod git;
pub mod importer;
pub mod svn;

use std::sync::Arc;

pub use archive::ArchiveImporter;
pub use autoadd::{AutoAddHandler, BuildSystemDetector, HandlerKind};
pub use git::GitImporter;
pub use importer::{ImportError, Importer, SyncState, VcsStatus};
pub use svn::SvnImporter;

use crate::core::package::{VcsDefinition, VcsKind};

/// Create the importer for a VCS definition.
///
/// Returns `None` for local-only packages.
pub fn importer_for(vcs: &VcsDefinition) -> Result<Option<Arc<dyn Importer>>, ImportError> {
    let importer: Arc<dyn Importer> = match vcs.kind {
        VcsKind::Git => Arc::new(GitImporter::from_definition(vcs)?),
        VcsKind::Svn => Arc::new(SvnImporter::from_definition(vcs)?),
        VcsKind::Archive => Arc::new(ArchiveImporter::from_definition(vcs)?),
        VcsKind::None => return Ok(None),
    };
    Ok(Some(importer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_importer_for() {
        assert!(importer_for(&VcsDefinition::none()).unwrap().is_none());

        let git = importer_for(&VcsDefinition::git("https://example.com/base.git"))
            .unwrap()
            .unwrap();
        assert_eq!(git.kind(), VcsKind::Git);
        assert!(git.supports_status());

        let svn_without_url = VcsDefinition {
            kind: VcsKind::Svn,
            ..Default::default()
        };
        assert!(importer_for(&svn_without_url).is_err());
    }
}
