//! Backend factory
//!
//! Builds the collaborator bundle described by the `[tools]` config section.

use super::{
    ArtifactReader, Backends, CachedArtifactReader, DeckDebuild, DpkgDeb, Git, Verseek,
};
use crate::config::schema::ToolsConfig;
use std::sync::Arc;
use tracing::debug;

/// Create the command-line backends for a tools configuration
pub fn create_backends(tools: &ToolsConfig) -> Backends {
    let dpkg: Arc<dyn ArtifactReader> = Arc::new(DpkgDeb::new(&tools.dpkg_deb));
    let reader: Arc<dyn ArtifactReader> = if tools.metadata_cache {
        let dir = tools.metadata_cache_path();
        debug!("package metadata cache at {}", dir.display());
        Arc::new(CachedArtifactReader::new(dpkg, dir))
    } else {
        dpkg
    };

    Backends {
        vcs: Arc::new(Git::new(&tools.git)),
        versions: Arc::new(Verseek::new(&tools.verseek)),
        builder: Arc::new(DeckDebuild::new(&tools.builder, tools.builder_args.clone())),
        reader,
    }
}
