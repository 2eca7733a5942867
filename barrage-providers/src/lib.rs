//! Project providers for the barrage load generator.
//!
//! A [`ProjectProvider`] supplies project ids, keys and slugs to payload
//! generators. Two strategies exist: [`ProjectProvider::Synthetic`] derives
//! everything from the project id, while [`ProjectProvider::FileBacked`]
//! serves records loaded from a `projects.json` file so load tests can hit
//! real projects on the target.
//!
//! The active provider is installed once during bootstrap and read without
//! locking afterwards; see [`install`] and [`current`].

mod profiles;
mod provider;

pub use profiles::FreqProfile;
pub use provider::{current, install, FileProjects, ProjectInfo, ProjectProvider};

/// Errors produced by project providers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("no frequency profiles passed to weighted selection")]
    EmptyProfiles,

    #[error("frequency profiles have zero total weight")]
    ZeroWeight,

    #[error("not enough projects available for the requested profile: requested {requested}, available {available}")]
    NotEnoughProjects { requested: usize, available: usize },

    #[error("a project provider is already installed")]
    AlreadyInstalled,

    #[error("could not read project file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse project file: {0}")]
    Parse(#[from] serde_json::Error),
}
