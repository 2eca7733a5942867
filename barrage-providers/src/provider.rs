//! Synthetic and file-backed project providers

use crate::profiles::{index_from_profiles, projects_required, FreqProfile};
use crate::ProviderError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Everything a generator needs to know about one project on the target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub project_key: String,
    #[serde(default, rename = "access_token", skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project_slug: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub organization_slug: String,
}

/// Supplies project ids, keys and slugs to payload generators.
#[derive(Debug)]
pub enum ProjectProvider {
    /// Derives all project data from the id; any id in `[1, maxProjects]`
    /// is valid.
    Synthetic,
    /// Serves records loaded from a `projects.json` file.
    FileBacked(FileProjects),
}

/// The file-backed provider state: records keyed by id plus the insertion
/// order needed for deterministic successor lookup.
#[derive(Debug, Default)]
pub struct FileProjects {
    infos: HashMap<String, ProjectInfo>,
    ids: Vec<String>,
    id_to_idx: HashMap<String, usize>,
}

impl ProjectProvider {
    /// Load a file-backed provider from a JSON array of [`ProjectInfo`]
    /// records.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let raw = std::fs::read(path.as_ref())?;
        let records: Vec<ProjectInfo> = serde_json::from_slice(&raw)?;

        let mut projects = FileProjects::default();
        for record in records {
            let id = record.project_id.clone();
            if projects.infos.insert(id.clone(), record).is_none() {
                projects.id_to_idx.insert(id.clone(), projects.ids.len());
                projects.ids.push(id);
            }
        }
        info!(
            count = projects.ids.len(),
            path = %path.as_ref().display(),
            "loaded projects from file"
        );
        Ok(ProjectProvider::FileBacked(projects))
    }

    /// Number of projects this provider can serve.
    pub fn number_of_projects(&self) -> usize {
        match self {
            // effectively unbounded, leave some headroom for arithmetic
            ProjectProvider::Synthetic => usize::MAX - 1000,
            ProjectProvider::FileBacked(projects) => projects.ids.len(),
        }
    }

    /// A uniformly random project id within `[1, max_projects]` (synthetic)
    /// or within the loaded file.
    pub fn project_id(&self, max_projects: usize) -> String {
        let mut rng = rand::thread_rng();
        match self {
            ProjectProvider::Synthetic => {
                let max = max_projects.max(1);
                (rng.gen_range(0..max) + 1).to_string()
            }
            ProjectProvider::FileBacked(projects) => {
                if projects.ids.is_empty() {
                    return String::new();
                }
                let max = max_projects.max(1).min(projects.ids.len());
                projects.ids[rng.gen_range(0..max)].clone()
            }
        }
    }

    /// The deterministic successor of `current`, wrapping around at
    /// `min(max_projects, loaded count)`.
    pub fn next_project_id(&self, max_projects: usize, current: &str) -> String {
        match self {
            ProjectProvider::Synthetic => {
                let max = max_projects.max(1);
                let current: usize = match current.parse() {
                    Ok(id) => id,
                    Err(_) => {
                        warn!(current, "cannot parse project id, restarting from 1");
                        return "1".to_string();
                    }
                };
                (current % max + 1).to_string()
            }
            ProjectProvider::FileBacked(projects) => {
                if projects.ids.is_empty() {
                    return String::new();
                }
                if current.is_empty() {
                    return projects.ids[0].clone();
                }
                let current_idx = match projects.id_to_idx.get(current) {
                    Some(idx) => *idx,
                    None => {
                        warn!(current, "unknown project id, returning the first project");
                        return projects.ids[0].clone();
                    }
                };
                let wrap = max_projects.max(1).min(projects.ids.len());
                projects.ids[(current_idx + 1) % wrap].clone()
            }
        }
    }

    /// A weighted random project id drawn across profile groups.
    ///
    /// Returns the project id together with the index of the group it was
    /// drawn from, which callers use to select per-group behavior such as
    /// timestamp delays.
    pub fn project_id_weighted(
        &self,
        profiles: &[FreqProfile],
    ) -> Result<(String, usize), ProviderError> {
        if let ProjectProvider::FileBacked(projects) = self {
            let required = projects_required(profiles);
            if projects.ids.len() < required {
                return Err(ProviderError::NotEnoughProjects {
                    requested: required,
                    available: projects.ids.len(),
                });
            }
        }
        let (idx, group_idx) = index_from_profiles(profiles)?;
        let id = match self {
            ProjectProvider::Synthetic => (idx + 1).to_string(),
            ProjectProvider::FileBacked(projects) => projects.ids[idx].clone(),
        };
        Ok((id, group_idx))
    }

    /// Full project record for an id.
    ///
    /// The synthetic provider derives the key and slugs from the id; the
    /// file-backed provider returns a zero-valued record for unknown ids.
    pub fn project_info(&self, project_id: &str) -> ProjectInfo {
        match self {
            ProjectProvider::Synthetic => {
                let padded = format!("{:a>32}", project_id);
                let key_start = padded.len() - 32;
                ProjectInfo {
                    project_id: project_id.to_string(),
                    project_key: padded[key_start..].to_string(),
                    api_key: String::new(),
                    project_slug: format!("project-{project_id}"),
                    organization_slug: format!("organization-{project_id}"),
                }
            }
            ProjectProvider::FileBacked(projects) => projects
                .infos
                .get(project_id)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

static PROVIDER: OnceLock<ProjectProvider> = OnceLock::new();

/// Install the process-wide provider. May only be called once, before any
/// generator runs.
pub fn install(provider: ProjectProvider) -> Result<(), ProviderError> {
    PROVIDER
        .set(provider)
        .map_err(|_| ProviderError::AlreadyInstalled)
}

/// The process-wide provider, defaulting to the synthetic one.
pub fn current() -> &'static ProjectProvider {
    PROVIDER.get_or_init(|| ProjectProvider::Synthetic)
}
