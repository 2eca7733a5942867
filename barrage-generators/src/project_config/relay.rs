//! Virtual Relay project-config cache

use barrage_providers::ProjectProvider;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

/// One simulated edge-proxy instance with its own pending/cached state.
///
/// `cached_order` records cache insertions oldest-last so expiry can scan
/// from the tail without walking the whole map. The deque may carry stale
/// entries for a project whose authoritative `cached` timestamp was since
/// refreshed; expiry only deletes from `cached` when the map timestamp is
/// itself past the cutoff.
#[derive(Debug, Default)]
pub struct VirtualRelay {
    pending: HashSet<String>,
    cached: HashMap<String, DateTime<Utc>>,
    cached_order: VecDeque<(String, DateTime<Utc>)>,
}

impl VirtualRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn cached_count(&self) -> usize {
        self.cached.len()
    }

    pub fn is_pending(&self, project_id: &str) -> bool {
        self.pending.contains(project_id)
    }

    pub fn is_cached(&self, project_id: &str) -> bool {
        self.cached.contains_key(project_id)
    }

    /// Assemble the next batch of project ids to request.
    ///
    /// Expired cache entries are reclaimed first, then pending projects are
    /// re-requested, and the rest of the batch is filled by walking the
    /// provider's successor chain from `base_project_id`, skipping ids that
    /// are pending or cached. A short batch is returned when a full
    /// wrap-around cannot find enough candidates.
    pub fn projects_for_request(
        &mut self,
        batch_size: usize,
        batch_interval: Duration,
        max_projects: usize,
        now: DateTime<Utc>,
        base_project_id: &str,
        provider: &ProjectProvider,
    ) -> Vec<String> {
        self.clean_expired_projects(batch_interval, now);

        let mut batch = Vec::with_capacity(batch_size);
        for project_id in &self.pending {
            if batch.len() == batch_size {
                return batch;
            }
            batch.push(project_id.clone());
        }

        let first_suggestion = provider.next_project_id(max_projects, base_project_id);
        let mut project_id = first_suggestion.clone();
        while batch.len() < batch_size {
            if !self.pending.contains(&project_id) && !self.cached.contains_key(&project_id) {
                batch.push(project_id.clone());
            }
            project_id = provider.next_project_id(max_projects, &project_id);
            if project_id == first_suggestion {
                // wrapped around without filling the batch
                break;
            }
        }
        batch
    }

    /// Integrate a project-config response: `pending` ids stay pending,
    /// resolved ids move to the cache stamped with `now`.
    pub fn update_project_states(
        &mut self,
        pending_projects: &[String],
        resolved_projects: &[String],
        now: DateTime<Utc>,
    ) {
        for project_id in pending_projects {
            self.pending.insert(project_id.clone());
        }
        for project_id in resolved_projects {
            self.cached.insert(project_id.clone(), now);
            self.cached_order.push_front((project_id.clone(), now));
            self.pending.remove(project_id);
        }
    }

    /// Pop every tail entry older than the batch interval, deleting from the
    /// map only when its authoritative timestamp also passed the cutoff.
    fn clean_expired_projects(&mut self, batch_interval: Duration, now: DateTime<Utc>) {
        // an interval too large to represent expires nothing
        let Some(cutoff) = chrono::Duration::from_std(batch_interval)
            .ok()
            .and_then(|interval| now.checked_sub_signed(interval))
        else {
            return;
        };
        while let Some((project_id, inserted_at)) = self.cached_order.back() {
            if *inserted_at >= cutoff {
                return;
            }
            if let Some(last_update) = self.cached.get(project_id) {
                if *last_update < cutoff {
                    self.cached.remove(project_id);
                }
            }
            self.cached_order.pop_back();
        }
    }
}
