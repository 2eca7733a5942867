//! Weighted project selection across frequency profile groups

use crate::ProviderError;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One group of projects with a relative pick frequency.
///
/// With profiles `[{numProjects: 5, relativeFreqWeight: 1}, {numProjects: 3,
/// relativeFreqWeight: 2}]` the provider serves 8 projects in total, and each
/// project of the second group is returned twice as often as each project of
/// the first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreqProfile {
    pub num_projects: usize,
    pub relative_freq_weight: f64,
}

/// The same information as a `FreqProfile` list, rearranged for drawing:
/// the exclusive end of each group's index range and the cumulative
/// weighted mass up to and including the group.
struct ChoiceRatio {
    end_index: usize,
    cumulative_mass: f64,
}

fn cumulative_ratios(profiles: &[FreqProfile]) -> Vec<ChoiceRatio> {
    let mut ratios = Vec::with_capacity(profiles.len());
    let mut end_index = 0usize;
    let mut cumulative_mass = 0f64;
    for profile in profiles {
        end_index += profile.num_projects;
        cumulative_mass += profile.relative_freq_weight * profile.num_projects as f64;
        ratios.push(ChoiceRatio {
            end_index,
            cumulative_mass,
        });
    }
    ratios
}

/// Total number of distinct projects the profile list requires.
pub(crate) fn projects_required(profiles: &[FreqProfile]) -> usize {
    profiles.iter().map(|p| p.num_projects).sum()
}

/// Draw a project index according to the profile weights.
///
/// Returns the absolute zero-based project index and the index of the group
/// it was drawn from. Per-project frequency within a group is
/// `groupWeight / groupSize` of the total mass.
pub(crate) fn index_from_profiles(
    profiles: &[FreqProfile],
) -> Result<(usize, usize), ProviderError> {
    if profiles.is_empty() {
        return Err(ProviderError::EmptyProfiles);
    }
    let ratios = cumulative_ratios(profiles);
    let total_mass = ratios
        .last()
        .map(|r| r.cumulative_mass)
        .unwrap_or_default();
    if total_mass <= 0.0 {
        return Err(ProviderError::ZeroWeight);
    }

    let mut rng = rand::thread_rng();
    let drawn = rng.gen::<f64>() * total_mass;

    for (group_idx, ratio) in ratios.iter().enumerate() {
        if drawn <= ratio.cumulative_mass {
            let start_index = if group_idx > 0 {
                ratios[group_idx - 1].end_index
            } else {
                0
            };
            let group_size = ratio.end_index - start_index;
            if group_size == 0 {
                // empty group carries no mass, the draw belongs to a later one
                continue;
            }
            let project_idx = start_index + rng.gen_range(0..group_size);
            return Ok((project_idx, group_idx));
        }
    }
    Err(ProviderError::ZeroWeight)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_profiles_fail() {
        assert!(matches!(
            index_from_profiles(&[]),
            Err(ProviderError::EmptyProfiles)
        ));
    }

    #[test]
    fn zero_weight_fails() {
        let profiles = [FreqProfile {
            num_projects: 3,
            relative_freq_weight: 0.0,
        }];
        assert!(matches!(
            index_from_profiles(&profiles),
            Err(ProviderError::ZeroWeight)
        ));
    }

    #[test]
    fn indices_stay_in_group_ranges() {
        let profiles = [
            FreqProfile {
                num_projects: 5,
                relative_freq_weight: 1.0,
            },
            FreqProfile {
                num_projects: 3,
                relative_freq_weight: 2.0,
            },
        ];
        for _ in 0..1000 {
            let (idx, group) = index_from_profiles(&profiles).unwrap();
            match group {
                0 => assert!(idx < 5),
                1 => assert!((5..8).contains(&idx)),
                other => panic!("unexpected group {other}"),
            }
        }
    }

    #[test]
    fn empirical_frequency_matches_weights() {
        // group masses are 5*1 = 5 and 3*2 = 6, so each project of the first
        // group should be drawn with probability 1/11 and each of the second
        // with 2/11
        let profiles = [
            FreqProfile {
                num_projects: 5,
                relative_freq_weight: 1.0,
            },
            FreqProfile {
                num_projects: 3,
                relative_freq_weight: 2.0,
            },
        ];
        let draws = 200_000usize;
        let mut counts = [0usize; 8];
        for _ in 0..draws {
            let (idx, _) = index_from_profiles(&profiles).unwrap();
            counts[idx] += 1;
        }
        for (idx, count) in counts.iter().enumerate() {
            let expected = if idx < 5 { 1.0 / 11.0 } else { 2.0 / 11.0 };
            let observed = *count as f64 / draws as f64;
            assert!(
                (observed - expected).abs() < 0.02,
                "project {idx}: observed {observed}, expected {expected}"
            );
        }
    }
}
