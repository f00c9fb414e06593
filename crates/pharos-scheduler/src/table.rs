//! Job definition table and route selection.
//!
//! Jobs are ordered by tier first (the length of the longest prerequisite
//! chain above a job), then by descending priority, then by declaration
//! order. Every prerequisite sits in a lower tier than its dependents, so the
//! result is always a topological order.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use pharos_core::{ConfigError, JobId};

use crate::job::JobDefinition;

/// Read-only catalog of every configured job, in resolved order.
#[derive(Debug, Clone)]
pub struct JobTable {
    ordered: Vec<Arc<JobDefinition>>,
}

impl JobTable {
    /// Validate and order `definitions`. Fails on duplicate ids, unknown
    /// prerequisites, self-dependencies and cycles.
    pub fn new(definitions: Vec<JobDefinition>) -> Result<Self, ConfigError> {
        let mut index: HashMap<JobId, usize> = HashMap::new();
        for (i, def) in definitions.iter().enumerate() {
            if index.insert(def.id.clone(), i).is_some() {
                return Err(ConfigError::DuplicateJob(def.id.to_string()));
            }
        }

        for def in &definitions {
            for pre in &def.prerequisites {
                if pre == &def.id {
                    return Err(ConfigError::DependencyCycle(vec![
                        def.id.to_string(),
                        def.id.to_string(),
                    ]));
                }
                if !index.contains_key(pre) {
                    return Err(ConfigError::UnknownPrerequisite {
                        job: def.id.to_string(),
                        prerequisite: pre.to_string(),
                    });
                }
            }
        }

        let edges: Vec<Vec<usize>> = definitions
            .iter()
            .map(|d| d.prerequisites.iter().map(|p| index[p]).collect())
            .collect();
        let tiers = compute_tiers(&edges).map_err(|cycle| {
            ConfigError::DependencyCycle(
                cycle.into_iter().map(|i| definitions[i].id.to_string()).collect(),
            )
        })?;

        let mut order: Vec<usize> = (0..definitions.len()).collect();
        order.sort_by_key(|&i| (tiers[i], Reverse(definitions[i].priority), i));

        let mut slots: Vec<Option<JobDefinition>> = definitions.into_iter().map(Some).collect();
        let ordered = order
            .into_iter()
            .filter_map(|i| slots[i].take().map(Arc::new))
            .collect();
        Ok(Self { ordered })
    }

    pub fn ordered(&self) -> &[Arc<JobDefinition>] {
        &self.ordered
    }

    pub fn get(&self, id: &JobId) -> Option<&Arc<JobDefinition>> {
        self.ordered.iter().find(|d| &d.id == id)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Restrict the catalog to `selection`, keeping catalog order. An empty
    /// selection means every job. Names not in the catalog come back in
    /// [`RouteSelection::unknown`] so the caller can report them.
    pub fn route(&self, selection: &[String]) -> RouteSelection {
        if selection.is_empty() {
            return RouteSelection {
                route: Route {
                    jobs: self.ordered.clone(),
                },
                unknown: Vec::new(),
            };
        }

        let wanted: HashSet<&str> = selection.iter().map(|s| s.trim()).collect();
        let mut unknown: Vec<String> = Vec::new();
        for name in selection {
            let name = name.trim();
            if self.get(&JobId::from(name)).is_none() && !unknown.iter().any(|u| u == name) {
                unknown.push(name.to_string());
            }
        }

        let jobs = self
            .ordered
            .iter()
            .filter(|d| wanted.contains(d.id.as_str()))
            .cloned()
            .collect();
        RouteSelection {
            route: Route { jobs },
            unknown,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteSelection {
    pub route: Route,
    pub unknown: Vec<String>,
}

/// Ordered jobs one account runs per cycle. Identical across cycles.
#[derive(Debug, Clone, Default)]
pub struct Route {
    jobs: Vec<Arc<JobDefinition>>,
}

impl Route {
    pub fn jobs(&self) -> &[Arc<JobDefinition>] {
        &self.jobs
    }

    pub fn ids(&self) -> Vec<JobId> {
        self.jobs.iter().map(|j| j.id.clone()).collect()
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.iter().any(|j| &j.id == id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

// ------ Internal helpers -------------------------------------------------

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Longest-chain depth for every node of the prerequisite graph, or the
/// node path of the first cycle found.
fn compute_tiers(edges: &[Vec<usize>]) -> Result<Vec<usize>, Vec<usize>> {
    let n = edges.len();
    let mut marks = vec![Mark::Unvisited; n];
    let mut tiers = vec![0usize; n];
    let mut path = Vec::new();

    for start in 0..n {
        visit(start, edges, &mut marks, &mut tiers, &mut path)?;
    }
    Ok(tiers)
}

fn visit(
    node: usize,
    edges: &[Vec<usize>],
    marks: &mut [Mark],
    tiers: &mut [usize],
    path: &mut Vec<usize>,
) -> Result<usize, Vec<usize>> {
    match marks[node] {
        Mark::Done => return Ok(tiers[node]),
        Mark::InProgress => {
            let from = path.iter().position(|&p| p == node).unwrap_or(0);
            let mut cycle = path[from..].to_vec();
            cycle.push(node);
            return Err(cycle);
        }
        Mark::Unvisited => {}
    }

    marks[node] = Mark::InProgress;
    path.push(node);
    let mut tier = 0;
    for &pre in &edges[node] {
        tier = tier.max(visit(pre, edges, marks, tiers, path)? + 1);
    }
    path.pop();
    marks[node] = Mark::Done;
    tiers[node] = tier;
    Ok(tier)
}
