use crate::config;
use crate::error::{Error, Result};
use crate::graph::Graph;
use itertools::Itertools;
use std::str::FromStr;

pub const DEFAULT_ITERATIONS: u32 = 32;
pub const DEFAULT_DAMPING: f64 = 0.85;

/// Weighting policy applied to a reduced graph. The choice also selects the
/// redirect resolution used by [`Graph::reduce`]: pagerank resolves both
/// edge endpoints through the full chain walk, indegree resolves only the
/// destination with the single declared-anchored hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightPolicy {
    #[default]
    PageRank,
    InDegree,
}

impl FromStr for WeightPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pagerank" => Ok(Self::PageRank),
            "indegree" => Ok(Self::InDegree),
            other => Err(Error::Config(format!("unknown weighting policy '{other}'"))),
        }
    }
}

/// Parameters of the weight calculation.
#[derive(Debug, Clone)]
pub struct WeightConfig {
    pub iterations: u32,
    pub damping: f64,
    pub policy: WeightPolicy,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            damping: DEFAULT_DAMPING,
            policy: WeightPolicy::default(),
        }
    }
}

impl WeightConfig {
    /// Parse a `key=value; ...` configuration string. Recognized keys are
    /// `iterations` (positive integer), `damping` (float in (0,1)) and
    /// `policy` (`pagerank` or `indegree`); omitted keys keep their
    /// defaults.
    pub fn from_config_str(source: &str) -> Result<Self> {
        let mut cfg = Self::default();
        for (key, value) in config::entries(source)? {
            match key.as_str() {
                "iterations" => {
                    cfg.iterations = value
                        .parse()
                        .ok()
                        .filter(|&n| n > 0)
                        .ok_or_else(|| {
                            Error::Config(format!("iterations needs a positive integer, got '{value}'"))
                        })?;
                }
                "damping" => {
                    let damping: f64 = value.parse().map_err(|_| {
                        Error::Config(format!("damping needs a float, got '{value}'"))
                    })?;
                    if !(damping > 0.0 && damping < 1.0) {
                        return Err(Error::Config(format!(
                            "damping must lie in (0,1), got '{value}'"
                        )));
                    }
                    cfg.damping = damping;
                }
                "policy" => cfg.policy = value.parse()?,
                other => {
                    return Err(Error::Config(format!("unknown key '{other}'")));
                }
            }
        }
        Ok(cfg)
    }

    /// Compute per-page weights on a reduced graph, indexed by page id - 1.
    /// An empty graph yields an empty vector.
    pub fn compute(&self, graph: &Graph) -> Result<Vec<f64>> {
        match self.policy {
            WeightPolicy::PageRank => self.power_iteration(graph),
            WeightPolicy::InDegree => Ok(in_degree(graph)),
        }
    }

    /// Damped power iteration over the column-stochastic link matrix: each
    /// source page distributes its weight over its outgoing links in
    /// proportion to their multiplicities, pages without outgoing links
    /// contribute nothing, and every page receives a uniform teleport share.
    fn power_iteration(&self, graph: &Graph) -> Result<Vec<f64>> {
        let n = graph.page_count() as usize;
        if n == 0 {
            return Ok(Vec::new());
        }

        // Triplets (to, from, cnt / W_from). Same-source records are
        // contiguous in the edge order, so W_from is summed per group.
        let mut entries = Vec::with_capacity(graph.link_count());
        let mut column_sums = vec![0.0_f64; n];
        for (_, group) in &graph.edges().group_by(|&(from, _, _)| from) {
            let records: Vec<_> = group.collect();
            let outgoing: u64 = records.iter().map(|&(_, _, cnt)| u64::from(cnt)).sum();
            for (from, to, cnt) in records {
                let weight = f64::from(cnt) / outgoing as f64;
                column_sums[from as usize - 1] += weight;
                entries.push((to as usize - 1, from as usize - 1, weight));
            }
        }
        if column_sums.iter().any(|&sum| sum > 1.1) {
            return Err(Error::Internal("link matrix built not normalized"));
        }

        let uniform = 1.0 / n as f64;
        let mut weights = vec![uniform; n];
        for _ in 0..self.iterations {
            let mut next = vec![0.0_f64; n];
            for &(to, from, weight) in &entries {
                next[to] += weight * weights[from];
            }
            for value in &mut next {
                *value = self.damping * *value + (1.0 - self.damping) * uniform;
            }
            weights = next;
        }
        Ok(weights)
    }
}

/// In-degree tally: one count per distinct incoming edge record (not per
/// multiplicity), scaled by the page count.
fn in_degree(graph: &Graph) -> Vec<f64> {
    let n = graph.page_count() as usize;
    let mut tallies = vec![0_u32; n];
    for (_, to, _) in graph.edges() {
        tallies[to as usize - 1] += 1;
    }
    tallies
        .into_iter()
        .map(|tally| f64::from(tally) / n as f64)
        .collect()
}
