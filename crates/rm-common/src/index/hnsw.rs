//! Hierarchical navigable small-world graph over cosine distance.
//!
//! Vectors live in stacked layers; every node exists on layer 0 and on a
//! geometrically-sampled number of layers above it. Search greedily descends
//! from the sparse top layer, then runs a beam search on layer 0. Results are
//! approximate: `ef_construction` and `ef_search` trade recall for speed.

use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use crate::embedding::cosine_distance;

/// Level sampling uses a fixed-seed hash of the insertion ordinal instead of
/// an RNG, so rebuilding from the same rows yields the same graph.
const LEVEL_SEED_K0: u64 = 0x9e37_79b9_7f4a_7c15;
const LEVEL_SEED_K1: u64 = 0xc2b2_ae3d_27d4_eb4f;

const MAX_LEVEL: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HnswParams {
    /// Graph degree: target neighbor count per node per layer.
    pub m: usize,
    /// Beam width while inserting.
    pub ef_construction: usize,
    /// Beam width while querying.
    pub ef_search: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 32,
            ef_construction: 200,
            ef_search: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Node {
    vector: Vec<f32>,
    /// `neighbors[layer]` holds the out-links on that layer; the node exists
    /// on layers `0..neighbors.len()`.
    neighbors: Vec<Vec<u32>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Scored {
    id: u32,
    distance: f32,
}

impl Eq for Scored {}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap by distance; ties broken by id for determinism.
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswGraph {
    params: HnswParams,
    nodes: Vec<Node>,
    entry: Option<u32>,
    top_level: usize,
}

impl HnswGraph {
    pub fn new(params: HnswParams) -> Self {
        Self {
            params,
            nodes: Vec::new(),
            entry: None,
            top_level: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn params(&self) -> &HnswParams {
        &self.params
    }

    pub fn dimension(&self) -> Option<usize> {
        self.nodes.first().map(|n| n.vector.len())
    }

    fn distance(&self, id: u32, query: &[f32]) -> f32 {
        cosine_distance(&self.nodes[id as usize].vector, query)
    }

    fn sample_level(&self, ordinal: usize) -> usize {
        let mut hasher = SipHasher13::new_with_keys(LEVEL_SEED_K0, LEVEL_SEED_K1);
        ordinal.hash(&mut hasher);
        // Map 53 hash bits to a unit float, then to a geometric level.
        let unit = ((hasher.finish() >> 11) as f64 / (1u64 << 53) as f64).max(f64::MIN_POSITIVE);
        let scale = 1.0 / (self.params.m.max(2) as f64).ln();
        ((-unit.ln()) * scale).floor() as usize
    }

    /// Single-step greedy descent used on layers above the target.
    fn greedy_closest(&self, query: &[f32], start: u32, layer: usize) -> u32 {
        let mut current = start;
        let mut current_dist = self.distance(current, query);

        loop {
            let mut improved = false;
            for &neighbor in &self.nodes[current as usize].neighbors[layer] {
                let d = self.distance(neighbor, query);
                if d < current_dist {
                    current = neighbor;
                    current_dist = d;
                    improved = true;
                }
            }
            if !improved {
                return current;
            }
        }
    }

    /// Beam search on one layer. Returns up to `ef` hits, closest first.
    fn search_layer(&self, query: &[f32], entries: &[u32], ef: usize, layer: usize) -> Vec<Scored> {
        let ef = ef.max(1);
        let mut visited: HashSet<u32> = HashSet::new();
        // Min-heap of frontier nodes, max-heap of the best `ef` found so far.
        let mut frontier: BinaryHeap<std::cmp::Reverse<Scored>> = BinaryHeap::new();
        let mut found: BinaryHeap<Scored> = BinaryHeap::new();

        for &entry in entries {
            if visited.insert(entry) {
                let scored = Scored {
                    id: entry,
                    distance: self.distance(entry, query),
                };
                frontier.push(std::cmp::Reverse(scored));
                found.push(scored);
            }
        }

        while let Some(std::cmp::Reverse(candidate)) = frontier.pop() {
            let furthest = found.peek().map(|s| s.distance).unwrap_or(f32::MAX);
            if found.len() >= ef && candidate.distance > furthest {
                break;
            }

            for &neighbor in &self.nodes[candidate.id as usize].neighbors[layer] {
                if !visited.insert(neighbor) {
                    continue;
                }
                let d = self.distance(neighbor, query);
                let furthest = found.peek().map(|s| s.distance).unwrap_or(f32::MAX);
                if found.len() < ef || d < furthest {
                    let scored = Scored {
                        id: neighbor,
                        distance: d,
                    };
                    frontier.push(std::cmp::Reverse(scored));
                    found.push(scored);
                    if found.len() > ef {
                        found.pop();
                    }
                }
            }
        }

        let mut hits = found.into_vec();
        hits.sort();
        hits
    }

    fn prune_neighbors(&mut self, id: u32, layer: usize, max_links: usize) {
        if self.nodes[id as usize].neighbors[layer].len() <= max_links {
            return;
        }
        let base = self.nodes[id as usize].vector.clone();
        let mut links = std::mem::take(&mut self.nodes[id as usize].neighbors[layer]);
        links.sort_by(|a, b| {
            let da = cosine_distance(&self.nodes[*a as usize].vector, &base);
            let db = cosine_distance(&self.nodes[*b as usize].vector, &base);
            da.partial_cmp(&db).unwrap_or(Ordering::Equal)
        });
        links.truncate(max_links);
        self.nodes[id as usize].neighbors[layer] = links;
    }

    /// Insert an L2-normalized vector and return its internal id.
    pub fn insert(&mut self, vector: Vec<f32>) -> u32 {
        let id = self.nodes.len() as u32;
        let level = self.sample_level(self.nodes.len()).min(MAX_LEVEL);
        let node = Node {
            vector,
            neighbors: vec![Vec::new(); level + 1],
        };

        let Some(entry) = self.entry else {
            self.nodes.push(node);
            self.entry = Some(id);
            self.top_level = level;
            return id;
        };

        let query = node.vector.clone();
        self.nodes.push(node);

        let mut closest = entry;
        for layer in (level + 1..=self.top_level).rev() {
            closest = self.greedy_closest(&query, closest, layer);
        }

        let mut entries = vec![closest];
        for layer in (0..=level.min(self.top_level)).rev() {
            let found = self.search_layer(&query, &entries, self.params.ef_construction, layer);
            let max_links = if layer == 0 {
                self.params.m * 2
            } else {
                self.params.m
            };

            let links: Vec<u32> = found
                .iter()
                .filter(|s| s.id != id)
                .take(self.params.m)
                .map(|s| s.id)
                .collect();
            self.nodes[id as usize].neighbors[layer] = links.clone();

            for neighbor in links {
                self.nodes[neighbor as usize].neighbors[layer].push(id);
                self.prune_neighbors(neighbor, layer, max_links);
            }

            entries = found.iter().map(|s| s.id).collect();
            if entries.is_empty() {
                entries = vec![closest];
            }
        }

        if level > self.top_level {
            self.top_level = level;
            self.entry = Some(id);
        }

        id
    }

    /// Approximate k-nearest-neighbor lookup, closest first. Returns fewer
    /// than `k` entries when the graph holds fewer nodes.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(u32, f32)> {
        let Some(entry) = self.entry else {
            return Vec::new();
        };

        let mut closest = entry;
        for layer in (1..=self.top_level).rev() {
            closest = self.greedy_closest(query, closest, layer);
        }

        let ef = self.params.ef_search.max(k);
        self.search_layer(query, &[closest], ef, 0)
            .into_iter()
            .take(k)
            .map(|s| (s.id, s.distance))
            .collect()
    }
}
