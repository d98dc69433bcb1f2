use std::collections::{HashSet, VecDeque};

/// Rings larger than this are not reported; they behave like chains for placement
/// and torsion enumeration purposes.
pub const MAX_RING_SIZE: usize = 14;

/// A single ring, stored as atom indices in cycle order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ring {
    atoms: Vec<usize>,
}

impl Ring {
    pub fn atoms(&self) -> &[usize] {
        &self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn contains(&self, atom: usize) -> bool {
        self.atoms.contains(&atom)
    }

    /// Iterates over the ring bonds as consecutive atom pairs, closing the cycle.
    pub fn bonds(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let n = self.atoms.len();
        (0..n).map(move |i| (self.atoms[i], self.atoms[(i + 1) % n]))
    }

    /// Returns the ring atoms rotated so that `start` comes first, keeping cycle order.
    pub fn rotated_to(&self, start: usize) -> Option<Vec<usize>> {
        let pos = self.atoms.iter().position(|&a| a == start)?;
        let mut out = Vec::with_capacity(self.atoms.len());
        out.extend_from_slice(&self.atoms[pos..]);
        out.extend_from_slice(&self.atoms[..pos]);
        Some(out)
    }
}

/// Minimal covering set of smallest rings of a molecular graph.
///
/// Every ring bond belongs to at least one reported ring, and each reported ring is the
/// shortest cycle through at least one of its bonds.
#[derive(Debug, Clone, Default)]
pub struct RingSet {
    rings: Vec<Ring>,
    ring_bonds: HashSet<(usize, usize)>,
}

fn bond_key(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

impl RingSet {
    /// Perceives rings from an adjacency list.
    pub fn find(adjacency: &[Vec<usize>]) -> Self {
        let mut candidates: Vec<Vec<usize>> = Vec::new();
        let mut seen_sets: HashSet<Vec<usize>> = HashSet::new();

        for (u, neighbors) in adjacency.iter().enumerate() {
            for &v in neighbors.iter().filter(|&&v| v > u) {
                if let Some(cycle) = shortest_cycle_through(adjacency, u, v) {
                    let mut key = cycle.clone();
                    key.sort_unstable();
                    if seen_sets.insert(key) {
                        candidates.push(cycle);
                    }
                }
            }
        }

        candidates.sort_by_key(|c| c.len());

        let mut rings = Vec::new();
        let mut ring_bonds = HashSet::new();
        for cycle in candidates {
            let ring = Ring { atoms: cycle };
            let adds_bond = ring
                .bonds()
                .any(|(a, b)| !ring_bonds.contains(&bond_key(a, b)));
            if adds_bond {
                ring_bonds.extend(ring.bonds().map(|(a, b)| bond_key(a, b)));
                rings.push(ring);
            }
        }

        Self { rings, ring_bonds }
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    pub fn is_ring_bond(&self, a: usize, b: usize) -> bool {
        self.ring_bonds.contains(&bond_key(a, b))
    }

    pub fn is_ring_atom(&self, atom: usize) -> bool {
        self.rings.iter().any(|r| r.contains(atom))
    }

    pub fn rings_containing(&self, atom: usize) -> impl Iterator<Item = &Ring> {
        self.rings.iter().filter(move |r| r.contains(atom))
    }
}

// Breadth-first search from `u` to `v` that ignores the direct u-v edge. The returned
// path, read as a cycle, starts at `u` and ends at `v`.
fn shortest_cycle_through(adjacency: &[Vec<usize>], u: usize, v: usize) -> Option<Vec<usize>> {
    let n = adjacency.len();
    let mut parent = vec![usize::MAX; n];
    let mut depth = vec![0usize; n];
    let mut queue = VecDeque::new();
    parent[u] = u;
    queue.push_back(u);

    while let Some(current) = queue.pop_front() {
        if depth[current] + 1 >= MAX_RING_SIZE {
            continue;
        }
        for &next in &adjacency[current] {
            if current == u && next == v {
                continue;
            }
            if parent[next] != usize::MAX {
                continue;
            }
            parent[next] = current;
            depth[next] = depth[current] + 1;
            if next == v {
                let mut path = vec![v];
                let mut walk = v;
                while walk != u {
                    walk = parent[walk];
                    path.push(walk);
                }
                path.reverse();
                return Some(path);
            }
            queue.push_back(next);
        }
    }
    None
}
