//! Exact nearest-neighbour search over feature rows

use crate::error::{HarnessError, Result};
use ndarray::{ArrayView1, ArrayView2};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Rows per leaf before splitting stops
const LEAF_SIZE: usize = 16;

/// A neighbour found by a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Row index in the indexed matrix
    pub index: usize,
    /// Euclidean distance to the query
    pub distance: f64,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        start: usize,
        end: usize,
    },
    Split {
        dim: usize,
        value: f64,
        left: usize,
        right: usize,
    },
}

/// Heap entry ordered by squared distance, then index
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    dist2: f64,
    index: usize,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist2
            .total_cmp(&other.dist2)
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// k-d tree with median splits on the widest dimension.
///
/// Queries are exact under Euclidean distance. Equidistant neighbours are
/// ordered by row index so results do not depend on traversal order.
#[derive(Debug, Clone)]
pub struct KdTree<'a> {
    points: ArrayView2<'a, f64>,
    order: Vec<usize>,
    nodes: Vec<Node>,
    root: usize,
}

impl<'a> KdTree<'a> {
    /// Index every row of `points`
    pub fn build(points: ArrayView2<'a, f64>) -> Result<Self> {
        if points.nrows() == 0 {
            return Err(HarnessError::precondition("cannot index zero rows"));
        }

        let mut tree = Self {
            points,
            order: (0..points.nrows()).collect(),
            nodes: Vec::new(),
            root: 0,
        };
        tree.root = tree.build_node(0, points.nrows());
        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.points.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.points.nrows() == 0
    }

    fn build_node(&mut self, start: usize, end: usize) -> usize {
        if end - start <= LEAF_SIZE {
            return self.push(Node::Leaf { start, end });
        }

        let (dim, spread) = self.widest_dimension(start, end);
        if spread <= 0.0 {
            return self.push(Node::Leaf { start, end });
        }

        let mid = start + (end - start) / 2;
        let points = self.points;
        self.order[start..end].select_nth_unstable_by(mid - start, |&a, &b| {
            points[[a, dim]].total_cmp(&points[[b, dim]])
        });
        let value = points[[self.order[mid], dim]];

        let left = self.build_node(start, mid);
        let right = self.build_node(mid, end);
        self.push(Node::Split {
            dim,
            value,
            left,
            right,
        })
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn widest_dimension(&self, start: usize, end: usize) -> (usize, f64) {
        let mut best = (0, f64::NEG_INFINITY);
        for dim in 0..self.points.ncols() {
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for &row in &self.order[start..end] {
                let v = self.points[[row, dim]];
                lo = lo.min(v);
                hi = hi.max(v);
            }
            if hi - lo > best.1 {
                best = (dim, hi - lo);
            }
        }
        best
    }

    /// The `k` rows closest to `query`, nearest first.
    ///
    /// `exclude` drops one row from consideration, used when the query is
    /// itself an indexed row.
    pub fn nearest(&self, query: ArrayView1<f64>, k: usize, exclude: Option<usize>) -> Result<Vec<Neighbor>> {
        if query.len() != self.points.ncols() {
            return Err(HarnessError::DimensionMismatch {
                context: "neighbour query",
                expected: self.points.ncols(),
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut heap = BinaryHeap::with_capacity(k + 1);
        self.search(self.root, query, k, exclude, &mut heap);

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| Neighbor {
                index: c.index,
                distance: c.dist2.sqrt(),
            })
            .collect())
    }

    fn search(
        &self,
        node: usize,
        query: ArrayView1<f64>,
        k: usize,
        exclude: Option<usize>,
        heap: &mut BinaryHeap<Candidate>,
    ) {
        match self.nodes[node] {
            Node::Leaf { start, end } => {
                for &row in &self.order[start..end] {
                    if exclude == Some(row) {
                        continue;
                    }
                    let candidate = Candidate {
                        dist2: squared_distance(self.points.row(row), query),
                        index: row,
                    };
                    if heap.len() < k {
                        heap.push(candidate);
                    } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                        heap.pop();
                        heap.push(candidate);
                    }
                }
            }
            Node::Split {
                dim,
                value,
                left,
                right,
            } => {
                let diff = query[dim] - value;
                let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };
                self.search(near, query, k, exclude, heap);

                let worst = heap.peek().map(|c| c.dist2).unwrap_or(f64::INFINITY);
                if heap.len() < k || diff * diff <= worst {
                    self.search(far, query, k, exclude, heap);
                }
            }
        }
    }
}

pub fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
