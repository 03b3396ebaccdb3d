/// Prim's algorithm over a dense distance function, O(n^2) by design: net
/// connection-point counts are tens to low hundreds, where the flat arrays
/// beat a heap.
pub struct MinSpanTree {
    in_tree: Vec<bool>,
    linked_to: Vec<usize>,
    dist_to: Vec<f64>,
}

impl MinSpanTree {
    /// Node 0 roots the tree and starts in it.
    pub fn new(node_count: usize) -> Self {
        let mut tree = Self {
            in_tree: vec![false; node_count],
            linked_to: vec![0; node_count],
            dist_to: vec![f64::INFINITY; node_count],
        };
        if node_count > 0 {
            tree.in_tree[0] = true;
            tree.dist_to[0] = 0.0;
        }
        tree
    }

    pub fn node_count(&self) -> usize {
        self.in_tree.len()
    }

    /// Grows the tree with the caller's distance function. `weight` must be
    /// symmetric and satisfy `weight(i, i) == 0`.
    pub fn build<W>(&mut self, weight: W)
    where
        W: Fn(usize, usize) -> f64,
    {
        let n = self.in_tree.len();
        if n < 2 {
            return;
        }

        for j in 1..n {
            self.dist_to[j] = weight(0, j);
            self.linked_to[j] = 0;
        }

        for _ in 1..n {
            let mut next = None;
            let mut best = f64::INFINITY;
            for j in 1..n {
                if !self.in_tree[j] && self.dist_to[j] < best {
                    best = self.dist_to[j];
                    next = Some(j);
                }
            }
            let Some(u) = next else { break };
            self.in_tree[u] = true;

            for j in 1..n {
                if !self.in_tree[j] {
                    let w = weight(u, j);
                    if w < self.dist_to[j] {
                        self.dist_to[j] = w;
                        self.linked_to[j] = u;
                    }
                }
            }
        }
    }

    /// The n-1 tree edges `(node, linked_to[node], dist_to[node])`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (1..self.in_tree.len()).map(|i| (i, self.linked_to[i], self.dist_to[i]))
    }

    pub fn total_weight(&self) -> f64 {
        self.edges().map(|(_, _, w)| w).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcb_common::geom::point::Point;

    fn manhattan(points: &[Point<f64>]) -> impl Fn(usize, usize) -> f64 + '_ {
        move |i, j| points[i].manhattan(&points[j])
    }

    #[test]
    fn produces_n_minus_one_edges() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(3.0, 0.0),
            Point::new(3.0, 4.0),
            Point::new(10.0, 10.0),
            Point::new(-2.0, 1.0),
        ];
        let mut mst = MinSpanTree::new(points.len());
        mst.build(manhattan(&points));
        assert_eq!(mst.edges().count(), points.len() - 1);
        assert!(mst.edges().all(|(_, _, w)| w.is_finite()));
    }

    #[test]
    fn chain_picks_neighbor_links() {
        // Collinear points: the optimal tree is the chain, total span 30.
        let points: Vec<_> = (0..4).map(|i| Point::new(i as f64 * 10.0, 0.0)).collect();
        let mut mst = MinSpanTree::new(points.len());
        mst.build(manhattan(&points));
        assert_eq!(mst.total_weight(), 30.0);
        for (i, j, w) in mst.edges() {
            assert_eq!(w, 10.0);
            assert_eq!(i.abs_diff(j), 1);
        }
    }

    #[test]
    fn beats_naive_star_tree() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(101.0, 1.0),
            Point::new(102.0, 0.0),
        ];
        let mut mst = MinSpanTree::new(points.len());
        mst.build(manhattan(&points));

        let star: f64 = (1..points.len())
            .map(|i| points[0].manhattan(&points[i]))
            .sum();
        assert!(mst.total_weight() < star);
        // 100 to reach the far group, then 2 + 2 within it.
        assert_eq!(mst.total_weight(), 104.0);
    }

    #[test]
    fn zero_weight_edges_come_first() {
        // Nodes 0..=1 and 2..=3 are pre-connected pairs (weight zero inside
        // a pair); the tree must use the zero edges and exactly one
        // crossing edge.
        let cluster_of = [0usize, 0, 1, 1];
        let pos = [0.0f64, 0.0, 7.0, 7.0];
        let mut mst = MinSpanTree::new(4);
        mst.build(|i, j| {
            if cluster_of[i] == cluster_of[j] {
                0.0
            } else {
                (pos[i] - pos[j]).abs()
            }
        });
        let crossing: Vec<_> = mst
            .edges()
            .filter(|&(i, j, _)| cluster_of[i] != cluster_of[j])
            .collect();
        assert_eq!(crossing.len(), 1);
        assert_eq!(crossing[0].2, 7.0);
    }

    #[test]
    fn trivial_sizes() {
        let mut empty = MinSpanTree::new(0);
        empty.build(|_, _| 0.0);
        assert_eq!(empty.edges().count(), 0);

        let mut single = MinSpanTree::new(1);
        single.build(|_, _| 0.0);
        assert_eq!(single.edges().count(), 0);
    }
}
