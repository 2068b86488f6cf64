//! Static bounding volume hierarchy for 2D geometry.
//!
//! A [`Bvh`] is built once over a set of immutable primitives and queried
//! many times; it is never mutated after construction, so concurrent queries
//! need no synchronization. Construction uses a deterministic median split
//! along the axis of greatest centroid extent, giving `O(log n + k)` queries
//! on a balanced build.

use crate::geom::Bounds2d;

/// Anything that exposes an axis-aligned bounding box.
///
/// The returned bounds must be stable: the BVH caches them at construction
/// time and never asks again.
pub trait Boundable {
    fn bounds(&self) -> Bounds2d;
}

#[derive(Debug)]
enum Node<T> {
    Leaf {
        bounds: Bounds2d,
        item: T,
    },
    Branch {
        bounds: Bounds2d,
        left: Box<Node<T>>,
        right: Box<Node<T>>,
    },
}

impl<T> Node<T> {
    fn bounds(&self) -> &Bounds2d {
        match self {
            Node::Leaf { bounds, .. } => bounds,
            Node::Branch { bounds, .. } => bounds,
        }
    }
}

/// A static spatial index over immutable primitives.
///
/// An empty build yields a tree with [`Bounds2d::EMPTY`] bounds that matches
/// nothing.
#[derive(Debug)]
pub struct Bvh<T> {
    root: Option<Node<T>>,
    bounds: Bounds2d,
    len: usize,
}

impl<T: Boundable> Bvh<T> {
    /// Builds a BVH over the given primitives.
    ///
    /// Deterministic and total: zero, one or many primitives are all valid
    /// inputs, and the same input always produces the same tree.
    pub fn build(items: Vec<T>) -> Self {
        let len = items.len();
        let mut entries: Vec<(Bounds2d, T)> = items.into_iter().map(|item| (item.bounds(), item)).collect();

        let mut bounds = Bounds2d::EMPTY;
        for (item_bounds, _) in &entries {
            bounds = bounds.union(item_bounds);
        }

        let root = if entries.is_empty() {
            None
        } else {
            Some(Self::build_node(&mut entries))
        };

        Self { root, bounds, len }
    }

    fn build_node(entries: &mut Vec<(Bounds2d, T)>) -> Node<T> {
        if entries.len() == 1 {
            let (bounds, item) = entries.pop().expect("non-empty");
            return Node::Leaf { bounds, item };
        }

        // Split at the centroid median of the axis with the greatest extent.
        let centroid_bounds = entries
            .iter()
            .fold(Bounds2d::EMPTY, |acc, (b, _)| acc.including(b.center()));
        let split_x = centroid_bounds.max_x() - centroid_bounds.min_x()
            >= centroid_bounds.max_z() - centroid_bounds.min_z();

        let mid = entries.len() / 2;
        entries.select_nth_unstable_by(mid, |(a, _), (b, _)| {
            let (ca, cb) = (a.center(), b.center());
            if split_x {
                ca.x.total_cmp(&cb.x).then(ca.z.total_cmp(&cb.z))
            } else {
                ca.z.total_cmp(&cb.z).then(ca.x.total_cmp(&cb.x))
            }
        });

        let mut upper = entries.split_off(mid);
        let left = Box::new(Self::build_node(entries));
        let right = Box::new(Self::build_node(&mut upper));
        let bounds = left.bounds().union(right.bounds());
        Node::Branch { bounds, left, right }
    }
}

impl<T> Bvh<T> {
    /// Number of primitives in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Union of all primitive bounds; [`Bounds2d::EMPTY`] for an empty tree.
    pub fn bounds(&self) -> &Bounds2d {
        &self.bounds
    }

    /// Invokes `visit` for every primitive whose bounds intersect `query`.
    ///
    /// Each matching primitive is visited exactly once; primitives whose
    /// bounds do not intersect are never visited. A subtree is descended only
    /// if its stored bounds intersect the query.
    pub fn for_each_intersecting(&self, query: &Bounds2d, mut visit: impl FnMut(&T)) {
        if let Some(root) = &self.root {
            Self::visit_node(root, query, &mut visit);
        }
    }

    /// Collects every primitive whose bounds intersect `query`.
    pub fn intersecting(&self, query: &Bounds2d) -> Vec<&T> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            Self::visit_node(root, query, &mut |item| out.push(item));
        }
        out
    }

    fn visit_node<'a>(node: &'a Node<T>, query: &Bounds2d, visit: &mut impl FnMut(&'a T)) {
        match node {
            Node::Leaf { bounds, item } => {
                if bounds.intersects(query) {
                    visit(item);
                }
            }
            Node::Branch { bounds, left, right } => {
                if bounds.intersects(query) {
                    Self::visit_node(left, query, visit);
                    Self::visit_node(right, query, visit);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Rect {
        id: usize,
        bounds: Bounds2d,
    }

    impl Boundable for Rect {
        fn bounds(&self) -> Bounds2d {
            self.bounds
        }
    }

    /// Deterministic pseudo-random sequence for reproducible geometry.
    struct Lcg(u64);

    impl Lcg {
        fn next_f64(&mut self) -> f64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 11) as f64 / (1u64 << 53) as f64
        }

        fn rect(&mut self, id: usize) -> Rect {
            let x = self.next_f64() * 200.0 - 100.0;
            let z = self.next_f64() * 200.0 - 100.0;
            let w = self.next_f64() * 10.0;
            let h = self.next_f64() * 10.0;
            Rect {
                id,
                bounds: Bounds2d::of(x, x + w, z, z + h),
            }
        }
    }

    #[test]
    fn test_empty_tree_matches_nothing() {
        let bvh: Bvh<Rect> = Bvh::build(Vec::new());
        assert!(bvh.is_empty());
        assert!(bvh.bounds().is_empty());
        assert!(bvh.intersecting(&Bounds2d::of(-1e9, 1e9, -1e9, 1e9)).is_empty());
    }

    #[test]
    fn test_single_item() {
        let rect = Rect {
            id: 0,
            bounds: Bounds2d::of(0.0, 1.0, 0.0, 1.0),
        };
        let bvh = Bvh::build(vec![rect]);
        assert_eq!(bvh.len(), 1);
        assert_eq!(bvh.intersecting(&Bounds2d::of(0.5, 2.0, 0.5, 2.0)).len(), 1);
        assert!(bvh.intersecting(&Bounds2d::of(5.0, 6.0, 5.0, 6.0)).is_empty());
    }

    #[test]
    fn test_matches_brute_force_scan() {
        let mut rng = Lcg(0xdead_beef);
        let rects: Vec<Rect> = (0..500).map(|id| rng.rect(id)).collect();
        let bvh = Bvh::build(rects.clone());

        for _ in 0..200 {
            let x = rng.next_f64() * 220.0 - 110.0;
            let z = rng.next_f64() * 220.0 - 110.0;
            let query = Bounds2d::of(x, x + rng.next_f64() * 30.0, z, z + rng.next_f64() * 30.0);

            let mut expected: Vec<usize> = rects
                .iter()
                .filter(|r| r.bounds.intersects(&query))
                .map(|r| r.id)
                .collect();
            expected.sort_unstable();

            let mut actual: Vec<usize> = bvh.intersecting(&query).iter().map(|r| r.id).collect();
            actual.sort_unstable();

            assert_eq!(actual, expected, "query {:?}", query);
        }
    }

    #[test]
    fn test_no_duplicates() {
        let mut rng = Lcg(42);
        let rects: Vec<Rect> = (0..100).map(|id| rng.rect(id)).collect();
        let bvh = Bvh::build(rects);

        let all = bvh.intersecting(&Bounds2d::of(-200.0, 200.0, -200.0, 200.0));
        let mut ids: Vec<usize> = all.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 100, "every rect returned exactly once");
    }

    #[test]
    fn test_tree_bounds_is_union() {
        let a = Rect {
            id: 0,
            bounds: Bounds2d::of(-5.0, -4.0, 0.0, 1.0),
        };
        let b = Rect {
            id: 1,
            bounds: Bounds2d::of(3.0, 7.0, -2.0, 2.0),
        };
        let bvh = Bvh::build(vec![a, b]);
        assert_eq!(*bvh.bounds(), Bounds2d::of(-5.0, 7.0, -2.0, 2.0));
    }
}
