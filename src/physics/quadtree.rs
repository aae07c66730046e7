use eframe::egui::{Vec2, vec2};

const LEAF_CAPACITY: usize = 8;
const MAX_DEPTH: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Square {
    center: Vec2,
    half: f32,
}

impl Square {
    /// Smallest padded square around every point, or `None` if there are no
    /// points or any of them is not finite.
    fn enclosing(points: &[Vec2]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let (min, max) = points.iter().try_fold(
            (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
            |(min, max), point| {
                (point.x.is_finite() && point.y.is_finite()).then(|| (min.min(*point), max.max(*point)))
            },
        )?;

        Some(Self {
            center: (min + max) * 0.5,
            half: ((max - min).max_elem() * 0.5).max(0.5) + 1.0,
        })
    }

    /// Bit 0 is set right of center, bit 1 below it.
    fn quadrant(self, point: Vec2) -> usize {
        usize::from(point.x >= self.center.x) | (usize::from(point.y >= self.center.y) << 1)
    }

    fn subsquare(self, quadrant: usize) -> Self {
        let quarter = self.half * 0.5;
        let sign = |bit: usize| if quadrant & bit != 0 { quarter } else { -quarter };
        Self {
            center: self.center + vec2(sign(1), sign(2)),
            half: quarter,
        }
    }

    /// Squared gap between two squares; zero when they touch or overlap.
    fn gap_sq(self, other: Self) -> f32 {
        let gap = (self.center - other.center).abs() - Vec2::splat(self.half + other.half);
        gap.max(Vec2::ZERO).length_sq()
    }
}

#[derive(Debug)]
struct Cell {
    square: Square,
    depth: usize,
    /// Range into `SpatialTree::order` covering every point inside this cell.
    start: usize,
    end: usize,
    children: Vec<usize>,
}

impl Cell {
    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Region quadtree stored as a flat arena. Points are referenced by their
/// index in the slice the tree was built from; each cell owns a contiguous
/// run of the permuted index buffer.
#[derive(Debug)]
pub(super) struct SpatialTree {
    cells: Vec<Cell>,
    order: Vec<usize>,
}

#[derive(Clone, Copy, Debug)]
pub struct QuadtreeCell {
    pub center: Vec2,
    pub half_extent: f32,
    pub depth: usize,
    pub is_leaf: bool,
}

impl SpatialTree {
    pub(super) fn build(positions: &[Vec2]) -> Option<Self> {
        let square = Square::enclosing(positions)?;
        let mut tree = Self {
            cells: Vec::new(),
            order: (0..positions.len()).collect(),
        };
        tree.subdivide(square, 0, positions.len(), 0, positions);
        Some(tree)
    }

    fn subdivide(
        &mut self,
        square: Square,
        start: usize,
        end: usize,
        depth: usize,
        positions: &[Vec2],
    ) -> usize {
        let id = self.cells.len();
        self.cells.push(Cell {
            square,
            depth,
            start,
            end,
            children: Vec::new(),
        });
        if depth >= MAX_DEPTH || end - start <= LEAF_CAPACITY {
            return id;
        }

        let mut counts = [0usize; 4];
        for &index in &self.order[start..end] {
            counts[square.quadrant(positions[index])] += 1;
        }
        if counts.iter().filter(|&&count| count > 0).count() <= 1 {
            return id;
        }

        self.order[start..end].sort_by_key(|&index| square.quadrant(positions[index]));
        let mut children = Vec::with_capacity(4);
        let mut cursor = start;
        for (quadrant, count) in counts.into_iter().enumerate() {
            if count == 0 {
                continue;
            }
            children.push(self.subdivide(
                square.subsquare(quadrant),
                cursor,
                cursor + count,
                depth + 1,
                positions,
            ));
            cursor += count;
        }
        self.cells[id].children = children;
        id
    }

    fn members(&self, cell: &Cell) -> &[usize] {
        &self.order[cell.start..cell.end]
    }

    /// Calls `visit(i, j)` once for every unordered pair of points whose
    /// cells lie within `reach` of each other. Pairs in distant cells are
    /// never visited; pairs in nearby cells still need a distance check.
    pub(super) fn for_each_close_pair(&self, reach: f32, mut visit: impl FnMut(usize, usize)) {
        if self.cells.is_empty() {
            return;
        }
        let reach_sq = reach * reach;
        let mut pending = vec![(0usize, 0usize)];

        while let Some((a, b)) = pending.pop() {
            let first = &self.cells[a];
            let second = &self.cells[b];
            if first.square.gap_sq(second.square) > reach_sq {
                continue;
            }

            if a == b {
                if first.is_leaf() {
                    let members = self.members(first);
                    for (offset, &i) in members.iter().enumerate() {
                        for &j in &members[offset + 1..] {
                            visit(i, j);
                        }
                    }
                } else {
                    for (offset, &x) in first.children.iter().enumerate() {
                        pending.push((x, x));
                        for &y in &first.children[offset + 1..] {
                            pending.push((x, y));
                        }
                    }
                }
                continue;
            }

            match (first.is_leaf(), second.is_leaf()) {
                (true, true) => {
                    for &i in self.members(first) {
                        for &j in self.members(second) {
                            visit(i, j);
                        }
                    }
                }
                (false, true) => pending.extend(first.children.iter().map(|&x| (x, b))),
                (true, false) => pending.extend(second.children.iter().map(|&y| (a, y))),
                (false, false) if first.square.half >= second.square.half => {
                    pending.extend(first.children.iter().map(|&x| (x, b)));
                }
                (false, false) => pending.extend(second.children.iter().map(|&y| (a, y))),
            }
        }
    }

    pub(super) fn overlay(&self) -> Vec<QuadtreeCell> {
        self.cells
            .iter()
            .map(|cell| QuadtreeCell {
                center: cell.square.center,
                half_extent: cell.square.half,
                depth: cell.depth,
                is_leaf: cell.is_leaf(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn grid(count: usize) -> Vec<Vec2> {
        (0..count)
            .map(|index| vec2((index % 7) as f32 * 13.0, (index / 7) as f32 * 17.0))
            .collect()
    }

    #[test]
    fn leaves_partition_the_points() {
        let positions = grid(50);
        let tree = SpatialTree::build(&positions).unwrap();

        let mut seen = tree
            .cells
            .iter()
            .filter(|cell| cell.is_leaf())
            .flat_map(|cell| tree.members(cell).iter().copied())
            .collect::<Vec<_>>();
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
        assert!(tree.cells.len() > 1);
    }

    #[test]
    fn close_pairs_match_brute_force() {
        let positions = grid(60);
        let reach = 20.0;
        let tree = SpatialTree::build(&positions).unwrap();

        let mut visited = BTreeSet::new();
        tree.for_each_close_pair(reach, |i, j| {
            if (positions[i] - positions[j]).length() < reach {
                assert!(visited.insert((i.min(j), i.max(j))), "pair visited twice");
            }
        });

        let mut expected = BTreeSet::new();
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                if (positions[i] - positions[j]).length() < reach {
                    expected.insert((i, j));
                }
            }
        }
        assert_eq!(visited, expected);
    }

    #[test]
    fn coincident_points_stay_in_one_leaf() {
        let positions = vec![vec2(5.0, 5.0); 40];
        let tree = SpatialTree::build(&positions).unwrap();
        assert_eq!(tree.cells.len(), 1);

        let mut pairs = 0;
        tree.for_each_close_pair(1.0, |_, _| pairs += 1);
        assert_eq!(pairs, 40 * 39 / 2);
    }

    #[test]
    fn non_finite_points_yield_no_tree() {
        assert!(SpatialTree::build(&[vec2(f32::NAN, 0.0)]).is_none());
        assert!(SpatialTree::build(&[]).is_none());
    }
}
