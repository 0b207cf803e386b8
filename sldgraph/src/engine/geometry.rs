//! Geometry Index
//!
//! Uniform-grid spatial index over bounding-box centers. Supports
//! k-nearest-neighbour and fixed-radius queries keyed by component id.
//! Results are ordered by distance, ties broken by ascending id, so every
//! query is deterministic.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::{Component, Point};

/// A component returned by a proximity query
#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a> {
    pub component: &'a Component,
    /// Center-to-center Euclidean distance in pixels
    pub distance: f64,
}

#[derive(Debug)]
pub struct GeometryIndex<'a> {
    entries: Vec<(&'a Component, Point)>,
    positions: HashMap<&'a str, usize>,
    cells: HashMap<(i64, i64), Vec<usize>>,
    cell_size: f64,
    cell_bounds: Option<((i64, i64), (i64, i64))>,
}

impl<'a> GeometryIndex<'a> {
    /// Build the index with a cell size derived from the mean box size
    pub fn build(components: &'a [Component]) -> Self {
        let sizes: Vec<f64> = components
            .iter()
            .map(|c| c.bounding_box.width().max(c.bounding_box.height()))
            .filter(|s| s.is_finite() && *s > 0.0)
            .collect();
        let cell_size = if sizes.is_empty() {
            1.0
        } else {
            (sizes.iter().sum::<f64>() / sizes.len() as f64).max(1.0)
        };
        Self::with_cell_size(components, cell_size)
    }

    pub fn with_cell_size(components: &'a [Component], cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 { cell_size } else { 1.0 };
        let mut index = Self {
            entries: Vec::with_capacity(components.len()),
            positions: HashMap::with_capacity(components.len()),
            cells: HashMap::new(),
            cell_size,
            cell_bounds: None,
        };

        for component in components {
            let center = component.center();
            if !(center.x.is_finite() && center.y.is_finite()) {
                continue;
            }
            if index.positions.contains_key(component.id.as_str()) {
                continue;
            }
            let slot = index.entries.len();
            let cell = index.cell_of(&center);
            index.entries.push((component, center));
            index.positions.insert(component.id.as_str(), slot);
            index.cells.entry(cell).or_default().push(slot);
            index.cell_bounds = Some(match index.cell_bounds {
                None => (cell, cell),
                Some((lo, hi)) => (
                    (lo.0.min(cell.0), lo.1.min(cell.1)),
                    (hi.0.max(cell.0), hi.1.max(cell.1)),
                ),
            });
        }

        index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&'a Component> {
        self.positions.get(id).map(|&slot| self.entries[slot].0)
    }

    pub fn center(&self, id: &str) -> Option<Point> {
        self.positions.get(id).map(|&slot| self.entries[slot].1)
    }

    /// The `k` components nearest to `id`, excluding `id` itself.
    ///
    /// Unknown ids and `k == 0` yield an empty result. Sparse layouts fall
    /// back to a linear scan once the ring walk would visit more cells than
    /// there are entries, so a query never costs more than O(n) cells.
    pub fn k_nearest(&self, id: &str, k: usize) -> Vec<Neighbor<'a>> {
        let Some(&query) = self.positions.get(id) else {
            return Vec::new();
        };
        if k == 0 || self.entries.len() < 2 {
            return Vec::new();
        }

        let origin = self.entries[query].1;
        let (cx, cy) = self.cell_of(&origin);
        let max_ring = self.max_ring_from((cx, cy));
        let mut found: Vec<(f64, usize)> = Vec::new();
        let mut visited: usize = 0;

        for ring in 0..=max_ring {
            let ring_len = if ring == 0 { 1 } else { 8 * ring as usize };
            if ring > 0 && visited + ring_len > self.entries.len() {
                return self.k_nearest_linear(query, k);
            }
            visited += ring_len;

            for cell in ring_cells((cx, cy), ring) {
                let Some(slots) = self.cells.get(&cell) else {
                    continue;
                };
                for &slot in slots {
                    if slot != query {
                        found.push((origin.distance_to(&self.entries[slot].1), slot));
                    }
                }
            }

            // Anything not yet visited lies at least `ring * cell_size` away.
            if found.len() >= k {
                self.sort_hits(&mut found);
                if found[k - 1].0 < ring as f64 * self.cell_size {
                    break;
                }
            }
        }

        self.sort_hits(&mut found);
        found.truncate(k);
        self.to_neighbors(found)
    }

    fn k_nearest_linear(&self, query: usize, k: usize) -> Vec<Neighbor<'a>> {
        let origin = self.entries[query].1;
        let mut found: Vec<(f64, usize)> = (0..self.entries.len())
            .filter(|&slot| slot != query)
            .map(|slot| (origin.distance_to(&self.entries[slot].1), slot))
            .collect();
        self.sort_hits(&mut found);
        found.truncate(k);
        self.to_neighbors(found)
    }

    /// Every component whose center lies within `radius` of `id` (inclusive)
    pub fn within_radius(&self, id: &str, radius: f64) -> Vec<Neighbor<'a>> {
        let Some(&query) = self.positions.get(id) else {
            return Vec::new();
        };
        if !(radius.is_finite() && radius >= 0.0) {
            return Vec::new();
        }

        let origin = self.entries[query].1;
        let lo = self.cell_of(&Point::new(origin.x - radius, origin.y - radius));
        let hi = self.cell_of(&Point::new(origin.x + radius, origin.y + radius));
        let mut found = Vec::new();

        for gx in lo.0..=hi.0 {
            for gy in lo.1..=hi.1 {
                let Some(slots) = self.cells.get(&(gx, gy)) else {
                    continue;
                };
                for &slot in slots {
                    if slot == query {
                        continue;
                    }
                    let distance = origin.distance_to(&self.entries[slot].1);
                    if distance <= radius {
                        found.push((distance, slot));
                    }
                }
            }
        }

        self.sort_hits(&mut found);
        self.to_neighbors(found)
    }

    fn cell_of(&self, point: &Point) -> (i64, i64) {
        (
            (point.x / self.cell_size).floor() as i64,
            (point.y / self.cell_size).floor() as i64,
        )
    }

    fn max_ring_from(&self, cell: (i64, i64)) -> i64 {
        match self.cell_bounds {
            None => 0,
            Some((lo, hi)) => (cell.0 - lo.0)
                .max(hi.0 - cell.0)
                .max(cell.1 - lo.1)
                .max(hi.1 - cell.1)
                .max(0),
        }
    }

    fn sort_hits(&self, hits: &mut [(f64, usize)]) {
        hits.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| self.entries[a.1].0.id.cmp(&self.entries[b.1].0.id))
        });
    }

    fn to_neighbors(&self, hits: Vec<(f64, usize)>) -> Vec<Neighbor<'a>> {
        hits.into_iter()
            .map(|(distance, slot)| Neighbor {
                component: self.entries[slot].0,
                distance,
            })
            .collect()
    }
}

/// Cells at Chebyshev distance exactly `ring` from `center`
fn ring_cells(center: (i64, i64), ring: i64) -> Vec<(i64, i64)> {
    if ring == 0 {
        return vec![center];
    }
    let mut cells = Vec::with_capacity((8 * ring) as usize);
    for dx in -ring..=ring {
        cells.push((center.0 + dx, center.1 - ring));
        cells.push((center.0 + dx, center.1 + ring));
    }
    for dy in (-ring + 1)..ring {
        cells.push((center.0 - ring, center.1 + dy));
        cells.push((center.0 + ring, center.1 + dy));
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, ComponentType};

    fn square(id: &str, x: f64, y: f64) -> Component {
        Component::new(id, ComponentType::Node, BoundingBox::new(x - 5.0, y - 5.0, x + 5.0, y + 5.0)).verified()
    }

    fn ids(neighbors: &[Neighbor<'_>]) -> Vec<String> {
        neighbors.iter().map(|n| n.component.id.clone()).collect()
    }

    #[test]
    fn test_empty_and_singleton() {
        let empty: Vec<Component> = Vec::new();
        let index = GeometryIndex::build(&empty);
        assert!(index.is_empty());
        assert!(index.k_nearest("a", 3).is_empty());
        assert!(index.within_radius("a", 100.0).is_empty());

        let one = vec![square("a", 0.0, 0.0)];
        let index = GeometryIndex::build(&one);
        assert_eq!(index.len(), 1);
        assert!(index.k_nearest("a", 3).is_empty());
        assert!(index.within_radius("a", 100.0).is_empty());
    }

    #[test]
    fn test_k_nearest_orders_by_distance() {
        let components = vec![
            square("a", 0.0, 0.0),
            square("b", 100.0, 0.0),
            square("c", 30.0, 0.0),
            square("d", 0.0, 60.0),
            square("e", 500.0, 500.0),
        ];
        let index = GeometryIndex::build(&components);

        let nearest = index.k_nearest("a", 3);
        assert_eq!(ids(&nearest), vec!["c", "d", "b"]);
        assert!((nearest[0].distance - 30.0).abs() < 1e-9);

        // k larger than the population returns everyone else
        assert_eq!(index.k_nearest("a", 10).len(), 4);
    }

    #[test]
    fn test_k_nearest_breaks_ties_by_id() {
        let components = vec![
            square("q", 0.0, 0.0),
            square("z", 50.0, 0.0),
            square("m", -50.0, 0.0),
            square("b", 0.0, 50.0),
        ];
        let index = GeometryIndex::build(&components);
        assert_eq!(ids(&index.k_nearest("q", 2)), vec!["b", "m"]);
    }

    #[test]
    fn test_k_nearest_matches_brute_force() {
        let mut components = Vec::new();
        for i in 0..40 {
            let x = ((i * 37) % 113) as f64 * 7.0;
            let y = ((i * 53) % 97) as f64 * 5.0;
            components.push(square(&format!("n{:02}", i), x, y));
        }
        let index = GeometryIndex::with_cell_size(&components, 13.0);

        for query in &components {
            let mut brute: Vec<(f64, &str)> = components
                .iter()
                .filter(|c| c.id != query.id)
                .map(|c| (query.center().distance_to(&c.center()), c.id.as_str()))
                .collect();
            brute.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then(a.1.cmp(b.1)));
            let expected: Vec<String> = brute.iter().take(5).map(|(_, id)| id.to_string()).collect();

            assert_eq!(ids(&index.k_nearest(&query.id, 5)), expected, "query {}", query.id);
        }
    }

    #[test]
    fn test_within_radius_is_inclusive() {
        let components = vec![
            square("a", 0.0, 0.0),
            square("b", 50.0, 0.0),
            square("c", 51.0, 0.0),
        ];
        let index = GeometryIndex::build(&components);
        assert_eq!(ids(&index.within_radius("a", 50.0)), vec!["b"]);
        assert_eq!(ids(&index.within_radius("a", 60.0)), vec!["b", "c"]);
        assert!(index.within_radius("a", -1.0).is_empty());
    }

    #[test]
    fn test_k_nearest_with_far_outlier() {
        let components = vec![
            square("s", 0.0, 0.0),
            square("b", 20.0, 0.0),
            square("far", 1.0e9, 0.0),
        ];
        let index = GeometryIndex::build(&components);

        assert_eq!(ids(&index.k_nearest("s", 4)), vec!["b", "far"]);
        assert_eq!(ids(&index.k_nearest("far", 1)), vec!["b"]);
        let hits = index.k_nearest("b", 2);
        assert_eq!(ids(&hits), vec!["s", "far"]);
        assert!((hits[1].distance - (1.0e9 - 20.0)).abs() < 1e-3);
    }

    #[test]
    fn test_linear_fallback_matches_ring_walk() {
        let mut components: Vec<Component> = (0..12)
            .map(|i| square(&format!("n{:02}", i), (i % 4) as f64 * 15.0, (i / 4) as f64 * 15.0))
            .collect();
        components.push(square("z", 5.0e4, 5.0e4));
        let index = GeometryIndex::with_cell_size(&components, 10.0);

        for query in &components {
            let mut brute: Vec<(f64, &str)> = components
                .iter()
                .filter(|c| c.id != query.id)
                .map(|c| (query.center().distance_to(&c.center()), c.id.as_str()))
                .collect();
            brute.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then(a.1.cmp(b.1)));
            let expected: Vec<String> = brute.iter().take(4).map(|(_, id)| id.to_string()).collect();

            assert_eq!(ids(&index.k_nearest(&query.id, 4)), expected, "query {}", query.id);
        }
    }
}
