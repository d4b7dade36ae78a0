use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bucket edge length in grid cells
const DEFAULT_BUCKET_SIZE: i32 = 4;

/// Proximity index tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    pub bucket_size: i32,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            bucket_size: DEFAULT_BUCKET_SIZE,
        }
    }
}

/// Kind of thing stored in the proximity index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Bot,
    Prop,
    Door,
}

/// A point-like entity in grid space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityEntry {
    pub id: String,
    pub x: f64,
    pub z: f64,
    pub entry_type: EntryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl ProximityEntry {
    pub fn new(id: impl Into<String>, x: f64, z: f64, entry_type: EntryType) -> Self {
        Self {
            id: id.into(),
            x,
            z,
            entry_type,
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Parameters of a radius query
#[derive(Debug, Clone, Copy)]
pub struct RadiusQuery<'a> {
    pub x: f64,
    pub z: f64,
    pub radius: f64,
    pub entry_type: Option<EntryType>,
    pub exclude_id: Option<&'a str>,
}

impl<'a> RadiusQuery<'a> {
    pub fn new(x: f64, z: f64, radius: f64) -> Self {
        Self {
            x,
            z,
            radius,
            entry_type: None,
            exclude_id: None,
        }
    }

    pub fn of_type(mut self, entry_type: EntryType) -> Self {
        self.entry_type = Some(entry_type);
        self
    }

    pub fn excluding(mut self, id: &'a str) -> Self {
        self.exclude_id = Some(id);
        self
    }
}

/// One match of a radius query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityHit {
    pub id: String,
    pub distance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Spatial hash over fixed-size buckets for radius queries.
///
/// Instead of checking every entity we only visit the buckets overlapping
/// the query's bounding square. Results come back unordered.
#[derive(Debug)]
pub struct ProximityGrid {
    bucket_size: i32,
    buckets: HashMap<(i32, i32), Vec<String>>,
    entries: HashMap<String, ProximityEntry>,
}

impl ProximityGrid {
    pub fn new() -> Self {
        Self::with_bucket_size(DEFAULT_BUCKET_SIZE)
    }

    pub fn with_bucket_size(bucket_size: i32) -> Self {
        Self {
            bucket_size: bucket_size.max(1),
            buckets: HashMap::new(),
            entries: HashMap::new(),
        }
    }

    fn bucket_of(&self, x: f64, z: f64) -> (i32, i32) {
        let size = self.bucket_size as f64;
        ((x / size).floor() as i32, (z / size).floor() as i32)
    }

    /// Insert an entry, replacing any entry with the same id
    pub fn insert(&mut self, entry: ProximityEntry) {
        self.remove(&entry.id);
        let bucket = self.bucket_of(entry.x, entry.z);
        self.buckets.entry(bucket).or_default().push(entry.id.clone());
        self.entries.insert(entry.id.clone(), entry);
    }

    /// Remove an entry; returns false if it was not present
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };
        let bucket = self.bucket_of(entry.x, entry.z);
        self.detach(bucket, id);
        true
    }

    fn detach(&mut self, bucket: (i32, i32), id: &str) {
        if let Some(ids) = self.buckets.get_mut(&bucket) {
            if let Some(i) = ids.iter().position(|other| other == id) {
                ids.swap_remove(i);
            }
            if ids.is_empty() {
                self.buckets.remove(&bucket);
            }
        }
    }

    /// Move an entry; rebuckets only when the bucket changes
    pub fn update(&mut self, id: &str, x: f64, z: f64) -> bool {
        let (old_bucket, new_bucket) = match self.entries.get(id) {
            Some(entry) => (self.bucket_of(entry.x, entry.z), self.bucket_of(x, z)),
            None => return false,
        };

        if old_bucket != new_bucket {
            self.detach(old_bucket, id);
            self.buckets.entry(new_bucket).or_default().push(id.to_string());
        }

        if let Some(entry) = self.entries.get_mut(id) {
            entry.x = x;
            entry.z = z;
        }
        true
    }

    pub fn get(&self, id: &str) -> Option<&ProximityEntry> {
        self.entries.get(id)
    }

    /// Every entry within `radius` of the query point, in no particular order
    pub fn query_radius(&self, query: &RadiusQuery) -> Vec<ProximityHit> {
        let mut hits = Vec::new();
        if query.radius < 0.0 {
            return hits;
        }

        let (min_bx, min_bz) = self.bucket_of(query.x - query.radius, query.z - query.radius);
        let (max_bx, max_bz) = self.bucket_of(query.x + query.radius, query.z + query.radius);

        for bx in min_bx..=max_bx {
            for bz in min_bz..=max_bz {
                let Some(ids) = self.buckets.get(&(bx, bz)) else {
                    continue;
                };
                for id in ids {
                    if query.exclude_id == Some(id.as_str()) {
                        continue;
                    }
                    let Some(entry) = self.entries.get(id) else {
                        continue;
                    };
                    if query.entry_type.is_some_and(|t| t != entry.entry_type) {
                        continue;
                    }
                    let dx = entry.x - query.x;
                    let dz = entry.z - query.z;
                    let distance = (dx * dx + dz * dz).sqrt();
                    if distance <= query.radius {
                        hits.push(ProximityHit {
                            id: id.clone(),
                            distance,
                            meta: entry.meta.clone(),
                        });
                    }
                }
            }
        }

        hits
    }

    /// Number of entries in the index
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of indexed entries of one type
    pub fn count_of(&self, entry_type: EntryType) -> usize {
        self.entries
            .values()
            .filter(|e| e.entry_type == entry_type)
            .count()
    }

    /// Clear all buckets and entries
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.entries.clear();
    }
}

impl Default for ProximityGrid {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    #[test]
    fn test_insert_and_query() {
        let mut grid = ProximityGrid::new();
        grid.insert(ProximityEntry::new("a", 1.0, 1.0, EntryType::Bot));
        grid.insert(ProximityEntry::new("b", 2.0, 1.0, EntryType::Bot));
        grid.insert(ProximityEntry::new("c", 9.0, 9.0, EntryType::Bot));

        let hits = grid.query_radius(&RadiusQuery::new(1.0, 1.0, 2.0));
        let ids: HashSet<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, HashSet::from(["a", "b"]));
    }

    #[test]
    fn test_query_filters_type_and_self() {
        let mut grid = ProximityGrid::new();
        grid.insert(ProximityEntry::new("me", 5.0, 5.0, EntryType::Bot));
        grid.insert(ProximityEntry::new("other", 6.0, 5.0, EntryType::Bot));
        grid.insert(ProximityEntry::new("desk", 5.0, 6.0, EntryType::Prop));
        grid.insert(ProximityEntry::new("door-0", 4.0, 5.0, EntryType::Door));

        let query = RadiusQuery::new(5.0, 5.0, 3.0)
            .of_type(EntryType::Bot)
            .excluding("me");
        let hits = grid.query_radius(&query);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "other");
        assert_eq!(hits[0].distance, 1.0);
    }

    #[test]
    fn test_update_moves_between_buckets() {
        let mut grid = ProximityGrid::with_bucket_size(4);
        grid.insert(ProximityEntry::new("bot", 1.0, 1.0, EntryType::Bot));
        assert!(grid.update("bot", 13.0, 13.0));

        assert!(grid.query_radius(&RadiusQuery::new(1.0, 1.0, 1.5)).is_empty());
        let hits = grid.query_radius(&RadiusQuery::new(13.0, 13.0, 0.5));
        assert_eq!(hits.len(), 1);
        assert!(!grid.update("ghost", 1.0, 1.0));
    }

    #[test]
    fn test_remove_and_reinsert() {
        let mut grid = ProximityGrid::new();
        grid.insert(ProximityEntry::new("bot", 3.0, 3.0, EntryType::Bot));
        grid.insert(ProximityEntry::new("bot", 7.0, 3.0, EntryType::Bot));
        assert_eq!(grid.len(), 1);
        assert!(grid.remove("bot"));
        assert!(!grid.remove("bot"));
        assert!(grid.is_empty());
        assert!(grid.query_radius(&RadiusQuery::new(7.0, 3.0, 5.0)).is_empty());
    }

    #[test]
    fn test_boundary_distance_is_inclusive() {
        let mut grid = ProximityGrid::new();
        grid.insert(ProximityEntry::new("edge", 3.0, 4.0, EntryType::Prop));
        assert_eq!(grid.query_radius(&RadiusQuery::new(0.0, 0.0, 5.0)).len(), 1);
        assert!(grid.query_radius(&RadiusQuery::new(0.0, 0.0, 4.99)).is_empty());
    }

    #[test]
    fn test_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut grid = ProximityGrid::with_bucket_size(4);
        let mut points = Vec::new();

        for i in 0..300 {
            let x = rng.gen_range(-20.0..60.0);
            let z = rng.gen_range(-20.0..60.0);
            let id = format!("e{}", i);
            grid.insert(ProximityEntry::new(id.clone(), x, z, EntryType::Bot));
            points.push((id, x, z));
        }

        // Move a third of them around to exercise rebucketing
        for (id, x, z) in points.iter_mut().step_by(3) {
            *x = rng.gen_range(-20.0..60.0);
            *z = rng.gen_range(-20.0..60.0);
            grid.update(id, *x, *z);
        }

        for _ in 0..100 {
            let qx = rng.gen_range(-25.0..65.0);
            let qz = rng.gen_range(-25.0..65.0);
            let radius = rng.gen_range(0.0..15.0);

            let expected: HashSet<&str> = points
                .iter()
                .filter(|(_, x, z)| {
                    let dx = x - qx;
                    let dz = z - qz;
                    (dx * dx + dz * dz).sqrt() <= radius
                })
                .map(|(id, _, _)| id.as_str())
                .collect();
            let hits = grid.query_radius(&RadiusQuery::new(qx, qz, radius));
            let actual: HashSet<&str> = hits.iter().map(|h| h.id.as_str()).collect();

            assert_eq!(actual.len(), hits.len(), "duplicate hits");
            assert_eq!(actual, expected);
        }
    }
}
