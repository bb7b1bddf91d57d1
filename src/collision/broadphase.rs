//! Broad-phase pair generation.
//!
//! Every implementation satisfies one contract: for the same set of entries,
//! `query_pairs` returns at least every pair whose bounding boxes overlap.
//! [`NoBroadphase`] is the brute-force reference that proposes all pairs;
//! [`GridBroadphase`] is a uniform hash grid that narrows the set.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use glam::Vec3;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_BROADPHASE_CELL_SIZE;
use crate::core::types::Aabb;
use crate::utils::allocator::EntityId;

/// Opaque handle to a broadphase entry. Handles are never re-issued after
/// removal, so a stale handle can always be detected.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BroadphaseHandle(u32);

impl BroadphaseHandle {
    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// One entry returned by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BroadphaseResult {
    pub handle: BroadphaseHandle,
    pub userdata: EntityId,
}

/// Unordered candidate pair, stored with `a.handle < b.handle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BroadphasePair {
    pub a: BroadphaseResult,
    pub b: BroadphaseResult,
}

impl BroadphasePair {
    fn new(first: BroadphaseResult, second: BroadphaseResult) -> Self {
        if first.handle <= second.handle {
            Self {
                a: first,
                b: second,
            }
        } else {
            Self {
                a: second,
                b: first,
            }
        }
    }
}

/// Reusable result buffers. Queries clear the buffer they write to.
#[derive(Debug, Default, Clone)]
pub struct BroadphaseContext {
    pub pairs: Vec<BroadphasePair>,
    pub results: Vec<BroadphaseResult>,
}

impl BroadphaseContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
        self.results.clear();
    }
}

pub trait Broadphase: Send + Sync {
    fn insert(&mut self, volume: Aabb, userdata: EntityId) -> BroadphaseHandle;

    /// Removes an entry. Unknown or stale handles are ignored and yield `false`.
    fn remove(&mut self, handle: BroadphaseHandle) -> bool;

    /// Moves an entry to a new volume and returns its handle. Unknown or
    /// stale handles are returned unchanged and nothing is inserted.
    fn update(&mut self, volume: Aabb, handle: BroadphaseHandle) -> BroadphaseHandle;

    fn clear(&mut self);

    fn query_pairs(&self, context: &mut BroadphaseContext);

    fn query_raycast(&self, origin: Vec3, dir: Vec3, context: &mut BroadphaseContext);

    fn query_volume(&self, volume: &Aabb, context: &mut BroadphaseContext);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    handle: BroadphaseHandle,
    volume: Aabb,
    userdata: EntityId,
}

impl Entry {
    fn result(&self) -> BroadphaseResult {
        BroadphaseResult {
            handle: self.handle,
            userdata: self.userdata,
        }
    }
}

/// Brute-force reference broadphase.
///
/// Entries live in an unordered list; every query returns every entry, and
/// `query_pairs` returns all `n(n-1)/2` distinct pairs.
#[derive(Debug, Default)]
pub struct NoBroadphase {
    entries: Vec<Entry>,
    next_handle: u32,
}

impl NoBroadphase {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, handle: BroadphaseHandle) -> Option<usize> {
        self.entries.iter().position(|e| e.handle == handle)
    }
}

impl Broadphase for NoBroadphase {
    fn insert(&mut self, volume: Aabb, userdata: EntityId) -> BroadphaseHandle {
        let handle = BroadphaseHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.push(Entry {
            handle,
            volume,
            userdata,
        });
        handle
    }

    fn remove(&mut self, handle: BroadphaseHandle) -> bool {
        match self.position(handle) {
            Some(index) => {
                self.entries.swap_remove(index);
                true
            }
            None => false,
        }
    }

    fn update(&mut self, volume: Aabb, handle: BroadphaseHandle) -> BroadphaseHandle {
        match self.position(handle) {
            Some(index) => {
                self.entries[index].volume = volume;
                handle
            }
            None => {
                log::warn!("broadphase update of unknown handle {:?}", handle);
                handle
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn query_pairs(&self, context: &mut BroadphaseContext) {
        context.pairs.clear();
        for (i, first) in self.entries.iter().enumerate() {
            for second in &self.entries[i + 1..] {
                context
                    .pairs
                    .push(BroadphasePair::new(first.result(), second.result()));
            }
        }
    }

    fn query_raycast(&self, _origin: Vec3, _dir: Vec3, context: &mut BroadphaseContext) {
        context.results.clear();
        context.results.extend(self.entries.iter().map(Entry::result));
    }

    fn query_volume(&self, _volume: &Aabb, context: &mut BroadphaseContext) {
        context.results.clear();
        context.results.extend(self.entries.iter().map(Entry::result));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

type Cell = (i32, i32, i32);

/// Entries spanning more cells than this along any axis go in the oversized list.
const MAX_CELLS_PER_AXIS: i32 = 8;

#[derive(Debug, Clone, Copy)]
struct GridEntry {
    entry: Entry,
    min_cell: Cell,
    max_cell: Cell,
    oversized: bool,
}

/// Uniform hash grid over entry AABBs.
pub struct GridBroadphase {
    cell_size: f32,
    cells: HashMap<Cell, Vec<BroadphaseHandle>>,
    entries: BTreeMap<BroadphaseHandle, GridEntry>,
    oversized: BTreeSet<BroadphaseHandle>,
    next_handle: u32,
}

impl Default for GridBroadphase {
    fn default() -> Self {
        Self::new(DEFAULT_BROADPHASE_CELL_SIZE)
    }
}

impl GridBroadphase {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(f32::EPSILON),
            cells: HashMap::new(),
            entries: BTreeMap::new(),
            oversized: BTreeSet::new(),
            next_handle: 0,
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn oversized_count(&self) -> usize {
        self.oversized.len()
    }

    fn world_to_grid(&self, pos: Vec3) -> Cell {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
            (pos.z / self.cell_size).floor() as i32,
        )
    }

    fn cells_of(&self, volume: &Aabb) -> (Cell, Cell) {
        (self.world_to_grid(volume.min), self.world_to_grid(volume.max))
    }

    fn is_oversized(min: Cell, max: Cell) -> bool {
        let span = |lo: i32, hi: i32| i64::from(hi) - i64::from(lo);
        span(min.0, max.0) >= i64::from(MAX_CELLS_PER_AXIS)
            || span(min.1, max.1) >= i64::from(MAX_CELLS_PER_AXIS)
            || span(min.2, max.2) >= i64::from(MAX_CELLS_PER_AXIS)
    }

    fn for_each_cell(min: Cell, max: Cell, mut f: impl FnMut(Cell)) {
        for x in min.0..=max.0 {
            for y in min.1..=max.1 {
                for z in min.2..=max.2 {
                    f((x, y, z));
                }
            }
        }
    }

    fn link(&mut self, grid_entry: &GridEntry) {
        let handle = grid_entry.entry.handle;
        if grid_entry.oversized {
            self.oversized.insert(handle);
            return;
        }
        let cells = &mut self.cells;
        Self::for_each_cell(grid_entry.min_cell, grid_entry.max_cell, |cell| {
            cells.entry(cell).or_default().push(handle);
        });
    }

    fn unlink(&mut self, grid_entry: &GridEntry) {
        let handle = grid_entry.entry.handle;
        if grid_entry.oversized {
            self.oversized.remove(&handle);
            return;
        }
        let cells = &mut self.cells;
        Self::for_each_cell(grid_entry.min_cell, grid_entry.max_cell, |cell| {
            if let Some(bucket) = cells.get_mut(&cell) {
                bucket.retain(|h| *h != handle);
                if bucket.is_empty() {
                    cells.remove(&cell);
                }
            }
        });
    }

    fn make_entry(&self, handle: BroadphaseHandle, volume: Aabb, userdata: EntityId) -> GridEntry {
        let (min_cell, max_cell) = self.cells_of(&volume);
        GridEntry {
            entry: Entry {
                handle,
                volume,
                userdata,
            },
            min_cell,
            max_cell,
            oversized: Self::is_oversized(min_cell, max_cell),
        }
    }

    fn push_if_overlapping(
        &self,
        a: BroadphaseHandle,
        b: BroadphaseHandle,
        out: &mut BTreeSet<BroadphasePair>,
    ) {
        if a == b {
            return;
        }
        if let (Some(first), Some(second)) = (self.entries.get(&a), self.entries.get(&b)) {
            if first.entry.volume.overlaps(&second.entry.volume) {
                out.insert(BroadphasePair::new(first.entry.result(), second.entry.result()));
            }
        }
    }
}

impl Broadphase for GridBroadphase {
    fn insert(&mut self, volume: Aabb, userdata: EntityId) -> BroadphaseHandle {
        let handle = BroadphaseHandle(self.next_handle);
        self.next_handle += 1;
        let grid_entry = self.make_entry(handle, volume, userdata);
        self.link(&grid_entry);
        self.entries.insert(handle, grid_entry);
        handle
    }

    fn remove(&mut self, handle: BroadphaseHandle) -> bool {
        match self.entries.remove(&handle) {
            Some(grid_entry) => {
                self.unlink(&grid_entry);
                true
            }
            None => false,
        }
    }

    fn update(&mut self, volume: Aabb, handle: BroadphaseHandle) -> BroadphaseHandle {
        let Some(old) = self.entries.get(&handle).copied() else {
            log::warn!("broadphase update of unknown handle {:?}", handle);
            return handle;
        };
        let updated = self.make_entry(handle, volume, old.entry.userdata);
        if updated.min_cell != old.min_cell
            || updated.max_cell != old.max_cell
            || updated.oversized != old.oversized
        {
            self.unlink(&old);
            self.link(&updated);
        }
        self.entries.insert(handle, updated);
        handle
    }

    fn clear(&mut self) {
        self.cells.clear();
        self.entries.clear();
        self.oversized.clear();
    }

    fn query_pairs(&self, context: &mut BroadphaseContext) {
        context.pairs.clear();
        let mut found = BTreeSet::new();

        for bucket in self.cells.values() {
            for (i, &a) in bucket.iter().enumerate() {
                for &b in &bucket[i + 1..] {
                    self.push_if_overlapping(a, b, &mut found);
                }
            }
        }

        for &big in &self.oversized {
            for &other in self.entries.keys() {
                self.push_if_overlapping(big, other, &mut found);
            }
        }

        context.pairs.extend(found);
    }

    fn query_raycast(&self, origin: Vec3, dir: Vec3, context: &mut BroadphaseContext) {
        context.results.clear();
        context.results.extend(
            self.entries
                .values()
                .filter(|e| e.entry.volume.ray_entry(origin, dir).is_some())
                .map(|e| e.entry.result()),
        );
    }

    fn query_volume(&self, volume: &Aabb, context: &mut BroadphaseContext) {
        context.results.clear();
        let (min_cell, max_cell) = self.cells_of(volume);
        let mut candidates: BTreeSet<BroadphaseHandle> = self.oversized.clone();

        if Self::is_oversized(min_cell, max_cell) {
            candidates.extend(self.entries.keys().copied());
        } else {
            Self::for_each_cell(min_cell, max_cell, |cell| {
                if let Some(bucket) = self.cells.get(&cell) {
                    candidates.extend(bucket.iter().copied());
                }
            });
        }

        context.results.extend(
            candidates
                .into_iter()
                .filter_map(|h| self.entries.get(&h))
                .filter(|e| e.entry.volume.overlaps(volume))
                .map(|e| e.entry.result()),
        );
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Broadphase behind a reader/writer lock. Queries from several threads may
/// proceed together; insert, remove and update take the lock exclusively.
#[derive(Clone)]
pub struct SharedBroadphase {
    inner: Arc<RwLock<Box<dyn Broadphase>>>,
}

impl SharedBroadphase {
    pub fn new(broadphase: Box<dyn Broadphase>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(broadphase)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Box<dyn Broadphase>> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Box<dyn Broadphase>> {
        self.inner.write()
    }

    pub fn insert(&self, volume: Aabb, userdata: EntityId) -> BroadphaseHandle {
        self.inner.write().insert(volume, userdata)
    }

    pub fn remove(&self, handle: BroadphaseHandle) -> bool {
        self.inner.write().remove(handle)
    }

    pub fn update(&self, volume: Aabb, handle: BroadphaseHandle) -> BroadphaseHandle {
        self.inner.write().update(volume, handle)
    }

    pub fn query_pairs(&self, context: &mut BroadphaseContext) {
        self.inner.read().query_pairs(context);
    }

    pub fn query_raycast(&self, origin: Vec3, dir: Vec3, context: &mut BroadphaseContext) {
        self.inner.read().query_raycast(origin, dir, context);
    }

    pub fn query_volume(&self, volume: &Aabb, context: &mut BroadphaseContext) {
        self.inner.read().query_volume(volume, context);
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
