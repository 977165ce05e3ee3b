//! The object registry substrate: a generic, fixed-capacity,
//! name-indexed table shared by every object kind (tasks, queues, the
//! three semaphore kinds, mutexes, and volumes).
//!
//! Generalizes `r3_port_std::utils::iterpool::Pool<T>` — a free-list-
//! backed object pool — to a table that is fixed-size rather than
//! growable, indexed by a small integer id rather than a `NonZeroUsize`
//! pointer, and name-searchable. Where `iterpool` keeps a singly-linked
//! free list threaded through unused slots, this table is small enough
//! (tens of entries) that a linear scan for the first free slot is both
//! simpler and exactly what the two-phase reserve/fill
//! protocol requires: the scan for a free slot and the scan for a name
//! collision happen under the same lock acquisition.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::config::MAX_API_NAME;
use crate::error::Status;

/// A fixed-capacity, NUL-free object name: at most
/// `MAX_API_NAME-1` bytes plus terminator; names are compared
/// byte-exact.
#[derive(Clone, Copy)]
pub struct Name {
    buf: [u8; MAX_API_NAME],
    len: u8,
}

impl Name {
    /// An empty name, used to fill a freshly-released or not-yet-filled
    /// row: reserved but uninitialized until `fill()` runs.
    pub const fn empty() -> Self {
        Self {
            buf: [0u8; MAX_API_NAME],
            len: 0,
        }
    }

    pub fn new(s: &str) -> Result<Self, Status> {
        if s.len() >= MAX_API_NAME {
            return Err(Status::NameTooLong);
        }
        let mut buf = [0u8; MAX_API_NAME];
        buf[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self {
            buf,
            len: s.len() as u8,
        })
    }

    pub fn as_str(&self) -> &str {
        // Safety-free: constructed only from valid UTF-8 in `new`.
        std::str::from_utf8(&self.buf[..self.len as usize]).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}
impl Eq for Name {}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of bits of `ObjId` given to the generation counter. Chosen so
/// `MAX_INDEX` comfortably covers every table size in `config.rs` while
/// still catching stale ids after ~250 create/delete cycles on a slot,
/// rendering stale ids statically detectable rather than silently
/// aliasing a recreated object at the same index.
const GENERATION_BITS: u32 = 8;
const INDEX_BITS: u32 = u32::BITS - GENERATION_BITS;
const MAX_INDEX: u32 = (1 << INDEX_BITS) - 1;

/// An opaque, generational object id. Converts losslessly to/from the
/// `u32` every public API signature uses as an opaque handle, so no
/// signature changes shape — this is purely an internal staleness check
/// layered on top of the `0 <= i < MAX_K && !free` validity rule.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjId(u32);

impl ObjId {
    fn new(index: usize, generation: u8) -> Self {
        debug_assert!((index as u32) <= MAX_INDEX);
        ObjId((index as u32) | ((generation as u32) << INDEX_BITS))
    }

    pub fn index(self) -> usize {
        (self.0 & MAX_INDEX) as usize
    }

    fn generation(self) -> u8 {
        (self.0 >> INDEX_BITS) as u8
    }
}

impl fmt::Debug for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjId({}#{})", self.index(), self.generation())
    }
}

impl From<ObjId> for u32 {
    fn from(id: ObjId) -> u32 {
        id.0
    }
}

impl From<u32> for ObjId {
    fn from(x: u32) -> ObjId {
        ObjId(x)
    }
}

/// Per-kind metadata every registry row carries, on top of whatever
/// kind-specific payload `T` adds: every kind's `{free, name, creator,
/// ...}` row shares this shape.
pub struct Row<T> {
    pub name: Name,
    pub creator: ObjId,
    pub payload: T,
}

struct Slot<T> {
    used: bool,
    generation: u8,
    // Set the instant a slot is reserved, before `row` exists, so a
    // name collision is visible to every other `reserve` call racing
    // against the same lock rather than only after `fill` runs.
    name: Name,
    row: Option<Row<T>>,
}

impl<T> Slot<T> {
    const fn new() -> Self {
        Self {
            used: false,
            generation: 0,
            name: Name::empty(),
            row: None,
        }
    }
}

/// A fixed-capacity table of `N` rows of kind `T`, guarded by exactly
/// one host mutex.
pub struct Table<T, const N: usize> {
    slots: Mutex<[Slot<T>; N]>,
}

impl<T, const N: usize> Table<T, N> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(std::array::from_fn(|_| Slot::new())),
        }
    }

    /// Reserve a free slot under `name`, mark it non-free, and return
    /// its id. The row is NOT yet populated with `creator`/`payload` —
    /// call `fill` after the (possibly fallible, possibly slow) host
    /// constructor runs.
    pub fn reserve(&self, name: Name) -> Result<ObjId, Status> {
        if name.is_empty() {
            // A zero-length name can never collide with anything and
            // would make every lookup ambiguous; reject up front.
            return Err(Status::NameTooLong);
        }
        let mut slots = self.lock();

        let mut free_index = None;
        for (i, slot) in slots.iter().enumerate() {
            if !slot.used {
                if free_index.is_none() {
                    free_index = Some(i);
                }
                continue;
            }
            if slot.name == name {
                return Err(Status::NameTaken);
            }
        }

        let index = free_index.ok_or(Status::NoFreeIds)?;
        slots[index].used = true;
        slots[index].name = name;
        let id = ObjId::new(index, slots[index].generation);
        Ok(id)
    }

    /// Populate a reserved row with its creator and kind-specific
    /// payload. `name` must match what `reserve` stored.
    pub fn fill(&self, id: ObjId, name: Name, creator: ObjId, payload: T) {
        let mut slots = self.lock();
        let slot = &mut slots[id.index()];
        debug_assert!(slot.used);
        debug_assert!(slot.name == name);
        slot.row = Some(Row {
            name,
            creator,
            payload,
        });
    }

    /// Undo a `reserve` whose host constructor failed.
    pub fn release(&self, id: ObjId) {
        let mut slots = self.lock();
        let slot = &mut slots[id.index()];
        slot.used = false;
        slot.name = Name::empty();
        slot.row = None;
        slot.generation = slot.generation.wrapping_add(1);
    }

    /// Validate `id` against the table and return a clone of its row's
    /// derived snapshot via `f`, or `InvalidId`.
    pub fn with_row<R>(&self, id: ObjId, f: impl FnOnce(&Row<T>) -> R) -> Result<R, Status> {
        let slots = self.lock();
        self.row_ref(&slots, id).map(f)
    }

    pub fn with_row_mut<R>(
        &self,
        id: ObjId,
        f: impl FnOnce(&mut Row<T>) -> R,
    ) -> Result<R, Status> {
        let mut slots = self.lock();
        let index = id.index();
        if index >= N || !slots[index].used || slots[index].generation != id.generation() {
            return Err(Status::InvalidId);
        }
        let row = slots[index].row.as_mut().ok_or(Status::InvalidId)?;
        Ok(f(row))
    }

    pub fn validate(&self, id: ObjId) -> Result<(), Status> {
        self.with_row(id, |_| ())
    }

    /// Linear scan for a live row named `name`.
    pub fn find_by_name(&self, name: &str) -> Result<ObjId, Status> {
        let slots = self.lock();
        for (i, slot) in slots.iter().enumerate() {
            if slot.used {
                if let Some(row) = &slot.row {
                    if row.name.as_str() == name {
                        return Ok(ObjId::new(i, slot.generation));
                    }
                }
            }
        }
        Err(Status::NameNotFound)
    }

    /// Find the id of the first live row whose payload satisfies `pred`
    /// (used by `task::register` to bind a host thread to its row).
    pub fn find_by(&self, mut pred: impl FnMut(&T) -> bool) -> Option<ObjId> {
        let slots = self.lock();
        for (i, slot) in slots.iter().enumerate() {
            if slot.used {
                if let Some(row) = &slot.row {
                    if pred(&row.payload) {
                        return Some(ObjId::new(i, slot.generation));
                    }
                }
            }
        }
        None
    }

    /// Count of currently-live rows (diagnostic use only).
    pub fn live_count(&self) -> usize {
        self.lock().iter().filter(|s| s.used).count()
    }

    /// Visit every currently-live row under the lock (used by the
    /// volume table to build a path-translation snapshot).
    pub fn for_each(&self, mut f: impl FnMut(ObjId, &Row<T>)) {
        let slots = self.lock();
        for (i, slot) in slots.iter().enumerate() {
            if slot.used {
                if let Some(row) = &slot.row {
                    f(ObjId::new(i, slot.generation), row);
                }
            }
        }
    }

    fn row_ref<'a>(&self, slots: &'a [Slot<T>; N], id: ObjId) -> Result<&'a Row<T>, Status> {
        let index = id.index();
        if index >= N {
            return Err(Status::InvalidId);
        }
        let slot = &slots[index];
        if !slot.used || slot.generation != id.generation() {
            return Err(Status::InvalidId);
        }
        slot.row.as_ref().ok_or(Status::InvalidId)
    }

    fn lock(&self) -> MutexGuard<'_, [Slot<T>; N]> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_fill_validate_release() {
        let table: Table<u32, 4> = Table::new();
        let id = table.reserve(Name::new("a").unwrap()).unwrap();
        assert!(table.validate(id).is_err()); // not filled yet: payload absent, but row exists
        table.fill(id, Name::new("a").unwrap(), ObjId::new(0, 0), 42);
        assert!(table.validate(id).is_ok());
        assert_eq!(table.find_by_name("a").unwrap(), id);
        table.release(id);
        assert_eq!(table.validate(id), Err(Status::InvalidId));
        assert_eq!(table.find_by_name("a"), Err(Status::NameNotFound));
    }

    #[test]
    fn no_free_ids() {
        let table: Table<u32, 2> = Table::new();
        let a = table.reserve(Name::new("a").unwrap()).unwrap();
        table.fill(a, Name::new("a").unwrap(), ObjId::new(0, 0), 1);
        let b = table.reserve(Name::new("b").unwrap()).unwrap();
        table.fill(b, Name::new("b").unwrap(), ObjId::new(0, 0), 2);
        assert_eq!(
            table.reserve(Name::new("c").unwrap()),
            Err(Status::NoFreeIds)
        );
        table.release(a);
        assert!(table.reserve(Name::new("c").unwrap()).is_ok());
    }

    #[test]
    fn name_taken() {
        let table: Table<u32, 4> = Table::new();
        let a = table.reserve(Name::new("dup").unwrap()).unwrap();
        table.fill(a, Name::new("dup").unwrap(), ObjId::new(0, 0), 1);
        assert_eq!(
            table.reserve(Name::new("dup").unwrap()),
            Err(Status::NameTaken)
        );
    }

    #[test]
    fn stale_id_after_recreate_is_rejected() {
        let table: Table<u32, 4> = Table::new();
        let a = table.reserve(Name::new("a").unwrap()).unwrap();
        table.fill(a, Name::new("a").unwrap(), ObjId::new(0, 0), 1);
        table.release(a);
        let b = table.reserve(Name::new("a").unwrap()).unwrap();
        table.fill(b, Name::new("a").unwrap(), ObjId::new(0, 0), 2);
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert_eq!(table.validate(a), Err(Status::InvalidId));
        assert!(table.validate(b).is_ok());
    }
}
