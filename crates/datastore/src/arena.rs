//! Generational slot arena for Views and Groups
//!
//! Entities live in a flat `Vec` of slots and are addressed by
//! `(index, generation)` handles. Removing an entity bumps the slot's
//! generation, so a handle kept past destruction no longer resolves.

use std::fmt;
use std::marker::PhantomData;

/// Handle type stored in an [`Arena`]
pub trait ArenaId: Copy + Eq + fmt::Debug {
    /// Build a handle from raw parts
    fn from_parts(index: u32, generation: u32) -> Self;
    /// Slot index
    fn index(self) -> u32;
    /// Slot generation
    fn generation(self) -> u32;
}

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl ArenaId for $name {
            #[inline]
            fn from_parts(index: u32, generation: u32) -> Self {
                $name { index, generation }
            }

            #[inline]
            fn index(self) -> u32 {
                self.index
            }

            #[inline]
            fn generation(self) -> u32 {
                self.generation
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}v{})", stringify!($name), self.index, self.generation)
            }
        }
    };
}

arena_id! {
    /// Handle to a View owned by a [`DataStore`](crate::DataStore)
    ViewId
}

arena_id! {
    /// Handle to a Group owned by a [`DataStore`](crate::DataStore)
    GroupId
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot arena with generation-checked handles
pub(crate) struct Arena<T, I: ArenaId> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
    _id: PhantomData<I>,
}

impl<T, I: ArenaId> fmt::Debug for Arena<T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("len", &self.len)
            .field("slots", &self.slots.len())
            .finish()
    }
}

impl<T, I: ArenaId> Arena<T, I> {
    pub(crate) fn new() -> Self {
        Arena {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            _id: PhantomData,
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> I {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return I::from_parts(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        I::from_parts(index, 0)
    }

    pub(crate) fn remove(&mut self, id: I) -> Option<T> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.len -= 1;
        Some(value)
    }

    #[inline]
    pub(crate) fn get(&self, id: I) -> Option<&T> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    #[inline]
    pub(crate) fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

/// Panic for a handle that must be live but is not
///
/// Reaching this means the store's internal links are corrupted.
#[cold]
#[inline(never)]
pub(crate) fn dangling<I: fmt::Debug>(id: I) -> ! {
    panic!("internal datastore link points at destroyed entity {:?}", id)
}
