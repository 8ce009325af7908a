#![deny(missing_docs)]

//! This crate implements an [AvlMap] similar to [std::collections::BTreeMap].
//!
//! The map is backed by a height-balanced binary search tree whose nodes carry parent
//! links, so a cursor can step to the next or previous key without an auxiliary stack.
//!
//! Most of the implementation is in the [avl] module, see [avl::AvlMap].
//!
//! # Example
//!
//! ```
//!     use avl_experiment::AvlMap;
//!     let mut mymap = AvlMap::new();
//!     mymap.insert("England", "London");
//!     mymap.insert("France", "Paris");
//!     println!("The capital of France is {}", mymap[&"France"]);
//! ```
//!
//!# Features
//!
//! This crate supports the following cargo features:
//! - `serde` : enables serialisation of [AvlMap] via serde crate.

/// Module with the height-balanced tree implementation of the map.
pub mod avl;

// Types for compatibility.

pub use avl::{Entry::Occupied, Entry::Vacant, InvalidCursorError, KeyNotFoundError};

pub use avl::{
    AvlMap, Comparator, Cursor, CursorMut, Entry, IntoIter, Iter, IterMut, Keys, NaturalOrder,
    OccupiedEntry, Position, VacantEntry, Values, ValuesMut,
};

// Tests.

/* mimalloc cannot be used with miri */
#[cfg(all(test, not(miri)))]
use mimalloc::MiMalloc;

#[cfg(all(test, not(miri)))]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[cfg(test)]
mod mytests;
