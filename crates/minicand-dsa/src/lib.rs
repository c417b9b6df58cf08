//! # minicand-dsa
//!
//! Lock-free building blocks for the packed candidate record: the
//! publish-once cache cell behind every lazily materialized object, and the
//! mask/shift helper for packed flag words.

#![no_std]

pub mod bitfield;
pub mod once_slot;

pub use bitfield::BitField;
pub use once_slot::OnceSlot;

static_assertions::assert_eq_size!(OnceSlot<[u64; 16]>, usize);
