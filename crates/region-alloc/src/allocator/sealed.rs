//! Sealed trait pattern for the strategy seam
//!
//! [`Strategy`](super::Strategy) is public so it can appear in
//! `Allocator<'r, S>`, but only the three strategies of this crate may
//! implement it.

/// Private sealing trait - cannot be named or implemented outside this crate
pub trait Sealed {}

impl Sealed for super::linear::Linear {}
impl Sealed for super::stack::Stack {}
impl Sealed for super::pool::Pool {}
