//! Internal utility helpers for timestamp display and serde shapes.

pub(crate) mod date;
pub(crate) mod serde;
