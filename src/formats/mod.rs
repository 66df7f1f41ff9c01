//! Binary tile format family.
//!
//! `reader` is the low-level little-endian extraction layer, `tile`
//! decodes the on-disk graph tile into its in-memory form, and
//! `builder` packs the inverse direction (fixture and tooling use).

pub mod builder;
pub mod reader;
pub mod tile;

pub use builder::{EdgeSpec, NodeSpec, TileBuilder};
pub use tile::{EdgeAttrs, EdgeEnd, Node, Tile};
