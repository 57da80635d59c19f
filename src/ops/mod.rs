//! Stateless spatial operations over feature collections.
//!
//! Every operation takes immutable input collection(s) and produces a new
//! collection sharing the input schema (or a schema union). Inputs are
//! never mutated; output features get fresh identities.

mod create;
mod manage;
mod modify;
mod polish;
mod select;

pub use create::{PointMode, connect, to_points};
pub use manage::{GroupBreaks, SplitKey, merge, split};
pub use modify::{BufferDistance, BufferParams, CapStyle, JoinStyle, buffer, cut, reproject};
pub use polish::{clean, snap};
pub use select::{TileSpec, crop, select_by_location, tile};
