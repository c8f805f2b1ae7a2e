//! Mesh processing for the occlusion model.
//!
//! - [`TriangleMesh`] - indexed triangle set in millimetres
//! - [`decimate_mesh`] - quadric edge collapse bounded by a maximum error
//! - [`subdivide_to_max_edge`] - longest-edge bisection down to a target length

mod decimate;
mod subdivide;
mod triangle_mesh;

pub use decimate::{decimate_mesh, DecimateResult};
pub use subdivide::subdivide_to_max_edge;
pub use triangle_mesh::{Triangle, TriangleMesh};
