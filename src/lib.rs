//! Dense matrix and mesh front propagation kernels.
//!
//! Two independent halves live here:
//!
//! - [`matrix`]: a generic dense [`Matrix`] with resizing that preserves data
//!   and borrow-checked sub-block views, and a [`SquareMatrix`] specialization
//!   with LU decomposition and determinants.
//! - [`wave`]: a generic point/edge wavefront engine ([`PointEdgeWave`])
//!   driven by a relaxation policy implementing [`WaveInfo`],
//!   with [`StructuredWalk`] as the walked-distance policy
//!   and [`DecomposedWave`] running it across mesh partitions.

#![warn(missing_docs)]

pub mod matrix;
#[doc(inline)]
pub use matrix::{
    det, det_decomposed, det_in_place, det_in_place_with, lu_decompose, lu_decompose_with,
    Element, LuDecomposed, Matrix, MatrixBlock, MatrixBlockMut, MatrixError, MatrixTolerances,
    SquareMatrix, UnitElement,
};

pub mod mesh;
#[doc(inline)]
pub use mesh::{EdgeMesh, MeshError, Patch, PatchKind};

pub mod walk;
#[doc(inline)]
pub use walk::StructuredWalk;

pub mod wave;
#[doc(inline)]
pub use wave::{
    DecomposedStatus, DecomposedWave, InProcessTransport, PointEdgeWave, ProcessorMessage,
    Transport, WaveConfig, WaveError, WaveInfo, WaveStatus,
};

pub mod gmsh;

pub mod stream;

// nalgebra re-exports of common types for convenience

pub use nalgebra as na;
/// Type alias for a point (or any other vector) in `DIM`-dimensional space.
pub type Point<const DIM: usize> = na::SVector<f64, DIM>;
/// Type alias for a rotation tensor acting on `DIM`-dimensional points.
pub type Rotation<const DIM: usize> = na::SMatrix<f64, DIM, DIM>;
/// Type alias for a 2D `nalgebra` vector.
pub type Vec2 = na::Vector2<f64>;
/// Type alias for a 3D `nalgebra` vector.
pub type Vec3 = na::Vector3<f64>;
