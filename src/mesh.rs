//! Point/edge topology for front propagation.
//!
//! An [`EdgeMesh`] is the graph a wave travels over:
//! points with positions, edges connecting pairs of them,
//! and named [`Patch`]es of points on which the mesh couples to itself
//! (cyclic) or to other partitions (processor).

mod mesh_construction;
mod patch;
pub use patch::{Patch, PatchKind};

use fixedbitset as fb;
use nalgebra_sparse as nas;

use crate::{Point, Rotation};

/// Error in constructing a mesh or adding patches to it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// An edge, simplex or patch refers to a point that doesn't exist.
    #[error("Point index {point} out of range for a mesh with {count} points")]
    PointOutOfRange {
        /// The offending index.
        point: usize,
        /// Number of points in the mesh.
        count: usize,
    },
    /// An edge connects a point to itself.
    #[error("Edge {edge} starts and ends at point {point}")]
    DegenerateEdge {
        /// Index of the edge in the input.
        edge: usize,
        /// The repeated point.
        point: usize,
    },
    /// A patch with this name already exists.
    #[error("Duplicate patch name {0:?}")]
    DuplicatePatch(String),
    /// No patch with this name exists.
    #[error("No patch named {0:?}")]
    UnknownPatch(String),
    /// The two sides of a cyclic pair have a different number of points.
    #[error("Cyclic patches {a:?} and {b:?} have {len_a} and {len_b} points")]
    CyclicSizeMismatch {
        /// Name of the first patch.
        a: String,
        /// Name of the second patch.
        b: String,
        /// Point count of the first patch.
        len_a: usize,
        /// Point count of the second patch.
        len_b: usize,
    },
}

/// A mesh of points connected by edges.
#[derive(Clone, Debug)]
pub struct EdgeMesh<const DIM: usize> {
    points: Vec<Point<DIM>>,
    edges: Vec<[usize; 2]>,
    /// rows are edges, columns points,
    /// -1 at an edge's start point and 1 at its end point
    edge_points: nas::CsrMatrix<i8>,
    /// transpose of `edge_points`, giving the edges around each point
    point_edges: nas::CsrMatrix<i8>,
    patches: Vec<Patch<DIM>>,
}

impl<const DIM: usize> EdgeMesh<DIM> {
    /// Construct a mesh from points and the point pairs of its edges.
    pub fn from_edges(points: Vec<Point<DIM>>, edges: Vec<[usize; 2]>) -> Result<Self, MeshError> {
        for (edge_idx, &[start, end]) in edges.iter().enumerate() {
            for p in [start, end] {
                check_point(p, points.len())?;
            }
            if start == end {
                return Err(MeshError::DegenerateEdge {
                    edge: edge_idx,
                    point: start,
                });
            }
        }

        let edge_points = mesh_construction::incidence_matrix(points.len(), &edges);
        let point_edges = edge_points.transpose();
        Ok(Self {
            points,
            edges,
            edge_points,
            point_edges,
            patches: Vec::new(),
        })
    }

    /// Construct a mesh from simplices of `N` points each
    /// (e.g. `N = 3` for triangles, `N = 4` for tetrahedra).
    ///
    /// The edges of the mesh are the unique point pairs of all simplices.
    ///
    /// ```
    /// # use meshkernels::{EdgeMesh, Vec2};
    /// let points = vec![
    ///     Vec2::new(0.0, 0.0),
    ///     Vec2::new(1.0, 0.0),
    ///     Vec2::new(0.0, 1.0),
    ///     Vec2::new(1.0, 1.0),
    /// ];
    /// let mesh = EdgeMesh::from_simplices(points, &[[0, 1, 2], [1, 3, 2]]).unwrap();
    /// assert_eq!(mesh.edge_count(), 5);
    /// ```
    pub fn from_simplices<const N: usize>(
        points: Vec<Point<DIM>>,
        simplices: &[[usize; N]],
    ) -> Result<Self, MeshError> {
        for &p in simplices.iter().flatten() {
            check_point(p, points.len())?;
        }
        let edges = mesh_construction::extract_edges(simplices);
        Self::from_edges(points, edges)
    }

    /// Number of points in the mesh.
    #[inline]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Number of edges in the mesh.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Positions of all points.
    #[inline]
    pub fn points(&self) -> &[Point<DIM>] {
        &self.points
    }

    /// Position of a single point.
    #[inline]
    pub fn point(&self, point: usize) -> Point<DIM> {
        self.points[point]
    }

    /// Point pairs of all edges.
    #[inline]
    pub fn edges(&self) -> &[[usize; 2]] {
        &self.edges
    }

    /// The start and end point of an edge.
    #[inline]
    pub fn edge(&self, edge: usize) -> [usize; 2] {
        self.edges[edge]
    }

    /// The point at the opposite end of `edge` from `point`.
    pub fn other_point(&self, edge: usize, point: usize) -> usize {
        let [start, end] = self.edges[edge];
        if start == point {
            end
        } else {
            start
        }
    }

    /// Midpoint of an edge.
    pub fn edge_centre(&self, edge: usize) -> Point<DIM> {
        let [start, end] = self.edges[edge];
        (self.points[start] + self.points[end]) * 0.5
    }

    /// Length of an edge.
    pub fn edge_length(&self, edge: usize) -> f64 {
        let [start, end] = self.edges[edge];
        (self.points[end] - self.points[start]).norm()
    }

    /// Indices of the edges touching a point.
    #[inline]
    pub fn point_edges(&self, point: usize) -> &[usize] {
        self.point_edges.pattern().lane(point)
    }

    /// The oriented edge-to-point incidence matrix,
    /// with -1 at each edge's start point and 1 at its end point.
    #[inline]
    pub fn incidence(&self) -> &nas::CsrMatrix<i8> {
        &self.edge_points
    }

    /// Indices of all points whose position satisfies a predicate.
    pub fn points_where(&self, mut pred: impl FnMut(&Point<DIM>) -> bool) -> Vec<usize> {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, p)| pred(*p))
            .map(|(i, _)| i)
            .collect()
    }

    /// Extract the part of the mesh spanned by a set of points.
    ///
    /// Edges with both endpoints in `keep` are kept.
    /// Returns the new mesh along with the index in this mesh of each new point.
    /// Points keep their relative order, so two submeshes sharing points
    /// list the shared points in the same order.
    /// Patches are not carried over.
    pub fn submesh(&self, keep: &fb::FixedBitSet) -> (Self, Vec<usize>) {
        let global: Vec<usize> = keep.ones().filter(|&p| p < self.point_count()).collect();
        let mut local = vec![usize::MAX; self.point_count()];
        for (l, &g) in global.iter().enumerate() {
            local[g] = l;
        }

        let points = global.iter().map(|&g| self.points[g]).collect();
        let edges = self
            .edges
            .iter()
            .filter(|[a, b]| local[*a] != usize::MAX && local[*b] != usize::MAX)
            .map(|[a, b]| [local[*a], local[*b]])
            .collect::<Vec<_>>();

        let edge_points = mesh_construction::incidence_matrix(global.len(), &edges);
        let point_edges = edge_points.transpose();
        let mesh = Self {
            points,
            edges,
            edge_points,
            point_edges,
            patches: Vec::new(),
        };
        (mesh, global)
    }

    //
    // patches
    //

    /// All patches, indexed in order of addition.
    #[inline]
    pub fn patches(&self) -> &[Patch<DIM>] {
        &self.patches
    }

    /// A patch by index.
    #[inline]
    pub fn patch(&self, patch: usize) -> &Patch<DIM> {
        &self.patches[patch]
    }

    /// Index of the patch with the given name, if any.
    pub fn find_patch(&self, name: &str) -> Option<usize> {
        self.patches.iter().position(|p| p.name == name)
    }

    /// The patch with the given name.
    pub fn patch_by_name(&self, name: &str) -> Result<&Patch<DIM>, MeshError> {
        self.find_patch(name)
            .map(|idx| &self.patches[idx])
            .ok_or_else(|| MeshError::UnknownPatch(name.to_string()))
    }

    /// Add a plain boundary patch. Returns its index.
    pub fn add_boundary_patch(
        &mut self,
        name: impl Into<String>,
        points: Vec<usize>,
    ) -> Result<usize, MeshError> {
        self.push_patch(name.into(), points, PatchKind::Boundary)
    }

    /// Add a patch interfacing with partition `neighbour`. Returns its index.
    pub fn add_processor_patch(
        &mut self,
        name: impl Into<String>,
        points: Vec<usize>,
        neighbour: usize,
    ) -> Result<usize, MeshError> {
        self.push_patch(name.into(), points, PatchKind::Processor { neighbour })
    }

    /// Add two patches coupled to each other periodically.
    ///
    /// Point `i` of `points_a` is identified with point `i` of `points_b`.
    /// `rotation` maps positions on side `a` onto side `b`;
    /// side `b` gets its transpose.
    /// Returns the indices of the two patches.
    pub fn add_cyclic_pair(
        &mut self,
        name_a: impl Into<String>,
        points_a: Vec<usize>,
        name_b: impl Into<String>,
        points_b: Vec<usize>,
        rotation: Option<Rotation<DIM>>,
    ) -> Result<(usize, usize), MeshError> {
        let (name_a, name_b) = (name_a.into(), name_b.into());
        if points_a.len() != points_b.len() {
            return Err(MeshError::CyclicSizeMismatch {
                len_a: points_a.len(),
                len_b: points_b.len(),
                a: name_a,
                b: name_b,
            });
        }
        if name_a == name_b {
            return Err(MeshError::DuplicatePatch(name_b));
        }
        // validate both before pushing either so a failure leaves no half pair
        self.check_patch(&name_a, &points_a)?;
        self.check_patch(&name_b, &points_b)?;

        let idx_a = self.patches.len();
        let idx_b = idx_a + 1;
        self.patches.push(Patch {
            name: name_a,
            points: points_a,
            kind: PatchKind::Cyclic {
                partner: idx_b,
                rotation,
            },
        });
        self.patches.push(Patch {
            name: name_b,
            points: points_b,
            kind: PatchKind::Cyclic {
                partner: idx_a,
                rotation: rotation.map(|r| r.transpose()),
            },
        });
        Ok((idx_a, idx_b))
    }

    fn push_patch(
        &mut self,
        name: String,
        points: Vec<usize>,
        kind: PatchKind<DIM>,
    ) -> Result<usize, MeshError> {
        self.check_patch(&name, &points)?;
        self.patches.push(Patch { name, points, kind });
        Ok(self.patches.len() - 1)
    }

    fn check_patch(&self, name: &str, points: &[usize]) -> Result<(), MeshError> {
        if self.find_patch(name).is_some() {
            return Err(MeshError::DuplicatePatch(name.to_string()));
        }
        for &p in points {
            check_point(p, self.point_count())?;
        }
        Ok(())
    }
}

impl EdgeMesh<2> {
    /// A structured grid of `counts[0] x counts[1]` points
    /// with the given spacing, starting at `origin`.
    ///
    /// Points are numbered with x running fastest.
    /// Edges connect horizontally and vertically adjacent points.
    pub fn grid(origin: Point<2>, counts: [usize; 2], spacing: f64) -> Self {
        let (points, edges) = mesh_construction::grid_2d(origin, counts, spacing);
        let edge_points = mesh_construction::incidence_matrix(points.len(), &edges);
        let point_edges = edge_points.transpose();
        Self {
            points,
            edges,
            edge_points,
            point_edges,
            patches: Vec::new(),
        }
    }
}

fn check_point(point: usize, count: usize) -> Result<(), MeshError> {
    if point < count {
        Ok(())
    } else {
        Err(MeshError::PointOutOfRange { point, count })
    }
}

//
// tests
//

// Module is pub(crate) to expose the test meshes to other modules' tests.
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::Vec2;

    /// A small hexagon-shaped 2D mesh for testing basic functionality.
    /// Shaped somewhat like this:
    ///    ____
    ///   /\  /\
    ///  /__\/__\
    ///  \  /\  /
    ///   \/__\/
    ///
    /// with points and triangles ordered left to right, top to bottom.
    pub(crate) fn tiny_mesh_2d() -> EdgeMesh<2> {
        let points = vec![
            Vec2::new(-0.5, 1.0),
            Vec2::new(0.5, 1.0),
            Vec2::new(-1.0, 0.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(-0.5, -1.0),
            Vec2::new(0.5, -1.0),
        ];
        #[rustfmt::skip]
        let triangles = [
            [0, 2, 3],
            [0, 1, 3],
            [1, 3, 4],
            [2, 3, 5],
            [3, 5, 6],
            [3, 4, 6],
        ];
        EdgeMesh::from_simplices(points, &triangles).unwrap()
    }

    /// A chain of `n` points along the x axis with unit spacing.
    pub(crate) fn chain_mesh(n: usize) -> EdgeMesh<2> {
        let points = (0..n).map(|i| Vec2::new(i as f64, 0.0)).collect();
        let edges = (1..n).map(|i| [i - 1, i]).collect();
        EdgeMesh::from_edges(points, edges).unwrap()
    }

    #[test]
    fn tiny_2d_mesh_is_correct() {
        let mesh = tiny_mesh_2d();
        assert_eq!(mesh.point_count(), 7);
        #[rustfmt::skip]
        let expected_edges = vec![
            [0, 1], [0, 2], [0, 3],
            [1, 3], [1, 4],
            [2, 3], [2, 5],
            [3, 4], [3, 5], [3, 6],
            [4, 6],
            [5, 6],
        ];
        assert_eq!(mesh.edges(), &expected_edges[..]);

        // the centre point touches every other point
        let mut around_centre: Vec<usize> = mesh
            .point_edges(3)
            .iter()
            .map(|&e| mesh.other_point(e, 3))
            .collect();
        around_centre.sort_unstable();
        assert_eq!(around_centre, vec![0, 1, 2, 4, 5, 6]);
        assert_eq!(mesh.point_edges(0).len(), 3);

        let inc = mesh.incidence();
        assert_eq!((inc.nrows(), inc.ncols()), (12, 7));
        // every edge row sums to zero
        for row in inc.row_iter() {
            assert_eq!(row.values().iter().map(|&v| v as i32).sum::<i32>(), 0);
        }
    }

    #[test]
    fn edge_geometry() {
        let mesh = tiny_mesh_2d();
        let e = mesh.edges().iter().position(|&e| e == [2, 3]).unwrap();
        assert_eq!(mesh.edge_centre(e), Vec2::new(-0.5, 0.0));
        assert_eq!(mesh.edge_length(e), 1.0);
        assert_eq!(mesh.other_point(e, 3), 2);
    }

    #[test]
    fn invalid_input_is_rejected() {
        let points = vec![Vec2::zeros(), Vec2::new(1.0, 0.0)];
        assert_eq!(
            EdgeMesh::from_edges(points.clone(), vec![[0, 2]]).unwrap_err(),
            MeshError::PointOutOfRange { point: 2, count: 2 }
        );
        assert!(matches!(
            EdgeMesh::from_edges(points.clone(), vec![[1, 1]]),
            Err(MeshError::DegenerateEdge { edge: 0, point: 1 })
        ));
        assert!(EdgeMesh::from_simplices(points, &[[0, 1, 5]]).is_err());
    }

    #[test]
    fn patches_are_validated() {
        let mut mesh = chain_mesh(4);
        assert_eq!(mesh.add_boundary_patch("left", vec![0]), Ok(0));
        assert_eq!(
            mesh.add_boundary_patch("left", vec![1]),
            Err(MeshError::DuplicatePatch("left".into()))
        );
        assert!(mesh.add_processor_patch("proc", vec![7], 1).is_err());
        assert!(matches!(
            mesh.add_cyclic_pair("a", vec![0, 1], "b", vec![3], None),
            Err(MeshError::CyclicSizeMismatch { len_a: 2, len_b: 1, .. })
        ));
        // a failed pair leaves nothing behind
        assert!(mesh.add_cyclic_pair("c", vec![0], "left", vec![3], None).is_err());
        assert_eq!(mesh.patches().len(), 1);
        assert!(mesh.patch_by_name("c").is_err());

        let rot = Rotation::<2>::new(0.0, -1.0, 1.0, 0.0);
        let (a, b) = mesh
            .add_cyclic_pair("a", vec![0], "b", vec![3], Some(rot))
            .unwrap();
        assert_eq!(mesh.find_patch("b"), Some(b));
        assert_eq!(
            mesh.patch(a).kind(),
            &PatchKind::Cyclic {
                partner: b,
                rotation: Some(rot)
            }
        );
        assert_eq!(
            mesh.patch(b).kind(),
            &PatchKind::Cyclic {
                partner: a,
                rotation: Some(rot.transpose())
            }
        );
        assert!(mesh.patch(a).is_cyclic());
        assert_eq!(mesh.patch(0).neighbour(), None);
    }

    #[test]
    fn grid_and_submesh() {
        let grid = EdgeMesh::grid(Vec2::zeros(), [5, 3], 1.0);
        assert_eq!(grid.point_count(), 15);
        assert_eq!(grid.edge_count(), 4 * 3 + 5 * 2);

        let left = grid.points_where(|p| p.x <= 2.0);
        let mut keep = fb::FixedBitSet::with_capacity(grid.point_count());
        left.iter().for_each(|&p| keep.insert(p));
        let (sub, global) = grid.submesh(&keep);
        assert_eq!(sub.point_count(), 9);
        assert_eq!(global, left);
        // 2 horizontal per row, 2 vertical per column
        assert_eq!(sub.edge_count(), 2 * 3 + 3 * 2);
        for (local, &g) in global.iter().enumerate() {
            assert_eq!(sub.point(local), grid.point(g));
        }
    }
}
