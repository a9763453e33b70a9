//! Walked-distance tracking record.
//!
//! A [`StructuredWalk`] records the shortest walk found so far
//! from a seed point to a mesh point or edge, measured along the edges.
//! Running a [`PointEdgeWave`][crate::PointEdgeWave] with it computes the
//! walked distance from a set of seeds to every reachable point,
//! and carries a payload from each seed to the points closest to it.

use std::io;

use crate::{
    stream::{StreamError, Streamable, Tokens},
    EdgeMesh, Patch, Point, Rotation, WaveInfo,
};

/// Shortest walk from a seed point found so far.
///
/// A record is valid once some walk has reached it.
/// Invalid records have every component of their origin set to `f64::MAX`.
#[derive(Clone, Debug)]
pub struct StructuredWalk<const DIM: usize> {
    /// seed point the walk started from
    origin: Point<DIM>,
    /// last point the walk passed through.
    /// relative to the crossing point while passing through a patch
    previous: Point<DIM>,
    /// walked length from the origin
    dist: f64,
    /// payload transported from the seed unchanged
    data: Point<DIM>,
    index: Option<usize>,
}

impl<const DIM: usize> Default for StructuredWalk<DIM> {
    fn default() -> Self {
        Self {
            origin: Point::repeat(f64::MAX),
            previous: Point::repeat(f64::MAX),
            dist: f64::MAX,
            data: Point::zeros(),
            index: None,
        }
    }
}

impl<const DIM: usize> StructuredWalk<DIM> {
    /// A record for a seed point at `position`,
    /// with zero distance and the given payload.
    pub fn seed(position: Point<DIM>, data: Point<DIM>, index: Option<usize>) -> Self {
        Self {
            origin: position,
            previous: position,
            dist: 0.0,
            data,
            index,
        }
    }

    /// A record with every field given explicitly.
    pub fn new(
        origin: Point<DIM>,
        previous: Point<DIM>,
        dist: f64,
        data: Point<DIM>,
        index: Option<usize>,
    ) -> Self {
        Self {
            origin,
            previous,
            dist,
            data,
            index,
        }
    }

    /// Walked distance from the origin.
    /// `f64::MAX` for an invalid record.
    #[inline]
    pub fn dist(&self) -> f64 {
        self.dist
    }

    /// The seed point the walk started from.
    #[inline]
    pub fn origin(&self) -> Point<DIM> {
        self.origin
    }

    /// The last point the walk passed through.
    #[inline]
    pub fn previous(&self) -> Point<DIM> {
        self.previous
    }

    /// The payload carried from the seed.
    #[inline]
    pub fn data(&self) -> &Point<DIM> {
        &self.data
    }

    /// The index tag carried from the seed.
    #[inline]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Relax towards a walk continuing from `from` to `pos`.
    fn relax(&mut self, pos: Point<DIM>, from: &Self, tol: f64) -> bool {
        if !from.valid() {
            return false;
        }
        let candidate = from.dist + (pos - from.previous).norm();
        if self.valid() && self.dist - candidate <= tol * self.dist {
            return false;
        }

        self.origin = from.origin;
        self.previous = pos;
        self.dist = candidate;
        self.data = from.data;
        self.index = from.index;
        true
    }
}

impl<const DIM: usize> WaveInfo<DIM> for StructuredWalk<DIM> {
    #[inline]
    fn valid(&self) -> bool {
        self.origin != Point::<DIM>::repeat(f64::MAX)
    }

    fn same_geometry(&self, other: &Self, tol: f64) -> bool {
        match (self.valid(), other.valid()) {
            (true, true) => {
                let diff = (self.origin - other.origin).norm();
                let scale = f64::max(self.origin.norm(), other.origin.norm());
                diff <= tol * scale.max(1.0)
            }
            (false, false) => true,
            _ => false,
        }
    }

    fn leave_domain(&mut self, _patch: &Patch<DIM>, _patch_point: usize, pos: &Point<DIM>) {
        if self.valid() {
            self.origin -= pos;
            self.previous -= pos;
        }
    }

    fn enter_domain(&mut self, _patch: &Patch<DIM>, _patch_point: usize, pos: &Point<DIM>) {
        if self.valid() {
            self.origin += pos;
            self.previous += pos;
        }
    }

    fn transform(&mut self, rotation: &Rotation<DIM>) {
        if self.valid() {
            self.origin = rotation * self.origin;
            self.previous = rotation * self.previous;
        }
    }

    fn update_point(
        &mut self,
        mesh: &EdgeMesh<DIM>,
        point: usize,
        _edge: usize,
        edge_info: &Self,
        tol: f64,
    ) -> bool {
        self.relax(mesh.point(point), edge_info, tol)
    }

    fn merge_point(&mut self, mesh: &EdgeMesh<DIM>, point: usize, new_info: &Self, tol: f64) -> bool {
        self.relax(mesh.point(point), new_info, tol)
    }

    fn update_edge(
        &mut self,
        mesh: &EdgeMesh<DIM>,
        edge: usize,
        _point: usize,
        point_info: &Self,
        tol: f64,
    ) -> bool {
        self.relax(mesh.edge_centre(edge), point_info, tol)
    }
}

/// Records are equal if they describe the same walk,
/// regardless of payload.
impl<const DIM: usize> PartialEq for StructuredWalk<DIM> {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin && self.previous == other.previous && self.dist == other.dist
    }
}

/// Written as origin, previous point, distance, payload, and index
/// (`-1` for no index).
impl<const DIM: usize> Streamable for StructuredWalk<DIM> {
    fn write_to<W: io::Write>(&self, w: &mut W) -> Result<(), StreamError> {
        self.origin.write_to(w)?;
        write!(w, " ")?;
        self.previous.write_to(w)?;
        write!(w, " ")?;
        self.dist.write_to(w)?;
        write!(w, " ")?;
        self.data.write_to(w)?;
        write!(w, " ")?;
        let index = self.index.map_or(-1, |i| i as i64);
        index.write_to(w)
    }

    fn read_tokens(tokens: &mut Tokens<'_>) -> Result<Self, StreamError> {
        let origin = Point::<DIM>::read_tokens(tokens)?;
        let previous = Point::<DIM>::read_tokens(tokens)?;
        let dist = f64::read_tokens(tokens)?;
        let data = Point::<DIM>::read_tokens(tokens)?;
        let index = match i64::read_tokens(tokens)? {
            -1 => None,
            i => Some(usize::try_from(i).map_err(|_| StreamError::Parse {
                token: i.to_string(),
            })?),
        };
        Ok(Self {
            origin,
            previous,
            dist,
            data,
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mesh::tests::chain_mesh, Vec2};
    use approx::relative_eq;

    const TOL: f64 = 1e-9;

    fn seed_at(x: f64, y: f64) -> StructuredWalk<2> {
        StructuredWalk::seed(Vec2::new(x, y), Vec2::new(7.0, -1.0), Some(3))
    }

    #[test]
    fn default_is_invalid() {
        let w = StructuredWalk::<2>::default();
        assert!(!w.valid());
        assert_eq!(w.dist(), f64::MAX);
        assert!(seed_at(0.0, 0.0).valid());
    }

    /// Relaxation only ever lowers the distance.
    #[test]
    fn relaxation_is_monotone() {
        let mesh = chain_mesh(4);
        let mut point = StructuredWalk::<2>::default();

        let mut far_edge = StructuredWalk::default();
        assert!(far_edge.update_edge(&mesh, 2, 2, &seed_at(3.0, 0.0), TOL));
        assert!(relative_eq!(far_edge.dist(), 0.5));

        // walk from the far seed down to point 1
        assert!(point.update_point(&mesh, 1, 1, &far_edge, TOL));
        assert!(relative_eq!(point.dist(), 2.0));
        assert_eq!(point.origin(), Vec2::new(3.0, 0.0));
        assert_eq!(point.previous(), mesh.point(1));
        assert_eq!(point.data(), &Vec2::new(7.0, -1.0));
        assert_eq!(point.index(), Some(3));

        // a shorter walk replaces it
        let mut near_edge = StructuredWalk::default();
        near_edge.update_edge(&mesh, 0, 0, &seed_at(0.0, 0.0), TOL);
        assert!(point.update_point(&mesh, 1, 0, &near_edge, TOL));
        assert!(relative_eq!(point.dist(), 1.0));
        assert_eq!(point.origin(), Vec2::new(0.0, 0.0));

        // a longer one doesn't
        let before = point.clone();
        assert!(!point.update_point(&mesh, 1, 1, &far_edge, TOL));
        assert_eq!(point, before);
        assert!(point.dist() <= before.dist());
    }

    #[test]
    fn invalid_neighbours_never_propagate() {
        let mesh = chain_mesh(2);
        let mut point = StructuredWalk::<2>::default();
        assert!(!point.update_point(&mesh, 0, 0, &StructuredWalk::default(), TOL));
        assert!(!point.valid());
        let mut seeded = seed_at(0.0, 0.0);
        assert!(!seeded.merge_point(&mesh, 0, &StructuredWalk::default(), TOL));
        assert_eq!(seeded.dist(), 0.0);
    }

    #[test]
    fn improvements_within_tolerance_are_ignored() {
        let mesh = chain_mesh(2);
        let current = StructuredWalk::new(
            Vec2::new(-10.0, 0.0),
            mesh.point(1),
            10.0,
            Vec2::zeros(),
            None,
        );
        let slightly_better = StructuredWalk::new(
            Vec2::new(-5.0, 0.0),
            mesh.point(1),
            10.0 - 1e-12,
            Vec2::zeros(),
            None,
        );
        let mut w = current.clone();
        assert!(!w.merge_point(&mesh, 1, &slightly_better, TOL));
        assert_eq!(w, current);
        assert!(w.merge_point(&mesh, 1, &slightly_better, 0.0));
        assert_eq!(w.origin(), Vec2::new(-5.0, 0.0));
    }

    /// Leaving through a patch and entering through a coincident one
    /// gives back the original record.
    #[test]
    fn leave_enter_round_trip() {
        let mut mesh = chain_mesh(3);
        let patch = mesh.add_boundary_patch("end", vec![2]).unwrap();
        let patch = mesh.patch(patch).clone();
        let pos = mesh.point(2);

        let original = StructuredWalk::new(
            Vec2::new(0.0, 0.0),
            pos,
            2.0,
            Vec2::new(1.0, 1.0),
            Some(0),
        );
        let mut w = original.clone();
        w.leave_domain(&patch, 0, &pos);
        assert_eq!(w.previous(), Vec2::zeros());
        assert_eq!(w.origin(), Vec2::new(-2.0, 0.0));
        assert_eq!(w.dist(), 2.0);
        w.enter_domain(&patch, 0, &pos);
        assert_eq!(w, original);
        assert_eq!(w.data(), original.data());

        // entering somewhere else shifts the walk there
        w.leave_domain(&patch, 0, &pos);
        w.enter_domain(&patch, 0, &Vec2::new(10.0, 0.0));
        assert_eq!(w.origin(), Vec2::new(8.0, 0.0));
        assert_eq!(w.previous(), Vec2::new(10.0, 0.0));

        let mut invalid = StructuredWalk::<2>::default();
        invalid.leave_domain(&patch, 0, &pos);
        assert!(!invalid.valid());
    }

    #[test]
    fn rotation() {
        let quarter_turn = Rotation::<2>::new(0.0, -1.0, 1.0, 0.0);
        let mut w = StructuredWalk::new(
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 0.0),
            1.0,
            Vec2::new(1.0, 0.0),
            None,
        );
        w.transform(&quarter_turn);
        assert_eq!(w.origin(), Vec2::new(0.0, 1.0));
        assert_eq!(w.previous(), Vec2::new(0.0, 2.0));
        assert_eq!(w.dist(), 1.0);
        assert_eq!(w.data(), &Vec2::new(1.0, 0.0), "payload is not rotated");
    }

    #[test]
    fn geometry_comparison() {
        let a = seed_at(1.0, 2.0);
        let b = seed_at(1.0, 2.0 + 1e-12);
        let c = seed_at(1.0, 2.1);
        assert!(a.same_geometry(&b, TOL));
        assert!(!a.same_geometry(&c, TOL));
        assert!(!a.same_geometry(&StructuredWalk::default(), TOL));
        assert!(StructuredWalk::<2>::default().same_geometry(&StructuredWalk::default(), TOL));
        // near the origin the tolerance is absolute
        assert!(seed_at(0.0, 0.0).same_geometry(&seed_at(1e-10, 0.0), TOL));
    }

    #[test]
    fn stream_round_trip() {
        let w = StructuredWalk::new(
            Vec2::new(0.25, -3.0),
            Vec2::new(1.0, 2.0),
            4.5,
            Vec2::new(0.1, 1e-20),
            Some(12),
        );
        let s = w.to_stream_string().unwrap();
        assert_eq!(s, "0.25 -3.0 1.0 2.0 4.5 0.1 1e-20 12");
        let back = StructuredWalk::<2>::read_from(&mut s.as_bytes()).unwrap();
        assert_eq!(back, w);
        assert_eq!(back.data(), w.data());
        assert_eq!(back.index(), Some(12));

        let invalid = StructuredWalk::<2>::default();
        let s = invalid.to_stream_string().unwrap();
        assert!(s.ends_with(" -1"));
        let back = StructuredWalk::<2>::read_from(&mut s.as_bytes()).unwrap();
        assert!(!back.valid());
        assert_eq!(back.index(), None);

        assert!(StructuredWalk::<2>::read_from(&mut "0 0 0".as_bytes()).is_err());
    }
}
