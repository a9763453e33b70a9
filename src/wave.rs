//! Front propagation over the points and edges of a mesh.
//!
//! A [`PointEdgeWave`] holds one record per point and per edge
//! and relaxes them alternately from points onto their edges
//! and from edges onto their points,
//! starting from a set of seed points and continuing until nothing changes.
//! What a record stores and how it relaxes is defined by the [`WaveInfo`] trait;
//! [`StructuredWalk`][crate::StructuredWalk] is the walked-distance implementation.
//!
//! Cyclic patches are coupled within a single wave.
//! Processor patches are coupled between the waves of a partitioned mesh
//! by a [`DecomposedWave`].

mod decomposed;
pub use decomposed::{DecomposedStatus, DecomposedWave, InProcessTransport, Transport};

use fixedbitset as fb;

use crate::{EdgeMesh, Patch, PatchKind, Point, Rotation};

/// A record propagated by a [`PointEdgeWave`].
///
/// Every point and every edge of the mesh owns one record.
/// Records start out as `Default::default()`, which must be invalid.
/// `PartialEq` is used only to skip relaxing a record
/// onto one it is already equal to.
pub trait WaveInfo<const DIM: usize>: Clone + Default + PartialEq {
    /// Whether the record has been reached by the wave.
    fn valid(&self) -> bool;

    /// Whether two records describe the same geometric state within `tol`.
    fn same_geometry(&self, other: &Self, tol: f64) -> bool;

    /// Convert to a representation relative to a patch point at `pos`
    /// before crossing the patch.
    fn leave_domain(&mut self, patch: &Patch<DIM>, patch_point: usize, pos: &Point<DIM>);

    /// Convert back to an absolute representation after crossing a patch,
    /// arriving at a patch point at `pos`.
    fn enter_domain(&mut self, patch: &Patch<DIM>, patch_point: usize, pos: &Point<DIM>);

    /// Apply a rotation between the two sides of a cyclic patch pair.
    /// Called between `leave_domain` and `enter_domain`.
    fn transform(&mut self, rotation: &Rotation<DIM>);

    /// Relax a point's record from the record of an edge touching it.
    /// Returns `true` if the record changed.
    fn update_point(
        &mut self,
        mesh: &EdgeMesh<DIM>,
        point: usize,
        edge: usize,
        edge_info: &Self,
        tol: f64,
    ) -> bool;

    /// Relax a point's record from another record for the same point,
    /// arriving through a cyclic or processor patch.
    /// Returns `true` if the record changed.
    fn merge_point(&mut self, mesh: &EdgeMesh<DIM>, point: usize, new_info: &Self, tol: f64) -> bool;

    /// Relax an edge's record from the record of one of its points.
    /// Returns `true` if the record changed.
    fn update_edge(
        &mut self,
        mesh: &EdgeMesh<DIM>,
        edge: usize,
        point: usize,
        point_info: &Self,
        tol: f64,
    ) -> bool;
}

/// Parameters of a wave.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaveConfig {
    /// Relative tolerance passed to relaxation.
    /// A record only changes if the improvement exceeds this fraction
    /// of its current value. Default `1e-9`.
    pub propagation_tol: f64,
    /// Iteration cap used by [`PointEdgeWave::run`]. Default `10_000`.
    pub max_iterations: usize,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            propagation_tol: 1e-9,
            max_iterations: 10_000,
        }
    }
}

/// Outcome of [`PointEdgeWave::iterate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaveStatus {
    /// Number of point-edge-point iterations performed.
    pub iterations: usize,
    /// Whether the wave stopped because nothing changed
    /// rather than because it hit the iteration cap.
    pub converged: bool,
}

/// Error in exchanging records between partitions.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WaveError {
    /// A message arrived from a partition this mesh has no processor patch for.
    #[error("No processor patch for neighbour {from}")]
    NoProcessorPatch {
        /// The sending partition.
        from: usize,
    },
    /// A message referred to a point beyond the end of the receiving patch.
    #[error("Point {index} out of range for processor patch {patch:?} with {len} points")]
    PatchPointOutOfRange {
        /// Name of the receiving patch.
        patch: String,
        /// The offending patch point index.
        index: usize,
        /// Number of points in the patch.
        len: usize,
    },
    /// A message was addressed to a partition that doesn't exist.
    #[error("No partition with rank {rank}")]
    UnknownRank {
        /// The offending rank.
        rank: usize,
    },
}

/// Records for the points of a processor patch,
/// on their way to the neighbouring partition.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessorMessage<Info> {
    /// Sending partition.
    pub from: usize,
    /// Receiving partition.
    pub to: usize,
    /// Pairs of index within the patch and the record at that point,
    /// already converted with `leave_domain`.
    pub entries: Vec<(usize, Info)>,
}

/// Work list of changed items with constant-time membership checks.
#[derive(Clone, Debug)]
struct ChangeSet {
    flags: fb::FixedBitSet,
    list: Vec<usize>,
}

impl ChangeSet {
    fn new(len: usize) -> Self {
        Self {
            flags: fb::FixedBitSet::with_capacity(len),
            list: Vec::new(),
        }
    }

    fn insert(&mut self, idx: usize) {
        if !self.flags.put(idx) {
            self.list.push(idx);
        }
    }

    fn len(&self) -> usize {
        self.list.len()
    }

    fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Remove and return all entries in insertion order.
    fn take(&mut self) -> Vec<usize> {
        for &idx in &self.list {
            self.flags.set(idx, false);
        }
        std::mem::take(&mut self.list)
    }
}

/// Wavefront propagation of [`WaveInfo`] records over an [`EdgeMesh`].
///
/// ```
/// # use meshkernels::{EdgeMesh, PointEdgeWave, StructuredWalk, Vec2, WaveConfig};
/// let mesh = EdgeMesh::grid(Vec2::zeros(), [3, 3], 1.0);
/// let mut wave = PointEdgeWave::<2, StructuredWalk<2>>::new(&mesh, WaveConfig::default());
/// wave.set_point_info([(0, StructuredWalk::seed(mesh.point(0), Vec2::zeros(), None))]);
/// let status = wave.run();
/// assert!(status.converged);
/// assert!((wave.point_info()[8].dist() - 4.0).abs() < 1e-12);
/// ```
#[derive(Clone, Debug)]
pub struct PointEdgeWave<'a, const DIM: usize, Info> {
    mesh: &'a EdgeMesh<DIM>,
    config: WaveConfig,
    point_info: Vec<Info>,
    edge_info: Vec<Info>,
    changed_points: ChangeSet,
    changed_edges: ChangeSet,
    /// points changed since the last processor exchange
    touched_points: fb::FixedBitSet,
    /// points allowed to change, `None` for all
    zone: Option<fb::FixedBitSet>,
}

impl<'a, const DIM: usize, Info: WaveInfo<DIM>> PointEdgeWave<'a, DIM, Info> {
    /// Create a wave with every record invalid.
    pub fn new(mesh: &'a EdgeMesh<DIM>, config: WaveConfig) -> Self {
        Self {
            mesh,
            config,
            point_info: vec![Info::default(); mesh.point_count()],
            edge_info: vec![Info::default(); mesh.edge_count()],
            changed_points: ChangeSet::new(mesh.point_count()),
            changed_edges: ChangeSet::new(mesh.edge_count()),
            touched_points: fb::FixedBitSet::with_capacity(mesh.point_count()),
            zone: None,
        }
    }

    /// The mesh this wave runs on.
    #[inline]
    pub fn mesh(&self) -> &'a EdgeMesh<DIM> {
        self.mesh
    }

    /// The configuration given at construction.
    #[inline]
    pub fn config(&self) -> &WaveConfig {
        &self.config
    }

    /// Restrict the wave to a set of points.
    ///
    /// Points outside the zone and edges with an endpoint outside it
    /// are never updated. Seeds are set regardless of the zone.
    pub fn set_zone(&mut self, zone: Option<fb::FixedBitSet>) {
        self.zone = zone;
    }

    #[inline]
    fn point_in_zone(&self, point: usize) -> bool {
        self.zone.as_ref().map_or(true, |z| z.contains(point))
    }

    #[inline]
    fn edge_in_zone(&self, edge: usize) -> bool {
        let [a, b] = self.mesh.edge(edge);
        self.point_in_zone(a) && self.point_in_zone(b)
    }

    /// Set the records of seed points, overwriting what was there.
    ///
    /// # Panics
    ///
    /// If a point index is out of range for the mesh.
    pub fn set_point_info(&mut self, seeds: impl IntoIterator<Item = (usize, Info)>) {
        for (point, info) in seeds {
            self.point_info[point] = info;
            self.mark_point(point);
        }
    }

    fn mark_point(&mut self, point: usize) {
        self.changed_points.insert(point);
        self.touched_points.insert(point);
    }

    /// Current records of all points.
    #[inline]
    pub fn point_info(&self) -> &[Info] {
        &self.point_info
    }

    /// Current records of all edges.
    #[inline]
    pub fn edge_info(&self) -> &[Info] {
        &self.edge_info
    }

    /// Number of points waiting to propagate.
    #[inline]
    pub fn changed_point_count(&self) -> usize {
        self.changed_points.len()
    }

    /// Number of points whose record is still invalid.
    pub fn unvisited_points(&self) -> usize {
        self.point_info.iter().filter(|i| !i.valid()).count()
    }

    /// Number of edges whose record is still invalid.
    pub fn unvisited_edges(&self) -> usize {
        self.edge_info.iter().filter(|i| !i.valid()).count()
    }

    /// Propagate the records of changed points onto their edges.
    /// Returns the number of edges that changed.
    pub fn point_to_edge(&mut self) -> usize {
        let tol = self.config.propagation_tol;
        for point in self.changed_points.take() {
            let point_info = &self.point_info[point];
            for &edge in self.mesh.point_edges(point) {
                if !self.edge_in_zone(edge) {
                    continue;
                }
                let edge_info = &mut self.edge_info[edge];
                if *edge_info != *point_info
                    && edge_info.update_edge(self.mesh, edge, point, point_info, tol)
                {
                    self.changed_edges.insert(edge);
                }
            }
        }
        log::trace!("point_to_edge: {} edges changed", self.changed_edges.len());
        self.changed_edges.len()
    }

    /// Propagate the records of changed edges onto their points,
    /// then across cyclic patches.
    /// Returns the number of points that changed.
    pub fn edge_to_point(&mut self) -> usize {
        let tol = self.config.propagation_tol;
        for edge in self.changed_edges.take() {
            for point in self.mesh.edge(edge) {
                if !self.point_in_zone(point) {
                    continue;
                }
                let edge_info = &self.edge_info[edge];
                let point_info = &mut self.point_info[point];
                if *point_info != *edge_info
                    && point_info.update_point(self.mesh, point, edge, edge_info, tol)
                {
                    self.mark_point(point);
                }
            }
        }

        self.handle_cyclic_patches();

        log::trace!("edge_to_point: {} points changed", self.changed_points.len());
        self.changed_points.len()
    }

    /// Carry the records on each cyclic patch's partner across to it.
    fn handle_cyclic_patches(&mut self) {
        let tol = self.config.propagation_tol;
        let mesh = self.mesh;
        for patch in mesh.patches() {
            let PatchKind::Cyclic { partner, .. } = patch.kind() else {
                continue;
            };
            let partner = mesh.patch(*partner);
            for (patch_point, (&point, &partner_point)) in
                patch.points().iter().zip(partner.points()).enumerate()
            {
                if !self.point_in_zone(point) {
                    continue;
                }
                let Some(sent) = self.cross_cyclic(partner, patch_point, partner_point, patch, point)
                else {
                    continue;
                };
                let point_info = &mut self.point_info[point];
                if *point_info != sent && point_info.merge_point(mesh, point, &sent, tol) {
                    self.mark_point(point);
                }
            }
        }
    }

    /// The record at `from_point` on patch `from`
    /// as seen from `to_point` on patch `to` after crossing the coupling.
    /// `None` if there's nothing to carry.
    fn cross_cyclic(
        &self,
        from: &Patch<DIM>,
        patch_point: usize,
        from_point: usize,
        to: &Patch<DIM>,
        to_point: usize,
    ) -> Option<Info> {
        let info = &self.point_info[from_point];
        if !info.valid() {
            return None;
        }
        let mut sent = info.clone();
        sent.leave_domain(from, patch_point, &self.mesh.point(from_point));
        if let PatchKind::Cyclic {
            rotation: Some(rotation),
            ..
        } = from.kind()
        {
            sent.transform(rotation);
        }
        sent.enter_domain(to, patch_point, &self.mesh.point(to_point));
        Some(sent)
    }

    /// Number of cyclic patch points whose record disagrees
    /// with the record on the partner side carried across the coupling.
    ///
    /// Zero after a converged run on a consistently coupled mesh.
    pub fn cyclic_mismatches(&self) -> usize {
        let tol = self.config.propagation_tol;
        let mut mismatches = 0;
        for patch in self.mesh.patches() {
            let PatchKind::Cyclic { partner, .. } = patch.kind() else {
                continue;
            };
            let partner = self.mesh.patch(*partner);
            for (patch_point, (&point, &partner_point)) in
                patch.points().iter().zip(partner.points()).enumerate()
            {
                let here = &self.point_info[point];
                let there = self.cross_cyclic(partner, patch_point, partner_point, patch, point);
                let consistent = match there {
                    Some(there) => here.same_geometry(&there, tol),
                    None => !here.valid(),
                };
                if !consistent {
                    mismatches += 1;
                }
            }
        }
        mismatches
    }

    /// Alternate [`point_to_edge`][Self::point_to_edge]
    /// and [`edge_to_point`][Self::edge_to_point]
    /// until nothing changes or `max_iterations` iterations have run.
    pub fn iterate(&mut self, max_iterations: usize) -> WaveStatus {
        let mut iterations = 0;
        while iterations < max_iterations {
            if self.changed_points.is_empty() {
                break;
            }
            // cyclic coupling still has to run when no edge changed
            self.point_to_edge();
            let changed_points = self.edge_to_point();
            iterations += 1;
            if changed_points == 0 {
                break;
            }
        }

        let converged = self.changed_points.is_empty() && self.changed_edges.is_empty();
        if converged {
            log::debug!("wave converged after {iterations} iterations");
        } else {
            log::warn!(
                "wave did not converge in {max_iterations} iterations, \
                {} points still changing",
                self.changed_points.len()
            );
        }
        WaveStatus {
            iterations,
            converged,
        }
    }

    /// [`iterate`][Self::iterate] with the configured iteration cap.
    pub fn run(&mut self) -> WaveStatus {
        self.iterate(self.config.max_iterations)
    }

    /// Collect the records on processor patches that changed
    /// since the last call, one message per neighbouring partition.
    ///
    /// `rank` is the index of this wave's partition.
    pub fn processor_messages(&mut self, rank: usize) -> Vec<ProcessorMessage<Info>> {
        let mut messages = Vec::new();
        for patch in self.mesh.patches() {
            let Some(neighbour) = patch.neighbour() else {
                continue;
            };
            let entries: Vec<(usize, Info)> = patch
                .points()
                .iter()
                .enumerate()
                .filter(|&(_, &point)| self.touched_points.contains(point))
                .filter(|&(_, &point)| self.point_info[point].valid())
                .map(|(patch_point, &point)| {
                    let mut info = self.point_info[point].clone();
                    info.leave_domain(patch, patch_point, &self.mesh.point(point));
                    (patch_point, info)
                })
                .collect();
            if !entries.is_empty() {
                messages.push(ProcessorMessage {
                    from: rank,
                    to: neighbour,
                    entries,
                });
            }
        }
        self.touched_points.clear();
        messages
    }

    /// Merge the records of a message from a neighbouring partition
    /// into the points of the matching processor patch.
    ///
    /// Returns whether any record changed.
    /// Changed points propagate on the next [`iterate`][Self::iterate].
    pub fn receive_processor_message(
        &mut self,
        message: ProcessorMessage<Info>,
    ) -> Result<bool, WaveError> {
        let tol = self.config.propagation_tol;
        let mesh = self.mesh;
        let patch = mesh
            .patches()
            .iter()
            .find(|p| p.neighbour() == Some(message.from))
            .ok_or(WaveError::NoProcessorPatch { from: message.from })?;

        let mut any_changed = false;
        for (patch_point, mut info) in message.entries {
            let Some(&point) = patch.points().get(patch_point) else {
                return Err(WaveError::PatchPointOutOfRange {
                    patch: patch.name().to_string(),
                    index: patch_point,
                    len: patch.len(),
                });
            };
            if !self.point_in_zone(point) {
                continue;
            }
            info.enter_domain(patch, patch_point, &mesh.point(point));
            let point_info = &mut self.point_info[point];
            if *point_info != info && point_info.merge_point(mesh, point, &info, tol) {
                // received records don't need to be sent back
                self.changed_points.insert(point);
                any_changed = true;
            }
        }
        Ok(any_changed)
    }
}

//
// tests
//
