use crate::Rotation;

/// A named, ordered group of mesh points.
///
/// Patches select seed points for a traversal
/// and describe how the mesh couples to itself or to other partitions.
#[derive(Clone, Debug, PartialEq)]
pub struct Patch<const DIM: usize> {
    pub(super) name: String,
    pub(super) points: Vec<usize>,
    pub(super) kind: PatchKind<DIM>,
}

/// The role a [`Patch`] plays in a traversal.
#[derive(Clone, Debug, PartialEq)]
pub enum PatchKind<const DIM: usize> {
    /// Plain boundary, not coupled to anything.
    Boundary,
    /// Interface to another partition of a decomposed mesh.
    ///
    /// The partition `neighbour` has a processor patch pointing back here,
    /// listing the shared points in the same order.
    Processor {
        /// Index of the partition on the other side.
        neighbour: usize,
    },
    /// Periodic coupling to another patch of the same mesh.
    ///
    /// Point `i` of this patch coincides with point `i` of the partner
    /// after the partner is mapped by `rotation`.
    Cyclic {
        /// Index of the partner patch in the same mesh.
        partner: usize,
        /// Rotation tensor mapping positions on this side
        /// onto the partner side, if the coupling is rotational.
        rotation: Option<Rotation<DIM>>,
    },
}

impl<const DIM: usize> Patch<DIM> {
    /// Name given to the patch at construction.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mesh point indices in the patch, in patch order.
    #[inline]
    pub fn points(&self) -> &[usize] {
        &self.points
    }

    /// Number of points in the patch.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the patch has no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// What the patch couples to.
    #[inline]
    pub fn kind(&self) -> &PatchKind<DIM> {
        &self.kind
    }

    /// The neighbouring partition if this is a processor patch.
    pub fn neighbour(&self) -> Option<usize> {
        match self.kind {
            PatchKind::Processor { neighbour } => Some(neighbour),
            _ => None,
        }
    }

    /// Whether this is a cyclic patch.
    pub fn is_cyclic(&self) -> bool {
        matches!(self.kind, PatchKind::Cyclic { .. })
    }
}
