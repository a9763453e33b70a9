//! Utilities for loading meshes generated with [`gmsh`](https://www.gmsh.info/).
//!
//! Only version 4.1 of the MSH format is supported,
//! as per the [`mshio`] library.

use std::collections::{BTreeMap, HashSet};

use crate::{EdgeMesh, MeshError, Point};

/// Error in loading a mesh from a Gmsh .msh file.
#[derive(thiserror::Error, Debug)]
pub enum GmshError {
    /// The .msh data is malformed, or an element refers to a node
    /// that can't be mapped to a point. Carries the parser's message.
    #[error("Parsing the .msh data failed: {0}")]
    ParseError(String),
    /// The given .msh file contains no nodes.
    #[error("Invalid .msh data: no nodes")]
    MissingNodes,
    /// The given .msh file contains no elements of the supported type.
    #[error("Invalid .msh data: no elements of the correct type")]
    MissingElements,
    /// Elements or physical groups don't fit together with the nodes.
    #[error("Invalid mesh topology in .msh data")]
    InvalidMesh(#[from] MeshError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct EntityId {
    dim: i32,
    tag: i32,
}

#[derive(Clone, Debug, Default)]
struct PhysicalGroup {
    entities: HashSet<EntityId>,
    nodes: Vec<usize>,
}

/// Load a 2D triangle mesh from a `.msh` file.
///
/// The edges of first-order triangle elements in the file become the edges of the mesh.
/// These must be of type `Tri3` (see [`ElementType`][mshio::ElementType]).
/// The `z` coordinate of nodes is dropped to project the mesh to 2D space.
///
/// # Physical groups
///
/// Each physical group in the file becomes a boundary [`Patch`][crate::Patch]
/// named with the group's integer tag
/// (named groups are currently not supported due to limitations of [`mshio`]),
/// containing every node on an entity in the group in ascending index order.
/// Nodes on the boundary of an entity belong to the entity of lowest dimension
/// they lie on, so e.g. a group for a boundary curve
/// must also contain the curve's end points to include them.
pub fn load_trimesh_2d(bytes: &[u8]) -> Result<EdgeMesh<2>, GmshError> {
    load_mesh::<2, 3>(bytes, mshio::ElementType::Tri3, |x, y, _| {
        Point::<2>::new(x, y)
    })
}

/// Load a 3D tetrahedral mesh from a `.msh` file.
///
/// The edges of first-order tetrahedron elements in the file become the edges of the mesh.
/// These must be of type `Tet4` (see [`ElementType`][mshio::ElementType]).
///
/// See [`load_trimesh_2d`] for information about physical groups.
pub fn load_tetmesh_3d(bytes: &[u8]) -> Result<EdgeMesh<3>, GmshError> {
    load_mesh::<3, 4>(bytes, mshio::ElementType::Tet4, |x, y, z| {
        Point::<3>::new(x, y, z)
    })
}

/// Shared implementation of the loaders,
/// reading `N`-node elements of the given type.
fn load_mesh<const DIM: usize, const N: usize>(
    bytes: &[u8],
    element_type: mshio::ElementType,
    to_point: impl Fn(f64, f64, f64) -> Point<DIM>,
) -> Result<EdgeMesh<DIM>, GmshError> {
    let msh = mshio::parse_msh_bytes(bytes).map_err(|e| GmshError::ParseError(format!("{}", e)))?;
    let nodes = msh.data.nodes.ok_or(GmshError::MissingNodes)?;
    let elements = msh.data.elements.ok_or(GmshError::MissingElements)?;

    let mut physical_groups = gather_physical_groups(msh.data.entities.as_ref());

    let mut points: Vec<Point<DIM>> = Vec::new();
    for block in &nodes.node_blocks {
        let ent_id = EntityId {
            dim: block.entity_dim,
            tag: block.entity_tag,
        };
        let mut groups: Vec<&mut PhysicalGroup> = physical_groups
            .values_mut()
            .filter(|pg| pg.entities.contains(&ent_id))
            .collect();

        for node in &block.nodes {
            let point_idx = points.len();
            points.push(to_point(node.x, node.y, node.z));
            for g in &mut groups {
                g.nodes.push(point_idx);
            }
        }
    }

    if points.is_empty() {
        return Err(GmshError::MissingNodes);
    }

    let simplices: Vec<[usize; N]> = elements
        .element_blocks
        .iter()
        .filter(|block| block.element_type == element_type)
        .flat_map(|block| block.elements.iter())
        .map(|el| {
            // gmsh tags start at 1, subtract 1 to get the index in the array.
            // (this assumes node tags are sequential and in order,
            // which holds for meshes written by gmsh itself)
            let mut simplex = [0; N];
            for (slot, node_tag) in simplex.iter_mut().zip(&el.nodes) {
                *slot = (*node_tag as usize).checked_sub(1).ok_or_else(|| {
                    GmshError::ParseError(format!("invalid node tag {node_tag}"))
                })?;
            }
            if el.nodes.len() < N {
                return Err(GmshError::ParseError(format!(
                    "element with {} nodes, expected {N}",
                    el.nodes.len()
                )));
            }
            Ok(simplex)
        })
        .collect::<Result<_, _>>()?;
    if simplices.is_empty() {
        return Err(GmshError::MissingElements);
    }

    let mut mesh = EdgeMesh::from_simplices(points, &simplices)?;
    for (group_id, mut group) in physical_groups {
        group.nodes.sort_unstable();
        group.nodes.dedup();
        mesh.add_boundary_patch(group_id.to_string(), group.nodes)?;
    }

    Ok(mesh)
}

/// Collect the physical groups defined in a .msh file
/// into a structure we can easily look them up from, ordered by tag.
///
/// This only populates the `entities` field of each group;
/// nodes are filled in while reading the node blocks.
fn gather_physical_groups(
    entities: Option<&mshio::Entities<i32, f64>>,
) -> BTreeMap<i32, PhysicalGroup> {
    let mut groups: BTreeMap<i32, PhysicalGroup> = BTreeMap::new();
    let Some(entities) = entities else {
        return groups;
    };

    let mut add = |dim: i32, tag: i32, physical_tags: &[i32]| {
        for ptag in physical_tags {
            let group = groups.entry(*ptag).or_default();
            group.entities.insert(EntityId { dim, tag });
        }
    };
    for point in &entities.points {
        add(0, point.tag, &point.physical_tags);
    }
    for curve in &entities.curves {
        add(1, curve.tag, &curve.physical_tags);
    }
    for surface in &entities.surfaces {
        add(2, surface.tag, &surface.physical_tags);
    }
    for volume in &entities.volumes {
        add(3, volume.tag, &volume.physical_tags);
    }

    groups
}
