use nalgebra_sparse as nas;

use itertools::Itertools;

use crate::Point;

/// Collect the unique edges of a list of simplices.
///
/// Every pair of points in a simplex is an edge.
/// Edges are stored with their point indices in ascending order
/// and returned in lexicographic order, so the result is independent
/// of how the simplices were oriented.
pub(super) fn extract_edges<const N: usize>(simplices: &[[usize; N]]) -> Vec<[usize; 2]> {
    simplices
        .iter()
        .flat_map(|simplex| simplex.iter().copied().tuple_combinations::<(usize, usize)>())
        .map(|(a, b)| if a < b { [a, b] } else { [b, a] })
        .filter(|[a, b]| a != b)
        .sorted_unstable()
        .dedup()
        .collect()
}

/// Build the edge-to-point incidence matrix,
/// with -1 at the start point and 1 at the end point of each edge.
///
/// The same orientation convention is used for 1-simplices
/// in a simplicial complex's boundary map.
pub(super) fn incidence_matrix(point_count: usize, edges: &[[usize; 2]]) -> nas::CsrMatrix<i8> {
    let mut coo = nas::CooMatrix::new(edges.len(), point_count);
    for (edge_idx, [start, end]) in edges.iter().enumerate() {
        coo.push(edge_idx, *start, -1);
        coo.push(edge_idx, *end, 1);
    }
    nas::CsrMatrix::from(&coo)
}

/// Points and edges of a structured 2D grid with `counts[0] x counts[1]` points.
///
/// Points are numbered with x running fastest.
pub(super) fn grid_2d(
    origin: Point<2>,
    counts: [usize; 2],
    spacing: f64,
) -> (Vec<Point<2>>, Vec<[usize; 2]>) {
    let [nx, ny] = counts;
    let idx = |i: usize, j: usize| j * nx + i;

    let points = itertools::iproduct!(0..ny, 0..nx)
        .map(|(j, i)| origin + Point::<2>::new(i as f64, j as f64) * spacing)
        .collect();

    let mut edges = Vec::new();
    for (j, i) in itertools::iproduct!(0..ny, 0..nx) {
        if i + 1 < nx {
            edges.push([idx(i, j), idx(i + 1, j)]);
        }
        if j + 1 < ny {
            edges.push([idx(i, j), idx(i, j + 1)]);
        }
    }
    (points, edges)
}
