//! Walked distance from the left wall of a periodic channel,
//! computed once on the whole mesh and once split into two partitions.

use meshkernels::{
    na, DecomposedWave, EdgeMesh, InProcessTransport, PointEdgeWave, StructuredWalk, Vec2,
    WaveConfig,
};

type Walk = StructuredWalk<2>;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let counts = [8, 5];
    let mut mesh = EdgeMesh::grid(Vec2::zeros(), counts, 0.25);

    // top and bottom walls are periodic
    let bottom = mesh.points_where(|p| p.y == 0.0);
    let top = mesh.points_where(|p| p.y == 1.0);
    mesh.add_cyclic_pair("bottom", bottom, "top", top, None)?;
    let left = mesh.points_where(|p| p.x == 0.0);
    let left_patch = mesh.add_boundary_patch("left", left)?;

    let seeds: Vec<(usize, Walk)> = mesh
        .patch(left_patch)
        .points()
        .iter()
        .map(|&p| (p, Walk::seed(mesh.point(p), na::Vector2::new(0.0, 1.0), Some(p))))
        .collect();

    let mut wave = PointEdgeWave::new(&mesh, WaveConfig::default());
    wave.set_point_info(seeds);
    let status = wave.run();
    println!(
        "single domain: {} iterations, converged: {}, cyclic mismatches: {}",
        status.iterations,
        status.converged,
        wave.cyclic_mismatches()
    );
    print_layers(&mesh, wave.point_info(), counts);

    // the same channel split at x = 1, without the periodic walls
    let plain = EdgeMesh::grid(Vec2::zeros(), counts, 0.25);
    let mut parts = Vec::new();
    let mut globals = Vec::new();
    for (rank, keep_left) in [true, false].into_iter().enumerate() {
        let mut keep = fixedbitset::FixedBitSet::with_capacity(plain.point_count());
        for p in plain.points_where(|p| (p.x <= 1.0) == keep_left || p.x == 1.0) {
            keep.insert(p);
        }
        let (mut part, global) = plain.submesh(&keep);
        let interface = part.points_where(|p| p.x == 1.0);
        part.add_processor_patch("interface", interface, 1 - rank)?;
        parts.push(part);
        globals.push(global);
    }

    let mut decomposed =
        DecomposedWave::new(&parts, WaveConfig::default(), InProcessTransport::new(2))?;
    let left_seeds: Vec<(usize, Walk)> = parts[0]
        .points_where(|p| p.x == 0.0)
        .into_iter()
        .map(|p| (p, Walk::seed(parts[0].point(p), Vec2::zeros(), None)))
        .collect();
    decomposed.set_point_info(0, left_seeds);
    let status = decomposed.iterate(100)?;
    println!(
        "two partitions: {} rounds, {} iterations, converged: {}",
        status.rounds, status.iterations, status.converged
    );
    let far_wall = parts[1].points_where(|p| p.x == 1.75);
    for p in far_wall {
        println!(
            "  point {} at {:?}: {:.3}",
            globals[1][p],
            parts[1].point(p).as_slice(),
            decomposed.wave(1).point_info()[p].dist()
        );
    }

    Ok(())
}

fn print_layers(mesh: &EdgeMesh<2>, info: &[Walk], [nx, ny]: [usize; 2]) {
    for j in (0..ny).rev() {
        let row: Vec<String> = (0..nx)
            .map(|i| format!("{:5.2}", info[j * nx + i].dist()))
            .collect();
        println!("  y = {:4.2} | {}", mesh.point(j * nx).y, row.join(" "));
    }
}
