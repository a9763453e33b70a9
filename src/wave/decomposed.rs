//! Front propagation over a mesh split into partitions.

use super::{PointEdgeWave, ProcessorMessage, WaveConfig, WaveError, WaveInfo};
use crate::EdgeMesh;

/// Message passing between the partitions of a [`DecomposedWave`].
pub trait Transport<Info> {
    /// Queue a message for delivery to `message.to`.
    fn send(&mut self, message: ProcessorMessage<Info>) -> Result<(), WaveError>;

    /// Take all messages delivered to `rank` so far.
    fn receive(&mut self, rank: usize) -> Vec<ProcessorMessage<Info>>;

    /// Reduce one flag per partition with a logical or,
    /// making the result known to every partition.
    fn any(&mut self, flags: &[bool]) -> bool;
}

/// A [`Transport`] delivering messages through in-memory mailboxes.
#[derive(Clone, Debug)]
pub struct InProcessTransport<Info> {
    mailboxes: Vec<Vec<ProcessorMessage<Info>>>,
}

impl<Info> InProcessTransport<Info> {
    /// Create mailboxes for `ranks` partitions.
    pub fn new(ranks: usize) -> Self {
        Self {
            mailboxes: (0..ranks).map(|_| Vec::new()).collect(),
        }
    }

    /// Number of messages waiting across all mailboxes.
    pub fn pending(&self) -> usize {
        self.mailboxes.iter().map(Vec::len).sum()
    }
}

impl<Info> Transport<Info> for InProcessTransport<Info> {
    fn send(&mut self, message: ProcessorMessage<Info>) -> Result<(), WaveError> {
        let rank = message.to;
        let mailbox = self
            .mailboxes
            .get_mut(rank)
            .ok_or(WaveError::UnknownRank { rank })?;
        mailbox.push(message);
        Ok(())
    }

    fn receive(&mut self, rank: usize) -> Vec<ProcessorMessage<Info>> {
        self.mailboxes
            .get_mut(rank)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    fn any(&mut self, flags: &[bool]) -> bool {
        flags.iter().any(|&f| f)
    }
}

/// Outcome of [`DecomposedWave::iterate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecomposedStatus {
    /// Number of exchange rounds performed.
    pub rounds: usize,
    /// Total point-edge-point iterations over all partitions.
    pub iterations: usize,
    /// Whether a full round passed without any partition changing.
    pub converged: bool,
}

/// One [`PointEdgeWave`] per partition of a mesh,
/// exchanging records across processor patches in synchronous rounds.
///
/// In each round every partition first iterates to local convergence.
/// Then each partition sends the records that changed on its processor patches
/// to the neighbours, and merges the records it receives.
/// The run ends once no partition changed anything in a round.
pub struct DecomposedWave<'a, const DIM: usize, Info, T> {
    waves: Vec<PointEdgeWave<'a, DIM, Info>>,
    transport: T,
}

impl<'a, const DIM: usize, Info, T> DecomposedWave<'a, DIM, Info, T>
where
    Info: WaveInfo<DIM>,
    T: Transport<Info>,
{
    /// Create a wave for each partition.
    ///
    /// Partition `i` is `meshes[i]`;
    /// processor patches refer to neighbours by this index.
    pub fn new(
        meshes: &'a [EdgeMesh<DIM>],
        config: WaveConfig,
        transport: T,
    ) -> Result<Self, WaveError> {
        for mesh in meshes {
            for neighbour in mesh.patches().iter().filter_map(|p| p.neighbour()) {
                if neighbour >= meshes.len() {
                    return Err(WaveError::UnknownRank { rank: neighbour });
                }
            }
        }
        Ok(Self {
            waves: meshes
                .iter()
                .map(|mesh| PointEdgeWave::new(mesh, config))
                .collect(),
            transport,
        })
    }

    /// Number of partitions.
    #[inline]
    pub fn partition_count(&self) -> usize {
        self.waves.len()
    }

    /// Set seed records in partition `rank`.
    pub fn set_point_info(&mut self, rank: usize, seeds: impl IntoIterator<Item = (usize, Info)>) {
        self.waves[rank].set_point_info(seeds);
    }

    /// The wave of partition `rank`.
    #[inline]
    pub fn wave(&self, rank: usize) -> &PointEdgeWave<'a, DIM, Info> {
        &self.waves[rank]
    }

    /// The wave of partition `rank`, mutably.
    #[inline]
    pub fn wave_mut(&mut self, rank: usize) -> &mut PointEdgeWave<'a, DIM, Info> {
        &mut self.waves[rank]
    }

    /// The transport used for exchanges.
    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run rounds until no partition changes or `max_rounds` rounds have run.
    pub fn iterate(&mut self, max_rounds: usize) -> Result<DecomposedStatus, WaveError> {
        let mut rounds = 0;
        let mut iterations = 0;
        let mut converged = false;

        while rounds < max_rounds {
            rounds += 1;
            let mut changed = vec![false; self.waves.len()];

            for (wave, changed) in self.waves.iter_mut().zip(&mut changed) {
                let status = wave.run();
                iterations += status.iterations;
                *changed |= !status.converged;
            }

            for (rank, wave) in self.waves.iter_mut().enumerate() {
                for message in wave.processor_messages(rank) {
                    self.transport.send(message)?;
                }
            }

            for (rank, wave) in self.waves.iter_mut().enumerate() {
                for message in self.transport.receive(rank) {
                    changed[rank] |= wave.receive_processor_message(message)?;
                }
            }

            let changed_count = changed.iter().filter(|&&c| c).count();
            log::debug!("round {rounds}: {changed_count} partitions changed");
            if !self.transport.any(&changed) {
                converged = true;
                break;
            }
        }

        if !converged {
            log::warn!("decomposed wave did not converge in {max_rounds} rounds");
        }
        Ok(DecomposedStatus {
            rounds,
            iterations,
            converged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mesh::tests::chain_mesh, StructuredWalk, Vec2};
    use approx::relative_eq;
    use fixedbitset as fb;

    type Walk = StructuredWalk<2>;

    /// Split a mesh into partitions containing the given points,
    /// with processor patches on the points shared between partitions.
    /// Returns each partition along with its points' indices in the full mesh.
    fn split(mesh: &EdgeMesh<2>, parts: &[Vec<usize>]) -> (Vec<EdgeMesh<2>>, Vec<Vec<usize>>) {
        let (mut meshes, globals): (Vec<_>, Vec<_>) = parts
            .iter()
            .map(|part| {
                let mut keep = fb::FixedBitSet::with_capacity(mesh.point_count());
                part.iter().for_each(|&p| keep.insert(p));
                mesh.submesh(&keep)
            })
            .unzip();

        for (rank, sub) in meshes.iter_mut().enumerate() {
            for (other, other_global) in globals.iter().enumerate() {
                if other == rank {
                    continue;
                }
                let shared: Vec<usize> = globals[rank]
                    .iter()
                    .enumerate()
                    .filter(|(_, g)| other_global.contains(g))
                    .map(|(local, _)| local)
                    .collect();
                if !shared.is_empty() {
                    sub.add_processor_patch(format!("proc{rank}to{other}"), shared, other)
                        .unwrap();
                }
            }
        }
        (meshes, globals)
    }

    fn seed_walk(pos: Vec2, index: usize) -> Walk {
        Walk::seed(pos, Vec2::new(index as f64, 0.0), Some(index))
    }

    #[test]
    fn split_chain() {
        let full = chain_mesh(7);
        let (meshes, _) = split(&full, &[(0..=3).collect(), (3..7).collect()]);
        assert_eq!(meshes[0].patch(0).points(), &[3]);
        assert_eq!(meshes[1].patch(0).points(), &[0]);

        let transport = InProcessTransport::new(meshes.len());
        let mut wave =
            DecomposedWave::<2, Walk, _>::new(&meshes, WaveConfig::default(), transport).unwrap();
        wave.set_point_info(0, [(0, seed_walk(meshes[0].point(0), 0))]);
        let status = wave.iterate(10).unwrap();
        assert!(status.converged);
        assert_eq!(status.rounds, 2, "one round to cross, one to confirm");
        assert_eq!(wave.transport().pending(), 0);

        let far = &wave.wave(1).point_info()[3];
        assert!(relative_eq!(far.dist(), 6.0));
        assert_eq!(far.origin(), Vec2::zeros());
        assert_eq!(far.index(), Some(0));
    }

    /// A grid split down the middle gives the same distances as the whole grid.
    #[test]
    fn split_grid_matches_single_domain() {
        let full = EdgeMesh::grid(Vec2::zeros(), [5, 3], 1.0);
        let left = full.points_where(|p| p.x <= 2.0);
        let right = full.points_where(|p| p.x >= 2.0);
        let (meshes, globals) = split(&full, &[left, right]);
        assert_eq!(meshes[0].patch(0).len(), 3);
        assert_eq!(meshes[1].patch(0).neighbour(), Some(0));

        let seeds = [0, 14];
        let mut single = PointEdgeWave::<2, Walk>::new(&full, WaveConfig::default());
        single.set_point_info(seeds.map(|g| (g, seed_walk(full.point(g), g))));
        assert!(single.run().converged);

        let mut decomposed = DecomposedWave::<2, Walk, _>::new(
            &meshes,
            WaveConfig::default(),
            InProcessTransport::new(2),
        )
        .unwrap();
        for (rank, global) in globals.iter().enumerate() {
            let local_seeds = global
                .iter()
                .enumerate()
                .filter(|(_, g)| seeds.contains(g))
                .map(|(local, &g)| (local, seed_walk(meshes[rank].point(local), g)))
                .collect::<Vec<_>>();
            decomposed.set_point_info(rank, local_seeds);
        }
        let status = decomposed.iterate(20).unwrap();
        assert!(status.converged);

        for (rank, global) in globals.iter().enumerate() {
            let part = decomposed.wave(rank);
            assert_eq!(part.unvisited_points(), 0);
            for (local, &g) in global.iter().enumerate() {
                let expected = &single.point_info()[g];
                let got = &part.point_info()[local];
                assert!(
                    relative_eq!(got.dist(), expected.dist(), epsilon = 1e-12),
                    "point {g} in partition {rank}: got {}, expected {}",
                    got.dist(),
                    expected.dist()
                );
            }
        }
    }

    #[test]
    fn round_cap_reports_non_convergence() {
        let full = chain_mesh(7);
        let (meshes, _) = split(&full, &[(0..=3).collect(), (3..7).collect()]);
        let mut wave = DecomposedWave::<2, Walk, _>::new(
            &meshes,
            WaveConfig::default(),
            InProcessTransport::new(2),
        )
        .unwrap();
        wave.set_point_info(0, [(0, seed_walk(meshes[0].point(0), 0))]);
        let status = wave.iterate(1).unwrap();
        assert_eq!(status.rounds, 1);
        assert!(!status.converged);
        // the record crossed but hasn't propagated on the other side yet
        assert_eq!(wave.wave(1).point_info()[0].dist(), 3.0);
        assert!(!wave.wave(1).point_info()[1].valid());

        // resuming finishes
        assert!(wave.iterate(10).unwrap().converged);
        assert!(relative_eq!(wave.wave(1).point_info()[3].dist(), 6.0));
    }

    #[test]
    fn unknown_neighbours_are_rejected() {
        let mut mesh = chain_mesh(2);
        mesh.add_processor_patch("nowhere", vec![1], 5).unwrap();
        let meshes = [mesh, chain_mesh(2)];
        assert!(matches!(
            DecomposedWave::<2, Walk, _>::new(
                &meshes,
                WaveConfig::default(),
                InProcessTransport::new(2)
            ),
            Err(WaveError::UnknownRank { rank: 5 })
        ));

        let mut transport = InProcessTransport::<Walk>::new(1);
        let message = ProcessorMessage {
            from: 0,
            to: 3,
            entries: Vec::new(),
        };
        assert_eq!(
            transport.send(message),
            Err(WaveError::UnknownRank { rank: 3 })
        );
        assert!(transport.receive(3).is_empty());
        assert!(transport.any(&[false, true]));
        assert!(!transport.any(&[]));
    }
}
