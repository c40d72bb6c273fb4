//! Hides the sequential/parallel split behind a single interface so the row scheduler never
//! has to branch on which mode is active.

/// A fixed group of peer processes cooperating on one concatenation run. Sequential mode is
/// represented by a single-rank cohort that turns every operation into a no-op.
pub trait Cohort {
    /// Number of ranks in the cohort. Always ≥ 1.
    fn size(&self) -> usize;

    /// This process's rank, in `0..size()`.
    fn rank(&self) -> usize;

    /// Blocks until every rank has called `barrier`.
    fn barrier(&self);

    /// True when more than one rank is cooperating and every container-mutating call must be
    /// collective.
    fn is_parallel(&self) -> bool {
        self.size() > 1
    }

    /// Opens a collective region: a span of container calls every rank must enter and leave
    /// together, whether or not this rank has rows to contribute this iteration. Skipping the
    /// region on even one rank is exactly the bug the scheduler's zero-row windows exist to
    /// avoid. The returned guard barriers on drop, so a caller cannot fall out of the region
    /// without every rank having rejoined.
    fn collective_region(&self) -> CollectiveRegion<'_> {
        CollectiveRegion { cohort: self }
    }
}

/// Guard returned by [`Cohort::collective_region`]. Dropping it barriers.
pub struct CollectiveRegion<'a> {
    cohort: &'a dyn Cohort,
}

impl Drop for CollectiveRegion<'_> {
    fn drop(&mut self) {
        self.cohort.barrier();
    }
}

/// Single-rank cohort used for sequential runs. `barrier` is a no-op because there is no one
/// else to synchronize with.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialCohort;

impl Cohort for SequentialCohort {
    fn size(&self) -> usize {
        1
    }

    fn rank(&self) -> usize {
        0
    }

    fn barrier(&self) {}
}

#[cfg(feature = "mpi")]
pub mod parallel {
    use mpi::environment::Universe;
    use mpi::topology::{Communicator, SimpleCommunicator};

    use super::Cohort;

    /// Cohort backed by an MPI communicator, used when the run was launched under `mpirun`/
    /// `srun` or `WANT_MPI` forces parallel mode. Holds onto the `Universe` for as long as the
    /// cohort lives, since dropping it calls `MPI_Finalize`.
    pub struct MpiCohort {
        _universe: Universe,
        world: SimpleCommunicator,
    }

    impl MpiCohort {
        /// Initializes the MPI universe and wraps its world communicator.
        ///
        /// # Panics
        ///
        /// Panics if MPI has already been initialized in this process (the `mpi` crate
        /// enforces a single `initialize` call per process).
        #[must_use]
        pub fn init() -> Self {
            let universe = mpi::initialize().expect("MPI initialize must succeed exactly once");
            let world = universe.world();
            Self {
                _universe: universe,
                world,
            }
        }
    }

    impl Cohort for MpiCohort {
        fn size(&self) -> usize {
            self.world.size() as usize
        }

        fn rank(&self) -> usize {
            self.world.rank() as usize
        }

        fn barrier(&self) {
            self.world.barrier();
        }
    }
}

#[cfg(feature = "mpi")]
pub use parallel::MpiCohort;

/// True when `WANT_MPI` is set in the environment, forcing parallel mode regardless of cohort
/// size (per the original tool's environment-driven override).
#[must_use]
pub fn want_mpi_env() -> bool {
    std::env::var_os("WANT_MPI").is_some()
}
