//! Parallel builds of independent sessions.
//!
//! Sessions share nothing but the process-wide compiler gate, so they can be
//! built on a rayon pool.
//!
//! ```ignore
//! let mut sessions = vec![builder_a, builder_b];
//! let reports = build_all(&mut sessions);
//! let artifacts = generate_all(&sessions);
//! ```

use rayon::prelude::*;

use crate::builder::{Artifact, BuildReport, Builder};

/// Build every session in parallel. Reports are in session order.
pub fn build_all(sessions: &mut [Builder]) -> Vec<BuildReport> {
    sessions.par_iter_mut().map(Builder::build).collect()
}

/// Generate every session's artifact in parallel.
pub fn generate_all(sessions: &[Builder]) -> Vec<Artifact> {
    sessions.par_iter().map(Builder::generate_artifact).collect()
}
