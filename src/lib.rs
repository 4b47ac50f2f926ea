//! Coordinate synchronization between genomes that differ by insertions and
//! deletions, and a chromosome-parallel operation pool for layer computations.

pub mod argparse;
pub mod aux;
pub mod core;
pub mod runner;
pub mod utils;
