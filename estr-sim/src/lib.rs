//! estr-sim: synthetic STR genotype and expression data with known causal
//! eSTR effects.
//!
//! Two generators share one statistical model:
//! - `mutate`: per-patient tumor allele lengths from a stochastic
//!   insertion/deletion process over a reference locus catalog
//! - `express`: per-patient, per-gene expression with injected eSTR signal
//!   plus uniform noise
//!
//! Both take an optional seed and build their own `StdRng`, so concurrent
//! invocations never share generator state and a fixed seed reproduces
//! bit-identical output.

pub mod express;
pub mod mutate;

pub use express::simulate_expression;
pub use mutate::{simulate_genotypes, MutationParams};
