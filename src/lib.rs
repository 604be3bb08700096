//! herakles-proc-cpu-sampler: 100 Hz per-core and per-process CPU sampling.
//!
//! The engine reads cumulative tick counters from /proc, diffs consecutive
//! samples held in double buffers, and ranks the five busiest processes of
//! every 10 ms interval.

pub mod delta;
pub mod index;
pub mod report;
pub mod sampler;
pub mod stats;
pub mod system;
pub mod topk;
