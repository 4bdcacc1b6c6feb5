#![allow(clippy::needless_range_loop)]

pub mod indicators;
pub mod utilities;

pub use indicators::moving_averages::alma::{
    alma, alma_batch, alma_batch_serial, AlmaBatchBuilder, AlmaBatchOutput, AlmaBatchRange,
    AlmaBuilder, AlmaError, AlmaFilter, AlmaInput, AlmaOutput, AlmaParams, AlmaWeights,
    FilterState,
};
pub use indicators::registry::{AlmaKey, AlmaRegistry};
