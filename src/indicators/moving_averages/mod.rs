pub mod alma;

pub use alma::{
    alma, alma_batch, alma_batch_serial, alma_into_slice, AlmaBatchBuilder, AlmaBatchOutput,
    AlmaBatchRange, AlmaBuilder, AlmaData, AlmaError, AlmaFilter, AlmaInput, AlmaOutput,
    AlmaParams, AlmaWeights, FilterState,
};
