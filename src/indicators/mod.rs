pub mod moving_averages;
pub mod registry;
