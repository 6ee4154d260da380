pub mod result_reporter;
pub mod strategy;

pub use result_reporter::{ExtractionResult, ResultReporter, Status};
pub use strategy::{
    CommandInputs, OutputChannel, Stage, StageTracker, Strategy, StrategyContext,
};
