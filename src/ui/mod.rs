pub mod output;
pub mod progress;

pub use output::{OutputFormatter, BANNER};
pub use progress::ProgressManager;
