pub mod interactive;
pub mod progress;
pub mod report;

pub use progress::{Ui, get_multi};
