pub mod portal;
pub mod solver;

pub use portal::LookupPortal;
pub use solver::CaptchaSolver;
