pub mod peu;

pub use peu::{Peu, PeuMode};
