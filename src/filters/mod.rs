pub mod kalman_2d;

pub use kalman_2d::{Kalman2d, UpdateOutcome};
