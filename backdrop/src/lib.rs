mod backdrop;
pub mod cpu;
pub mod double_buffer;
pub mod emitter;
pub mod grid;
pub mod pointer;
pub mod render;
pub mod rng;
pub mod scheduler;
pub mod settings;
pub mod splat;
pub mod stepper;

pub use backdrop::{Backdrop, Problem, Result};
pub use pointer::{PointerInput, PointerLatch};
pub use scheduler::{Animation, Scheduler, State};
pub use settings::Settings;
