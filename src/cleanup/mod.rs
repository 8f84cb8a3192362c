//! Ring cleanup stages applied after tracing.
//!
//! Stage order is fixed by the pipeline: pinch excursions → simplify →
//! bevel. Each stage takes an `Mpoly` by reference and returns a new one
//! with the same rings, hole flags and parents; only points change.

mod bevel;
mod pinch;
mod simplify;

pub use bevel::bevel_self_intersections;
pub use pinch::{pinch_excursions, ExcursionSink, PinchPolicy};
pub use simplify::simplify;
