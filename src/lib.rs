pub mod app;
pub mod encode;
pub mod export;
pub mod forcing;
pub mod grid;
pub mod math;
pub mod model;
pub mod ops;

pub use app::App;
pub use grid::Grid;
pub use math::{Cell, Vec2};
pub use model::{
    Command, Diagnostics, Model, SimSnapshot, SimulationControlHandle, SimulationParams,
    SourceSpec, StageTimings,
};
