//! Layout planning: constraint resolution and bit packing

pub mod config;
pub mod holes;
pub mod planner;
pub mod resolve;

pub use config::{HoleOrder, PlannerConfig};
pub use planner::{LayoutItem, LayoutPlanner, PlacedLayout};
pub use resolve::FieldConstraints;
