//! Charts module - Diverging bar chart rendering

mod renderer;

pub use renderer::{ChartSpec, DivergingBarRenderer, RenderError};
