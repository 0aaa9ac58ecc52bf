// Library exports for gramstat

pub mod aesthetic;
pub mod coord;
pub mod csv_reader;
pub mod data;
pub mod error;
pub mod ir;
pub mod palette;
pub mod resolve;
pub mod runtime;
pub mod scale;
pub mod stat;
pub mod template;

pub use data::PlotData;
pub use error::PipelineError;
pub use ir::{Aesthetic, ChartSpec, LayerRecord, LayerSpec, Mapping};
pub use runtime::{build_chart, ChartOutput, IdentityPosition, PositionAdjust};
