pub mod config;
pub mod contour;
pub mod error;
pub mod grid;
pub mod host;
pub mod math;
pub mod operations;
pub mod pipeline;

pub use config::{HostConfig, PipelineConfig, ReconstructParams, ResourceLimits};
pub use contour::{Contour, MarginRequest, PerSideMargins};
pub use error::{MarginError, Result};
pub use host::{JobHandle, JobPayload, JobReport, MarginHost};
pub use pipeline::MarginPipeline;
