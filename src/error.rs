use thiserror::Error;

/// Top-level error type for the margin engine.
#[derive(Debug, Error)]
pub enum MarginError {
    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Errors related to voxel grids and their buffers.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("resolution along {axis} = {value} must be finite and positive")]
    InvalidResolution { axis: &'static str, value: f64 },

    #[error("grid dimension along {0} is zero")]
    EmptyDimension(&'static str),

    #[error("grid of {voxels} voxels exceeds the limit of {limit}")]
    ResourceLimitExceeded { voxels: u128, limit: usize },

    #[error("buffer holds {actual} elements but the grid needs {expected}")]
    BufferLength { expected: usize, actual: usize },

    #[error("voxel ({x}, {y}, {z}) is outside the grid")]
    OutOfBounds { x: usize, y: usize, z: usize },
}

/// Errors related to margin pipeline operations.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("operation failed: {0}")]
    Failed(String),
}

/// Errors related to the job host.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("job was cancelled")]
    Cancelled,

    #[error("job channel disconnected before a report arrived")]
    Disconnected,

    #[error("host has shut down")]
    ShutDown,
}

/// Convenience type alias for results using [`MarginError`].
pub type Result<T> = std::result::Result<T, MarginError>;
