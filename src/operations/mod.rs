pub mod build_structure;
pub mod distance_transform;
pub mod margin;
pub mod reconstruct;
pub mod seed;

pub use build_structure::BuildStructure;
pub use distance_transform::{AxisPass, DistanceTransform, Sweep};
pub use margin::{apply_margin, MarginAnisotropic, MarginAsymmetric, MarginSymmetric};
pub use reconstruct::ReconstructContours;
