//! Built-in model artifacts and the predictors they load into.

pub mod artifact;
pub mod kernel;
pub mod linear;
pub mod scaler;

pub use artifact::{ARTIFACT_FORMAT_VERSION, ModelArtifact, ModelParams};
pub use kernel::KernelModel;
pub use linear::LinearElasticModel;
pub use scaler::StandardScaler;
