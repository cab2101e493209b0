//! Model artifact storage port trait.

use crate::domain::error::TraderError;
use crate::domain::model::ModelArtifact;

pub trait ModelPort {
    fn load_artifact(&self, model_id: &str) -> Result<ModelArtifact, TraderError>;

    fn save_artifact(&self, artifact: &ModelArtifact) -> Result<(), TraderError>;
}
