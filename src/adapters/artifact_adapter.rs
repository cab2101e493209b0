//! JSON model artifact store: one `<base>/<model_id>.json` per model.

use crate::domain::error::TraderError;
use crate::domain::model::ModelArtifact;
use crate::ports::model_port::ModelPort;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct JsonArtifactStore {
    base_path: PathBuf,
}

impl JsonArtifactStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn artifact_path(&self, model_id: &str) -> PathBuf {
        self.base_path.join(format!("{model_id}.json"))
    }
}

impl ModelPort for JsonArtifactStore {
    fn load_artifact(&self, model_id: &str) -> Result<ModelArtifact, TraderError> {
        let path = self.artifact_path(model_id);
        let invalid = |reason: String| TraderError::ArtifactInvalid {
            model_id: model_id.to_string(),
            reason,
        };

        let json = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => invalid(format!("no artifact at {}", path.display())),
            _ => invalid(format!("failed to read {}: {}", path.display(), e)),
        })?;
        let artifact: ModelArtifact =
            serde_json::from_str(&json).map_err(|e| invalid(format!("malformed JSON: {e}")))?;

        if artifact.model_id != model_id {
            return Err(invalid(format!(
                "file names model '{}'",
                artifact.model_id
            )));
        }
        Ok(artifact)
    }

    fn save_artifact(&self, artifact: &ModelArtifact) -> Result<(), TraderError> {
        fs::create_dir_all(&self.base_path)?;
        let json = serde_json::to_string_pretty(artifact).map_err(|e| TraderError::ArtifactInvalid {
            model_id: artifact.model_id.clone(),
            reason: format!("failed to serialize: {e}"),
        })?;
        fs::write(self.artifact_path(&artifact.model_id), json)?;
        Ok(())
    }
}
