//! Model registry client: queries the model service for available models
//! and validates requested identifiers before the pipeline commits to any
//! extraction work.
//!
//! Read-only and uncached: every query hits the service, which is the
//! source of truth and may change between calls.

use crate::backend::{BackendError, ModelBackend};
use crate::error::{AnalysisError, Stage};
use crate::output::ModelDescriptor;

/// Fetch the currently available models, in registry order.
pub async fn list_models(
    backend: &dyn ModelBackend,
) -> Result<Vec<ModelDescriptor>, AnalysisError> {
    backend.list_models().await.map_err(|e| match e {
        BackendError::Unavailable { url, detail } => {
            AnalysisError::RegistryUnavailable { url, detail }
        }
        BackendError::Timeout { secs } => AnalysisError::RegistryUnavailable {
            url: backend.base_url().to_string(),
            detail: format!("timed out after {secs}s"),
        },
        other => AnalysisError::RegistryError {
            detail: other.to_string(),
        },
    })
}

/// Whether `requested` matches an available model.
///
/// Ollama model names carry a tag suffix (`gemma3:4b`); a request for the
/// bare family name matches any tag of that family, mirroring how local
/// clients resolve models.
pub fn model_matches(requested: &str, available: &str) -> bool {
    available == requested || available.starts_with(&format!("{requested}:"))
}

/// Validate one requested model identifier against the registry listing.
pub fn validate_model(
    requested: &str,
    available: &[ModelDescriptor],
    stage: Stage,
) -> Result<(), AnalysisError> {
    if available.iter().any(|m| model_matches(requested, &m.name)) {
        Ok(())
    } else {
        Err(AnalysisError::UnknownModel {
            model: requested.to_string(),
            stage,
            available: available.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn descriptors(names: &[&str]) -> Vec<ModelDescriptor> {
        names
            .iter()
            .map(|n| ModelDescriptor {
                name: n.to_string(),
                metadata: serde_json::Map::new(),
            })
            .collect()
    }

    #[test]
    fn exact_name_matches() {
        assert!(model_matches("gemma3:4b", "gemma3:4b"));
    }

    #[test]
    fn bare_family_matches_any_tag() {
        assert!(model_matches("gemma3", "gemma3:4b"));
        assert!(model_matches("qwen2.5vl", "qwen2.5vl:latest"));
    }

    #[test]
    fn unrelated_prefix_does_not_match() {
        assert!(!model_matches("gemma3:4b", "gemma3:27b"));
        assert!(!model_matches("gemma", "gemma3:4b"));
    }

    #[test]
    fn validate_rejects_unknown_model() {
        let available = descriptors(&["gemma3:4b", "qwen2.5vl:latest"]);
        let err = validate_model("llava:7b", &available, Stage::Scan).unwrap_err();
        match err {
            AnalysisError::UnknownModel {
                model,
                stage,
                available,
            } => {
                assert_eq!(model, "llava:7b");
                assert_eq!(stage, Stage::Scan);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_accepts_known_model() {
        let available = descriptors(&["gemma3:4b"]);
        assert!(validate_model("gemma3:4b", &available, Stage::Analysis).is_ok());
    }

    #[tokio::test]
    async fn list_models_passes_through_registry_order() {
        let backend = MockBackend::new(&["b:1", "a:2"]);
        let models = list_models(&backend).await.unwrap();
        let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["b:1", "a:2"]);
    }
}
