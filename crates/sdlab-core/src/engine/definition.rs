//! Workflow document parsing and loading.
//!
//! Workflow files are JSON: a bare step array, `{"nodes": [...]}`, or an
//! envelope with `metadata` and `workflow.nodes`.

use std::path::Path;

use thiserror::Error;

use sdlab_types::step::WorkflowDocument;

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Parse a JSON string into a workflow document.
pub fn parse_workflow(json: &str) -> Result<WorkflowDocument, DefinitionError> {
    serde_json::from_str(json).map_err(|e| DefinitionError::ParseError(e.to_string()))
}

/// Load and parse a workflow file from disk.
pub fn load_workflow_file(path: &Path) -> Result<WorkflowDocument, DefinitionError> {
    let content = std::fs::read_to_string(path)?;
    parse_workflow(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_envelope_document() {
        let doc = parse_workflow(
            r#"{
                "metadata": {"name": "NiS deposition"},
                "workflow": {"nodes": [
                    {"id": "setup", "type": "sdl1ExperimentSetup", "params": {"experiment_id": "NiS_01"}}
                ]}
            }"#,
        )
        .unwrap();
        assert!(matches!(doc, WorkflowDocument::Envelope(_)));
        assert_eq!(doc.steps()[0].step_type, "sdl1ExperimentSetup");
    }

    #[test]
    fn rejects_non_workflow_json() {
        let err = parse_workflow(r#""just a string""#).unwrap_err();
        assert!(matches!(err, DefinitionError::ParseError(_)));
        assert!(parse_workflow("{not json").is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("wf.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"[{{"id": "a", "type": "home_robot"}}]"#).unwrap();

        let doc = load_workflow_file(&path).unwrap();
        assert_eq!(doc.steps().len(), 1);

        let missing = load_workflow_file(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, DefinitionError::IoError(_)));
    }
}
