//! Information lines shown for a single artifact.

use serde::Serialize;

use super::artifact::Artifact;

/// Placeholder shown when there is nothing to describe.
pub const NO_INFORMATION: &str =
    "Sorry, no information to show right now. Try clicking an assigned artifact!";

/// Ordered detail view for one artifact, or the placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDetail {
    pub found: bool,
    pub lines: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ArtifactDetail {
    /// Name, type and project always; status, priority and description only
    /// when the server supplied them.
    #[must_use]
    pub fn for_artifact(artifact: &Artifact, base_url: &str) -> Self {
        if artifact.is_header() {
            return Self::not_found();
        }

        let mut lines = vec![
            format!("{} - {}", artifact.composite_key(), artifact.display_name()),
            format!("Type: {}", artifact.subtype()),
            format!("Project: {}", artifact.project_name()),
        ];
        let optional = [
            ("Status", artifact.status_label()),
            ("Priority", artifact.priority_label()),
            ("Description", artifact.description()),
        ];
        for (label, value) in optional {
            if !value.is_empty() {
                lines.push(format!("{label}: {value}"));
            }
        }

        Self {
            found: true,
            lines,
            url: artifact.detail_url(base_url),
        }
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self {
            found: false,
            lines: vec![NO_INFORMATION.to_string()],
            url: None,
        }
    }
}
