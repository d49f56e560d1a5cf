use serde::{Deserialize, Serialize};

/// A project the user can see, as returned by the `projects` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "ProjectId")]
    pub project_id: i64,
    #[serde(rename = "Name", default)]
    pub name: String,
}

/// Resolve a project by exact id or case-insensitive name.
#[must_use]
pub fn find_project<'a>(projects: &'a [Project], needle: &str) -> Option<&'a Project> {
    let needle = needle.trim();
    if let Ok(id) = needle.parse::<i64>()
        && let Some(project) = projects.iter().find(|p| p.project_id == id)
    {
        return Some(project);
    }
    projects
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Project> {
        serde_json::from_str(
            r#"[{"ProjectId": 1, "Name": "Library Information System", "Website": null},
                {"ProjectId": 2, "Name": "Sample Application One"}]"#,
        )
        .expect("valid projects json")
    }

    #[test]
    fn projects_deserialize_from_remote_shape() {
        let projects = sample();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[1].project_id, 2);
        assert_eq!(projects[1].name, "Sample Application One");
    }

    #[test]
    fn find_by_id_or_name() {
        let projects = sample();
        assert_eq!(find_project(&projects, "2").map(|p| p.project_id), Some(2));
        assert_eq!(
            find_project(&projects, "library information system").map(|p| p.project_id),
            Some(1)
        );
        assert!(find_project(&projects, "Nope").is_none());
    }
}
