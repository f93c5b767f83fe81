use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::error::{Result, SlackError};

/// Workspace user directory for rendering transcripts.
///
/// Raw message text carries user ids (`<@U123ABC>`); the directory swaps
/// them for display names so the model sees who said what.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    names: HashMap<String, String>,
}

impl UserDirectory {
    pub fn new(names: HashMap<String, String>) -> Self {
        Self { names }
    }

    /// Loads a `{"U123": "Alice", ...}` JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SlackError::Api(format!("cannot read user directory: {e}")))?;
        let value: Value = serde_json::from_str(&raw)?;
        let Value::Object(map) = value else {
            return Err(SlackError::Api(
                "user directory must be a JSON object".to_string(),
            ));
        };

        let names = map
            .into_iter()
            .filter_map(|(id, name)| name.as_str().map(|n| (id, n.to_string())))
            .collect();
        Ok(Self { names })
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Display name for an id; falls back to the id itself.
    pub fn display_name<'a>(&'a self, user_id: &'a str) -> &'a str {
        self.names.get(user_id).map(String::as_str).unwrap_or(user_id)
    }

    /// Replaces every known user id occurring in `text` with its name.
    pub fn substitute(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (id, name) in &self.names {
            if out.contains(id.as_str()) {
                out = out.replace(id.as_str(), name);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn directory() -> UserDirectory {
        let mut names = HashMap::new();
        names.insert("U111".to_string(), "Alice".to_string());
        names.insert("U222".to_string(), "Bob".to_string());
        UserDirectory::new(names)
    }

    #[test]
    fn substitutes_ids_inside_mentions() {
        let rendered = directory().substitute("<@U111> can you ping <@U222>?");
        assert_eq!(rendered, "<@Alice> can you ping <@Bob>?");
    }

    #[test]
    fn unknown_ids_pass_through() {
        let directory = directory();
        assert_eq!(directory.display_name("U999"), "U999");
        assert_eq!(directory.substitute("hi <@U999>"), "hi <@U999>");
    }

    #[test]
    fn loads_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"U111": "Alice"}}"#).unwrap();

        let directory = UserDirectory::from_file(file.path()).unwrap();
        assert_eq!(directory.display_name("U111"), "Alice");
    }

    #[test]
    fn rejects_non_object_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["U111"]"#).unwrap();

        assert!(UserDirectory::from_file(file.path()).is_err());
    }
}
