//! Scenario loading from YAML/JSON/TOML files
//!
//! Loads scenario batteries from a directory tree or from the built-in
//! battery embedded in the crate.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use gauntlet_core::{GauntletError, GauntletResult, Scenario};
use walkdir::WalkDir;

const BUILTIN_BATTERY: &str = include_str!("../../scenarios/builtin.yaml");

/// Outcome of checking one scenario file
#[derive(Debug)]
pub struct FileCheck {
    pub path: PathBuf,
    /// Ids of the scenarios in the file, or why the file is unusable
    pub outcome: Result<Vec<String>, String>,
}

/// Loader for scenario batteries
pub struct ScenarioLoader {
    /// Base directory for scenario files
    scenarios_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(scenarios_dir: impl AsRef<Path>) -> Self {
        Self {
            scenarios_dir: scenarios_dir.as_ref().to_path_buf(),
        }
    }

    /// The battery shipped with the crate
    pub fn builtin() -> GauntletResult<Vec<Scenario>> {
        let scenarios = load_scenarios_from_yaml(BUILTIN_BATTERY)?;
        check_battery(scenarios)
    }

    /// Load every scenario file below the directory, sorted by id
    ///
    /// Unreadable or invalid files are skipped with a warning; duplicate ids
    /// are an error.
    pub fn load_all(&self) -> GauntletResult<Vec<Scenario>> {
        if !self.scenarios_dir.is_dir() {
            return Err(GauntletError::config(format!(
                "scenario directory not found: {}",
                self.scenarios_dir.display()
            )));
        }

        let mut scenarios = Vec::new();
        for entry in WalkDir::new(&self.scenarios_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !Self::is_scenario_file(path) {
                continue;
            }
            match Self::load_file(path) {
                Ok(mut loaded) => scenarios.append(&mut loaded),
                Err(e) => tracing::warn!("Failed to load scenarios from {:?}: {}", path, e),
            }
        }

        scenarios.retain(|s| match s.validate() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(scenario_id = %s.id, "Skipping invalid scenario: {}", e);
                false
            }
        });
        check_battery(scenarios)
    }

    /// Check every scenario file below the directory without skipping any
    pub fn check_files(&self) -> GauntletResult<Vec<FileCheck>> {
        if !self.scenarios_dir.is_dir() {
            return Err(GauntletError::config(format!(
                "scenario directory not found: {}",
                self.scenarios_dir.display()
            )));
        }

        let mut checks: Vec<FileCheck> = WalkDir::new(&self.scenarios_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| Self::is_scenario_file(e.path()))
            .map(|entry| {
                let outcome = Self::load_file(entry.path())
                    .and_then(|scenarios| {
                        scenarios
                            .into_iter()
                            .map(|s| s.validate().map(|_| s.id))
                            .collect::<GauntletResult<Vec<_>>>()
                    })
                    .map_err(|e| e.to_string());
                FileCheck {
                    path: entry.into_path(),
                    outcome,
                }
            })
            .collect();
        checks.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(checks)
    }

    /// Load only the scenarios with the given ids, in the order given
    pub fn load_selected(&self, ids: &[String]) -> GauntletResult<Vec<Scenario>> {
        select(self.load_all()?, ids)
    }

    /// A file holds either one scenario or a list of them
    fn load_file(path: &Path) -> GauntletResult<Vec<Scenario>> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => load_scenarios_from_yaml(&content),
            Some("json") => {
                let value: serde_json::Value = serde_json::from_str(&content)?;
                if value.is_array() {
                    Ok(serde_json::from_value(value)?)
                } else {
                    Ok(vec![serde_json::from_value(value)?])
                }
            }
            Some("toml") => {
                let scenario: Scenario = toml::from_str(&content)
                    .map_err(|e| GauntletError::config(format!("invalid TOML scenario: {}", e)))?;
                Ok(vec![scenario])
            }
            _ => Ok(Vec::new()),
        }
    }

    fn is_scenario_file(path: &Path) -> bool {
        if !path.is_file() {
            return false;
        }
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml") | Some("json") | Some("toml")
        )
    }
}

/// Parse one scenario or a list of scenarios from YAML
pub fn load_scenarios_from_yaml(yaml: &str) -> GauntletResult<Vec<Scenario>> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|e| GauntletError::config(format!("invalid YAML: {}", e)))?;
    let parsed = if value.is_sequence() {
        serde_yaml::from_value(value)
    } else {
        serde_yaml::from_value(value).map(|s: Scenario| vec![s])
    };
    parsed.map_err(|e| GauntletError::config(format!("invalid scenario: {}", e)))
}

/// Keep only `ids`, in that order; unknown ids are an error
pub fn select(scenarios: Vec<Scenario>, ids: &[String]) -> GauntletResult<Vec<Scenario>> {
    if ids.is_empty() {
        return Ok(scenarios);
    }
    ids.iter()
        .map(|id| {
            scenarios
                .iter()
                .find(|s| &s.id == id)
                .cloned()
                .ok_or_else(|| GauntletError::config(format!("unknown scenario id: {}", id)))
        })
        .collect()
}

fn check_battery(mut scenarios: Vec<Scenario>) -> GauntletResult<Vec<Scenario>> {
    let mut seen = HashSet::new();
    for scenario in &scenarios {
        if !seen.insert(scenario.id.as_str()) {
            return Err(GauntletError::config(format!(
                "duplicate scenario id: {}",
                scenario.id
            )));
        }
    }
    scenarios.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(scenarios)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_core::TurnRole;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_battery_is_valid() {
        let scenarios = ScenarioLoader::builtin().unwrap();
        assert!(scenarios.len() >= 4);
        for scenario in &scenarios {
            scenario.validate().unwrap();
        }
        let plan = scenarios.iter().find(|s| s.id == "multi-step-plan").unwrap();
        assert_eq!(plan.turns[1].role, TurnRole::Agent);
        let recall = scenarios.iter().find(|s| s.id == "context-recall").unwrap();
        assert!(recall.context_preamble().unwrap().contains("MAX_CONNECTIONS"));
    }

    #[test]
    fn test_load_directory_of_mixed_formats() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("b.yaml"),
            "id: b\nname: B\nturns:\n  - role: user\n    message: hi\n",
        )
        .unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(
            dir.path().join("nested").join("a.json"),
            r#"[{"id": "a", "name": "A", "turns": [{"role": "user", "message": "hello"}]}]"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("c.toml"),
            "id = \"c\"\nname = \"C\"\n\n[[turns]]\nrole = \"user\"\nmessage = \"hey\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.yaml"), "id: [unterminated").unwrap();
        std::fs::write(dir.path().join("empty.yaml"), "id: d\nname: D\nturns: []\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "# not a scenario").unwrap();

        let scenarios = ScenarioLoader::new(dir.path()).load_all().unwrap();
        let ids: Vec<&str> = scenarios.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_check_files_reports_each_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("good.yaml"),
            "id: good\nname: Good\nturns:\n  - role: user\n    message: hi\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("no-turns.yaml"), "id: d\nname: D\nturns: []\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let checks = ScenarioLoader::new(dir.path()).check_files().unwrap();
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].outcome.as_ref().unwrap(), &vec!["good".to_string()]);
        assert!(checks[1].outcome.is_err());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let dir = TempDir::new().unwrap();
        let body = "id: same\nname: Same\nturns:\n  - role: user\n    message: hi\n";
        std::fs::write(dir.path().join("one.yaml"), body).unwrap();
        std::fs::write(dir.path().join("two.yml"), body).unwrap();

        let result = ScenarioLoader::new(dir.path()).load_all();
        assert!(matches!(result, Err(GauntletError::Config(_))));
    }

    #[test]
    fn test_select_keeps_requested_order() {
        let scenarios = ScenarioLoader::builtin().unwrap();
        let picked = select(
            scenarios,
            &["multi-step-plan".to_string(), "basic-instruction".to_string()],
        )
        .unwrap();
        assert_eq!(picked[0].id, "multi-step-plan");
        assert_eq!(picked[1].id, "basic-instruction");

        let missing = select(ScenarioLoader::builtin().unwrap(), &["nope".to_string()]);
        assert!(missing.is_err());
    }
}
