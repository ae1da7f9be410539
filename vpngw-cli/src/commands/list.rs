//! `vpngw list` command handler

use std::io::Write;

use serde::Serialize;

use vpngw_scenario::ScenarioKind;

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `list` command. Needs no configuration.
pub fn execute(writer: &OutputWriter) -> Result<(), CliError> {
    writer.render(&ScenarioList::catalogue())?;
    Ok(())
}

#[derive(Serialize)]
pub struct ScenarioList {
    pub scenarios: Vec<ScenarioEntry>,
}

#[derive(Serialize)]
pub struct ScenarioEntry {
    pub name: &'static str,
    pub label: &'static str,
    pub terraform_dir: String,
    pub prerequisite: bool,
    pub description: &'static str,
}

impl ScenarioList {
    pub fn catalogue() -> Self {
        Self {
            scenarios: ScenarioKind::ALL
                .into_iter()
                .map(|kind| ScenarioEntry {
                    name: kind.name(),
                    label: kind.label(),
                    terraform_dir: kind.terraform_dir().display().to_string(),
                    prerequisite: kind.needs_prerequisite(),
                    description: kind.description(),
                })
                .collect(),
        }
    }
}

impl Render for ScenarioList {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{:<22} {:<7} {:<32} {:<13} Description",
            "Scenario", "Label", "Directory", "Prerequisite"
        )?;
        writeln!(w, "{}", "-".repeat(100))?;
        for s in &self.scenarios {
            let prerequisite = if s.prerequisite { "remote gw" } else { "-" };
            writeln!(
                w,
                "{:<22} {:<7} {:<32} {:<13} {}",
                s.name.bold(),
                s.label,
                s.terraform_dir,
                prerequisite,
                s.description
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_lists_every_scenario() {
        let list = ScenarioList::catalogue();
        let names: Vec<_> = list.scenarios.iter().map(|s| s.name).collect();
        assert_eq!(names, ["single-site", "multiple-connections", "vpc-to-vpc"]);
        assert!(list.scenarios[0].prerequisite);
        assert!(!list.scenarios[2].prerequisite);
    }

    #[test]
    fn test_catalogue_text_and_json() {
        let list = ScenarioList::catalogue();
        let mut buffer = Vec::new();
        list.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf8");
        assert!(output.contains("examples/multiple-connections"));

        let json = serde_json::to_value(&list).expect("json");
        assert_eq!(json["scenarios"][2]["label"], "vpcs");
    }
}
