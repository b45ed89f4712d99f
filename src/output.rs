//! Output formatting module
//!
//! Handles:
//! - Human-readable validation reports and channel trees
//! - JSON documents for scripting (`--json`)

use std::fmt::Write;

use anyhow::Result;
use serde::Serialize;

use crate::models::{ValidationOutcome, ValidationReport};
use crate::tree::{PathTree, TreeNode};

/// JSON shape of a validation command result
#[derive(Debug, Serialize)]
pub struct ValidationOutput<'a> {
    #[serde(flatten)]
    pub report: &'a ValidationReport,
    /// Fields whose validity marker ended up false
    pub invalid_fields: Vec<&'static str>,
    /// Whether the configuration was written
    pub saved: bool,
}

/// JSON shape of the channel listing
#[derive(Debug, Serialize)]
pub struct ChannelListing<'a> {
    pub channel_count: usize,
    pub selected: Vec<&'a str>,
    pub tree: &'a TreeNode,
}

impl<'a> ChannelListing<'a> {
    pub fn new(tree: &'a PathTree) -> Self {
        Self {
            channel_count: tree.leaf_count(),
            selected: tree.selected_leaf_paths().collect(),
            tree: tree.root(),
        }
    }
}

fn ordinal_list(ordinals: &[usize]) -> String {
    if ordinals.is_empty() {
        return "none".to_string();
    }
    ordinals
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render a validation result for people
pub fn render_report(output: &ValidationOutput<'_>) -> String {
    let report = output.report;
    let mut text = String::new();

    match &report.outcome {
        ValidationOutcome::Passed => {
            let _ = writeln!(text, "Validation passed.");
        }
        ValidationOutcome::Failed(failure) => {
            let _ = writeln!(
                text,
                "Validation failed at step {} ({}):",
                failure.ordinal, failure.name
            );
            let _ = writeln!(text, "  {}", failure.message);
        }
    }

    if !output.invalid_fields.is_empty() {
        let _ = writeln!(text, "  Invalid fields: {}", output.invalid_fields.join(", "));
    }

    let _ = writeln!(text, "\nValidation Summary:");
    let _ = writeln!(text, "  Passed: {}", ordinal_list(&report.passed));
    let _ = writeln!(text, "  Skipped: {}", ordinal_list(&report.skipped));
    let _ = writeln!(text, "  Duration: {}ms", report.duration_ms);
    if output.saved {
        let _ = writeln!(text, "  Status: Configuration saved");
    }
    text
}

fn render_node(text: &mut String, node: &TreeNode, depth: usize) {
    let marker = if node.is_checked() { "[x]" } else { "[ ]" };
    let _ = write!(text, "{}{} {}", "  ".repeat(depth), marker, node.name());
    if let Some(path) = node.leaf_path() {
        if node.is_leaf() && path != node.name() {
            let _ = write!(text, "  ({})", path);
        }
    }
    text.push('\n');
    for child in node.children() {
        render_node(text, child, depth + 1);
    }
}

/// Render the selection tree with checked markers
pub fn render_tree(tree: &PathTree) -> String {
    let mut text = String::new();
    if tree.root().children().is_empty() {
        text.push_str("No channels found.\n");
        return text;
    }

    for child in tree.root().children() {
        render_node(&mut text, child, 0);
    }
    let _ = writeln!(
        text,
        "\n{} of {} channels selected",
        tree.selected_leaf_paths().count(),
        tree.leaf_count()
    );
    text
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StepFailure;
    use uuid::Uuid;

    fn report(outcome: ValidationOutcome) -> ValidationReport {
        ValidationReport {
            run_id: Uuid::nil(),
            outcome,
            passed: vec![1],
            skipped: vec![2, 4],
            duration_ms: 7,
        }
    }

    #[test]
    fn test_failed_report_names_step() {
        let report = report(ValidationOutcome::Failed(StepFailure {
            ordinal: 3,
            name: "Primary TLS Certificate".to_string(),
            message: "Primary host certificate does not match primary.cert".to_string(),
        }));
        let text = render_report(&ValidationOutput {
            report: &report,
            invalid_fields: vec![],
            saved: false,
        });

        assert!(text.starts_with("Validation failed at step 3 (Primary TLS Certificate):"));
        assert!(text.contains("  Primary host certificate does not match primary.cert"));
        assert!(text.contains("  Skipped: 2, 4"));
        assert!(!text.contains("Configuration saved"));
    }

    #[test]
    fn test_json_report_is_flat() {
        let report = report(ValidationOutcome::Passed);
        let json = to_json(&ValidationOutput {
            report: &report,
            invalid_fields: vec!["suffix"],
            saved: true,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["outcome"]["status"], "passed");
        assert_eq!(value["invalid_fields"][0], "suffix");
        assert_eq!(value["saved"], true);
        assert_eq!(value["skipped"], serde_json::json!([2, 4]));
    }

    #[test]
    fn test_tree_rendering() {
        let mut tree = PathTree::build(["Application", "System-Log/Security"]);
        tree.apply_selection(["System-Log/Security"]);

        let text = render_tree(&tree);
        assert!(text.contains("[ ] Application\n"));
        assert!(text.contains("[ ] System\n  [ ] Log\n    [x] Security  (System-Log/Security)\n"));
        assert!(text.contains("1 of 2 channels selected"));
    }

    #[test]
    fn test_empty_tree() {
        assert_eq!(render_tree(&PathTree::new()), "No channels found.\n");
    }

    #[test]
    fn test_channel_listing_json() {
        let mut tree = PathTree::build(["Application", "Security"]);
        tree.apply_selection(["Security"]);
        let value = serde_json::to_value(ChannelListing::new(&tree)).unwrap();

        assert_eq!(value["channel_count"], 2);
        assert_eq!(value["selected"], serde_json::json!(["Security"]));
        assert_eq!(value["tree"]["children"][1]["checked"], true);
    }
}
