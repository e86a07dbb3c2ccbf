//! Table formatting helpers for CLI output.

use comfy_table::{ContentArrangement, Table};
use layercheck_core::Verdict;

/// Create a styled table with the given headers.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.load_preset(comfy_table::presets::NOTHING);
    table.set_header(headers);
    table
}

/// One row per finding, in report order.
pub fn findings_table(verdict: &Verdict) -> Table {
    let mut table = new_table(&["LAYER", "KIND", "PATH", "DESCRIPTION"]);
    for finding in &verdict.findings {
        table.add_row(vec![
            finding.layer.to_string(),
            finding.kind.to_string(),
            format!("/{}", finding.path),
            finding.description.clone(),
        ]);
    }
    table
}

/// Print a verdict as a table plus summary line, or as JSON.
pub fn print_verdict(verdict: &Verdict, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(verdict)?);
        return Ok(());
    }
    if !verdict.findings.is_empty() {
        println!("{}", findings_table(verdict));
    }
    println!(
        "{} ({} finding(s))",
        if verdict.passed { "PASSED" } else { "FAILED" },
        verdict.findings.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use layercheck_core::{Finding, FindingKind};

    #[test]
    fn test_findings_table_has_row_per_finding() {
        let verdict = Verdict::from_findings(vec![
            Finding::new(FindingKind::DisallowedModification, 1, "usr/bin/foo", "edited"),
            Finding::new(FindingKind::Warning, 2, "opt/x", "third party"),
        ]);

        let rendered = findings_table(&verdict).to_string();

        assert!(rendered.contains("/usr/bin/foo"));
        assert!(rendered.contains("disallowed-modification"));
        assert!(rendered.contains("third party"));
        assert_eq!(findings_table(&verdict).row_iter().count(), 2);
    }

    #[test]
    fn test_new_table_headers() {
        let table = new_table(&["A", "B"]);
        assert!(table.to_string().contains('A'));
    }
}
