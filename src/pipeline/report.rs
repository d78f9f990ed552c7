use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

pub const REPORT_TITLE: &str = "Summary Report";
pub const REPORT_RULE: &str = "--------------";
pub const NO_PII_LINE: &str = "No PII found in the provided data.";

/// Running count of detected occurrences per entity type for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityCounts(BTreeMap<String, usize>);

impl EntityCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, entity_type: &str) {
        *self.0.entry(entity_type.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, entity_type: &str) -> usize {
        self.0.get(entity_type).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Sum over every entity type
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// `EMAIL_ADDRESS` -> `Email Address`
///
/// Underscores become spaces; every alphabetic run starts upper case and
/// continues lower case.
pub fn display_label(entity_type: &str) -> String {
    let mut label = String::with_capacity(entity_type.len());
    let mut previous_alphabetic = false;
    for c in entity_type.chars() {
        let c = if c == '_' { ' ' } else { c };
        if c.is_alphabetic() {
            if previous_alphabetic {
                label.extend(c.to_lowercase());
            } else {
                label.extend(c.to_uppercase());
            }
            previous_alphabetic = true;
        } else {
            label.push(c);
            previous_alphabetic = false;
        }
    }
    label
}

/// Renders the summary shown next to the de-identified CSV
pub fn build_report(counts: &EntityCounts) -> String {
    let mut report = String::new();
    report.push_str(REPORT_TITLE);
    report.push('\n');
    report.push_str(REPORT_RULE);
    report.push('\n');

    if counts.is_empty() {
        report.push_str(NO_PII_LINE);
        report.push('\n');
        return report;
    }

    for (entity_type, count) in counts.iter() {
        let _ = writeln!(report, "Total {} found: {}", display_label(entity_type), count);
    }
    report
}
