use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::{fs, path::Path};

use crate::error::{Error, Result};

static TABLE_IDENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("table identifier pattern should be valid")
});

/// A clean file and the table it is copied into.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MappingEntry {
    pub file: String,
    pub table: String,
}

impl MappingEntry {
    pub fn new(file: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            table: table.into(),
        }
    }
}

static DEFAULT_MAPPING: &[(&str, &str)] = &[
    ("departments_clean.csv", "project_budgeting.departments"),
    ("employees_clean.csv", "project_budgeting.employees"),
    ("projects_clean.csv", "project_budgeting.projects"),
    ("completed_projects_clean.csv", "project_budgeting.completed_projects"),
    ("upcoming_projects_clean.csv", "project_budgeting.upcoming_projects"),
    ("project_assignments_clean.csv", "project_budgeting.project_assignments"),
    ("Head_Shots_clean.csv", "project_budgeting.head_shots"),
];

/// The project_budgeting tables, in load order.
pub fn default_mapping() -> Vec<MappingEntry> {
    DEFAULT_MAPPING
        .iter()
        .map(|&(file, table)| MappingEntry::new(file, table))
        .collect()
}

/// Table names end up inside a COPY statement, so only plain
/// `name` or `schema.name` identifiers are accepted.
pub fn validate_table_name(table: &str) -> Result<()> {
    if TABLE_IDENT.is_match(table) {
        Ok(())
    } else {
        Err(Error::Config(format!("invalid table identifier {:?}", table)))
    }
}

/// Parse a YAML list of `{ file, table }` records.
pub fn parse_mapping(yaml: &str) -> Result<Vec<MappingEntry>> {
    let entries: Vec<MappingEntry> = serde_yaml::from_str(yaml)
        .map_err(|e| Error::Config(format!("invalid mapping: {}", e)))?;
    for entry in &entries {
        validate_table_name(&entry.table)?;
    }
    Ok(entries)
}

pub fn read_mapping(path: impl AsRef<Path>) -> Result<Vec<MappingEntry>> {
    let path = path.as_ref();
    let yaml = fs::read_to_string(path).map_err(Error::fs(path))?;
    parse_mapping(&yaml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_default_mapping() {
        let mapping = default_mapping();
        assert_eq!(mapping.len(), 7);
        assert_eq!(
            mapping[0],
            MappingEntry::new("departments_clean.csv", "project_budgeting.departments")
        );
        assert_eq!(mapping[6].file, "Head_Shots_clean.csv");
        for entry in &mapping {
            validate_table_name(&entry.table).unwrap();
        }
    }

    #[test]
    fn test_parse_mapping_keeps_order() {
        let yaml = r#"
- file: b_clean.csv
  table: staging.b
- file: a_clean.csv
  table: a
"#;
        let mapping = parse_mapping(yaml).unwrap();
        assert_eq!(
            mapping,
            vec![
                MappingEntry::new("b_clean.csv", "staging.b"),
                MappingEntry::new("a_clean.csv", "a"),
            ]
        );
    }

    #[test]
    fn test_parse_mapping_rejects_bad_identifier() {
        let yaml = "- file: a_clean.csv\n  table: \"x; DROP TABLE y\"\n";
        let err = parse_mapping(yaml).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("project_budgeting.head_shots").is_ok());
        assert!(validate_table_name("_t1").is_ok());
        assert!(validate_table_name("a.b.c").is_err());
        assert!(validate_table_name("1abc").is_err());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("a.").is_err());
    }
}
