//! Query spec file: one `<instance-type>:<query-template>` pair per line.
//!
//! Templates may reference three placeholders that are replaced literally
//! before submission: `DB_NAME`, `CPU_CORE` and `MEM_SIZE`. Replacement is
//! plain text substitution, so a template that uses one of those words for
//! anything else will be rewritten as well.

use crate::config::AthenaConfig;
use crate::error::{FleetCostError, Result};
use crate::validation::validate_instance_type;
use std::path::Path;

pub const DB_NAME_TOKEN: &str = "DB_NAME";
pub const CPU_CORE_TOKEN: &str = "CPU_CORE";
pub const MEM_SIZE_TOKEN: &str = "MEM_SIZE";

/// One instance type and the query that selects servers for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEntry {
    pub instance_type: String,
    pub template: String,
}

/// Ordered entries of a query spec file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySpec {
    entries: Vec<QueryEntry>,
}

/// Values substituted for the template placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholders {
    pub database_table: String,
    pub cpu_column: String,
    pub memory_column: String,
}

impl From<&AthenaConfig> for Placeholders {
    fn from(config: &AthenaConfig) -> Self {
        Self {
            database_table: config.database_table.clone(),
            cpu_column: config.cpu_column.clone(),
            memory_column: config.memory_column.clone(),
        }
    }
}

impl QuerySpec {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse spec file contents. Blank lines are ignored; any other line
    /// without a `:` fails the whole file.
    pub fn parse(content: &str) -> Result<Self> {
        let mut entries = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            // Split on the first ':' only; the query may contain more
            let (instance_type, template) =
                line.split_once(':').ok_or_else(|| FleetCostError::MalformedSpecLine {
                    line: index + 1,
                    content: line.to_string(),
                })?;

            let instance_type = instance_type.trim();
            validate_instance_type(instance_type)?;

            let template = template.trim();
            if template.is_empty() {
                return Err(FleetCostError::MalformedSpecLine {
                    line: index + 1,
                    content: line.to_string(),
                });
            }

            entries.push(QueryEntry {
                instance_type: instance_type.to_string(),
                template: template.to_string(),
            });
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[QueryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl QueryEntry {
    /// Resolve the placeholders into a query string ready for submission.
    pub fn render(&self, placeholders: &Placeholders) -> String {
        self.template
            .replace(DB_NAME_TOKEN, &placeholders.database_table)
            .replace(CPU_CORE_TOKEN, &placeholders.cpu_column)
            .replace(MEM_SIZE_TOKEN, &placeholders.memory_column)
    }
}
