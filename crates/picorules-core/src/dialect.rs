//! Target SQL dialects and their naming rules.
//!
//! Every output name the compiler emits is deterministic per dialect: the
//! per-ruleblock target table, the per-variable intermediate (a CTE or a
//! temp table), and the table a bind fragment reads from.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A supported SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Oracle PL/SQL.
    Oracle,
    /// SQL Server T-SQL.
    Mssql,
    /// PostgreSQL.
    Postgresql,
}

impl Dialect {
    /// All supported dialects, in declaration order.
    pub const ALL: [Dialect; 3] = [Dialect::Oracle, Dialect::Mssql, Dialect::Postgresql];

    /// Get the lowercase tag for this dialect.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Oracle => "oracle",
            Self::Mssql => "mssql",
            Self::Postgresql => "postgresql",
        }
    }

    /// Output table for a ruleblock.
    ///
    /// Oracle spells it `ROUT_<NAME>`, T-SQL `SROUT_<name>`, PostgreSQL
    /// `rout_<name>`. PostgreSQL folds unquoted identifiers to lower case,
    /// so this is the effective name regardless of how the DDL spells it.
    pub fn target_table(self, ruleblock: &str) -> String {
        match self {
            Self::Oracle => format!("ROUT_{}", ruleblock.to_uppercase()),
            Self::Mssql => format!("SROUT_{ruleblock}"),
            Self::Postgresql => format!("rout_{}", ruleblock.to_lowercase()),
        }
    }

    /// Per-variable intermediate: a CTE name for Oracle and PostgreSQL, a
    /// temp table for T-SQL.
    pub fn fragment_table(self, variable: &str) -> String {
        match self {
            Self::Oracle | Self::Postgresql => format!("SQ_{}", variable.to_uppercase()),
            Self::Mssql => format!("#SQ_{variable}"),
        }
    }

    /// Table a bind fragment selects from, as spelled in the emitted SQL.
    ///
    /// Oracle and PostgreSQL share the `ROUT_<NAME>` spelling (PostgreSQL
    /// folds it to `rout_<name>` at execution); T-SQL uses `SROUT_<name>`.
    pub fn bind_source_table(self, ruleblock: &str) -> String {
        match self {
            Self::Oracle | Self::Postgresql => format!("ROUT_{}", ruleblock.to_uppercase()),
            Self::Mssql => format!("SROUT_{ruleblock}"),
        }
    }

    /// Universal subject-set name: the CTE `UEADV`, or the `#UEADV` temp
    /// table for T-SQL.
    pub fn subject_set(self) -> &'static str {
        match self {
            Self::Oracle | Self::Postgresql => "UEADV",
            Self::Mssql => "#UEADV",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "oracle" => Ok(Self::Oracle),
            "mssql" => Ok(Self::Mssql),
            "postgresql" => Ok(Self::Postgresql),
            other => Err(CoreError::unknown_dialect(other)),
        }
    }
}
