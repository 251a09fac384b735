//! Type catalog: native column types to semantic types.

use serde::{Deserialize, Serialize};

/// Coarse type of a column as seen by query builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum SemanticType {
    Number,
    String,
    Boolean,
    #[default]
    Unsupported,
}

impl SemanticType {
    /// Classify a native type name as reported by the backend.
    ///
    /// Matching is case-insensitive and ignores type parameters, so
    /// `VARCHAR(255)` and `numeric(10, 2)` classify like their bare names.
    pub fn from_native(native: &str) -> Self {
        let lowered = native.to_lowercase();
        let name = match lowered.find('(') {
            Some(idx) => &lowered[..idx],
            None => lowered.as_str(),
        };
        let name = name.split_whitespace().collect::<Vec<_>>().join(" ");

        match name.as_str() {
            "smallint" | "integer" | "int" | "tinyint" | "mediumint" | "bigint" | "int2"
            | "int4" | "int8" | "decimal" | "numeric" | "real" | "double" | "double precision"
            | "float" | "smallserial" | "serial" | "bigserial" => SemanticType::Number,

            "boolean" | "bool" => SemanticType::Boolean,

            "character varying" | "varchar" | "character" | "char" | "nchar" | "nvarchar"
            | "text" | "clob" | "date" | "datetime" | "timestamp" | "timestamptz"
            | "timestamp without time zone" | "timestamp with time zone" | "time" | "timetz"
            | "time without time zone" | "time with time zone" | "interval" => {
                SemanticType::String
            }

            _ => SemanticType::Unsupported,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Number => "number",
            SemanticType::String => "string",
            SemanticType::Boolean => "boolean",
            SemanticType::Unsupported => "unsupported",
        }
    }
}

impl From<String> for SemanticType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "number" => SemanticType::Number,
            "string" => SemanticType::String,
            "boolean" => SemanticType::Boolean,
            _ => SemanticType::Unsupported,
        }
    }
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
