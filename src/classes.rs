//! Semantic classes a job can train.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pixel class with its own annotation layer and model artifact.
///
/// Variant order is lexicographic on [`SemanticClass::as_str`], so ordered maps keyed by
/// class iterate by class name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticClass {
    Background,
    Staff,
    Symbols,
    Text,
}

impl SemanticClass {
    /// Classes every job trains.
    pub const REQUIRED: [SemanticClass; 2] = [SemanticClass::Background, SemanticClass::Symbols];
    /// Classes trained only when both their layer and their model slot are supplied.
    pub const OPTIONAL: [SemanticClass; 2] = [SemanticClass::Staff, SemanticClass::Text];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Staff => "staff",
            Self::Symbols => "symbols",
            Self::Text => "text",
        }
    }

    pub fn is_required(self) -> bool {
        Self::REQUIRED.contains(&self)
    }
}

impl fmt::Display for SemanticClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
