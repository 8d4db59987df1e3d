//! Ordered legacy → new field-path substitutions.
//!
//! Rules compose sequentially: each rule runs on the output of the one before it. A rule's
//! `to` text can therefore be matched again by a later rule's `from`. The built-in xyuv 2.x
//! table is also not idempotent on its own output (`subsampling_mode.macro_px_w` still
//! contains `macro_px_w`), so templates must only be migrated once.

use crate::foundation::error::{UpgradeError, UpgradeResult};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRule {
    /// Literal substring to search for.
    pub from: String,
    /// Replacement text.
    pub to: String,
}

impl RenameRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Immutable, validated list of [`RenameRule`]s in application order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RuleTable {
    rules: Vec<RenameRule>,
}

impl RuleTable {
    /// Build a table, rejecting rules whose `from` is empty.
    pub fn new(rules: Vec<RenameRule>) -> UpgradeResult<Self> {
        if let Some(index) = rules.iter().position(|r| r.from.is_empty()) {
            return Err(UpgradeError::InvalidRule { index });
        }
        Ok(Self { rules })
    }

    /// Rules required to move format templates to the xyuv 2.x layout.
    pub fn xyuv2() -> Self {
        Self {
            rules: vec![
                RenameRule::new("macro_px_w", "subsampling_mode.macro_px_w"),
                RenameRule::new("macro_px_h", "subsampling_mode.macro_px_h"),
                RenameRule::new("plane[", "planes["),
            ],
        }
    }

    /// Parse a JSON array of `{"from": .., "to": ..}` objects.
    pub fn from_reader<R: std::io::Read>(r: R) -> UpgradeResult<Self> {
        let rules: Vec<RenameRule> = serde_json::from_reader(r)
            .map_err(|e| UpgradeError::Other(anyhow::anyhow!("parse rule table JSON: {e}")))?;
        Self::new(rules)
    }

    pub fn from_path(path: impl AsRef<Path>) -> UpgradeResult<Self> {
        let path = path.as_ref();
        let f = File::open(path)
            .map_err(|e| UpgradeError::storage(path, format!("open rule table: {e}")))?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn rules(&self) -> &[RenameRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule in order, each to the previous rule's output.
    ///
    /// Returns the input borrowed when no rule matched.
    pub fn apply<'a>(&self, value: &'a str) -> Cow<'a, str> {
        let mut out = Cow::Borrowed(value);
        for rule in &self.rules {
            if out.contains(rule.from.as_str()) {
                out = Cow::Owned(out.replace(rule.from.as_str(), &rule.to));
            }
        }
        out
    }
}

impl<'de> Deserialize<'de> for RuleTable {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let rules = Vec::<RenameRule>::deserialize(d)?;
        Self::new(rules).map_err(serde::de::Error::custom)
    }
}
