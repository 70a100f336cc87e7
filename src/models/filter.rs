//! Filter field descriptors
//!
//! A [`FilterField`] describes one filterable field of a metadata set. Its
//! options may depend on what is selected in other fields: each
//! [`FilterOption`] can list, per field in `depends_on`, the selected values
//! under which it is offered. [`FilterField::recompute`] applies those
//! constraints and returns a fresh descriptor; the original is never touched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::enums::FilterKind;
use super::query::Selections;

/// Bounds of a range field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeBounds {
    pub min: f64,
    pub max: f64,
}

impl RangeBounds {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// One selectable value of a filter field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OptionRepr")]
pub struct FilterOption {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Field name to the selected values under which this option is offered
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requires: BTreeMap<String, Vec<String>>,
}

/// Options may be written as plain strings in configuration
#[derive(Deserialize)]
#[serde(untagged)]
enum OptionRepr {
    Plain(String),
    Full {
        value: String,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        requires: BTreeMap<String, Vec<String>>,
    },
}

impl From<OptionRepr> for FilterOption {
    fn from(repr: OptionRepr) -> Self {
        match repr {
            OptionRepr::Plain(value) => FilterOption::new(value),
            OptionRepr::Full {
                value,
                label,
                requires,
            } => FilterOption {
                value,
                label,
                requires,
            },
        }
    }
}

impl FilterOption {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: None,
            requires: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Offer this option only while `field` has one of `values` selected
    pub fn requires<I, S>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires
            .insert(field.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Label, falling back to the value
    pub fn display(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.value)
    }

    /// Whether the option is offered under the given selections
    ///
    /// A constraint on a field with nothing selected does not narrow.
    pub fn is_available(&self, selections: &Selections) -> bool {
        self.requires.iter().all(|(field, allowed)| {
            match selections.get(field) {
                Some(selected) if !selected.is_empty() => {
                    selected.iter().any(|value| allowed.contains(value))
                }
                _ => true,
            }
        })
    }
}

/// Descriptor of one filterable field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterField {
    /// Field name in the metadata set's vocabulary
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: FilterKind,
    /// Ordered options (possibly narrowed by other selections)
    #[serde(default)]
    pub options: Vec<FilterOption>,
    /// Fields whose selection narrows this field's options
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Bounds for `range` fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<RangeBounds>,
    /// Whether the field supports autocomplete over its options
    #[serde(default)]
    pub autocomplete: bool,
    /// Name of the field in the source's own dialect, when it differs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
}

impl FilterField {
    /// Create a field with no options
    pub fn new(name: impl Into<String>, kind: FilterKind) -> Self {
        Self {
            name: name.into(),
            label: None,
            kind,
            options: Vec::new(),
            depends_on: Vec::new(),
            range: None,
            autocomplete: false,
            source_name: None,
        }
    }

    /// Categorical field over plain option values
    pub fn categorical<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut field = Self::new(name, FilterKind::Categorical);
        field.options = values.into_iter().map(FilterOption::new).collect();
        field
    }

    /// Range field with inclusive bounds
    pub fn range(name: impl Into<String>, min: f64, max: f64) -> Self {
        let mut field = Self::new(name, FilterKind::Range);
        field.range = Some(RangeBounds { min, max });
        field
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_option(mut self, option: FilterOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_depends_on(mut self, field: impl Into<String>) -> Self {
        self.depends_on.push(field.into());
        self
    }

    pub fn with_autocomplete(mut self, enabled: bool) -> Self {
        self.autocomplete = enabled;
        self
    }

    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = Some(source_name.into());
        self
    }

    /// A copy of this field with options narrowed to the given selections
    ///
    /// Only selections of fields in `depends_on` are considered. Pure and
    /// deterministic: equal inputs always give equal outputs.
    pub fn recompute(&self, selections: &Selections) -> FilterField {
        let relevant: Selections = self
            .depends_on
            .iter()
            .filter_map(|dep| selections.get(dep).map(|v| (dep.clone(), v.clone())))
            .collect();

        let mut field = self.clone();
        field.options = self
            .options
            .iter()
            .filter(|option| option.is_available(&relevant))
            .cloned()
            .collect();
        field
    }

    /// Whether `value` is one of the current options
    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|option| option.value == value)
    }

    /// Whether `value` is acceptable for this field as currently narrowed
    pub fn accepts(&self, value: &str) -> bool {
        match self.kind {
            FilterKind::Categorical => self.has_option(value),
            FilterKind::Text => {
                if self.options.is_empty() {
                    !value.trim().is_empty()
                } else {
                    self.has_option(value)
                }
            }
            FilterKind::Boolean => parse_bool(value).is_some(),
            FilterKind::Range => match (self.range, parse_range(value)) {
                (Some(bounds), Some((lo, hi))) => {
                    lo <= hi && bounds.contains(lo) && bounds.contains(hi)
                }
                _ => false,
            },
        }
    }

    /// Option values that contain `term`, case-insensitively, in option order
    pub fn matching_options(&self, term: &str) -> Vec<String> {
        let needle = term.trim().to_lowercase();
        self.options
            .iter()
            .filter(|option| {
                option.value.to_lowercase().contains(&needle)
                    || option
                        .label
                        .as_ref()
                        .is_some_and(|label| label.to_lowercase().contains(&needle))
            })
            .map(|option| option.display().to_string())
            .collect()
    }
}

/// Parse a boolean filter value
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Parse a range filter value: a single number or `lo..hi`
pub fn parse_range(value: &str) -> Option<(f64, f64)> {
    let value = value.trim();
    match value.split_once("..") {
        Some((lo, hi)) => {
            let lo = lo.trim().parse::<f64>().ok()?;
            let hi = hi.trim().parse::<f64>().ok()?;
            Some((lo, hi))
        }
        None => {
            let single = value.parse::<f64>().ok()?;
            Some((single, single))
        }
    }
}
