//! Persisted categorical and label encoders

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Integer encoder for one categorical column
///
/// Codes are assigned in first-encounter order during fit and frozen
/// afterwards. Encoding a category never seen at fit time yields the
/// reserved unknown code, one past the last fitted category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct CategoryEncoder {
    categories: Vec<String>,
}

impl CategoryEncoder {
    /// Fit over observed category keys, keeping first-encounter order
    pub fn fit<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut categories: Vec<String> = Vec::new();
        for key in keys {
            let key = key.as_ref();
            if !categories.iter().any(|c| c == key) {
                categories.push(key.to_string());
            }
        }
        Self { categories }
    }

    /// Code for a category; unseen categories get the unknown code
    pub fn encode(&self, key: &str) -> u32 {
        self.categories
            .iter()
            .position(|c| c == key)
            .map_or(self.unknown_code(), |p| p as u32)
    }

    /// True when the category was seen at fit time
    pub fn is_known(&self, key: &str) -> bool {
        self.categories.iter().any(|c| c == key)
    }

    /// Reserved code for categories unseen at fit time
    pub fn unknown_code(&self) -> u32 {
        self.categories.len() as u32
    }

    /// Number of fitted categories
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// True when no categories were fitted
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Fitted categories in code order
    pub fn categories(&self) -> &[String] {
        &self.categories
    }
}

/// Encoder for the derived risk labels
///
/// The label set is sorted at fit time so encoded class indices are
/// deterministic across runs regardless of row order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct LabelEncoder {
    labels: Vec<String>,
}

impl LabelEncoder {
    /// Fit over the final label column; duplicates collapse, labels sort
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for label in labels {
            let label = label.as_ref();
            if !unique.iter().any(|l| l == label) {
                unique.push(label.to_string());
            }
        }
        unique.sort();
        Self { labels: unique }
    }

    /// Encoded class index of a label
    pub fn encode(&self, label: &str) -> Option<u32> {
        self.labels.iter().position(|l| l == label).map(|p| p as u32)
    }

    /// Label for an encoded class index
    pub fn decode(&self, code: u32) -> Option<&str> {
        self.labels.get(code as usize).map(String::as_str)
    }

    /// Number of classes
    pub fn n_classes(&self) -> usize {
        self.labels.len()
    }

    /// Labels in class-index order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}
