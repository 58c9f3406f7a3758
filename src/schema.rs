//! Column schema inferred from the CSV header
//!
//! The pass@k columns are not known ahead of time: the k values are read
//! from `empirical_pass_at_<k>` / `unbiased_pass_at_<k>` headers once, and
//! every later step iterates the discovered sets.

use std::collections::HashMap;

pub const EMPIRICAL_PREFIX: &str = "empirical_pass_at_";
pub const UNBIASED_PREFIX: &str = "unbiased_pass_at_";

/// Header layout of one input table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSchema {
    headers: Vec<String>,
    index: HashMap<String, usize>,
    /// Sorted, deduplicated k values with an empirical column
    pub empirical_ks: Vec<u32>,
    /// Sorted, deduplicated k values with an unbiased column
    pub unbiased_ks: Vec<u32>,
}

impl ColumnSchema {
    pub fn from_headers<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let headers: Vec<String> = headers
            .into_iter()
            .map(|h| h.as_ref().trim().to_string())
            .collect();

        let mut index = HashMap::new();
        for (i, name) in headers.iter().enumerate() {
            // first occurrence wins on duplicate headers
            index.entry(name.clone()).or_insert(i);
        }

        let empirical_ks = k_values(&headers, EMPIRICAL_PREFIX);
        let unbiased_ks = k_values(&headers, UNBIASED_PREFIX);

        Self {
            headers,
            index,
            empirical_ks,
            unbiased_ks,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Position of a named column
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }
}

/// Extract the positive k suffixes for one column family.
pub fn k_values(headers: &[String], prefix: &str) -> Vec<u32> {
    let mut ks: Vec<u32> = headers
        .iter()
        .filter_map(|h| parse_k(h, prefix))
        .collect();
    ks.sort_unstable();
    ks.dedup();
    ks
}

/// `unbiased_pass_at_5` -> `Some(5)`; zero and non-numeric suffixes are skipped.
pub fn parse_k(header: &str, prefix: &str) -> Option<u32> {
    header
        .strip_prefix(prefix)?
        .parse::<u32>()
        .ok()
        .filter(|k| *k > 0)
}

pub fn empirical_column(k: u32) -> String {
    format!("{}{}", EMPIRICAL_PREFIX, k)
}

pub fn unbiased_column(k: u32) -> String {
    format!("{}{}", UNBIASED_PREFIX, k)
}
