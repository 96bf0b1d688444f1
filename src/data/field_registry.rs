//! Field name ↔ field number bijection, scoped to one DOF manager.

use std::collections::BTreeMap;

use crate::dof_error::DofError;

/// Registration-ordered field numbering.
///
/// Numbers are assigned densely from 0 in first-registration order; a name
/// registered twice keeps its first number.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct FieldRegistry {
    by_name: BTreeMap<String, usize>,
    names: Vec<String>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number for `name`, registering it if unseen.
    pub fn register(&mut self, name: &str) -> Result<usize, DofError> {
        if name.is_empty() {
            return Err(DofError::EmptyFieldName);
        }
        if let Some(&num) = self.by_name.get(name) {
            return Ok(num);
        }
        let num = self.names.len();
        self.by_name.insert(name.to_string(), num);
        self.names.push(name.to_string());
        Ok(num)
    }

    /// Field number for `name`, `None` if never registered.
    pub fn num(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Field name for `num`.
    pub fn name(&self, num: usize) -> Option<&str> {
        self.names.get(num).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `(number, name)` pairs in number order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.names.iter().enumerate().map(|(i, s)| (i, s.as_str()))
    }

    /// Order-sensitive digest of the registered names.
    ///
    /// Every partition must produce the same value for the ownership
    /// collective to be meaningful; FNV-1a keeps it identical across
    /// processes.
    pub fn fingerprint(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for name in &self.names {
            for b in name.bytes().chain(std::iter::once(0xff)) {
                h ^= b as u64;
                h = h.wrapping_mul(0x0100_0000_01b3);
            }
        }
        h
    }
}
