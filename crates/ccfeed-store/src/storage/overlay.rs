use std::collections::{BTreeMap, BTreeSet};

/// Committed key-value data plus the writes staged on top of it.
///
/// `None` in `pending` marks a staged deletion.
#[derive(Debug, Clone, Default)]
pub(crate) struct StagedMap {
    pub(crate) data: BTreeMap<Vec<u8>, Vec<u8>>,
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl StagedMap {
    pub(crate) fn with_data(data: BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        StagedMap {
            data,
            pending: BTreeMap::new(),
        }
    }

    pub(crate) fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.pending.get(key) {
            Some(staged) => staged.clone(),
            None => self.data.get(key).cloned(),
        }
    }

    pub(crate) fn stage(&mut self, key: &[u8], value: Option<&[u8]>) {
        self.pending.insert(key.to_vec(), value.map(<[u8]>::to_vec));
    }

    /// Fold staged writes into the committed data
    pub(crate) fn apply_pending(&mut self) {
        for (key, value) in std::mem::take(&mut self.pending) {
            match value {
                Some(v) => {
                    self.data.insert(key, v);
                }
                None => {
                    self.data.remove(&key);
                }
            }
        }
    }

    /// Committed data with staged writes folded in, leaving both untouched
    pub(crate) fn merged(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        let mut data = self.data.clone();
        for (key, value) in &self.pending {
            match value {
                Some(v) => {
                    data.insert(key.clone(), v.clone());
                }
                None => {
                    data.remove(key);
                }
            }
        }
        data
    }

    /// Install `data` as the committed state and drop staged writes
    pub(crate) fn replace_committed(&mut self, data: BTreeMap<Vec<u8>, Vec<u8>>) {
        self.data = data;
        self.pending.clear();
    }

    pub(crate) fn discard_pending(&mut self) {
        self.pending.clear();
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub(crate) fn keys_with_prefix(&self, prefix: &[u8]) -> Vec<Vec<u8>> {
        let mut keys: BTreeSet<Vec<u8>> = self
            .data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();

        for (key, value) in &self.pending {
            if !key.starts_with(prefix) {
                continue;
            }
            if value.is_some() {
                keys.insert(key.clone());
            } else {
                keys.remove(key);
            }
        }

        keys.into_iter().collect()
    }
}
