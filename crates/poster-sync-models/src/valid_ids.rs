use crate::MediaType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Item ids confirmed on the server, keyed by media type and library id
///
/// This is the shape shared by the session overlay and the durable store.
/// Library entries are independent: replacing one library never touches
/// another library's ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidIdSet {
    entries: BTreeMap<MediaType, BTreeMap<String, BTreeSet<String>>>,
}

impl ValidIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a library's entry wholesale
    pub fn replace<I, S>(&mut self, media_type: MediaType, library_id: &str, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = ids.into_iter().map(Into::into).collect();
        self.entries
            .entry(media_type)
            .or_default()
            .insert(library_id.to_string(), set);
    }

    /// Union ids into a library's entry
    pub fn extend<I, S>(&mut self, media_type: MediaType, library_id: &str, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries
            .entry(media_type)
            .or_default()
            .entry(library_id.to_string())
            .or_default()
            .extend(ids.into_iter().map(Into::into));
    }

    pub fn library(&self, media_type: MediaType, library_id: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(&media_type).and_then(|libs| libs.get(library_id))
    }

    /// Library ids that have an entry for this media type
    pub fn library_ids(&self, media_type: MediaType) -> Vec<&str> {
        self.entries
            .get(&media_type)
            .map(|libs| libs.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Union of every library's ids for a media type
    pub fn ids_for(&self, media_type: MediaType) -> BTreeSet<String> {
        let mut all = BTreeSet::new();
        if let Some(libs) = self.entries.get(&media_type) {
            for ids in libs.values() {
                all.extend(ids.iter().cloned());
            }
        }
        all
    }

    /// Remove one library's entry, or every entry of the media type
    pub fn clear(&mut self, media_type: MediaType, library_id: Option<&str>) {
        match library_id {
            Some(id) => {
                if let Some(libs) = self.entries.get_mut(&media_type) {
                    libs.remove(id);
                    if libs.is_empty() {
                        self.entries.remove(&media_type);
                    }
                }
            }
            None => {
                self.entries.remove(&media_type);
            }
        }
    }

    /// Copy every library entry of `other` over this set, replacing same-keyed entries
    pub fn overlay(&mut self, other: &ValidIdSet) {
        for (media_type, libs) in &other.entries {
            let target = self.entries.entry(*media_type).or_default();
            for (library_id, ids) in libs {
                target.insert(library_id.clone(), ids.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|libs| libs.is_empty())
    }

    /// Total number of stored ids (counting duplicates across libraries)
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .flat_map(|libs| libs.values())
            .map(BTreeSet::len)
            .sum()
    }
}
