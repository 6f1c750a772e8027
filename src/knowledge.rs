//! Disease knowledge base
//!
//! Static crop → disease → treatment reference data, loaded once at startup
//! and shared read-only by every engine clone.
//!
//! Resource format (key order is significant):
//!
//! ```text
//! {
//!   "Tomato": {
//!     "Early Blight": { "treatment": { "chemical": "...", "organic": "...", "prevention": "..." } },
//!     "Late Blight":  { "treatment": { ... } },
//!     "Healthy":      { "treatment": { ... } }
//!   }
//! }
//! ```
//!
//! The environment pathway picks diseases by position, so each crop keeps
//! its diseases as an ordered list with a separate name index.

use crate::types::{Treatment, HEALTHY};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Knowledge base compiled into the binary
const BUNDLED_KB: &str = include_str!("../data/disease_knowledge_base.json");

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("failed to read knowledge base at {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed knowledge base: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("knowledge base lists {0:?} more than once")]
    DuplicateCrop(String),
    #[error("crop {crop:?} lists disease {disease:?} more than once")]
    DuplicateDisease { crop: String, disease: String },
    #[error("knowledge base has no crops")]
    Empty,
}

/// One catalogued disease and its treatment
#[derive(Debug, Clone, PartialEq)]
pub struct DiseaseEntry {
    pub name: String,
    pub treatment: Treatment,
}

/// A crop and its diseases in stored order
#[derive(Debug, Clone)]
pub struct CropEntry {
    name: String,
    diseases: Vec<DiseaseEntry>,
    index: HashMap<String, usize>,
}

impl CropEntry {
    fn new(name: String, diseases: Vec<DiseaseEntry>) -> Result<Self, KnowledgeError> {
        let mut index = HashMap::with_capacity(diseases.len());
        for (i, d) in diseases.iter().enumerate() {
            if index.insert(d.name.clone(), i).is_some() {
                return Err(KnowledgeError::DuplicateDisease {
                    crop: name,
                    disease: d.name.clone(),
                });
            }
        }
        Ok(Self {
            name,
            diseases,
            index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All diseases, including the `Healthy` sentinel, in stored order
    pub fn diseases(&self) -> &[DiseaseEntry] {
        &self.diseases
    }

    /// Disease names in stored order, without the `Healthy` sentinel
    pub fn disease_names_excluding_healthy(&self) -> Vec<&str> {
        self.diseases
            .iter()
            .map(|d| d.name.as_str())
            .filter(|name| *name != HEALTHY)
            .collect()
    }

    pub fn treatment(&self, disease: &str) -> Option<&Treatment> {
        self.index.get(disease).map(|&i| &self.diseases[i].treatment)
    }
}

/// Read-only crop → disease → treatment catalogue
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    crops: Vec<CropEntry>,
    index: HashMap<String, usize>,
}

impl KnowledgeBase {
    /// Build from `(crop, [(disease, treatment)])` entries, keeping order
    pub fn from_entries<C, D>(entries: C) -> Result<Self, KnowledgeError>
    where
        C: IntoIterator<Item = (String, D)>,
        D: IntoIterator<Item = (String, Treatment)>,
    {
        let mut crops = Vec::new();
        let mut index = HashMap::new();

        for (crop, diseases) in entries {
            if index.contains_key(&crop) {
                return Err(KnowledgeError::DuplicateCrop(crop));
            }
            let diseases = diseases
                .into_iter()
                .map(|(name, treatment)| DiseaseEntry { name, treatment })
                .collect();
            index.insert(crop.clone(), crops.len());
            crops.push(CropEntry::new(crop, diseases)?);
        }

        Ok(Self { crops, index })
    }

    /// Parse the JSON resource format
    pub fn from_json_str(json: &str) -> Result<Self, KnowledgeError> {
        let raw: OrderedMap<OrderedMap<RawDisease>> = serde_json::from_str(json)?;
        if raw.0.is_empty() {
            return Err(KnowledgeError::Empty);
        }

        Self::from_entries(raw.0.into_iter().map(|(crop, diseases)| {
            let diseases: Vec<(String, Treatment)> = diseases
                .0
                .into_iter()
                .map(|(name, d)| (name, d.treatment))
                .collect();
            (crop, diseases)
        }))
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self, KnowledgeError> {
        let json = std::fs::read_to_string(path).map_err(|source| KnowledgeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// The catalogue shipped with the crate
    pub fn bundled() -> Result<Self, KnowledgeError> {
        Self::from_json_str(BUNDLED_KB)
    }

    pub fn crop(&self, name: &str) -> Option<&CropEntry> {
        self.index.get(name).map(|&i| &self.crops[i])
    }

    pub fn contains_crop(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Exact `(crop, disease)` lookup
    pub fn treatment(&self, crop: &str, disease: &str) -> Option<&Treatment> {
        self.crop(crop)?.treatment(disease)
    }

    /// Crops in stored order
    pub fn crops(&self) -> impl Iterator<Item = &CropEntry> {
        self.crops.iter()
    }

    pub fn crop_count(&self) -> usize {
        self.crops.len()
    }

    pub fn disease_count(&self) -> usize {
        self.crops.iter().map(|c| c.diseases.len()).sum()
    }
}

#[derive(Debug, Deserialize)]
struct RawDisease {
    treatment: Treatment,
}

/// JSON object read as a list of entries in document order
struct OrderedMap<V>(Vec<(String, V)>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}
