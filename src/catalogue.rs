//! Trait categories and their ordered options.
//!
//! A catalogue binds the option names of every category to a
//! [`TraitSchema`]. The JSON form is the plain category map used by the layer
//! tooling, with key order preserved:
//!
//! ```json
//! { "Body": ["Yellow", "Green"], "Choker": ["Nothing", "Choker"] }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use trait_pack::{CodecError, TraitSchema, TraitSelection};

use crate::util::{Error, Result};

/// One trait category with its options in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    /// Option 0 is the absence option and has no stored asset.
    pub options: Vec<String>,
}

impl Category {
    /// Index of an option by name.
    pub fn option_index(&self, option: &str) -> Option<u32> {
        self.options.iter().position(|o| o == option).map(|i| i as u32)
    }

    /// Options that are materialized as assets: everything but index 0.
    pub fn stored_options(&self) -> impl Iterator<Item = (u32, &str)> {
        self.options
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, name)| (i as u32, name.as_str()))
    }
}

/// Categories validated against a schema.
#[derive(Debug, Clone)]
pub struct Catalogue {
    schema: TraitSchema,
    categories: Vec<Category>,
}

impl Catalogue {
    /// Bind categories to a schema.
    ///
    /// Every category must have a field and every option index must fit it.
    pub fn new(schema: TraitSchema, categories: Vec<Category>) -> Result<Self> {
        for category in &categories {
            let field = schema.field(&category.name)?;
            let last = category.options.len().saturating_sub(1) as u32;
            if last > field.max_option() {
                return Err(CodecError::OptionOutOfRange {
                    category: category.name.clone(),
                    option: last,
                    width: field.width,
                }
                .into());
            }
        }
        Ok(Self { schema, categories })
    }

    /// Parse the JSON category map.
    pub fn from_json(schema: TraitSchema, json: &str) -> Result<Self> {
        // serde_json is built with `preserve_order`, so iteration follows the document.
        let value: serde_json::Value = serde_json::from_str(json)?;
        let object = value
            .as_object()
            .ok_or_else(|| Error::config("catalogue must be a JSON object"))?;
        let mut categories = Vec::with_capacity(object.len());
        for (name, options) in object {
            categories.push(Category {
                name: name.clone(),
                options: serde_json::from_value(options.clone())?,
            });
        }
        Self::new(schema, categories)
    }

    /// Read the JSON category map from a file.
    pub fn load(schema: TraitSchema, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        Self::from_json(schema, &json)
    }

    #[inline]
    pub fn schema(&self) -> &TraitSchema {
        &self.schema
    }

    #[inline]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Look up a category by name.
    pub fn category(&self, name: &str) -> Result<&Category> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| CodecError::CategoryUnknown(name.to_string()).into())
    }

    /// Number of assets a full layer load stores.
    pub fn stored_option_count(&self) -> usize {
        self.categories.iter().map(|c| c.options.len().saturating_sub(1)).sum()
    }

    /// Turn `category -> option name` into option indices.
    pub fn selection(&self, layers: &BTreeMap<String, String>) -> Result<TraitSelection> {
        let mut selection = TraitSelection::new();
        for (category, option) in layers {
            let cat = self.category(category)?;
            let index = cat.option_index(option).ok_or_else(|| {
                Error::config(format!("category {} has no option {}", category, option))
            })?;
            selection.set(category.clone(), index);
        }
        Ok(selection)
    }

    /// Full trait signature of a character given by option names.
    pub fn character_id(&self, layers: &BTreeMap<String, String>) -> Result<u64> {
        Ok(self.schema.encode(&self.selection(layers)?)?)
    }

    /// Option names encoded in a packed identifier.
    pub fn describe(&self, id: u64) -> Result<BTreeMap<String, String>> {
        let selection = self.schema.decode_all(id)?;
        let mut names = BTreeMap::new();
        for (category, option) in selection.iter() {
            let name = self
                .category(category)
                .ok()
                .and_then(|c| c.options.get(option as usize).cloned())
                .unwrap_or_else(|| format!("#{}", option));
            names.insert(category.to_string(), name);
        }
        Ok(names)
    }
}

/// File holding the layer image of one option: `<dir>/<Category>/<Option>.<ext>`.
pub fn layer_path(dir: &Path, category: &str, option: &str, extension: &str) -> PathBuf {
    dir.join(category).join(format!("{}.{}", option, extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYERS: &str = r#"{
        "Choker": ["Nothing", "Choker", "Christmas_Lights"],
        "Body": ["Yellow", "Green", "Pink"],
        "Oral_Fixation": ["Nothing", "Mouthstraw", "Blunt_1k"]
    }"#;

    #[test]
    fn test_order_preserved() {
        let catalogue = Catalogue::from_json(TraitSchema::banny(), LAYERS).unwrap();
        let names: Vec<&str> = catalogue.categories().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Choker", "Body", "Oral_Fixation"]);
        assert_eq!(catalogue.stored_option_count(), 6);
    }

    #[test]
    fn test_unknown_category_rejected() {
        let err = Catalogue::from_json(TraitSchema::banny(), r#"{"Tail": ["Nothing", "Long"]}"#).unwrap_err();
        assert!(matches!(err, Error::Codec(CodecError::CategoryUnknown(_))));
    }

    #[test]
    fn test_too_many_options_rejected() {
        let options: Vec<String> = (0..16).map(|i| format!("o{}", i)).collect();
        let categories = vec![Category { name: "Body".into(), options }];
        let err = Catalogue::new(TraitSchema::banny(), categories).unwrap_err();
        assert!(matches!(
            err,
            Error::Codec(CodecError::OptionOutOfRange { option: 15, width: 4, .. })
        ));
    }

    #[test]
    fn test_character_id() {
        let catalogue = Catalogue::from_json(TraitSchema::banny(), LAYERS).unwrap();
        let layers: BTreeMap<String, String> = [
            ("Choker".to_string(), "Choker".to_string()),
            ("Body".to_string(), "Yellow".to_string()),
        ]
        .into_iter()
        .collect();
        // Yellow is option 0 and contributes nothing.
        assert_eq!(catalogue.character_id(&layers).unwrap(), 512);

        let names = catalogue.describe(512).unwrap();
        assert_eq!(names.get("Choker").map(String::as_str), Some("Choker"));
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_stored_options_skip_absence() {
        let catalogue = Catalogue::from_json(TraitSchema::banny(), LAYERS).unwrap();
        let choker = catalogue.category("Choker").unwrap();
        let stored: Vec<_> = choker.stored_options().collect();
        assert_eq!(stored, vec![(1, "Choker"), (2, "Christmas_Lights")]);
    }

    #[test]
    fn test_layer_path() {
        let path = layer_path(Path::new("layers"), "Body", "Green", "png");
        assert_eq!(path, Path::new("layers").join("Body").join("Green.png"));
    }
}
