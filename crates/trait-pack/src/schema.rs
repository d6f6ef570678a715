//! Field layout of a packed trait identifier.

use serde::{Deserialize, Serialize};

use crate::{CodecError, Result, TraitSelection, PACKED_ID_BITS};

/// Widest field a category may declare.
pub const MAX_FIELD_WIDTH: u32 = 16;

/// Bit field of one trait category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitField {
    /// Category name (e.g. `"Headgear"`).
    pub name: String,
    /// Bit position of the field's least significant bit.
    pub offset: u32,
    /// Field width in bits.
    pub width: u32,
}

impl TraitField {
    pub fn new(name: impl Into<String>, offset: u32, width: u32) -> Self {
        Self { name: name.into(), offset, width }
    }

    /// Largest value the field can hold.
    #[inline]
    pub const fn max_value(&self) -> u64 {
        (1u64 << self.width) - 1
    }

    /// Largest option index the field can hold (value minus the absence slot).
    #[inline]
    pub const fn max_option(&self) -> u32 {
        (self.max_value() - 1) as u32
    }

    #[inline]
    const fn mask(&self) -> u64 {
        self.max_value() << self.offset
    }

    /// Contribution of `option` to a packed identifier.
    fn pack(&self, option: u32) -> Result<u64> {
        if option == 0 {
            return Ok(0);
        }
        let value = option as u64 + 1;
        if value > self.max_value() {
            return Err(CodecError::OptionOutOfRange {
                category: self.name.clone(),
                option,
                width: self.width,
            });
        }
        Ok(value << self.offset)
    }

    /// Option stored in `id`, or `None` for absence.
    fn unpack(&self, id: u64) -> Option<u32> {
        match (id >> self.offset) & self.max_value() {
            // A stored 1 would be option 0, which is absence as well.
            0 | 1 => None,
            value => Some((value - 1) as u32),
        }
    }
}

/// Immutable set of non-overlapping category fields.
///
/// Schemas are plain values: several can coexist, each describing its own
/// identifier space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TraitField>", into = "Vec<TraitField>")]
pub struct TraitSchema {
    fields: Vec<TraitField>,
}

impl TraitSchema {
    /// Build a schema, rejecting duplicate names, bad widths and overlaps.
    pub fn new(fields: Vec<TraitField>) -> Result<Self> {
        let mut used = 0u64;
        for (i, field) in fields.iter().enumerate() {
            if field.width == 0 || field.width > MAX_FIELD_WIDTH {
                return Err(CodecError::InvalidSchema(format!(
                    "field {} has width {} (expected 1..={})",
                    field.name, field.width, MAX_FIELD_WIDTH
                )));
            }
            if field.offset + field.width > PACKED_ID_BITS {
                return Err(CodecError::InvalidSchema(format!(
                    "field {} ends at bit {}, past the {}-bit packed range",
                    field.name,
                    field.offset + field.width,
                    PACKED_ID_BITS
                )));
            }
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(CodecError::InvalidSchema(format!(
                    "duplicate field {}",
                    field.name
                )));
            }
            if used & field.mask() != 0 {
                return Err(CodecError::InvalidSchema(format!(
                    "field {} overlaps another field",
                    field.name
                )));
            }
            used |= field.mask();
        }
        Ok(Self { fields })
    }

    /// The ten-category character schema.
    pub fn banny() -> Self {
        let fields = [
            ("Body", 0, 4),
            ("Both_Hands", 4, 4),
            ("Choker", 8, 4),
            ("Face", 12, 8),
            ("Headgear", 20, 8),
            ("Left_Hand", 28, 8),
            ("Lower_Accessory", 36, 4),
            ("Oral_Fixation", 40, 4),
            ("Outfit", 44, 8),
            ("Right_Hand", 52, 8),
        ]
        .into_iter()
        .map(|(name, offset, width)| TraitField::new(name, offset, width))
        .collect();
        Self { fields }
    }

    /// All fields in declaration order.
    #[inline]
    pub fn fields(&self) -> &[TraitField] {
        &self.fields
    }

    /// Look up a field by category name.
    pub fn field(&self, category: &str) -> Result<&TraitField> {
        self.fields
            .iter()
            .find(|f| f.name == category)
            .ok_or_else(|| CodecError::CategoryUnknown(category.to_string()))
    }

    /// Total number of bits used by all fields.
    pub fn used_bits(&self) -> u32 {
        self.fields.iter().map(|f| f.width).sum()
    }

    /// Pack a selection into one identifier.
    ///
    /// A [`TraitSelection`] never holds option 0, so a category chosen as 0
    /// is gone before it reaches the schema and its name is not checked. Use
    /// [`encode_choices`](Self::encode_choices) to validate raw input.
    pub fn encode(&self, selection: &TraitSelection) -> Result<u64> {
        self.encode_choices(selection.iter())
    }

    /// Pack `(category, option)` pairs, checking every category name,
    /// including those whose option is 0.
    pub fn encode_choices<I, S>(&self, choices: I) -> Result<u64>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        let mut id = 0u64;
        for (category, option) in choices {
            // Fields are disjoint; a repeated category keeps its last choice.
            let field = self.field(category.as_ref())?;
            id = (id & !field.mask()) | field.pack(option)?;
        }
        Ok(id)
    }

    /// Identifier of one category's option with every other category absent.
    ///
    /// This is the storage key of a single layer image.
    pub fn single_category_id(&self, category: &str, option: u32) -> Result<u64> {
        self.field(category)?.pack(option)
    }

    /// Unpack the given categories from `id`.
    pub fn decode<S: AsRef<str>>(&self, id: u64, categories: &[S]) -> Result<TraitSelection> {
        if !crate::is_packed_id(id) {
            return Err(CodecError::NotPackedId(id));
        }
        let mut selection = TraitSelection::new();
        for category in categories {
            let field = self.field(category.as_ref())?;
            if let Some(option) = field.unpack(id) {
                selection.set(field.name.clone(), option);
            }
        }
        Ok(selection)
    }

    /// Unpack every category of the schema from `id`.
    pub fn decode_all(&self, id: u64) -> Result<TraitSelection> {
        if !crate::is_packed_id(id) {
            return Err(CodecError::NotPackedId(id));
        }
        Ok(self
            .fields
            .iter()
            .filter_map(|f| f.unpack(id).map(|option| (f.name.clone(), option)))
            .collect())
    }
}

impl TryFrom<Vec<TraitField>> for TraitSchema {
    type Error = CodecError;

    fn try_from(fields: Vec<TraitField>) -> Result<Self> {
        Self::new(fields)
    }
}

impl From<TraitSchema> for Vec<TraitField> {
    fn from(schema: TraitSchema) -> Self {
        schema.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_banny_schema_is_valid() {
        let schema = TraitSchema::banny();
        assert!(TraitSchema::new(schema.fields().to_vec()).is_ok());
        assert_eq!(schema.fields().len(), 10);
        assert_eq!(schema.used_bits(), 60);
    }

    #[test]
    fn test_choker_option_one() {
        let schema = TraitSchema::banny();
        let selection = TraitSelection::new()
            .with("Body", 0)
            .with("Both_Hands", 0)
            .with("Choker", 1)
            .with("Face", 0)
            .with("Headgear", 0)
            .with("Left_Hand", 0)
            .with("Lower_Accessory", 0)
            .with("Oral_Fixation", 0)
            .with("Outfit", 0)
            .with("Right_Hand", 0);
        assert_eq!(schema.encode(&selection).unwrap(), 512);
        assert_eq!(schema.single_category_id("Choker", 1).unwrap(), 2 << 8);
    }

    #[test]
    fn test_empty_selection() {
        let schema = TraitSchema::banny();
        assert_eq!(schema.encode(&TraitSelection::new()).unwrap(), 0);
        assert!(schema.decode_all(0).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_category() {
        let schema = TraitSchema::banny();
        let selection = TraitSelection::new().with("Tail", 2);
        assert_eq!(
            schema.encode(&selection),
            Err(CodecError::CategoryUnknown("Tail".into()))
        );
        assert!(matches!(
            schema.decode(0, &["Tail"]),
            Err(CodecError::CategoryUnknown(_))
        ));
    }

    #[test]
    fn test_absent_choice_still_names_a_category() {
        let schema = TraitSchema::banny();
        // The selection drops the 0 choice, so there is nothing to check.
        assert_eq!(schema.encode(&TraitSelection::new().with("Tail", 0)), Ok(0));
        assert_eq!(
            schema.encode_choices([("Tail", 0)]),
            Err(CodecError::CategoryUnknown("Tail".into()))
        );
        assert_eq!(schema.encode_choices([("Choker", 0), ("Body", 2)]), Ok(3));
        assert_eq!(schema.encode_choices([("Body", 5), ("Body", 2)]), Ok(3));
    }

    #[test]
    fn test_option_out_of_range() {
        let schema = TraitSchema::banny();
        // 15 + 1 = 16 needs five bits
        let err = schema.single_category_id("Body", 15).unwrap_err();
        assert_eq!(
            err,
            CodecError::OptionOutOfRange { category: "Body".into(), option: 15, width: 4 }
        );
        assert_eq!(schema.single_category_id("Body", 14).unwrap(), 15);
        assert!(schema.single_category_id("Face", 255).is_err());
        assert!(schema.single_category_id("Face", 254).is_ok());
    }

    #[test]
    fn test_decode_subset() {
        let schema = TraitSchema::banny();
        let full = TraitSelection::new().with("Face", 7).with("Outfit", 40).with("Body", 3);
        let id = schema.encode(&full).unwrap();
        let partial = schema.decode(id, &["Face", "Choker"]).unwrap();
        assert_eq!(partial, TraitSelection::new().with("Face", 7));
    }

    #[test]
    fn test_decode_rejects_auxiliary() {
        let schema = TraitSchema::banny();
        let aux = crate::AUXILIARY_ID_BASE + 1;
        assert_eq!(schema.decode_all(aux), Err(CodecError::NotPackedId(aux)));
    }

    #[test]
    fn test_invalid_schemas() {
        let overlap = vec![TraitField::new("A", 0, 8), TraitField::new("B", 4, 4)];
        assert!(matches!(TraitSchema::new(overlap), Err(CodecError::InvalidSchema(_))));

        let too_high = vec![TraitField::new("A", 56, 8)];
        assert!(matches!(TraitSchema::new(too_high), Err(CodecError::InvalidSchema(_))));

        let dup = vec![TraitField::new("A", 0, 4), TraitField::new("A", 4, 4)];
        assert!(matches!(TraitSchema::new(dup), Err(CodecError::InvalidSchema(_))));

        let zero = vec![TraitField::new("A", 0, 0)];
        assert!(matches!(TraitSchema::new(zero), Err(CodecError::InvalidSchema(_))));
    }

    fn banny_selection() -> impl Strategy<Value = TraitSelection> {
        let fields = TraitSchema::banny().fields().to_vec();
        let per_field: Vec<_> = fields
            .into_iter()
            .map(|f| (Just(f.name.clone()), 0..=f.max_option()))
            .collect();
        per_field.prop_map(|pairs| pairs.into_iter().collect::<TraitSelection>())
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(selection in banny_selection()) {
            let schema = TraitSchema::banny();
            let id = schema.encode(&selection).unwrap();
            prop_assert!(crate::is_packed_id(id));
            prop_assert_eq!(schema.decode_all(id).unwrap(), selection);
        }
    }
}
