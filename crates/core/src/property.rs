//! Property catalog types as seen by the bulk modification engine.
//!
//! Properties themselves are owned by an external catalog; the engine only
//! reads them. They are addressed by pool plus id, and fetched in one batch
//! per operation using a [`PropertyPoolMask`].

use std::collections::HashMap;
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::registry;
use crate::standard_value::StandardValueType;

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

/// A partition of the property catalog. Each pool owns one bit of a
/// [`PropertyPoolMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PropertyPool {
    Internal = 1,
    Reserved = 2,
    Custom = 4,
}

impl PropertyPool {
    pub const ALL: [PropertyPool; 3] = [Self::Internal, Self::Reserved, Self::Custom];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Reserved => "reserved",
            Self::Custom => "custom",
        }
    }

    /// The single-bit mask for this pool.
    pub fn mask(self) -> PropertyPoolMask {
        PropertyPoolMask::from_bits_truncate(self as u8)
    }
}

impl TryFrom<u8> for PropertyPool {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Internal),
            2 => Ok(Self::Reserved),
            4 => Ok(Self::Custom),
            _ => Err(format!("Invalid property pool {value}. Must be one of: 1, 2, 4")),
        }
    }
}

impl From<PropertyPool> for u8 {
    fn from(pool: PropertyPool) -> Self {
        pool as u8
    }
}

impl fmt::Display for PropertyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Union of property pools, used to fetch every referenced property in a
    /// single call to the catalog.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyPoolMask: u8 {
        const INTERNAL = 1 << 0;
        const RESERVED = 1 << 1;
        const CUSTOM = 1 << 2;
        const ALL = Self::INTERNAL.bits() | Self::RESERVED.bits() | Self::CUSTOM.bits();
    }
}

impl PropertyPoolMask {
    /// The pools contained in this mask, in bit order.
    pub fn pools(&self) -> Vec<PropertyPool> {
        PropertyPool::ALL
            .into_iter()
            .filter(|pool| self.contains(pool.mask()))
            .collect()
    }
}

impl FromIterator<PropertyPool> for PropertyPoolMask {
    fn from_iter<I: IntoIterator<Item = PropertyPool>>(iter: I) -> Self {
        iter.into_iter()
            .fold(PropertyPoolMask::empty(), |mask, pool| mask | pool.mask())
    }
}

// ---------------------------------------------------------------------------
// Property types
// ---------------------------------------------------------------------------

/// Declared type of a property. Serialized as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum PropertyType {
    SingleLineText = 1,
    MultilineText = 2,
    SingleChoice = 3,
    MultipleChoice = 4,
    Number = 5,
    Percentage = 6,
    Rating = 7,
    Boolean = 8,
    Link = 9,
    Attachment = 10,
    Date = 11,
    DateTime = 12,
    Time = 13,
    Formula = 14,
    Multilevel = 15,
    Tags = 16,
}

impl PropertyType {
    pub const ALL: [PropertyType; 16] = [
        Self::SingleLineText,
        Self::MultilineText,
        Self::SingleChoice,
        Self::MultipleChoice,
        Self::Number,
        Self::Percentage,
        Self::Rating,
        Self::Boolean,
        Self::Link,
        Self::Attachment,
        Self::Date,
        Self::DateTime,
        Self::Time,
        Self::Formula,
        Self::Multilevel,
        Self::Tags,
    ];
}

impl TryFrom<i32> for PropertyType {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|t| *t as i32 == value)
            .ok_or_else(|| format!("Invalid property type {value}"))
    }
}

impl From<PropertyType> for i32 {
    fn from(t: PropertyType) -> Self {
        t as i32
    }
}

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

/// Address of a property in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyKey {
    pub pool: PropertyPool,
    pub id: i32,
}

impl PropertyKey {
    pub fn new(pool: PropertyPool, id: i32) -> Self {
        Self { pool, id }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.pool, self.id)
    }
}

/// A property definition as returned by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub pool: PropertyPool,
    pub id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
}

impl Property {
    pub fn key(&self) -> PropertyKey {
        PropertyKey::new(self.pool, self.id)
    }

    /// Standard value type derived from the declared type, if the type is
    /// supported by bulk modification.
    pub fn value_type(&self) -> Option<StandardValueType> {
        registry::descriptor(self.property_type).map(|d| d.value_type)
    }
}

/// Properties indexed by pool, then by id.
#[derive(Debug, Clone, Default)]
pub struct PropertyMap {
    pools: HashMap<PropertyPool, HashMap<i32, Property>>,
}

impl PropertyMap {
    pub fn from_properties(properties: impl IntoIterator<Item = Property>) -> Self {
        let mut pools: HashMap<PropertyPool, HashMap<i32, Property>> = HashMap::new();
        for property in properties {
            pools
                .entry(property.pool)
                .or_default()
                .insert(property.id, property);
        }
        Self { pools }
    }

    pub fn get(&self, key: PropertyKey) -> Option<&Property> {
        self.pools.get(&key.pool).and_then(|ids| ids.get(&key.id))
    }

    pub fn contains(&self, key: PropertyKey) -> bool {
        self.get(key).is_some()
    }

    /// Keys from `keys` that have no entry in the map, deduplicated and sorted.
    pub fn missing<'a>(&self, keys: impl IntoIterator<Item = &'a PropertyKey>) -> Vec<PropertyKey> {
        let mut missing: Vec<PropertyKey> = keys
            .into_iter()
            .filter(|key| !self.contains(**key))
            .copied()
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    pub fn len(&self) -> usize {
        self.pools.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
