//! Property types and values.
//!
//! [`PropertyType`] is the full type lattice of the property tree; primitive
//! types carry a [`PropertyValue`], `Struct` and `Array` are containers with
//! no value of their own. [`PropertyScalar`] maps Rust types onto primitive
//! property types for the typed `get`/`set` accessors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Int32,
    Int64,
    Float,
    Bool,
    String,
    Vec2f,
    Vec3f,
    Vec4f,
    Vec2i,
    Vec3i,
    Vec4i,
    Struct,
    Array,
}

impl PropertyType {
    /// Only primitive properties carry a value and participate in links.
    pub fn is_primitive(self) -> bool {
        !matches!(self, PropertyType::Struct | PropertyType::Array)
    }

    /// Zero value for a primitive type, `None` for containers.
    pub fn default_value(self) -> Option<PropertyValue> {
        Some(match self {
            PropertyType::Int32 => PropertyValue::Int32(0),
            PropertyType::Int64 => PropertyValue::Int64(0),
            PropertyType::Float => PropertyValue::Float(0.0),
            PropertyType::Bool => PropertyValue::Bool(false),
            PropertyType::String => PropertyValue::String(String::new()),
            PropertyType::Vec2f => PropertyValue::Vec2f([0.0; 2]),
            PropertyType::Vec3f => PropertyValue::Vec3f([0.0; 3]),
            PropertyType::Vec4f => PropertyValue::Vec4f([0.0; 4]),
            PropertyType::Vec2i => PropertyValue::Vec2i([0; 2]),
            PropertyType::Vec3i => PropertyValue::Vec3i([0; 3]),
            PropertyType::Vec4i => PropertyValue::Vec4i([0; 4]),
            PropertyType::Struct | PropertyType::Array => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            PropertyType::Int32 => "INT32",
            PropertyType::Int64 => "INT64",
            PropertyType::Float => "FLOAT",
            PropertyType::Bool => "BOOL",
            PropertyType::String => "STRING",
            PropertyType::Vec2f => "VEC2F",
            PropertyType::Vec3f => "VEC3F",
            PropertyType::Vec4f => "VEC4F",
            PropertyType::Vec2i => "VEC2I",
            PropertyType::Vec3i => "VEC3I",
            PropertyType::Vec4i => "VEC4I",
            PropertyType::Struct => "STRUCT",
            PropertyType::Array => "ARRAY",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of a primitive property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Int32(i32),
    Int64(i64),
    Float(f32),
    Bool(bool),
    String(String),
    Vec2f([f32; 2]),
    Vec3f([f32; 3]),
    Vec4f([f32; 4]),
    Vec2i([i32; 2]),
    Vec3i([i32; 3]),
    Vec4i([i32; 4]),
}

impl PropertyValue {
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::Int32(_) => PropertyType::Int32,
            PropertyValue::Int64(_) => PropertyType::Int64,
            PropertyValue::Float(_) => PropertyType::Float,
            PropertyValue::Bool(_) => PropertyType::Bool,
            PropertyValue::String(_) => PropertyType::String,
            PropertyValue::Vec2f(_) => PropertyType::Vec2f,
            PropertyValue::Vec3f(_) => PropertyType::Vec3f,
            PropertyValue::Vec4f(_) => PropertyType::Vec4f,
            PropertyValue::Vec2i(_) => PropertyType::Vec2i,
            PropertyValue::Vec3i(_) => PropertyType::Vec3i,
            PropertyValue::Vec4i(_) => PropertyType::Vec4i,
        }
    }

    pub fn get<T: PropertyScalar>(&self) -> Option<T> {
        T::from_value(self)
    }

    /// Equality used for change detection: like `==`, except that NaN equals
    /// NaN so a NaN that is written again does not count as a change.
    pub fn same_as(&self, other: &PropertyValue) -> bool {
        fn float(a: f32, b: f32) -> bool {
            a == b || (a.is_nan() && b.is_nan())
        }
        fn floats(a: &[f32], b: &[f32]) -> bool {
            a.iter().zip(b).all(|(&x, &y)| float(x, y))
        }
        match (self, other) {
            (PropertyValue::Float(a), PropertyValue::Float(b)) => float(*a, *b),
            (PropertyValue::Vec2f(a), PropertyValue::Vec2f(b)) => floats(a, b),
            (PropertyValue::Vec3f(a), PropertyValue::Vec3f(b)) => floats(a, b),
            (PropertyValue::Vec4f(a), PropertyValue::Vec4f(b)) => floats(a, b),
            _ => self == other,
        }
    }
}

/// Rust types that can be read from and written to primitive properties.
pub trait PropertyScalar: Sized {
    const TYPE: PropertyType;

    fn from_value(value: &PropertyValue) -> Option<Self>;

    fn into_value(self) -> PropertyValue;
}

macro_rules! impl_scalar {
    ($ty:ty, $variant:ident) => {
        impl PropertyScalar for $ty {
            const TYPE: PropertyType = PropertyType::$variant;

            fn from_value(value: &PropertyValue) -> Option<Self> {
                match value {
                    PropertyValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> PropertyValue {
                PropertyValue::$variant(self)
            }
        }

        impl From<$ty> for PropertyValue {
            fn from(v: $ty) -> Self {
                PropertyValue::$variant(v)
            }
        }
    };
}

impl_scalar!(i32, Int32);
impl_scalar!(i64, Int64);
impl_scalar!(f32, Float);
impl_scalar!(bool, Bool);
impl_scalar!(String, String);
impl_scalar!([f32; 2], Vec2f);
impl_scalar!([f32; 3], Vec3f);
impl_scalar!([f32; 4], Vec4f);
impl_scalar!([i32; 2], Vec2i);
impl_scalar!([i32; 3], Vec3i);
impl_scalar!([i32; 4], Vec4i);

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containers_have_no_default() {
        assert!(PropertyType::Struct.default_value().is_none());
        assert!(PropertyType::Array.default_value().is_none());
        assert_eq!(
            PropertyType::Vec3i.default_value(),
            Some(PropertyValue::Vec3i([0, 0, 0]))
        );
    }

    #[test]
    fn default_values_match_their_type() {
        for ty in [
            PropertyType::Int32,
            PropertyType::Int64,
            PropertyType::Float,
            PropertyType::Bool,
            PropertyType::String,
            PropertyType::Vec2f,
            PropertyType::Vec4i,
        ] {
            let value = ty.default_value().unwrap();
            assert_eq!(value.property_type(), ty);
            assert!(ty.is_primitive());
        }
    }

    #[test]
    fn typed_access_rejects_mismatch() {
        let v = PropertyValue::from(3.5f32);
        assert_eq!(v.get::<f32>(), Some(3.5));
        assert_eq!(v.get::<i32>(), None);
        assert_eq!(PropertyValue::from("x").get::<String>(), Some("x".to_string()));
    }

    #[test]
    fn nan_is_the_same_as_nan() {
        let nan = PropertyValue::from(f32::NAN);
        assert!(nan.same_as(&PropertyValue::from(f32::NAN)));
        assert!(!nan.same_as(&PropertyValue::from(1.0f32)));
        assert!(PropertyValue::from([f32::NAN, 1.0, 2.0]).same_as(&PropertyValue::from([f32::NAN, 1.0, 2.0])));
        assert!(!PropertyValue::from([f32::NAN, 1.0]).same_as(&PropertyValue::from([f32::NAN, 2.0])));
        assert!(PropertyValue::from(0.0f32).same_as(&PropertyValue::from(-0.0f32)));
        assert!(!PropertyValue::from(1i32).same_as(&PropertyValue::from(1.0f32)));
    }

    #[test]
    fn type_names() {
        assert_eq!(PropertyType::Vec2f.to_string(), "VEC2F");
        assert_eq!(<[i32; 4] as PropertyScalar>::TYPE, PropertyType::Vec4i);
    }
}
