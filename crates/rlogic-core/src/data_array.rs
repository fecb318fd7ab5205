//! Immutable typed buffers referenced by animation channels.

use serde::{Deserialize, Serialize};

use crate::feature::{Capability, FeatureLevel};
use crate::object::ObjectMeta;
use crate::value::{PropertyType, PropertyValue};

/// Element type of a data array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataArrayType {
    Float,
    Vec2f,
    Vec3f,
    Vec4f,
    Int32,
    Vec2i,
    Vec3i,
    Vec4i,
    FloatArray,
}

impl DataArrayType {
    pub fn name(self) -> &'static str {
        match self {
            DataArrayType::Float => "FLOAT",
            DataArrayType::Vec2f => "VEC2F",
            DataArrayType::Vec3f => "VEC3F",
            DataArrayType::Vec4f => "VEC4F",
            DataArrayType::Int32 => "INT32",
            DataArrayType::Vec2i => "VEC2I",
            DataArrayType::Vec3i => "VEC3I",
            DataArrayType::Vec4i => "VEC4I",
            DataArrayType::FloatArray => "ARRAY",
        }
    }
}

/// Owned element storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataArrayData {
    Float(Vec<f32>),
    Vec2f(Vec<[f32; 2]>),
    Vec3f(Vec<[f32; 3]>),
    Vec4f(Vec<[f32; 4]>),
    Int32(Vec<i32>),
    Vec2i(Vec<[i32; 2]>),
    Vec3i(Vec<[i32; 3]>),
    Vec4i(Vec<[i32; 4]>),
    FloatArray(Vec<Vec<f32>>),
}

impl DataArrayData {
    pub fn data_type(&self) -> DataArrayType {
        match self {
            DataArrayData::Float(_) => DataArrayType::Float,
            DataArrayData::Vec2f(_) => DataArrayType::Vec2f,
            DataArrayData::Vec3f(_) => DataArrayType::Vec3f,
            DataArrayData::Vec4f(_) => DataArrayType::Vec4f,
            DataArrayData::Int32(_) => DataArrayType::Int32,
            DataArrayData::Vec2i(_) => DataArrayType::Vec2i,
            DataArrayData::Vec3i(_) => DataArrayType::Vec3i,
            DataArrayData::Vec4i(_) => DataArrayType::Vec4i,
            DataArrayData::FloatArray(_) => DataArrayType::FloatArray,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DataArrayData::Float(v) => v.len(),
            DataArrayData::Vec2f(v) => v.len(),
            DataArrayData::Vec3f(v) => v.len(),
            DataArrayData::Vec4f(v) => v.len(),
            DataArrayData::Int32(v) => v.len(),
            DataArrayData::Vec2i(v) => v.len(),
            DataArrayData::Vec3i(v) => v.len(),
            DataArrayData::Vec4i(v) => v.len(),
            DataArrayData::FloatArray(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of components per element, as a float vector.
    pub fn components(&self) -> usize {
        match self {
            DataArrayData::Float(_) | DataArrayData::Int32(_) => 1,
            DataArrayData::Vec2f(_) | DataArrayData::Vec2i(_) => 2,
            DataArrayData::Vec3f(_) | DataArrayData::Vec3i(_) => 3,
            DataArrayData::Vec4f(_) | DataArrayData::Vec4i(_) => 4,
            DataArrayData::FloatArray(v) => v.first().map_or(0, Vec::len),
        }
    }

    /// Element `i` widened to floats.
    pub fn element_f32(&self, i: usize) -> Option<Vec<f32>> {
        Some(match self {
            DataArrayData::Float(v) => vec![*v.get(i)?],
            DataArrayData::Vec2f(v) => v.get(i)?.to_vec(),
            DataArrayData::Vec3f(v) => v.get(i)?.to_vec(),
            DataArrayData::Vec4f(v) => v.get(i)?.to_vec(),
            DataArrayData::Int32(v) => vec![*v.get(i)? as f32],
            DataArrayData::Vec2i(v) => v.get(i)?.iter().map(|x| *x as f32).collect(),
            DataArrayData::Vec3i(v) => v.get(i)?.iter().map(|x| *x as f32).collect(),
            DataArrayData::Vec4i(v) => v.get(i)?.iter().map(|x| *x as f32).collect(),
            DataArrayData::FloatArray(v) => v.get(i)?.clone(),
        })
    }

    /// Property type of a single element, or `None` for float arrays, which
    /// map to an `Array` of `Float` properties.
    pub fn element_property_type(&self) -> Option<PropertyType> {
        match self.data_type() {
            DataArrayType::Float => Some(PropertyType::Float),
            DataArrayType::Vec2f => Some(PropertyType::Vec2f),
            DataArrayType::Vec3f => Some(PropertyType::Vec3f),
            DataArrayType::Vec4f => Some(PropertyType::Vec4f),
            DataArrayType::Int32 => Some(PropertyType::Int32),
            DataArrayType::Vec2i => Some(PropertyType::Vec2i),
            DataArrayType::Vec3i => Some(PropertyType::Vec3i),
            DataArrayType::Vec4i => Some(PropertyType::Vec4i),
            DataArrayType::FloatArray => None,
        }
    }

    /// Converts interpolated float components back into a property value of
    /// the element type. Integer types round to nearest.
    pub fn value_from_f32(ty: PropertyType, c: &[f32]) -> Option<PropertyValue> {
        let r = |x: f32| x.round() as i32;
        Some(match (ty, c) {
            (PropertyType::Float, [x, ..]) => PropertyValue::Float(*x),
            (PropertyType::Vec2f, [x, y, ..]) => PropertyValue::Vec2f([*x, *y]),
            (PropertyType::Vec3f, [x, y, z, ..]) => PropertyValue::Vec3f([*x, *y, *z]),
            (PropertyType::Vec4f, [x, y, z, w, ..]) => PropertyValue::Vec4f([*x, *y, *z, *w]),
            (PropertyType::Int32, [x, ..]) => PropertyValue::Int32(r(*x)),
            (PropertyType::Vec2i, [x, y, ..]) => PropertyValue::Vec2i([r(*x), r(*y)]),
            (PropertyType::Vec3i, [x, y, z, ..]) => PropertyValue::Vec3i([r(*x), r(*y), r(*z)]),
            (PropertyType::Vec4i, [x, y, z, w, ..]) => {
                PropertyValue::Vec4i([r(*x), r(*y), r(*z), r(*w)])
            }
            _ => return None,
        })
    }

    pub(crate) fn validate(&self, name: &str, level: FeatureLevel) -> Result<(), String> {
        if self.is_empty() {
            return Err(format!("Cannot create DataArray '{name}' with empty data"));
        }
        if let DataArrayData::FloatArray(rows) = self {
            if !level.supports(Capability::FloatArrayDataArray) {
                return Err(format!(
                    "Data type of DataArray '{name}' requires feature level {} or higher",
                    FeatureLevel::required_for(Capability::FloatArrayDataArray)
                ));
            }
            let width = rows[0].len();
            if rows.iter().any(|row| row.len() != width) {
                return Err(format!(
                    "Cannot create DataArray '{name}' of float arrays with different sizes"
                ));
            }
        }
        Ok(())
    }
}

/// Rust element types accepted by [`LogicEngine::create_data_array`](crate::engine::LogicEngine::create_data_array).
pub trait DataArrayElement: Sized {
    fn into_data(values: Vec<Self>) -> DataArrayData;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl DataArrayElement for $ty {
            fn into_data(values: Vec<Self>) -> DataArrayData {
                DataArrayData::$variant(values)
            }
        }
    };
}

impl_element!(f32, Float);
impl_element!([f32; 2], Vec2f);
impl_element!([f32; 3], Vec3f);
impl_element!([f32; 4], Vec4f);
impl_element!(i32, Int32);
impl_element!([i32; 2], Vec2i);
impl_element!([i32; 3], Vec3i);
impl_element!([i32; 4], Vec4i);
impl_element!(Vec<f32>, FloatArray);

/// Named immutable buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DataArray {
    pub meta: ObjectMeta,
    pub data: DataArrayData,
}

impl DataArray {
    pub fn data_type(&self) -> DataArrayType {
        self.data.data_type()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
