//! Nonlinear variable assignments.
//!
//! [`Values`] maps each [`Key`] to a manifold element. It is the linearization
//! point handed to factors and the state that [`Values::retract`] moves along a
//! linear step expressed as a [`VectorValues`].

use crate::core::key::{format_key, Key};
use crate::core::vector_values::{Dims, VectorValues};
use crate::error::{FactorError, FactorResult};
use crate::manifold::{Manifold, SE2, SO2, SO3};
use nalgebra::{DVector, Vector2, Vector3};
use std::collections::BTreeMap;

/// A type-erased variable value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Vector(DVector<f64>),
    Point2(Vector2<f64>),
    Point3(Vector3<f64>),
    SO2(SO2),
    SE2(SE2),
    SO3(SO3),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Vector(_) => DVector::<f64>::TYPE_NAME,
            Value::Point2(_) => Vector2::<f64>::TYPE_NAME,
            Value::Point3(_) => Vector3::<f64>::TYPE_NAME,
            Value::SO2(_) => SO2::TYPE_NAME,
            Value::SE2(_) => SE2::TYPE_NAME,
            Value::SO3(_) => SO3::TYPE_NAME,
        }
    }

    pub fn tangent_dim(&self) -> usize {
        match self {
            Value::Vector(v) => v.tangent_dim(),
            Value::Point2(v) => v.tangent_dim(),
            Value::Point3(v) => v.tangent_dim(),
            Value::SO2(v) => v.tangent_dim(),
            Value::SE2(v) => v.tangent_dim(),
            Value::SO3(v) => v.tangent_dim(),
        }
    }

    /// Retract along `delta`, keeping the variant.
    pub fn retract(&self, delta: &DVector<f64>) -> FactorResult<Value> {
        Ok(match self {
            Value::Vector(v) => Value::Vector(v.retract(delta)?),
            Value::Point2(v) => Value::Point2(v.retract(delta)?),
            Value::Point3(v) => Value::Point3(v.retract(delta)?),
            Value::SO2(v) => Value::SO2(v.retract(delta)?),
            Value::SE2(v) => Value::SE2(v.retract(delta)?),
            Value::SO3(v) => Value::SO3(v.retract(delta)?),
        })
    }

    /// Local coordinates of `other` around `self`.
    ///
    /// # Errors
    /// `TypeMismatch` if the two values hold different manifold types.
    pub fn local(&self, other: &Value) -> FactorResult<DVector<f64>> {
        let delta = match (self, other) {
            (Value::Vector(a), Value::Vector(b)) => a.local(b, None)?,
            (Value::Point2(a), Value::Point2(b)) => a.local(b, None)?,
            (Value::Point3(a), Value::Point3(b)) => a.local(b, None)?,
            (Value::SO2(a), Value::SO2(b)) => a.local(b, None)?,
            (Value::SE2(a), Value::SE2(b)) => a.local(b, None)?,
            (Value::SO3(a), Value::SO3(b)) => a.local(b, None)?,
            _ => {
                return Err(FactorError::TypeMismatch(format!(
                    "cannot take local coordinates of {} around {}",
                    other.type_name(),
                    self.type_name()
                )))
            }
        };
        Ok(delta)
    }
}

/// Manifold types that can be stored in [`Values`].
pub trait ManifoldValue: Manifold {
    const TYPE_NAME: &'static str;

    fn from_value(value: &Value) -> Option<&Self>;

    fn into_value(self) -> Value;
}

macro_rules! impl_manifold_value {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl ManifoldValue for $ty {
            const TYPE_NAME: &'static str = $name;

            fn from_value(value: &Value) -> Option<&Self> {
                match value {
                    Value::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

impl_manifold_value!(DVector<f64>, Vector, "Vector");
impl_manifold_value!(Vector2<f64>, Point2, "Point2");
impl_manifold_value!(Vector3<f64>, Point3, "Point3");
impl_manifold_value!(SO2, SO2, "SO2");
impl_manifold_value!(SE2, SE2, "SE2");
impl_manifold_value!(SO3, SO3, "SO3");

/// Assignment of manifold values to keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    values: BTreeMap<Key, Value>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new variable.
    ///
    /// # Errors
    /// `DuplicateKey` if `key` is already assigned.
    pub fn insert<T: ManifoldValue>(&mut self, key: Key, value: T) -> FactorResult<()> {
        if self.values.contains_key(&key) {
            return Err(FactorError::DuplicateKey(format!(
                "variable '{}' already has a value",
                format_key(key)
            )));
        }
        self.values.insert(key, value.into_value());
        Ok(())
    }

    /// Replace the value of an existing variable.
    ///
    /// # Errors
    /// - `NotFound` if `key` is not assigned.
    /// - `TypeMismatch` if the new value has a different type.
    pub fn update<T: ManifoldValue>(&mut self, key: Key, value: T) -> FactorResult<()> {
        let slot = self.values.get_mut(&key).ok_or_else(|| not_found(key))?;
        if T::from_value(slot).is_none() {
            return Err(FactorError::TypeMismatch(format!(
                "variable '{}' holds {}, not {}",
                format_key(key),
                slot.type_name(),
                T::TYPE_NAME
            )));
        }
        *slot = value.into_value();
        Ok(())
    }

    pub fn erase(&mut self, key: Key) -> FactorResult<Value> {
        self.values.remove(&key).ok_or_else(|| not_found(key))
    }

    pub fn exists(&self, key: Key) -> bool {
        self.values.contains_key(&key)
    }

    /// Typed access to a variable.
    ///
    /// # Errors
    /// - `NotFound` if `key` is not assigned.
    /// - `TypeMismatch` if the stored value is not a `T`.
    pub fn at<T: ManifoldValue>(&self, key: Key) -> FactorResult<&T> {
        let value = self.values.get(&key).ok_or_else(|| not_found(key))?;
        T::from_value(value).ok_or_else(|| {
            FactorError::TypeMismatch(format!(
                "variable '{}' holds {}, requested {}",
                format_key(key),
                value.type_name(),
                T::TYPE_NAME
            ))
        })
    }

    pub fn value(&self, key: Key) -> FactorResult<&Value> {
        self.values.get(&key).ok_or_else(|| not_found(key))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Key, &Value)> + '_ {
        self.values.iter().map(|(&k, v)| (k, v))
    }

    /// Tangent dimension of every variable.
    pub fn dims(&self) -> Dims {
        self.values
            .iter()
            .map(|(&k, v)| (k, v.tangent_dim()))
            .collect()
    }

    /// A zero tangent vector for every variable.
    pub fn zero_vectors(&self) -> VectorValues {
        VectorValues::zero_from_dims(&self.dims())
    }

    /// Move every variable named in `delta` along its block; others are copied.
    ///
    /// # Errors
    /// - `NotFound` if `delta` names a key without a value.
    /// - `Manifold` if a block has the wrong dimension.
    pub fn retract(&self, delta: &VectorValues) -> FactorResult<Values> {
        if let Some(key) = delta.keys().find(|&k| !self.exists(k)) {
            return Err(not_found(key));
        }

        let mut values = BTreeMap::new();
        for (&key, value) in &self.values {
            let moved = match delta.at(key) {
                Ok(block) => value.retract(&block.into_owned())?,
                Err(_) => value.clone(),
            };
            values.insert(key, moved);
        }
        Ok(Values { values })
    }

    /// Tangent step that takes `self` to `other`: other ⊖ self, per key.
    ///
    /// # Errors
    /// `NotFound` if `other` lacks one of this container's keys.
    pub fn local_coordinates(&self, other: &Values) -> FactorResult<VectorValues> {
        let pairs = self
            .values
            .iter()
            .map(|(&key, value)| Ok((key, value.local(other.value(key)?)?)))
            .collect::<FactorResult<Vec<_>>>()?;
        VectorValues::from_pairs(pairs)
    }
}

fn not_found(key: Key) -> FactorError {
    FactorError::NotFound(format!("variable '{}' has no value", format_key(key)))
}
