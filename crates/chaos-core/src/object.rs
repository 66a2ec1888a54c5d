//! Dynamic resource handling
//!
//! [`Object`] is the object-safe view every resource exposes to the watch
//! bus, the informer cache and the repository. Concrete types are recovered
//! with [`downcast`]. [`TypeRegistry`] maps a `(version, kind)` pair to a
//! decoder so new resource types plug in without editing a closed match.

use crate::error::ObjectError;
use crate::meta::{get_full_id_from_type, ObjectMeta, TypeMeta};
use serde::de::DeserializeOwned;
use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Shared, immutable handle to any resource
pub type SharedObject = Arc<dyn Object>;

/// Object-safe resource interface
pub trait Object: Any + Debug + Send + Sync {
    /// Kind and version
    fn type_meta(&self) -> &TypeMeta;

    /// Object metadata
    fn metadata(&self) -> &ObjectMeta;

    /// Validate the object before it is stored
    ///
    /// # Errors
    /// Returns `ObjectError::Validation` when the object is malformed.
    fn validate(&self) -> Result<(), ObjectError> {
        self.metadata().validate()
    }

    /// Encode to the JSON wire form
    ///
    /// # Errors
    /// Returns `ObjectError::Codec` if serialization fails.
    fn to_json(&self) -> Result<serde_json::Value, ObjectError>;

    /// Upcast for downcasting to the concrete type
    fn as_any(&self) -> &dyn Any;

    /// `<version>/<kind>/<id>`
    fn full_id(&self) -> String {
        get_full_id_from_type(self.type_meta(), &self.metadata().id)
    }
}

/// Recover a concrete resource from a dynamic handle
#[inline]
#[must_use]
pub fn downcast<T: Object + Clone>(object: &dyn Object) -> Option<T> {
    object.as_any().downcast_ref::<T>().cloned()
}

/// Implements [`Object`] for a struct with `type_meta` and `metadata` fields
#[macro_export]
macro_rules! impl_object {
    ($ty:ty) => {
        impl $crate::Object for $ty {
            fn type_meta(&self) -> &$crate::TypeMeta {
                &self.type_meta
            }

            fn metadata(&self) -> &$crate::ObjectMeta {
                &self.metadata
            }

            fn validate(&self) -> Result<(), $crate::ObjectError> {
                <$ty>::validate(self)
            }

            fn to_json(&self) -> Result<serde_json::Value, $crate::ObjectError> {
                serde_json::to_value(self).map_err($crate::ObjectError::from)
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }
    };
}

/// List of resources of one type
#[derive(Debug, Clone, Default)]
pub struct ObjectList {
    /// Type of the listed items
    pub type_meta: Option<TypeMeta>,
    /// Listed items
    pub items: Vec<SharedObject>,
}

impl ObjectList {
    /// Create a list
    #[inline]
    #[must_use]
    pub fn new(type_meta: Option<TypeMeta>, items: Vec<SharedObject>) -> Self {
        Self { type_meta, items }
    }

    /// Number of items
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Downcast every item, skipping items of another type
    #[must_use]
    pub fn typed<T: Object + Clone>(&self) -> Vec<T> {
        self.items
            .iter()
            .filter_map(|item| downcast::<T>(item.as_ref()))
            .collect()
    }
}

type DecodeFn = fn(serde_json::Value) -> Result<SharedObject, ObjectError>;

fn decode_as<T>(value: serde_json::Value) -> Result<SharedObject, ObjectError>
where
    T: Object + DeserializeOwned,
{
    let object: T = serde_json::from_value(value)?;
    Ok(Arc::new(object))
}

/// Registry of resource decoders keyed by `(version, kind)`
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    decoders: HashMap<TypeMeta, DecodeFn>,
}

impl TypeRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Create registry with the built-in resource types
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register::<crate::Node>(TypeMeta::node());
        registry.register::<crate::Failure>(TypeMeta::failure());
        registry.register::<crate::Experiment>(TypeMeta::experiment());
        registry
    }

    /// Register a decoder for a type
    pub fn register<T>(&mut self, type_meta: TypeMeta)
    where
        T: Object + DeserializeOwned,
    {
        self.decoders.insert(type_meta, decode_as::<T>);
    }

    /// Check if a type is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, type_meta: &TypeMeta) -> bool {
        self.decoders.contains_key(type_meta)
    }

    /// Decode a JSON object using its `kind`/`version` discriminator
    ///
    /// # Errors
    /// - `ObjectError::Codec` if the discriminator is missing or the body
    ///   does not match the type
    /// - `ObjectError::UnknownType` if no decoder is registered
    pub fn decode(&self, value: serde_json::Value) -> Result<SharedObject, ObjectError> {
        let kind = value
            .get("kind")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ObjectError::Codec("missing kind".to_string()))?;
        let version = value
            .get("version")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ObjectError::Codec("missing version".to_string()))?;
        let type_meta = TypeMeta::new(version, kind);

        let decoder = self
            .decoders
            .get(&type_meta)
            .ok_or_else(|| ObjectError::UnknownType {
                version: type_meta.version.clone(),
                kind: type_meta.kind.clone(),
            })?;
        decoder(value)
    }

    /// Decode a JSON array of objects
    ///
    /// # Errors
    /// Fails on the first element that cannot be decoded.
    pub fn decode_list(&self, value: serde_json::Value) -> Result<Vec<SharedObject>, ObjectError> {
        match value {
            serde_json::Value::Array(items) => items.into_iter().map(|v| self.decode(v)).collect(),
            _ => Err(ObjectError::Codec("expected a list of objects".to_string())),
        }
    }

    /// Decode a YAML document holding a list of objects
    ///
    /// # Errors
    /// Fails if the document is not valid YAML or any element cannot be decoded.
    pub fn decode_yaml_list(&self, source: &str) -> Result<Vec<SharedObject>, ObjectError> {
        let value: serde_json::Value = serde_yaml::from_str(source)?;
        self.decode_list(value)
    }
}
