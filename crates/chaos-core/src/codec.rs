//! Wire encoding helpers shared by resource types

/// Serialize a fieldless `#[repr(u8)]` enum as its declaration index
macro_rules! int_enum_serde {
    ($ty:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_u8(*self as u8)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <u8 as serde::Deserialize>::deserialize(deserializer)?;
                match raw {
                    $($value => Ok($ty::$variant),)+
                    other => Err(<D::Error as serde::de::Error>::custom(format!(
                        "invalid {} value: {}",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

pub(crate) use int_enum_serde;

/// `Duration` as integer nanoseconds
pub(crate) mod duration_nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(crate) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = u64::try_from(value.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}
