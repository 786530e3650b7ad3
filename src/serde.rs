//! Serde helpers for the builder APIs, which quote integers as decimal
//! strings on the wire.

pub mod as_str {
    use serde::{de::Deserialize, Deserializer, Serializer};
    use std::{fmt::Display, str::FromStr};

    pub fn serialize<S: Serializer, T: Display>(data: T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&data)
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr,
        T::Err: Display,
    {
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        T::from_str(&s).map_err(serde::de::Error::custom)
    }
}
