//! Typed values stored in leaves.
//!
//! A leaf holds bytes. A [`ValueCodec`] decides how a value becomes those
//! bytes and back; [`Shelf::get_as`](crate::Shelf::get_as) and
//! [`Shelf::set_as`](crate::Shelf::set_as) take one per call, and
//! [`Shelf::book`](crate::Shelf::book) fixes one for a run of reads and
//! writes.
//!
//! ```no_run
//! use gitshelf::{Json, Shelf, ShelfConfig};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Entry {
//!     title: String,
//!     tags: Vec<String>,
//! }
//!
//! let mut shelf = Shelf::open_repository("data.git".as_ref(), ShelfConfig::default())?;
//! let mut book = shelf.book(Json::<Entry>::new());
//! book.set("notes/first", &Entry { title: "hello".into(), tags: vec![] })?;
//! let first = book.get("notes/first")?;
//! assert_eq!(first.title, "hello");
//! # Ok::<(), gitshelf::ShelfError>(())
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Failure to turn a value into leaf bytes or back.
#[derive(Debug, Error)]
pub enum ValueError {
    /// The value could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),
    /// The stored bytes are not a valid value.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Converts between values and the bytes stored in a leaf.
///
/// Implement this to plug a serialization format into a shelf. Encoding must
/// be deterministic: equal values should produce equal bytes, otherwise
/// rewriting an unchanged value shows up as a change.
pub trait ValueCodec {
    /// The value type this codec reads and writes.
    type Value;

    /// Encode `value` into leaf bytes.
    ///
    /// # Errors
    /// [`ValueError::Encode`] if the value cannot be represented.
    fn encode(&self, value: &Self::Value) -> Result<Vec<u8>, ValueError>;

    /// Decode leaf bytes into a value.
    ///
    /// # Errors
    /// [`ValueError::Decode`] if the bytes are not a valid value.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Value, ValueError>;
}

/// Bytes in, bytes out.
#[derive(Clone, Copy, Debug, Default)]
pub struct Raw;

impl ValueCodec for Raw {
    type Value = Vec<u8>;

    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>, ValueError> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, ValueError> {
        Ok(bytes.to_vec())
    }
}

/// UTF-8 text.
#[derive(Clone, Copy, Debug, Default)]
pub struct Utf8;

impl ValueCodec for Utf8 {
    type Value = String;

    fn encode(&self, value: &String) -> Result<Vec<u8>, ValueError> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, ValueError> {
        String::from_utf8(bytes.to_vec()).map_err(|e| ValueError::Decode(e.to_string()))
    }
}

/// Any serde type, stored as pretty-printed JSON.
pub struct Json<T>(PhantomData<fn() -> T>);

impl<T> Json<T> {
    /// A JSON codec for `T`.
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: Serialize + DeserializeOwned> ValueCodec for Json<T> {
    type Value = T;

    fn encode(&self, value: &T) -> Result<Vec<u8>, ValueError> {
        let mut out =
            serde_json::to_vec_pretty(value).map_err(|e| ValueError::Encode(e.to_string()))?;
        out.push(b'\n');
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, ValueError> {
        serde_json::from_slice(bytes).map_err(|e| ValueError::Decode(e.to_string()))
    }
}

/// Any serde type that serializes as a table, stored as TOML.
pub struct Toml<T>(PhantomData<fn() -> T>);

impl<T> Toml<T> {
    /// A TOML codec for `T`.
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: Serialize + DeserializeOwned> ValueCodec for Toml<T> {
    type Value = T;

    fn encode(&self, value: &T) -> Result<Vec<u8>, ValueError> {
        toml::to_string(value)
            .map(String::into_bytes)
            .map_err(|e| ValueError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, ValueError> {
        let text = std::str::from_utf8(bytes).map_err(|e| ValueError::Decode(e.to_string()))?;
        toml::from_str(text).map_err(|e| ValueError::Decode(e.to_string()))
    }
}

// Manual impls: derives would bound `T`.
macro_rules! marker_impls {
    ($($codec:ident),*) => {$(
        impl<T> Clone for $codec<T> {
            fn clone(&self) -> Self {
                Self::new()
            }
        }

        impl<T> Default for $codec<T> {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<T> fmt::Debug for $codec<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}<{}>", stringify!($codec), std::any::type_name::<T>())
            }
        }
    )*};
}

marker_impls!(Json, Toml);
