//! Derive macro for Hazelcast Portable serialization.
//!
//! # Example
//!
//! ```ignore
//! use hazelcast_core::HazelcastPortable;
//!
//! #[derive(Default, HazelcastPortable)]
//! #[hazelcast(factory_id = 1, class_id = 2)]
//! struct Person {
//!     age: i32,
//!     name: String,
//!     #[hazelcast(field_name = "emailAddress")]
//!     email: Option<String>,
//!     #[hazelcast(portable)]
//!     home: Option<Address>,
//! }
//! ```

extern crate proc_macro;

mod portable;

use proc_macro::TokenStream;

/// Derives the `Portable` trait for a struct.
///
/// Fields are written in declaration order, which becomes the field order
/// of the derived class definition.
///
/// # Attributes
///
/// ## Struct-level
/// - `#[hazelcast(factory_id = N)]`: **required**. The portable factory ID.
/// - `#[hazelcast(class_id = N)]`: **required**. The portable class ID.
/// - `#[hazelcast(version = N)]`: the class version. Defaults to the
///   serializer's configured portable version.
///
/// ## Field-level
/// - `#[hazelcast(field_name = "...")]`: overrides the wire field name.
/// - `#[hazelcast(skip)]`: leaves the field out of the schema.
/// - `#[hazelcast(portable)]`: marks an `Option<T>` or `Vec<T>` field whose
///   elements are themselves portable.
///
/// # Supported Field Types
///
/// `bool`, `char`, `i8`, `i16`, `i32`, `i64`, `f32`, `f64`, `String`,
/// `Option<String>`, and `Vec<T>` / `Option<Vec<T>>` of any of those
/// except `Option<String>`.
#[proc_macro_derive(HazelcastPortable, attributes(hazelcast))]
pub fn derive_portable(input: TokenStream) -> TokenStream {
    portable::derive_portable_impl(input)
}
