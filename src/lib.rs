//! Hyperschema
//!
//! An append-only schema compiler with per-field versioning and a compact
//! binary codec.
//!
//! ## Features
//!
//! - **Append-only evolution**: a rebuild may add types, fields, enum values
//!   and versions, never remove or retype them
//! - **Lazy versioning**: the schema version advances at most once per rebuild,
//!   and every addition records the version it arrived in
//! - **Compact encoding**: structs carry optional fields behind a flags integer
//!   so old buffers decode against newer schemas
//! - **Code generation**: a deterministic Rust module with one codec per type
//!
//! ## Architecture
//!
//! ```text
//! previous snapshot ──► Hyperschema (replay) ──► namespace().register(..)
//!                                │
//!                              build()
//!                                ▼
//!                             Schema ──► to_json()   (next snapshot)
//!                                │  ──► encode()/decode()
//!                                └───► codegen::generate()
//! ```
//!
//! ## Example
//!
//! ```
//! use hyperschema::{fields, FieldDescription, Hyperschema, TypeDescription};
//!
//! let mut builder = Hyperschema::new();
//! builder
//!     .namespace("app")?
//!     .register(TypeDescription::structure(
//!         "user",
//!         vec![
//!             FieldDescription::new("id", "uint").required(),
//!             FieldDescription::new("name", "string").required(),
//!         ],
//!     ))?;
//! let schema = builder.build()?;
//!
//! let bytes = schema.encode("@app/user", &fields! { "id" => 10u64, "name" => "hello" })?;
//! assert_eq!(bytes, [10, 5, b'h', b'e', b'l', b'l', b'o']);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod checksum;
pub mod codec;
pub mod codegen;
pub mod compatibility;
pub mod config;
pub mod description;
pub mod error;
pub mod graph;
pub mod hyperschema;
pub mod primitive;
pub mod runtime;
pub mod schema;
pub mod types;
pub mod value;
pub mod version;

pub use checksum::Checksum;
pub use codec::{Codec, State};
pub use compatibility::{ChangeType, SchemaChange};
pub use config::SchemaConfig;
pub use description::{FieldDescription, Snapshot, TypeDescription, VersionDescription};
pub use error::{CodecError, Result, SchemaError};
pub use hyperschema::{Hyperschema, Namespace};
pub use primitive::Primitive;
pub use schema::Schema;
pub use types::{ResolvedType, TypeRef};
pub use value::{Fields, Value};
