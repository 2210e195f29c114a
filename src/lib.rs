//
// Copyright 2020 ndfkit Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! `ndfkit` reads and writes EDat archives and the NDFBin object-graph
//! format they carry, plus a reversible XML interchange mapping for the
//! object graph.
//!
//! - [`edat`]: the sector-aligned archive container (trie-indexed file
//!   dictionary, MD5 integrity checks).
//! - [`ndf`]: the typed object-graph binary format (interned tables,
//!   object references, import/export path tries).
//! - [`xml`]: a minimal, dependency-free XML interchange mapping for
//!   [`ndf::Graph`].
//!
//! # Editing persistence (not implemented here)
//!
//! An external tool that wants to edit a [`ndf::Graph`] in place, rather
//! than through this crate's own edit methods, can shred it into a
//! relational row shape instead of holding the whole graph in memory:
//!
//! - `ndf_file(file_id, path, sector_size)`
//! - `ndf_object(object_id, file_id, name, class_name, export_path, is_top_object)`
//! - `ndf_property(property_id, object_id, name, type_id, value_id)`
//! - one value table per scalar property variant, keyed by `value_id`
//!   (e.g. `ndf_property_string(value_id, value)`,
//!   `ndf_property_color(value_id, r, g, b, a)`, and so on for every other
//!   [`ndf::PropertyType`])
//!
//! This crate has no SQL dependency and does not implement any such
//! storage engine; the shape above is documented only so a caller can
//! design one against a stable interface.

mod md5;

pub mod edat;
pub mod error;
pub mod ndf;
pub mod xml;

pub use edat::Archive;
pub use error::{Error, Result};
pub use ndf::Graph;
