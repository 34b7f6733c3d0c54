// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Writes Arrow tables to Parquet with explicit row group control.
//!
//! A [`Table`] pairs an Arrow schema with independently chunked columns.
//! [`FileWriter`] serializes such tables (or individual arrays) into a
//! Parquet file: it generates the definition and repetition levels for
//! flat and list-nested columns, converts values into their Parquet
//! physical representation (including unit-coerced or INT96 timestamps and
//! big-endian decimals) and drives the low-level column encoders one row
//! group at a time.
//!
//! # Example
//!
//! ```
//! # use std::sync::Arc;
//! # use arrow_array::{ArrayRef, Int32Array, StringArray};
//! # use arrow_schema::{DataType, Field, Schema};
//! # use parquet_table_writer::{ChunkedArray, FileWriter, Table};
//! # fn main() -> parquet_table_writer::errors::Result<()> {
//! let schema = Arc::new(Schema::new(vec![
//!     Field::new("id", DataType::Int32, false),
//!     Field::new("name", DataType::Utf8, true),
//! ]));
//!
//! // Columns may be chunked independently of each other
//! let ids = ChunkedArray::try_new(vec![
//!     Arc::new(Int32Array::from(vec![1, 2])) as ArrayRef,
//!     Arc::new(Int32Array::from(vec![3])) as ArrayRef,
//! ])?;
//! let names = ChunkedArray::from(
//!     Arc::new(StringArray::from(vec![Some("a"), None, Some("c")])) as ArrayRef,
//! );
//! let table = Table::try_new(schema.clone(), vec![Arc::new(ids), Arc::new(names)])?;
//!
//! let mut buffer = Vec::new();
//! let mut writer = FileWriter::try_new(&mut buffer, schema, None)?;
//! writer.write_table(&table, 1024)?;
//! writer.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! Unsupported shapes (structs, maps, unions, fixed-size lists and other
//! multi-child nesting) are rejected with a not-implemented error when the
//! writer is opened or on first write.

#[macro_use]
pub mod errors;
pub mod properties;
mod schema;
pub mod table;
pub mod writer;

pub use properties::{ArrowWriterProperties, ArrowWriterPropertiesBuilder};
pub use table::{ChunkedArray, Table};
pub use writer::{write_file_metadata, write_metadata_file, write_table, FileWriter};
