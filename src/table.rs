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

//! In-memory containers for chunked columns and tables.

use std::sync::Arc;

use arrow_array::{Array, ArrayRef, RecordBatch};
use arrow_schema::{DataType, SchemaRef};

use crate::errors::{ParquetError, Result};

/// An ordered collection of arrays of one [`DataType`], logically treated
/// as a single column.
///
/// The concatenation of the chunks defines the column; chunk boundaries
/// carry no meaning in the output file. Chunks may be individually sliced
/// and keep their own internal offsets.
#[derive(Debug, Clone)]
pub struct ChunkedArray {
    chunks: Vec<ArrayRef>,
    data_type: DataType,
    length: usize,
}

impl ChunkedArray {
    /// Creates a chunked array from one or more chunks of the same type.
    pub fn try_new(chunks: Vec<ArrayRef>) -> Result<Self> {
        let Some(first) = chunks.first() else {
            return Err(general_err!(
                "A chunked array requires at least one chunk to determine its type"
            ));
        };
        let data_type = first.data_type().clone();
        for chunk in &chunks {
            if chunk.data_type() != &data_type {
                return Err(general_err!(
                    "All chunks must have the same type: expected {}, got {}",
                    data_type,
                    chunk.data_type()
                ));
            }
        }
        let length = chunks.iter().map(|c| c.len()).sum();
        Ok(Self {
            chunks,
            data_type,
            length,
        })
    }

    /// The common type of all chunks.
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Total row count across chunks.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Whether the logical column has no rows.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Number of chunks.
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Returns chunk `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of bounds.
    pub fn chunk(&self, i: usize) -> &ArrayRef {
        &self.chunks[i]
    }

    /// All chunks in order.
    pub fn chunks(&self) -> &[ArrayRef] {
        &self.chunks
    }
}

impl From<ArrayRef> for ChunkedArray {
    fn from(array: ArrayRef) -> Self {
        let data_type = array.data_type().clone();
        let length = array.len();
        Self {
            chunks: vec![array],
            data_type,
            length,
        }
    }
}

/// A schema plus one chunked column per field.
///
/// Unlike a [`RecordBatch`], the columns of a table may be chunked
/// independently of each other as long as their total lengths agree.
#[derive(Debug, Clone)]
pub struct Table {
    schema: SchemaRef,
    columns: Vec<Arc<ChunkedArray>>,
    num_rows: usize,
}

impl Table {
    /// Creates a table, validating the columns against the schema.
    pub fn try_new(schema: SchemaRef, columns: Vec<Arc<ChunkedArray>>) -> Result<Self> {
        let num_rows = columns.first().map(|c| c.len()).unwrap_or(0);
        let table = Self {
            schema,
            columns,
            num_rows,
        };
        table.validate()?;
        Ok(table)
    }

    /// Builds a table from record batches of a common schema, one chunk per
    /// batch per column. An empty slice is rejected as the schema would be
    /// unknown.
    pub fn from_record_batches(batches: &[RecordBatch]) -> Result<Self> {
        let Some(first) = batches.first() else {
            return Err(general_err!(
                "Cannot build a table from zero record batches"
            ));
        };
        let schema = first.schema();
        for batch in batches {
            if batch.schema().fields() != schema.fields() {
                return Err(arrow_err!(
                    "All record batches must share the table schema"
                ));
            }
        }
        let columns = (0..schema.fields().len())
            .map(|i| {
                let chunks: Vec<ArrayRef> = batches
                    .iter()
                    .map(|batch| batch.column(i).clone())
                    .collect();
                ChunkedArray::try_new(chunks).map(Arc::new)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::try_new(schema, columns)
    }

    /// Checks column count, per-column type and equal column lengths.
    pub fn validate(&self) -> Result<()> {
        if self.columns.len() != self.schema.fields().len() {
            return Err(general_err!(
                "Table has {} columns but its schema has {} fields",
                self.columns.len(),
                self.schema.fields().len()
            ));
        }
        for (column, field) in self.columns.iter().zip(self.schema.fields()) {
            if column.data_type() != field.data_type() {
                return Err(general_err!(
                    "Column {} has type {} but its field declares {}",
                    field.name(),
                    column.data_type(),
                    field.data_type()
                ));
            }
            if column.len() != self.num_rows {
                return Err(general_err!(
                    "Column {} has {} rows, expected {}",
                    field.name(),
                    column.len(),
                    self.num_rows
                ));
            }
        }
        Ok(())
    }

    /// The table schema.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Row count shared by all columns.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of columns.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns column `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of bounds.
    pub fn column(&self, i: usize) -> &Arc<ChunkedArray> {
        &self.columns[i]
    }
}
