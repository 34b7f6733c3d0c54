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

//! Writes [`Table`]s and arrays to Parquet.
//!
//! [`FileWriter`] owns the output: it partitions tables into row groups,
//! walks every column across its chunk boundaries, generates definition
//! and repetition levels, converts values to their Parquet physical
//! representation and feeds them to the underlying column encoder. One
//! file writer drives one sink; it is not thread-safe and all work is
//! CPU-bound and synchronous.

pub(crate) mod levels;
pub(crate) mod timestamp;

use std::io::Write;
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types as arrow_types;
use arrow_array::{Array, ArrayRef, ArrowPrimitiveType, NullArray, PrimitiveArray};
use arrow_buffer::{ArrowNativeType, MutableBuffer};
use arrow_schema::{DataType, FieldRef, SchemaRef, TimeUnit};

use bytes::Bytes;

use parquet::basic::Repetition;
use parquet::column::writer::{
    get_column_writer, get_typed_column_writer_mut, ColumnCloseResult, ColumnWriter,
};
use parquet::data_type::{
    BoolType, ByteArray, ByteArrayType, DataType as ParquetDataType, DoubleType,
    FixedLenByteArray, FixedLenByteArrayType, FloatType, Int32Type, Int64Type, Int96Type,
};
use parquet::file::metadata::RowGroupMetaData;
use parquet::file::properties::{WriterProperties, WriterPropertiesPtr, WriterVersion};
use parquet::file::writer::{SerializedFileWriter, SerializedPageWriter, TrackedWrite};
use parquet::format::{FileMetaData, KeyValue};
use parquet::schema::types::{ColumnDescPtr, ColumnDescriptor, SchemaDescPtr};
use parquet::thrift::TSerializable;
use thrift::protocol::{TCompactOutputProtocol, TOutputProtocol};

use crate::errors::{ParquetError, Result};
use crate::properties::ArrowWriterProperties;
use crate::schema::{arrow_to_parquet_schema, decimal_length_from_precision};
use crate::table::{ChunkedArray, Table};

use levels::{calculate_array_levels, ArrayLevels};
use timestamp::{timestamp_target, to_impala_timestamp, TimestampCoercer, TimestampTarget};

const PARQUET_MAGIC: &[u8] = b"PAR1";

// ----------------------------------------------------------------------
// Scratch buffers

/// Scratch space reused by every column write of one file writer.
///
/// `data` holds values converted to their physical representation and is
/// reinterpreted per batch; `def_levels` backs level generation. Both grow
/// monotonically and are invalidated by the next write.
struct WriteContext {
    data: MutableBuffer,
    def_levels: Vec<i16>,
}

impl WriteContext {
    fn new() -> Self {
        Self {
            data: MutableBuffer::new(0),
            def_levels: Vec::new(),
        }
    }

    fn split_mut(&mut self) -> (&mut MutableBuffer, &mut Vec<i16>) {
        (&mut self.data, &mut self.def_levels)
    }
}

/// Views the scratch buffer as `len` values of `T`, growing it as needed.
/// Contents are unspecified until written.
fn typed_scratch<T: ArrowNativeType>(buffer: &mut MutableBuffer, len: usize) -> &mut [T] {
    buffer.resize(len * std::mem::size_of::<T>(), 0);
    &mut buffer.typed_data_mut()[..len]
}

// ----------------------------------------------------------------------
// Per-column writer

/// Drives the underlying encoder for one leaf column of one row group.
struct ArrowColumnWriter<'a> {
    writer: ColumnWriter<'a>,
    descr: ColumnDescPtr,
    field: FieldRef,
    version: WriterVersion,
    arrow_props: Arc<ArrowWriterProperties>,
}

impl ArrowColumnWriter<'_> {
    /// Writes rows `[offset, offset + size)` of a chunked column, slicing
    /// at chunk boundaries. Every slice becomes an independent batch; the
    /// encoder concatenates them transparently.
    fn write_chunked(
        &mut self,
        ctx: &mut WriteContext,
        data: &ChunkedArray,
        offset: usize,
        size: usize,
    ) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let mut absolute_position = 0;
        let mut chunk_index = 0;
        let mut chunk_offset = 0;
        while chunk_index < data.num_chunks() && absolute_position < offset {
            let chunk_length = data.chunk(chunk_index).len();
            if absolute_position + chunk_length > offset {
                // Relative offset into the chunk to reach the desired start
                chunk_offset = offset - absolute_position;
                break;
            } else {
                chunk_index += 1;
                absolute_position += chunk_length;
            }
        }
        if absolute_position >= data.len() {
            return Err(general_err!(
                "Cannot write data at offset past end of chunked array"
            ));
        }

        let mut values_written = 0;
        while values_written < size {
            if chunk_index >= data.num_chunks() {
                return Err(general_err!(
                    "Cannot write data at offset past end of chunked array"
                ));
            }
            let chunk = data.chunk(chunk_index);
            let available_values = chunk.len() - chunk_offset;
            let chunk_write_size = std::cmp::min(size - values_written, available_values);

            // The chunk offset is 0 except possibly for the first chunk
            let slice = chunk.slice(chunk_offset, chunk_write_size);
            self.write(ctx, &slice)?;

            if chunk_write_size == available_values {
                chunk_offset = 0;
                chunk_index += 1;
            }
            values_written += chunk_write_size;
        }
        Ok(())
    }

    /// Writes one array: levels first, then the typed value batch.
    fn write(&mut self, ctx: &mut WriteContext, array: &ArrayRef) -> Result<()> {
        if array.is_empty() {
            return Ok(());
        }
        leaf_type(array.data_type())?;

        let (data_scratch, def_scratch) = ctx.split_mut();
        let array_levels = calculate_array_levels(array, self.field.as_ref(), def_scratch)?;
        debug_assert!(match array_levels.def_levels() {
            Some(defs) => defs.len() == array_levels.num_levels,
            None => array_levels.num_levels == array.len(),
        });
        let values = array_levels
            .values
            .slice(array_levels.values_offset, array_levels.num_values);

        write_leaf(
            &mut self.writer,
            data_scratch,
            &values,
            &array_levels,
            is_required(self.descr.as_ref()),
            self.version,
            self.arrow_props.as_ref(),
        )?;
        Ok(())
    }

    fn close(self) -> Result<ColumnCloseResult> {
        close_column(self.writer)
    }
}

/// Descends through single-child wrappers to the leaf type.
fn leaf_type(data_type: &DataType) -> Result<&DataType> {
    match data_type {
        DataType::List(child) => leaf_type(child.data_type()),
        DataType::Struct(fields) => {
            if fields.len() != 1 {
                return Err(general_err!(
                    "Nested column branch had multiple children: {}",
                    data_type
                ));
            }
            leaf_type(fields[0].data_type())
        }
        other => Ok(other),
    }
}

fn is_required(descr: &ColumnDescriptor) -> bool {
    descr.self_type().get_basic_info().repetition() == Repetition::REQUIRED
}

fn close_column(writer: ColumnWriter<'_>) -> Result<ColumnCloseResult> {
    match writer {
        ColumnWriter::BoolColumnWriter(typed) => typed.close(),
        ColumnWriter::Int32ColumnWriter(typed) => typed.close(),
        ColumnWriter::Int64ColumnWriter(typed) => typed.close(),
        ColumnWriter::Int96ColumnWriter(typed) => typed.close(),
        ColumnWriter::FloatColumnWriter(typed) => typed.close(),
        ColumnWriter::DoubleColumnWriter(typed) => typed.close(),
        ColumnWriter::ByteArrayColumnWriter(typed) => typed.close(),
        ColumnWriter::FixedLenByteArrayColumnWriter(typed) => typed.close(),
    }
}

// ----------------------------------------------------------------------
// Typed batch writers

/// Dispatches the sliced leaf values to the encoder.
///
/// A column whose leaf is required, or carries no nulls, takes the dense
/// path and converts every slot; a nullable leaf with nulls converts and
/// compacts only the valid slots, so the encoder receives exactly one
/// value per maximum-definition-level position.
fn write_leaf(
    writer: &mut ColumnWriter<'_>,
    scratch: &mut MutableBuffer,
    values: &ArrayRef,
    levels: &ArrayLevels<'_>,
    required: bool,
    version: WriterVersion,
    arrow_props: &ArrowWriterProperties,
) -> Result<usize> {
    let def_levels = levels.def_levels();
    let rep_levels = levels.rep_levels();
    let dense = required || values.null_count() == 0;

    match values.data_type() {
        DataType::Null => {
            // Only levels are written
            get_typed_column_writer_mut::<Int32Type>(writer)
                .write_batch(&[], def_levels, rep_levels)
        }
        DataType::Boolean => {
            let array = values.as_boolean();
            let buffer: Vec<bool> = (0..array.len())
                .filter(|&i| array.is_valid(i))
                .map(|i| array.value(i))
                .collect();
            get_typed_column_writer_mut::<BoolType>(writer)
                .write_batch(&buffer, def_levels, rep_levels)
        }
        DataType::Int8 => write_primitive::<_, Int32Type, _>(
            writer,
            scratch,
            values.as_primitive::<arrow_types::Int8Type>(),
            dense,
            def_levels,
            rep_levels,
            |v| v as i32,
        ),
        DataType::Int16 => write_primitive::<_, Int32Type, _>(
            writer,
            scratch,
            values.as_primitive::<arrow_types::Int16Type>(),
            dense,
            def_levels,
            rep_levels,
            |v| v as i32,
        ),
        DataType::Int32 => write_primitive::<_, Int32Type, _>(
            writer,
            scratch,
            values.as_primitive::<arrow_types::Int32Type>(),
            dense,
            def_levels,
            rep_levels,
            |v| v,
        ),
        DataType::Int64 => write_primitive::<_, Int64Type, _>(
            writer,
            scratch,
            values.as_primitive::<arrow_types::Int64Type>(),
            dense,
            def_levels,
            rep_levels,
            |v| v,
        ),
        DataType::UInt8 => write_primitive::<_, Int32Type, _>(
            writer,
            scratch,
            values.as_primitive::<arrow_types::UInt8Type>(),
            dense,
            def_levels,
            rep_levels,
            |v| v as i32,
        ),
        DataType::UInt16 => write_primitive::<_, Int32Type, _>(
            writer,
            scratch,
            values.as_primitive::<arrow_types::UInt16Type>(),
            dense,
            def_levels,
            rep_levels,
            |v| v as i32,
        ),
        DataType::UInt32 => {
            let array = values.as_primitive::<arrow_types::UInt32Type>();
            if version == WriterVersion::PARQUET_1_0 {
                // 1.0 readers cannot read the unsigned 32-bit annotation;
                // widen losslessly instead
                write_primitive::<_, Int64Type, _>(
                    writer,
                    scratch,
                    array,
                    dense,
                    def_levels,
                    rep_levels,
                    |v| v as i64,
                )
            } else {
                // Reinterpret the bits, mapping the upper half to negatives
                write_primitive::<_, Int32Type, _>(
                    writer,
                    scratch,
                    array,
                    dense,
                    def_levels,
                    rep_levels,
                    |v| v as i32,
                )
            }
        }
        DataType::UInt64 => write_primitive::<_, Int64Type, _>(
            writer,
            scratch,
            values.as_primitive::<arrow_types::UInt64Type>(),
            dense,
            def_levels,
            rep_levels,
            |v| v as i64,
        ),
        DataType::Float32 => write_primitive::<_, FloatType, _>(
            writer,
            scratch,
            values.as_primitive::<arrow_types::Float32Type>(),
            dense,
            def_levels,
            rep_levels,
            |v| v,
        ),
        DataType::Float64 => write_primitive::<_, DoubleType, _>(
            writer,
            scratch,
            values.as_primitive::<arrow_types::Float64Type>(),
            dense,
            def_levels,
            rep_levels,
            |v| v,
        ),
        DataType::Date32 => write_primitive::<_, Int32Type, _>(
            writer,
            scratch,
            values.as_primitive::<arrow_types::Date32Type>(),
            dense,
            def_levels,
            rep_levels,
            |v| v,
        ),
        DataType::Date64 => write_primitive::<_, Int32Type, _>(
            writer,
            scratch,
            values.as_primitive::<arrow_types::Date64Type>(),
            dense,
            def_levels,
            rep_levels,
            // Milliseconds into days since the epoch
            |v| (v / 86_400_000) as i32,
        ),
        DataType::Time32(TimeUnit::Second) => write_primitive::<_, Int32Type, _>(
            writer,
            scratch,
            values.as_primitive::<arrow_types::Time32SecondType>(),
            dense,
            def_levels,
            rep_levels,
            |v| v * 1_000,
        ),
        DataType::Time32(TimeUnit::Millisecond) => write_primitive::<_, Int32Type, _>(
            writer,
            scratch,
            values.as_primitive::<arrow_types::Time32MillisecondType>(),
            dense,
            def_levels,
            rep_levels,
            |v| v,
        ),
        DataType::Time64(TimeUnit::Microsecond) => write_primitive::<_, Int64Type, _>(
            writer,
            scratch,
            values.as_primitive::<arrow_types::Time64MicrosecondType>(),
            dense,
            def_levels,
            rep_levels,
            |v| v,
        ),
        DataType::Time64(TimeUnit::Nanosecond) => write_primitive::<_, Int64Type, _>(
            writer,
            scratch,
            values.as_primitive::<arrow_types::Time64NanosecondType>(),
            dense,
            def_levels,
            rep_levels,
            |v| v,
        ),
        DataType::Timestamp(unit, _) => write_timestamps(
            writer,
            scratch,
            values,
            dense,
            def_levels,
            rep_levels,
            *unit,
            version,
            arrow_props,
        ),
        DataType::Binary => {
            let array = values.as_binary::<i32>();
            let buffer: Vec<ByteArray> = (0..array.len())
                .filter(|&i| array.is_valid(i))
                .map(|i| ByteArray::from(array.value(i).to_vec()))
                .collect();
            get_typed_column_writer_mut::<ByteArrayType>(writer)
                .write_batch(&buffer, def_levels, rep_levels)
        }
        DataType::Utf8 => {
            let array = values.as_string::<i32>();
            let buffer: Vec<ByteArray> = (0..array.len())
                .filter(|&i| array.is_valid(i))
                .map(|i| ByteArray::from(array.value(i).as_bytes().to_vec()))
                .collect();
            get_typed_column_writer_mut::<ByteArrayType>(writer)
                .write_batch(&buffer, def_levels, rep_levels)
        }
        DataType::FixedSizeBinary(_) => {
            let array = values.as_fixed_size_binary();
            let buffer: Vec<FixedLenByteArray> = (0..array.len())
                .filter(|&i| array.is_valid(i))
                .map(|i| FixedLenByteArray::from(ByteArray::from(array.value(i).to_vec())))
                .collect();
            get_typed_column_writer_mut::<FixedLenByteArrayType>(writer)
                .write_batch(&buffer, def_levels, rep_levels)
        }
        DataType::Decimal128(precision, _) => {
            let array = values.as_primitive::<arrow_types::Decimal128Type>();
            let size = decimal_length_from_precision(*precision);
            let buffer: Vec<FixedLenByteArray> = (0..array.len())
                .filter(|&i| array.is_valid(i))
                .map(|i| {
                    // Big-endian two's complement, truncated from the left
                    let bytes = array.value(i).to_be_bytes();
                    FixedLenByteArray::from(ByteArray::from(bytes[16 - size..].to_vec()))
                })
                .collect();
            get_typed_column_writer_mut::<FixedLenByteArrayType>(writer)
                .write_batch(&buffer, def_levels, rep_levels)
        }
        other => Err(nyi_err!(
            "Attempting to write an Arrow type {} to parquet that is not yet implemented",
            other
        )),
    }
}

fn write_primitive<A, P, F>(
    writer: &mut ColumnWriter<'_>,
    scratch: &mut MutableBuffer,
    array: &PrimitiveArray<A>,
    dense: bool,
    def_levels: Option<&[i16]>,
    rep_levels: Option<&[i16]>,
    convert: F,
) -> Result<usize>
where
    A: ArrowPrimitiveType,
    P: ParquetDataType,
    P::T: ArrowNativeType,
    F: Fn(A::Native) -> P::T,
{
    let buffer = typed_scratch::<P::T>(scratch, array.len());
    let count = if dense {
        for (slot, value) in buffer.iter_mut().zip(array.values().iter()) {
            *slot = convert(*value);
        }
        array.len()
    } else {
        let mut count = 0;
        for i in 0..array.len() {
            if array.is_valid(i) {
                buffer[count] = convert(array.value(i));
                count += 1;
            }
        }
        count
    };
    get_typed_column_writer_mut::<P>(writer).write_batch(
        &buffer[..count],
        def_levels,
        rep_levels,
    )
}

#[allow(clippy::too_many_arguments)]
fn write_timestamps(
    writer: &mut ColumnWriter<'_>,
    scratch: &mut MutableBuffer,
    values: &ArrayRef,
    dense: bool,
    def_levels: Option<&[i16]>,
    rep_levels: Option<&[i16]>,
    unit: TimeUnit,
    version: WriterVersion,
    arrow_props: &ArrowWriterProperties,
) -> Result<usize> {
    let raw = timestamp_values(values.as_ref(), unit);
    match timestamp_target(unit, version, arrow_props)? {
        (TimestampTarget::Int96, _) => {
            let mut buffer = Vec::with_capacity(raw.len());
            for (i, value) in raw.iter().enumerate() {
                if dense || values.is_valid(i) {
                    buffer.push(to_impala_timestamp(*value, unit));
                }
            }
            get_typed_column_writer_mut::<Int96Type>(writer)
                .write_batch(&buffer, def_levels, rep_levels)
        }
        (TimestampTarget::Int64(target), truncation_allowed) => {
            let coercer = TimestampCoercer::new(unit, target, truncation_allowed)?;
            let buffer = typed_scratch::<i64>(scratch, raw.len());
            let mut count = 0;
            for (i, value) in raw.iter().enumerate() {
                if dense || values.is_valid(i) {
                    buffer[count] = coercer.coerce(*value)?;
                    count += 1;
                }
            }
            get_typed_column_writer_mut::<Int64Type>(writer).write_batch(
                &buffer[..count],
                def_levels,
                rep_levels,
            )
        }
    }
}

fn timestamp_values(array: &dyn Array, unit: TimeUnit) -> &[i64] {
    match unit {
        TimeUnit::Second => array
            .as_primitive::<arrow_types::TimestampSecondType>()
            .values(),
        TimeUnit::Millisecond => array
            .as_primitive::<arrow_types::TimestampMillisecondType>()
            .values(),
        TimeUnit::Microsecond => array
            .as_primitive::<arrow_types::TimestampMicrosecondType>()
            .values(),
        TimeUnit::Nanosecond => array
            .as_primitive::<arrow_types::TimestampNanosecondType>()
            .values(),
    }
}

// ----------------------------------------------------------------------
// File writer

/// Writes Arrow tables and arrays as a Parquet file.
///
/// Row groups are explicit: either drive them directly with
/// [`new_row_group`](Self::new_row_group) and
/// [`write_column_chunk`](Self::write_column_chunk), or let
/// [`write_table`](Self::write_table) partition a table into row groups of
/// a given size. The file is valid only after a successful
/// [`close`](Self::close).
pub struct FileWriter<W: Write + Send> {
    writer: SerializedFileWriter<W>,
    arrow_schema: SchemaRef,
    schema_descr: SchemaDescPtr,
    props: WriterPropertiesPtr,
    arrow_props: Arc<ArrowWriterProperties>,
    ctx: WriteContext,
    /// Encoded column chunks of the open row group, in schema order.
    row_group: Option<Vec<(Bytes, ColumnCloseResult)>>,
    /// Set on first close; makes close idempotent.
    metadata: Option<FileMetaData>,
}

impl<W: Write + Send> FileWriter<W> {
    /// Opens a writer over `sink` with default arrow properties.
    pub fn try_new(
        sink: W,
        schema: SchemaRef,
        props: Option<WriterProperties>,
    ) -> Result<Self> {
        Self::try_new_with_options(sink, schema, props, ArrowWriterProperties::default())
    }

    /// Opens a writer over `sink`.
    ///
    /// The schema is converted once; unsupported fields fail here rather
    /// than on first write.
    pub fn try_new_with_options(
        sink: W,
        schema: SchemaRef,
        props: Option<WriterProperties>,
        arrow_props: ArrowWriterProperties,
    ) -> Result<Self> {
        let props = props.unwrap_or_else(|| WriterProperties::builder().build());
        let props = append_schema_metadata(&schema, props);
        let schema_descr = Arc::new(arrow_to_parquet_schema(&schema, &props, &arrow_props)?);
        let props = Arc::new(props);
        let writer =
            SerializedFileWriter::new(sink, schema_descr.root_schema_ptr(), props.clone())?;
        Ok(Self {
            writer,
            arrow_schema: schema,
            schema_descr,
            props,
            arrow_props: Arc::new(arrow_props),
            ctx: WriteContext::new(),
            row_group: None,
            metadata: None,
        })
    }

    /// The Arrow schema this writer accepts.
    pub fn arrow_schema(&self) -> &SchemaRef {
        &self.arrow_schema
    }

    /// The format-level writer properties.
    pub fn properties(&self) -> &WriterProperties {
        &self.props
    }

    /// Metadata of row groups flushed so far.
    pub fn flushed_row_groups(&self) -> &[RowGroupMetaData] {
        self.writer.flushed_row_groups()
    }

    /// Finishes the open row group, if any, and starts the next one.
    pub fn new_row_group(&mut self) -> Result<()> {
        self.assert_open()?;
        self.flush_row_group()?;
        self.row_group = Some(Vec::with_capacity(self.schema_descr.num_columns()));
        Ok(())
    }

    /// Writes `array` as the next column chunk of the open row group.
    pub fn write_column_chunk(&mut self, array: ArrayRef) -> Result<()> {
        let size = array.len();
        let chunked = ChunkedArray::from(array);
        self.write_chunked_column(&chunked, 0, size)
    }

    /// Writes rows `[offset, offset + size)` of a chunked column as the
    /// next column chunk of the open row group.
    ///
    /// Dictionary columns are decoded to their value type first; nested
    /// dictionaries are not supported.
    pub fn write_chunked_column(
        &mut self,
        data: &ChunkedArray,
        offset: usize,
        size: usize,
    ) -> Result<()> {
        self.assert_open()?;

        if let DataType::Dictionary(_, value_type) = data.data_type() {
            if value_type.as_ref() == &DataType::Null {
                let nulls: ArrayRef = Arc::new(NullArray::new(data.len()));
                return self.write_chunked_column(&ChunkedArray::from(nulls), offset, size);
            }
            let chunks = data
                .chunks()
                .iter()
                .map(|chunk| Ok(arrow_cast::cast(chunk.as_ref(), value_type)?))
                .collect::<Result<Vec<_>>>()?;
            return self.write_chunked_column(&ChunkedArray::try_new(chunks)?, offset, size);
        }

        let column_index = match &self.row_group {
            Some(chunks) => chunks.len(),
            None => {
                return Err(general_err!(
                    "No row group is open; call new_row_group before writing column chunks"
                ));
            }
        };
        if column_index >= self.schema_descr.num_columns() {
            return Err(general_err!(
                "Cannot write more column chunks than the schema has columns ({})",
                self.schema_descr.num_columns()
            ));
        }

        let descr = self.schema_descr.column(column_index);
        let field = self.arrow_schema.fields()[column_index].clone();

        let mut sink = TrackedWrite::new(Vec::new());
        let close_result = {
            let page_writer = Box::new(SerializedPageWriter::new(&mut sink));
            let mut column_writer = ArrowColumnWriter {
                writer: get_column_writer(descr, self.props.clone(), page_writer),
                descr: self.schema_descr.column(column_index),
                field,
                version: self.props.writer_version(),
                arrow_props: self.arrow_props.clone(),
            };
            column_writer.write_chunked(&mut self.ctx, data, offset, size)?;
            column_writer.close()?
        };
        let encoded = Bytes::from(sink.into_inner()?);

        match &mut self.row_group {
            Some(chunks) => chunks.push((encoded, close_result)),
            None => unreachable!("row group checked above"),
        }
        Ok(())
    }

    /// Writes a whole table, partitioned into row groups of `chunk_size`
    /// rows (clamped to the configured maximum row group length). An empty
    /// table produces a single empty row group. On any failure the file is
    /// closed best-effort before the error propagates.
    pub fn write_table(&mut self, table: &Table, chunk_size: usize) -> Result<()> {
        self.assert_open()?;
        table.validate()?;
        if chunk_size == 0 && table.num_rows() > 0 {
            return Err(general_err!("chunk size per row group must be greater than 0"));
        }
        if table.schema().fields() != self.arrow_schema.fields() {
            return Err(arrow_err!("Table schema does not match the schema of this writer"));
        }
        let chunk_size = std::cmp::min(chunk_size, self.props.max_row_group_size());

        if table.num_rows() == 0 {
            return self.write_row_group_or_abandon(table, 0, 0);
        }
        let mut chunk = 0;
        while chunk * chunk_size < table.num_rows() {
            let offset = chunk * chunk_size;
            let size = std::cmp::min(chunk_size, table.num_rows() - offset);
            self.write_row_group_or_abandon(table, offset, size)?;
            chunk += 1;
        }
        Ok(())
    }

    fn write_row_group_or_abandon(
        &mut self,
        table: &Table,
        offset: usize,
        size: usize,
    ) -> Result<()> {
        let result = self.write_row_group(table, offset, size);
        if result.is_err() {
            let _ = self.close();
        }
        result
    }

    fn write_row_group(&mut self, table: &Table, offset: usize, size: usize) -> Result<()> {
        self.new_row_group()?;
        for i in 0..table.num_columns() {
            self.write_chunked_column(table.column(i), offset, size)?;
        }
        Ok(())
    }

    /// Flushes any open row group and writes the file footer. Idempotent:
    /// later calls return the same metadata without touching the sink.
    pub fn close(&mut self) -> Result<FileMetaData> {
        if let Some(metadata) = &self.metadata {
            return Ok(metadata.clone());
        }
        self.flush_row_group()?;
        let metadata = self.writer.finish()?;
        self.metadata = Some(metadata.clone());
        Ok(metadata)
    }

    /// Appends the buffered column chunks of the open row group to the
    /// file, in schema order.
    fn flush_row_group(&mut self) -> Result<()> {
        let Some(chunks) = self.row_group.take() else {
            return Ok(());
        };
        if chunks.is_empty() {
            return Ok(());
        }
        if chunks.len() != self.schema_descr.num_columns() {
            return Err(general_err!(
                "Row group has {} column chunks but the schema has {} columns",
                chunks.len(),
                self.schema_descr.num_columns()
            ));
        }
        let expected_rows = chunks[0].1.rows_written;
        let mut row_group_writer = self.writer.next_row_group()?;
        for (encoded, close_result) in chunks {
            if close_result.rows_written != expected_rows {
                return Err(general_err!(
                    "All columns of a row group must have the same length: {} != {}",
                    close_result.rows_written,
                    expected_rows
                ));
            }
            row_group_writer.append_column(&encoded, close_result)?;
        }
        row_group_writer.close()?;
        Ok(())
    }

    fn assert_open(&self) -> Result<()> {
        if self.metadata.is_some() {
            return Err(general_err!("Cannot write to a closed file writer"));
        }
        Ok(())
    }
}

fn append_schema_metadata(schema: &arrow_schema::Schema, props: WriterProperties) -> WriterProperties {
    if schema.metadata().is_empty() {
        return props;
    }
    let mut key_value: Vec<KeyValue> = props.key_value_metadata().cloned().unwrap_or_default();
    key_value.extend(
        schema
            .metadata()
            .iter()
            .map(|(key, value)| KeyValue::new(key.clone(), value.clone())),
    );
    props
        .into_builder()
        .set_key_value_metadata(Some(key_value))
        .build()
}

// ----------------------------------------------------------------------
// Free functions

/// Writes `table` to `sink` as one Parquet file with row groups of
/// `chunk_size` rows, then closes it, returning the file metadata.
pub fn write_table<W: Write + Send>(
    table: &Table,
    sink: W,
    chunk_size: usize,
    props: Option<WriterProperties>,
    arrow_props: Option<ArrowWriterProperties>,
) -> Result<FileMetaData> {
    let mut writer = FileWriter::try_new_with_options(
        sink,
        table.schema().clone(),
        props,
        arrow_props.unwrap_or_default(),
    )?;
    writer.write_table(table, chunk_size)?;
    writer.close()
}

/// Appends serialized file metadata plus the 8-byte Parquet footer to
/// `sink`.
pub fn write_file_metadata<W: Write>(metadata: &FileMetaData, sink: W) -> Result<()> {
    let mut sink = TrackedWrite::new(sink);
    write_metadata_and_footer(metadata, &mut sink)?;
    sink.flush()?;
    Ok(())
}

/// Writes a standalone metadata file: leading magic, serialized metadata,
/// footer. Used for `_metadata` sidecar files.
pub fn write_metadata_file<W: Write>(metadata: &FileMetaData, sink: W) -> Result<()> {
    let mut sink = TrackedWrite::new(sink);
    sink.write_all(PARQUET_MAGIC)?;
    write_metadata_and_footer(metadata, &mut sink)?;
    sink.flush()?;
    Ok(())
}

fn write_metadata_and_footer<W: Write>(
    metadata: &FileMetaData,
    sink: &mut TrackedWrite<W>,
) -> Result<()> {
    let start = sink.bytes_written();
    {
        let mut protocol = TCompactOutputProtocol::new(&mut *sink);
        metadata.write_to_out_protocol(&mut protocol)?;
        protocol.flush()?;
    }
    let metadata_len = (sink.bytes_written() - start) as i32;
    sink.write_all(&metadata_len.to_le_bytes())?;
    sink.write_all(PARQUET_MAGIC)?;
    Ok(())
}
