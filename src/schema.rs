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

//! Converts an Arrow schema into a Parquet [`SchemaDescriptor`].
//!
//! The mapping depends on the writer configuration: the Parquet version
//! decides how unsigned 32-bit integers are stored, and the timestamp
//! options decide both the physical type (INT64 vs the deprecated INT96)
//! and the annotated unit. Keeping this conversion next to the batch
//! writers guarantees the declared schema always matches the values the
//! writers produce.

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema, TimeUnit};

use parquet::basic::{
    LogicalType, Repetition, TimeUnit as ParquetTimeUnit, Type as PhysicalType,
};
use parquet::file::properties::{WriterProperties, WriterVersion};
use parquet::schema::types::{SchemaDescriptor, Type, TypePtr};

use crate::errors::{ParquetError, Result};
use crate::properties::ArrowWriterProperties;
use crate::writer::timestamp::{timestamp_target, TimestampTarget};

/// Number of bytes a decimal of the given precision occupies as a
/// big-endian two's complement FIXED_LEN_BYTE_ARRAY.
pub(crate) fn decimal_length_from_precision(precision: u8) -> usize {
    (((10.0_f64.powi(precision as i32)).log2() + 1.0) / 8.0).ceil() as usize
}

/// Converts an Arrow schema into the Parquet schema the writers encode
/// against.
pub(crate) fn arrow_to_parquet_schema(
    schema: &Schema,
    props: &WriterProperties,
    arrow_props: &ArrowWriterProperties,
) -> Result<SchemaDescriptor> {
    let fields = schema
        .fields()
        .iter()
        .map(|field| {
            arrow_to_parquet_type(field, props, arrow_props).map(|t| Arc::new(t) as TypePtr)
        })
        .collect::<Result<Vec<TypePtr>>>()?;
    let group = Type::group_type_builder("arrow_schema")
        .with_fields(fields)
        .build()?;
    Ok(SchemaDescriptor::new(Arc::new(group)))
}

fn arrow_to_parquet_type(
    field: &Field,
    props: &WriterProperties,
    arrow_props: &ArrowWriterProperties,
) -> Result<Type> {
    let name = field.name().as_str();
    let repetition = if field.is_nullable() {
        Repetition::OPTIONAL
    } else {
        Repetition::REQUIRED
    };
    match field.data_type() {
        DataType::Null => Type::primitive_type_builder(name, PhysicalType::INT32)
            .with_logical_type(Some(LogicalType::Unknown))
            .with_repetition(repetition)
            .build(),
        DataType::Boolean => Type::primitive_type_builder(name, PhysicalType::BOOLEAN)
            .with_repetition(repetition)
            .build(),
        DataType::Int8 => Type::primitive_type_builder(name, PhysicalType::INT32)
            .with_logical_type(Some(LogicalType::Integer {
                bit_width: 8,
                is_signed: true,
            }))
            .with_repetition(repetition)
            .build(),
        DataType::Int16 => Type::primitive_type_builder(name, PhysicalType::INT32)
            .with_logical_type(Some(LogicalType::Integer {
                bit_width: 16,
                is_signed: true,
            }))
            .with_repetition(repetition)
            .build(),
        DataType::Int32 => Type::primitive_type_builder(name, PhysicalType::INT32)
            .with_repetition(repetition)
            .build(),
        DataType::Int64 => Type::primitive_type_builder(name, PhysicalType::INT64)
            .with_repetition(repetition)
            .build(),
        DataType::UInt8 => Type::primitive_type_builder(name, PhysicalType::INT32)
            .with_logical_type(Some(LogicalType::Integer {
                bit_width: 8,
                is_signed: false,
            }))
            .with_repetition(repetition)
            .build(),
        DataType::UInt16 => Type::primitive_type_builder(name, PhysicalType::INT32)
            .with_logical_type(Some(LogicalType::Integer {
                bit_width: 16,
                is_signed: false,
            }))
            .with_repetition(repetition)
            .build(),
        DataType::UInt32 => {
            // Readers of 1.0 files may not understand the unsigned 32-bit
            // annotation, so the values are widened to INT64 instead.
            if props.writer_version() == WriterVersion::PARQUET_1_0 {
                Type::primitive_type_builder(name, PhysicalType::INT64)
                    .with_repetition(repetition)
                    .build()
            } else {
                Type::primitive_type_builder(name, PhysicalType::INT32)
                    .with_logical_type(Some(LogicalType::Integer {
                        bit_width: 32,
                        is_signed: false,
                    }))
                    .with_repetition(repetition)
                    .build()
            }
        }
        DataType::UInt64 => Type::primitive_type_builder(name, PhysicalType::INT64)
            .with_logical_type(Some(LogicalType::Integer {
                bit_width: 64,
                is_signed: false,
            }))
            .with_repetition(repetition)
            .build(),
        DataType::Float32 => Type::primitive_type_builder(name, PhysicalType::FLOAT)
            .with_repetition(repetition)
            .build(),
        DataType::Float64 => Type::primitive_type_builder(name, PhysicalType::DOUBLE)
            .with_repetition(repetition)
            .build(),
        DataType::Timestamp(unit, tz) => {
            match timestamp_target(*unit, props.writer_version(), arrow_props)? {
                (TimestampTarget::Int96, _) => {
                    Type::primitive_type_builder(name, PhysicalType::INT96)
                        .with_repetition(repetition)
                        .build()
                }
                (TimestampTarget::Int64(target), _) => {
                    Type::primitive_type_builder(name, PhysicalType::INT64)
                        .with_logical_type(Some(LogicalType::Timestamp {
                            // A timezone means values are normalized to UTC
                            is_adjusted_to_u_t_c: matches!(tz, Some(z) if !z.as_ref().is_empty()),
                            unit: match target {
                                TimeUnit::Millisecond => {
                                    ParquetTimeUnit::MILLIS(Default::default())
                                }
                                TimeUnit::Microsecond => {
                                    ParquetTimeUnit::MICROS(Default::default())
                                }
                                TimeUnit::Nanosecond => {
                                    ParquetTimeUnit::NANOS(Default::default())
                                }
                                TimeUnit::Second => unreachable!(),
                            },
                        }))
                        .with_repetition(repetition)
                        .build()
                }
            }
        }
        DataType::Date32 => Type::primitive_type_builder(name, PhysicalType::INT32)
            .with_logical_type(Some(LogicalType::Date))
            .with_repetition(repetition)
            .build(),
        // Stored as days, the batch writer divides the millisecond values
        DataType::Date64 => Type::primitive_type_builder(name, PhysicalType::INT32)
            .with_logical_type(Some(LogicalType::Date))
            .with_repetition(repetition)
            .build(),
        // Seconds cannot be annotated; the batch writer scales to millis
        DataType::Time32(_) => Type::primitive_type_builder(name, PhysicalType::INT32)
            .with_logical_type(Some(LogicalType::Time {
                is_adjusted_to_u_t_c: false,
                unit: ParquetTimeUnit::MILLIS(Default::default()),
            }))
            .with_repetition(repetition)
            .build(),
        DataType::Time64(unit) => Type::primitive_type_builder(name, PhysicalType::INT64)
            .with_logical_type(Some(LogicalType::Time {
                is_adjusted_to_u_t_c: false,
                unit: match unit {
                    TimeUnit::Microsecond => ParquetTimeUnit::MICROS(Default::default()),
                    TimeUnit::Nanosecond => ParquetTimeUnit::NANOS(Default::default()),
                    u => {
                        return Err(general_err!("Invalid unit for Time64: {:?}", u));
                    }
                },
            }))
            .with_repetition(repetition)
            .build(),
        DataType::Binary => Type::primitive_type_builder(name, PhysicalType::BYTE_ARRAY)
            .with_repetition(repetition)
            .build(),
        DataType::Utf8 => Type::primitive_type_builder(name, PhysicalType::BYTE_ARRAY)
            .with_logical_type(Some(LogicalType::String))
            .with_repetition(repetition)
            .build(),
        DataType::FixedSizeBinary(length) => {
            Type::primitive_type_builder(name, PhysicalType::FIXED_LEN_BYTE_ARRAY)
                .with_repetition(repetition)
                .with_length(*length)
                .build()
        }
        DataType::Decimal128(precision, scale) => {
            Type::primitive_type_builder(name, PhysicalType::FIXED_LEN_BYTE_ARRAY)
                .with_repetition(repetition)
                .with_length(decimal_length_from_precision(*precision) as i32)
                .with_logical_type(Some(LogicalType::Decimal {
                    scale: *scale as i32,
                    precision: *precision as i32,
                }))
                .with_precision(*precision as i32)
                .with_scale(*scale as i32)
                .build()
        }
        DataType::List(child) => {
            let element = arrow_to_parquet_type(child, props, arrow_props)?;
            Type::group_type_builder(name)
                .with_logical_type(Some(LogicalType::List))
                .with_repetition(repetition)
                .with_fields(vec![Arc::new(
                    Type::group_type_builder("list")
                        .with_repetition(Repetition::REPEATED)
                        .with_fields(vec![Arc::new(element)])
                        .build()?,
                )])
                .build()
        }
        DataType::Dictionary(_, value_type) => {
            // Dictionary columns are eagerly decoded before writing, so the
            // schema is that of the value type.
            let value_field =
                Field::new(name, value_type.as_ref().clone(), field.is_nullable());
            arrow_to_parquet_type(&value_field, props, arrow_props)
        }
        other => Err(nyi_err!(
            "Attempting to write an Arrow type {} to parquet that is not yet implemented",
            other
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use arrow_schema::Fields;
    use parquet::basic::ConvertedType;

    fn convert(field: Field) -> SchemaDescriptor {
        try_convert(field).unwrap()
    }

    fn try_convert(field: Field) -> Result<SchemaDescriptor> {
        let schema = Schema::new(vec![field]);
        arrow_to_parquet_schema(
            &schema,
            &WriterProperties::builder().build(),
            &ArrowWriterProperties::default(),
        )
    }

    #[test]
    fn test_decimal_length_from_precision() {
        assert_eq!(decimal_length_from_precision(1), 1);
        assert_eq!(decimal_length_from_precision(5), 3);
        assert_eq!(decimal_length_from_precision(10), 5);
        assert_eq!(decimal_length_from_precision(18), 8);
        assert_eq!(decimal_length_from_precision(38), 16);
    }

    #[test]
    fn test_primitive_types() {
        let descr = convert(Field::new("a", DataType::Int32, false));
        let column = descr.column(0);
        assert_eq!(column.physical_type(), PhysicalType::INT32);
        assert_eq!(column.max_def_level(), 0);
        assert_eq!(column.max_rep_level(), 0);

        let descr = convert(Field::new("a", DataType::Int16, true));
        let column = descr.column(0);
        assert_eq!(column.physical_type(), PhysicalType::INT32);
        assert_eq!(column.converted_type(), ConvertedType::INT_16);
        assert_eq!(column.max_def_level(), 1);

        let descr = convert(Field::new("a", DataType::Float64, true));
        assert_eq!(descr.column(0).physical_type(), PhysicalType::DOUBLE);
    }

    #[test]
    fn test_date_and_time_types() {
        let descr = convert(Field::new("a", DataType::Date64, true));
        let column = descr.column(0);
        assert_eq!(column.physical_type(), PhysicalType::INT32);
        assert_eq!(column.converted_type(), ConvertedType::DATE);

        let descr = convert(Field::new("a", DataType::Time32(TimeUnit::Second), true));
        let column = descr.column(0);
        assert_eq!(column.physical_type(), PhysicalType::INT32);
        assert_eq!(column.converted_type(), ConvertedType::TIME_MILLIS);

        let descr = convert(Field::new("a", DataType::Time64(TimeUnit::Nanosecond), true));
        assert_eq!(descr.column(0).physical_type(), PhysicalType::INT64);
    }

    #[test]
    fn test_uint32_depends_on_version() {
        let schema = Schema::new(vec![Field::new("a", DataType::UInt32, false)]);

        let v1 = arrow_to_parquet_schema(
            &schema,
            &WriterProperties::builder()
                .set_writer_version(WriterVersion::PARQUET_1_0)
                .build(),
            &ArrowWriterProperties::default(),
        )
        .unwrap();
        assert_eq!(v1.column(0).physical_type(), PhysicalType::INT64);

        let v2 = arrow_to_parquet_schema(
            &schema,
            &WriterProperties::builder()
                .set_writer_version(WriterVersion::PARQUET_2_0)
                .build(),
            &ArrowWriterProperties::default(),
        )
        .unwrap();
        let column = v2.column(0);
        assert_eq!(column.physical_type(), PhysicalType::INT32);
        assert_eq!(column.converted_type(), ConvertedType::UINT_32);
    }

    #[test]
    fn test_timestamp_units() {
        // Seconds always coerce to milliseconds
        let descr = convert(Field::new(
            "a",
            DataType::Timestamp(TimeUnit::Second, None),
            true,
        ));
        let column = descr.column(0);
        assert_eq!(column.physical_type(), PhysicalType::INT64);
        assert_eq!(column.converted_type(), ConvertedType::TIMESTAMP_MILLIS);

        // Nanoseconds on 1.0 files coerce to microseconds
        let schema = Schema::new(vec![Field::new(
            "a",
            DataType::Timestamp(TimeUnit::Nanosecond, None),
            true,
        )]);
        let descr = arrow_to_parquet_schema(
            &schema,
            &WriterProperties::builder()
                .set_writer_version(WriterVersion::PARQUET_1_0)
                .build(),
            &ArrowWriterProperties::default(),
        )
        .unwrap();
        assert_eq!(
            descr.column(0).converted_type(),
            ConvertedType::TIMESTAMP_MICROS
        );
    }

    #[test]
    fn test_timestamp_int96() {
        let schema = Schema::new(vec![Field::new(
            "a",
            DataType::Timestamp(TimeUnit::Millisecond, None),
            true,
        )]);
        let descr = arrow_to_parquet_schema(
            &schema,
            &WriterProperties::builder().build(),
            &ArrowWriterProperties::builder()
                .set_deprecated_int96_timestamps(true)
                .build(),
        )
        .unwrap();
        assert_eq!(descr.column(0).physical_type(), PhysicalType::INT96);
    }

    #[test]
    fn test_coerce_to_seconds_rejected() {
        let schema = Schema::new(vec![Field::new(
            "a",
            DataType::Timestamp(TimeUnit::Millisecond, None),
            true,
        )]);
        let err = arrow_to_parquet_schema(
            &schema,
            &WriterProperties::builder().build(),
            &ArrowWriterProperties::builder()
                .set_coerce_timestamps(TimeUnit::Second)
                .build(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("milliseconds, microseconds"));
    }

    #[test]
    fn test_decimal_is_fixed_len_byte_array() {
        let descr = convert(Field::new("a", DataType::Decimal128(10, 2), false));
        let column = descr.column(0);
        assert_eq!(
            column.physical_type(),
            PhysicalType::FIXED_LEN_BYTE_ARRAY
        );
        assert_eq!(column.type_length(), 5);

        let descr = convert(Field::new("a", DataType::Decimal128(5, 2), false));
        assert_eq!(descr.column(0).type_length(), 3);
    }

    #[test]
    fn test_list_levels() {
        // Nullable list of a non-nullable leaf
        let descr = convert(Field::new(
            "a",
            DataType::List(Arc::new(Field::new("item", DataType::Int32, false))),
            true,
        ));
        let column = descr.column(0);
        assert_eq!(column.physical_type(), PhysicalType::INT32);
        assert_eq!(column.max_def_level(), 2);
        assert_eq!(column.max_rep_level(), 1);

        // Both nullable
        let descr = convert(Field::new(
            "a",
            DataType::List(Arc::new(Field::new("item", DataType::Int32, true))),
            true,
        ));
        let column = descr.column(0);
        assert_eq!(column.max_def_level(), 3);
        assert_eq!(column.max_rep_level(), 1);

        // List of list
        let inner = Field::new("inner", DataType::Int64, true);
        let mid = Field::new("mid", DataType::List(Arc::new(inner)), true);
        let descr = convert(Field::new("a", DataType::List(Arc::new(mid)), true));
        let column = descr.column(0);
        assert_eq!(column.max_def_level(), 5);
        assert_eq!(column.max_rep_level(), 2);
    }

    #[test]
    fn test_dictionary_uses_value_type() {
        let descr = convert(Field::new(
            "a",
            DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8)),
            true,
        ));
        let column = descr.column(0);
        assert_eq!(column.physical_type(), PhysicalType::BYTE_ARRAY);
        assert_eq!(column.converted_type(), ConvertedType::UTF8);
    }

    #[test]
    fn test_unsupported_types() {
        let err = try_convert(Field::new(
            "a",
            DataType::Struct(Fields::from(vec![
                Field::new("x", DataType::Int32, false),
                Field::new("y", DataType::Int32, false),
            ])),
            false,
        ))
        .unwrap_err();
        assert!(matches!(err, ParquetError::NYI(_)));

        let err = try_convert(Field::new("a", DataType::LargeUtf8, false)).unwrap_err();
        assert!(matches!(err, ParquetError::NYI(_)));
    }
}
