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

//! Timestamp storage decisions: which physical representation a timestamp
//! column gets, how values move between units, and the deprecated INT96
//! encoding.

use arrow_schema::TimeUnit;

use parquet::data_type::Int96;
use parquet::file::properties::WriterVersion;

use crate::errors::{ParquetError, Result};
use crate::properties::ArrowWriterProperties;

/// Physical representation chosen for a timestamp column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimestampTarget {
    /// Deprecated Impala layout: Julian day + nanoseconds of day.
    Int96,
    /// INT64 in the given unit.
    Int64(TimeUnit),
}

/// Decides how a timestamp column of `source` unit is stored, returning the
/// target representation and whether a lossy division is permitted.
///
/// The same decision feeds the schema converter and the batch writer, so
/// the annotated unit always matches the written values.
pub(crate) fn timestamp_target(
    source: TimeUnit,
    version: WriterVersion,
    props: &ArrowWriterProperties,
) -> Result<(TimestampTarget, bool)> {
    if props.deprecated_int96_timestamps() {
        return Ok((TimestampTarget::Int96, true));
    }
    if let Some(target) = props.coerce_timestamps() {
        if target == TimeUnit::Second {
            return Err(general_err!(
                "Can only coerce timestamps to milliseconds, microseconds or nanoseconds"
            ));
        }
        return Ok((
            TimestampTarget::Int64(target),
            props.allow_truncated_timestamps(),
        ));
    }
    if version == WriterVersion::PARQUET_1_0 && source == TimeUnit::Nanosecond {
        // 1.0 readers have no nanosecond annotation; microseconds are the
        // finest unit they understand, and silent truncation is refused
        return Ok((TimestampTarget::Int64(TimeUnit::Microsecond), false));
    }
    if source == TimeUnit::Second {
        // Seconds cannot be annotated at all; widen to milliseconds
        return Ok((TimestampTarget::Int64(TimeUnit::Millisecond), true));
    }
    Ok((TimestampTarget::Int64(source), true))
}

/// A unit conversion: multiply for widenings, divide for narrowings.
#[derive(Debug, Clone, Copy)]
enum Factor {
    Multiply(i64),
    Divide(i64),
}

/// Converts timestamp values from one unit to another, failing on values
/// that a division would truncate unless truncation was allowed.
#[derive(Debug)]
pub(crate) struct TimestampCoercer {
    source: TimeUnit,
    target: TimeUnit,
    factor: Factor,
    truncation_allowed: bool,
}

impl TimestampCoercer {
    pub(crate) fn new(
        source: TimeUnit,
        target: TimeUnit,
        truncation_allowed: bool,
    ) -> Result<Self> {
        use TimeUnit::*;
        let factor = match (source, target) {
            (_, Second) => {
                return Err(general_err!(
                    "Can only coerce timestamps to milliseconds, microseconds or nanoseconds"
                ));
            }
            (Second, Millisecond) => Factor::Multiply(1_000),
            (Second, Microsecond) => Factor::Multiply(1_000_000),
            (Second, Nanosecond) => Factor::Multiply(1_000_000_000),
            (Millisecond, Millisecond) => Factor::Multiply(1),
            (Millisecond, Microsecond) => Factor::Multiply(1_000),
            (Millisecond, Nanosecond) => Factor::Multiply(1_000_000),
            (Microsecond, Millisecond) => Factor::Divide(1_000),
            (Microsecond, Microsecond) => Factor::Multiply(1),
            (Microsecond, Nanosecond) => Factor::Multiply(1_000),
            (Nanosecond, Millisecond) => Factor::Divide(1_000_000),
            (Nanosecond, Microsecond) => Factor::Divide(1_000),
            (Nanosecond, Nanosecond) => Factor::Multiply(1),
        };
        Ok(Self {
            source,
            target,
            factor,
            truncation_allowed,
        })
    }

    pub(crate) fn coerce(&self, value: i64) -> Result<i64> {
        match self.factor {
            Factor::Multiply(factor) => Ok(value * factor),
            Factor::Divide(factor) => {
                if !self.truncation_allowed && value % factor != 0 {
                    return Err(general_err!(
                        "Casting from timestamp[{}] to timestamp[{}] would lose data: {}",
                        unit_repr(self.source),
                        unit_repr(self.target),
                        value
                    ));
                }
                Ok(value / factor)
            }
        }
    }
}

fn unit_repr(unit: TimeUnit) -> &'static str {
    match unit {
        TimeUnit::Second => "s",
        TimeUnit::Millisecond => "ms",
        TimeUnit::Microsecond => "us",
        TimeUnit::Nanosecond => "ns",
    }
}

// ----------------------------------------------------------------------
// Deprecated INT96 timestamps, in the Impala convention

const JULIAN_DAY_OF_EPOCH: i64 = 2_440_588;
const SECONDS_IN_DAY: i64 = 86_400;
const MILLIS_IN_DAY: i64 = SECONDS_IN_DAY * 1_000;
const MICROS_IN_DAY: i64 = MILLIS_IN_DAY * 1_000;
const NANOS_IN_DAY: i64 = MICROS_IN_DAY * 1_000;

/// Encodes a timestamp of the given unit as an INT96 Julian day plus
/// nanoseconds of day.
pub(crate) fn to_impala_timestamp(value: i64, unit: TimeUnit) -> Int96 {
    let (days, nanos_of_day) = match unit {
        TimeUnit::Second => (
            value / SECONDS_IN_DAY,
            (value % SECONDS_IN_DAY) * 1_000_000_000,
        ),
        TimeUnit::Millisecond => (value / MILLIS_IN_DAY, (value % MILLIS_IN_DAY) * 1_000_000),
        TimeUnit::Microsecond => (value / MICROS_IN_DAY, (value % MICROS_IN_DAY) * 1_000),
        TimeUnit::Nanosecond => (value / NANOS_IN_DAY, value % NANOS_IN_DAY),
    };
    let julian_day = (days + JULIAN_DAY_OF_EPOCH) as u32;
    let nanos = nanos_of_day as u64;
    let mut encoded = Int96::new();
    encoded.set_data(nanos as u32, (nanos >> 32) as u32, julian_day);
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> ArrowWriterProperties {
        ArrowWriterProperties::default()
    }

    #[test]
    fn test_int96_takes_precedence() {
        let props = ArrowWriterProperties::builder()
            .set_deprecated_int96_timestamps(true)
            .set_coerce_timestamps(TimeUnit::Millisecond)
            .build();
        let (target, _) =
            timestamp_target(TimeUnit::Nanosecond, WriterVersion::PARQUET_1_0, &props)
                .unwrap();
        assert_eq!(target, TimestampTarget::Int96);
    }

    #[test]
    fn test_explicit_coercion() {
        let props = ArrowWriterProperties::builder()
            .set_coerce_timestamps(TimeUnit::Microsecond)
            .build();
        let (target, truncation_allowed) =
            timestamp_target(TimeUnit::Nanosecond, WriterVersion::PARQUET_2_0, &props)
                .unwrap();
        assert_eq!(target, TimestampTarget::Int64(TimeUnit::Microsecond));
        assert!(!truncation_allowed);

        let props = ArrowWriterProperties::builder()
            .set_coerce_timestamps(TimeUnit::Microsecond)
            .set_allow_truncated_timestamps(true)
            .build();
        let (_, truncation_allowed) =
            timestamp_target(TimeUnit::Nanosecond, WriterVersion::PARQUET_2_0, &props)
                .unwrap();
        assert!(truncation_allowed);
    }

    #[test]
    fn test_version_driven_coercion() {
        // Nanoseconds on 1.0: forced to microseconds, truncation refused
        let (target, truncation_allowed) =
            timestamp_target(TimeUnit::Nanosecond, WriterVersion::PARQUET_1_0, &props())
                .unwrap();
        assert_eq!(target, TimestampTarget::Int64(TimeUnit::Microsecond));
        assert!(!truncation_allowed);

        // Nanoseconds on 2.0: stored as-is
        let (target, _) =
            timestamp_target(TimeUnit::Nanosecond, WriterVersion::PARQUET_2_0, &props())
                .unwrap();
        assert_eq!(target, TimestampTarget::Int64(TimeUnit::Nanosecond));

        // Seconds always widen to milliseconds
        let (target, truncation_allowed) =
            timestamp_target(TimeUnit::Second, WriterVersion::PARQUET_2_0, &props())
                .unwrap();
        assert_eq!(target, TimestampTarget::Int64(TimeUnit::Millisecond));
        assert!(truncation_allowed);
    }

    #[test]
    fn test_seconds_target_rejected() {
        let props = ArrowWriterProperties::builder()
            .set_coerce_timestamps(TimeUnit::Second)
            .build();
        let err = timestamp_target(TimeUnit::Millisecond, WriterVersion::PARQUET_2_0, &props)
            .unwrap_err();
        assert!(err.to_string().contains("milliseconds"));

        let err =
            TimestampCoercer::new(TimeUnit::Millisecond, TimeUnit::Second, true).unwrap_err();
        assert!(err.to_string().contains("milliseconds"));
    }

    #[test]
    fn test_multiplying_coercions() {
        let coercer =
            TimestampCoercer::new(TimeUnit::Second, TimeUnit::Nanosecond, false).unwrap();
        assert_eq!(coercer.coerce(3).unwrap(), 3_000_000_000);

        let coercer =
            TimestampCoercer::new(TimeUnit::Millisecond, TimeUnit::Microsecond, false).unwrap();
        assert_eq!(coercer.coerce(-7).unwrap(), -7_000);

        let coercer =
            TimestampCoercer::new(TimeUnit::Microsecond, TimeUnit::Microsecond, false).unwrap();
        assert_eq!(coercer.coerce(42).unwrap(), 42);
    }

    #[test]
    fn test_dividing_coercion_checks_remainder() {
        let coercer =
            TimestampCoercer::new(TimeUnit::Nanosecond, TimeUnit::Microsecond, false).unwrap();
        assert_eq!(coercer.coerce(1_500_000_000).unwrap(), 1_500_000);

        let err = coercer.coerce(1_500_000_999).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("would lose data"));
        assert!(message.contains("1500000999"));

        let lossy =
            TimestampCoercer::new(TimeUnit::Nanosecond, TimeUnit::Microsecond, true).unwrap();
        assert_eq!(lossy.coerce(1_500_000_999).unwrap(), 1_500_000);
    }

    #[test]
    fn test_impala_timestamps() {
        // Epoch in every unit is day 2440588, zero nanoseconds
        for unit in [
            TimeUnit::Second,
            TimeUnit::Millisecond,
            TimeUnit::Microsecond,
            TimeUnit::Nanosecond,
        ] {
            let encoded = to_impala_timestamp(0, unit);
            assert_eq!(encoded.data(), &[0, 0, 2_440_588]);
        }

        // One day plus one second
        let encoded = to_impala_timestamp(SECONDS_IN_DAY + 1, TimeUnit::Second);
        assert_eq!(encoded.data()[2], 2_440_589);
        let nanos = encoded.data()[0] as u64 | ((encoded.data()[1] as u64) << 32);
        assert_eq!(nanos, 1_000_000_000);

        // Sub-second units survive
        let encoded = to_impala_timestamp(1_500, TimeUnit::Millisecond);
        let nanos = encoded.data()[0] as u64 | ((encoded.data()[1] as u64) << 32);
        assert_eq!(nanos, 1_500_000_000);
        assert_eq!(encoded.data()[2], 2_440_588);
    }
}
