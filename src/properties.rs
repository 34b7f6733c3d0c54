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

//! Arrow-specific writer properties, layered on top of
//! [`WriterProperties`](parquet::file::properties::WriterProperties).

use arrow_schema::TimeUnit;

/// Options controlling how Arrow timestamp columns are stored.
///
/// These complement the format-level `WriterProperties`: the Parquet
/// version and row group limits come from there, while the unit coercion
/// and the deprecated INT96 encoding are decided here.
///
/// # Example
///
/// ```
/// # use arrow_schema::TimeUnit;
/// # use parquet_table_writer::ArrowWriterProperties;
/// let props = ArrowWriterProperties::builder()
///     .set_coerce_timestamps(TimeUnit::Millisecond)
///     .set_allow_truncated_timestamps(true)
///     .build();
/// assert_eq!(props.coerce_timestamps(), Some(TimeUnit::Millisecond));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrowWriterProperties {
    coerce_timestamps: Option<TimeUnit>,
    allow_truncated_timestamps: bool,
    deprecated_int96_timestamps: bool,
}

impl ArrowWriterProperties {
    /// Returns a new builder with default values.
    pub fn builder() -> ArrowWriterPropertiesBuilder {
        ArrowWriterPropertiesBuilder::default()
    }

    /// Unit every timestamp column is coerced to, if any.
    pub fn coerce_timestamps(&self) -> Option<TimeUnit> {
        self.coerce_timestamps
    }

    /// Whether a coercion that divides may silently drop sub-unit precision.
    pub fn allow_truncated_timestamps(&self) -> bool {
        self.allow_truncated_timestamps
    }

    /// Whether timestamps are written as INT96 in the deprecated Impala
    /// layout instead of as INT64.
    pub fn deprecated_int96_timestamps(&self) -> bool {
        self.deprecated_int96_timestamps
    }
}

impl Default for ArrowWriterProperties {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ArrowWriterProperties`].
#[derive(Debug, Clone)]
pub struct ArrowWriterPropertiesBuilder {
    coerce_timestamps: Option<TimeUnit>,
    allow_truncated_timestamps: bool,
    deprecated_int96_timestamps: bool,
}

impl Default for ArrowWriterPropertiesBuilder {
    fn default() -> Self {
        Self {
            coerce_timestamps: None,
            allow_truncated_timestamps: false,
            deprecated_int96_timestamps: false,
        }
    }
}

impl ArrowWriterPropertiesBuilder {
    /// Coerce all timestamp columns to the given unit. Milliseconds,
    /// microseconds and nanoseconds are valid targets; seconds are rejected
    /// when the file is opened.
    pub fn set_coerce_timestamps(mut self, unit: TimeUnit) -> Self {
        self.coerce_timestamps = Some(unit);
        self
    }

    /// Allow division-based coercions to discard sub-unit precision instead
    /// of failing on the first lossy value.
    pub fn set_allow_truncated_timestamps(mut self, allow: bool) -> Self {
        self.allow_truncated_timestamps = allow;
        self
    }

    /// Write timestamps as deprecated INT96 (Julian day + nanoseconds of
    /// day), for readers that predate INT64 timestamps.
    pub fn set_deprecated_int96_timestamps(mut self, enabled: bool) -> Self {
        self.deprecated_int96_timestamps = enabled;
        self
    }

    /// Finalizes the builder.
    pub fn build(self) -> ArrowWriterProperties {
        ArrowWriterProperties {
            coerce_timestamps: self.coerce_timestamps,
            allow_truncated_timestamps: self.allow_truncated_timestamps,
            deprecated_int96_timestamps: self.deprecated_int96_timestamps,
        }
    }
}
