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

//! Computes Parquet definition and repetition levels for flat and
//! list-nested arrays.
//!
//! The builder walks an array top-down, collecting per-depth validity,
//! list offsets and field nullability, then replays the rows to emit one
//! definition level per logical position and, for nested columns, one
//! repetition level alongside each. It also projects the array's row range
//! through the list offsets so the caller knows which slice of the leaf
//! values to hand to the encoder.
//!
//! Only single-child nesting (lists of lists of ... of a flat leaf) is
//! supported here; anything with sibling children has no unambiguous
//! column path and is rejected.

use arrow_array::cast::AsArray;
use arrow_array::{Array, ArrayRef};
use arrow_buffer::{NullBuffer, OffsetBuffer};
use arrow_schema::{DataType, Field};

use crate::errors::{ParquetError, Result};

/// Level output for one array, plus the slice of the leaf values the
/// encoder should consume.
#[derive(Debug)]
pub(crate) struct ArrayLevels<'a> {
    /// Total number of level positions.
    pub num_levels: usize,
    /// Definition levels, absent for a required flat column. Borrowed from
    /// the caller's scratch buffer; invalidated by the next write.
    pub def_levels: Option<&'a [i16]>,
    /// Repetition levels, present only for list-nested columns.
    pub rep_levels: Option<Vec<i16>>,
    /// Start of the leaf values slice.
    pub values_offset: usize,
    /// Length of the leaf values slice.
    pub num_values: usize,
    /// The leaf values array the offsets refer into.
    pub values: ArrayRef,
}

impl ArrayLevels<'_> {
    pub fn def_levels(&self) -> Option<&[i16]> {
        self.def_levels
    }

    pub fn rep_levels(&self) -> Option<&[i16]> {
        self.rep_levels.as_deref()
    }
}

/// Computes levels for `array` described by `field`, emitting definition
/// levels into `def_scratch`.
pub(crate) fn calculate_array_levels<'a>(
    array: &ArrayRef,
    field: &Field,
    def_scratch: &'a mut Vec<i16>,
) -> Result<ArrayLevels<'a>> {
    LevelBuilder::new(def_scratch).generate(array, field)
}

struct LevelBuilder<'a> {
    defs: &'a mut Vec<i16>,
    reps: Vec<i16>,
    /// Validity bitmap and null count per nesting depth, leaf included.
    nulls: Vec<(Option<NullBuffer>, usize)>,
    /// List offsets per list depth.
    offsets: Vec<OffsetBuffer<i32>>,
    /// Field nullability per nesting depth, leaf included.
    nullable: Vec<bool>,
    min_offset: usize,
    max_offset: usize,
}

impl<'a> LevelBuilder<'a> {
    fn new(def_scratch: &'a mut Vec<i16>) -> Self {
        def_scratch.clear();
        Self {
            defs: def_scratch,
            reps: Vec::new(),
            nulls: Vec::new(),
            offsets: Vec::new(),
            nullable: Vec::new(),
            min_offset: 0,
            max_offset: 0,
        }
    }

    fn generate(mut self, array: &ArrayRef, field: &Field) -> Result<ArrayLevels<'a>> {
        // Work downwards to extract bitmaps and offsets
        self.min_offset = 0;
        self.max_offset = array.len();
        let values = self.visit(array)?;

        // Walk the field in lock-step to extract nullability
        self.nullable.push(field.is_nullable());
        let mut data_type = field.data_type();
        while let DataType::List(child) = data_type {
            self.nullable.push(child.is_nullable());
            data_type = child.data_type();
        }

        if self.nullable.len() != self.nulls.len() {
            return Err(general_err!(
                "Field {} nests {} levels but its array nests {}",
                field.name(),
                self.nullable.len(),
                self.nulls.len()
            ));
        }

        let num_levels;
        if self.nullable.len() == 1 {
            // Flat column: one level per row, no repetition
            num_levels = array.len();
            if self.nullable[0] {
                let (bitmap, null_count) = &self.nulls[0];
                if *null_count == 0 {
                    self.defs.resize(num_levels, 1);
                } else if *null_count == num_levels {
                    // Covers arrays that carry no bitmap at all
                    self.defs.resize(num_levels, 0);
                } else if let Some(bitmap) = bitmap {
                    self.defs.extend(bitmap.iter().map(i16::from));
                }
            }
        } else {
            self.reps.push(0);
            self.handle_list_entries(0, 0, 0, array.len())?;
            num_levels = self.reps.len();
        }

        let LevelBuilder {
            defs,
            reps,
            nullable,
            min_offset,
            max_offset,
            ..
        } = self;
        let defs: &'a [i16] = defs;
        let nested = nullable.len() > 1;
        Ok(ArrayLevels {
            num_levels,
            def_levels: (nested || nullable[0]).then_some(defs),
            rep_levels: nested.then_some(reps),
            values_offset: min_offset,
            num_values: max_offset - min_offset,
            values,
        })
    }

    /// Descends to the leaf, recording validity and offsets per depth and
    /// projecting the row range through each layer of list offsets.
    fn visit(&mut self, array: &ArrayRef) -> Result<ArrayRef> {
        match array.data_type() {
            DataType::List(_) => {
                let list = array.as_list::<i32>();
                self.nulls.push(validity_of(array.as_ref()));
                let offsets = list.offsets().clone();
                // Min offset isn't always zero in the case of sliced arrays
                self.min_offset = offsets[self.min_offset] as usize;
                self.max_offset = offsets[self.max_offset] as usize;
                self.offsets.push(offsets);
                self.visit(list.values())
            }
            DataType::Dictionary(_, _) => Err(nyi_err!(
                "Level generation for {} not supported yet",
                array.data_type()
            )),
            nested if nested.is_nested() => Err(nyi_err!(
                "Level generation for {} not supported yet",
                nested
            )),
            _ => {
                self.nulls.push(validity_of(array.as_ref()));
                Ok(array.clone())
            }
        }
    }

    fn handle_list_entries(
        &mut self,
        def_level: i16,
        rep_level: i16,
        offset: usize,
        length: usize,
    ) -> Result<()> {
        for i in 0..length {
            if i > 0 {
                // The first entry inherits the enclosing repetition
                self.reps.push(rep_level);
            }
            self.handle_list(def_level, rep_level, offset + i)?;
        }
        Ok(())
    }

    fn handle_list(&mut self, def_level: i16, rep_level: i16, index: usize) -> Result<()> {
        let depth = rep_level as usize;
        if self.nullable[depth] {
            if self.is_valid(depth, index) {
                self.handle_non_null_list(def_level + 1, rep_level, index)
            } else {
                self.defs.push(def_level);
                Ok(())
            }
        } else {
            self.handle_non_null_list(def_level, rep_level, index)
        }
    }

    fn handle_non_null_list(
        &mut self,
        def_level: i16,
        rep_level: i16,
        index: usize,
    ) -> Result<()> {
        let depth = rep_level as usize;
        let offsets = &self.offsets[depth];
        let inner_offset = offsets[index] as usize;
        let inner_length = offsets[index + 1] as usize - inner_offset;
        let leaf_depth = depth + 1;

        if inner_length == 0 {
            // Empty-list sentinel
            self.defs.push(def_level);
            return Ok(());
        }
        if leaf_depth < self.offsets.len() {
            return self.handle_list_entries(
                def_level + 1,
                rep_level + 1,
                inner_offset,
                inner_length,
            );
        }

        // Reached the innermost list; its entries repeat at rep_level + 1
        self.reps
            .extend(std::iter::repeat(rep_level + 1).take(inner_length - 1));

        let leaf_nullable = self.nullable[leaf_depth];
        let (leaf_bitmap, leaf_null_count) = &self.nulls[leaf_depth];

        // Whole-leaf-null array without a bitmap
        if *leaf_null_count > 0 && leaf_bitmap.is_none() {
            self.defs
                .extend(std::iter::repeat(def_level + 1).take(inner_length));
            return Ok(());
        }
        for i in 0..inner_length {
            let valid = match leaf_bitmap {
                Some(bitmap) => bitmap.is_valid(inner_offset + i),
                None => true,
            };
            if leaf_nullable && valid {
                self.defs.push(def_level + 2);
            } else {
                // Either a null slot of a nullable leaf (max def level is
                // def_level + 2) or a slot of a non-nullable leaf (max def
                // level is def_level + 1)
                self.defs.push(def_level + 1);
            }
        }
        Ok(())
    }

    fn is_valid(&self, depth: usize, index: usize) -> bool {
        match &self.nulls[depth] {
            (Some(bitmap), _) => bitmap.is_valid(index),
            (None, null_count) => *null_count == 0,
        }
    }
}

/// Validity bitmap and null count of an array's own depth. `Null` arrays
/// carry no bitmap yet every slot is null.
fn validity_of(array: &dyn Array) -> (Option<NullBuffer>, usize) {
    match array.data_type() {
        DataType::Null => (None, array.len()),
        _ => (array.nulls().cloned(), array.null_count()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use arrow_array::{Int32Array, ListArray, NullArray, StructArray};
    use arrow_buffer::ScalarBuffer;
    use arrow_schema::Fields;

    fn levels<'a>(
        array: &ArrayRef,
        field: &Field,
        scratch: &'a mut Vec<i16>,
    ) -> ArrayLevels<'a> {
        calculate_array_levels(array, field, scratch).unwrap()
    }

    fn list_of_ints(
        offsets: Vec<i32>,
        values: Vec<i32>,
        validity: Option<Vec<bool>>,
        item_nullable: bool,
    ) -> ArrayRef {
        let item = Arc::new(Field::new("item", DataType::Int32, item_nullable));
        Arc::new(ListArray::new(
            item,
            OffsetBuffer::new(ScalarBuffer::from(offsets)),
            Arc::new(Int32Array::from(values)),
            validity.map(NullBuffer::from),
        ))
    }

    #[test]
    fn test_required_primitive() {
        let array: ArrayRef = Arc::new(Int32Array::from(vec![10, 20, 30]));
        let field = Field::new("a", DataType::Int32, false);
        let mut scratch = Vec::new();
        let result = levels(&array, &field, &mut scratch);

        assert_eq!(result.num_levels, 3);
        assert_eq!(result.def_levels(), None);
        assert_eq!(result.rep_levels(), None);
        assert_eq!(result.values_offset, 0);
        assert_eq!(result.num_values, 3);
    }

    #[test]
    fn test_nullable_primitive() {
        let array: ArrayRef = Arc::new(Int32Array::from(vec![Some(1), None, Some(3)]));
        let field = Field::new("a", DataType::Int32, true);
        let mut scratch = Vec::new();
        let result = levels(&array, &field, &mut scratch);

        assert_eq!(result.num_levels, 3);
        assert_eq!(result.def_levels(), Some(&[1, 0, 1][..]));
        assert_eq!(result.rep_levels(), None);
        assert_eq!(result.num_values, 3);
    }

    #[test]
    fn test_nullable_primitive_fast_paths() {
        let field = Field::new("a", DataType::Int32, true);
        let mut scratch = Vec::new();

        let all_valid: ArrayRef = Arc::new(Int32Array::from(vec![1, 2, 3, 4]));
        let result = levels(&all_valid, &field, &mut scratch);
        assert_eq!(result.def_levels(), Some(&[1, 1, 1, 1][..]));

        let all_null: ArrayRef =
            Arc::new(Int32Array::from(vec![None::<i32>, None, None]));
        let result = levels(&all_null, &field, &mut scratch);
        assert_eq!(result.def_levels(), Some(&[0, 0, 0][..]));
    }

    #[test]
    fn test_null_array() {
        let array: ArrayRef = Arc::new(NullArray::new(3));
        let field = Field::new("a", DataType::Null, true);
        let mut scratch = Vec::new();
        let result = levels(&array, &field, &mut scratch);

        assert_eq!(result.num_levels, 3);
        assert_eq!(result.def_levels(), Some(&[0, 0, 0][..]));
        assert_eq!(result.rep_levels(), None);
    }

    #[test]
    fn test_sliced_primitive() {
        let array: ArrayRef =
            Arc::new(Int32Array::from(vec![None, Some(2), Some(3), None]));
        let array = array.slice(1, 2);
        let field = Field::new("a", DataType::Int32, true);
        let mut scratch = Vec::new();
        let result = levels(&array, &field, &mut scratch);

        assert_eq!(result.num_levels, 2);
        assert_eq!(result.def_levels(), Some(&[1, 1][..]));
    }

    #[test]
    fn test_list_of_required_ints() {
        // [[1, 2], [], null, [3]]
        let array = list_of_ints(
            vec![0, 2, 2, 2, 3],
            vec![1, 2, 3],
            Some(vec![true, true, false, true]),
            false,
        );
        let field = Field::new(
            "a",
            DataType::List(Arc::new(Field::new("item", DataType::Int32, false))),
            true,
        );
        let mut scratch = Vec::new();
        let result = levels(&array, &field, &mut scratch);

        assert_eq!(result.num_levels, 5);
        assert_eq!(result.def_levels(), Some(&[2, 2, 1, 0, 2][..]));
        assert_eq!(result.rep_levels(), Some(&[0, 1, 0, 0, 0][..]));
        assert_eq!(result.values_offset, 0);
        assert_eq!(result.num_values, 3);
    }

    #[test]
    fn test_list_of_nullable_ints() {
        // [[1, null], null, [3]]
        let item = Arc::new(Field::new("item", DataType::Int32, true));
        let array: ArrayRef = Arc::new(ListArray::new(
            item.clone(),
            OffsetBuffer::new(ScalarBuffer::from(vec![0, 2, 2, 3])),
            Arc::new(Int32Array::from(vec![Some(1), None, Some(3)])),
            Some(NullBuffer::from(vec![true, false, true])),
        ));
        let field = Field::new("a", DataType::List(item), true);
        let mut scratch = Vec::new();
        let result = levels(&array, &field, &mut scratch);

        assert_eq!(result.def_levels(), Some(&[3, 2, 0, 3][..]));
        assert_eq!(result.rep_levels(), Some(&[0, 1, 0, 0][..]));
        assert_eq!(result.num_values, 3);
    }

    #[test]
    fn test_required_list_of_required_ints() {
        // [[1], [2, 3]]
        let array = list_of_ints(vec![0, 1, 3], vec![1, 2, 3], None, false);
        let field = Field::new(
            "a",
            DataType::List(Arc::new(Field::new("item", DataType::Int32, false))),
            false,
        );
        let mut scratch = Vec::new();
        let result = levels(&array, &field, &mut scratch);

        assert_eq!(result.def_levels(), Some(&[1, 1, 1][..]));
        assert_eq!(result.rep_levels(), Some(&[0, 0, 1][..]));
    }

    #[test]
    fn test_sliced_list() {
        // [[1, 2], [3], [4, 5, 6]] sliced to [[3], [4, 5, 6]]
        let array = list_of_ints(
            vec![0, 2, 3, 6],
            vec![1, 2, 3, 4, 5, 6],
            Some(vec![true, true, true]),
            false,
        );
        let array = array.slice(1, 2);
        let field = Field::new(
            "a",
            DataType::List(Arc::new(Field::new("item", DataType::Int32, false))),
            true,
        );
        let mut scratch = Vec::new();
        let result = levels(&array, &field, &mut scratch);

        assert_eq!(result.def_levels(), Some(&[2, 2, 2, 2][..]));
        assert_eq!(result.rep_levels(), Some(&[0, 0, 1, 1][..]));
        assert_eq!(result.values_offset, 2);
        assert_eq!(result.num_values, 4);
    }

    #[test]
    fn test_list_of_list() {
        // [[[1, 2], []], null, [[3]]]
        let leaf = Arc::new(Field::new("item", DataType::Int32, false));
        let inner: ArrayRef = Arc::new(ListArray::new(
            leaf.clone(),
            OffsetBuffer::new(ScalarBuffer::from(vec![0, 2, 2, 3])),
            Arc::new(Int32Array::from(vec![1, 2, 3])),
            None,
        ));
        let inner_field = Arc::new(Field::new("inner", DataType::List(leaf), true));
        let outer: ArrayRef = Arc::new(ListArray::new(
            inner_field.clone(),
            OffsetBuffer::new(ScalarBuffer::from(vec![0, 2, 2, 3])),
            inner,
            Some(NullBuffer::from(vec![true, false, true])),
        ));
        let field = Field::new("a", DataType::List(inner_field), true);
        let mut scratch = Vec::new();
        let result = levels(&outer, &field, &mut scratch);

        assert_eq!(result.num_levels, 5);
        assert_eq!(result.def_levels(), Some(&[4, 4, 3, 0, 4][..]));
        assert_eq!(result.rep_levels(), Some(&[0, 2, 1, 0, 0][..]));
        assert_eq!(result.values_offset, 0);
        assert_eq!(result.num_values, 3);
    }

    #[test]
    fn test_list_of_null_leaf() {
        // Two lists over a leaf that carries no bitmap yet is entirely null
        let item = Arc::new(Field::new("item", DataType::Null, true));
        let array: ArrayRef = Arc::new(ListArray::new(
            item.clone(),
            OffsetBuffer::new(ScalarBuffer::from(vec![0, 2, 3])),
            Arc::new(NullArray::new(3)),
            None,
        ));
        let field = Field::new("a", DataType::List(item), true);
        let mut scratch = Vec::new();
        let result = levels(&array, &field, &mut scratch);

        assert_eq!(result.def_levels(), Some(&[2, 2, 2][..]));
        assert_eq!(result.rep_levels(), Some(&[0, 1, 0][..]));
    }

    #[test]
    fn test_first_repetition_is_zero() {
        let array = list_of_ints(vec![0, 3, 5], vec![1, 2, 3, 4, 5], None, false);
        let field = Field::new(
            "a",
            DataType::List(Arc::new(Field::new("item", DataType::Int32, false))),
            true,
        );
        let mut scratch = Vec::new();
        let result = levels(&array, &field, &mut scratch);
        assert_eq!(result.rep_levels().unwrap()[0], 0);
        assert_eq!(
            result.rep_levels().unwrap().len(),
            result.def_levels().unwrap().len()
        );
    }

    #[test]
    fn test_nesting_depth_mismatch() {
        let array = list_of_ints(vec![0, 1], vec![1], None, false);
        let field = Field::new("a", DataType::Int32, true);
        let mut scratch = Vec::new();
        let err = calculate_array_levels(&array, &field, &mut scratch).unwrap_err();
        assert!(err.to_string().contains("nests"));
    }

    #[test]
    fn test_struct_not_implemented() {
        let inner = Int32Array::from(vec![1, 2]);
        let fields = Fields::from(vec![Field::new("x", DataType::Int32, false)]);
        let array: ArrayRef = Arc::new(StructArray::new(
            fields.clone(),
            vec![Arc::new(inner) as ArrayRef],
            None,
        ));
        let field = Field::new("a", DataType::Struct(fields), false);
        let mut scratch = Vec::new();
        let err = calculate_array_levels(&array, &field, &mut scratch).unwrap_err();
        assert!(matches!(err, ParquetError::NYI(_)));
    }

    #[test]
    fn test_scratch_reuse() {
        let mut scratch = Vec::new();
        let field = Field::new("a", DataType::Int32, true);

        let array: ArrayRef = Arc::new(Int32Array::from(vec![Some(1), None]));
        let result = levels(&array, &field, &mut scratch);
        assert_eq!(result.def_levels(), Some(&[1, 0][..]));

        // A second use must not observe levels of the first
        let array: ArrayRef = Arc::new(Int32Array::from(vec![Some(7)]));
        let result = levels(&array, &field, &mut scratch);
        assert_eq!(result.def_levels(), Some(&[1][..]));
    }
}
