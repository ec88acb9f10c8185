use std::{
    fs::File,
    path::Path,
    string::{String, ToString},
    vec::Vec,
};

use arrow::{
    array::{Array, ArrayRef, AsArray, RecordBatch},
    compute::{CastOptions, can_cast_types, cast_with_options},
    datatypes::{DataType, Float64Type, Int64Type, Schema},
};
use log::{debug, trace};
use ordered_float::OrderedFloat;
use parquet::arrow::{ProjectionMask, arrow_reader::ParquetRecordBatchReaderBuilder};

use super::{
    Error, Result,
    config::{PipelineConfig, TimeOrder},
    frame::{Frame, TimeKeys},
};

/// How the time column is normalized, decided once from the file schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeKind {
    Int,
    /// Types arrow only casts to 64-bit integers through their 32-bit physical value
    Int32,
    Float,
    Text,
}

impl TimeKind {
    fn of(column: &str, data_type: &DataType) -> Result<Self> {
        match data_type {
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Ok(Self::Text),
            DataType::Float16 | DataType::Float32 | DataType::Float64 => Ok(Self::Float),
            DataType::Date32 | DataType::Time32(_) => Ok(Self::Int32),
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Date64
            | DataType::Timestamp(_, _)
            | DataType::Time64(_)
            | DataType::Duration(_) => Ok(Self::Int),
            DataType::Dictionary(_, value) => Self::of(column, value),
            other => Err(Error::UnsupportedType {
                column: column.to_string(),
                data_type: other.clone(),
            }),
        }
    }
}

/// Columns a run reads, resolved against the file schema
#[derive(Debug)]
struct Projection {
    group: String,
    time: Option<(String, TimeKind)>,
    values: Vec<String>,
}

impl Projection {
    fn resolve(schema: &Schema, config: &PipelineConfig) -> Result<Self> {
        let field = |name: &str| {
            schema
                .field_with_name(name)
                .map_err(|_| Error::MissingColumn(name.to_string()))
        };

        let group = field(config.group_column())?;
        if !can_cast_types(group.data_type(), &DataType::Utf8) {
            return Err(Error::UnsupportedType {
                column: group.name().clone(),
                data_type: group.data_type().clone(),
            });
        }

        let time_column = match config.time_order() {
            TimeOrder::Stored => None,
            TimeOrder::Column(name) => Some(field(name)?),
            TimeOrder::ColumnIfPresent(name) => field(name).ok(),
        };
        let time = time_column
            .map(|f| Ok::<_, Error>((f.name().clone(), TimeKind::of(f.name(), f.data_type())?)))
            .transpose()?;

        let expr = config.expr();
        let mut values = Vec::new();
        for name in expr.required_columns() {
            let f = field(name)?;
            if !can_cast_types(f.data_type(), &DataType::Float64) {
                return Err(Error::UnsupportedType {
                    column: name.to_string(),
                    data_type: f.data_type().clone(),
                });
            }
            values.push(name.to_string());
        }

        Ok(Self {
            group: group.name().clone(),
            time,
            values,
        })
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        core::iter::once(self.group.as_str())
            .chain(self.time.as_ref().map(|(name, _)| name.as_str()))
            .chain(self.values.iter().map(String::as_str))
    }
}

/// Strict cast: a value that can not be represented is an error rather than a null
fn cast_column(column: &str, array: &ArrayRef, to: &DataType) -> Result<ArrayRef> {
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    cast_with_options(array, to, &options).map_err(|source| Error::Cast {
        column: column.to_string(),
        from: array.data_type().clone(),
        to: to.clone(),
        source,
    })
}

fn batch_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::MissingColumn(name.to_string()))
}

impl Frame {
    fn append_batch(&mut self, batch: &RecordBatch, projection: &Projection) -> Result<()> {
        let group = batch_column(batch, &projection.group)?;
        let group = cast_column(&projection.group, group, &DataType::Utf8)?;
        group
            .as_string::<i32>()
            .iter()
            .for_each(|label| self.groups.push(label));

        if let Some((name, kind)) = &projection.time {
            let array = batch_column(batch, name)?;
            self.append_time(name, *kind, array)?;
        }

        for name in &projection.values {
            let array = cast_column(name, batch_column(batch, name)?, &DataType::Float64)?;
            self.values
                .entry(name.clone())
                .or_default()
                .extend(array.as_primitive::<Float64Type>().iter());
        }
        Ok(())
    }

    fn append_time(&mut self, name: &str, kind: TimeKind, array: &ArrayRef) -> Result<()> {
        let keys = self.time.get_or_insert_with(|| match kind {
            TimeKind::Int | TimeKind::Int32 => TimeKeys::Int(Vec::new()),
            TimeKind::Float => TimeKeys::Float(Vec::new()),
            TimeKind::Text => TimeKeys::Text(Vec::new()),
        });

        match (kind, keys) {
            (TimeKind::Int, TimeKeys::Int(keys)) => {
                let array = cast_column(name, array, &DataType::Int64)?;
                keys.extend(array.as_primitive::<Int64Type>().iter());
            }
            (TimeKind::Int32, TimeKeys::Int(keys)) => {
                let array = cast_column(name, array, &DataType::Int32)?;
                let array = cast_column(name, &array, &DataType::Int64)?;
                keys.extend(array.as_primitive::<Int64Type>().iter());
            }
            (TimeKind::Float, TimeKeys::Float(keys)) => {
                let array = cast_column(name, array, &DataType::Float64)?;
                keys.extend(
                    array
                        .as_primitive::<Float64Type>()
                        .iter()
                        .map(|v| v.map(OrderedFloat)),
                );
            }
            (TimeKind::Text, TimeKeys::Text(keys)) => {
                let array = cast_column(name, array, &DataType::Utf8)?;
                keys.extend(
                    array
                        .as_string::<i32>()
                        .iter()
                        .map(|v| v.map(str::to_string)),
                );
            }
            _ => {
                return Err(Error::UnsupportedType {
                    column: name.to_string(),
                    data_type: array.data_type().clone(),
                });
            }
        }
        Ok(())
    }
}

/// Streams the dataset at `path` batch by batch into a normalized [`Frame`].
///
/// Only the group, time and value columns the configuration refers to are decoded.
pub(crate) fn load(path: &Path, config: &PipelineConfig) -> Result<Frame> {
    let file = File::open(path).map_err(|source| Error::SourceRead {
        path: path.to_path_buf(),
        source,
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let schema = builder.schema().clone();
    let projection = Projection::resolve(&schema, config)?;
    let indices: Vec<usize> = projection
        .names()
        .filter_map(|name| schema.index_of(name).ok())
        .collect();
    let rows_hint = usize::try_from(builder.metadata().file_metadata().num_rows()).unwrap_or(0);
    debug!(
        "scanning {} ({} rows, columns {:?})",
        path.display(),
        rows_hint,
        projection.names().collect::<Vec<_>>()
    );

    let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
    let reader = builder
        .with_projection(mask)
        .with_batch_size(config.batch_size())
        .build()?;

    let mut frame = Frame::default();
    frame.groups.reserve(rows_hint);
    for name in &projection.values {
        frame.values.insert(name.clone(), Vec::with_capacity(rows_hint));
    }
    for (i, batch) in reader.enumerate() {
        let batch = batch?;
        trace!("batch {i}: {} rows", batch.num_rows());
        frame.append_batch(&batch, &projection)?;
    }

    debug_assert!(
        frame
            .time
            .as_ref()
            .is_none_or(|time| time.len() == frame.num_rows())
    );
    debug!(
        "loaded {} rows in {} groups from {}",
        frame.num_rows(),
        frame.groups.num_groups(),
        path.display()
    );
    Ok(frame)
}
