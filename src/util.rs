use chrono_tz::Tz;
use log::{debug, info};

use crate::errors::{DashboardError, Result};

// 时区解析工具
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| DashboardError::TimezoneError(format!("{}: {}", name, e)))
}

/// Split a comma separated symbol list, upper-cased, blanks and repeats dropped.
pub fn parse_symbol_list(s: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for symbol in s.split(',').map(|p| p.trim().to_uppercase()) {
        if !symbol.is_empty() && !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    debug!("Parsed {} symbols", symbols.len());
    symbols
}

// Arrow数据转换工具
pub mod arrow_utils {
    use super::*;
    use crate::models::bar::{zoned, IndicatorColumn, NormalizedRow, NormalizedTable};
    use arrow::array::{ArrayRef, Float64Array, Int64Array, TimestampMillisecondArray};
    use arrow_schema::{DataType, Field, Schema, TimeUnit};
    use arrow::ipc::reader::FileReader;
    use arrow::ipc::writer::FileWriter;
    use arrow::record_batch::RecordBatch;
    use arrow_array::Array;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use std::fs::File;
    use std::path::Path;
    use std::sync::Arc;

    const PRICE_COLUMNS: [&str; 4] = ["Open", "High", "Low", "Close"];
    const VOLUME_COLUMN: &str = "Volume";
    const SYMBOL_KEY: &str = "symbol";

    fn downcast<'a, T: 'static>(batch: &'a RecordBatch, idx: usize) -> Result<&'a T> {
        batch
            .column(idx)
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| {
                DashboardError::ArrowError(format!(
                    "Unexpected type for column {}", batch.schema().field(idx).name()
                ))
            })
    }

    // 将归一化表转换为Arrow记录批次
    pub fn table_to_record_batch(table: &NormalizedTable) -> Result<RecordBatch> {
        let rows = table.rows();
        let tz_name = table.timezone().name();

        let mut fields = vec![Field::new(
            NormalizedTable::DATETIME_COLUMN,
            DataType::Timestamp(TimeUnit::Millisecond, Some(tz_name.into())),
            false,
        )];
        let mut arrays: Vec<ArrayRef> = vec![Arc::new(
            TimestampMillisecondArray::from(
                rows.iter().map(|r| r.datetime.timestamp_millis()).collect::<Vec<_>>(),
            )
            .with_timezone(tz_name),
        )];

        let pickers: [fn(&NormalizedRow) -> f64; 4] = [
            |r: &NormalizedRow| r.open,
            |r: &NormalizedRow| r.high,
            |r: &NormalizedRow| r.low,
            |r: &NormalizedRow| r.close,
        ];
        for (name, pick) in PRICE_COLUMNS.iter().zip(pickers) {
            fields.push(Field::new(*name, DataType::Float64, false));
            arrays.push(Arc::new(Float64Array::from(
                rows.iter().map(pick).collect::<Vec<_>>(),
            )));
        }

        fields.push(Field::new(VOLUME_COLUMN, DataType::Int64, false));
        arrays.push(Arc::new(Int64Array::from(
            rows.iter().map(|r| r.volume).collect::<Vec<_>>(),
        )));

        // 指标列允许为空
        for column in table.columns() {
            fields.push(Field::new(&column.name, DataType::Float64, true));
            arrays.push(Arc::new(Float64Array::from(column.values.clone())));
        }

        let metadata = HashMap::from([(SYMBOL_KEY.to_string(), table.symbol().to_string())]);
        let schema = Schema::new(fields).with_metadata(metadata);

        Ok(RecordBatch::try_new(Arc::new(schema), arrays)?)
    }

    // 将归一化表保存到Arrow文件
    pub fn save_table_to_arrow(table: &NormalizedTable, path: &str) -> Result<()> {
        info!(
            "Saving {} rows and {} indicator columns for {} to {}",
            table.len(),
            table.columns().len(),
            table.symbol(),
            path
        );

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let batch = table_to_record_batch(table)?;
        let file = File::create(path)?;
        let mut writer = FileWriter::try_new(file, &batch.schema())?;
        writer.write(&batch)?;
        writer.finish()?;

        Ok(())
    }

    // 从Arrow文件读取归一化表
    pub fn read_table_from_arrow(path: &str) -> Result<NormalizedTable> {
        let file = File::open(path)?;
        let reader = FileReader::try_new(file, None)?;
        let schema = reader.schema();

        if schema.fields().len() < 6 {
            return Err(DashboardError::ArrowError(format!(
                "Expected at least 6 columns in {}, found {}", path, schema.fields().len()
            )));
        }

        let timezone = match schema.field(0).data_type() {
            DataType::Timestamp(TimeUnit::Millisecond, Some(tz)) => parse_timezone(tz)?,
            DataType::Timestamp(TimeUnit::Millisecond, None) => Tz::UTC,
            other => {
                return Err(DashboardError::ArrowError(format!(
                    "Unsupported datetime column type {:?}", other
                )))
            }
        };
        let symbol = schema.metadata().get(SYMBOL_KEY).cloned().unwrap_or_default();

        let mut rows = Vec::new();
        let mut indicator_values: Vec<(String, Vec<Option<f64>>)> = schema
            .fields()
            .iter()
            .skip(6)
            .map(|f| (f.name().clone(), Vec::new()))
            .collect();

        for batch in reader {
            let batch = batch?;
            let datetimes = downcast::<TimestampMillisecondArray>(&batch, 0)?;
            let open = downcast::<Float64Array>(&batch, 1)?;
            let high = downcast::<Float64Array>(&batch, 2)?;
            let low = downcast::<Float64Array>(&batch, 3)?;
            let close = downcast::<Float64Array>(&batch, 4)?;
            let volume = downcast::<Int64Array>(&batch, 5)?;

            for i in 0..batch.num_rows() {
                let ms = datetimes.value(i);
                let nanos = (ms.rem_euclid(1000) * 1_000_000) as u32;
                let utc = DateTime::<Utc>::from_timestamp(ms.div_euclid(1000), nanos).ok_or_else(|| {
                    DashboardError::ArrowError(format!("Invalid timestamp at row {}", i))
                })?;
                rows.push(NormalizedRow {
                    datetime: zoned(timezone, &utc.naive_utc()),
                    open: open.value(i),
                    high: high.value(i),
                    low: low.value(i),
                    close: close.value(i),
                    volume: volume.value(i),
                });
            }

            for (offset, (_, values)) in indicator_values.iter_mut().enumerate() {
                let array = downcast::<Float64Array>(&batch, 6 + offset)?;
                values.extend((0..array.len()).map(|i| {
                    if array.is_null(i) {
                        None
                    } else {
                        Some(array.value(i))
                    }
                }));
            }
        }

        let mut table = NormalizedTable::from_rows(&symbol, timezone, rows);
        for (name, values) in indicator_values {
            table.push_column(IndicatorColumn::new(&name, values))?;
        }
        Ok(table)
    }
}
