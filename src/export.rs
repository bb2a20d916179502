// CSV export of whatever rows a view is currently showing

use crate::db::Reading;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

/// File name offered when the user does not pick one
pub const DEFAULT_EXPORT_FILE: &str = "water_data_export.csv";

/// Write `readings` as UTF-8 CSV with a header row, in the given order
pub fn write_csv<W: Write>(readings: &[Reading], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    if readings.is_empty() {
        // serde only emits the header alongside the first record
        wtr.write_record(["id", "house_number", "water_meter", "date", "price"])?;
    }
    for reading in readings {
        wtr.serialize(reading).context("Failed to serialize reading")?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn export_csv_bytes(readings: &[Reading]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(readings, &mut buf)?;
    Ok(buf)
}

pub fn export_to_path(readings: &[Reading], path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create export file {}", path.display()))?;
    write_csv(readings, file)?;

    info!(path = %path.display(), rows = readings.len(), "exported readings to CSV");
    Ok(())
}

/// Parse CSV produced by [`write_csv`]
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Reading>> {
    let mut rdr = csv::Reader::from_reader(reader);

    let mut readings = Vec::new();
    for result in rdr.deserialize() {
        let reading: Reading = result.context("Failed to deserialize reading")?;
        readings.push(reading);
    }

    Ok(readings)
}

pub fn load_csv(csv_path: &Path) -> Result<Vec<Reading>> {
    let file = File::open(csv_path).context("Failed to open CSV file")?;
    read_csv(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::DetailFilter;
    use chrono::NaiveDate;

    fn reading(id: i64, house: &str, meter: f64, date: &str, price: f64) -> Reading {
        Reading {
            id,
            house_number: house.to_string(),
            water_meter: meter,
            date: date.to_string(),
            price,
        }
    }

    #[test]
    fn test_header_and_row_layout() {
        let row = reading(1, "H-1", 10.0, "2024-01-01 08:00:00", 45.0);
        let bytes = export_csv_bytes(&[row]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();

        assert_eq!(lines.next(), Some("id,house_number,water_meter,date,price"));
        assert_eq!(lines.next(), Some("1,H-1,10.0,2024-01-01 08:00:00,45.0"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_empty_export_still_has_header() {
        let text = String::from_utf8(export_csv_bytes(&[]).unwrap()).unwrap();
        assert_eq!(text.trim_end(), "id,house_number,water_meter,date,price");
        assert!(read_csv(text.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_filtered_view_round_trips() {
        let readings = vec![
            reading(1, "H-1", 0.1, "2024-01-01 08:00:00", 0.1 * 4.5),
            reading(2, "Baan, \"Sukhumvit\" 12", 7.3, "2024-01-02 09:00:00", 7.3 * 4.5),
            reading(3, "h-10", 1.0 / 3.0, "2024-01-03 10:00:00", 4.5 / 3.0),
            reading(4, "X-2", 2.0, "2024-01-03 11:00:00", 9.0),
        ];
        let filter = DetailFilter {
            search: "h".to_string(),
            range: None,
        };
        let view = filter.apply(&readings, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert_eq!(view.rows.len(), 3);

        let bytes = export_csv_bytes(&view.rows).unwrap();
        let parsed = read_csv(bytes.as_slice()).unwrap();

        assert_eq!(parsed, view.rows);
    }

    #[test]
    fn test_export_to_path_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_EXPORT_FILE);
        let readings = vec![reading(9, "H-9", 3.0, "2024-02-02 02:02:02", 13.5)];

        export_to_path(&readings, &path).unwrap();
        assert_eq!(load_csv(&path).unwrap(), readings);
    }
}
