//! Trip records, CSV loading and re-attachment of fragments to their trips
//!
//! Every column of the input passes through untouched. Only `type`, `start_datetime`
//! and `path` are interpreted, and only `path` is ever rewritten.

use crate::{DataError, Result, codec};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use geo::LineString;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

/// Column holding the trip category
pub const TYPE_COLUMN: &str = "type";
/// Column holding the trip start timestamp
pub const START_COLUMN: &str = "start_datetime";
/// Column holding the encoded route
pub const PATH_COLUMN: &str = "path";

/// Timestamp layouts carrying a UTC offset, tried after RFC 3339
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

/// Timestamp layouts without an offset
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Column layout of a trip table
#[derive(Debug, Clone)]
pub struct Schema {
    headers: StringRecord,
    type_index: usize,
    start_index: usize,
    path_index: usize,
}

impl Schema {
    /// Locate the required columns in a header row
    pub fn from_headers(headers: StringRecord) -> Result<Self> {
        let find = |name: &'static str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or(DataError::MissingColumn(name))
        };
        let type_index = find(TYPE_COLUMN)?;
        let start_index = find(START_COLUMN)?;
        let path_index = find(PATH_COLUMN)?;

        Ok(Self {
            headers,
            type_index,
            start_index,
            path_index,
        })
    }

    /// Header row, in input order
    #[inline]
    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    /// Index of the `path` column
    #[inline]
    pub fn path_index(&self) -> usize {
        self.path_index
    }
}

/// A single trip: one input row with all of its fields
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    /// 1-based data row number in the source file (header excluded)
    row: usize,
    record: StringRecord,
}

impl Trip {
    /// Create a trip from a data row
    pub fn new(row: usize, record: StringRecord) -> Self {
        Self { row, record }
    }

    /// 1-based data row number in the source file
    #[inline]
    pub fn row(&self) -> usize {
        self.row
    }

    /// All fields of the row
    #[inline]
    pub fn record(&self) -> &StringRecord {
        &self.record
    }

    /// Trip category
    #[inline]
    pub fn trip_type<'a>(&'a self, schema: &Schema) -> &'a str {
        self.record.get(schema.type_index).unwrap_or_default()
    }

    /// Raw start timestamp text
    #[inline]
    pub fn start_datetime<'a>(&'a self, schema: &Schema) -> &'a str {
        self.record.get(schema.start_index).unwrap_or_default()
    }

    /// Raw encoded path
    #[inline]
    pub fn path<'a>(&'a self, schema: &Schema) -> &'a str {
        self.record.get(schema.path_index).unwrap_or_default()
    }
}

/// A trip whose start timestamp parsed
#[derive(Debug, Clone, PartialEq)]
pub struct DatedTrip {
    pub trip: Trip,
    pub start: NaiveDateTime,
}

/// All trips of an input file, with their schema
#[derive(Debug, Clone)]
pub struct TripTable {
    schema: Schema,
    trips: Vec<Trip>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl TripTable {
    /// Load a CSV file
    pub fn from_path(path: &Path) -> Result<Self> {
        #[cfg(feature = "profiling")]
        profiling::scope!("trip_table::from_path");

        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Load CSV data with a header row
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let schema = Schema::from_headers(reader.headers()?.clone())?;
        let trips = reader
            .records()
            .enumerate()
            .map(|(i, record)| -> Result<Trip> { Ok(Trip::new(i + 1, record?)) })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { schema, trips })
    }

    /// Column layout
    #[inline]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// All trips, in input order
    #[inline]
    pub fn trips(&self) -> &[Trip] {
        &self.trips
    }

    /// Number of trips
    #[inline]
    pub fn len(&self) -> usize {
        self.trips.len()
    }

    /// Check if the table has no trips
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    /// Keep only trips whose type is one of `types`
    pub fn retain_types(&mut self, types: &[String]) {
        let schema = &self.schema;
        self.trips
            .retain(|trip| types.iter().any(|t| t == trip.trip_type(schema)));
    }

    /// Parse start timestamps, dropping trips whose timestamp does not parse
    pub fn into_dated(self) -> (Schema, Vec<DatedTrip>) {
        let schema = self.schema;
        let dated = self
            .trips
            .into_iter()
            .filter_map(|trip| match parse_timestamp(trip.start_datetime(&schema)) {
                Some(start) => Some(DatedTrip { trip, start }),
                None => {
                    tracing::debug!(
                        "Row {}: unparseable start_datetime {:?}",
                        trip.row(),
                        trip.start_datetime(&schema)
                    );
                    None
                }
            })
            .collect();
        (schema, dated)
    }
}

/// Parse a trip timestamp
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS[.fff]]` (space or `T` separated, optional
/// UTC offset) and bare `YYYY-MM-DD` dates (midnight). Offsets are dropped, keeping
/// the wall-clock time.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(text, fmt).ok())
    {
        return Some(dt.naive_local());
    }
    if let Some(dt) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(dt);
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Split a comma-separated list of trip types, trimming whitespace
pub fn parse_trip_types(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Build an output row: the trip's fields with `path` replaced by the encoded fragment
///
/// Returns `None` (and drops the fragment) if the fragment cannot be encoded.
pub fn attach(fragment: &LineString<f64>, trip: &Trip, schema: &Schema) -> Option<StringRecord> {
    let encoded = match codec::encode(&fragment.0) {
        Ok(encoded) => encoded,
        Err(e) => {
            tracing::debug!("Row {}: dropping fragment: {e}", trip.row());
            return None;
        }
    };

    Some(
        trip.record()
            .iter()
            .enumerate()
            .map(|(i, field)| {
                if i == schema.path_index {
                    encoded.as_str()
                } else {
                    field
                }
            })
            .collect(),
    )
}

/// Fail if `path` already exists
pub fn ensure_output_available(path: &Path) -> Result<()> {
    if path.try_exists()? {
        return Err(DataError::OutputExists(path.to_path_buf()));
    }
    Ok(())
}

/// Write the header and rows to a new file, never overwriting an existing one
///
/// Returns the number of rows written.
pub fn write_rows(path: &Path, schema: &Schema, rows: &[StringRecord]) -> Result<usize> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => DataError::OutputExists(path.to_path_buf()),
            _ => DataError::Io(e),
        })?;
    write_rows_to(std::io::BufWriter::new(file), schema, rows)
}

/// Write the header and rows as CSV
pub fn write_rows_to<W: Write>(writer: W, schema: &Schema, rows: &[StringRecord]) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(schema.headers())?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use geo::line_string;

    const TEST_CSV: &str = "\
id,type,start_datetime,path,operator
1,train,2024-01-05 08:00:00,\"[[0, 0], [0, 10]]\",SNCF
2,bus,2024-01-06 09:00:00,\"[[1, 1], [1, 2]]\",RATP
3,train,not a date,\"[[2, 2], [2, 3]]\",DB
4,train,2024-03-01,_p~iF~ps|U_ulLnnqC,SBB
";

    fn test_table() -> TripTable {
        TripTable::from_reader(TEST_CSV.as_bytes()).unwrap()
    }

    #[test]
    fn test_load_table() {
        let table = test_table();
        assert_eq!(table.len(), 4);
        assert_eq!(table.schema().path_index(), 3);

        let first = &table.trips()[0];
        assert_eq!(first.row(), 1);
        assert_eq!(first.trip_type(table.schema()), "train");
        assert_eq!(first.path(table.schema()), "[[0, 0], [0, 10]]");
    }

    #[test]
    fn test_missing_column() {
        let result = TripTable::from_reader("id,type,path\n1,train,abc\n".as_bytes());
        assert!(matches!(result, Err(DataError::MissingColumn("start_datetime"))));
    }

    #[test]
    fn test_ragged_rows_are_fatal() {
        let result = TripTable::from_reader("type,start_datetime,path\ntrain,2024-01-01\n".as_bytes());
        assert!(matches!(result, Err(DataError::Csv(_))));
    }

    #[test]
    fn test_retain_types() {
        let mut table = test_table();
        table.retain_types(&["train".to_string()]);
        assert_eq!(table.len(), 3);

        table.retain_types(&["bus".to_string(), "ferry".to_string()]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_into_dated_drops_invalid_dates() {
        let (_, dated) = test_table().into_dated();
        let rows: Vec<_> = dated.iter().map(|d| d.trip.row()).collect();
        assert_eq!(rows, vec![1, 2, 4]);
        assert_eq!(dated[2].start.month(), 3);
        assert_eq!(dated[2].start.hour(), 0);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        for text in [
            "2024-05-17 14:30:00",
            "2024-05-17T14:30:00",
            "2024-05-17 14:30",
            "2024-05-17T14:30:00+02:00",
            "2024-05-17 14:30:00+0200",
            "2024-05-17T14:30:00Z",
            " 2024/05/17 14:30:00 ",
        ] {
            assert_eq!(parse_timestamp(text), Some(expected), "{text}");
        }

        let fractional = parse_timestamp("2024-05-17 14:30:00.250").unwrap();
        assert_eq!(fractional.nanosecond(), 250_000_000);

        assert_eq!(
            parse_timestamp("2024-05-17"),
            NaiveDate::from_ymd_opt(2024, 5, 17).unwrap().and_hms_opt(0, 0, 0)
        );
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2024-13-45").is_none());
    }

    #[test]
    fn test_parse_trip_types() {
        assert_eq!(parse_trip_types("train"), vec!["train"]);
        assert_eq!(parse_trip_types(" train, tram ,,metro "), vec!["train", "tram", "metro"]);
        assert!(parse_trip_types(" , ").is_empty());
    }

    #[test]
    fn test_attach_replaces_path_only() {
        let table = test_table();
        let trip = &table.trips()[0];
        let fragment = line_string![(x: 0.0, y: 10.0), (x: 0.0, y: 20.0)];

        let row = attach(&fragment, trip, table.schema()).unwrap();
        assert_eq!(row.len(), table.schema().headers().len());
        assert_eq!(&row[0], "1");
        assert_eq!(&row[1], "train");
        assert_eq!(&row[2], "2024-01-05 08:00:00");
        assert_eq!(&row[4], "SNCF");
        assert_eq!(codec::decode(&row[3]).unwrap(), fragment.0);
    }

    #[test]
    fn test_attach_drops_degenerate_fragment() {
        let table = test_table();
        let fragment = line_string![(x: 0.0, y: 10.0)];
        assert!(attach(&fragment, &table.trips()[0], table.schema()).is_none());
    }

    #[test]
    fn test_write_rows_to_keeps_header_order() {
        let table = test_table();
        let rows: Vec<StringRecord> = table.trips().iter().map(|t| t.record().clone()).collect();

        let mut out = Vec::new();
        let written = write_rows_to(&mut out, table.schema(), &rows[..1]).unwrap();
        assert_eq!(written, 1);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("id,type,start_datetime,path,operator"));
        assert_eq!(
            lines.next(),
            Some("1,train,2024-01-05 08:00:00,\"[[0, 0], [0, 10]]\",SNCF")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_write_rows_never_overwrites() {
        let path = std::env::temp_dir().join(format!(
            "new-tracks-trip-test-{}.csv",
            std::process::id()
        ));
        std::fs::write(&path, "keep me").unwrap();

        assert!(matches!(
            ensure_output_available(&path),
            Err(DataError::OutputExists(_))
        ));
        let table = test_table();
        assert!(matches!(
            write_rows(&path, table.schema(), &[]),
            Err(DataError::OutputExists(_))
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");

        std::fs::remove_file(&path).unwrap();
        assert!(ensure_output_available(&path).is_ok());
    }
}
