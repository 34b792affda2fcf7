//! Flat result tables.
//!
//! Every harness writes a CSV with a fixed header and hand-formatted rows
//! (fixed decimal places, so identical runs produce byte-identical files).
//! Dependent harnesses read earlier tables back through `read_csv`; a
//! missing table is reported as the harness that should have produced it.

use crate::{
    error::{SimError, SimResult},
    snapshot::SimulationRecord,
};
use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::Path,
};

pub trait CsvRow {
    const HEADER: &'static [&'static str];

    fn write_row<W: Write>(&self, w: &mut W) -> io::Result<()>;
}

pub trait FromCsvRow: Sized {
    const HEADER: &'static [&'static str];

    fn from_fields(fields: &[&str]) -> Result<Self, String>;
}

pub fn write_header<W: Write>(w: &mut W, header: &[&str]) -> io::Result<()> {
    writeln!(w, "{}", header.join(","))
}

pub fn write_rows<R: CsvRow, W: Write>(w: &mut W, rows: &[R]) -> io::Result<()> {
    write_header(w, R::HEADER)?;
    for row in rows {
        row.write_row(w)?;
    }
    Ok(())
}

/// Write `rows` to `path`, creating parent directories. Returns the row count.
pub fn write_csv<R: CsvRow>(path: impl AsRef<Path>, rows: &[R]) -> SimResult<usize> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    write_rows(&mut writer, rows)?;
    writer.flush()?;
    log::info!("wrote {} ({} rows)", path.display(), rows.len());
    Ok(rows.len())
}

/// Read a table produced by an earlier harness run.
pub fn read_csv<R: FromCsvRow>(path: impl AsRef<Path>, producer: &'static str) -> SimResult<Vec<R>> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(SimError::MissingPrerequisite { path: display, producer });
        }
        Err(e) => return Err(e.into()),
    };

    let malformed = |line: usize, reason: String| SimError::MalformedTable {
        path: display.clone(),
        line,
        reason,
    };

    let mut lines = BufReader::new(file).lines();
    let header = lines.next().transpose()?.unwrap_or_default();
    let columns: Vec<&str> = header.trim_end().split(',').collect();
    if columns != R::HEADER {
        return Err(malformed(1, format!("unexpected header '{}'", header.trim_end())));
    }

    let mut rows = Vec::new();
    for (i, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != R::HEADER.len() {
            return Err(malformed(
                i + 2,
                format!("expected {} fields, found {}", R::HEADER.len(), fields.len()),
            ));
        }
        rows.push(R::from_fields(&fields).map_err(|reason| malformed(i + 2, reason))?);
    }
    Ok(rows)
}

/// Parse one numeric field, naming the column on failure.
pub fn parse_field<T: std::str::FromStr>(fields: &[&str], idx: usize, name: &str) -> Result<T, String> {
    fields
        .get(idx)
        .ok_or_else(|| format!("missing column {name}"))?
        .trim()
        .parse()
        .map_err(|_| format!("column {name}: cannot parse '{}'", fields[idx]))
}

/// Format an optional value, leaving the cell empty for `None`.
pub fn opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// ── The per-day record table ───────────────────────────────────────

impl CsvRow for SimulationRecord {
    const HEADER: &'static [&'static str] = &[
        "seed", "run_id", "timestep", "scenario", "emission_model", "N", "E", "B",
        "F_daily", "P", "C", "T", "s2r", "bme", "slashed_total", "fraud_captured_pct",
    ];

    fn write_row<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(
            w,
            "{},{},{},{},{},{},{:.0},{:.2},{:.2},{:.6},{:.0},{:.0},{:.6},{:.6},{},{:.4}",
            self.seed,
            self.run_id,
            self.day,
            self.scenario,
            self.policy.name(),
            self.active,
            self.emission,
            self.burn,
            self.fee_revenue,
            self.price,
            self.circulating,
            self.treasury,
            self.burn_mint_ratio,
            self.burn_mint_ratio,
            self.slashed_total,
            self.fraud_captured_pct,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Pair {
        name: String,
        value: f64,
    }

    impl CsvRow for Pair {
        const HEADER: &'static [&'static str] = &["name", "value"];

        fn write_row<W: Write>(&self, w: &mut W) -> io::Result<()> {
            writeln!(w, "{},{:.3}", self.name, self.value)
        }
    }

    impl FromCsvRow for Pair {
        const HEADER: &'static [&'static str] = &["name", "value"];

        fn from_fields(fields: &[&str]) -> Result<Self, String> {
            Ok(Self {
                name: fields[0].to_string(),
                value: parse_field(fields, 1, "value")?,
            })
        }
    }

    #[test]
    fn written_tables_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pairs.csv");
        let rows = vec![
            Pair { name: "a".into(), value: 1.5 },
            Pair { name: "b".into(), value: -0.25 },
        ];
        assert_eq!(write_csv(&path, &rows).unwrap(), 2);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "name,value\na,1.500\nb,-0.250\n");
        let back: Vec<Pair> = read_csv(&path, "pairs").unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn missing_table_names_its_producer() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_csv::<Pair>(dir.path().join("absent.csv"), "ensemble").unwrap_err();
        assert!(matches!(err, SimError::MissingPrerequisite { producer: "ensemble", .. }));
    }

    #[test]
    fn bad_cell_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "name,value\na,1\nb,oops\n").unwrap();
        let err = read_csv::<Pair>(&path, "pairs").unwrap_err();
        assert!(matches!(err, SimError::MalformedTable { line: 3, .. }));
    }
}
