use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Write equally long columns to a CSV file with a header row.
pub fn write_columns<P: AsRef<Path>, H: AsRef<str>>(path: P, headers: &[H], columns: &[Vec<f64>]) -> io::Result<()> {
    if headers.len() != columns.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Headers count ({}) doesn't match data columns ({})",
                headers.len(),
                columns.len()
            ),
        ));
    }
    let n_rows = columns.first().map_or(0, Vec::len);
    if let Some(col) = columns.iter().position(|c| c.len() != n_rows) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "column '{}' has {} rows, expected {n_rows}",
                headers[col].as_ref(),
                columns[col].len()
            ),
        ));
    }

    let mut file = BufWriter::new(File::create(path)?);
    let header: Vec<&str> = headers.iter().map(AsRef::as_ref).collect();
    writeln!(file, "{}", header.join(","))?;

    for i in 0..n_rows {
        let row: Vec<String> = columns.iter().map(|col| format!("{:.15e}", col[i])).collect();
        writeln!(file, "{}", row.join(","))?;
    }
    file.flush()
}
