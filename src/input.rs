use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::sync::LazyLock;

use flate2::read::MultiGzDecoder;
use rand::SeedableRng;
use rand::rngs::StdRng;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::InputConfig;
use crate::domain::AccessionKey;
use crate::error::ResolverError;

static ACCESSION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(.+)//").unwrap());

/// Cells treated as empty when cleaning the table.
const MISSING_MARKERS: &[&str] = &["", "N/A", "NA", "NaN", "nan", "null"];

#[derive(Debug, Clone, Default)]
pub struct LoadedKeys {
    pub keys: Vec<AccessionKey>,
    pub rows_read: usize,
    pub rows_blank: usize,
    pub rows_sampled_out: usize,
    pub rows_without_accession: usize,
}

/// Accession is everything before the last `//` of a description.
pub fn extract_accession(description: &str) -> Option<AccessionKey> {
    ACCESSION_RE
        .captures(description)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn load_keys(config: &InputConfig) -> Result<LoadedKeys, ResolverError> {
    let path = config.path.as_str();
    let file = File::open(config.path.as_std_path()).map_err(|err| ResolverError::InputRead {
        path: path.to_string(),
        message: err.to_string(),
    })?;
    let reader: Box<dyn Read> = if config.path.extension() == Some("gz") {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let loaded = load_keys_from(BufReader::new(reader), config)?;
    if loaded.rows_read == 0 {
        warn!(path, "input table has no data rows");
    }
    Ok(loaded)
}

pub fn load_keys_from<R: BufRead>(
    reader: R,
    config: &InputConfig,
) -> Result<LoadedKeys, ResolverError> {
    let table = read_descriptions(reader, &config.description_column)?;
    let mut loaded = LoadedKeys {
        rows_read: table.rows_read,
        rows_blank: table.rows_read - table.descriptions.len(),
        ..Default::default()
    };

    let kept = match config.sample {
        Some(amount) => subsample(table.descriptions, amount, config.seed),
        None => table.descriptions,
    };
    loaded.rows_sampled_out = loaded.rows_read - loaded.rows_blank - kept.len();

    for description in kept {
        match extract_accession(&description) {
            Some(key) => loaded.keys.push(key),
            None => {
                debug!(%description, "no accession in description");
                loaded.rows_without_accession += 1;
            }
        }
    }
    if loaded.rows_without_accession > 0 {
        warn!(
            rows = loaded.rows_without_accession,
            "rows dropped without an extractable accession"
        );
    }
    Ok(loaded)
}

struct DescriptionColumn {
    descriptions: Vec<String>,
    rows_read: usize,
}

fn read_descriptions<R: BufRead>(
    reader: R,
    column: &str,
) -> Result<DescriptionColumn, ResolverError> {
    let mut lines = reader.lines();
    let header = match lines.next() {
        Some(line) => line.map_err(|err| ResolverError::InputParse {
            line: 1,
            message: err.to_string(),
        })?,
        None => return Err(ResolverError::MissingColumn(column.to_string())),
    };
    let column_index = header
        .trim_end_matches('\r')
        .split('\t')
        .position(|name| name.trim() == column)
        .ok_or_else(|| ResolverError::MissingColumn(column.to_string()))?;

    let mut table = DescriptionColumn {
        descriptions: Vec::new(),
        rows_read: 0,
    };
    for (offset, line) in lines.enumerate() {
        let line = line.map_err(|err| ResolverError::InputParse {
            line: offset + 2,
            message: err.to_string(),
        })?;
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        table.rows_read += 1;
        let cell = line.split('\t').nth(column_index).unwrap_or("").trim();
        if MISSING_MARKERS.contains(&cell) {
            continue;
        }
        table.descriptions.push(cell.to_string());
    }
    Ok(table)
}

/// Uniform sample without replacement; survivors keep their input order.
fn subsample(rows: Vec<String>, amount: usize, seed: Option<u64>) -> Vec<String> {
    if amount >= rows.len() {
        return rows;
    }
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut picked = rand::seq::index::sample(&mut rng, rows.len(), amount).into_vec();
    picked.sort_unstable();

    let mut rows = rows.into_iter().map(Some).collect::<Vec<_>>();
    picked
        .into_iter()
        .filter_map(|index| rows[index].take())
        .collect()
}
