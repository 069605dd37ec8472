//! Target inventory loaded from the CSV file produced by the extractor.
//!
//! The file has a header row naming three columns (`Numero,IP,Nombre`, or the
//! aliases `id,address,label`) followed by one row per target. Loading is
//! strict: a single bad row fails the whole load.

use std::fmt;
use std::io;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("catalog contains no targets")]
    Empty,

    #[error("malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("unexpected catalog header {0:?} (expected Numero,IP,Nombre)")]
    Header(String),

    #[error("io: {0}")]
    Io(String),

    #[error("csv: {0}")]
    Csv(String),
}

/// Why a single descriptor failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("target id is empty")]
    EmptyId,
    #[error("target id {0:?} is not numeric")]
    NonNumericId(String),
    #[error("address is empty")]
    EmptyAddress,
    #[error("address {0:?} is not an IPv4 literal")]
    InvalidAddress(String),
    #[error("label is empty")]
    EmptyLabel,
}

// ---------------------------------------------------------------------------
// TargetDescriptor
// ---------------------------------------------------------------------------

/// One reachable target: the gateway's opaque id, its address and a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    id: String,
    address: Ipv4Addr,
    label: String,
}

impl TargetDescriptor {
    /// Build a descriptor, trimming each field and validating it.
    pub fn new(id: &str, address: &str, label: &str) -> Result<Self, DescriptorError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(DescriptorError::EmptyId);
        }
        if !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DescriptorError::NonNumericId(id.to_string()));
        }

        let address = address.trim();
        if address.is_empty() {
            return Err(DescriptorError::EmptyAddress);
        }
        let address: Ipv4Addr = address
            .parse()
            .map_err(|_| DescriptorError::InvalidAddress(address.to_string()))?;

        let label = label.trim();
        if label.is_empty() {
            return Err(DescriptorError::EmptyLabel);
        }

        Ok(Self {
            id: id.to_string(),
            address,
            label: label.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) - target #{}", self.label, self.address, self.id)
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

const ID_COLUMNS: &[&str] = &["numero", "id"];
const ADDRESS_COLUMNS: &[&str] = &["ip", "address"];
const LABEL_COLUMNS: &[&str] = &["nombre", "label"];

/// Ordered, immutable list of targets. Row order in the source file is the
/// menu order.
#[derive(Debug, Clone)]
pub struct Catalog {
    targets: Vec<TargetDescriptor>,
}

impl Catalog {
    /// Load the catalog from a CSV file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CatalogError::NotFound(path.to_path_buf()),
            _ => CatalogError::Io(format!("{}: {e}", path.display())),
        })?;
        let catalog = Self::from_reader(file)?;
        info!(path = %path.display(), targets = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    /// Parse a catalog from any CSV source.
    pub fn from_reader<R: io::Read>(source: R) -> Result<Self, CatalogError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(source);

        let headers = reader.headers().map_err(csv_error)?.clone();
        let columns = ColumnMap::resolve(&headers)?;

        let mut targets = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();

            if record.len() != 3 {
                return Err(CatalogError::MalformedRow {
                    line,
                    reason: format!("expected 3 fields, found {}", record.len()),
                });
            }

            let target = TargetDescriptor::new(
                &record[columns.id],
                &record[columns.address],
                &record[columns.label],
            )
            .map_err(|e| CatalogError::MalformedRow {
                line,
                reason: e.to_string(),
            })?;
            debug!(line, id = target.id(), "catalog row accepted");
            targets.push(target);
        }

        Self::from_targets(targets)
    }

    /// Wrap an already-validated list of targets.
    pub fn from_targets(targets: Vec<TargetDescriptor>) -> Result<Self, CatalogError> {
        if targets.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { targets })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Look up a target by its 1-based menu number.
    pub fn get(&self, number: usize) -> Option<&TargetDescriptor> {
        number.checked_sub(1).and_then(|i| self.targets.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetDescriptor> {
        self.targets.iter()
    }
}

/// Position of each logical column in the header row.
struct ColumnMap {
    id: usize,
    address: usize,
    label: usize,
}

impl ColumnMap {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, CatalogError> {
        let found = || headers.iter().collect::<Vec<_>>().join(",");
        if headers.len() != 3 {
            return Err(CatalogError::Header(found()));
        }

        let position = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
        };

        match (
            position(ID_COLUMNS),
            position(ADDRESS_COLUMNS),
            position(LABEL_COLUMNS),
        ) {
            (Some(id), Some(address), Some(label)) => Ok(Self { id, address, label }),
            _ => Err(CatalogError::Header(found())),
        }
    }
}

fn csv_error(err: csv::Error) -> CatalogError {
    match err.kind() {
        csv::ErrorKind::Io(e) => CatalogError::Io(e.to_string()),
        _ => CatalogError::Csv(err.to_string()),
    }
}
