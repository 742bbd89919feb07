//! Read-only coding system tables and cross-system code maps
//!
//! The code tables (ICD-10, Read v2, ...) are owned by the wider phenotype
//! library. This module only mirrors the columns needed for joins.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::code::{normalise, NormalisedCode};
use crate::{PhenotagError, PhenotagResult};

/// Filename of the Read v2 to ICD-10 code map
pub const READ_ICD10_MAPPING_FILENAME: &str = "READ_ICD10_MAPPING.csv";

/// Identifier of a coding system
#[derive(
    Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CodingSystemId {
    inner: u32,
}

impl CodingSystemId {
    /// ICD-10
    pub const ICD10: CodingSystemId = CodingSystemId { inner: 4 };
    /// Read codes v2
    pub const READ_V2: CodingSystemId = CodingSystemId { inner: 5 };

    /// Returns the id as `u32`
    pub fn as_u32(&self) -> u32 {
        self.inner
    }
}

impl From<u32> for CodingSystemId {
    fn from(inner: u32) -> Self {
        Self { inner }
    }
}

impl TryFrom<&str> for CodingSystemId {
    type Error = PhenotagError;
    fn try_from(value: &str) -> PhenotagResult<Self> {
        Ok(Self {
            inner: value.trim().parse::<u32>()?,
        })
    }
}

impl Display for CodingSystemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CodingSystem:{}", self.inner)
    }
}

/// A single row of a coding system table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeRow {
    /// Primary key of the row
    pub id: u64,
    /// The code as stored by the coding system
    pub code: String,
    /// Human readable description
    pub description: String,
    /// Alternative spelling (ICD-10 only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_code: Option<String>,
}

/// The rows of one coding system
///
/// Rows are indexed by the `dot_code` and `alt_code` forms of both their
/// `code` and `alt_code` columns, and additionally by the `min_code` of range
/// codes such as `A00-A09`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<CodeRow>", into = "Vec<CodeRow>")]
pub struct CodeTable {
    rows: Vec<CodeRow>,
    index: HashMap<String, usize>,
    ranges: HashMap<String, usize>,
}

impl CodeTable {
    /// Constructs a new, empty [`CodeTable`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a row to the table
    ///
    /// If several rows share a normalised code, the first row wins.
    pub fn insert(&mut self, row: CodeRow) {
        let idx = self.rows.len();
        let mut forms = vec![normalise(&row.code)];
        if let Some(alt) = &row.alt_code {
            forms.push(normalise(alt));
        }
        for form in &forms {
            if form.is_empty() {
                continue;
            }
            self.index.entry(form.dot_code().to_string()).or_insert(idx);
            self.index.entry(form.alt_code().to_string()).or_insert(idx);
            if form.min_code() != form.dot_code() && !form.min_code().is_empty() {
                self.ranges.entry(form.min_code().to_string()).or_insert(idx);
            }
        }
        self.rows.push(row);
    }

    /// Returns the row matching the normalised code
    ///
    /// Exact `dot_code`/`alt_code` matches are preferred over matches
    /// against the start of a range code.
    pub fn lookup(&self, code: &NormalisedCode) -> Option<&CodeRow> {
        if code.is_empty() {
            return None;
        }
        self.index
            .get(code.dot_code())
            .or_else(|| self.index.get(code.alt_code()))
            .or_else(|| self.ranges.get(code.dot_code()))
            .map(|idx| &self.rows[*idx])
    }

    /// Returns the number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates all rows in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, CodeRow> {
        self.rows.iter()
    }
}

impl From<Vec<CodeRow>> for CodeTable {
    fn from(rows: Vec<CodeRow>) -> Self {
        let mut table = CodeTable::new();
        for row in rows {
            table.insert(row);
        }
        table
    }
}

impl From<CodeTable> for Vec<CodeRow> {
    fn from(table: CodeTable) -> Self {
        table.rows
    }
}

/// All coding system tables known to the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodingTables {
    tables: BTreeMap<CodingSystemId, CodeTable>,
}

impl CodingTables {
    /// Returns the table of the coding system, if present
    pub fn get(&self, coding_system: CodingSystemId) -> Option<&CodeTable> {
        self.tables.get(&coding_system)
    }

    /// Returns a mutable reference to the table of the coding system,
    /// creating an empty table if needed
    pub fn table_mut(&mut self, coding_system: CodingSystemId) -> &mut CodeTable {
        self.tables.entry(coding_system).or_default()
    }

    /// Returns the primary key of the row matching `code` in the coding system
    pub fn resolve(&self, coding_system: CodingSystemId, code: &str) -> Option<u64> {
        self.get(coding_system)?
            .lookup(&normalise(code))
            .map(|row| row.id)
    }
}

/// A cross-system code map, e.g. Read v2 to ICD-10
///
/// Source codes are indexed by their `alt_code`. One source code can map
/// to several target codes.
#[derive(Debug, Clone, Default)]
pub struct CodeMap {
    inner: HashMap<String, Vec<NormalisedCode>>,
    len: usize,
}

impl CodeMap {
    /// Constructs a new, empty [`CodeMap`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `source -> target` mapping
    ///
    /// Mappings with an empty source or target are ignored.
    pub fn insert(&mut self, source: &str, target: &str) {
        let source = normalise(source);
        let target = normalise(target);
        if source.is_empty() || target.is_empty() {
            trace!("Ignoring empty mapping {:?} -> {:?}", source, target);
            return;
        }
        let targets = self.inner.entry(source.alt_code().to_string()).or_default();
        if !targets.contains(&target) {
            targets.push(target);
            self.len += 1;
        }
    }

    /// Returns the mapped target codes of `source`
    pub fn targets(&self, source: &NormalisedCode) -> &[NormalisedCode] {
        self.inner
            .get(source.alt_code())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the number of distinct mappings
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the map contains no mappings
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Parses a comma separated code map with a `READ_CODE,ICD10_CODE` header
    ///
    /// ```text
    /// READ_CODE,ICD10_CODE
    /// H33..,J45
    /// "H330.","J45.0"
    /// ```
    ///
    /// # Errors
    ///
    /// - the file cannot be opened: [`PhenotagError::CannotOpenFile`]
    /// - the header is missing or a line has fewer than two columns:
    ///   [`PhenotagError::InvalidInput`]
    pub fn from_csv<P: AsRef<Path>>(file: P) -> PhenotagResult<Self> {
        let filename = file.as_ref().display().to_string();
        let file = File::open(file).map_err(|_| PhenotagError::CannotOpenFile(filename))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parses a code map from any reader, see [`CodeMap::from_csv`]
    ///
    /// Further columns, e.g. descriptions, are ignored. Quoted fields may
    /// contain commas.
    ///
    /// # Errors
    ///
    /// Returns [`PhenotagError::InvalidInput`] for a missing header or
    /// malformed lines
    pub fn from_reader<R: Read>(reader: R) -> PhenotagResult<Self> {
        let invalid = |err: csv::Error| PhenotagError::InvalidInput(err.to_string());
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers().map_err(invalid)?;
        if !["READ_CODE", "ICD10_CODE"]
            .iter()
            .all(|column| headers.iter().any(|header| header == *column))
        {
            return Err(PhenotagError::InvalidInput(
                "code map must have a READ_CODE,ICD10_CODE header".to_string(),
            ));
        }

        let mut map = CodeMap::new();
        for row in reader.deserialize::<MappingRow>() {
            let row = row.map_err(invalid)?;
            map.insert(&row.read_code, &row.icd10_code);
        }
        debug!("Parsed code map with {} mappings", map.len());
        Ok(map)
    }
}

#[derive(Debug, Deserialize)]
struct MappingRow {
    #[serde(rename = "READ_CODE")]
    read_code: String,
    #[serde(rename = "ICD10_CODE")]
    icd10_code: String,
}

#[cfg(test)]
mod test {
    use super::*;

    fn icd10() -> CodeTable {
        vec![
            CodeRow {
                id: 10,
                code: "J45".into(),
                description: "Asthma".into(),
                alt_code: Some("J45".into()),
            },
            CodeRow {
                id: 11,
                code: "J45.0".into(),
                description: "Predominantly allergic asthma".into(),
                alt_code: Some("J450".into()),
            },
            CodeRow {
                id: 12,
                code: "A00-A09".into(),
                description: "Intestinal infectious diseases".into(),
                alt_code: None,
            },
        ]
        .into()
    }

    #[test]
    fn lookup_code_forms() {
        let table = icd10();
        assert_eq!(table.len(), 3);
        assert_eq!(table.lookup(&normalise("j45")).unwrap().id, 10);
        assert_eq!(table.lookup(&normalise("J450")).unwrap().id, 11);
        assert_eq!(table.lookup(&normalise("J45.0")).unwrap().id, 11);
        assert_eq!(table.lookup(&normalise("A00-A09")).unwrap().id, 12);
        assert_eq!(table.lookup(&normalise("a00")).unwrap().id, 12);
        assert!(table.lookup(&normalise("J46")).is_none());
        assert!(table.lookup(&normalise("")).is_none());
    }

    #[test]
    fn resolve_through_tables() {
        let mut tables = CodingTables::default();
        *tables.table_mut(CodingSystemId::ICD10) = icd10();
        assert_eq!(tables.resolve(CodingSystemId::ICD10, "J45"), Some(10));
        assert_eq!(tables.resolve(CodingSystemId::READ_V2, "J45"), None);
    }

    #[test]
    fn code_table_serde() {
        let json = serde_json::to_string(&icd10()).unwrap();
        let table: CodeTable = serde_json::from_str(&json).unwrap();
        assert_eq!(table.lookup(&normalise("J450")).unwrap().id, 11);
    }

    #[test]
    fn parse_code_map() {
        let data = "READ_CODE,ICD10_CODE\nH33..,J45\n\"H330.\",\"J45.0\"\n\nH33..,J45\n,J46\n";
        let map = CodeMap::from_reader(data.as_bytes()).unwrap();
        assert_eq!(map.len(), 2);
        let targets = map.targets(&normalise("h33"));
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].dot_code(), "j45");
        assert_eq!(map.targets(&normalise("H330."))[0].alt_code(), "j450");
    }

    #[test]
    fn quoted_commas() {
        let data = "READ_CODE,ICD10_CODE,DESCRIPTION\n\
                    \"H33..\",\"J45\",\"Asthma, unspecified\"\n\
                    H330.,J45.0,\"Allergic, extrinsic\"\n";
        let map = CodeMap::from_reader(data.as_bytes()).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.targets(&normalise("H33"))[0].dot_code(), "j45");
        assert_eq!(map.targets(&normalise("H330"))[0].dot_code(), "j45.0");
    }

    #[test]
    fn code_map_requires_header() {
        assert!(CodeMap::from_reader("H33..,J45\n".as_bytes()).is_err());
        assert!(CodeMap::from_reader("".as_bytes()).is_err());
        assert!(CodeMap::from_reader("READ_CODE,ICD10_CODE\nH33..\n".as_bytes()).is_err());
    }

    #[test]
    fn coding_system_ids() {
        assert_eq!(CodingSystemId::try_from(" 4").unwrap(), CodingSystemId::ICD10);
        assert!(CodingSystemId::try_from("ICD").is_err());
        assert_eq!(CodingSystemId::READ_V2.to_string(), "CodingSystem:5");
    }
}
