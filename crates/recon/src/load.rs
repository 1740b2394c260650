//! Boundary loaders: turn CSV / XML computer feeds into records.
//!
//! Fields are trimmed, empty optional fields become `None`, dates use
//! `%Y-%m-%d`. A candidate row without a name or with a bad date is rejected
//! on its own; the rest of the feed still loads. Corpus rows are already
//! persisted, so any bad corpus row fails the load.

use std::path::Path;

use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::config::{ColumnMapping, InputConfig};
use crate::error::ReconError;
use crate::model::{CandidateRecord, CanonicalRecord, ReconInput, RejectedRow};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Xml,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<Self, ReconError> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Ok(Self::Csv),
            Some("xml") => Ok(Self::Xml),
            _ => Err(ReconError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// How CSV columns map to record fields.
#[derive(Debug, Clone, Copy)]
pub enum CsvLayout<'a> {
    /// First row is a header; fields are looked up by name.
    Headers(&'a ColumnMapping),
    /// No header row. Fields by position: `name, introduced, discontinued,
    /// company_name`, with `id` in front for corpus rows.
    Positional,
}

impl<'a> CsvLayout<'a> {
    pub fn for_input(input: &'a InputConfig) -> Self {
        if input.has_headers {
            Self::Headers(&input.columns)
        } else {
            Self::Positional
        }
    }
}

/// Candidates that passed field validation, plus the rows that did not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateFeed {
    pub records: Vec<CandidateRecord>,
    pub rejected: Vec<RejectedRow>,
}

impl CandidateFeed {
    fn from_rows(source: &str, rows: Vec<RawRecord>) -> Self {
        let mut feed = Self::default();
        for row in rows {
            let line = row.line;
            let name = non_empty(row.name.clone());
            match row.into_candidate(source) {
                Ok(candidate) => feed.records.push(candidate),
                Err(err) => {
                    log::warn!("{err}; row rejected");
                    feed.rejected.push(RejectedRow {
                        line,
                        name,
                        reason: err.to_string(),
                    });
                }
            }
        }
        feed
    }
}

/// Raw field values for one record, before typing.
#[derive(Debug, Default)]
struct RawRecord {
    line: usize,
    id: Option<String>,
    name: Option<String>,
    introduced: Option<String>,
    discontinued: Option<String>,
    company_name: Option<String>,
}

impl RawRecord {
    fn into_candidate(self, source: &str) -> Result<CandidateRecord, ReconError> {
        let line = self.line;
        let name = non_empty(self.name).ok_or_else(|| ReconError::MissingName {
            source: source.into(),
            line,
        })?;
        Ok(CandidateRecord {
            name,
            introduced: parse_date(source, line, self.introduced)?,
            discontinued: parse_date(source, line, self.discontinued)?,
            company_name: non_empty(self.company_name),
        })
    }

    fn into_canonical(mut self, source: &str) -> Result<CanonicalRecord, ReconError> {
        let line = self.line;
        let raw_id = non_empty(self.id.take()).unwrap_or_default();
        let id = raw_id.parse::<i64>().map_err(|_| ReconError::IdParse {
            source: source.into(),
            line,
            value: raw_id.clone(),
        })?;
        let c = self.into_candidate(source)?;
        Ok(CanonicalRecord {
            id,
            name: c.name,
            introduced: c.introduced,
            discontinued: c.discontinued,
            company_name: c.company_name,
        })
    }

    /// Field slot for an XML tag.
    fn slot(&mut self, tag: &[u8]) -> Option<&mut Option<String>> {
        match tag {
            b"id" => Some(&mut self.id),
            b"name" => Some(&mut self.name),
            b"introduced" => Some(&mut self.introduced),
            b"discontinued" => Some(&mut self.discontinued),
            b"company_name" => Some(&mut self.company_name),
            _ => None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `%Y` alone takes any digit count, so the value must also format back to
/// itself: `85-07-23` is an error, not year 85.
fn parse_date(
    source: &str,
    line: usize,
    value: Option<String>,
) -> Result<Option<NaiveDate>, ReconError> {
    let Some(v) = non_empty(value) else {
        return Ok(None);
    };
    match NaiveDate::parse_from_str(&v, DATE_FORMAT) {
        Ok(date) if date.format(DATE_FORMAT).to_string() == v => Ok(Some(date)),
        _ => Err(ReconError::DateParse {
            source: source.into(),
            line,
            value: v,
        }),
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Column index per field; `None` means the feed has no such column.
struct FieldIndex {
    id: Option<usize>,
    name: usize,
    introduced: Option<usize>,
    discontinued: Option<usize>,
    company_name: Option<usize>,
}

impl FieldIndex {
    fn positional(with_id: bool) -> Self {
        let offset = usize::from(with_id);
        Self {
            id: with_id.then_some(0),
            name: offset,
            introduced: Some(offset + 1),
            discontinued: Some(offset + 2),
            company_name: Some(offset + 3),
        }
    }

    fn from_headers(
        source: &str,
        headers: &csv::StringRecord,
        columns: &ColumnMapping,
        with_id: bool,
    ) -> Result<Self, ReconError> {
        let headers: Vec<&str> = headers.iter().map(str::trim).collect();
        let find = |name: &str| headers.iter().position(|h| *h == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| ReconError::MissingColumn {
                source: source.into(),
                column: name.into(),
            })
        };
        Ok(Self {
            id: if with_id { Some(require(&columns.id)?) } else { None },
            name: require(&columns.name)?,
            introduced: find(&columns.introduced),
            discontinued: find(&columns.discontinued),
            company_name: find(&columns.company_name),
        })
    }
}

fn read_csv(
    source: &str,
    csv_data: &str,
    layout: CsvLayout<'_>,
    with_id: bool,
) -> Result<Vec<RawRecord>, ReconError> {
    let csv_err = |e: csv::Error| ReconError::Csv {
        source: source.into(),
        message: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(matches!(layout, CsvLayout::Headers(_)))
        .from_reader(csv_data.as_bytes());

    let index = match layout {
        CsvLayout::Headers(columns) => {
            let headers = reader.headers().map_err(csv_err)?.clone();
            FieldIndex::from_headers(source, &headers, columns, with_id)?
        }
        CsvLayout::Positional => FieldIndex::positional(with_id),
    };

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(i + 1);
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).map(str::to_string);

        rows.push(RawRecord {
            line,
            id: field(index.id),
            name: field(Some(index.name)),
            introduced: field(index.introduced),
            discontinued: field(index.discontinued),
            company_name: field(index.company_name),
        });
    }
    Ok(rows)
}

pub fn load_candidates_csv(
    source: &str,
    csv_data: &str,
    layout: CsvLayout<'_>,
) -> Result<CandidateFeed, ReconError> {
    let rows = read_csv(source, csv_data, layout, false)?;
    Ok(CandidateFeed::from_rows(source, rows))
}

pub fn load_corpus_csv(
    source: &str,
    csv_data: &str,
    layout: CsvLayout<'_>,
) -> Result<Vec<CanonicalRecord>, ReconError> {
    read_csv(source, csv_data, layout, true)?
        .into_iter()
        .map(|r| r.into_canonical(source))
        .collect()
}

// ---------------------------------------------------------------------------
// XML
// ---------------------------------------------------------------------------

const COMPUTER: &[u8] = b"computer";

/// Reads every `<computer>` element. The first element with a field's tag,
/// at any depth and in document order, supplies that field; its value is
/// all the text it contains. Later elements with the same tag are ignored.
fn read_xml(xml: &str) -> Result<Vec<RawRecord>, ReconError> {
    let mut reader = Reader::from_str(xml);

    let mut rows = Vec::new();
    let mut current: Option<RawRecord> = None;
    // elements open inside the current <computer>
    let mut depth = 0usize;
    // tag being captured and the depth it opened at
    let mut field: Option<(Vec<u8>, usize)> = None;
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if let Some(row) = current.as_mut() {
                    depth += 1;
                    let tag = e.name().as_ref().to_vec();
                    if field.is_none() && row.slot(&tag).is_some_and(|v| v.is_none()) {
                        field = Some((tag, depth));
                        text.clear();
                    }
                } else if e.name().as_ref() == COMPUTER {
                    current = Some(RawRecord {
                        line: rows.len() + 1,
                        ..RawRecord::default()
                    });
                    depth = 0;
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(row) = current.as_mut() {
                    if field.is_none() {
                        if let Some(value) = row.slot(e.name().as_ref()) {
                            value.get_or_insert_with(String::new);
                        }
                    }
                } else if e.name().as_ref() == COMPUTER {
                    rows.push(RawRecord {
                        line: rows.len() + 1,
                        ..RawRecord::default()
                    });
                }
            }
            Ok(Event::Text(e)) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::CData(e)) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::GeneralRef(e)) if field.is_some() => {
                let name = String::from_utf8_lossy(&e).to_string();
                text.push_str(&resolve_entity(&name)?);
            }
            Ok(Event::End(_)) => {
                if let Some(row) = current.as_mut() {
                    if depth == 0 {
                        // </computer>
                        rows.extend(current.take());
                    } else {
                        if field.as_ref().is_some_and(|(_, at)| *at == depth) {
                            if let Some((tag, _)) = field.take() {
                                if let Some(value) = row.slot(&tag) {
                                    *value = Some(std::mem::take(&mut text));
                                }
                            }
                        }
                        depth -= 1;
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ReconError::Xml(format!(
                    "at byte {}: {e}",
                    reader.error_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if current.is_some() {
        return Err(ReconError::Xml("unterminated <computer> element".into()));
    }
    Ok(rows)
}

/// Predefined XML entities and numeric character references.
fn resolve_entity(name: &str) -> Result<String, ReconError> {
    let resolved = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => name
            .strip_prefix("#x")
            .map(|hex| u32::from_str_radix(hex, 16))
            .or_else(|| name.strip_prefix('#').map(|dec| dec.parse::<u32>()))
            .and_then(|code| code.ok())
            .and_then(char::from_u32),
    };
    resolved
        .map(String::from)
        .ok_or_else(|| ReconError::Xml(format!("unknown entity '&{name};'")))
}

pub fn load_candidates_xml(source: &str, xml: &str) -> Result<CandidateFeed, ReconError> {
    Ok(CandidateFeed::from_rows(source, read_xml(xml)?))
}

pub fn load_corpus_xml(source: &str, xml: &str) -> Result<Vec<CanonicalRecord>, ReconError> {
    read_xml(xml)?
        .into_iter()
        .map(|r| r.into_canonical(source))
        .collect()
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

pub fn load_candidates_file(
    path: &Path,
    layout: CsvLayout<'_>,
) -> Result<CandidateFeed, ReconError> {
    let format = InputFormat::from_path(path)?;
    let data = read_file(path)?;
    let source = path.display().to_string();
    match format {
        InputFormat::Csv => load_candidates_csv(&source, &data, layout),
        InputFormat::Xml => load_candidates_xml(&source, &data),
    }
}

pub fn load_corpus_file(
    path: &Path,
    layout: CsvLayout<'_>,
) -> Result<Vec<CanonicalRecord>, ReconError> {
    let format = InputFormat::from_path(path)?;
    let data = read_file(path)?;
    let source = path.display().to_string();
    match format {
        InputFormat::Csv => load_corpus_csv(&source, &data, layout),
        InputFormat::Xml => load_corpus_xml(&source, &data),
    }
}

/// Load both inputs named in the config. Relative paths resolve against `base_dir`.
pub fn load_input(input: &InputConfig, base_dir: &Path) -> Result<ReconInput, ReconError> {
    let layout = CsvLayout::for_input(input);
    let feed = load_candidates_file(&base_dir.join(&input.candidates), layout)?;
    let corpus = load_corpus_file(&base_dir.join(&input.corpus), layout)?;
    log::info!(
        "loaded {} candidate(s), {} rejected, and {} canonical record(s)",
        feed.records.len(),
        feed.rejected.len(),
        corpus.len()
    );
    Ok(ReconInput {
        candidates: feed.records,
        corpus,
        rejected: feed.rejected,
    })
}

fn read_file(path: &Path) -> Result<String, ReconError> {
    std::fs::read_to_string(path)
        .map_err(|e| ReconError::Io(format!("cannot read {}: {e}", path.display())))
}
