//! Ordinal encoding of categorical attributes.
//!
//! Each attribute declares a finite domain. The domain is sorted
//! lexicographically to fix a canonical order, and values are mapped to
//! dense codes `0..k`. [`decode`] exactly inverts [`encode`] for any
//! in-domain value.
//!
//! ```text
//! domain ["c", "a", "b"]  →  sorted ["a", "b", "c"]
//!           "a" ↔ 0     "b" ↔ 1     "c" ↔ 2
//! ```
//!
//! Encoding a value outside the declared domain raises
//! [`SynthError::UnknownCategory`]. Both functions are pure.

use hashbrown::HashMap;

use crate::error::{Result, SynthError};
use crate::matrix::EncodedMatrix;

// ─── Attribute ───────────────────────────────────────────────────────────────

/// A named categorical attribute with a finite declared domain.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attribute {
    /// Column name.
    pub name: String,
    /// Declared domain values, in any order.
    pub domain: Vec<String>,
}

impl Attribute {
    /// Declare an attribute.
    pub fn new<I, S>(name: impl Into<String>, domain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { name: name.into(), domain: domain.into_iter().map(Into::into).collect() }
    }

    /// Number of distinct declared values.
    pub fn cardinality(&self) -> usize {
        self.domain.len()
    }
}

// ─── Table ───────────────────────────────────────────────────────────────────

/// A small in-memory categorical table: named columns, string cells.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Empty table with the given columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { columns: columns.into_iter().map(Into::into).collect(), rows: Vec::new() }
    }

    /// Build a table from rows, checking each row's width.
    pub fn from_rows<I, S, R, C>(columns: I, rows: R) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        R: IntoIterator<Item = Vec<C>>,
        C: Into<String>,
    {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Append a row. Its width must equal the column count.
    pub fn push_row<C: Into<String>>(&mut self, row: Vec<C>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(SynthError::config(format!(
                "row has {} cells, table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row.into_iter().map(Into::into).collect());
        Ok(())
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

// ─── OrdinalCodec ────────────────────────────────────────────────────────────

/// Bidirectional map between one attribute's values and its dense codes.
#[derive(Clone, Debug)]
pub struct OrdinalCodec {
    name: String,
    from_index: Vec<String>,
    to_index: HashMap<String, u32>,
}

impl OrdinalCodec {
    /// Build the codec for `attribute`.
    ///
    /// Fails on an empty domain, a repeated value, or a domain too large for
    /// `u32` codes.
    pub fn new(attribute: &Attribute) -> Result<Self> {
        if attribute.domain.is_empty() {
            return Err(SynthError::config(format!(
                "attribute '{}' has an empty domain",
                attribute.name
            )));
        }
        if u32::try_from(attribute.domain.len()).is_err() {
            return Err(SynthError::config(format!(
                "attribute '{}' has more than u32::MAX values",
                attribute.name
            )));
        }

        let mut from_index = attribute.domain.clone();
        from_index.sort();
        if let Some(w) = from_index.windows(2).find(|w| w[0] == w[1]) {
            return Err(SynthError::config(format!(
                "attribute '{}' declares value '{}' twice",
                attribute.name, w[0]
            )));
        }

        let to_index = from_index
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i as u32))
            .collect();

        Ok(Self { name: attribute.name.clone(), from_index, to_index })
    }

    /// Attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Domain size `k`.
    pub fn cardinality(&self) -> usize {
        self.from_index.len()
    }

    /// Domain values in code order.
    pub fn values(&self) -> &[String] {
        &self.from_index
    }

    /// Code of `value`.
    pub fn encode_value(&self, value: &str) -> Result<u32> {
        self.to_index.get(value).copied().ok_or_else(|| SynthError::UnknownCategory {
            attribute: self.name.clone(),
            value: value.to_string(),
        })
    }

    /// Value for `code`, or `None` when out of range.
    pub fn decode_value(&self, code: u32) -> Option<&str> {
        self.from_index.get(code as usize).map(String::as_str)
    }

    /// Reconstruct the attribute declaration (in canonical order).
    pub fn attribute(&self) -> Attribute {
        Attribute { name: self.name.clone(), domain: self.from_index.clone() }
    }
}

/// Build one codec per attribute, in attribute order.
pub fn codecs_for(attributes: &[Attribute]) -> Result<Vec<OrdinalCodec>> {
    attributes.iter().map(OrdinalCodec::new).collect()
}

// ─── encode / decode ─────────────────────────────────────────────────────────

/// Encode `table` against the declared `attributes`.
///
/// Attribute order fixes the matrix column order (and therefore the axis
/// order of every tensor built from it). Each attribute must name a column of
/// `table`; extra table columns are ignored.
pub fn encode(
    table: &Table,
    attributes: &[Attribute],
) -> Result<(EncodedMatrix, Vec<OrdinalCodec>)> {
    let codecs = codecs_for(attributes)?;
    let matrix = encode_with(table, &codecs)?;
    Ok((matrix, codecs))
}

/// Encode `table` with codecs that were built beforehand.
pub fn encode_with(table: &Table, codecs: &[OrdinalCodec]) -> Result<EncodedMatrix> {
    if codecs.is_empty() {
        return Err(SynthError::config("at least one attribute is required"));
    }
    let positions = codecs
        .iter()
        .map(|c| {
            table.column_index(c.name()).ok_or_else(|| {
                SynthError::config(format!("table has no column named '{}'", c.name()))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut matrix = EncodedMatrix::with_capacity(codecs.len(), table.n_rows());
    let mut buf = vec![0u32; codecs.len()];
    for row in table.rows() {
        for (slot, (codec, &pos)) in buf.iter_mut().zip(codecs.iter().zip(&positions)) {
            *slot = codec.encode_value(&row[pos])?;
        }
        matrix.push_row(&buf)?;
    }
    Ok(matrix)
}

/// Decode `matrix` back to a table whose columns are the codec names.
pub fn decode(matrix: &EncodedMatrix, codecs: &[OrdinalCodec]) -> Result<Table> {
    if matrix.n_cols() != codecs.len() {
        return Err(SynthError::config(format!(
            "matrix has {} columns but {} codecs were given",
            matrix.n_cols(),
            codecs.len()
        )));
    }
    let mut table = Table::new(codecs.iter().map(|c| c.name().to_string()));
    table.rows.reserve(matrix.n_rows());
    for row in matrix.rows() {
        let decoded = row
            .iter()
            .zip(codecs)
            .map(|(&code, codec)| {
                codec.decode_value(code).map(str::to_string).ok_or_else(|| {
                    SynthError::config(format!(
                        "code {} out of range for attribute '{}' (k = {})",
                        code,
                        codec.name(),
                        codec.cardinality()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        table.rows.push(decoded);
    }
    Ok(table)
}
