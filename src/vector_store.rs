//! Quoted Postgres identifiers for the book and page tables and for the
//! indexes and constraints created on them.

use std::fmt;

use crate::error::StoreError;

/// Longest identifier Postgres keeps (`NAMEDATALEN - 1`); longer names are truncated.
const MAX_IDENT_BYTES: usize = 63;

/// Schema-qualified table the store reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    schema: String,
    table: String,
}

impl TableName {
    /// Validates and stores a schema/table pair.
    pub fn new<S, T>(schema: S, table: T) -> Result<Self, StoreError>
    where
        S: Into<String>,
        T: Into<String>,
    {
        let schema = schema.into();
        let table = table.into();
        for (what, value) in [("schema", &schema), ("table", &table)] {
            if value.trim().is_empty() {
                return Err(StoreError::Invalid(format!("{what} name is required")));
            }
            if value.contains('\0') {
                return Err(StoreError::Invalid(format!(
                    "{what} name must not contain NUL bytes"
                )));
            }
        }
        Ok(Self { schema, table })
    }

    /// `"schema"."table"`, ready to splice into SQL.
    pub fn qualified(&self) -> String {
        format!("{}.{}", Quoted(&self.schema), Quoted(&self.table))
    }

    /// Schema the table lives in.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Quoted name of an index on this table, e.g. `"public_pages_embedding_hnsw_idx"`.
    ///
    /// The schema is part of the name because index names share the schema
    /// namespace with tables.
    pub fn index_name(&self, purpose: &str) -> String {
        derived_name(&[&self.schema, &self.table, purpose], "idx")
    }

    /// Quoted name of a constraint on this table, e.g. `"pages_book_page_key"`.
    pub fn constraint_name(&self, purpose: &str) -> String {
        derived_name(&[&self.table, purpose], "key")
    }
}

/// Joins name segments with `_`, keeping ASCII alphanumerics only, and
/// trims the result so Postgres stores it unchanged.
fn derived_name(segments: &[&str], suffix: &str) -> String {
    let mut name: String = segments
        .iter()
        .map(|segment| {
            segment
                .chars()
                .map(|ch| {
                    if ch.is_ascii_alphanumeric() {
                        ch.to_ascii_lowercase()
                    } else {
                        '_'
                    }
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("_");
    let tail = format!("_{suffix}");
    name.truncate(MAX_IDENT_BYTES - tail.len());
    name.push_str(&tail);
    Quoted(&name).to_string()
}

/// Double-quoted identifier with embedded quotes doubled.
struct Quoted<'a>(&'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"")?;
        for ch in self.0.chars() {
            if ch == '"' {
                f.write_str("\"\"")?;
            } else {
                write!(f, "{ch}")?;
            }
        }
        f.write_str("\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_names_escape_quotes() {
        let table = TableName::new("library", "pa\"ges").unwrap();
        assert_eq!(table.qualified(), "\"library\".\"pa\"\"ges\"");
        assert_eq!(table.schema(), "library");
    }

    #[test]
    fn schema_objects_get_stable_names() {
        let pages = TableName::new("public", "pages").unwrap();
        assert_eq!(
            pages.index_name("embedding_hnsw"),
            "\"public_pages_embedding_hnsw_idx\""
        );
        assert_eq!(pages.index_name("book_id"), "\"public_pages_book_id_idx\"");
        assert_eq!(pages.constraint_name("book_page"), "\"pages_book_page_key\"");

        let odd = TableName::new("Kitab Lib", "pa\"ges").unwrap();
        assert_eq!(
            odd.index_name("embedding hnsw"),
            "\"kitab_lib_pa_ges_embedding_hnsw_idx\""
        );
    }

    #[test]
    fn long_derived_names_fit_postgres_identifier_limit() {
        let schema = "s".repeat(80);
        let pages = TableName::new(schema, "pages").unwrap();
        let name = pages.index_name("embedding_hnsw");
        let bare = name.trim_matches('"');
        assert_eq!(bare.len(), MAX_IDENT_BYTES);
        assert!(bare.ends_with("_idx"));
    }

    #[test]
    fn blank_or_nul_names_are_rejected() {
        assert!(TableName::new(" ", "pages").is_err());
        assert!(TableName::new("public", "").is_err());
        assert!(matches!(
            TableName::new("public", "pa\0ges"),
            Err(StoreError::Invalid(_))
        ));
    }
}
