use std::path::Path;

use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};

pub const EXTERNAL_ID_COLUMN: &str = "ExternalId__c";
pub const LANGUAGE_COLUMN: &str = "Language";
pub const TITLE_COLUMN: &str = "Title";
pub const BODY_COLUMN: &str = "Answer__c";

pub const MANIFEST_FILENAME: &str = "articles_to_migrate.csv";

/// Positions of the columns the migration reads and rewrites. Any other
/// columns in the export are carried through to the output manifest
/// untouched.
#[derive(Debug, Clone, Copy)]
pub struct ColumnLayout {
    pub external_id: usize,
    pub language: usize,
    pub title: usize,
    pub body: usize,
}

impl ColumnLayout {
    pub fn from_headers(headers: &StringRecord) -> Result<Self> {
        Ok(Self {
            external_id: column_index(headers, EXTERNAL_ID_COLUMN)?,
            language: column_index(headers, LANGUAGE_COLUMN)?,
            title: column_index(headers, TITLE_COLUMN)?,
            body: column_index(headers, BODY_COLUMN)?,
        })
    }

    /// Typed view over one raw row. Cells absent from a short row come back
    /// as `None` so the caller can coerce them explicitly.
    pub fn article<'r>(&self, row: &'r StringRecord) -> ArticleRecord<'r> {
        ArticleRecord {
            external_id: row.get(self.external_id).unwrap_or_default(),
            language: row.get(self.language).unwrap_or_default(),
            title: row.get(self.title),
            body: row.get(self.body),
        }
    }

    /// Copy `row` with the body cell replaced, padding short rows up to the
    /// body column.
    pub fn with_body(&self, row: &StringRecord, body: &str) -> StringRecord {
        let width = row.len().max(self.body + 1);
        let mut output = StringRecord::with_capacity(row.as_slice().len() + body.len(), width);
        for index in 0..width {
            if index == self.body {
                output.push_field(body);
            } else {
                output.push_field(row.get(index).unwrap_or_default());
            }
        }
        output
    }
}

/// One row of the input table, borrowed from the manifest.
#[derive(Debug, Clone, Copy)]
pub struct ArticleRecord<'r> {
    pub external_id: &'r str,
    pub language: &'r str,
    pub title: Option<&'r str>,
    pub body: Option<&'r str>,
}

impl ArticleRecord<'_> {
    /// Directory key for this article's output subtree.
    pub fn directory_name(&self) -> String {
        format!("{}_{}", self.language, self.external_id)
    }
}

/// The parsed CSV export: header, column layout, and all data rows.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub headers: StringRecord,
    pub layout: ColumnLayout,
    pub rows: Vec<StringRecord>,
}

pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read headers from {}", path.display()))?
        .clone();
    let layout = ColumnLayout::from_headers(&headers)
        .with_context(|| format!("unusable header row in {}", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.with_context(|| format!("failed to read record from {}", path.display()))?;
        rows.push(record);
    }
    Ok(Manifest {
        headers,
        layout,
        rows,
    })
}

pub fn write_manifest(path: &Path, headers: &StringRecord, rows: &[StringRecord]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer
        .write_record(headers)
        .context("failed to write manifest header")?;
    for row in rows {
        writer
            .write_record(row)
            .context("failed to write manifest row")?;
    }
    writer.flush().context("failed to flush manifest")?;
    Ok(())
}

fn column_index(headers: &StringRecord, name: &str) -> Result<usize> {
    match headers.iter().position(|header| header == name) {
        Some(index) => Ok(index),
        None => bail!("required column {name} is missing"),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    fn write_csv(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("articles.csv");
        fs::write(&path, contents).expect("write csv");
        (temp, path)
    }

    #[test]
    fn load_manifest_locates_required_columns() {
        let (_temp, path) = write_csv(
            "ExternalId__c,Language,Title,Answer__c\n\
             kA01,en_US,Hello,<p>Hi</p>\n",
        );
        let manifest = load_manifest(&path).expect("load");
        assert_eq!(manifest.rows.len(), 1);

        let article = manifest.layout.article(&manifest.rows[0]);
        assert_eq!(article.external_id, "kA01");
        assert_eq!(article.language, "en_US");
        assert_eq!(article.title, Some("Hello"));
        assert_eq!(article.body, Some("<p>Hi</p>"));
        assert_eq!(article.directory_name(), "en_US_kA01");
    }

    #[test]
    fn load_manifest_rejects_missing_required_column() {
        let (_temp, path) = write_csv("ExternalId__c,Language,Title\nkA01,en_US,Hello\n");
        let error = load_manifest(&path).expect_err("must fail");
        assert!(error.root_cause().to_string().contains("Answer__c"));
    }

    #[test]
    fn columns_outside_the_required_four_are_preserved() {
        let (_temp, path) = write_csv(
            "ExternalId__c,Language,Title,Answer__c,UrlName\n\
             kA01,en_US,Hello,<p>Hi</p>,hello-article\n",
        );
        let manifest = load_manifest(&path).expect("load");
        let rewritten = manifest
            .layout
            .with_body(&manifest.rows[0], "en_US_kA01/en_US_kA01.html");
        assert_eq!(rewritten.get(3), Some("en_US_kA01/en_US_kA01.html"));
        assert_eq!(rewritten.get(4), Some("hello-article"));
    }

    #[test]
    fn short_rows_surface_missing_cells_as_none() {
        let (_temp, path) = write_csv("ExternalId__c,Language,Title,Answer__c\nkA01,en_US\n");
        let manifest = load_manifest(&path).expect("load");
        let article = manifest.layout.article(&manifest.rows[0]);
        assert_eq!(article.external_id, "kA01");
        assert_eq!(article.title, None);
        assert_eq!(article.body, None);
    }

    #[test]
    fn with_body_pads_short_rows() {
        let (_temp, path) = write_csv("ExternalId__c,Language,Title,Answer__c\nkA01,en_US\n");
        let manifest = load_manifest(&path).expect("load");
        let rewritten = manifest.layout.with_body(&manifest.rows[0], "a/b.html");
        assert_eq!(rewritten.len(), 4);
        assert_eq!(rewritten.get(2), Some(""));
        assert_eq!(rewritten.get(3), Some("a/b.html"));
    }

    #[test]
    fn manifest_round_trips_through_write() {
        let (_temp, path) = write_csv(
            "ExternalId__c,Language,Title,Answer__c\n\
             kA01,en_US,First,<p>1</p>\n\
             kA02,fr,Second,<p>2</p>\n",
        );
        let manifest = load_manifest(&path).expect("load");

        let out_path = path.with_file_name("out.csv");
        write_manifest(&out_path, &manifest.headers, &manifest.rows).expect("write");

        let reloaded = load_manifest(&out_path).expect("reload");
        assert_eq!(reloaded.headers, manifest.headers);
        assert_eq!(reloaded.rows, manifest.rows);
    }
}
