use std::fs;
use std::path::{Path, PathBuf};

use finscan_core::LogicalTable;

use crate::record::TableSource;
use crate::serializer::{ExportNaming, ExportSerializer};
use crate::ExportError;

/// The two files written for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedPair {
    pub table_id: String,
    pub csv_path: PathBuf,
    pub json_path: PathBuf,
}

impl ExportSerializer {
    /// Write `{basename}_t{index}.csv` and `.json` into `dir`.
    ///
    /// Both artifacts are rendered before touching the filesystem and staged
    /// as temporary siblings. Either both final files appear or neither does.
    pub fn write_pair(
        &self,
        dir: &Path,
        naming: &ExportNaming,
        index: usize,
        table: &LogicalTable,
        source: &TableSource,
    ) -> Result<ExportedPair, ExportError> {
        let table_id = naming.table_id(index);
        let csv_text = self.to_csv(table)?;
        let json_text = self.to_json(table, source, &table_id)?;

        fs::create_dir_all(dir).map_err(|e| ExportError::io(dir, e))?;

        let csv_path = dir.join(naming.csv_name(index));
        let json_path = dir.join(naming.json_name(index));
        let csv_tmp = staging_path(&csv_path);
        let json_tmp = staging_path(&json_path);

        let staged = stage(&csv_tmp, &csv_text).and_then(|_| stage(&json_tmp, &json_text));
        if let Err(e) = staged {
            discard(&[csv_tmp.as_path(), json_tmp.as_path()]);
            return Err(e);
        }

        if let Err(e) = fs::rename(&csv_tmp, &csv_path) {
            discard(&[csv_tmp.as_path(), json_tmp.as_path()]);
            return Err(ExportError::io(&csv_path, e));
        }
        if let Err(e) = fs::rename(&json_tmp, &json_path) {
            discard(&[json_tmp.as_path(), csv_path.as_path()]);
            return Err(ExportError::io(&json_path, e));
        }

        tracing::debug!(table_id = %table_id, "exported {}", csv_path.display());
        Ok(ExportedPair { table_id, csv_path, json_path })
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn stage(path: &Path, contents: &str) -> Result<(), ExportError> {
    fs::write(path, contents).map_err(|e| ExportError::io(path, e))
}

fn discard(paths: &[&Path]) {
    for p in paths {
        if p.exists() {
            let _ = fs::remove_file(p);
        }
    }
}
