use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};
use url::form_urlencoded::byte_serialize;

use crate::process::series::AggregateStore;

/// `<entity>.json` with spaces turned into underscores and everything
/// else unsafe for a path percent-escaped.
pub fn entity_file_name(entity: &str) -> String {
    let underscored = entity.replace(' ', "_");
    let escaped: String = byte_serialize(underscored.as_bytes()).collect();
    format!("{}.json", escaped)
}

/// Write `value` as compact JSON to `path` via a temp file and rename.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{}.tmp", file_name));

    let file = fs::File::create(&tmp_path)
        .with_context(|| format!("creating {}", tmp_path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)
        .with_context(|| format!("serializing {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("flushing {}", tmp_path.display()))?;
    drop(writer);

    fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {} -> {}", tmp_path.display(), path.display()))?;
    Ok(())
}

/// Write one JSON document per entity into `dir`. Returns the paths written.
#[instrument(level = "info", skip(store))]
pub fn write_series(store: &AggregateStore, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut written = Vec::with_capacity(store.len());
    for (entity, series) in store.iter() {
        let path = dir.join(entity_file_name(entity));
        write_json_atomic(&path, series)?;
        debug!(entity = %entity, records = series.len(), path = %path.display(), "wrote series");
        written.push(path);
    }
    info!(files = written.len(), dir = %dir.display(), "wrote all series");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        population::PopulationTable,
        process::{filter::RowFilter, rows::RawRow, series::STATEWIDE, Aggregator},
    };
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_entity_file_name() {
        assert_eq!(entity_file_name("Boone"), "Boone.json");
        assert_eq!(entity_file_name("St. Louis City"), "St._Louis_City.json");
        assert_eq!(entity_file_name("Ste. Genevieve"), "Ste._Genevieve.json");
        assert_eq!(entity_file_name("a/b"), "a%2Fb.json");
        assert_eq!(entity_file_name("O'Brien"), "O%27Brien.json");
        assert_eq!(entity_file_name(STATEWIDE), "STATEWIDE.json");
    }

    #[test]
    fn test_write_series_one_file_per_entity() {
        let pops = PopulationTable::new(HashMap::from([
            ("St. Louis City".to_string(), 300_000),
            ("Boone".to_string(), 180_000),
        ]))
        .unwrap();
        let filter = RowFilter::new("Missouri", ["Unassigned"]);
        let agg = Aggregator::new(&pops, &filter);
        let mut store = AggregateStore::new();
        let d1 = NaiveDate::from_ymd_opt(2020, 3, 22).unwrap();
        let d2 = d1.succ_opt().unwrap();
        for (date, n) in [(d1, 4), (d2, 9)] {
            let rows = vec![
                RawRow::new("Missouri", "St. Louis City", n, 0),
                RawRow::new("Missouri", "Boone", 1, 0),
            ];
            agg.fold_date(&mut store, date, &rows).unwrap();
        }

        let tmp = tempdir().unwrap();
        let out = tmp.path().join("data");
        let mut files = write_series(&store, &out).unwrap();
        files.sort();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["Boone.json", "STATEWIDE.json", "St._Louis_City.json"]);

        let text = fs::read_to_string(out.join("St._Louis_City.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.keys().collect::<Vec<_>>(), vec!["2020-03-22", "2020-03-23"]);
        assert_eq!(value["2020-03-23"]["new_cases"], 5);
        assert!(value["2020-03-23"].get("past_7_days_new_cases").is_none());

        let state: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join("STATEWIDE.json")).unwrap()).unwrap();
        assert_eq!(state["2020-03-23"]["cases"], 10);
        assert_eq!(state["2020-03-23"]["past_7_days_new_cases"], 5);

        // no temp files left behind
        let leftovers = fs::read_dir(&out)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
