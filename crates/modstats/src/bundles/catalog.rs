//! Flat-file bundle catalog: the CSV export plus its JSON twin.

use super::BundleKey;
use crate::enrichment::ResolvedEntity;
use crate::error::StatsResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One bundle row. Column order is the CSV header order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRecord {
    pub id: Option<i64>,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub downloads: i64,
    pub link: String,
}

impl BundleKey for BundleRecord {
    fn slug(&self) -> &str {
        &self.slug
    }

    fn id(&self) -> Option<i64> {
        self.id
    }
}

impl From<ResolvedEntity> for BundleRecord {
    fn from(e: ResolvedEntity) -> Self {
        Self {
            id: Some(e.id),
            name: e.name,
            slug: e.slug,
            downloads: e.downloads,
            link: e.link,
        }
    }
}

/// Hand-edited CSVs leave blank or junk numeric cells; read them leniently.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default, deserialize_with = "csv::invalid_option")]
    id: Option<i64>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    slug: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    downloads: Option<i64>,
    #[serde(default)]
    link: String,
}

impl From<CsvRow> for BundleRecord {
    fn from(row: CsvRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            downloads: row.downloads.unwrap_or(0),
            link: row.link,
        }
    }
}

/// Aggregate figures over the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub total: usize,
    pub with_downloads: usize,
    pub total_downloads: i64,
    pub with_ids: usize,
}

/// The bundle list as last exported, with CSV as the primary copy.
#[derive(Debug, Clone)]
pub struct BundleCatalog {
    csv_path: PathBuf,
    json_path: PathBuf,
    records: Vec<BundleRecord>,
}

impl BundleCatalog {
    pub fn new(csv_path: impl Into<PathBuf>, json_path: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: csv_path.into(),
            json_path: json_path.into(),
            records: Vec::new(),
        }
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    pub fn records(&self) -> &[BundleRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Load from CSV, falling back to JSON when the CSV is missing, empty or unreadable.
    pub fn load(&mut self) -> &[BundleRecord] {
        let from_csv = self.load_csv().unwrap_or_else(|e| {
            tracing::warn!("failed to read {}: {e}", self.csv_path.display());
            Vec::new()
        });

        self.records = if from_csv.is_empty() {
            self.load_json().unwrap_or_else(|e| {
                tracing::warn!("failed to read {}: {e}", self.json_path.display());
                Vec::new()
            })
        } else {
            from_csv
        };

        tracing::debug!("loaded {} bundles from flat files", self.records.len());
        &self.records
    }

    /// Records from the CSV file; a missing file is an empty list.
    pub fn load_csv(&self) -> StatsResult<Vec<BundleRecord>> {
        if !self.csv_path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.csv_path)?;
        let mut records = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            records.push(row?.into());
        }
        Ok(records)
    }

    /// Records from the JSON file; a missing file is an empty list.
    pub fn load_json(&self) -> StatsResult<Vec<BundleRecord>> {
        if !self.json_path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&self.json_path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Rewrite the CSV with `records` and adopt them. An empty list leaves the
    /// file untouched and returns `false`.
    pub fn save_csv(&mut self, records: Vec<BundleRecord>) -> StatsResult<bool> {
        if records.is_empty() {
            return Ok(false);
        }
        ensure_parent(&self.csv_path)?;

        let mut writer = csv::Writer::from_path(&self.csv_path)?;
        for record in &records {
            writer.serialize(record)?;
        }
        writer.flush()?;

        tracing::info!("wrote {} bundles to {}", records.len(), self.csv_path.display());
        self.records = records;
        Ok(true)
    }

    /// Write the current records as pretty JSON.
    pub fn save_json(&self) -> StatsResult<bool> {
        if self.records.is_empty() {
            return Ok(false);
        }
        ensure_parent(&self.json_path)?;
        let data = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(&self.json_path, data)?;
        Ok(true)
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            total: self.records.len(),
            with_downloads: self.records.iter().filter(|r| r.downloads > 0).count(),
            total_downloads: self.records.iter().map(|r| r.downloads).sum(),
            with_ids: self.records.iter().filter(|r| r.id.is_some()).count(),
        }
    }

    /// Records ordered by downloads, largest first when `descending`.
    pub fn sorted_by_downloads(&self, descending: bool) -> Vec<BundleRecord> {
        let mut sorted = self.records.clone();
        if descending {
            sorted.sort_by(|a, b| b.downloads.cmp(&a.downloads));
        } else {
            sorted.sort_by_key(|r| r.downloads);
        }
        sorted
    }

    /// Case-insensitive substring match on the bundle name.
    pub fn filter_by_name(&self, query: &str) -> Vec<BundleRecord> {
        let needle = query.to_lowercase();
        self.records
            .iter()
            .filter(|r| r.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }
}

fn ensure_parent(path: &Path) -> StatsResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: Option<i64>, name: &str, downloads: i64) -> BundleRecord {
        let slug = name.to_lowercase().replace(' ', "-");
        BundleRecord {
            id,
            name: name.to_string(),
            link: format!("https://www.curseforge.com/minecraft/modpacks/{slug}"),
            slug,
            downloads,
        }
    }

    fn catalog(dir: &TempDir) -> BundleCatalog {
        BundleCatalog::new(dir.path().join("packs.csv"), dir.path().join("packs.json"))
    }

    #[test]
    fn test_csv_roundtrip_keeps_header_order() {
        let dir = TempDir::new().unwrap();
        let mut cat = catalog(&dir);
        let rows = vec![
            record(Some(123456), "Nuclear Age", 5000),
            record(None, "Tiny, Pack", 0),
        ];

        assert!(cat.save_csv(rows.clone()).unwrap());
        let text = std::fs::read_to_string(cat.csv_path()).unwrap();
        assert!(text.starts_with("id,name,slug,downloads,link\n"));
        assert!(text.contains(",\"Tiny, Pack\","));

        assert_eq!(cat.load_csv().unwrap(), rows);
    }

    #[test]
    fn test_save_csv_refuses_empty_list() {
        let dir = TempDir::new().unwrap();
        let mut cat = catalog(&dir);
        assert!(!cat.save_csv(Vec::new()).unwrap());
        assert!(!cat.csv_path().exists());
    }

    #[test]
    fn test_load_falls_back_to_json() {
        let dir = TempDir::new().unwrap();
        let rows = vec![record(Some(22222), "From Json", 10)];
        std::fs::write(
            dir.path().join("packs.json"),
            serde_json::to_string(&rows).unwrap(),
        )
        .unwrap();

        let mut cat = catalog(&dir);
        assert_eq!(cat.load(), rows.as_slice());
    }

    #[test]
    fn test_blank_numeric_cells_are_lenient() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("packs.csv"),
            "id,name,slug,downloads,link\n,Manual,manual,,https://x\n",
        )
        .unwrap();

        let cat = catalog(&dir);
        let loaded = cat.load_csv().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, None);
        assert_eq!(loaded[0].downloads, 0);
    }

    #[test]
    fn test_stats_sort_and_filter() {
        let dir = TempDir::new().unwrap();
        let mut cat = catalog(&dir);
        cat.save_csv(vec![
            record(Some(11111), "Create Above", 300),
            record(None, "Skyblock", 0),
            record(Some(33333), "create lite", 900),
        ])
        .unwrap();

        assert_eq!(
            cat.stats(),
            CatalogStats {
                total: 3,
                with_downloads: 2,
                total_downloads: 1200,
                with_ids: 2,
            }
        );

        let top: Vec<i64> = cat.sorted_by_downloads(true).iter().map(|r| r.downloads).collect();
        assert_eq!(top, vec![900, 300, 0]);
        let bottom: Vec<i64> = cat.sorted_by_downloads(false).iter().map(|r| r.downloads).collect();
        assert_eq!(bottom, vec![0, 300, 900]);

        let names: Vec<String> = cat.filter_by_name("CREATE").into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Create Above", "create lite"]);
    }

    #[test]
    fn test_json_export_mirrors_records() {
        let dir = TempDir::new().unwrap();
        let mut cat = catalog(&dir);
        assert!(!cat.save_json().unwrap());

        cat.save_csv(vec![record(Some(44444), "Mirror", 7)]).unwrap();
        assert!(cat.save_json().unwrap());
        assert_eq!(cat.load_json().unwrap(), cat.records());
    }
}
