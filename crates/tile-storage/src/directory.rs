//! Directory-backed tile store.
//!
//! Layout under the root directory:
//!
//! ```text
//! catalog.json
//! {table}/{zoom}/{col}/{row}.png
//! {table}/{zoom}/{col}/{row}.jpg
//! ```
//!
//! `catalog.json` lists every coverage with its envelope, EPSG identifier
//! and levels. Tile counts are not trusted from the catalog; they are taken
//! from the files present on disk.

use std::fs;
use std::path::{Path, PathBuf};

use mosaic_common::{BoundingBox, Level, Pyramid, TileIndexRange};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::store::{StoredTile, TileCursor, TileStore};
use crate::{StorageError, StorageResult};

/// Encoding of the tiles of one coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileFormat {
    #[default]
    Png,
    Jpeg,
}

impl TileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TileFormat::Png => "png",
            TileFormat::Jpeg => "jpg",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(TileFormat::Png),
            "jpg" | "jpeg" => Some(TileFormat::Jpeg),
            _ => None,
        }
    }
}

/// One coverage as written in `catalog.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageEntry {
    pub name: String,
    pub srid: i32,
    pub bounds: BoundingBox,
    /// Format new tiles are written in; readers accept either extension
    #[serde(default)]
    pub format: TileFormat,
    pub levels: Vec<Level>,
}

impl CoverageEntry {
    pub fn to_pyramid(&self) -> StorageResult<Pyramid> {
        Ok(Pyramid::new(
            self.name.clone(),
            self.srid,
            self.bounds,
            self.levels.clone(),
        )?)
    }
}

/// Contents of `catalog.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    pub coverages: Vec<CoverageEntry>,
}

impl CatalogFile {
    fn entry(&self, name: &str) -> StorageResult<&CoverageEntry> {
        self.coverages
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| StorageError::UnknownCoverage(name.to_string()))
    }
}

pub const CATALOG_FILE: &str = "catalog.json";

fn check_table_name(name: &str) -> StorageResult<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(StorageError::Catalog(format!(
            "coverage name '{}' is not usable as a directory name",
            name
        )));
    }
    Ok(())
}

/// Tile store reading a pyramid laid out on the filesystem.
#[derive(Debug)]
pub struct DirectoryTileStore {
    root: PathBuf,
    catalog: CatalogFile,
}

impl DirectoryTileStore {
    /// Load `catalog.json` from `root` and validate every coverage.
    pub fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        let catalog_path = root.join(CATALOG_FILE);
        let raw = fs::read(&catalog_path).map_err(|e| StorageError::io(&catalog_path, e))?;
        let catalog: CatalogFile = serde_json::from_slice(&raw)?;

        for entry in &catalog.coverages {
            check_table_name(&entry.name)?;
            entry.to_pyramid()?;
        }

        info!(
            root = %root.display(),
            coverages = catalog.coverages.len(),
            "Opened directory tile store"
        );
        Ok(Self { root, catalog })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog(&self) -> &CatalogFile {
        &self.catalog
    }

    fn level_dir(&self, name: &str, zoom: u32) -> PathBuf {
        self.root.join(name).join(zoom.to_string())
    }

    /// Every tile file of one level as `(col, row, path)`.
    fn scan_level(&self, name: &str, zoom: u32) -> StorageResult<Vec<(i64, i64, PathBuf)>> {
        let dir = self.level_dir(name, zoom);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut tiles = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.clone());
                StorageError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            match parse_tile_path(entry.path()) {
                Some((col, row)) => tiles.push((col, row, entry.into_path())),
                None => warn!(path = %entry.path().display(), "Ignoring unrecognised file"),
            }
        }
        Ok(tiles)
    }
}

/// `{col}/{row}.{ext}` into `(col, row)`.
fn parse_tile_path(path: &Path) -> Option<(i64, i64)> {
    let ext = path.extension()?.to_str()?;
    TileFormat::from_extension(ext)?;
    let row = path.file_stem()?.to_str()?.parse().ok()?;
    let col = path.parent()?.file_name()?.to_str()?.parse().ok()?;
    Some((col, row))
}

impl TileStore for DirectoryTileStore {
    fn coverage_names(&self) -> Vec<String> {
        self.catalog.coverages.iter().map(|c| c.name.clone()).collect()
    }

    fn pyramid(&self, name: &str) -> StorageResult<Pyramid> {
        let entry = self.catalog.entry(name)?;

        let mut levels = Vec::with_capacity(entry.levels.len());
        for level in &entry.levels {
            let stored = self.scan_level(name, level.zoom)?.len() as u64;
            if stored != level.tile_count && level.tile_count != 0 {
                debug!(
                    coverage = %name,
                    zoom = level.zoom,
                    catalog = level.tile_count,
                    stored,
                    "Catalog tile count differs from disk"
                );
            }
            levels.push(Level {
                tile_count: stored,
                ..level.clone()
            });
        }

        Ok(Pyramid::new(entry.name.clone(), entry.srid, entry.bounds, levels)?)
    }

    fn open_cursor(
        &self,
        name: &str,
        zoom: u32,
        range: &TileIndexRange,
    ) -> StorageResult<Box<dyn TileCursor>> {
        let entry = self.catalog.entry(name)?;
        if !entry.levels.iter().any(|l| l.zoom == zoom) {
            return Err(StorageError::UnknownLevel {
                coverage: name.to_string(),
                zoom,
            });
        }

        let mut tiles: Vec<(i64, i64, PathBuf)> = self
            .scan_level(name, zoom)?
            .into_iter()
            .filter(|(col, row, _)| range.contains(*col, *row))
            .collect();
        tiles.sort_by_key(|(col, row, _)| (*row, *col));

        debug!(
            coverage = %name,
            zoom,
            range = %range,
            tiles = tiles.len(),
            "Opened directory cursor"
        );

        Ok(Box::new(DirectoryCursor {
            zoom,
            tiles: tiles.into_iter(),
        }))
    }
}

/// Reads tile files lazily, one per `next()`.
struct DirectoryCursor {
    zoom: u32,
    tiles: std::vec::IntoIter<(i64, i64, PathBuf)>,
}

impl Iterator for DirectoryCursor {
    type Item = StorageResult<StoredTile>;

    fn next(&mut self) -> Option<Self::Item> {
        let (col, row, path) = self.tiles.next()?;
        Some(
            fs::read(&path)
                .map(|data| StoredTile::new(self.zoom, col, row, data))
                .map_err(|e| StorageError::io(path, e)),
        )
    }
}

/// Builds a directory pyramid on disk.
pub struct DirectoryTileWriter {
    root: PathBuf,
    catalog: CatalogFile,
}

impl DirectoryTileWriter {
    pub fn create(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| StorageError::io(&root, e))?;
        Ok(Self {
            root,
            catalog: CatalogFile::default(),
        })
    }

    pub fn add_coverage(&mut self, pyramid: &Pyramid, format: TileFormat) -> StorageResult<()> {
        check_table_name(&pyramid.name)?;
        if self.catalog.entry(&pyramid.name).is_ok() {
            return Err(StorageError::Catalog(format!(
                "coverage '{}' added twice",
                pyramid.name
            )));
        }
        self.catalog.coverages.push(CoverageEntry {
            name: pyramid.name.clone(),
            srid: pyramid.srid,
            bounds: pyramid.bounds,
            format,
            levels: pyramid.levels().to_vec(),
        });
        Ok(())
    }

    /// Write one tile in the coverage's format.
    pub fn put_tile(
        &self,
        name: &str,
        zoom: u32,
        col: i64,
        row: i64,
        data: &[u8],
    ) -> StorageResult<PathBuf> {
        let entry = self.catalog.entry(name)?;
        if !entry.levels.iter().any(|l| l.zoom == zoom) {
            return Err(StorageError::UnknownLevel {
                coverage: name.to_string(),
                zoom,
            });
        }

        let dir = self
            .root
            .join(name)
            .join(zoom.to_string())
            .join(col.to_string());
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

        let path = dir.join(format!("{}.{}", row, entry.format.extension()));
        fs::write(&path, data).map_err(|e| StorageError::io(&path, e))?;
        Ok(path)
    }

    /// Write `catalog.json` and reopen the result as a store.
    pub fn finish(self) -> StorageResult<DirectoryTileStore> {
        let path = self.root.join(CATALOG_FILE);
        let json = serde_json::to_vec_pretty(&self.catalog)?;
        fs::write(&path, json).map_err(|e| StorageError::io(&path, e))?;
        DirectoryTileStore::open(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tile_path() {
        assert_eq!(parse_tile_path(Path::new("t/3/12/7.png")), Some((12, 7)));
        assert_eq!(parse_tile_path(Path::new("t/3/12/7.JPEG")), Some((12, 7)));
        assert_eq!(parse_tile_path(Path::new("t/3/12/7.tif")), None);
        assert_eq!(parse_tile_path(Path::new("t/3/x/7.png")), None);
    }

    #[test]
    fn test_table_name_rejects_separators() {
        assert!(check_table_name("elevation").is_ok());
        assert!(check_table_name("../etc").is_err());
        assert!(check_table_name("").is_err());
    }

    #[test]
    fn test_format_extension() {
        assert_eq!(TileFormat::Jpeg.extension(), "jpg");
        assert_eq!(TileFormat::from_extension("PNG"), Some(TileFormat::Png));
    }
}
