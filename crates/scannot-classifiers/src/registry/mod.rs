//! Directory-backed collections of trained classifiers.
//!
//! A [`ModelRegistry`] is one directory holding one record file per cell
//! type. A [`RegistrySet`] layers a writable user registry over an optional
//! read-only registry of default classifiers.
mod record;

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::classifier::CellTypeClassifier;
use crate::error::{ClassifierError, Result};
use crate::models::SvmClassifier;

pub use record::{read_classifier_file, write_classifier_file, FORMAT_VERSION};

const RECORD_EXTENSION: &str = "json";

/// Which classifiers to load for prediction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CellTypeSelection {
    #[default]
    All,
    Only(Vec<String>),
}

/// Options for [`RegistrySet::save`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Replace a classifier of the same name.
    pub overwrite: bool,
    /// Consider the default registry when checking names and parents.
    pub include_default: bool,
}

/// A directory of classifier records keyed by cell type.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    root: PathBuf,
    read_only: bool,
}

impl ModelRegistry {
    /// Open a writable registry, creating the directory when needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(ModelRegistry {
            root: root.as_ref().to_path_buf(),
            read_only: false,
        })
    }

    /// Open an existing directory that will never be written to.
    pub fn open_read_only<P: AsRef<Path>>(root: P) -> Result<Self> {
        if !root.as_ref().is_dir() {
            return Err(ClassifierError::NotFound(format!(
                "registry directory {}",
                root.as_ref().display()
            )));
        }
        Ok(ModelRegistry {
            root: root.as_ref().to_path_buf(),
            read_only: true,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn path_for(&self, cell_type: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", encode_file_stem(cell_type), RECORD_EXTENSION))
    }

    pub fn contains(&self, cell_type: &str) -> bool {
        self.path_for(cell_type).is_file()
    }

    /// Cell types stored in this registry.
    pub fn list(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match decode_file_stem(stem) {
                Some(name) => {
                    names.insert(name);
                }
                None => log::warn!("Ignoring unexpected file in registry: {}", path.display()),
            }
        }
        Ok(names)
    }

    pub fn load(&self, cell_type: &str) -> Result<CellTypeClassifier<SvmClassifier>> {
        let path = self.path_for(cell_type);
        if !path.is_file() {
            return Err(ClassifierError::NotFound(format!(
                "'{}' in {}",
                cell_type,
                self.root.display()
            )));
        }
        let classifier = read_classifier_file(&path)?;
        if classifier.cell_type() != cell_type {
            return Err(ClassifierError::Data(format!(
                "{} holds '{}' instead of '{}'",
                path.display(),
                classifier.cell_type(),
                cell_type
            )));
        }
        Ok(classifier)
    }

    /// Save into this registry alone; the parent must already be stored here.
    pub fn save(
        &self,
        classifier: &CellTypeClassifier<SvmClassifier>,
        overwrite: bool,
    ) -> Result<PathBuf> {
        RegistrySet::new(Some(self.clone()), None).save(
            classifier,
            SaveOptions {
                overwrite,
                include_default: false,
            },
        )
    }

    pub fn delete(&self, cell_type: &str) -> Result<()> {
        if self.read_only {
            return Err(ClassifierError::Conflict(format!(
                "registry {} is read-only",
                self.root.display()
            )));
        }
        let path = self.path_for(cell_type);
        if !path.is_file() {
            return Err(ClassifierError::NotFound(format!(
                "'{}' in {}",
                cell_type,
                self.root.display()
            )));
        }

        let children = self.children_of(cell_type)?;
        fs::remove_file(&path)?;
        if !children.is_empty() {
            log::warn!(
                "Deleted '{}' although {} still name it as parent: {}",
                cell_type,
                children.len(),
                children.join(", ")
            );
        }
        log::info!("Deleted classifier '{}' from {}", cell_type, self.root.display());
        Ok(())
    }

    fn children_of(&self, cell_type: &str) -> Result<Vec<String>> {
        let mut children = Vec::new();
        for name in self.list()? {
            if name == cell_type {
                continue;
            }
            match self.load(&name) {
                Ok(c) if c.parent_type() == Some(cell_type) => children.push(name),
                Ok(_) => {}
                Err(e) => log::warn!("Could not read '{}' while checking children: {}", name, e),
            }
        }
        Ok(children)
    }

    fn write(&self, classifier: &CellTypeClassifier<SvmClassifier>) -> Result<PathBuf> {
        if self.read_only {
            return Err(ClassifierError::Conflict(format!(
                "registry {} is read-only",
                self.root.display()
            )));
        }
        let path = self.path_for(classifier.cell_type());
        write_classifier_file(&path, classifier)?;
        Ok(path)
    }
}

/// A user registry layered over an optional read-only default registry.
///
/// Lookups try the user registry first and fall back to the defaults.
#[derive(Debug, Clone, Default)]
pub struct RegistrySet {
    user: Option<ModelRegistry>,
    defaults: Option<ModelRegistry>,
}

impl RegistrySet {
    pub fn new(user: Option<ModelRegistry>, defaults: Option<ModelRegistry>) -> Self {
        RegistrySet { user, defaults }
    }

    pub fn user(&self) -> Option<&ModelRegistry> {
        self.user.as_ref()
    }

    pub fn defaults(&self) -> Option<&ModelRegistry> {
        self.defaults.as_ref()
    }

    fn layers(&self) -> impl Iterator<Item = &ModelRegistry> {
        self.user.iter().chain(self.defaults.iter())
    }

    /// Union of the cell types of every layer.
    pub fn list(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for registry in self.layers() {
            names.extend(registry.list()?);
        }
        Ok(names)
    }

    pub fn contains(&self, cell_type: &str) -> bool {
        self.layers().any(|r| r.contains(cell_type))
    }

    pub fn load(&self, cell_type: &str) -> Result<CellTypeClassifier<SvmClassifier>> {
        for registry in self.layers() {
            if registry.contains(cell_type) {
                return registry.load(cell_type);
            }
        }
        Err(ClassifierError::NotFound(cell_type.to_string()))
    }

    /// Save into the user registry.
    ///
    /// Fails with `Conflict` when the name is taken and `overwrite` is off,
    /// and with `Data` when the declared parent is not stored (in the user
    /// registry, or in the defaults with `include_default`).
    pub fn save(
        &self,
        classifier: &CellTypeClassifier<SvmClassifier>,
        options: SaveOptions,
    ) -> Result<PathBuf> {
        let user = self.user.as_ref().ok_or_else(|| {
            ClassifierError::Conflict("no writable registry to save into".to_string())
        })?;
        let name = classifier.cell_type();

        let taken = user.contains(name)
            || (options.include_default
                && self.defaults.as_ref().is_some_and(|d| d.contains(name)));
        if taken && !options.overwrite {
            return Err(ClassifierError::Conflict(format!(
                "a classifier for '{}' already exists; enable overwrite to replace it",
                name
            )));
        }

        if let Some(parent) = classifier.parent_type() {
            let known = user.contains(parent)
                || (options.include_default
                    && self.defaults.as_ref().is_some_and(|d| d.contains(parent)));
            if !known {
                return Err(ClassifierError::Data(format!(
                    "parent '{}' of '{}' is not in the target registry",
                    parent, name
                )));
            }
        }

        let path = user.write(classifier)?;
        log::info!("Saved classifier '{}' to {}", name, path.display());
        Ok(path)
    }

    /// Delete from the user registry. Defaults are never modified.
    pub fn delete(&self, cell_type: &str) -> Result<()> {
        match &self.user {
            Some(user) if user.contains(cell_type) => user.delete(cell_type),
            _ if self.defaults.as_ref().is_some_and(|d| d.contains(cell_type)) => {
                Err(ClassifierError::Conflict(format!(
                    "'{}' is a default classifier and cannot be deleted",
                    cell_type
                )))
            }
            _ => Err(ClassifierError::NotFound(cell_type.to_string())),
        }
    }

    /// Every stored classifier; user entries shadow defaults of the same name.
    pub fn load_all(&self) -> Result<Vec<CellTypeClassifier<SvmClassifier>>> {
        self.list()?.iter().map(|name| self.load(name)).collect()
    }

    /// `cell_type` and its ancestors, root first.
    pub fn load_lineage(&self, cell_type: &str) -> Result<Vec<CellTypeClassifier<SvmClassifier>>> {
        let mut chain = vec![self.load(cell_type)?];
        let mut seen = HashSet::from([cell_type.to_string()]);
        while let Some(parent) = chain.last().and_then(|c| c.parent_type()).map(str::to_string) {
            if !seen.insert(parent.clone()) {
                return Err(ClassifierError::Data(format!(
                    "parent chain of '{}' loops through '{}'",
                    cell_type, parent
                )));
            }
            let loaded = self.load(&parent).map_err(|e| match e {
                ClassifierError::NotFound(_) => ClassifierError::Data(format!(
                    "parent '{}' of '{}' cannot be resolved",
                    parent, cell_type
                )),
                other => other,
            })?;
            chain.push(loaded);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Selected classifiers plus every ancestor they need.
    ///
    /// Ancestors that cannot be found are left out; the taxonomy reports
    /// the affected branches.
    pub fn load_selection(
        &self,
        selection: &CellTypeSelection,
    ) -> Result<Vec<CellTypeClassifier<SvmClassifier>>> {
        let names = match selection {
            CellTypeSelection::All => return self.load_all(),
            CellTypeSelection::Only(names) => names,
        };

        let mut loaded: Vec<CellTypeClassifier<SvmClassifier>> = Vec::new();
        let mut seen = HashSet::new();
        let mut pending: Vec<String> = names.clone();
        while let Some(name) = pending.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let is_requested = names.contains(&name);
            match self.load(&name) {
                Ok(classifier) => {
                    if let Some(parent) = classifier.parent_type() {
                        pending.push(parent.to_string());
                    }
                    if !is_requested {
                        log::info!("Loading '{}' as ancestor of the selected cell types", name);
                    }
                    loaded.push(classifier);
                }
                Err(ClassifierError::NotFound(_)) if !is_requested => {
                    log::warn!("Ancestor '{}' is not available in any registry", name);
                }
                Err(e) => return Err(e),
            }
        }
        loaded.sort_by(|a, b| a.cell_type().cmp(b.cell_type()));
        Ok(loaded)
    }
}

/// File stem for a cell type: ASCII letters, digits and `-` are kept, every
/// other byte becomes `_XX` (hex), so the mapping is reversible.
pub fn encode_file_stem(cell_type: &str) -> String {
    let mut out = String::with_capacity(cell_type.len());
    for byte in cell_type.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_{:02X}", byte));
        }
    }
    out
}

/// Inverse of [`encode_file_stem`]; `None` for stems it cannot have produced.
pub fn decode_file_stem(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'_' {
            let high = upper_hex_digit(*bytes.get(i + 1)?)?;
            let low = upper_hex_digit(*bytes.get(i + 2)?)?;
            out.push(high << 4 | low);
            i += 3;
        } else if bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-' {
            out.push(bytes[i]);
            i += 1;
        } else {
            return None;
        }
    }
    if out.is_empty() {
        return None;
    }
    let name = String::from_utf8(out).ok()?;
    // escapes of bytes that are stored verbatim (`_41` for `A`) are foreign
    (encode_file_stem(&name) == stem).then_some(name)
}

fn upper_hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stems_round_trip() {
        for name in ["B cells", "CD4+ T cells", "NK", "plasma_cells", "Zellen ä"] {
            let stem = encode_file_stem(name);
            assert!(stem
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
            assert_eq!(decode_file_stem(&stem).as_deref(), Some(name));
        }
    }

    #[test]
    fn foreign_stems_are_rejected() {
        assert_eq!(decode_file_stem("notes.backup"), None);
        assert_eq!(decode_file_stem("bad_Z"), None);
        assert_eq!(decode_file_stem("a_5f"), None);
        assert_eq!(decode_file_stem("a_+5"), None);
        assert_eq!(decode_file_stem("_41"), None);
        assert_eq!(decode_file_stem("a_5F").as_deref(), Some("a_"));
        assert_eq!(decode_file_stem(""), None);
    }
}
