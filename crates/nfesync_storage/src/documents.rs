//! Per-taxpayer document directories.

use crate::error::{StorageError, StorageResult};
use nfesync_protocol::{xml, DocumentKind, TaxpayerId};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const XML_SUFFIX: &str = ".xml";

/// File storage for fetched documents, one directory per taxpayer.
///
/// Files are named by the classifier, so the summary and the complete form of
/// one access key share a name and saving the complete form replaces the
/// summary in place.
///
/// # Example
///
/// ```no_run
/// use nfesync_protocol::TaxpayerId;
/// use nfesync_storage::DocumentStore;
///
/// let store = DocumentStore::new("downloads");
/// let id = TaxpayerId::parse("11.222.333/0001-81").unwrap();
/// store.save(&id, "35240611222333000181550010000000011000000010.xml", "<resNFe/>").unwrap();
/// let pending = store.list_pending_summaries(&id).unwrap();
/// assert_eq!(pending.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Creates a store rooted at `root`. Nothing is created until the first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one taxpayer's documents.
    pub fn taxpayer_dir(&self, id: &TaxpayerId) -> PathBuf {
        self.root.join(id.as_str())
    }

    fn file_path(&self, id: &TaxpayerId, file_name: &str) -> StorageResult<PathBuf> {
        if file_name.is_empty()
            || file_name == "."
            || file_name == ".."
            || file_name.contains('/')
            || file_name.contains('\\')
        {
            return Err(StorageError::InvalidFileName(file_name.to_string()));
        }
        Ok(self.taxpayer_dir(id).join(file_name))
    }

    /// Writes (or overwrites) a document and returns its path.
    pub fn save(&self, id: &TaxpayerId, file_name: &str, content: &str) -> StorageResult<PathBuf> {
        let path = self.file_path(id, file_name)?;
        let dir = self.taxpayer_dir(id);
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        fs::write(&path, content).map_err(|e| StorageError::io(&path, e))?;
        debug!(taxpayer = %id, file = file_name, bytes = content.len(), "document saved");
        Ok(path)
    }

    /// Returns true if the document exists.
    pub fn exists(&self, id: &TaxpayerId, file_name: &str) -> bool {
        self.file_path(id, file_name)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Reads a stored document.
    pub fn read(&self, id: &TaxpayerId, file_name: &str) -> StorageResult<String> {
        let path = self.file_path(id, file_name)?;
        fs::read_to_string(&path).map_err(|e| StorageError::io(&path, e))
    }

    /// Local name of the document's root element.
    ///
    /// Returns `None` and logs a warning if the file cannot be read or parsed.
    pub fn root_tag(&self, id: &TaxpayerId, file_name: &str) -> Option<String> {
        let text = match self.read(id, file_name) {
            Ok(text) => text,
            Err(err) => {
                warn!(taxpayer = %id, file = file_name, error = %err, "cannot read document");
                return None;
            }
        };
        match xml::root_local_name(&text) {
            Ok(tag) => Some(tag),
            Err(err) => {
                warn!(taxpayer = %id, file = file_name, error = %err, "cannot parse document");
                None
            }
        }
    }

    /// Completeness tier of a stored document, from its root tag.
    pub fn kind(&self, id: &TaxpayerId, file_name: &str) -> Option<DocumentKind> {
        self.root_tag(id, file_name)
            .map(|tag| DocumentKind::from_root_tag(&tag))
    }

    /// Renames a document within the taxpayer directory and returns the new path.
    pub fn rename(&self, id: &TaxpayerId, old_name: &str, new_name: &str) -> StorageResult<PathBuf> {
        let from = self.file_path(id, old_name)?;
        let to = self.file_path(id, new_name)?;
        fs::rename(&from, &to).map_err(|e| StorageError::io(&from, e))?;
        debug!(taxpayer = %id, from = old_name, to = new_name, "document renamed");
        Ok(to)
    }

    /// Removes a document. Removing a missing file is not an error.
    pub fn remove(&self, id: &TaxpayerId, file_name: &str) -> StorageResult<()> {
        let path = self.file_path(id, file_name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(taxpayer = %id, file = file_name, "document removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    /// Names of all `.xml` files in the taxpayer directory, sorted.
    ///
    /// A missing directory yields an empty list.
    pub fn list(&self, id: &TaxpayerId) -> StorageResult<Vec<String>> {
        let dir = self.taxpayer_dir(id);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(&dir, e))?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.ends_with(XML_SUFFIX) && entry.path().is_file() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Access keys for which only the summary form is stored.
    ///
    /// Files are classified by root tag, not by name shape. Files whose root
    /// tag cannot be determined are skipped.
    pub fn list_pending_summaries(&self, id: &TaxpayerId) -> StorageResult<BTreeSet<String>> {
        let mut pending = BTreeSet::new();
        for name in self.list(id)? {
            let Some(tag) = self.root_tag(id, &name) else {
                continue;
            };
            if DocumentKind::from_root_tag(&tag) == DocumentKind::Summary {
                let key = name.trim_end_matches(XML_SUFFIX);
                pending.insert(key.to_string());
            }
        }
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const KEY: &str = "35240611222333000181550010000000011000000010";
    const SUMMARY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<resNFe xmlns="http://www.portalfiscal.inf.br/nfe"><chNFe>35240611222333000181550010000000011000000010</chNFe></resNFe>"#;
    const COMPLETE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe"><NFe/><protNFe/></nfeProc>"#;

    fn id() -> TaxpayerId {
        TaxpayerId::parse("11222333000181").unwrap()
    }

    fn file(key: &str) -> String {
        format!("{key}.xml")
    }

    #[test]
    fn save_creates_directory() {
        let temp = tempdir().unwrap();
        let store = DocumentStore::new(temp.path().join("downloads"));

        let path = store.save(&id(), &file(KEY), SUMMARY).unwrap();
        assert_eq!(path, temp.path().join("downloads").join("11222333000181").join(file(KEY)));
        assert!(store.exists(&id(), &file(KEY)));
        assert_eq!(store.read(&id(), &file(KEY)).unwrap(), SUMMARY);
    }

    #[test]
    fn root_tag_strips_namespace() {
        let temp = tempdir().unwrap();
        let store = DocumentStore::new(temp.path());
        store.save(&id(), "a.xml", SUMMARY).unwrap();
        store.save(&id(), "b.xml", COMPLETE).unwrap();

        assert_eq!(store.root_tag(&id(), "a.xml").as_deref(), Some("resNFe"));
        assert_eq!(store.root_tag(&id(), "b.xml").as_deref(), Some("nfeProc"));
        assert_eq!(store.kind(&id(), "b.xml"), Some(DocumentKind::Complete));
    }

    #[test]
    fn root_tag_never_fails() {
        let temp = tempdir().unwrap();
        let store = DocumentStore::new(temp.path());
        store.save(&id(), "broken.xml", "<resNFe>").unwrap();

        assert_eq!(store.root_tag(&id(), "broken.xml"), None);
        assert_eq!(store.root_tag(&id(), "missing.xml"), None);
    }

    #[test]
    fn rejects_names_outside_directory() {
        let temp = tempdir().unwrap();
        let store = DocumentStore::new(temp.path());

        for name in ["", ".", "..", "../x.xml", "a/b.xml", "a\\b.xml"] {
            assert!(matches!(
                store.save(&id(), name, "<a/>"),
                Err(StorageError::InvalidFileName(_))
            ));
            assert!(!store.exists(&id(), name));
        }
    }

    #[test]
    fn rename_and_remove() {
        let temp = tempdir().unwrap();
        let store = DocumentStore::new(temp.path());
        store.save(&id(), &file(KEY), COMPLETE).unwrap();

        let renamed = format!("{KEY}-cancelada.xml");
        let path = store.rename(&id(), &file(KEY), &renamed).unwrap();
        assert!(path.ends_with(&renamed));
        assert!(!store.exists(&id(), &file(KEY)));
        assert!(store.exists(&id(), &renamed));

        store.remove(&id(), &renamed).unwrap();
        assert!(!store.exists(&id(), &renamed));
        store.remove(&id(), &renamed).unwrap();
    }

    #[test]
    fn rename_missing_file_fails() {
        let temp = tempdir().unwrap();
        let store = DocumentStore::new(temp.path());
        let err = store.rename(&id(), "nope.xml", "other.xml").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn pending_summaries_by_root_tag() {
        let temp = tempdir().unwrap();
        let store = DocumentStore::new(temp.path());
        let other = "35240611222333000181550010000000021000000020";
        let event = format!("{KEY}-evento-ciencia-1.xml");

        store.save(&id(), &file(KEY), SUMMARY).unwrap();
        store.save(&id(), &file(other), COMPLETE).unwrap();
        store.save(&id(), &event, "<procEventoNFe/>").unwrap();
        store.save(&id(), "short.xml", "<resNFe/>").unwrap();
        store.save(&id(), "garbage.xml", "not xml").unwrap();
        store.save(&id(), "notes.txt", "<resNFe/>").unwrap();

        let pending = store.list_pending_summaries(&id()).unwrap();
        assert_eq!(
            pending.into_iter().collect::<Vec<_>>(),
            vec![KEY.to_string(), "short".to_string()]
        );
    }

    #[test]
    fn complete_form_supersedes_summary() {
        let temp = tempdir().unwrap();
        let store = DocumentStore::new(temp.path());

        store.save(&id(), &file(KEY), SUMMARY).unwrap();
        assert!(store.list_pending_summaries(&id()).unwrap().contains(KEY));

        store.save(&id(), &file(KEY), COMPLETE).unwrap();
        assert!(store.list_pending_summaries(&id()).unwrap().is_empty());
        assert_eq!(store.list(&id()).unwrap(), vec![file(KEY)]);
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let temp = tempdir().unwrap();
        let store = DocumentStore::new(temp.path().join("absent"));
        assert!(store.list(&id()).unwrap().is_empty());
        assert!(store.list_pending_summaries(&id()).unwrap().is_empty());
    }
}
