//! The versioned-parser contract every file type implements.
//!
//! Concrete parsers are bound through [`FileTypeTag::constructor`] and travel
//! through the pipeline inside the closed [`Handler`] variant, so dispatch is a
//! `match` rather than a lookup of runtime types.

use crate::document::{XmlDocument, XmlElement};
use crate::error::{Error, Result};
use crate::file_type::{DataKind, FileTypeTag};
use crate::scenery::SceneryHandler;
use crate::version::Version;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub trait FileHandler {
    fn path(&self) -> &Path;

    fn file_type_tag(&self) -> FileTypeTag;

    /// Raw version text found in the document, if any
    fn version_text(&self) -> Option<&str>;

    fn extracted_kinds(&self) -> &BTreeSet<DataKind>;

    /// Folds `other`'s content into `self`. Both must declare compatible versions.
    fn merge_from(&mut self, other: &Self) -> Result<()>
    where
        Self: Sized;

    /// Lowest schema version this parser accepts, `None` when any version is fine
    fn minimum_version(&self) -> Option<Version> {
        None
    }

    fn declared_version(&self) -> Result<Version> {
        let raw = self
            .version_text()
            .ok_or_else(|| Error::VersionMissing(self.path().to_path_buf()))?;
        Version::parse(raw).map_err(|_| Error::VersionUnparseable {
            path: self.path().to_path_buf(),
            raw: raw.to_string(),
        })
    }

    /// Declared version, checked against [`minimum_version`](Self::minimum_version)
    fn accepted_version(&self) -> Result<Version> {
        let found = self.declared_version()?;
        match self.minimum_version() {
            Some(minimum) if found < minimum => Err(Error::UnsupportedVersion {
                path: self.path().to_path_buf(),
                tag: self.file_type_tag(),
                found,
                minimum,
            }),
            _ => Ok(found),
        }
    }
}

/// Shared precondition of [`FileHandler::merge_from`] implementations
pub(crate) fn check_merge_versions<H: FileHandler>(this: &H, other: &H) -> Result<()> {
    let incompatible = |reason: String| Error::IncompatibleMerge {
        path: other.path().to_path_buf(),
        reason,
    };
    if this.file_type_tag() != other.file_type_tag() {
        return Err(incompatible(format!(
            "{} file cannot be merged into {} data",
            other.file_type_tag(),
            this.file_type_tag()
        )));
    }
    let ours = this
        .declared_version()
        .map_err(|e| incompatible(e.to_string()))?;
    let theirs = other
        .declared_version()
        .map_err(|e| incompatible(e.to_string()))?;
    if !ours.is_compatible_with(&theirs) {
        return Err(incompatible(format!(
            "version {theirs} is not compatible with {ours} from {}",
            this.path().display()
        )));
    }
    Ok(())
}

/// Reads and parses a file, mapping failures onto the bind error taxonomy
pub(crate) fn read_document(path: &Path) -> Result<XmlDocument> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
        ErrorKind::InvalidData => Error::MalformedDocument {
            path: path.to_path_buf(),
            message: "content is not valid UTF-8".to_string(),
        },
        _ => Error::FileUnreadable {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    XmlDocument::parse(&content).map_err(|message| Error::MalformedDocument {
        path: path.to_path_buf(),
        message,
    })
}

/// Root `SchemaVersion` attribute, else `revMajor.revMinor` of a (File)header element
pub(crate) fn schema_version_text(doc: &XmlDocument) -> Option<String> {
    let root = doc.root();
    if let Some(v) = root
        .attr("SchemaVersion")
        .or_else(|| root.attr("schemaVersion"))
    {
        return Some(v.trim().to_string());
    }
    root.child("header")
        .or_else(|| root.child("FileHeader"))
        .and_then(revision_text)
}

/// `revMajor.revMinor` of a header element
pub(crate) fn revision_text(header: &XmlElement) -> Option<String> {
    match (header.attr("revMajor"), header.attr("revMinor")) {
        (Some(major), Some(minor)) => Some(format!("{}.{}", major.trim(), minor.trim())),
        (Some(major), None) => Some(major.trim().to_string()),
        _ => None,
    }
}

/// Parser for roles whose schema is opaque here: only the generic contract applies
#[derive(Debug, Clone)]
pub struct CatalogHandler {
    tag: FileTypeTag,
    path: PathBuf,
    documents: Vec<XmlDocument>,
    merged_paths: Vec<PathBuf>,
    version: Option<String>,
    kinds: BTreeSet<DataKind>,
}

impl CatalogHandler {
    pub fn bind(tag: FileTypeTag, path: &Path) -> Result<Self> {
        let document = read_document(path)?;
        let version = schema_version_text(&document);
        let kinds = DataKind::detect(&document);
        debug!(path = %path.display(), %tag, ?version, "Bound catalog file");
        Ok(Self {
            tag,
            path: path.to_path_buf(),
            documents: vec![document],
            merged_paths: Vec::new(),
            version,
            kinds,
        })
    }

    /// Own document first, then one per merged file
    pub fn documents(&self) -> &[XmlDocument] {
        &self.documents
    }

    pub fn merged_paths(&self) -> &[PathBuf] {
        &self.merged_paths
    }
}

impl FileHandler for CatalogHandler {
    fn path(&self) -> &Path {
        &self.path
    }

    fn file_type_tag(&self) -> FileTypeTag {
        self.tag
    }

    fn version_text(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn extracted_kinds(&self) -> &BTreeSet<DataKind> {
        &self.kinds
    }

    fn merge_from(&mut self, other: &Self) -> Result<()> {
        check_merge_versions(self, other)?;
        self.documents.extend(other.documents.iter().cloned());
        self.merged_paths.push(other.path.clone());
        self.merged_paths.extend(other.merged_paths.iter().cloned());
        self.kinds.extend(other.kinds.iter().copied());
        Ok(())
    }
}

/// A bound parser of any registered type
#[derive(Debug, Clone)]
pub enum Handler {
    Scenery(SceneryHandler),
    Catalog(CatalogHandler),
}

impl Handler {
    pub fn as_scenery(&self) -> Option<&SceneryHandler> {
        match self {
            Handler::Scenery(h) => Some(h),
            Handler::Catalog(_) => None,
        }
    }

    /// Merges a handler of the same concrete parser and role
    pub fn merge_from(&mut self, other: &Handler) -> Result<()> {
        match (self, other) {
            (Handler::Scenery(this), Handler::Scenery(other)) => this.merge_from(other),
            (Handler::Catalog(this), Handler::Catalog(other)) => this.merge_from(other),
            (this, other) => Err(Error::IncompatibleMerge {
                path: other.path().to_path_buf(),
                reason: format!(
                    "{} parser cannot absorb a {} parser",
                    this.parser_name(),
                    other.parser_name()
                ),
            }),
        }
    }

    pub fn parser_name(&self) -> &'static str {
        match self {
            Handler::Scenery(_) => "scenery",
            Handler::Catalog(_) => "catalog",
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Handler::Scenery(h) => h.path(),
            Handler::Catalog(h) => h.path(),
        }
    }

    pub fn file_type_tag(&self) -> FileTypeTag {
        match self {
            Handler::Scenery(h) => h.file_type_tag(),
            Handler::Catalog(h) => h.file_type_tag(),
        }
    }

    pub fn extracted_kinds(&self) -> &BTreeSet<DataKind> {
        match self {
            Handler::Scenery(h) => h.extracted_kinds(),
            Handler::Catalog(h) => h.extracted_kinds(),
        }
    }

    pub fn declared_version(&self) -> Result<Version> {
        match self {
            Handler::Scenery(h) => h.declared_version(),
            Handler::Catalog(h) => h.declared_version(),
        }
    }

    pub fn accepted_version(&self) -> Result<Version> {
        match self {
            Handler::Scenery(h) => h.accepted_version(),
            Handler::Catalog(h) => h.accepted_version(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn bind_missing_file_is_file_not_found() {
        let dir = TempDir::new().unwrap();
        let result = CatalogHandler::bind(FileTypeTag::Scenario, &dir.path().join("nope.xosc"));
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn bind_garbage_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "scenario.xosc", "<OpenSCENARIO><Unclosed>");
        let result = CatalogHandler::bind(FileTypeTag::Scenario, &path);
        assert!(matches!(result, Err(Error::MalformedDocument { .. })));
    }

    #[test]
    fn bind_non_utf8_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scenario.xosc");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x3c]).unwrap();
        let result = CatalogHandler::bind(FileTypeTag::Scenario, &path);
        assert!(matches!(result, Err(Error::MalformedDocument { .. })));
    }

    #[test]
    fn reads_schema_version_attribute() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "ProfilesCatalog.xml",
            r#"<Profiles SchemaVersion="0.4.8"><AgentProfiles/></Profiles>"#,
        );
        let handler = CatalogHandler::bind(FileTypeTag::ProfilesCatalog, &path).unwrap();
        assert_eq!(handler.declared_version().unwrap().to_string(), "0.4.8");
        assert_eq!(handler.file_type_tag(), FileTypeTag::ProfilesCatalog);
    }

    #[test]
    fn reads_file_header_revision() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "Scenario.xosc",
            r#"<OpenSCENARIO><FileHeader revMajor="1" revMinor="0"/></OpenSCENARIO>"#,
        );
        let handler = CatalogHandler::bind(FileTypeTag::Scenario, &path).unwrap();
        assert_eq!(handler.declared_version().unwrap().to_string(), "1.0");
    }

    #[test]
    fn missing_version_is_recoverable_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "Scenario.xosc", "<OpenSCENARIO/>");
        let handler = CatalogHandler::bind(FileTypeTag::Scenario, &path).unwrap();
        assert!(matches!(
            handler.declared_version(),
            Err(Error::VersionMissing(_))
        ));
        assert!(handler.extracted_kinds().is_empty());
    }

    #[test]
    fn garbled_version_is_unparseable() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "Scenario.xosc", r#"<Scenario SchemaVersion="latest"/>"#);
        let handler = CatalogHandler::bind(FileTypeTag::Scenario, &path).unwrap();
        match handler.declared_version() {
            Err(Error::VersionUnparseable { raw, .. }) => assert_eq!(raw, "latest"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn merge_unions_kinds_and_documents() {
        let dir = TempDir::new().unwrap();
        let cars = write(
            &dir,
            "VehicleModels_a.xosc",
            r#"<OpenSCENARIO><FileHeader revMajor="1" revMinor="0"/><Vehicle/></OpenSCENARIO>"#,
        );
        let sensors = write(
            &dir,
            "VehicleModels_b.xosc",
            r#"<OpenSCENARIO><FileHeader revMajor="1" revMinor="2"/><Sensor/></OpenSCENARIO>"#,
        );
        let mut a = CatalogHandler::bind(FileTypeTag::VehicleModels, &cars).unwrap();
        let b = CatalogHandler::bind(FileTypeTag::VehicleModels, &sensors).unwrap();
        a.merge_from(&b).unwrap();

        assert_eq!(a.documents().len(), 2);
        assert_eq!(a.merged_paths(), &[sensors]);
        assert!(a.extracted_kinds().contains(&DataKind::VehicleModels));
        assert!(a.extracted_kinds().contains(&DataKind::Sensors));
    }

    #[test]
    fn merge_rejects_other_role() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "x.xml", r#"<Root SchemaVersion="1.0"/>"#);
        let mut a = CatalogHandler::bind(FileTypeTag::VehicleModels, &path).unwrap();
        let b = CatalogHandler::bind(FileTypeTag::PedestrianModels, &path).unwrap();
        assert!(matches!(
            a.merge_from(&b),
            Err(Error::IncompatibleMerge { .. })
        ));
    }

    #[test]
    fn merge_rejects_other_major_version() {
        let dir = TempDir::new().unwrap();
        let old = write(&dir, "old.xml", r#"<Root SchemaVersion="1.0"/>"#);
        let new = write(&dir, "new.xml", r#"<Root SchemaVersion="2.0"/>"#);
        let mut a = CatalogHandler::bind(FileTypeTag::Scenario, &old).unwrap();
        let b = CatalogHandler::bind(FileTypeTag::Scenario, &new).unwrap();
        assert!(matches!(
            a.merge_from(&b),
            Err(Error::IncompatibleMerge { .. })
        ));
        assert_eq!(a.documents().len(), 1);
    }

    #[test]
    fn handler_merge_rejects_other_parser() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "scenery.xodr",
            r#"<OpenDRIVE><header revMajor="1" revMinor="6"/></OpenDRIVE>"#,
        );
        let mut scenery = FileTypeTag::Scenery.constructor()(&path).unwrap();
        let catalog = FileTypeTag::Scenario.constructor()(&path).unwrap();
        assert_eq!(scenery.parser_name(), "scenery");
        assert!(matches!(
            scenery.merge_from(&catalog),
            Err(Error::IncompatibleMerge { .. })
        ));
    }
}
