//! Logical file roles, the data kinds a document can contribute, and the
//! registry that maps lower-cased paths onto roles and roles onto parsers.

use crate::config::{DATA_KIND_MARKERS, FILE_TYPE_PATTERNS, RECOGNIZED_EXTENSIONS};
use crate::document::XmlDocument;
use crate::error::Result;
use crate::handler::{CatalogHandler, Handler};
use crate::scenery::SceneryHandler;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// Role a file plays in a scenario folder.
///
/// `rank()` is the processing priority; discovery output is sorted by it, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileTypeTag {
    AlternateScenario,
    ProfilesCatalog,
    SimulationOutput,
    PedestrianModels,
    VehicleModels,
    Scenery,
    Scenario,
}

/// Constructor that binds a concrete parser to a file
pub type HandlerConstructor = fn(&Path) -> Result<Handler>;

impl FileTypeTag {
    pub const ALL: [FileTypeTag; 7] = [
        FileTypeTag::Scenario,
        FileTypeTag::Scenery,
        FileTypeTag::VehicleModels,
        FileTypeTag::PedestrianModels,
        FileTypeTag::SimulationOutput,
        FileTypeTag::ProfilesCatalog,
        FileTypeTag::AlternateScenario,
    ];

    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileTypeTag::Scenario => "scenario",
            FileTypeTag::Scenery => "scenery",
            FileTypeTag::VehicleModels => "vehicle_models",
            FileTypeTag::PedestrianModels => "pedestrian_models",
            FileTypeTag::SimulationOutput => "simulation_output",
            FileTypeTag::ProfilesCatalog => "profiles_catalog",
            FileTypeTag::AlternateScenario => "alternate_scenario",
        }
    }

    /// The parser registered for this role
    pub fn constructor(self) -> HandlerConstructor {
        match self {
            FileTypeTag::Scenery => |path| SceneryHandler::bind(path).map(Handler::Scenery),
            FileTypeTag::Scenario => {
                |path| CatalogHandler::bind(FileTypeTag::Scenario, path).map(Handler::Catalog)
            }
            FileTypeTag::VehicleModels => {
                |path| CatalogHandler::bind(FileTypeTag::VehicleModels, path).map(Handler::Catalog)
            }
            FileTypeTag::PedestrianModels => |path| {
                CatalogHandler::bind(FileTypeTag::PedestrianModels, path).map(Handler::Catalog)
            },
            FileTypeTag::SimulationOutput => |path| {
                CatalogHandler::bind(FileTypeTag::SimulationOutput, path).map(Handler::Catalog)
            },
            FileTypeTag::ProfilesCatalog => |path| {
                CatalogHandler::bind(FileTypeTag::ProfilesCatalog, path).map(Handler::Catalog)
            },
            FileTypeTag::AlternateScenario => |path| {
                CatalogHandler::bind(FileTypeTag::AlternateScenario, path).map(Handler::Catalog)
            },
        }
    }
}

impl fmt::Display for FileTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic data a document instance actually carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    AgentPositions,
    Sensors,
    Scenery,
    VehicleModels,
    PedestrianModels,
    Profiles,
}

impl DataKind {
    pub fn detect(doc: &XmlDocument) -> BTreeSet<DataKind> {
        DATA_KIND_MARKERS
            .iter()
            .filter(|(marker, _)| doc.contains_element(marker))
            .map(|(_, kind)| *kind)
            .collect()
    }
}

/// Every role a path qualifies for. Requires a recognized extension somewhere in the path.
pub fn classify(path: &Path) -> Vec<FileTypeTag> {
    let lowered = path.to_string_lossy().to_lowercase();
    if !RECOGNIZED_EXTENSIONS.iter().any(|ext| lowered.contains(ext)) {
        return Vec::new();
    }
    FILE_TYPE_PATTERNS
        .iter()
        .filter(|(needle, _)| lowered.contains(needle))
        .map(|(_, tag)| *tag)
        .collect()
}
