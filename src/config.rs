use crate::file_type::{DataKind, FileTypeTag};

/// Extensions a discovered file must contain (matched against the lower-cased path)
pub const RECOGNIZED_EXTENSIONS: &[&str] = &[".xodr", ".xml", ".xosc"];

/// Lower-cased path substrings and the logical role each one selects.
/// A path may hit several entries and is then registered once per hit.
pub const FILE_TYPE_PATTERNS: &[(&str, FileTypeTag)] = &[
    ("scenario", FileTypeTag::Scenario),
    ("scenery", FileTypeTag::Scenery),
    ("vehiclemodels", FileTypeTag::VehicleModels),
    ("pedestrianmodels", FileTypeTag::PedestrianModels),
    ("simulationoutput", FileTypeTag::SimulationOutput),
    ("profilescatalog", FileTypeTag::ProfilesCatalog),
    ("openscenario", FileTypeTag::AlternateScenario),
];

/// Element names whose presence anywhere in a document marks a contributed data kind
pub const DATA_KIND_MARKERS: &[(&str, DataKind)] = &[
    ("road", DataKind::Scenery),
    ("Vehicle", DataKind::VehicleModels),
    ("Pedestrian", DataKind::PedestrianModels),
    ("Sensor", DataKind::Sensors),
    ("SensorProfile", DataKind::Sensors),
    ("WorldPosition", DataKind::AgentPositions),
    ("LanePosition", DataKind::AgentPositions),
    ("RoadPosition", DataKind::AgentPositions),
    ("Cyclics", DataKind::AgentPositions),
    ("AgentProfile", DataKind::Profiles),
    ("ProfileGroup", DataKind::Profiles),
];

/// Lowest OpenDRIVE revision the road network parser understands
pub const SCENERY_MIN_VERSION: &str = "1.1";

/// Slack (metres) allowed between consecutive plan-view segments
pub const GEOMETRY_TOLERANCE: f64 = 1e-3;
