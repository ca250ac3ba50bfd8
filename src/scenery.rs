use crate::config::SCENERY_MIN_VERSION;
use crate::document::{XmlDocument, XmlElement};
use crate::error::Result;
use crate::file_type::{DataKind, FileTypeTag};
use crate::handler::{check_merge_versions, read_document, revision_text, FileHandler};
use crate::road::{
    ContactPoint, ElementType, Geometry, GeometryKind, Junction, JunctionConnection,
    JunctionMembership, Lane, LaneLink, LaneLinkPair, LaneSection, Polynomial, Road, RoadLink,
    RoadLinkElement,
};
use crate::version::Version;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Road network parser. Roads and junctions are extracted at bind time.
#[derive(Debug, Clone)]
pub struct SceneryHandler {
    path: PathBuf,
    name: String,
    version: Option<String>,
    kinds: BTreeSet<DataKind>,
    roads: Vec<Road>,
    junctions: Vec<Junction>,
    /// Files merged into this one
    origins: Vec<PathBuf>,
}

impl SceneryHandler {
    pub fn bind(path: &Path) -> Result<Self> {
        let document = read_document(path)?;
        Ok(Self::from_document(path, &document))
    }

    fn from_document(path: &Path, document: &XmlDocument) -> Self {
        let root = document.root();
        let name = root
            .child("header")
            .and_then(|h| h.attr("name"))
            .unwrap_or_default()
            .to_string();

        let roads: Vec<Road> = root.children_named("road").filter_map(parse_road).collect();
        let junctions: Vec<Junction> = root
            .children_named("junction")
            .filter_map(parse_junction)
            .collect();

        let mut kinds = DataKind::detect(document);
        if roads.is_empty() {
            kinds.remove(&DataKind::Scenery);
        }

        debug!(
            path = %path.display(),
            roads = roads.len(),
            junctions = junctions.len(),
            "Parsed road network"
        );

        Self {
            path: path.to_path_buf(),
            name,
            // Only the OpenDRIVE header counts; an OpenSCENARIO FileHeader says nothing about roads
            version: root.child("header").and_then(revision_text),
            kinds,
            roads,
            junctions,
            origins: Vec::new(),
        }
    }

    /// Network name from the header, empty when absent
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    pub fn junctions(&self) -> &[Junction] {
        &self.junctions
    }

    pub fn merged_paths(&self) -> &[PathBuf] {
        &self.origins
    }
}

impl FileHandler for SceneryHandler {
    fn path(&self) -> &Path {
        &self.path
    }

    fn file_type_tag(&self) -> FileTypeTag {
        FileTypeTag::Scenery
    }

    fn version_text(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn extracted_kinds(&self) -> &BTreeSet<DataKind> {
        &self.kinds
    }

    fn minimum_version(&self) -> Option<Version> {
        Version::parse(SCENERY_MIN_VERSION).ok()
    }

    fn merge_from(&mut self, other: &Self) -> Result<()> {
        check_merge_versions(self, other)?;
        self.roads.extend(other.roads.iter().cloned());
        self.junctions.extend(other.junctions.iter().cloned());
        self.kinds.extend(other.kinds.iter().copied());
        self.origins.push(other.path.clone());
        self.origins.extend(other.origins.iter().cloned());
        Ok(())
    }
}

fn num(node: &XmlElement, name: &str) -> f64 {
    node.attr_f64(name).unwrap_or(0.0)
}

fn parse_road(node: &XmlElement) -> Option<Road> {
    let Some(id) = node.attr("id") else {
        warn!("Skipping road without id");
        return None;
    };
    let mut road = Road::new(id, num(node, "length"));
    road.name = node.attr("name").unwrap_or_default().to_string();
    road.junction = node
        .attr("junction")
        .map(str::trim)
        .filter(|j| !j.is_empty() && *j != "-1")
        .map(|j| JunctionMembership {
            junction_id: j.to_string(),
            resolved: None,
        });

    if let Some(link) = node.child("link") {
        road.link = RoadLink {
            predecessor: link
                .child("predecessor")
                .and_then(|n| parse_link_element(id, n)),
            successor: link
                .child("successor")
                .and_then(|n| parse_link_element(id, n)),
        };
    }

    if let Some(plan_view) = node.child("planView") {
        road.plan_view = plan_view
            .children_named("geometry")
            .map(parse_geometry)
            .collect();
    }

    if let Some(profile) = node.child("elevationProfile") {
        road.elevation_profile = profile.children_named("elevation").map(parse_poly).collect();
    }
    if let Some(profile) = node.child("lateralProfile") {
        road.superelevation = profile
            .children_named("superelevation")
            .map(parse_poly)
            .collect();
    }

    if let Some(lanes) = node.child("lanes") {
        road.lane_sections = lanes
            .children_named("laneSection")
            .map(parse_lane_section)
            .collect();
    }

    Some(road)
}

fn parse_link_element(road_id: &str, node: &XmlElement) -> Option<RoadLinkElement> {
    let Some(element_id) = node.attr("elementId") else {
        debug!(road = road_id, link = %node.name, "Link element without elementId");
        return None;
    };
    let element_type = ElementType::from_attr(node.attr("elementType"));
    if element_type.is_none() {
        debug!(road = road_id, link = %node.name, "Link element without a valid elementType");
    }
    Some(RoadLinkElement::new(
        element_id,
        element_type,
        ContactPoint::from_attr(node.attr("contactPoint")),
    ))
}

fn parse_geometry(node: &XmlElement) -> Geometry {
    let kind = match node.children.first() {
        Some(shape) => match shape.name.as_str() {
            "line" => GeometryKind::Line,
            "arc" => GeometryKind::Arc {
                curvature: num(shape, "curvature"),
            },
            "spiral" => GeometryKind::Spiral {
                curv_start: num(shape, "curvStart"),
                curv_end: num(shape, "curvEnd"),
            },
            "poly3" => GeometryKind::Poly3 {
                a: num(shape, "a"),
                b: num(shape, "b"),
                c: num(shape, "c"),
                d: num(shape, "d"),
            },
            "paramPoly3" => GeometryKind::ParamPoly3 {
                au: num(shape, "aU"),
                bu: num(shape, "bU"),
                cu: num(shape, "cU"),
                du: num(shape, "dU"),
                av: num(shape, "aV"),
                bv: num(shape, "bV"),
                cv: num(shape, "cV"),
                dv: num(shape, "dV"),
                normalized: shape.attr("pRange") != Some("arcLength"),
            },
            other => GeometryKind::Unknown {
                element: other.to_string(),
            },
        },
        None => GeometryKind::Unknown {
            element: String::new(),
        },
    };

    Geometry {
        s: num(node, "s"),
        x: num(node, "x"),
        y: num(node, "y"),
        hdg: num(node, "hdg"),
        length: num(node, "length"),
        kind,
    }
}

fn parse_poly(node: &XmlElement) -> Polynomial {
    let s = node
        .attr_f64("s")
        .or_else(|| node.attr_f64("sOffset"))
        .unwrap_or(0.0);
    Polynomial {
        s,
        a: num(node, "a"),
        b: num(node, "b"),
        c: num(node, "c"),
        d: num(node, "d"),
    }
}

fn parse_lane_section(node: &XmlElement) -> LaneSection {
    let lanes_of = |side: &str| -> Vec<Lane> {
        node.child(side)
            .map(|group| group.children_named("lane").filter_map(parse_lane).collect())
            .unwrap_or_default()
    };
    LaneSection {
        s: num(node, "s"),
        left: lanes_of("left"),
        center: lanes_of("center"),
        right: lanes_of("right"),
    }
}

fn parse_lane(node: &XmlElement) -> Option<Lane> {
    let id = node.attr_i32("id")?;
    let link = node
        .child("link")
        .map(|l| LaneLink {
            predecessor: l.child("predecessor").and_then(|p| p.attr_i32("id")),
            successor: l.child("successor").and_then(|p| p.attr_i32("id")),
        })
        .unwrap_or_default();
    Some(Lane {
        id,
        lane_type: node.attr("type").unwrap_or("none").to_string(),
        widths: node.children_named("width").map(parse_poly).collect(),
        link,
    })
}

fn parse_junction(node: &XmlElement) -> Option<Junction> {
    let Some(id) = node.attr("id") else {
        warn!("Skipping junction without id");
        return None;
    };
    let mut junction = Junction::new(id);
    junction.name = node.attr("name").unwrap_or_default().to_string();
    junction.connections = node
        .children_named("connection")
        .map(|conn| JunctionConnection {
            id: conn.attr("id").unwrap_or_default().to_string(),
            incoming_road: conn.attr("incomingRoad").unwrap_or_default().to_string(),
            connecting_road: conn.attr("connectingRoad").unwrap_or_default().to_string(),
            contact_point: ContactPoint::from_attr(conn.attr("contactPoint")),
            lane_links: conn
                .children_named("laneLink")
                .filter_map(|l| {
                    Some(LaneLinkPair {
                        from: l.attr_i32("from")?,
                        to: l.attr_i32("to")?,
                    })
                })
                .collect(),
            resolved_incoming: None,
            resolved_connecting: None,
        })
        .collect();
    Some(junction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const NETWORK: &str = r#"<?xml version="1.0" standalone="yes"?>
<OpenDRIVE>
    <header revMajor="1" revMinor="6" name="crossing"/>
    <road name="Main" length="100.0" id="1" junction="-1">
        <link>
            <predecessor elementType="road" elementId="0" contactPoint="end"/>
            <successor elementType="junction" elementId="J1"/>
        </link>
        <planView>
            <geometry s="0.0" x="0.0" y="0.0" hdg="0.0" length="60.0"><line/></geometry>
            <geometry s="60.0" x="60.0" y="0.0" hdg="0.0" length="40.0"><arc curvature="0.01"/></geometry>
        </planView>
        <elevationProfile>
            <elevation s="0.0" a="1.0" b="0.0" c="0.0" d="0.0"/>
        </elevationProfile>
        <lateralProfile>
            <superelevation s="0.0" a="0.02" b="0.0" c="0.0" d="0.0"/>
        </lateralProfile>
        <lanes>
            <laneSection s="0.0">
                <left>
                    <lane id="1" type="driving" level="false">
                        <link><successor id="1"/></link>
                        <width sOffset="0.0" a="3.5" b="0.0" c="0.0" d="0.0"/>
                    </lane>
                </left>
                <center><lane id="0" type="none"/></center>
                <right>
                    <lane id="-1" type="driving"><width sOffset="0.0" a="3.5" b="0.0" c="0.0" d="0.0"/></lane>
                    <lane id="-2" type="sidewalk"/>
                </right>
            </laneSection>
            <laneSection s="50.0"/>
        </lanes>
    </road>
    <road length="12.0" id="2" junction="J1">
        <link><predecessor elementType="bogus" elementId="1" contactPoint="sideways"/></link>
    </road>
    <road length="5.0"/>
    <junction id="J1" name="cross">
        <connection id="0" incomingRoad="1" connectingRoad="2" contactPoint="start">
            <laneLink from="-1" to="-1"/>
        </connection>
    </junction>
</OpenDRIVE>"#;

    fn handler() -> SceneryHandler {
        let doc = XmlDocument::parse(NETWORK).unwrap();
        SceneryHandler::from_document(Path::new("/scn/scenery.xodr"), &doc)
    }

    #[test]
    fn extracts_roads_and_junctions() {
        let h = handler();
        assert_eq!(h.name(), "crossing");
        assert_eq!(h.roads().len(), 2); // road without id is skipped
        assert_eq!(h.junctions().len(), 1);
        assert!(h.extracted_kinds().contains(&DataKind::Scenery));
        assert_eq!(h.declared_version().unwrap().to_string(), "1.6");
    }

    #[test]
    fn parses_road_attributes_and_links() {
        let h = handler();
        let road = &h.roads()[0];
        assert_eq!(road.id, "1");
        assert_eq!(road.name, "Main");
        assert_eq!(road.length, 100.0);
        assert!(road.junction.is_none());

        let pred = road.link.predecessor.as_ref().unwrap();
        assert_eq!(pred.element_id, "0");
        assert_eq!(pred.element_type, Some(ElementType::Road));
        assert_eq!(pred.contact_point, Some(ContactPoint::End));
        assert!(pred.resolved.is_none());

        let succ = road.link.successor.as_ref().unwrap();
        assert_eq!(succ.element_type, Some(ElementType::Junction));
        assert_eq!(succ.contact_point, None);
    }

    #[test]
    fn malformed_qualifiers_become_absent() {
        let h = handler();
        let road = &h.roads()[1];
        assert_eq!(
            road.junction.as_ref().map(|j| j.junction_id.as_str()),
            Some("J1")
        );
        let pred = road.link.predecessor.as_ref().unwrap();
        assert_eq!(pred.element_type, None);
        assert_eq!(pred.contact_point, None);
        assert!(road.link.successor.is_none());
    }

    #[test]
    fn parses_geometry_profiles_and_lanes() {
        let h = handler();
        let road = &h.roads()[0];
        assert_eq!(road.plan_view.len(), 2);
        assert_eq!(road.plan_view[0].kind, GeometryKind::Line);
        assert_eq!(
            road.plan_view[1].kind,
            GeometryKind::Arc { curvature: 0.01 }
        );
        assert_eq!(road.elevation_profile[0].a, 1.0);
        assert_eq!(road.superelevation[0].a, 0.02);

        assert_eq!(road.lane_sections.len(), 2);
        let section = &road.lane_sections[0];
        assert_eq!(section.left.len(), 1);
        assert_eq!(section.center.len(), 1);
        assert_eq!(section.right.len(), 2);
        assert_eq!(section.left[0].link.successor, Some(1));
        assert_eq!(section.right[0].widths[0].a, 3.5);
        assert_eq!(section.right[1].lane_type, "sidewalk");
        let ids: Vec<i32> = section.lanes().map(|l| l.id).collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(ids[1], 0);
        assert!(road.coverage_issues().is_empty());
    }

    #[test]
    fn parses_junction_connections() {
        let h = handler();
        let junction = &h.junctions()[0];
        assert_eq!(junction.id, "J1");
        let conn = &junction.connections[0];
        assert_eq!(conn.incoming_road, "1");
        assert_eq!(conn.connecting_road, "2");
        assert_eq!(conn.contact_point, Some(ContactPoint::Start));
        assert_eq!(conn.lane_links, vec![LaneLinkPair { from: -1, to: -1 }]);
    }

    #[test]
    fn non_road_document_carries_no_scenery() {
        let doc = XmlDocument::parse(
            r#"<OpenSCENARIO><FileHeader revMajor="1" revMinor="0"/></OpenSCENARIO>"#,
        )
        .unwrap();
        let h = SceneryHandler::from_document(Path::new("/scn/Scenario_scenery.xosc"), &doc);
        assert!(h.roads().is_empty());
        assert!(!h.extracted_kinds().contains(&DataKind::Scenery));
    }

    #[test]
    fn scenario_file_header_is_not_an_opendrive_revision() {
        let doc = XmlDocument::parse(
            r#"<OpenSCENARIO><FileHeader revMajor="1" revMinor="0"/></OpenSCENARIO>"#,
        )
        .unwrap();
        let h = SceneryHandler::from_document(Path::new("/scn/Scenario_scenery_01.xosc"), &doc);
        assert!(matches!(h.declared_version(), Err(Error::VersionMissing(_))));
        assert!(matches!(
            h.accepted_version(),
            Err(Error::VersionMissing(_))
        ));
    }

    #[test]
    fn rejects_revision_below_minimum() {
        let doc =
            XmlDocument::parse(r#"<OpenDRIVE><header revMajor="1" revMinor="0"/></OpenDRIVE>"#)
                .unwrap();
        let h = SceneryHandler::from_document(Path::new("/scn/scenery.xodr"), &doc);
        assert!(matches!(
            h.accepted_version(),
            Err(Error::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn merge_appends_roads_from_split_files() {
        let mut a = handler();
        let doc = XmlDocument::parse(
            r#"<OpenDRIVE><header revMajor="1" revMinor="4"/><road id="9" length="1"/></OpenDRIVE>"#,
        )
        .unwrap();
        let b = SceneryHandler::from_document(Path::new("/scn/scenery_part2.xodr"), &doc);
        a.merge_from(&b).unwrap();
        assert_eq!(a.roads().len(), 3);
        assert_eq!(a.merged_paths(), &[PathBuf::from("/scn/scenery_part2.xodr")]);
    }
}
