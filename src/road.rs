//! Road network entities.
//!
//! Cross references (road links, junction membership, junction connections) are
//! parsed as identifiers plus qualifiers. They stay unresolved until
//! [`GraphStore::resolve_links`](crate::store::GraphStore::resolve_links) fills in
//! the `resolved` handles once every file has been inserted.

use crate::config::GEOMETRY_TOLERANCE;
use serde::Serialize;
use std::fmt;

/// Handle to a road known to be present in the graph store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RoadId(pub String);

/// Handle to a junction known to be present in the graph store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct JunctionId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactPoint {
    Start,
    End,
}

impl ContactPoint {
    pub fn from_attr(value: Option<&str>) -> Option<Self> {
        match value {
            Some("start") => Some(ContactPoint::Start),
            Some("end") => Some(ContactPoint::End),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Road,
    Junction,
}

impl ElementType {
    pub fn from_attr(value: Option<&str>) -> Option<Self> {
        match value {
            Some("road") => Some(ElementType::Road),
            Some("junction") => Some(ElementType::Junction),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkTarget {
    Road(RoadId),
    Junction(JunctionId),
}

/// One end of a road link. `None` qualifiers mean the source omitted or garbled them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadLinkElement {
    pub element_id: String,
    pub element_type: Option<ElementType>,
    pub contact_point: Option<ContactPoint>,
    pub resolved: Option<LinkTarget>,
}

impl RoadLinkElement {
    pub fn new(
        element_id: impl Into<String>,
        element_type: Option<ElementType>,
        contact_point: Option<ContactPoint>,
    ) -> Self {
        Self {
            element_id: element_id.into(),
            element_type,
            contact_point,
            resolved: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkSide {
    Predecessor,
    Successor,
}

impl fmt::Display for LinkSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkSide::Predecessor => "predecessor",
            LinkSide::Successor => "successor",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoadLink {
    pub predecessor: Option<RoadLinkElement>,
    pub successor: Option<RoadLinkElement>,
}

impl RoadLink {
    pub fn get(&self, side: LinkSide) -> Option<&RoadLinkElement> {
        match side {
            LinkSide::Predecessor => self.predecessor.as_ref(),
            LinkSide::Successor => self.successor.as_ref(),
        }
    }

    pub fn get_mut(&mut self, side: LinkSide) -> Option<&mut RoadLinkElement> {
        match side {
            LinkSide::Predecessor => self.predecessor.as_mut(),
            LinkSide::Successor => self.successor.as_mut(),
        }
    }
}

/// Road belongs to a junction (connecting road)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JunctionMembership {
    pub junction_id: String,
    pub resolved: Option<JunctionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum GeometryKind {
    Line,
    Arc {
        curvature: f64,
    },
    Spiral {
        curv_start: f64,
        curv_end: f64,
    },
    Poly3 {
        a: f64,
        b: f64,
        c: f64,
        d: f64,
    },
    ParamPoly3 {
        au: f64,
        bu: f64,
        cu: f64,
        du: f64,
        av: f64,
        bv: f64,
        cv: f64,
        dv: f64,
        normalized: bool,
    },
    Unknown {
        element: String,
    },
}

/// Plan-view reference line segment starting at `s`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Geometry {
    pub s: f64,
    pub x: f64,
    pub y: f64,
    pub hdg: f64,
    pub length: f64,
    pub kind: GeometryKind,
}

/// Cubic `a + b*ds + c*ds^2 + d*ds^3` starting at `s`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Polynomial {
    pub s: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Polynomial {
    pub fn eval(&self, s: f64) -> f64 {
        let ds = s - self.s;
        self.a + ds * (self.b + ds * (self.c + ds * self.d))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LaneLink {
    pub predecessor: Option<i32>,
    pub successor: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lane {
    /// Positive = left of the reference line, 0 = center, negative = right
    pub id: i32,
    pub lane_type: String,
    pub widths: Vec<Polynomial>,
    pub link: LaneLink,
}

/// Segment of a road with a constant lane layout, starting at `s`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LaneSection {
    pub s: f64,
    pub left: Vec<Lane>,
    pub center: Vec<Lane>,
    pub right: Vec<Lane>,
}

impl LaneSection {
    pub fn lanes(&self) -> impl Iterator<Item = &Lane> {
        self.left.iter().chain(&self.center).chain(&self.right)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sequence {
    LaneSections,
    PlanView,
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sequence::LaneSections => "lane sections",
            Sequence::PlanView => "plan view",
        })
    }
}

/// Way in which lane sections or plan view fail to cover `[0, length]`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "issue")]
pub enum CoverageIssue {
    Empty { sequence: Sequence },
    StartsAfterZero { sequence: Sequence, start: f64 },
    OutOfOrder { sequence: Sequence, index: usize },
    Gap { at: f64, next: f64 },
    Overlap { at: f64, next: f64 },
    EndsShort { end: f64, length: f64 },
    EndsBeyond { sequence: Sequence, end: f64, length: f64 },
}

impl fmt::Display for CoverageIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageIssue::Empty { sequence } => write!(f, "no {sequence}"),
            CoverageIssue::StartsAfterZero { sequence, start } => {
                write!(f, "{sequence} start at s={start}")
            }
            CoverageIssue::OutOfOrder { sequence, index } => {
                write!(f, "{sequence} entry {index} is out of order")
            }
            CoverageIssue::Gap { at, next } => write!(f, "plan view gap from s={at} to s={next}"),
            CoverageIssue::Overlap { at, next } => {
                write!(f, "plan view overlap, segment ends at s={at} but next starts at s={next}")
            }
            CoverageIssue::EndsShort { end, length } => {
                write!(f, "plan view ends at s={end}, road length is {length}")
            }
            CoverageIssue::EndsBeyond {
                sequence,
                end,
                length,
            } => write!(f, "{sequence} reach s={end}, road length is {length}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Road {
    pub id: String,
    pub name: String,
    pub length: f64,
    pub junction: Option<JunctionMembership>,
    pub link: RoadLink,
    pub lane_sections: Vec<LaneSection>,
    pub plan_view: Vec<Geometry>,
    pub elevation_profile: Vec<Polynomial>,
    pub superelevation: Vec<Polynomial>,
}

impl Road {
    pub fn new(id: impl Into<String>, length: f64) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            length,
            junction: None,
            link: RoadLink::default(),
            lane_sections: Vec::new(),
            plan_view: Vec::new(),
            elevation_profile: Vec::new(),
            superelevation: Vec::new(),
        }
    }

    /// Lane section in effect at `s` (the last one starting at or before it)
    pub fn lane_section_at(&self, s: f64) -> Option<&LaneSection> {
        if s < 0.0 || s > self.length + GEOMETRY_TOLERANCE {
            return None;
        }
        self.lane_sections.iter().rev().find(|ls| ls.s <= s)
    }

    pub fn geometry_at(&self, s: f64) -> Option<&Geometry> {
        if s < 0.0 || s > self.length + GEOMETRY_TOLERANCE {
            return None;
        }
        self.plan_view.iter().rev().find(|g| g.s <= s)
    }

    /// Checks that lane sections and plan view each cover `[0, length]` in order.
    /// Problems are reported, the road itself is never altered.
    pub fn coverage_issues(&self) -> Vec<CoverageIssue> {
        let mut issues = Vec::new();
        self.check_starts(
            Sequence::LaneSections,
            self.lane_sections.iter().map(|ls| ls.s),
            &mut issues,
        );
        self.check_starts(
            Sequence::PlanView,
            self.plan_view.iter().map(|g| g.s),
            &mut issues,
        );

        for pair in self.plan_view.windows(2) {
            let end = pair[0].s + pair[0].length;
            let next = pair[1].s;
            if next - end > GEOMETRY_TOLERANCE {
                issues.push(CoverageIssue::Gap { at: end, next });
            } else if end - next > GEOMETRY_TOLERANCE {
                issues.push(CoverageIssue::Overlap { at: end, next });
            }
        }

        if let Some(last) = self.plan_view.last() {
            let end = last.s + last.length;
            if self.length - end > GEOMETRY_TOLERANCE {
                issues.push(CoverageIssue::EndsShort {
                    end,
                    length: self.length,
                });
            } else if end - self.length > GEOMETRY_TOLERANCE {
                issues.push(CoverageIssue::EndsBeyond {
                    sequence: Sequence::PlanView,
                    end,
                    length: self.length,
                });
            }
        }
        if let Some(last) = self.lane_sections.last() {
            if last.s - self.length > GEOMETRY_TOLERANCE {
                issues.push(CoverageIssue::EndsBeyond {
                    sequence: Sequence::LaneSections,
                    end: last.s,
                    length: self.length,
                });
            }
        }

        issues
    }

    fn check_starts(
        &self,
        sequence: Sequence,
        starts: impl Iterator<Item = f64>,
        issues: &mut Vec<CoverageIssue>,
    ) {
        let starts: Vec<f64> = starts.collect();
        match starts.first() {
            None => issues.push(CoverageIssue::Empty { sequence }),
            Some(&start) if start.abs() > GEOMETRY_TOLERANCE => {
                issues.push(CoverageIssue::StartsAfterZero { sequence, start })
            }
            Some(_) => {}
        }
        for (index, pair) in starts.windows(2).enumerate() {
            if pair[1] < pair[0] {
                issues.push(CoverageIssue::OutOfOrder {
                    sequence,
                    index: index + 1,
                });
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaneLinkPair {
    pub from: i32,
    pub to: i32,
}

/// Incoming road feeding a connecting road inside a junction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JunctionConnection {
    pub id: String,
    pub incoming_road: String,
    pub connecting_road: String,
    pub contact_point: Option<ContactPoint>,
    pub lane_links: Vec<LaneLinkPair>,
    pub resolved_incoming: Option<RoadId>,
    pub resolved_connecting: Option<RoadId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Junction {
    pub id: String,
    pub name: String,
    pub connections: Vec<JunctionConnection>,
}

impl Junction {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            connections: Vec::new(),
        }
    }
}
