//! Concurrent road-network graph store.
//!
//! Insertion takes `&self` and may run from any number of rayon workers; each
//! identifier is written at most once and the losing writer gets
//! [`Error::DuplicateIdentifier`]. Resolution takes `&mut self`, so the borrow
//! checker enforces the barrier between population and resolution.

use crate::error::{EntityKind, Error, Result};
use crate::road::{ElementType, Junction, JunctionId, LinkSide, LinkTarget, Road, RoadId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rayon::prelude::*;
use rustc_hash::FxBuildHasher;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Where an unresolved identifier was referenced from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "from")]
pub enum ReferenceSource {
    RoadLink { road_id: String, side: LinkSide },
    JunctionMembership { road_id: String },
    IncomingRoad { junction_id: String, connection_id: String },
    ConnectingRoad { junction_id: String, connection_id: String },
}

impl fmt::Display for ReferenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceSource::RoadLink { road_id, side } => write!(f, "road {road_id} {side}"),
            ReferenceSource::JunctionMembership { road_id } => {
                write!(f, "road {road_id} junction membership")
            }
            ReferenceSource::IncomingRoad {
                junction_id,
                connection_id,
            } => write!(f, "junction {junction_id} connection {connection_id} incoming road"),
            ReferenceSource::ConnectingRoad {
                junction_id,
                connection_id,
            } => write!(f, "junction {junction_id} connection {connection_id} connecting road"),
        }
    }
}

/// A reference whose target was never inserted during this import pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingReference {
    pub source: ReferenceSource,
    pub target_id: String,
    /// `None` when the source omitted the element type, so no collection could be searched
    pub element_type: Option<ElementType>,
}

impl fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.element_type {
            Some(ElementType::Road) => write!(f, "{} -> unknown road {:?}", self.source, self.target_id),
            Some(ElementType::Junction) => {
                write!(f, "{} -> unknown junction {:?}", self.source, self.target_id)
            }
            None => write!(f, "{} -> {:?} has no element type", self.source, self.target_id),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolutionSummary {
    pub resolved: u64,
    pub dangling: u64,
}

/// Resolved handles for one road, computed during the read-only pass
#[derive(Default)]
struct RoadResolution {
    predecessor: Option<LinkTarget>,
    successor: Option<LinkTarget>,
    junction: Option<JunctionId>,
}

#[derive(Default)]
struct JunctionResolution {
    /// (incoming, connecting) per connection, in connection order
    connections: Vec<(Option<RoadId>, Option<RoadId>)>,
}

#[derive(Debug, Default)]
pub struct GraphStore {
    roads: DashMap<String, Arc<Road>, FxBuildHasher>,
    junctions: DashMap<String, Arc<Junction>, FxBuildHasher>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// First writer wins; a second road with the same id is rejected, never overwritten.
    pub fn insert_road(&self, road: Road) -> Result<()> {
        match self.roads.entry(road.id.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateIdentifier {
                kind: EntityKind::Road,
                id: road.id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(road));
                Ok(())
            }
        }
    }

    pub fn insert_junction(&self, junction: Junction) -> Result<()> {
        match self.junctions.entry(junction.id.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateIdentifier {
                kind: EntityKind::Junction,
                id: junction.id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(junction));
                Ok(())
            }
        }
    }

    pub fn get_road(&self, id: &str) -> Result<Arc<Road>> {
        self.roads
            .get(id)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| Error::NotFound {
                kind: EntityKind::Road,
                id: id.to_string(),
            })
    }

    pub fn get_junction(&self, id: &str) -> Result<Arc<Junction>> {
        self.junctions
            .get(id)
            .map(|j| Arc::clone(j.value()))
            .ok_or_else(|| Error::NotFound {
                kind: EntityKind::Junction,
                id: id.to_string(),
            })
    }

    pub fn contains_road(&self, id: &str) -> bool {
        self.roads.contains_key(id)
    }

    pub fn contains_junction(&self, id: &str) -> bool {
        self.junctions.contains_key(id)
    }

    pub fn road_count(&self) -> usize {
        self.roads.len()
    }

    pub fn junction_count(&self) -> usize {
        self.junctions.len()
    }

    pub fn road_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.roads.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn junction_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.junctions.iter().map(|j| j.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Roads sorted by id
    pub fn roads(&self) -> Vec<Arc<Road>> {
        let mut roads: Vec<Arc<Road>> = self.roads.iter().map(|r| Arc::clone(r.value())).collect();
        roads.sort_by(|a, b| a.id.cmp(&b.id));
        roads
    }

    /// Junctions sorted by id
    pub fn junctions(&self) -> Vec<Arc<Junction>> {
        let mut junctions: Vec<Arc<Junction>> = self
            .junctions
            .iter()
            .map(|j| Arc::clone(j.value()))
            .collect();
        junctions.sort_by(|a, b| a.id.cmp(&b.id));
        junctions
    }

    fn lookup(&self, element_type: Option<ElementType>, id: &str) -> Option<LinkTarget> {
        match element_type? {
            ElementType::Road if self.contains_road(id) => {
                Some(LinkTarget::Road(RoadId(id.to_string())))
            }
            ElementType::Junction if self.contains_junction(id) => {
                Some(LinkTarget::Junction(JunctionId(id.to_string())))
            }
            _ => None,
        }
    }

    /// Resolves every road link, junction membership and junction connection
    /// against the populated store. Misses stay `None` and are returned as diagnostics.
    ///
    /// Lookups run in parallel over a quiescent store; results are applied afterwards.
    pub fn resolve_links(&mut self) -> (ResolutionSummary, Vec<DanglingReference>) {
        let road_results: Vec<(String, RoadResolution, Vec<DanglingReference>)> = self
            .roads
            .par_iter()
            .map(|entry| {
                let road = entry.value();
                let mut resolution = RoadResolution::default();
                let mut dangling = Vec::new();

                for side in [LinkSide::Predecessor, LinkSide::Successor] {
                    let Some(link) = road.link.get(side) else {
                        continue;
                    };
                    let target = self.lookup(link.element_type, &link.element_id);
                    if target.is_none() {
                        dangling.push(DanglingReference {
                            source: ReferenceSource::RoadLink {
                                road_id: road.id.clone(),
                                side,
                            },
                            target_id: link.element_id.clone(),
                            element_type: link.element_type,
                        });
                    }
                    match side {
                        LinkSide::Predecessor => resolution.predecessor = target,
                        LinkSide::Successor => resolution.successor = target,
                    }
                }

                if let Some(membership) = &road.junction {
                    if self.contains_junction(&membership.junction_id) {
                        resolution.junction = Some(JunctionId(membership.junction_id.clone()));
                    } else {
                        dangling.push(DanglingReference {
                            source: ReferenceSource::JunctionMembership {
                                road_id: road.id.clone(),
                            },
                            target_id: membership.junction_id.clone(),
                            element_type: Some(ElementType::Junction),
                        });
                    }
                }

                (entry.key().clone(), resolution, dangling)
            })
            .collect();

        let junction_results: Vec<(String, JunctionResolution, Vec<DanglingReference>)> = self
            .junctions
            .par_iter()
            .map(|entry| {
                let junction = entry.value();
                let mut resolution = JunctionResolution::default();
                let mut dangling = Vec::new();
                for conn in &junction.connections {
                    let mut resolve = |id: &str, source: ReferenceSource| {
                        if self.contains_road(id) {
                            Some(RoadId(id.to_string()))
                        } else {
                            dangling.push(DanglingReference {
                                source,
                                target_id: id.to_string(),
                                element_type: Some(ElementType::Road),
                            });
                            None
                        }
                    };
                    let incoming = resolve(
                        &conn.incoming_road,
                        ReferenceSource::IncomingRoad {
                            junction_id: junction.id.clone(),
                            connection_id: conn.id.clone(),
                        },
                    );
                    let connecting = resolve(
                        &conn.connecting_road,
                        ReferenceSource::ConnectingRoad {
                            junction_id: junction.id.clone(),
                            connection_id: conn.id.clone(),
                        },
                    );
                    resolution.connections.push((incoming, connecting));
                }
                (entry.key().clone(), resolution, dangling)
            })
            .collect();

        let mut summary = ResolutionSummary::default();
        let mut all_dangling = Vec::new();

        for (id, resolution, dangling) in road_results {
            if let Some(mut entry) = self.roads.get_mut(&id) {
                let road = Arc::make_mut(entry.value_mut());
                for (side, target) in [
                    (LinkSide::Predecessor, resolution.predecessor),
                    (LinkSide::Successor, resolution.successor),
                ] {
                    if let Some(link) = road.link.get_mut(side) {
                        if target.is_some() {
                            summary.resolved += 1;
                        }
                        link.resolved = target;
                    }
                }
                if let Some(membership) = road.junction.as_mut() {
                    if resolution.junction.is_some() {
                        summary.resolved += 1;
                    }
                    membership.resolved = resolution.junction;
                }
            }
            all_dangling.extend(dangling);
        }

        for (id, resolution, dangling) in junction_results {
            if let Some(mut entry) = self.junctions.get_mut(&id) {
                let junction = Arc::make_mut(entry.value_mut());
                for (conn, (incoming, connecting)) in junction
                    .connections
                    .iter_mut()
                    .zip(resolution.connections)
                {
                    summary.resolved += u64::from(incoming.is_some()) + u64::from(connecting.is_some());
                    conn.resolved_incoming = incoming;
                    conn.resolved_connecting = connecting;
                }
            }
            all_dangling.extend(dangling);
        }

        summary.dangling = all_dangling.len() as u64;
        for d in &all_dangling {
            debug!(reference = %d, "Dangling reference");
        }
        info!(
            resolved = summary.resolved,
            dangling = summary.dangling,
            "Link resolution complete"
        );

        all_dangling.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        (summary, all_dangling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::road::{ContactPoint, JunctionConnection, JunctionMembership, RoadLinkElement};
    use std::sync::Barrier;
    use std::thread;

    fn road_with_successor(id: &str, target: &str, element_type: ElementType) -> Road {
        let mut road = Road::new(id, 10.0);
        road.link.successor = Some(RoadLinkElement::new(
            target,
            Some(element_type),
            Some(ContactPoint::Start),
        ));
        road
    }

    #[test]
    fn insert_and_get() {
        let store = GraphStore::new();
        store.insert_road(Road::new("R1", 5.0)).unwrap();
        store.insert_junction(Junction::new("J1")).unwrap();

        assert_eq!(store.get_road("R1").unwrap().length, 5.0);
        assert_eq!(store.get_junction("J1").unwrap().id, "J1");
        assert_eq!(store.road_count(), 1);
        assert_eq!(store.junction_count(), 1);
    }

    #[test]
    fn missing_entities_are_not_found() {
        let store = GraphStore::new();
        assert!(matches!(
            store.get_road("nope"),
            Err(Error::NotFound {
                kind: EntityKind::Road,
                ..
            })
        ));
        assert!(matches!(
            store.get_junction("nope"),
            Err(Error::NotFound {
                kind: EntityKind::Junction,
                ..
            })
        ));
    }

    #[test]
    fn duplicate_road_keeps_first_writer() {
        let store = GraphStore::new();
        let mut first = Road::new("R1", 1.0);
        first.name = "first".to_string();
        let mut second = Road::new("R1", 2.0);
        second.name = "second".to_string();

        store.insert_road(first).unwrap();
        let err = store.insert_road(second).unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateIdentifier { kind: EntityKind::Road, ref id } if id == "R1"
        ));
        assert_eq!(store.get_road("R1").unwrap().name, "first");
    }

    #[test]
    fn road_and_junction_namespaces_are_separate() {
        let store = GraphStore::new();
        store.insert_road(Road::new("1", 1.0)).unwrap();
        store.insert_junction(Junction::new("1")).unwrap();
        assert!(store.insert_junction(Junction::new("1")).is_err());
    }

    #[test]
    fn concurrent_duplicate_has_exactly_one_winner() {
        for _ in 0..50 {
            let store = GraphStore::new();
            let barrier = Barrier::new(2);
            let results: Vec<Result<()>> = thread::scope(|scope| {
                let handles: Vec<_> = (0..2)
                    .map(|i| {
                        let store = &store;
                        let barrier = &barrier;
                        scope.spawn(move || {
                            barrier.wait();
                            store.insert_road(Road::new("R1", f64::from(i)))
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            assert_eq!(
                results
                    .iter()
                    .filter(|r| matches!(r, Err(Error::DuplicateIdentifier { .. })))
                    .count(),
                1
            );
            assert_eq!(store.road_count(), 1);
        }
    }

    #[test]
    fn parallel_distinct_inserts_all_land() {
        let store = GraphStore::new();
        (0..1000).into_par_iter().for_each(|i| {
            store.insert_road(Road::new(format!("R{i}"), 1.0)).unwrap();
        });
        assert_eq!(store.road_count(), 1000);
        assert_eq!(store.road_ids().len(), 1000);
    }

    #[test]
    fn resolves_links_to_roads_and_junctions() {
        let mut store = GraphStore::new();
        store
            .insert_road(road_with_successor("A", "B", ElementType::Road))
            .unwrap();
        store
            .insert_road(road_with_successor("B", "J", ElementType::Junction))
            .unwrap();
        store.insert_junction(Junction::new("J")).unwrap();

        let (summary, dangling) = store.resolve_links();
        assert!(dangling.is_empty());
        assert_eq!(summary.resolved, 2);

        let a = store.get_road("A").unwrap();
        assert_eq!(
            a.link.successor.as_ref().unwrap().resolved,
            Some(LinkTarget::Road(RoadId("B".to_string())))
        );
        let b = store.get_road("B").unwrap();
        assert_eq!(
            b.link.successor.as_ref().unwrap().resolved,
            Some(LinkTarget::Junction(JunctionId("J".to_string())))
        );
    }

    #[test]
    fn missing_successor_is_dangling_not_fatal() {
        let mut store = GraphStore::new();
        store
            .insert_road(road_with_successor("A", "ghost", ElementType::Road))
            .unwrap();

        let (summary, dangling) = store.resolve_links();
        assert_eq!(summary.dangling, 1);
        assert_eq!(
            dangling,
            vec![DanglingReference {
                source: ReferenceSource::RoadLink {
                    road_id: "A".to_string(),
                    side: LinkSide::Successor
                },
                target_id: "ghost".to_string(),
                element_type: Some(ElementType::Road),
            }]
        );
        assert!(store
            .get_road("A")
            .unwrap()
            .link
            .successor
            .as_ref()
            .unwrap()
            .resolved
            .is_none());
    }

    #[test]
    fn element_type_selects_collection() {
        let mut store = GraphStore::new();
        // a junction named like the road target does not satisfy a road link
        store
            .insert_road(road_with_successor("A", "X", ElementType::Road))
            .unwrap();
        store.insert_junction(Junction::new("X")).unwrap();
        let (_, dangling) = store.resolve_links();
        assert_eq!(dangling.len(), 1);
    }

    #[test]
    fn untyped_link_is_dangling() {
        let mut store = GraphStore::new();
        let mut road = Road::new("A", 1.0);
        road.link.predecessor = Some(RoadLinkElement::new("A", None, None));
        store.insert_road(road).unwrap();
        let (_, dangling) = store.resolve_links();
        assert_eq!(dangling[0].element_type, None);
    }

    #[test]
    fn resolves_junction_membership_and_connections() {
        let mut store = GraphStore::new();
        let mut connecting = Road::new("C", 5.0);
        connecting.junction = Some(JunctionMembership {
            junction_id: "J".to_string(),
            resolved: None,
        });
        store.insert_road(connecting).unwrap();
        store.insert_road(Road::new("In", 5.0)).unwrap();

        let mut junction = Junction::new("J");
        for (id, incoming) in [("0", "In"), ("1", "Missing")] {
            junction.connections.push(JunctionConnection {
                id: id.to_string(),
                incoming_road: incoming.to_string(),
                connecting_road: "C".to_string(),
                contact_point: Some(ContactPoint::Start),
                lane_links: Vec::new(),
                resolved_incoming: None,
                resolved_connecting: None,
            });
        }
        store.insert_junction(junction).unwrap();

        let (summary, dangling) = store.resolve_links();
        assert_eq!(summary.resolved, 4);
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].target_id, "Missing");

        let c = store.get_road("C").unwrap();
        assert_eq!(
            c.junction.as_ref().unwrap().resolved,
            Some(JunctionId("J".to_string()))
        );
        let j = store.get_junction("J").unwrap();
        assert_eq!(j.connections[0].resolved_incoming, Some(RoadId("In".to_string())));
        assert!(j.connections[1].resolved_incoming.is_none());
        assert_eq!(j.connections[1].resolved_connecting, Some(RoadId("C".to_string())));
    }

    #[test]
    fn handles_taken_before_resolution_keep_their_snapshot() {
        let mut store = GraphStore::new();
        store
            .insert_road(road_with_successor("A", "A", ElementType::Road))
            .unwrap();
        let before = store.get_road("A").unwrap();
        store.resolve_links();
        assert!(before.link.successor.as_ref().unwrap().resolved.is_none());
        assert!(store
            .get_road("A")
            .unwrap()
            .link
            .successor
            .as_ref()
            .unwrap()
            .resolved
            .is_some());
    }
}
