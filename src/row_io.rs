// Copyright 2025 The Flowmap Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Translation between the in-memory graph model and the external
//! row-based representation, plus the best-effort persistence driver.
//!
//! The external datastore is reached through [`RowStore`]. The trait is
//! synchronous; retries, timeouts, and asynchrony belong to the transport
//! adapter implementing it.

use std::collections::HashMap;

use lazy_static::lazy_static;
use log::{error, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::color;
use crate::common::{Error, Result};
use crate::datamodel::{Edge, Graph, GroupNode, Node, Point, PointNode, Position};
use crate::geometry;
use crate::ident::EdgeIdAllocator;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRow {
    pub id: String,
    pub color: Option<String>,
    pub location_x: Option<f64>,
    pub location_y: Option<f64>,
    pub decision_x: Option<f64>,
    pub decision_y: Option<f64>,
    pub group_x: Option<f64>,
    pub group_y: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupRow {
    pub id: i64,
    pub name: String,
    pub color: Option<String>,
    pub position_x: Option<f64>,
    pub position_y: Option<f64>,
    pub box_width: Option<f64>,
    pub box_height: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupMemberRow {
    pub id: i64,
    pub node_id: String,
    pub node_group_id: i64,
}

/// Group upsert payload. Color is deliberately absent: it is written
/// once at group creation and the save path must not null it out.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupUpsertRow {
    pub id: i64,
    pub name: String,
    pub position_x: Option<f64>,
    pub position_y: Option<f64>,
    pub box_width: Option<f64>,
    pub box_height: Option<f64>,
}

/// Membership insert payload; the row id is server-generated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewGroupMemberRow {
    pub node_id: String,
    pub node_group_id: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub id: i64,
    pub source_node_id: String,
    pub target_node_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RobotRow {
    pub id: i64,
    pub position_x: f64,
    pub position_y: f64,
    pub is_leader: bool,
}

/// The external row datastore collaborator.
pub trait RowStore {
    fn fetch_nodes(&self) -> Result<Vec<NodeRow>>;
    fn fetch_edges(&self) -> Result<Vec<EdgeRow>>;
    fn fetch_groups(&self) -> Result<Vec<GroupRow>>;
    fn fetch_group_members(&self) -> Result<Vec<GroupMemberRow>>;
    fn fetch_robots(&self) -> Result<Vec<RobotRow>>;
    fn fetch_node_ids(&self) -> Result<Vec<String>>;

    fn upsert_nodes(&mut self, rows: &[NodeRow]) -> Result<()>;
    fn upsert_groups(&mut self, rows: &[GroupUpsertRow]) -> Result<()>;
    fn insert_group(&mut self, name: &str, db_color: &str) -> Result<GroupRow>;
    fn delete_nodes(&mut self, ids: &[String]) -> Result<()>;
    fn delete_group_members_for(&mut self, node_ids: &[String]) -> Result<()>;
    fn insert_group_members(&mut self, rows: &[NewGroupMemberRow]) -> Result<()>;
    fn delete_all_edges(&mut self) -> Result<()>;
    fn insert_edges(&mut self, rows: &[EdgeRow]) -> Result<()>;
    fn update_robot_position(&mut self, id: i64, x: f64, y: f64) -> Result<()>;
}

/// Builds the in-memory graph from row data. Group nodes are emitted
/// ahead of their members, and each member's position is rewritten to the
/// parent-relative frame.
pub fn hydrate(
    node_rows: &[NodeRow],
    edge_rows: &[EdgeRow],
    group_rows: &[GroupRow],
    member_rows: &[GroupMemberRow],
) -> Graph {
    let edges: Vec<Edge> = edge_rows
        .iter()
        .map(|row| {
            Edge::new(
                row.id.to_string(),
                row.source_node_id.clone(),
                row.target_node_id.clone(),
            )
        })
        .collect();

    if node_rows.is_empty() {
        return Graph {
            nodes: vec![],
            edges,
        };
    }

    let membership: HashMap<&str, i64> = member_rows
        .iter()
        .map(|m| (m.node_id.as_str(), m.node_group_id))
        .collect();

    let mut points: Vec<PointNode> = node_rows
        .iter()
        .map(|row| {
            // decision coordinates override the stored absolute location,
            // per axis
            let x = row.decision_x.or(row.location_x).unwrap_or_default();
            let y = row.decision_y.or(row.location_y).unwrap_or_default();
            PointNode {
                id: row.id.clone(),
                position: Position::absolute(Point::new(x, y)),
                label: row.id.clone(),
                color: color::db_color_to_ui(row.color.as_deref().unwrap_or_default()).to_string(),
                decision_x: row.decision_x,
                decision_y: row.decision_y,
                group_id: membership.get(row.id.as_str()).copied(),
            }
        })
        .collect();

    let mut group_nodes: Vec<Node> = Vec::with_capacity(group_rows.len());
    for g in group_rows {
        let member_idxs: Vec<usize> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.group_id == Some(g.id))
            .map(|(i, _)| i)
            .collect();

        let explicit_pos = match (g.position_x, g.position_y) {
            (Some(x), Some(y)) => Some(Point::new(x, y)),
            _ => None,
        };
        let member_abs: Vec<Point> = member_idxs
            .iter()
            .map(|&i| points[i].position.point)
            .collect();
        let origin = geometry::group_origin(explicit_pos, &member_abs);

        let group_node_id = GroupNode::node_id(g.id);
        let mut member_rel: Vec<Point> = Vec::with_capacity(member_idxs.len());
        for &i in &member_idxs {
            let row = &node_rows[i];
            let rel = match (row.group_x, row.group_y) {
                (Some(x), Some(y)) => Point::new(x, y),
                _ => geometry::to_relative(points[i].position.point, origin),
            };
            points[i].position = Position::relative_to(group_node_id.clone(), rel);
            member_rel.push(rel);
        }

        let explicit_size = match (g.box_width, g.box_height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => None,
        };
        let bounds = geometry::derive_group_bounds(origin, explicit_size, &member_rel);
        group_nodes.push(Node::Group(GroupNode {
            id: group_node_id,
            group_id: g.id,
            label: g.name.clone(),
            color: color::db_color_to_ui(g.color.as_deref().unwrap_or_default()).to_string(),
            position: bounds.position,
            width: Some(bounds.width),
            height: Some(bounds.height),
            style: None,
        }));
    }

    let mut nodes = group_nodes;
    nodes.extend(points.into_iter().map(Node::Point));
    Graph { nodes, edges }
}

fn fetch_or_empty<T>(table: &str, result: Result<Vec<T>>) -> Vec<T> {
    match result {
        Ok(rows) => rows,
        Err(err) => {
            warn!("loading {table} failed, treating as empty: {err}");
            Vec::new()
        }
    }
}

/// Loads the full graph from the store. A table that fails to load
/// behaves as an empty set rather than aborting the load.
pub fn load_flow(store: &dyn RowStore) -> Graph {
    let node_rows = fetch_or_empty("nodes", store.fetch_nodes());
    let edge_rows = fetch_or_empty("edges", store.fetch_edges());
    let group_rows = fetch_or_empty("node_groups", store.fetch_groups());
    let member_rows = fetch_or_empty("node_group_members", store.fetch_group_members());
    hydrate(&node_rows, &edge_rows, &group_rows, &member_rows)
}

/// Flattens a point node back to its row: absolute coordinates always,
/// group-relative coordinates only while parented.
pub fn node_row_from(point: &PointNode, nodes: &[Node]) -> NodeRow {
    let (abs, group_rel) = match point.position.parent_id() {
        None => (point.position.point, None),
        Some(parent_id) => {
            let parent_pos = nodes
                .iter()
                .find(|n| n.id() == parent_id)
                .and_then(Node::as_group)
                .map(|g| g.position);
            let abs = geometry::to_absolute(&point.position, parent_pos);
            (abs, Some(point.position.point))
        }
    };

    NodeRow {
        id: point.id.clone(),
        color: Some(color::ui_color_to_db(&point.color).to_string()),
        location_x: Some(abs.x),
        location_y: Some(abs.y),
        decision_x: point.decision_x,
        decision_y: point.decision_y,
        group_x: group_rel.map(|p| p.x),
        group_y: group_rel.map(|p| p.y),
    }
}

lazy_static! {
    static ref STYLE_WIDTH_RE: Regex = Regex::new(r"width:\s*([\d.]+)px").unwrap();
    static ref STYLE_HEIGHT_RE: Regex = Regex::new(r"height:\s*([\d.]+)px").unwrap();
}

fn style_dimension(style: Option<&str>, re: &Regex) -> Option<f64> {
    // non-numeric matches are skipped so the caller's default applies
    re.captures(style?)?.get(1)?.as_str().parse().ok()
}

/// Flattens a group node to its upsert payload. Dimensions prefer the
/// explicit width/height fields and fall back to pixel sizes parsed out
/// of the free-form style string.
pub fn group_row_from(group: &GroupNode) -> GroupUpsertRow {
    let style = group.style.as_deref();
    GroupUpsertRow {
        id: group.group_id,
        name: group.label.clone(),
        position_x: Some(group.position.x),
        position_y: Some(group.position.y),
        box_width: group.width.or_else(|| style_dimension(style, &STYLE_WIDTH_RE)),
        box_height: group
            .height
            .or_else(|| style_dimension(style, &STYLE_HEIGHT_RE)),
    }
}

/// Plans the full-replace edge insert: existing numeric ids are preserved
/// to keep external references stable, non-numeric ids are backfilled
/// with the smallest unused integers.
pub fn plan_edge_rows(edges: &[Edge]) -> Vec<EdgeRow> {
    let mut alloc = EdgeIdAllocator::seeded(edges.iter().map(|e| e.id.as_str()));
    edges
        .iter()
        .map(|e| EdgeRow {
            id: e.numeric_id().unwrap_or_else(|| alloc.claim()) as i64,
            source_node_id: e.source.clone(),
            target_node_id: e.target.clone(),
        })
        .collect()
}

/// Remote node ids with no counterpart in the current save.
pub fn obsolete_node_ids(nodes: &[Node], remote_ids: &[String]) -> Vec<String> {
    remote_ids
        .iter()
        .filter(|id| {
            !nodes
                .iter()
                .filter(|n| n.as_group().is_none())
                .any(|n| n.id() == id.as_str())
        })
        .cloned()
        .collect()
}

/// Membership rows for every parented node in the current save.
pub fn membership_rows(nodes: &[Node]) -> Vec<NewGroupMemberRow> {
    nodes
        .iter()
        .filter_map(Node::as_point)
        .filter_map(|p| {
            p.group_id.map(|group_id| NewGroupMemberRow {
                node_id: p.id.clone(),
                node_group_id: group_id,
            })
        })
        .collect()
}

/// Outcome of a best-effort save: every failed sub-step, in order.
#[derive(Debug, Default)]
pub struct SaveReport {
    pub failures: Vec<Error>,
}

impl SaveReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, step: &str, result: Result<()>) {
        if let Err(err) = result {
            error!("save step '{step}' failed: {err}");
            self.failures.push(err);
        }
    }
}

/// Persists the graph as five independent sub-steps. A failed sub-step is
/// logged and recorded but never aborts the ones after it; partial writes
/// are not rolled back. This is deliberate: the row tables are refreshed
/// individually and the next save converges.
pub fn save_flow(store: &mut dyn RowStore, graph: &Graph) -> SaveReport {
    let mut report = SaveReport::default();

    // 1. nodes (group nodes are derived, never stored in the nodes table)
    let node_rows: Vec<NodeRow> = graph
        .nodes
        .iter()
        .filter_map(Node::as_point)
        .map(|p| node_row_from(p, &graph.nodes))
        .collect();
    report.record("upsert nodes", store.upsert_nodes(&node_rows));

    // 2. group geometry
    let group_rows: Vec<GroupUpsertRow> = graph
        .nodes
        .iter()
        .filter_map(Node::as_group)
        .map(group_row_from)
        .collect();
    if !group_rows.is_empty() {
        report.record("upsert groups", store.upsert_groups(&group_rows));
    }

    // 3. rows no longer present, membership rows first so the foreign key
    //    constraint holds
    match store.fetch_node_ids() {
        Ok(remote_ids) => {
            let obsolete = obsolete_node_ids(&graph.nodes, &remote_ids);
            if !obsolete.is_empty() {
                report.record(
                    "delete obsolete memberships",
                    store.delete_group_members_for(&obsolete),
                );
                report.record("delete obsolete nodes", store.delete_nodes(&obsolete));
            }
        }
        Err(err) => {
            error!("save step 'fetch remote node ids' failed: {err}");
            report.failures.push(err);
        }
    }

    // 4. edges are full-replace
    report.record("delete edges", store.delete_all_edges());
    let edge_rows = plan_edge_rows(&graph.edges);
    if !edge_rows.is_empty() {
        report.record("insert edges", store.insert_edges(&edge_rows));
    }

    // 5. memberships are replaced for exactly the node ids in this save
    let node_ids: Vec<String> = graph.nodes.iter().map(|n| n.id().to_string()).collect();
    if !node_ids.is_empty() {
        report.record(
            "delete memberships",
            store.delete_group_members_for(&node_ids),
        );
        let members = membership_rows(&graph.nodes);
        if !members.is_empty() {
            report.record("insert memberships", store.insert_group_members(&members));
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::Frame;

    fn node_row(id: &str, x: f64, y: f64) -> NodeRow {
        NodeRow {
            id: id.to_string(),
            color: Some("green".to_string()),
            location_x: Some(x),
            location_y: Some(y),
            ..Default::default()
        }
    }

    #[test]
    fn hydrate_reparents_group_members() {
        let nodes = vec![node_row("A", 100.0, 60.0), node_row("B", 80.0, 90.0)];
        let groups = vec![GroupRow {
            id: 1,
            name: "zone".to_string(),
            color: Some("red".to_string()),
            ..Default::default()
        }];
        let members = vec![
            GroupMemberRow {
                id: 1,
                node_id: "A".to_string(),
                node_group_id: 1,
            },
            GroupMemberRow {
                id: 2,
                node_id: "B".to_string(),
                node_group_id: 1,
            },
        ];

        let graph = hydrate(&nodes, &[], &groups, &members);

        // group node comes before its members
        assert_eq!("group-1", graph.nodes[0].id());
        let group = graph.nodes[0].as_group().unwrap();
        assert_eq!(Point::new(40.0, 20.0), group.position);

        let a = graph.get_node("A").unwrap().as_point().unwrap();
        assert_eq!(Some("group-1"), a.position.parent_id());
        assert_eq!(Point::new(60.0, 40.0), a.position.point);
        // derived bounds keep both members inside the padding margin
        let b = graph.get_node("B").unwrap().as_point().unwrap();
        for rel in [a.position.point, b.position.point] {
            assert!(rel.x + geometry::GROUP_PADDING <= group.width.unwrap());
            assert!(rel.y + geometry::GROUP_PADDING <= group.height.unwrap());
        }
        // the absolute position survives the reparenting
        assert_eq!(
            Some(Point::new(100.0, 60.0)),
            graph.absolute_position("A")
        );
    }

    #[test]
    fn hydrate_prefers_stored_relative_offsets() {
        let mut a = node_row("A", 100.0, 60.0);
        a.group_x = Some(12.0);
        a.group_y = Some(7.0);
        let groups = vec![GroupRow {
            id: 1,
            name: "zone".to_string(),
            position_x: Some(50.0),
            position_y: Some(50.0),
            ..Default::default()
        }];
        let members = vec![GroupMemberRow {
            id: 1,
            node_id: "A".to_string(),
            node_group_id: 1,
        }];

        let graph = hydrate(&[a], &[], &groups, &members);
        let a = graph.get_node("A").unwrap().as_point().unwrap();
        assert_eq!(Point::new(12.0, 7.0), a.position.point);
    }

    #[test]
    fn hydrate_decision_coordinates_override_location() {
        let mut a = node_row("A", 100.0, 60.0);
        a.decision_x = Some(3.0);
        a.decision_y = Some(4.0);

        let graph = hydrate(&[a], &[], &[], &[]);
        let a = graph.get_node("A").unwrap().as_point().unwrap();
        assert_eq!(Point::new(3.0, 4.0), a.position.point);
        assert_eq!(Frame::Absolute, a.position.frame);
        assert_eq!(Some(3.0), a.decision_x);
        assert_eq!(Some(4.0), a.decision_y);
    }

    #[test]
    fn single_axis_decision_override_survives_a_roundtrip() {
        let mut a = node_row("A", 100.0, 60.0);
        a.decision_x = Some(5.0);

        let graph = hydrate(&[a], &[], &[], &[]);
        let hydrated = graph.get_node("A").unwrap().as_point().unwrap();
        // the override applies per axis: x from the decision coordinate,
        // y from the stored location
        assert_eq!(Point::new(5.0, 60.0), hydrated.position.point);

        let row = node_row_from(hydrated, &graph.nodes);
        assert_eq!(Some(5.0), row.decision_x);
        assert_eq!(None, row.decision_y);
    }

    #[test]
    fn hydrate_edges_survive_missing_nodes_table() {
        let edges = vec![EdgeRow {
            id: 4,
            source_node_id: "A".to_string(),
            target_node_id: "B".to_string(),
        }];
        let graph = hydrate(&[], &edges, &[], &[]);
        assert!(graph.nodes.is_empty());
        assert_eq!(1, graph.edges.len());
        assert_eq!("4", graph.edges[0].id);
        assert!(graph.edges[0].animated);
    }

    #[test]
    fn node_row_restores_absolute_coordinates() {
        let graph = hydrate(
            &[node_row("A", 100.0, 60.0)],
            &[],
            &[GroupRow {
                id: 1,
                name: "zone".to_string(),
                ..Default::default()
            }],
            &[GroupMemberRow {
                id: 1,
                node_id: "A".to_string(),
                node_group_id: 1,
            }],
        );
        let a = graph.get_node("A").unwrap().as_point().unwrap();
        let row = node_row_from(a, &graph.nodes);

        // single member at (100, 60): group origin is (60, 20), so the
        // relative offset is the padding margin on both axes
        assert_eq!(Some(100.0), row.location_x);
        assert_eq!(Some(60.0), row.location_y);
        assert_eq!(Some(40.0), row.group_x);
        assert_eq!(Some(40.0), row.group_y);
    }

    #[test]
    fn group_row_falls_back_to_style_dimensions() {
        let group = GroupNode {
            id: "group-2".to_string(),
            group_id: 2,
            label: "zone".to_string(),
            color: color::UI_GREEN.to_string(),
            position: Point::new(1.0, 2.0),
            width: None,
            height: None,
            style: Some("width: 320px; height: 240.5px; border: 2px dashed".to_string()),
        };
        let row = group_row_from(&group);
        assert_eq!(Some(320.0), row.box_width);
        assert_eq!(Some(240.5), row.box_height);

        let unparseable = GroupNode {
            style: Some("width: wide".to_string()),
            ..group
        };
        let row = group_row_from(&unparseable);
        assert_eq!(None, row.box_width);
    }

    #[test]
    fn plan_edge_rows_preserves_numeric_ids() {
        let edges = vec![
            Edge::new("7", "A", "B"),
            Edge::new("xy-1", "B", "C"),
            Edge::new("1", "C", "D"),
        ];
        let rows = plan_edge_rows(&edges);
        assert_eq!(vec![7, 2, 1], rows.iter().map(|r| r.id).collect::<Vec<_>>());
    }

    #[test]
    fn obsolete_ids_ignore_group_nodes() {
        let graph = hydrate(
            &[node_row("A", 0.0, 0.0)],
            &[],
            &[GroupRow {
                id: 1,
                name: "zone".to_string(),
                ..Default::default()
            }],
            &[],
        );
        let remote = vec!["A".to_string(), "B".to_string()];
        assert_eq!(vec!["B".to_string()], obsolete_node_ids(&graph.nodes, &remote));
    }
}
