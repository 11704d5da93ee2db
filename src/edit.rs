// Copyright 2025 The Flowmap Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Structural edits over the in-memory node/edge collections: connect,
//! delete-with-rewire, node creation, and group creation.

use std::collections::HashSet;

use crate::color;
use crate::common::Result;
use crate::datamodel;
use crate::datamodel::{DEFAULT_ROOT_ID, Edge, Graph, GroupNode, Node, Point, PointNode, Position};
use crate::geometry::{GROUP_PADDING, NEW_GROUP_SIZE};
use crate::ident::{self, EdgeIdAllocator};
use crate::row_io::{GroupRow, RowStore};

/// A requested connection, before an id has been assigned.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EdgeCandidate {
    pub source: String,
    pub target: String,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
}

fn numeric_edge_ids(edges: &[Edge]) -> HashSet<u64> {
    edges.iter().filter_map(Edge::numeric_id).collect()
}

/// Applies a connection to the edge set. An existing edge with the same
/// (source, target, handle pair) tuple is replaced rather than duplicated;
/// the new edge's id is allocated against the surviving edges.
pub fn connect(candidate: &EdgeCandidate, edges: &[Edge]) -> Vec<Edge> {
    let mut filtered: Vec<Edge> = edges
        .iter()
        .filter(|e| {
            !(e.source == candidate.source
                && e.target == candidate.target
                && e.source_handle == candidate.source_handle
                && e.target_handle == candidate.target_handle)
        })
        .cloned()
        .collect();

    let id = ident::next_edge_id(&numeric_edge_ids(&filtered));
    filtered.push(Edge {
        id,
        source: candidate.source.clone(),
        target: candidate.target.clone(),
        source_handle: candidate.source_handle.clone(),
        target_handle: candidate.target_handle.clone(),
        animated: true,
    });
    filtered
}

/// Deletes nodes and rewires around them: every incomer of a deleted node
/// is connected to every outgoer (full cross product), with fresh edge ids
/// that cannot collide within the batch.
///
/// The deletion sequence is folded over an explicit (nodes, edges)
/// accumulator, so a chain of deletions in one call sees the rewiring of
/// the previous step. No edge references a deleted node afterwards.
pub fn delete_nodes(deleted_ids: &[String], graph: &Graph) -> Graph {
    let initial = (graph.nodes.clone(), graph.edges.clone());
    let (nodes, edges) = deleted_ids.iter().fold(initial, |(nodes, edges), deleted_id| {
        if !nodes.iter().any(|n| n.id() == *deleted_id) {
            return (nodes, edges);
        }

        // self-loops on the deleted node are dropped, not rewired; the
        // node must not survive as its own incomer or outgoer
        let mut incomers: Vec<String> = Vec::new();
        let mut outgoers: Vec<String> = Vec::new();
        for edge in &edges {
            if edge.target == *deleted_id
                && edge.source != *deleted_id
                && !incomers.contains(&edge.source)
            {
                incomers.push(edge.source.clone());
            }
            if edge.source == *deleted_id
                && edge.target != *deleted_id
                && !outgoers.contains(&edge.target)
            {
                outgoers.push(edge.target.clone());
            }
        }

        let mut edges: Vec<Edge> = edges
            .into_iter()
            .filter(|e| e.source != *deleted_id && e.target != *deleted_id)
            .collect();

        let mut alloc = EdgeIdAllocator::seeded(edges.iter().map(|e| e.id.as_str()));
        for source in &incomers {
            for target in &outgoers {
                edges.push(Edge::new(
                    alloc.claim().to_string(),
                    source.clone(),
                    target.clone(),
                ));
            }
        }

        let nodes = nodes
            .into_iter()
            .filter(|n| n.id() != *deleted_id)
            .collect();
        (nodes, edges)
    });

    Graph { nodes, edges }
}

/// Creates a new unparented point node at the given canvas position,
/// connected from `source_id` (default: the root node).
pub fn create_node(
    nodes: &[Node],
    edges: &[Edge],
    source_id: Option<&str>,
    position: Point,
) -> (Node, Edge) {
    let existing: HashSet<String> = nodes.iter().map(|n| n.id().to_string()).collect();
    let id = ident::next_node_id(&existing);
    let edge_id = ident::next_edge_id(&numeric_edge_ids(edges));

    let node = Node::Point(PointNode {
        id: id.clone(),
        position: Position::absolute(position),
        label: id.clone(),
        color: color::UI_GREEN.to_string(),
        decision_x: Some(0.0),
        decision_y: Some(0.0),
        group_id: None,
    });
    let edge = Edge::new(
        edge_id,
        source_id.unwrap_or(DEFAULT_ROOT_ID).to_string(),
        id,
    );
    (node, edge)
}

/// Inserts a group row in the external store (ids are server-generated)
/// and returns it for `create_group_node`.
pub fn create_group(store: &mut dyn RowStore, name: &str, ui_color: &str) -> Result<GroupRow> {
    store.insert_group(name, color::ui_color_to_db(ui_color))
}

/// Builds the in-memory group node for a freshly inserted group row,
/// anchored up-and-left of the anchor node's absolute position.
pub fn create_group_node(group: &GroupRow, anchor_id: Option<&str>, nodes: &[Node]) -> Node {
    let anchor_abs = anchor_id.and_then(|id| datamodel::absolute_position(nodes, id));
    let position = match anchor_abs {
        Some(abs) => abs - Point::new(GROUP_PADDING, GROUP_PADDING),
        None => Point::default(),
    };

    Node::Group(GroupNode {
        id: GroupNode::node_id(group.id),
        group_id: group.id,
        label: group.name.clone(),
        color: color::db_color_to_ui(group.color.as_deref().unwrap_or_default()).to_string(),
        position,
        width: Some(NEW_GROUP_SIZE),
        height: Some(NEW_GROUP_SIZE),
        style: None,
    })
}
