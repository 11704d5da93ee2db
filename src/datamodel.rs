// Copyright 2025 The Flowmap Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashMap;
use std::ops::{Add, Sub};

use float_cmp::approx_eq;

/// The conventional root of a decision flow; new nodes created without an
/// explicit source are connected from here.
pub const DEFAULT_ROOT_ID: &str = "A";

const GROUP_NODE_PREFIX: &str = "group-";
const ROBOT_NODE_PREFIX: &str = "robot-";

#[derive(Copy, Clone, Debug, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        approx_eq!(f64, self.x, other.x, ulps = 2) && approx_eq!(f64, self.y, other.y, ulps = 2)
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// The frame of reference a position is expressed in.
///
/// Carrying the frame alongside the coordinates keeps relative and
/// absolute positions from being silently misread as one another.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Absolute,
    /// Offset from the origin of the named parent group node.
    RelativeTo(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Position {
    pub point: Point,
    pub frame: Frame,
}

impl Position {
    pub fn absolute(point: Point) -> Self {
        Position {
            point,
            frame: Frame::Absolute,
        }
    }

    pub fn relative_to<S: Into<String>>(parent_id: S, point: Point) -> Self {
        Position {
            point,
            frame: Frame::RelativeTo(parent_id.into()),
        }
    }

    pub fn parent_id(&self) -> Option<&str> {
        match &self.frame {
            Frame::Absolute => None,
            Frame::RelativeTo(parent_id) => Some(parent_id.as_str()),
        }
    }
}

/// A decision/location vertex.
#[derive(Clone, Debug, PartialEq)]
pub struct PointNode {
    pub id: String,
    pub position: Position,
    pub label: String,
    /// Display color (see the `color` module for the stored domain).
    pub color: String,
    /// Optional decision coordinate overrides carried through load/save.
    /// Each axis is independent; a row may override x without y.
    pub decision_x: Option<f64>,
    pub decision_y: Option<f64>,
    /// Backing group row id when this node is a group member.
    pub group_id: Option<i64>,
}

/// A container vertex bounding a set of member point nodes.
///
/// Groups are always absolutely positioned; nesting groups inside groups
/// is not supported.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupNode {
    pub id: String,
    /// The backing `node_groups` row id.
    pub group_id: i64,
    pub label: String,
    pub color: String,
    pub position: Point,
    pub width: Option<f64>,
    pub height: Option<f64>,
    /// Free-form style pass-through; the save path falls back to parsing
    /// pixel dimensions out of it when width/height are unset.
    pub style: Option<String>,
}

impl GroupNode {
    pub fn node_id(group_id: i64) -> String {
        format!("{GROUP_NODE_PREFIX}{group_id}")
    }

    pub fn parse_group_id(node_id: &str) -> Option<i64> {
        node_id
            .strip_prefix(GROUP_NODE_PREFIX)
            .and_then(|raw| raw.parse().ok())
    }
}

/// A mobile agent, snapshotted for trajectory generation.
#[derive(Clone, Debug, PartialEq)]
pub struct Robot {
    pub id: String,
    pub label: String,
    pub color: String,
    pub position: Point,
    pub is_leader: bool,
    /// Follower containment radius; only meaningful inside trajectory
    /// frames and never persisted.
    pub radius: Option<f64>,
}

impl Robot {
    pub fn node_id(row_id: i64) -> String {
        format!("{ROBOT_NODE_PREFIX}{row_id}")
    }

    pub fn parse_row_id(node_id: &str) -> Option<i64> {
        node_id
            .strip_prefix(ROBOT_NODE_PREFIX)
            .and_then(|raw| raw.parse().ok())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Point(PointNode),
    Group(GroupNode),
    Robot(Robot),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Point(point) => point.id.as_str(),
            Node::Group(group) => group.id.as_str(),
            Node::Robot(robot) => robot.id.as_str(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Node::Point(point) => point.label.as_str(),
            Node::Group(group) => group.label.as_str(),
            Node::Robot(robot) => robot.label.as_str(),
        }
    }

    pub fn as_point(&self) -> Option<&PointNode> {
        match self {
            Node::Point(point) => Some(point),
            _ => None,
        }
    }

    pub fn as_point_mut(&mut self) -> Option<&mut PointNode> {
        match self {
            Node::Point(point) => Some(point),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupNode> {
        match self {
            Node::Group(group) => Some(group),
            _ => None,
        }
    }
}

/// A directed connection between two nodes. New edges are always animated.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
    pub animated: bool,
}

impl Edge {
    pub fn new<S: Into<String>>(id: S, source: S, target: S) -> Self {
        Edge {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            animated: true,
        }
    }

    pub fn numeric_id(&self) -> Option<u64> {
        self.id.parse().ok()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    pub fn get_node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id() == id)
    }

    /// Resolves a node's absolute canvas position. Point nodes tagged
    /// relative to a group resolve through exactly one parent hop; a
    /// missing parent leaves the coordinates untouched.
    pub fn absolute_position(&self, id: &str) -> Option<Point> {
        absolute_position(&self.nodes, id)
    }

    /// Group membership as a lookup index, recomputed from the nodes'
    /// parent tags on each call. The index is the only place membership is
    /// materialized; nodes carry a single back-reference and groups never
    /// own a child list.
    pub fn membership_index(&self) -> HashMap<String, Vec<String>> {
        let mut index: HashMap<String, Vec<String>> = HashMap::new();
        for node in &self.nodes {
            if let Node::Point(point) = node
                && let Some(parent_id) = point.position.parent_id()
            {
                index
                    .entry(parent_id.to_string())
                    .or_default()
                    .push(point.id.clone());
            }
        }
        index
    }
}

/// See [`Graph::absolute_position`]; exposed over a bare node slice for
/// callers that are still assembling a graph.
pub fn absolute_position(nodes: &[Node], id: &str) -> Option<Point> {
    let node = nodes.iter().find(|n| n.id() == id)?;
    let abs = match node {
        Node::Group(group) => group.position,
        Node::Robot(robot) => robot.position,
        Node::Point(point) => match point.position.parent_id() {
            None => point.position.point,
            Some(parent_id) => {
                let parent = nodes
                    .iter()
                    .find(|n| n.id() == parent_id)
                    .and_then(Node::as_group);
                match parent {
                    Some(parent) => parent.position + point.position.point,
                    None => point.position.point,
                }
            }
        },
    };
    Some(abs)
}
