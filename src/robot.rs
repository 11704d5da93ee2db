// Copyright 2025 The Flowmap Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Snapshot loading and discrete trajectory generation for the mobile
//! agents shown on the map view.

use log::warn;

use crate::color;
use crate::common::Result;
use crate::datamodel::{Point, Robot};
use crate::row_io::RowStore;

/// A static decision point the robots can be sent to.
#[derive(Clone, Debug, PartialEq)]
pub struct MapPoint {
    pub id: String,
    pub position: Point,
}

/// One discrete snapshot of every agent's position and flags.
pub type RobotFrame = Vec<Robot>;

/// Loads the static point nodes and the robot snapshot. The first robot
/// is shown red, the rest green. Failed tables behave as empty sets.
pub fn fetch_map_data(store: &dyn RowStore) -> (Vec<MapPoint>, Vec<Robot>) {
    let static_nodes = match store.fetch_nodes() {
        Ok(rows) => rows
            .iter()
            .map(|row| MapPoint {
                id: row.id.clone(),
                position: Point::new(
                    row.location_x.unwrap_or_default(),
                    row.location_y.unwrap_or_default(),
                ),
            })
            .collect(),
        Err(err) => {
            warn!("loading map nodes failed, treating as empty: {err}");
            Vec::new()
        }
    };

    let robots = match store.fetch_robots() {
        Ok(rows) => rows
            .iter()
            .enumerate()
            .map(|(index, row)| Robot {
                id: Robot::node_id(row.id),
                label: format!("R{}", row.id),
                color: if index == 0 {
                    color::DB_RED.to_string()
                } else {
                    color::DB_GREEN.to_string()
                },
                position: Point::new(row.position_x, row.position_y),
                is_leader: row.is_leader,
                radius: None,
            })
            .collect(),
        Err(err) => {
            warn!("loading robots failed, treating as empty: {err}");
            Vec::new()
        }
    };

    (static_nodes, robots)
}

/// Writes a robot's position back to its row, keyed by the numeric part
/// of the `robot-<id>` composite identifier. Non-robot ids are a no-op.
pub fn update_robot_position(store: &mut dyn RowStore, robot: &Robot) -> Result<()> {
    match Robot::parse_row_id(&robot.id) {
        Some(row_id) => store.update_robot_position(row_id, robot.position.x, robot.position.y),
        None => Ok(()),
    }
}

fn resolve_index(robots: &[Robot], id: Option<&str>) -> Option<usize> {
    id.and_then(|id| robots.iter().position(|r| r.id == id))
}

/// Generates the two-frame trajectory: frame 0 re-flags the leader and
/// attaches the follower containment radius, frame 1 moves the moving
/// agent onto the target. Returns no frames when there are no robots.
///
/// Every frame is an owned deep copy; downstream consumers mutate frames
/// in place (live dragging) and that must never leak back into the
/// source snapshot.
pub fn generate_steps(
    initial_robots: &[Robot],
    target_nodes: &[MapPoint],
    leader_id: Option<&str>,
    target_node_id: Option<&str>,
    moving_robot_id: Option<&str>,
) -> Vec<RobotFrame> {
    if initial_robots.is_empty() {
        return Vec::new();
    }

    let leader_index = resolve_index(initial_robots, leader_id)
        .or_else(|| initial_robots.iter().position(|r| r.is_leader))
        .unwrap_or(0);
    let moving_index = resolve_index(initial_robots, moving_robot_id).unwrap_or(leader_index);

    let target_position = target_node_id
        .and_then(|id| target_nodes.iter().find(|n| n.id == id))
        .or_else(|| target_nodes.first())
        .map(|n| n.position);

    // the containment radius only applies while the leader itself moves
    let move_distance = match target_position {
        Some(target) if moving_index == leader_index => {
            let delta = target - initial_robots[moving_index].position;
            delta.x.hypot(delta.y)
        }
        _ => 0.0,
    };
    let follower_radius = if move_distance > 0.0 {
        Some(move_distance)
    } else {
        None
    };

    let frame0: RobotFrame = initial_robots
        .iter()
        .enumerate()
        .map(|(index, robot)| {
            let is_leader = index == leader_index;
            Robot {
                is_leader,
                radius: if is_leader { None } else { follower_radius },
                ..robot.clone()
            }
        })
        .collect();

    let mut frame1 = frame0.clone();
    if let Some(target) = target_position {
        frame1[moving_index].position = target;
    }

    vec![frame0, frame1]
}
