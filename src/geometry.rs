// Copyright 2025 The Flowmap Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Conversions between parent-relative and absolute canvas coordinates,
//! and derivation of group bounding geometry from member positions.

use crate::datamodel::{Point, Position};

/// Margin kept between a group's border and its members.
pub const GROUP_PADDING: f64 = 40.0;

/// Assumed footprint of a member node when deriving group dimensions.
pub const FALLBACK_NODE_WIDTH: f64 = 150.0;
pub const FALLBACK_NODE_HEIGHT: f64 = 50.0;

/// Relative extent assumed for a memberless group so no infinity leaks
/// into layout.
pub const EMPTY_GROUP_EXTENT: f64 = 100.0;

/// Default side length of a freshly created group box.
pub const NEW_GROUP_SIZE: f64 = 200.0;

/// Resolves a tagged position to absolute canvas coordinates. A relative
/// position without a resolvable parent is passed through unchanged.
pub fn to_absolute(position: &Position, parent: Option<Point>) -> Point {
    match (position.parent_id(), parent) {
        (Some(_), Some(parent)) => parent + position.point,
        _ => position.point,
    }
}

pub fn to_relative(absolute: Point, parent: Point) -> Point {
    absolute - parent
}

/// Determines a group's absolute origin: the explicitly stored position
/// when present, otherwise the componentwise minimum of the members'
/// absolute positions pulled out by the padding margin. A memberless group
/// without a stored position sits at the canvas origin.
pub fn group_origin(explicit: Option<Point>, member_abs: &[Point]) -> Point {
    if let Some(origin) = explicit {
        return origin;
    }
    if member_abs.is_empty() {
        return Point::default();
    }

    let min_x = member_abs.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let min_y = member_abs.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    Point::new(min_x - GROUP_PADDING, min_y - GROUP_PADDING)
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroupBounds {
    pub position: Point,
    pub width: f64,
    pub height: f64,
}

/// Derives a group's bounding box from its origin and the members'
/// parent-relative positions. Explicitly stored dimensions win; otherwise
/// the box extends to the furthest member plus a fallback node footprint
/// and the padding margin.
pub fn derive_group_bounds(
    origin: Point,
    explicit_size: Option<(f64, f64)>,
    member_rel: &[Point],
) -> GroupBounds {
    if let Some((width, height)) = explicit_size {
        return GroupBounds {
            position: origin,
            width,
            height,
        };
    }

    let (max_rel_x, max_rel_y) = if member_rel.is_empty() {
        (EMPTY_GROUP_EXTENT, EMPTY_GROUP_EXTENT)
    } else {
        (
            member_rel.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max),
            member_rel.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max),
        )
    };

    GroupBounds {
        position: origin,
        width: max_rel_x + FALLBACK_NODE_WIDTH + GROUP_PADDING,
        height: max_rel_y + FALLBACK_NODE_HEIGHT + GROUP_PADDING,
    }
}
