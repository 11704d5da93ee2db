// Copyright 2025 The Flowmap Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Graph-editing and spatial-layout engine for node/edge decision
//! diagrams with nested group containers, plus the robot trajectory
//! generator for the map view.
//!
//! All graph, coordinate, id, and trajectory logic is synchronous and
//! single-threaded; the external row datastore sits behind
//! [`row_io::RowStore`].

#![forbid(unsafe_code)]

pub mod color;
pub mod common;
pub mod datamodel;
pub mod edit;
pub mod geometry;
pub mod ident;
pub mod robot;
pub mod row_io;

pub use self::common::{Error, ErrorCode, ErrorKind, Result};
pub use self::datamodel::{
    DEFAULT_ROOT_ID, Edge, Frame, Graph, GroupNode, Node, Point, PointNode, Position, Robot,
};
pub use self::row_io::{RowStore, SaveReport, load_flow, save_flow};
