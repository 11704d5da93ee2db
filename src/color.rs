// Copyright 2025 The Flowmap Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Mapping between the two-value stored color domain and display colors.
//!
//! The mapping is bidirectional but lossy: anything that is not an exact
//! match collapses to green on either side.

pub const DB_RED: &str = "red";
pub const DB_GREEN: &str = "green";

pub const UI_RED: &str = "#fecaca";
pub const UI_GREEN: &str = "#bbf7d0";

pub fn ui_color_to_db(hex: &str) -> &'static str {
    if hex == UI_RED { DB_RED } else { DB_GREEN }
}

pub fn db_color_to_ui(color: &str) -> &'static str {
    if color == DB_RED { UI_RED } else { UI_GREEN }
}
