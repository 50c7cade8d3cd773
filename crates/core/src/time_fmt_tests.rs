// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    zero          = { 0,       "0.0s" },
    sub_second    = { 400,     "0.4s" },
    seconds       = { 42_000,  "42.0s" },
    just_a_minute = { 60_000,  "1m 0.0s" },
    minutes       = { 187_500, "3m 7.5s" },
    long          = { 3_725_000, "62m 5.0s" },
)]
fn formats(ms: u64, expected: &str) {
    assert_eq!(format_elapsed_ms(ms), expected);
}
