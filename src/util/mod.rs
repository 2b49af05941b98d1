pub mod env;
pub mod slug;
pub mod telemetry;

use std::hint::black_box;

/// Performs `&str` comparisons in constant time so that token checks don't leak how many leading
/// bytes matched.
pub fn constant_time_cmp(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let res = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (l, r)| black_box(acc | (black_box(*l) ^ black_box(*r))));

    res == 0
}
