//! Proptest strategies for game rule properties.

use proptest::collection::vec;
use proptest::prelude::*;

/// A lowercase ASCII word of 2 to 10 letters.
pub fn word() -> impl Strategy<Value = String> {
    "[a-z]{2,10}"
}

/// A non-empty dictionary of up to 40 words.
pub fn word_list() -> impl Strategy<Value = Vec<String>> {
    vec(word(), 1..40)
}

/// A raw submission as a client might type it: empty, padded, or mixed case.
pub fn submission() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[a-z]{1,8}",
        " ?[A-Za-z]{1,8} ?",
    ]
}

/// Starting lives for a roster of 2 to 6 players.
pub fn roster_lives() -> impl Strategy<Value = Vec<u32>> {
    vec(1u32..4, 2..7)
}
