//! Fixed answers to the conceptual quiz that ships with the dataset

use std::collections::BTreeMap;

pub const CONCEPTUAL_ANSWERS: [(&str, char); 5] = [
    ("Q1", 'A'),
    ("Q2", 'B'),
    ("Q3", 'C'),
    ("Q4", 'A'),
    ("Q5", 'A'),
];

pub fn conceptual_answers() -> BTreeMap<&'static str, char> {
    CONCEPTUAL_ANSWERS.into_iter().collect()
}
