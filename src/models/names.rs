use std::sync::atomic::{AtomicUsize, Ordering};

const SAMPLE_NAMES: &[&str] = &[
    "Bryan", "Olivia", "Vincent", "Kenneth", "Debra", "Jack", "Harold", "Isabella", "Jerry",
    "Stephen", "Larry", "Ruth", "Diane", "Gerald", "Brandon", "Virginia", "Helen", "Gary", "Noah",
    "Alexis", "Zachary", "Gregory", "Arthur", "Dennis", "Terry", "Rose", "Jeffrey", "Jean",
    "Brenda", "Louis", "Mary", "Julia", "Sandra", "Catherine", "Adam", "Samantha", "Amber",
    "Jacob", "Raymond", "Rachel", "Kelly", "Danielle", "Melissa", "Albert", "Jeremy", "Nathan",
    "Beverly", "Margaret", "Natalie", "Charlotte",
];

#[derive(Debug, Default)]
pub struct NameGenerator {
    cursor: AtomicUsize,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_name(&self, prefix: &str) -> String {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % SAMPLE_NAMES.len();
        format!("{prefix}-{}", SAMPLE_NAMES[idx])
    }
}
