//! Deterministic customer names and reference vocabularies for synthetic data.
//!
//! Same RNG seed = same names.

use crate::rng::StreamRng;

pub struct NameGenerator;

impl NameGenerator {
    /// "First Last"
    pub fn full_name(rng: &mut StreamRng) -> String {
        let first = rng.pick(FIRST_NAMES).copied().unwrap_or("Alex");
        let last = rng.pick(LAST_NAMES).copied().unwrap_or("Smith");
        format!("{first} {last}")
    }

    pub fn region(rng: &mut StreamRng) -> &'static str {
        rng.pick(REGIONS).copied().unwrap_or("London")
    }

    pub fn complaint_category(rng: &mut StreamRng) -> &'static str {
        rng.pick(COMPLAINT_CATEGORIES).copied().unwrap_or("SERVICE")
    }

    pub fn channel(rng: &mut StreamRng) -> &'static str {
        rng.pick(CHANNELS).copied().unwrap_or("CARD")
    }
}

const FIRST_NAMES: &[&str] = &[
    "Oliver", "George", "Harry", "Jack", "Noah", "Leo", "Arthur", "Muhammad",
    "Oscar", "Charlie", "Jacob", "Thomas", "Henry", "William", "Alfie", "Joshua",
    "Freddie", "Archie", "Ethan", "Isaac", "Samuel", "Daniel", "Rohan", "Kwame",
    "Olivia", "Amelia", "Isla", "Ava", "Mia", "Ivy", "Lily", "Isabella",
    "Rosie", "Sophia", "Grace", "Freya", "Willow", "Florence", "Emily", "Ella",
    "Poppy", "Evie", "Sienna", "Priya", "Aisha", "Zara", "Niamh", "Siobhan",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Jones", "Taylor", "Brown", "Williams", "Wilson", "Johnson", "Davies",
    "Robinson", "Wright", "Thompson", "Evans", "Walker", "White", "Roberts", "Green",
    "Hall", "Wood", "Jackson", "Clarke", "Patel", "Khan", "Lewis", "Harris",
    "Martin", "Cooper", "King", "Baker", "Hughes", "Edwards", "Turner", "Hill",
    "Murphy", "Kelly", "Campbell", "Stewart", "Morgan", "Ahmed", "Singh", "Begum",
];

const REGIONS: &[&str] = &[
    "London", "South East", "South West", "East of England", "West Midlands",
    "East Midlands", "Yorkshire", "North West", "North East", "Scotland",
    "Wales", "Northern Ireland",
];

const COMPLAINT_CATEGORIES: &[&str] = &[
    "FEES", "SERVICE", "DIGITAL", "FRAUD", "PAYMENTS", "LENDING",
];

const CHANNELS: &[&str] = &["CARD", "ONLINE", "MOBILE", "BRANCH", "DIRECT_DEBIT", "ATM"];
