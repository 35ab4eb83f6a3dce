//! Placeholder contact generation.
//!
//! Used by the facade when a batch is requested but the remote cannot
//! generate one, and by the reference server's batch endpoint.

use crate::Fields;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Claude", "Donald", "Edsger", "Frances", "Grace", "John", "Ken",
    "Leslie", "Margaret", "Niklaus", "Radia", "Tony",
];

const LAST_NAMES: &[&str] = &[
    "Allen", "Dijkstra", "Hamilton", "Hopper", "Hoare", "Knuth", "Lamport", "Liskov", "Lovelace",
    "McCarthy", "Perlman", "Ritchie", "Shannon", "Thompson", "Wirth",
];

const STREETS: &[&str] = &[
    "Main St", "Oak Ave", "Maple Dr", "Cedar Ln", "Elm St", "Pine Rd", "Lakeview Blvd",
];

const CITIES: &[&str] = &[
    "Springfield", "Riverton", "Fairview", "Georgetown", "Franklin", "Clinton", "Salem",
];

/// One contact-shaped record payload. `index` keeps emails distinct within a
/// batch.
pub fn placeholder_contact<R: Rng + ?Sized>(rng: &mut R, index: usize) -> Fields {
    let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Random");
    let last = LAST_NAMES.choose(rng).copied().unwrap_or("Contact");
    let street = STREETS.choose(rng).copied().unwrap_or("Random St");
    let city = CITIES.choose(rng).copied().unwrap_or("Anytown");

    let value = json!({
        "name": format!("{first} {last}"),
        "email": format!(
            "{}.{}{}@example.com",
            first.to_lowercase(),
            last.to_lowercase(),
            index + 1
        ),
        "phone": format!("555-{:04}", rng.gen_range(0..10_000)),
        "cell": format!("555-{:04}", rng.gen_range(0..10_000)),
        "full_address": format!("{} {street}, {city}", rng.gen_range(1..1000)),
        "age": rng.gen_range(20..70),
    });

    match value {
        serde_json::Value::Object(fields) => fields,
        _ => Fields::new(),
    }
}

/// `count` placeholder contacts from the thread-local generator.
pub fn placeholder_batch(count: usize) -> Vec<Fields> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|index| placeholder_contact(&mut rng, index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn contact_has_expected_fields() {
        let mut rng = StdRng::seed_from_u64(7);
        let contact = placeholder_contact(&mut rng, 0);

        for key in ["name", "email", "phone", "cell", "full_address", "age"] {
            assert!(contact.contains_key(key), "missing {key}");
        }
        assert!(!contact.contains_key("id"));

        let age = contact["age"].as_i64().unwrap();
        assert!((20..70).contains(&age));
        assert!(contact["phone"].as_str().unwrap().starts_with("555-"));
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let a = placeholder_contact(&mut StdRng::seed_from_u64(1), 3);
        let b = placeholder_contact(&mut StdRng::seed_from_u64(1), 3);
        assert_eq!(a, b);
    }

    #[test]
    fn batch_emails_are_distinct() {
        let batch = placeholder_batch(5);
        assert_eq!(batch.len(), 5);

        let mut emails: Vec<_> = batch
            .iter()
            .map(|c| c["email"].as_str().unwrap().to_string())
            .collect();
        emails.sort();
        emails.dedup();
        assert_eq!(emails.len(), 5);
    }

    #[test]
    fn empty_batch() {
        assert!(placeholder_batch(0).is_empty());
    }
}
