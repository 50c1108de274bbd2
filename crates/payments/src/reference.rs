//! Order tracking references.

use std::sync::{Mutex, PoisonError};

use chrono::{NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generates `ORD-{yyyyMMdd}-{AAA}{000}` references.
///
/// The random source is owned by the generator so tests can seed it.
/// References only need to be unlikely to collide within a day; they carry
/// no security meaning.
#[derive(Debug)]
pub struct ReferenceGenerator {
    rng: Mutex<StdRng>,
}

impl ReferenceGenerator {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// A reference dated today (UTC).
    pub fn next_reference(&self) -> String {
        self.next_reference_on(Utc::now().date_naive())
    }

    pub fn next_reference_on(&self, date: NaiveDate) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let letters: String = (0..3)
            .map(|_| char::from(rng.gen_range(b'A'..=b'Z')))
            .collect();
        let digits: u16 = rng.gen_range(0..1000);
        format!("ORD-{}-{letters}{digits:03}", date.format("%Y%m%d"))
    }
}

impl Default for ReferenceGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

/// Returns true if `reference` has the `ORD-yyyyMMdd-AAA000` shape.
pub fn is_well_formed(reference: &str) -> bool {
    let Some(rest) = reference.strip_prefix("ORD-") else {
        return false;
    };
    let Some((date, code)) = rest.split_once('-') else {
        return false;
    };
    let code = code.as_bytes();
    NaiveDate::parse_from_str(date, "%Y%m%d").is_ok()
        && date.len() == 8
        && code.len() == 6
        && code[..3].iter().all(u8::is_ascii_uppercase)
        && code[3..].iter().all(u8::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_has_expected_shape() {
        let generator = ReferenceGenerator::seeded(7);
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let reference = generator.next_reference_on(date);
        assert!(reference.starts_with("ORD-20250309-"), "{reference}");
        assert!(is_well_formed(&reference), "{reference}");
    }

    #[test]
    fn same_seed_same_sequence() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let a = ReferenceGenerator::seeded(42);
        let b = ReferenceGenerator::seeded(42);
        for _ in 0..5 {
            assert_eq!(a.next_reference_on(date), b.next_reference_on(date));
        }
    }

    #[test]
    fn consecutive_references_differ() {
        let generator = ReferenceGenerator::seeded(1);
        let first = generator.next_reference();
        let second = generator.next_reference();
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_references_are_rejected() {
        assert!(!is_well_formed("ORD-2025-ABC123"));
        assert!(!is_well_formed("ORD-20250101-AB1234"));
        assert!(!is_well_formed("REF-20250101-ABC123"));
    }
}
