//! Receipt identifiers: `<TYPE>-<YYYYMMDD>-<6 base36 chars>`, e.g. `CASH-20241204-A8X9K2`.
//!
//! Codes are random, so uniqueness is enforced by the store's `UNIQUE`
//! constraint and callers regenerate on a collision.

use chrono::{DateTime, Utc};
use rand::Rng;

const ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptKind {
    /// Receipt handed to a donor for physically received cash.
    Cash,
    /// Payment reference sent to the gateway for an online donation.
    Online,
}

impl ReceiptKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::Online => "DON",
        }
    }
}

pub fn generate<R: Rng + ?Sized>(kind: ReceiptKind, now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}-{}-{}", kind.prefix(), now.format("%Y%m%d"), suffix)
}

/// Check that `code` has the receipt shape, whatever its prefix.
#[cfg(test)]
pub fn is_well_formed(code: &str) -> bool {
    let mut parts = code.split('-');
    let (Some(prefix), Some(date), Some(suffix), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    !prefix.is_empty()
        && date.len() == 8
        && date.bytes().all(|b| b.is_ascii_digit())
        && suffix.len() == SUFFIX_LEN
        && suffix.bytes().all(|b| ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn cash_code_shape() {
        let now = Utc.with_ymd_and_hms(2024, 12, 4, 23, 59, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let code = generate(ReceiptKind::Cash, now, &mut rng);

        assert!(code.starts_with("CASH-20241204-"), "{code}");
        assert_eq!(code.len(), "CASH-20241204-".len() + 6);
        assert!(is_well_formed(&code));
    }

    #[test]
    fn online_prefix() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let code = generate(ReceiptKind::Online, now, &mut StdRng::seed_from_u64(1));
        assert!(code.starts_with("DON-20250102-"));
    }

    #[test]
    fn codes_differ_across_draws() {
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(42);
        let codes: std::collections::HashSet<String> = (0..200)
            .map(|_| generate(ReceiptKind::Cash, now, &mut rng))
            .collect();
        assert_eq!(codes.len(), 200);
    }

    #[test]
    fn rejects_malformed_codes() {
        assert!(!is_well_formed("CASH-2024124-A8X9K2"));
        assert!(!is_well_formed("CASH-20241204-a8x9k2"));
        assert!(!is_well_formed("CASH-20241204-A8X9K"));
        assert!(!is_well_formed("CASH-20241204-A8X9K2-X"));
        assert!(!is_well_formed("-20241204-A8X9K2"));
        assert!(is_well_formed("CASH-20241204-A8X9K2"));
    }
}
