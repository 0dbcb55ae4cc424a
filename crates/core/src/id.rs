use chrono::Utc;
use rand_core::{OsRng, RngCore};

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the random suffix appended to the time prefix.
const SUFFIX_LEN: usize = 5;

/// Generate a fresh file id.
///
/// The id is the base36 Unix time in milliseconds followed by five random
/// base36 characters. Ids only need to be unique within one channel.
pub fn generate_file_id() -> String {
    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    let mut id = to_base36(millis);

    let mut random = [0u8; SUFFIX_LEN];
    OsRng.fill_bytes(&mut random);
    id.extend(
        random
            .iter()
            .map(|b| char::from(BASE36[usize::from(*b) % BASE36.len()])),
    );
    id
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_owned();
    }
    let mut digits = Vec::new();
    while value > 0 {
        // `value % 36` always fits in usize.
        #[allow(clippy::cast_possible_truncation)]
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn base36_encoding() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn ids_are_lowercase_alphanumeric() {
        let id = generate_file_id();
        assert!(id.len() > SUFFIX_LEN);
        assert!(id.bytes().all(|b| BASE36.contains(&b)));
        assert!(!id.contains('_'), "ids must not collide with the chunk marker");
    }

    #[test]
    fn ids_do_not_repeat() {
        let ids: HashSet<String> = (0..100).map(|_| generate_file_id()).collect();
        assert_eq!(ids.len(), 100);
    }
}
