use rand::Rng;

/// Base62 alphabet the share-code generator draws from.
pub const SHARE_CODE_ALPHABET: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

pub const SHARE_CODE_LENGTH: usize = 8;

/// On insertion-conflict the caller re-rolls up to this many times
/// (spec.md §4.1 "Share code allocation").
pub const SHARE_CODE_RETRY_BUDGET: u32 = 5;

pub fn generate_share_code() -> String {
    let mut rng = rand::thread_rng();
    (0..SHARE_CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..SHARE_CODE_ALPHABET.len());
            SHARE_CODE_ALPHABET[idx] as char
        })
        .collect()
}

pub fn is_valid_share_code(code: &str) -> bool {
    code.len() == SHARE_CODE_LENGTH
        && code.bytes().all(|b| SHARE_CODE_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_conform_to_alphabet_and_length() {
        for _ in 0..200 {
            let code = generate_share_code();
            assert_eq!(code.len(), SHARE_CODE_LENGTH);
            assert!(is_valid_share_code(&code));
        }
    }

    #[test]
    fn rejects_wrong_length_or_alphabet() {
        assert!(!is_valid_share_code("short"));
        assert!(!is_valid_share_code("!!!!!!!!"));
        assert!(!is_valid_share_code(&"a".repeat(SHARE_CODE_LENGTH + 1)));
    }
}
