use rand::Rng;

use crate::threadrand::SecureRng;

pub const CODE_LENGTH: usize = 6;

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

pub struct Otp {}

impl Otp {
    /// Generates a uniformly random 6-digit decimal code. The low end of the
    /// range is 100000, so the code never needs zero-padding.
    pub fn generate() -> String {
        let mut rng = SecureRng;
        rng.gen_range(CODE_MIN..=CODE_MAX).to_string()
    }

    pub fn are_equal(given: &str, saved: &str) -> bool {
        let given = given.as_bytes();
        let saved = saved.as_bytes();

        if given.len() != saved.len() {
            return false;
        }

        let mut codes_dont_match = 0u8;

        // Do bitwise comparison to prevent timing attacks
        for (i, saved_byte) in saved.iter().enumerate() {
            unsafe {
                codes_dont_match |= saved_byte ^ given.get_unchecked(i);
            }
        }

        codes_dont_match == 0
    }
}
