//! Activation code generation
//!
//! Codes are a raw number drawn from a bounded range followed by a Luhn
//! (mod 10) check digit, so `4821` becomes `48215`. Raw values are drawn from
//! a shuffled pool: a value is not handed out again until every other value
//! in the range has been used once.

use rand::seq::SliceRandom;
use std::ops::RangeInclusive;
use std::sync::Mutex;

/// Default raw range, giving 5 digit codes once the check digit is added
pub const DEFAULT_CODE_RANGE: RangeInclusive<u32> = 1000..=9999;

#[derive(Debug, Default)]
struct Pool {
    remaining: Vec<u32>,
    last: Option<u32>,
}

/// Draws non-repeating raw values and turns them into check-digit codes
#[derive(Debug)]
pub struct CodeGenerator {
    range: RangeInclusive<u32>,
    pool: Mutex<Pool>,
}

impl CodeGenerator {
    /// Create a generator over an inclusive raw range
    ///
    /// The whole range is materialized once per cycle, so keep it small.
    pub fn new(range: RangeInclusive<u32>) -> Self {
        Self {
            range,
            pool: Mutex::new(Pool::default()),
        }
    }

    /// Draw the next raw value
    pub fn next_raw(&self) -> u32 {
        let mut pool = self.pool.lock().unwrap_or_else(|e| e.into_inner());

        if pool.remaining.is_empty() {
            let mut fresh: Vec<u32> = self.range.clone().collect();
            fresh.shuffle(&mut rand::thread_rng());
            // Values are popped from the back; avoid repeating across cycles
            if fresh.len() > 1 && fresh.last().copied() == pool.last {
                let end = fresh.len() - 1;
                fresh.swap(0, end);
            }
            pool.remaining = fresh;
        }

        let raw = pool.remaining.pop().unwrap_or(*self.range.start());
        pool.last = Some(raw);
        raw
    }

    /// Draw the next code, check digit included
    pub fn next_code(&self) -> String {
        luhn::apply(&self.next_raw().to_string())
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_RANGE)
    }
}

/// Luhn mod 10 checksum over decimal strings
pub mod luhn {
    /// Compute the check digit to append to `digits`
    ///
    /// Returns `None` if `digits` is empty or contains a non-digit.
    pub fn check_digit(digits: &str) -> Option<u32> {
        if digits.is_empty() {
            return None;
        }
        let sum = weighted_sum(digits, true)?;
        Some((10 - sum % 10) % 10)
    }

    /// Append the check digit to `digits`
    pub fn apply(digits: &str) -> String {
        match check_digit(digits) {
            Some(check) => format!("{}{}", digits, check),
            None => digits.to_string(),
        }
    }

    /// Whether `code` ends with a correct check digit
    pub fn is_valid(code: &str) -> bool {
        code.len() >= 2 && weighted_sum(code, false).is_some_and(|sum| sum % 10 == 0)
    }

    // Sum from the right, doubling every second digit. `double_first` is set
    // when the check digit has not been appended yet.
    fn weighted_sum(digits: &str, double_first: bool) -> Option<u32> {
        let mut sum = 0;
        for (i, c) in digits.chars().rev().enumerate() {
            let mut d = c.to_digit(10)?;
            if (i % 2 == 0) == double_first {
                d *= 2;
                if d > 9 {
                    d -= 9;
                }
            }
            sum += d;
        }
        Some(sum)
    }
}
