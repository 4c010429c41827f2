//! Time-prefixed short id generation
//!
//! Ids sort roughly by creation time: the first characters encode seconds
//! since 2021-01-01 in base 62, the rest is random padding.

use rand::Rng;

const CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Seconds between the Unix epoch and 2021-01-01T00:00:00Z.
const OFFSET: i64 = 1_609_459_200;

/// Default id length. Recommendation: minimum length 9.
const DEFAULT_LENGTH: usize = 12;

/// Generate a time-prefixed id of the default length using the current time.
pub fn tuid() -> String {
    tuid_at(chrono::Utc::now().timestamp(), DEFAULT_LENGTH)
}

/// Generate a time-prefixed id for a given Unix timestamp.
pub fn tuid_at(unix_secs: i64, length: usize) -> String {
    let mut time_part = encode_base62((unix_secs - OFFSET).max(0));

    while time_part.len() < 4 {
        time_part.insert(0, '0');
    }

    if time_part.len() > length {
        time_part = time_part[time_part.len() - length..].to_string();
    }

    let mut rng = rand::thread_rng();
    let rand_len = length.saturating_sub(time_part.len());
    let rand_part: String = (0..rand_len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();

    time_part + &rand_part
}

fn encode_base62(mut value: i64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let base = CHARSET.len() as i64;
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(CHARSET[(value % base) as usize] as char);
        value /= base;
    }
    digits.iter().rev().collect()
}
