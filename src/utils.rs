use rand::Rng;
use std::time::{Duration, SystemTime, UNIX_EPOCH};


const QUERY_ID_CHARSET: &[u8] = b"0123456789abcdef";

pub fn generate_hex_id(length: u32) -> String {
    let mut rng = rand::thread_rng();

    (0..length).map(
        |_| {
            let idx = rng.gen_range(0..QUERY_ID_CHARSET.len());
            QUERY_ID_CHARSET[idx] as char
        }
    ).collect()
}


fn current_duration() -> Duration {
    // A clock before the epoch reads as zero rather than failing a request.
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default()
}

pub fn time_us() -> u128 {
    current_duration().as_micros()
}

pub fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}
