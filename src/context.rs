use crate::utils::{generate_hex_id, time_us};


const QUERY_ID_LENGTH: u32 = 8;

/// Per-execution bookkeeping used to correlate log lines.
pub struct Context {
    pub qid: String,
    pub start_time_us: u128,
    pub finish_time_us: u128,
}

impl Context {
    pub fn new() -> Context {
        Context {
            qid: generate_hex_id(QUERY_ID_LENGTH),
            start_time_us: time_us(),
            finish_time_us: 0,
        }
    }

    pub fn fix(&mut self) {
        self.finish_time_us = time_us();
    }

    pub fn time_ms(&self) -> f32 {
        (self.finish_time_us.saturating_sub(self.start_time_us) as f32) / 1000.0
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
