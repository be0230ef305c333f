use chrono::{DateTime, Local};

/// Wall-clock timestamps that never go backwards within one collector.
///
/// A reading earlier than the previous one is clamped to the previous one,
/// so after a backwards clock adjustment consecutive samples share a
/// timestamp until the wall clock catches up.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Option<DateTime<Local>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&mut self) -> DateTime<Local> {
        self.stamp(Local::now())
    }

    /// Clamp `ts` against the last timestamp handed out.
    pub fn stamp(&mut self, ts: DateTime<Local>) -> DateTime<Local> {
        let ts = match self.last {
            Some(last) if ts < last => {
                tracing::debug!(%ts, %last, "Wall clock went backwards, clamping timestamp");
                last
            }
            _ => ts,
        };
        self.last = Some(ts);
        ts
    }
}
