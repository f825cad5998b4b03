use std::fmt;
use log::{debug, info, warn};

const HALF_SEQUENCE_SPACE: u32 = 1 << 31;

/// How the peer counts in its Acknowledgement messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    /// Fewer than two acknowledgements seen
    Detecting,
    /// Each acknowledgement carries a fixed increment
    Incremental,
    /// Each acknowledgement carries the running byte count
    Cumulative,
}

impl fmt::Display for AckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckMode::Detecting => write!(f, "detecting"),
            AckMode::Incremental => write!(f, "incremental"),
            AckMode::Cumulative => write!(f, "cumulative"),
        }
    }
}

/// Works out the peer's acknowledgement semantics from the first two
/// values and turns every value into a running acknowledged total.
#[derive(Debug, Clone)]
pub struct AckModeDetector {
    mode: AckMode,
    first: Option<u32>,
    last: Option<u32>,
    total: u64,
}

impl AckModeDetector {
    pub fn new() -> Self {
        AckModeDetector {
            mode: AckMode::Detecting,
            first: None,
            last: None,
            total: 0,
        }
    }

    pub fn mode(&self) -> AckMode {
        self.mode
    }

    /// Bytes the peer has acknowledged so far
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Feed one received acknowledgement, returning the new total
    pub fn update(&mut self, value: u32) -> u64 {
        match (self.mode, self.first) {
            (_, None) => {
                self.first = Some(value);
                self.total = value as u64;
            }
            (AckMode::Detecting, Some(first)) => {
                if value == first {
                    self.mode = AckMode::Incremental;
                    self.total += value as u64;
                } else {
                    self.mode = AckMode::Cumulative;
                    if !self.advance_cumulative(value) {
                        warn!(
                            "Second acknowledgement {} below first {}, assuming cumulative",
                            value, first
                        );
                    }
                }
                info!("Peer acknowledgement mode: {}", self.mode);
            }
            (AckMode::Incremental, Some(_)) => {
                if self.last != Some(value) {
                    warn!(
                        "Acknowledgement increment changed from {:?} to {}",
                        self.last, value
                    );
                }
                self.total += value as u64;
            }
            (AckMode::Cumulative, Some(_)) => {
                if !self.advance_cumulative(value) {
                    debug!(
                        "Ignoring stale acknowledgement {} at acknowledged total {}",
                        value, self.total
                    );
                }
            }
        }

        self.last = Some(value);
        self.total
    }

    /// Move the total forward to a cumulative value. The peer's counter is
    /// 32 bits and wraps, so a value counts as progress when it is less
    /// than half the sequence space ahead of the total.
    fn advance_cumulative(&mut self, value: u32) -> bool {
        let step = value.wrapping_sub(self.total as u32);
        if step >= HALF_SEQUENCE_SPACE {
            return false;
        }
        self.total += step as u64;
        true
    }
}

impl Default for AckModeDetector {
    fn default() -> Self {
        Self::new()
    }
}
