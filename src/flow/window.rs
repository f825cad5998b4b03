use log::{debug, info};
use crate::{Error, Result};
use crate::flow::{AckMode, AckModeDetector};
use crate::protocol::DEFAULT_WINDOW_SIZE;

/// Acknowledgement window accounting for one connection.
///
/// Inbound bytes are counted so that an Acknowledgement can be sent each
/// time another window's worth has arrived. Outbound bytes are compared to
/// what the peer has acknowledged to decide when sending must pause.
#[derive(Debug, Clone)]
pub struct WindowControl {
    window_size: u32,
    total_in: u64,
    total_out: u64,
    /// Whole windows received so far
    in_sequence: u64,
    /// Whole windows sent so far
    out_sequence: u64,
    acks: AckModeDetector,
}

impl WindowControl {
    pub fn new(window_size: u32) -> Self {
        WindowControl {
            window_size: window_size.max(1),
            total_in: 0,
            total_out: 0,
            in_sequence: 0,
            out_sequence: 0,
            acks: AckModeDetector::new(),
        }
    }

    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    /// Change the window. Window multiples already crossed stay crossed.
    pub fn set_window_size(&mut self, size: u32) -> Result<()> {
        if size == 0 {
            return Err(Error::config("Window acknowledgement size must be positive"));
        }
        if size != self.window_size {
            info!("Window acknowledgement size {} -> {}", self.window_size, size);
        }
        self.window_size = size;
        self.in_sequence = self.total_in / size as u64;
        self.out_sequence = self.total_out / size as u64;
        Ok(())
    }

    /// Count received bytes. Returns the value to acknowledge when a new
    /// window multiple has been crossed.
    pub fn add_in_bytes(&mut self, count: usize) -> Option<u32> {
        self.total_in += count as u64;

        let sequence = self.total_in / self.window_size as u64;
        if sequence > self.in_sequence {
            self.in_sequence = sequence;
            // Sequence numbers on the wire wrap at 2^32
            Some(self.total_in as u32)
        } else {
            None
        }
    }

    pub fn add_out_bytes(&mut self, count: usize) {
        self.total_out += count as u64;
        self.out_sequence = self.total_out / self.window_size as u64;
    }

    /// Record an Acknowledgement from the peer
    pub fn update_received_acknowledgement(&mut self, value: u32) {
        let total = self.acks.update(value);
        debug!("Peer acknowledged {} of {} bytes sent", total, self.total_out);
    }

    pub fn received_acknowledgement(&self) -> u64 {
        self.acks.total()
    }

    pub fn ack_mode(&self) -> AckMode {
        self.acks.mode()
    }

    pub fn total_in_bytes(&self) -> u64 {
        self.total_in
    }

    pub fn total_out_bytes(&self) -> u64 {
        self.total_out
    }

    /// Whole windows sent so far
    pub fn out_windows(&self) -> u64 {
        self.out_sequence
    }

    /// Sent bytes the peer has not acknowledged
    pub fn outstanding(&self) -> u64 {
        self.total_out.saturating_sub(self.acks.total())
    }

    /// True when a full window is unacknowledged and sending must pause
    pub fn should_wait_acknowledgement(&self) -> bool {
        self.outstanding() >= self.window_size as u64
    }
}

impl Default for WindowControl {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}
