use std::time::Duration;

/// Default receive size: one page-aligned netlink datagram batch.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Largest batch buffer the kernel logger accepts (`NFULNL_NLBUFSIZ_MAX`).
pub const MAX_BATCH_SIZE: usize = 131_072;

/// Controls socket setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketConfig {
    /// Kernel receive buffer to request at open, in bytes. `None` keeps the
    /// system default.
    pub receive_buffer_size: Option<usize>,
    /// Largest datagram accepted by a single receive.
    pub max_message_size: usize,
    /// Receive timeout. `None` blocks until traffic arrives.
    pub read_timeout: Option<Duration>,
}

impl SocketConfig {
    /// Grow the receive size so one receive holds a datagram of `len`
    /// bytes. Never shrinks. Returns the resulting size.
    pub fn fit_message_size(&mut self, len: usize) -> usize {
        self.max_message_size = self.max_message_size.max(len);
        self.max_message_size
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            receive_buffer_size: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            read_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_holds_one_page_aligned_batch() {
        let config = SocketConfig::default();
        assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
        assert!(config.read_timeout.is_none());
    }

    #[test]
    fn message_size_grows_to_fit_the_largest_kernel_batch() {
        let mut config = SocketConfig::default();
        assert_eq!(config.fit_message_size(120_192), 120_192);
        assert_eq!(config.fit_message_size(MAX_BATCH_SIZE), MAX_BATCH_SIZE);
        assert_eq!(config.max_message_size, MAX_BATCH_SIZE);
    }

    #[test]
    fn message_size_never_shrinks() {
        let mut config = SocketConfig::default();
        assert_eq!(config.fit_message_size(512), DEFAULT_MAX_MESSAGE_SIZE);
        assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
    }
}
