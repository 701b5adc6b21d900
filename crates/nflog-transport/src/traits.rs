use bytes::Bytes;

use crate::error::Result;

/// A connected kernel control channel.
///
/// Implementations own sequence numbering, timeouts and socket buffer
/// sizing. Callers hand over complete netlink messages and get complete
/// receive buffers back.
pub trait Transport {
    /// Send one command message and block until the kernel acknowledges it.
    ///
    /// The transport may rewrite the header's sequence number in place.
    /// A negative acknowledgement is returned as
    /// [`TransportError::Rejected`](crate::TransportError::Rejected).
    fn send_and_wait_ack(&mut self, request: &mut [u8]) -> Result<()>;

    /// Receive one buffer, which may hold several netlink messages.
    ///
    /// Returns [`TransportError::Closed`](crate::TransportError::Closed) at
    /// end of stream.
    fn receive(&mut self) -> Result<Bytes>;

    /// Ask for a receive buffer of at least `bytes`. Returns the size the
    /// kernel actually granted.
    fn set_receive_buffer_size(&mut self, bytes: usize) -> Result<usize>;

    /// Make sure one [`receive`](Transport::receive) can hold a kernel
    /// batch of `bytes`. Transports without a fixed receive size ignore it.
    fn reserve_message_size(&mut self, bytes: usize) {
        let _ = bytes;
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send_and_wait_ack(&mut self, request: &mut [u8]) -> Result<()> {
        (**self).send_and_wait_ack(request)
    }

    fn receive(&mut self) -> Result<Bytes> {
        (**self).receive()
    }

    fn set_receive_buffer_size(&mut self, bytes: usize) -> Result<usize> {
        (**self).set_receive_buffer_size(bytes)
    }

    fn reserve_message_size(&mut self, bytes: usize) {
        (**self).reserve_message_size(bytes)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_and_wait_ack(&mut self, request: &mut [u8]) -> Result<()> {
        (**self).send_and_wait_ack(request)
    }

    fn receive(&mut self) -> Result<Bytes> {
        (**self).receive()
    }

    fn set_receive_buffer_size(&mut self, bytes: usize) -> Result<usize> {
        (**self).set_receive_buffer_size(bytes)
    }

    fn reserve_message_size(&mut self, bytes: usize) {
        (**self).reserve_message_size(bytes)
    }
}
