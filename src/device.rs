//! Byte-stream device abstraction
//!
//! Sessions write packets through a [`ModbusDevice`]; received bytes come
//! back as session events. Serial ports, sockets and test doubles all sit
//! behind this trait.

use crate::error::ModbusResult;

/// Outbound side of a transport.
pub trait ModbusDevice {
    /// Send one encoded packet.
    fn write(&mut self, data: &[u8]) -> ModbusResult<()>;

    /// Drop bytes the transport buffered but the session has not seen yet.
    fn clear_receive_buffer(&mut self) {}

    /// Release the transport. Later writes fail.
    fn close(&mut self) -> ModbusResult<()>;
}

impl<D: ModbusDevice + ?Sized> ModbusDevice for Box<D> {
    fn write(&mut self, data: &[u8]) -> ModbusResult<()> {
        (**self).write(data)
    }

    fn clear_receive_buffer(&mut self) {
        (**self).clear_receive_buffer()
    }

    fn close(&mut self) -> ModbusResult<()> {
        (**self).close()
    }
}

#[cfg(feature = "driver")]
pub use channel::ChannelDevice;

#[cfg(feature = "driver")]
mod channel {
    use bytes::Bytes;
    use tokio::sync::mpsc;
    use tracing::debug;

    use super::ModbusDevice;
    use crate::error::{ModbusError, ModbusResult};

    /// Device that forwards every written packet into a tokio channel.
    ///
    /// Pair two of them back to back to connect a master and a slave in
    /// one process, or bridge the receiver to a real socket task.
    #[derive(Debug)]
    pub struct ChannelDevice {
        tx: Option<mpsc::UnboundedSender<Bytes>>,
    }

    impl ChannelDevice {
        pub fn new(tx: mpsc::UnboundedSender<Bytes>) -> Self {
            Self { tx: Some(tx) }
        }

        /// Device plus the receiver its writes arrive on.
        pub fn pair() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (Self::new(tx), rx)
        }

        pub fn is_closed(&self) -> bool {
            self.tx.as_ref().map_or(true, |tx| tx.is_closed())
        }
    }

    impl ModbusDevice for ChannelDevice {
        fn write(&mut self, data: &[u8]) -> ModbusResult<()> {
            let tx = self
                .tx
                .as_ref()
                .ok_or_else(|| ModbusError::transport("device closed"))?;
            tx.send(Bytes::copy_from_slice(data))
                .map_err(|_| ModbusError::transport("peer channel dropped"))
        }

        fn clear_receive_buffer(&mut self) {
            debug!("channel device has no receive buffer to clear");
        }

        fn close(&mut self) -> ModbusResult<()> {
            self.tx = None;
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_write_forwards_bytes() {
            let (mut device, mut rx) = ChannelDevice::pair();
            device.write(&[0x01, 0x03]).unwrap();
            assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(&[0x01, 0x03]));
        }

        #[test]
        fn test_write_after_close_fails() {
            let (mut device, _rx) = ChannelDevice::pair();
            device.close().unwrap();
            assert!(device.is_closed());
            assert!(matches!(
                device.write(&[0x00]),
                Err(ModbusError::Transport { .. })
            ));
        }

        #[test]
        fn test_dropped_receiver_is_transport_error() {
            let (mut device, rx) = ChannelDevice::pair();
            drop(rx);
            assert!(device.write(&[0x00]).is_err());
        }
    }
}
