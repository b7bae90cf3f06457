//! # Variant Codecs
//!
//! Turns [`Frame`]s into wire [`Packet`]s and back for the three Modbus
//! encapsulations. The codec is picked once per session from its
//! [`Protocol`]; UDP shares the TCP framing.
//!
//! | Operation | Direction |
//! |-----------|-----------|
//! | [`master_frame_to_packet`](ModbusCodec::master_frame_to_packet) | request, master side |
//! | [`master_packet_to_frame`](ModbusCodec::master_packet_to_frame) | response, master side |
//! | [`slave_frame_to_packet`](ModbusCodec::slave_frame_to_packet) | response, slave side |
//! | [`slave_packet_to_frame`](ModbusCodec::slave_packet_to_frame) | request, slave side |
//!
//! ## Example
//!
//! ```rust
//! use voltage_modbus_engine::{Frame, ModbusCodec, Protocol};
//!
//! let codec = ModbusCodec::for_protocol(Protocol::Rtu);
//! let request = Frame::write_single_register(1, 10, 5);
//! let packet = codec.master_frame_to_packet(&request).unwrap();
//! assert!(codec.is_valid_packet(packet.as_slice()));
//!
//! let decoded = codec.slave_packet_to_frame(packet.as_slice()).unwrap();
//! assert_eq!(decoded.values.word(0).unwrap(), 5);
//! ```

mod ascii;
mod body;
mod rtu;
mod tcp;

use std::fmt;

use tracing::debug;

use crate::error::ModbusResult;
use crate::frame::Frame;
use crate::packet::Packet;
use crate::protocol::Protocol;

/// Closed set of wire encapsulations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModbusCodec {
    Rtu,
    Ascii,
    /// MBAP framing, used for both TCP and UDP
    Tcp,
}

impl ModbusCodec {
    pub fn for_protocol(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Rtu => Self::Rtu,
            Protocol::Ascii => Self::Ascii,
            Protocol::Tcp | Protocol::Udp => Self::Tcp,
        }
    }

    /// Whether packets carry a transaction id.
    #[inline]
    pub fn uses_transaction_id(&self) -> bool {
        matches!(self, Self::Tcp)
    }

    /// Encode a request.
    pub fn master_frame_to_packet(&self, frame: &Frame) -> ModbusResult<Packet> {
        let mut body = Packet::new();
        body::encode_request(frame, &mut body)?;
        self.wrap(&body, frame.transaction_id)
    }

    /// Decode a response.
    pub fn master_packet_to_frame(&self, packet: &[u8]) -> ModbusResult<Frame> {
        self.decode(packet, body::decode_response)
    }

    /// Encode a response.
    pub fn slave_frame_to_packet(&self, frame: &Frame) -> ModbusResult<Packet> {
        let mut body = Packet::new();
        body::encode_response(frame, &mut body)?;
        self.wrap(&body, frame.transaction_id)
    }

    /// Decode a request.
    pub fn slave_packet_to_frame(&self, packet: &[u8]) -> ModbusResult<Frame> {
        self.decode(packet, body::decode_request)
    }

    /// Framing and checksum check, without decoding the body.
    pub fn is_valid_packet(&self, packet: &[u8]) -> bool {
        match self {
            Self::Rtu => rtu::is_valid(packet),
            Self::Ascii => ascii::is_valid(packet),
            Self::Tcp => tcp::is_valid(packet),
        }
    }

    fn wrap(&self, body: &Packet, transaction_id: u16) -> ModbusResult<Packet> {
        match self {
            Self::Rtu => rtu::wrap(body),
            Self::Ascii => ascii::wrap(body),
            Self::Tcp => tcp::wrap(body, transaction_id),
        }
    }

    fn decode(
        &self,
        packet: &[u8],
        decode_body: fn(&[u8]) -> ModbusResult<Frame>,
    ) -> ModbusResult<Frame> {
        let result = match self {
            Self::Rtu => rtu::unwrap(packet).and_then(decode_body),
            Self::Ascii => {
                ascii::unwrap(packet).and_then(|body| decode_body(body.as_slice()))
            }
            Self::Tcp => tcp::unwrap(packet).and_then(|(transaction_id, body)| {
                decode_body(body).map(|frame| frame.with_transaction_id(transaction_id))
            }),
        };
        if let Err(e) = &result {
            debug!("{} decode failed: {}", self, e);
        }
        result
    }
}

impl fmt::Display for ModbusCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rtu => "RTU",
            Self::Ascii => "ASCII",
            Self::Tcp => "TCP",
        };
        f.write_str(name)
    }
}
