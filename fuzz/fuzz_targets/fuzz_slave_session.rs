#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use voltage_modbus_engine::{
    ModbusDevice, ModbusFunction, ModbusResult, Protocol, SessionConfig, SlaveEvent,
    SlaveSession, TableConfig,
};

#[derive(Debug, Arbitrary)]
struct Input {
    protocol: u8,
    chunks: Vec<Vec<u8>>,
}

struct Sink;

impl ModbusDevice for Sink {
    fn write(&mut self, _data: &[u8]) -> ModbusResult<()> {
        Ok(())
    }

    fn close(&mut self) -> ModbusResult<()> {
        Ok(())
    }
}

fuzz_target!(|input: Input| {
    let protocol = match input.protocol % 3 {
        0 => Protocol::Rtu,
        1 => Protocol::Ascii,
        _ => Protocol::Tcp,
    };
    let Ok(mut session) = SlaveSession::new(SessionConfig::slave(protocol), Sink) else {
        return;
    };
    for (function, start) in [
        (ModbusFunction::ReadCoils, 0),
        (ModbusFunction::ReadHoldingRegisters, 0),
        (ModbusFunction::ReadInputRegisters, 0xFF00),
    ] {
        let _ = session.add_table(&TableConfig::new(1, function, start, 0x100));
    }

    for chunk in input.chunks {
        let _ = session.handle_event(SlaveEvent::BytesReceived(Bytes::from(chunk)));
    }
});
