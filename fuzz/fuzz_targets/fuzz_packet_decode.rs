#![no_main]

use libfuzzer_sys::fuzz_target;
use voltage_modbus_engine::ModbusCodec;

fuzz_target!(|data: &[u8]| {
    for codec in [ModbusCodec::Rtu, ModbusCodec::Ascii, ModbusCodec::Tcp] {
        let valid = codec.is_valid_packet(data);
        let request = codec.slave_packet_to_frame(data);
        let response = codec.master_packet_to_frame(data);

        // decoding never succeeds on a packet that fails validation
        if !valid {
            assert!(request.is_err());
            assert!(response.is_err());
        }

        // whatever decodes re-encodes without panicking
        if let Ok(frame) = response {
            let _ = codec.slave_frame_to_packet(&frame);
        }
        if let Ok(frame) = request {
            let _ = codec.master_frame_to_packet(&frame);
        }
    }
});
