use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use voltage_modbus_engine::checksum::crc16;
use voltage_modbus_engine::{Frame, ModbusCodec, ModbusFunction, ValueBuffer};

const CODECS: [ModbusCodec; 3] = [ModbusCodec::Rtu, ModbusCodec::Ascii, ModbusCodec::Tcp];

fn bench_encode_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_request");
    let registers: Vec<u16> = (0..123).collect();
    let frame = Frame::write_multiple_registers(1, 0, &registers).unwrap();

    for codec in CODECS {
        group.bench_with_input(BenchmarkId::from_parameter(codec), &frame, |b, frame| {
            b.iter(|| codec.master_frame_to_packet(black_box(frame)).unwrap())
        });
    }
    group.finish();
}

fn bench_decode_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_response");
    let registers: Vec<u16> = (0..123).collect();
    let mut frame = Frame::new(1, 0x03, 0, 123);
    frame.values = ValueBuffer::from_words(&registers).unwrap();

    for codec in CODECS {
        let packet = codec.slave_frame_to_packet(&frame).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(codec),
            packet.as_slice(),
            |b, bytes| {
                b.iter(|| {
                    assert!(codec.is_valid_packet(black_box(bytes)));
                    codec.master_packet_to_frame(black_box(bytes)).unwrap()
                })
            },
        );
    }
    group.finish();
}

fn bench_crc(c: &mut Criterion) {
    let request = Frame::read_request(1, ModbusFunction::ReadHoldingRegisters, 0, 10).unwrap();
    let packet = ModbusCodec::Rtu.master_frame_to_packet(&request).unwrap();
    c.bench_function("crc16_read_request", |b| {
        b.iter(|| crc16(black_box(packet.as_slice())))
    });
}

criterion_group!(benches, bench_encode_request, bench_decode_response, bench_crc);
criterion_main!(benches);
