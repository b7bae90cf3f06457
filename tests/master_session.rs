//! Master session scheduling, timeout and correlation behaviour.

mod common;

use bytes::Bytes;
use common::{master, Loopback};
use voltage_modbus_engine::{
    ByteOrder, ErrorCode, Frame, MasterEvent, ModbusCodec, ModbusFunction, ModbusValue,
    Protocol, TableConfig, ValueBuffer, WriteCompletion,
};

#[test]
fn test_scan_rates_follow_intervals() {
    let mut link = Loopback::new(Protocol::Rtu);
    link.slave
        .add_table(&TableConfig::new(1, ModbusFunction::ReadHoldingRegisters, 0, 20))
        .unwrap();
    let fast = link
        .master
        .add_table(
            &TableConfig::new(1, ModbusFunction::ReadHoldingRegisters, 0, 4)
                .with_scan_interval_ms(100),
        )
        .unwrap();
    let slow = link
        .master
        .add_table(
            &TableConfig::new(1, ModbusFunction::ReadHoldingRegisters, 10, 4)
                .with_scan_interval_ms(500),
        )
        .unwrap();

    for now_ms in (0..500).step_by(10) {
        link.tick(now_ms);
    }

    assert_eq!(link.master.table(fast).unwrap().send_count(), 5);
    assert_eq!(link.master.table(slow).unwrap().send_count(), 1);
    assert_eq!(link.max_outstanding, 1);
    assert_eq!(link.master.error_count(ErrorCode::Timeout), 0);
}

#[test]
fn test_polled_values_land_in_table() {
    let mut link = Loopback::new(Protocol::Tcp);
    let served = link
        .slave
        .add_table(&TableConfig::new(7, ModbusFunction::ReadInputRegisters, 100, 11))
        .unwrap();
    link.slave
        .table_mut(served)
        .unwrap()
        .set_values(104, &[0x4248, 0x0000])
        .unwrap();
    let polled = link
        .master
        .add_table(&TableConfig::new(7, ModbusFunction::ReadInputRegisters, 104, 2))
        .unwrap();

    link.tick(0);

    let table = link.master.table(polled).unwrap();
    assert_eq!(table.values(), &[0x4248, 0x0000]);
    assert_eq!(
        table
            .read_value(104, voltage_modbus_engine::DataType::F32, ByteOrder::BigEndian)
            .unwrap(),
        ModbusValue::F32(50.0)
    );
}

#[test]
fn test_coil_poll_and_write_over_ascii() {
    let mut link = Loopback::new(Protocol::Ascii);
    let served = link
        .slave
        .add_table(&TableConfig::new(2, ModbusFunction::ReadCoils, 0, 16))
        .unwrap();
    let polled = link
        .master
        .add_table(&TableConfig::new(2, ModbusFunction::ReadCoils, 0, 10))
        .unwrap();

    let id = link
        .master
        .write_value(polled, 9, ModbusValue::Bool(true), ByteOrder::BigEndian)
        .unwrap();
    link.tick(0);

    assert_eq!(link.slave.table(served).unwrap().coil(9), Some(true));
    assert_eq!(
        link.master.take_completions(),
        vec![WriteCompletion {
            command: id,
            result: ErrorCode::Ok
        }]
    );
    assert_eq!(link.master.table(polled).unwrap().coil(9), Some(true));
}

#[test]
fn test_slave_exception_reaches_master_table() {
    let mut link = Loopback::new(Protocol::Udp);
    link.slave
        .add_table(&TableConfig::new(1, ModbusFunction::ReadHoldingRegisters, 0, 10))
        .unwrap();
    let polled = link
        .master
        .add_table(&TableConfig::new(1, ModbusFunction::ReadHoldingRegisters, 5, 10))
        .unwrap();

    link.tick(0);

    let table = link.master.table(polled).unwrap();
    assert_eq!(table.error_count(), 1);
    assert_eq!(table.status(), Some("Illegal Data Address"));
    assert_eq!(link.master.error_count(ErrorCode::IllegalDataAddress), 1);
    assert_eq!(link.slave.error_count(ErrorCode::IllegalDataAddress), 1);
}

#[test]
fn test_timeout_advances_to_next_command() {
    let (mut session, device) = master(Protocol::Rtu);
    session
        .add_table(&TableConfig::new(1, ModbusFunction::ReadHoldingRegisters, 0, 2))
        .unwrap();
    session
        .add_table(&TableConfig::new(2, ModbusFunction::ReadHoldingRegisters, 0, 2))
        .unwrap();

    let mut now_ms = 0;
    while now_ms < 300 {
        session.handle_event(MasterEvent::Tick { now_ms }).unwrap();
        now_ms += 10;
    }
    assert_eq!(device.outbox.borrow().len(), 1);
    assert_eq!(session.error_count(ErrorCode::Timeout), 0);

    session.handle_event(MasterEvent::Tick { now_ms: 300 }).unwrap();
    assert_eq!(session.error_count(ErrorCode::Timeout), 1);
    assert_eq!(device.outbox.borrow().len(), 2);
    assert_eq!(device.outbox.borrow()[1][0], 2);
    assert_eq!(session.next_deadline_ms(), Some(600));
}

#[test]
fn test_tcp_reply_with_wrong_transaction_is_ignored() {
    let (mut session, device) = master(Protocol::Tcp);
    let handle = session
        .add_table(&TableConfig::new(1, ModbusFunction::ReadHoldingRegisters, 0, 1))
        .unwrap();
    session.handle_event(MasterEvent::Tick { now_ms: 0 }).unwrap();
    let sent = device.outbox.borrow()[0].clone();
    assert_eq!(&sent[..2], &[0x00, 0x00]);

    let mut reply = Frame::new(1, 0x03, 0, 1).with_transaction_id(5);
    reply.values = ValueBuffer::from_words(&[0xBEEF]).unwrap();
    let packet = ModbusCodec::Tcp.slave_frame_to_packet(&reply).unwrap();
    session
        .handle_event(MasterEvent::BytesReceived {
            data: Bytes::copy_from_slice(packet.as_slice()),
            now_ms: 10,
        })
        .unwrap();

    assert!(session.is_busy());
    assert_eq!(session.table(handle).unwrap().values(), &[0]);

    session
        .handle_event(MasterEvent::ReceiveTimeout { now_ms: 300 })
        .unwrap();
    assert_eq!(session.error_count(ErrorCode::Timeout), 1);
}

#[test]
fn test_write_table_is_sent_cyclically() {
    let mut link = Loopback::new(Protocol::Rtu);
    let served = link
        .slave
        .add_table(&TableConfig::new(1, ModbusFunction::ReadHoldingRegisters, 0, 10))
        .unwrap();
    let setpoints = link
        .master
        .add_table(
            &TableConfig::new(1, ModbusFunction::WriteMultipleRegisters, 2, 3)
                .with_scan_interval_ms(100),
        )
        .unwrap();

    link.master
        .table_mut(setpoints)
        .unwrap()
        .set_values(2, &[7, 8, 9])
        .unwrap();
    link.tick(0);
    assert_eq!(&link.slave.table(served).unwrap().values()[2..5], &[7, 8, 9]);

    link.master
        .table_mut(setpoints)
        .unwrap()
        .set_value(3, 80)
        .unwrap();
    link.tick(50);
    assert_eq!(link.slave.table(served).unwrap().value(3), Some(8));
    link.tick(100);
    assert_eq!(link.slave.table(served).unwrap().value(3), Some(80));
    assert!(link.master.table(setpoints).unwrap().status().is_none());
}
