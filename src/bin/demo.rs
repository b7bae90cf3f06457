//! Voltage Modbus Engine Demo
//!
//! Runs a master and a slave in one process, wired back to back through
//! channel devices, and shows:
//! - Byte order handling for 32-bit values
//! - The three packet encapsulations for one request
//! - Cyclic polling, a typed write and an exception reply
//!
//! Usage: cargo run --bin demo [rtu|ascii|tcp|udp]

use std::time::Duration;

use tokio::time::sleep;
use voltage_modbus_engine::{
    run_slave, spawn_master, ByteOrder, ChannelDevice, Frame, MasterSession, ModbusCodec,
    ModbusFunction, ModbusValue, Protocol, SessionConfig, SlaveSession, TableConfig,
};

fn parse_protocol(arg: Option<String>) -> Protocol {
    match arg.as_deref() {
        Some("ascii") => Protocol::Ascii,
        Some("tcp") => Protocol::Tcp,
        Some("udp") => Protocol::Udp,
        _ => Protocol::Rtu,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let protocol = parse_protocol(std::env::args().nth(1));

    println!("🚀 {}", voltage_modbus_engine::info());
    println!("=============================");
    println!("Protocol: {}\n", protocol);

    // =========================================================================
    // Part 1: Byte Order Demo
    // =========================================================================
    println!("🔄 Part 1: Byte Order Handling");
    println!("-------------------------------");

    let value = ModbusValue::F32(50.0);
    for order in ByteOrder::ALL {
        let regs = value.to_registers(order);
        println!("  {:<22} {} -> {:04X?}", order.to_string(), value, regs);
    }

    // =========================================================================
    // Part 2: Packet Encapsulations
    // =========================================================================
    println!("\n📦 Part 2: One Request, Three Encapsulations");
    println!("---------------------------------------------");

    let request = Frame::read_request(1, ModbusFunction::ReadHoldingRegisters, 100, 4)?;
    for codec in [ModbusCodec::Rtu, ModbusCodec::Ascii, ModbusCodec::Tcp] {
        let packet = codec.master_frame_to_packet(&request)?;
        println!("  {:<6} {}", codec.to_string(), packet.to_hex());
    }

    // =========================================================================
    // Part 3: Master and Slave Sessions
    // =========================================================================
    println!("\n🔌 Part 3: Master/Slave Loopback");
    println!("--------------------------------");

    let (master_device, to_slave) = ChannelDevice::pair();
    let (slave_device, to_master) = ChannelDevice::pair();

    let mut slave = SlaveSession::new(SessionConfig::slave(protocol), slave_device)?;
    let served = slave.add_table(&TableConfig::new(
        1,
        ModbusFunction::ReadHoldingRegisters,
        100,
        11,
    ))?;
    if let Some(table) = slave.table_mut(served) {
        table.set_values(100, &[0x4248, 0x0000, 230, 50])?;
    }
    let slave_task = tokio::spawn(run_slave(slave, to_slave));

    let config = SessionConfig::master(protocol);
    let master = MasterSession::new(config, master_device)?;
    let mut task = spawn_master(master, config.tick_ms, to_master);

    let table = task
        .handle
        .add_table(
            TableConfig::new(1, ModbusFunction::ReadHoldingRegisters, 100, 4)
                .with_scan_interval_ms(200),
        )
        .await?;
    sleep(Duration::from_millis(100)).await;
    println!("  Polled {}: {:04X?}", table, task.handle.table_values(table).await?);

    let id = task
        .handle
        .write_value(table, 102, ModbusValue::U16(231), ByteOrder::BigEndian)
        .await?;
    if let Some(done) = task.completions.recv().await {
        println!("  Write {} finished: {}", id, done.result);
    }

    // Address 500 is outside every slave table
    let id = task
        .handle
        .enqueue(Frame::write_single_register(1, 500, 1))
        .await?;
    if let Some(done) = task.completions.recv().await {
        println!("  Write {} finished: {}", id, done.result);
    }

    sleep(Duration::from_millis(300)).await;
    println!("  Polled {}: {:04X?}", table, task.handle.table_values(table).await?);
    println!("  Error counters: {:?}", task.handle.error_counts().await?);

    task.handle.shutdown().await?;
    task.join.await??;
    let slave = slave_task.await??;
    println!("  Slave exceptions sent: {:?}", slave.error_counts());

    println!("\n✅ Demo completed");
    Ok(())
}
