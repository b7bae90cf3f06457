//! # Async Driver
//!
//! Runs a session inside one tokio task. Ticks, received bytes, user
//! commands and the receive deadline are multiplexed with `tokio::select!`,
//! so the session only ever sees one event at a time.
//!
//! ```rust,no_run
//! use voltage_modbus_engine::driver::spawn_master;
//! use voltage_modbus_engine::{
//!     ChannelDevice, MasterSession, ModbusFunction, Protocol, SessionConfig, TableConfig,
//! };
//!
//! # async fn example() -> voltage_modbus_engine::ModbusResult<()> {
//! let (device, _to_peer) = ChannelDevice::pair();
//! let (_from_peer_tx, from_peer) = tokio::sync::mpsc::unbounded_channel();
//! let config = SessionConfig::master(Protocol::Tcp);
//! let session = MasterSession::new(config, device)?;
//!
//! let master = spawn_master(session, config.tick_ms, from_peer);
//! let table = master
//!     .handle
//!     .add_table(TableConfig::new(1, ModbusFunction::ReadHoldingRegisters, 0, 10))
//!     .await?;
//! println!("{:?}", master.handle.table_values(table).await?);
//! master.handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::device::ModbusDevice;
use crate::endian::ByteOrder;
use crate::error::{ModbusError, ModbusResult};
use crate::frame::Frame;
use crate::master::{CommandId, MasterEvent, MasterSession, WriteCompletion};
use crate::protocol::ErrorCode;
use crate::register_table::{TableConfig, TableHandle};
use crate::slave::{SlaveEvent, SlaveSession};
use crate::value::ModbusValue;

const COMMAND_CHANNEL_CAPACITY: usize = 64;

enum Command {
    AddTable {
        config: TableConfig,
        reply: oneshot::Sender<ModbusResult<TableHandle>>,
    },
    RemoveTable {
        handle: TableHandle,
        reply: oneshot::Sender<bool>,
    },
    ReconfigureTable {
        handle: TableHandle,
        config: TableConfig,
        reply: oneshot::Sender<ModbusResult<()>>,
    },
    TableValues {
        handle: TableHandle,
        reply: oneshot::Sender<Option<Vec<u16>>>,
    },
    Enqueue {
        frame: Frame,
        reply: oneshot::Sender<ModbusResult<CommandId>>,
    },
    WriteValue {
        handle: TableHandle,
        address: u16,
        value: ModbusValue,
        order: ByteOrder,
        reply: oneshot::Sender<ModbusResult<CommandId>>,
    },
    SetRecvTimeout {
        timeout_ms: u64,
        reply: oneshot::Sender<ModbusResult<()>>,
    },
    ErrorCounts {
        reply: oneshot::Sender<HashMap<ErrorCode, u32>>,
    },
    Shutdown,
}

/// Cloneable handle to a master task.
#[derive(Clone)]
pub struct MasterHandle {
    tx: mpsc::Sender<Command>,
}

/// A spawned master: its handle, write outcomes and the task itself.
pub struct MasterTask {
    pub handle: MasterHandle,
    pub completions: mpsc::UnboundedReceiver<WriteCompletion>,
    pub join: JoinHandle<ModbusResult<()>>,
}

impl MasterHandle {
    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> ModbusResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| ModbusError::transport("master task stopped"))?;
        rx.await
            .map_err(|_| ModbusError::transport("master task dropped the request"))
    }

    pub async fn add_table(&self, config: TableConfig) -> ModbusResult<TableHandle> {
        self.call(|reply| Command::AddTable { config, reply }).await?
    }

    pub async fn remove_table(&self, handle: TableHandle) -> ModbusResult<bool> {
        self.call(|reply| Command::RemoveTable { handle, reply }).await
    }

    pub async fn reconfigure_table(
        &self,
        handle: TableHandle,
        config: TableConfig,
    ) -> ModbusResult<()> {
        self.call(|reply| Command::ReconfigureTable {
            handle,
            config,
            reply,
        })
        .await?
    }

    /// Snapshot of a table's cells.
    pub async fn table_values(&self, handle: TableHandle) -> ModbusResult<Vec<u16>> {
        self.call(|reply| Command::TableValues { handle, reply })
            .await?
            .ok_or_else(|| ModbusError::invalid_data(format!("unknown {}", handle)))
    }

    /// Queue a raw request frame.
    pub async fn enqueue(&self, frame: Frame) -> ModbusResult<CommandId> {
        self.call(|reply| Command::Enqueue { frame, reply }).await?
    }

    pub async fn write_value(
        &self,
        handle: TableHandle,
        address: u16,
        value: ModbusValue,
        order: ByteOrder,
    ) -> ModbusResult<CommandId> {
        self.call(|reply| Command::WriteValue {
            handle,
            address,
            value,
            order,
            reply,
        })
        .await?
    }

    pub async fn set_recv_timeout_ms(&self, timeout_ms: u64) -> ModbusResult<()> {
        self.call(|reply| Command::SetRecvTimeout { timeout_ms, reply })
            .await?
    }

    pub async fn error_counts(&self) -> ModbusResult<HashMap<ErrorCode, u32>> {
        self.call(|reply| Command::ErrorCounts { reply }).await
    }

    /// Stop the task; the device is closed on the way out.
    pub async fn shutdown(&self) -> ModbusResult<()> {
        self.tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| ModbusError::transport("master task stopped"))
    }
}

/// Spawn `session` on the current runtime.
///
/// `incoming` carries the bytes the transport receives. The task ends on
/// [`MasterHandle::shutdown`], when every handle is dropped, or when
/// `incoming` closes.
pub fn spawn_master<D>(
    session: MasterSession<D>,
    tick_ms: u64,
    incoming: mpsc::UnboundedReceiver<Bytes>,
) -> MasterTask
where
    D: ModbusDevice + Send + 'static,
{
    let (tx, commands) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (completion_tx, completions) = mpsc::unbounded_channel();
    let join = tokio::spawn(run_master(
        session,
        tick_ms,
        incoming,
        commands,
        completion_tx,
    ));
    MasterTask {
        handle: MasterHandle { tx },
        completions,
        join,
    }
}

async fn run_master<D: ModbusDevice>(
    mut session: MasterSession<D>,
    tick_ms: u64,
    mut incoming: mpsc::UnboundedReceiver<Bytes>,
    mut commands: mpsc::Receiver<Command>,
    completions: mpsc::UnboundedSender<WriteCompletion>,
) -> ModbusResult<()> {
    let start = Instant::now();
    let now_ms = move || start.elapsed().as_millis() as u64;

    let mut ticker = time::interval(Duration::from_millis(tick_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Master task started ({})", session.codec());
    loop {
        let deadline = session
            .next_deadline_ms()
            .map(|ms| start + Duration::from_millis(ms));

        let event = tokio::select! {
            _ = ticker.tick() => MasterEvent::Tick { now_ms: now_ms() },
            data = incoming.recv() => match data {
                Some(data) => MasterEvent::BytesReceived { data, now_ms: now_ms() },
                None => {
                    info!("Transport closed");
                    break;
                }
            },
            cmd = commands.recv() => match cmd {
                Some(Command::Shutdown) | None => break,
                Some(cmd) => {
                    apply_command(&mut session, cmd);
                    continue;
                }
            },
            _ = sleep_until(deadline), if deadline.is_some() => {
                MasterEvent::ReceiveTimeout { now_ms: now_ms() }
            }
        };

        if let Err(e) = session.handle_event(event) {
            warn!("Master event failed: {}", e);
        }
        for completion in session.take_completions() {
            if completions.send(completion).is_err() {
                debug!("No listener for {}", completion.command);
            }
        }
    }

    info!("Master task stopped");
    session.close()
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// A dropped reply receiver means the caller gave up; nothing to report.
fn apply_command<D: ModbusDevice>(session: &mut MasterSession<D>, cmd: Command) {
    match cmd {
        Command::AddTable { config, reply } => {
            let _ = reply.send(session.add_table(&config));
        }
        Command::RemoveTable { handle, reply } => {
            let _ = reply.send(session.remove_table(handle).is_some());
        }
        Command::ReconfigureTable {
            handle,
            config,
            reply,
        } => {
            let _ = reply.send(session.reconfigure_table(handle, &config));
        }
        Command::TableValues { handle, reply } => {
            let _ = reply.send(session.table(handle).map(|t| t.values().to_vec()));
        }
        Command::Enqueue { frame, reply } => {
            let _ = reply.send(session.enqueue_manual(&frame));
        }
        Command::WriteValue {
            handle,
            address,
            value,
            order,
            reply,
        } => {
            let _ = reply.send(session.write_value(handle, address, value, order));
        }
        Command::SetRecvTimeout { timeout_ms, reply } => {
            let _ = reply.send(session.set_recv_timeout_ms(timeout_ms));
        }
        Command::ErrorCounts { reply } => {
            let _ = reply.send(session.error_counts().clone());
        }
        Command::Shutdown => {}
    }
}

/// Serve requests until `incoming` closes, then hand the session back.
pub async fn run_slave<D: ModbusDevice>(
    mut session: SlaveSession<D>,
    mut incoming: mpsc::UnboundedReceiver<Bytes>,
) -> ModbusResult<SlaveSession<D>> {
    info!("Slave task started ({})", session.codec());
    while let Some(data) = incoming.recv().await {
        if let Err(e) = session.handle_event(SlaveEvent::BytesReceived(data)) {
            warn!("Slave event failed: {}", e);
        }
    }
    info!("Slave task stopped");
    Ok(session)
}
