//! Shared helpers for session integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use bytes::Bytes;
use voltage_modbus_engine::{
    MasterEvent, MasterSession, ModbusDevice, ModbusResult, Protocol, SessionConfig,
    SlaveEvent, SlaveSession,
};

pub type Outbox = Rc<RefCell<VecDeque<Vec<u8>>>>;

/// Device that queues every written packet for the test to deliver.
#[derive(Clone, Default)]
pub struct QueueDevice {
    pub outbox: Outbox,
    pub clears: Rc<RefCell<usize>>,
}

impl ModbusDevice for QueueDevice {
    fn write(&mut self, data: &[u8]) -> ModbusResult<()> {
        self.outbox.borrow_mut().push_back(data.to_vec());
        Ok(())
    }

    fn clear_receive_buffer(&mut self) {
        *self.clears.borrow_mut() += 1;
    }

    fn close(&mut self) -> ModbusResult<()> {
        Ok(())
    }
}

pub fn master(protocol: Protocol) -> (MasterSession<QueueDevice>, QueueDevice) {
    let device = QueueDevice::default();
    let session = MasterSession::new(SessionConfig::master(protocol), device.clone())
        .expect("master session");
    (session, device)
}

pub fn slave(protocol: Protocol) -> (SlaveSession<QueueDevice>, QueueDevice) {
    let device = QueueDevice::default();
    let session =
        SlaveSession::new(SessionConfig::slave(protocol), device.clone()).expect("slave session");
    (session, device)
}

/// Master and slave connected through two outboxes, pumped by hand.
pub struct Loopback {
    pub master: MasterSession<QueueDevice>,
    pub slave: SlaveSession<QueueDevice>,
    master_out: Outbox,
    slave_out: Outbox,
    /// Most master packets ever waiting for the slave at once
    pub max_outstanding: usize,
}

impl Loopback {
    pub fn new(protocol: Protocol) -> Self {
        let (master, master_device) = master(protocol);
        let (slave, slave_device) = slave(protocol);
        Self {
            master,
            slave,
            master_out: master_device.outbox,
            slave_out: slave_device.outbox,
            max_outstanding: 0,
        }
    }

    /// Tick the master, then shuttle packets until both sides are quiet.
    pub fn tick(&mut self, now_ms: u64) {
        self.master
            .handle_event(MasterEvent::Tick { now_ms })
            .expect("tick");
        self.pump(now_ms);
    }

    pub fn pump(&mut self, now_ms: u64) {
        loop {
            let outstanding = self.master_out.borrow().len();
            self.max_outstanding = self.max_outstanding.max(outstanding);

            let Some(request) = self.master_out.borrow_mut().pop_front() else {
                break;
            };
            self.slave
                .handle_event(SlaveEvent::BytesReceived(Bytes::from(request)))
                .expect("slave event");

            let replies: Vec<Vec<u8>> = self.slave_out.borrow_mut().drain(..).collect();
            for reply in replies {
                self.master
                    .handle_event(MasterEvent::BytesReceived {
                        data: Bytes::from(reply),
                        now_ms,
                    })
                    .expect("master event");
            }
        }
    }
}
