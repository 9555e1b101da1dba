/*!
    capability surface of an ethercat master, as needed to detect a segment.

    The probing logic only depends on [MasterStack], so it can be run on the real raw-socket master ([EthernetStack]) as well as on any test double.
*/

use core::time::Duration;
use crate::{
    master::Master,
    rawmaster::DEFAULT_TIMEOUT,
    error::EthercatResult,
    };


/// identity snapshot of one slave, valid only for the session it was read in
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlaveRecord {
    /// ordinal position of the slave on the segment, starting at 0
    pub position: u16,
    /// device name, as declared in the slave's EEPROM
    pub name: String,
    /// vendor id
    pub vendor: u32,
    /// product code
    pub product: u32,
}

/**
    the operations of an ethercat master a probe relies on

    A session is exclusively bound to one interface. [Self::close] consumes it and is always possible, even after a failed initialization.
*/
#[allow(async_fn_in_trait)]
pub trait MasterStack {
    type Session;

    /// open a link-layer session on the given interface. A failed opening holds no resource.
    async fn open(&self, interface: &str) -> EthercatResult<Self::Session>;
    /// initialize the segment and return the number of responding slaves
    async fn init(&self, session: &mut Self::Session) -> EthercatResult<u16>;
    /// identity of the slaves found by [Self::init], in topological order
    async fn slaves(&self, session: &mut Self::Session) -> EthercatResult<Vec<SlaveRecord>>;
    /// end the session, releasing its interface
    fn close(&self, session: Self::Session);
}


/// [MasterStack] running [Master] over raw ethernet sockets
#[derive(Copy, Clone, Debug)]
pub struct EthernetStack {
    timeout: Duration,
}
impl EthernetStack {
    /// `timeout` is the delay after which a frame sent on an interface is considered lost
    pub fn new(timeout: Duration) -> Self {
        Self {timeout}
    }
}
impl Default for EthernetStack {
    fn default() -> Self {Self::new(DEFAULT_TIMEOUT)}
}

impl MasterStack for EthernetStack {
    type Session = Master;

    async fn open(&self, interface: &str) -> EthercatResult<Master> {
        Master::open(interface, self.timeout)
    }
    async fn init(&self, session: &mut Master) -> EthercatResult<u16> {
        session.init().await
    }
    async fn slaves(&self, session: &mut Master) -> EthercatResult<Vec<SlaveRecord>> {
        session.slaves().await
    }
    fn close(&self, session: Master) {
        session.close()
    }
}
