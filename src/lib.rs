/*!
    Detection of the network interface carrying an EtherCAT segment.

    Each candidate interface is probed in turn by a minimal ethercat master, which counts and identifies the slaves answering on it. The first interface with slaves is selected.

    - [probe] holds the search over interfaces
    - [stack] is the master capability the search relies on, implemented over raw sockets by [master] and [rawmaster]
    - [interfaces] lists the candidate interfaces of the host
    - [report] renders the results for operators
*/

#![allow(non_upper_case_globals)]

pub mod error;
pub mod data;
pub mod registers;
pub mod eeprom;
pub mod socket;
pub mod rawmaster;
pub mod sii;
pub mod master;
pub mod stack;
pub mod probe;
pub mod interfaces;
pub mod report;

pub use crate::data::{PduData, Field};
pub use crate::error::{EthercatError, EthercatResult, ProbeError};
pub use crate::socket::*;
pub use crate::rawmaster::{RawMaster, SlaveAddress, PduAnswer, PduCommand, DEFAULT_TIMEOUT};
pub use crate::stack::{MasterStack, SlaveRecord, EthernetStack};
pub use crate::probe::{probe, ProbeAttempt, AttemptOutcome, ProbeResult, SessionGuard};
