//! definition of the general ethercat error type, and of the errors reported per probed interface

use std::sync::Arc;
use core::fmt;

/**
    general object reporting an unexpected result regarding ethercat communication

    Its variant are meant to help finding the cause responsible for the problem and how to deal with it.

    [Self::Slave] variant should not be used without an appropriate type for `T`, `T` depend on the operation the slave reports for, and is usually an error code, or an enum.
*/
#[derive(Clone, Debug)]
pub enum EthercatError<T=()> {
    /// error caused by communication support
    ///
    /// these errors are exterior to this library (missing interface, missing privileges, ...)
    Io(Arc<std::io::Error>),

    /// error reported by a slave, its type depend on the operation returning this error
    Slave(T),

    /// error reported by the master
    ///
    /// these errors can generally be fixed by using the master differently
    Master(&'static str),

    /// error detected by the master in the ethercat communication
    ///
    /// these errors can generally not be fixed and the whole communication has to be restarted
    Protocol(&'static str),

    /// error is due to too much time elapsed waiting for the segment
    Timeout(&'static str),
}

/// convenient alias to simplify return annotations
pub type EthercatResult<T=(), E=()> = core::result::Result<T, EthercatError<E>>;

impl<T: fmt::Debug> fmt::Display for EthercatError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(error) => write!(f, "io: {}", error),
            Self::Slave(value) => write!(f, "slave: {:?}", value),
            Self::Master(message) => write!(f, "master: {}", message),
            Self::Protocol(message) => write!(f, "protocol: {}", message),
            Self::Timeout(message) => write!(f, "timeout: {}", message),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for EthercatError<T> {}

impl<T> From<std::io::Error> for EthercatError<T> {
    fn from(src: std::io::Error) -> Self {
        EthercatError::Io(Arc::new(src))
    }
}

impl<T> From<crate::data::PackingError> for EthercatError<T> {
    fn from(src: crate::data::PackingError) -> Self {
        EthercatError::Protocol(match src {
            crate::data::PackingError::BadSize(_, text) => text,
            crate::data::PackingError::InvalidValue(text) => text,
        })
    }
}

// because rust doesn't allow specialization and already implements `From<T> for T`, we cannot write smart conversions for generic EthercatError<T>, so these are manual conversion methods
impl<E> EthercatError<E> {
    /// convert the error with a callback handling the case of slave-specific error
    pub fn map<F,T>(self, callback: F) -> EthercatError<T>
    where F: Fn(E) -> T
    {
        match self {
            EthercatError::Slave(value) => EthercatError::Slave(callback(value)),
            EthercatError::Io(e) => EthercatError::Io(e),
            EthercatError::Master(message) => EthercatError::Master(message),
            EthercatError::Protocol(message) => EthercatError::Protocol(message),
            EthercatError::Timeout(message) => EthercatError::Timeout(message),
        }
    }
}
impl EthercatError<()> {
    /// convert an error with no slave-specific type into an error with any slave-specific type
    pub fn upgrade<F>(self) -> EthercatError<F> {
        match self {
            EthercatError::Slave(()) => EthercatError::Master("a slave reported an unspecified error"),
            EthercatError::Io(e) => EthercatError::Io(e),
            EthercatError::Master(message) => EthercatError::Master(message),
            EthercatError::Protocol(message) => EthercatError::Protocol(message),
            EthercatError::Timeout(message) => EthercatError::Timeout(message),
        }
    }
}


/**
    failure of one probing attempt. It never aborts a probe run, it is recorded in the attempt's outcome and the next candidate interface is tried.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProbeError {
    /// the link-layer session could not be opened on the interface (unknown interface, missing privileges, unsupported platform)
    SessionOpenFailed {interface: String, reason: String},
    /// the session opened but the segment initialization or the slaves listing failed
    InitializationFailed {interface: String, reason: String},
}

impl ProbeError {
    /// interface the failed attempt was made on
    pub fn interface(&self) -> &str {
        match self {
            Self::SessionOpenFailed {interface, ..} => interface,
            Self::InitializationFailed {interface, ..} => interface,
        }
    }
    /// human-readable cause of the failure
    pub fn reason(&self) -> &str {
        match self {
            Self::SessionOpenFailed {reason, ..} => reason,
            Self::InitializationFailed {reason, ..} => reason,
        }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionOpenFailed {interface, reason} =>
                write!(f, "cannot open session on {}: {}", interface, reason),
            Self::InitializationFailed {interface, reason} =>
                write!(f, "cannot initialize segment on {}: {}", interface, reason),
        }
    }
}

impl std::error::Error for ProbeError {}
