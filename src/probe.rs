/*!
    search for the network interface carrying an ethercat segment.

    Candidate interfaces are tried one after the other, in the given order, and the search stops at the first interface with at least one slave answering. Every session opened on an interface is closed before the next interface is tried, whatever the outcome of the attempt.

    ## Example

    ```ignore
    let result = probe(&EthernetStack::default(), &["eth0", "eth1"], |attempt| println!("{:?}", attempt)).await;
    if let ProbeResult::Selected {interface, slaves} = result {
        println!("{} slaves on {}", slaves.len(), interface);
    }
    ```
*/

use crate::{
    stack::{MasterStack, SlaveRecord},
    error::{EthercatError, ProbeError},
    };


/// outcome of probing one interface
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// the segment answered with this number of slaves (never 0), and their identities
    SlavesFound(u16, Vec<SlaveRecord>),
    /// a session could be opened but no slave answered
    NoSlaves,
    /// the interface could not be probed
    Error(ProbeError),
}

/// result of probing one interface, reported as soon as the interface has been released
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeAttempt {
    pub interface: String,
    pub outcome: AttemptOutcome,
}

/// final result of a probe over all candidate interfaces
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProbeResult {
    /// first interface found with slaves, `slaves` is never empty
    Selected {interface: String, slaves: Vec<SlaveRecord>},
    /// no candidate interface has slaves
    NotFound,
}
impl ProbeResult {
    pub fn is_selected(&self) -> bool {
        matches!(self, Self::Selected {..})
    }
    /// selected interface if any
    pub fn interface(&self) -> Option<&str> {
        match self {
            Self::Selected {interface, ..} => Some(interface),
            Self::NotFound => None,
        }
    }
    /// process exit status reporting this result: 0 when an interface was selected, 1 otherwise
    pub fn exit_status(&self) -> u8 {
        if self.is_selected() {0} else {1}
    }
}


/**
    owner of an open session, closing it when dropped

    This makes the release of the session independent of the path leaving an attempt (early return, error, or panic unwinding)
*/
pub struct SessionGuard<'a, M: MasterStack> {
    stack: &'a M,
    // only taken when the guard is dropped
    session: Option<M::Session>,
}
impl<'a, M: MasterStack> SessionGuard<'a, M> {
    pub fn new(stack: &'a M, session: M::Session) -> Self {
        Self {stack, session: Some(session)}
    }
    /// the guarded session
    pub fn session(&mut self) -> &mut M::Session {
        self.session.as_mut().expect("session is only released on drop")
    }
    /// close the session now
    pub fn release(self) {}
}
impl<M: MasterStack> Drop for SessionGuard<'_, M> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.stack.close(session);
        }
    }
}


/**
    try each candidate interface in order and select the first one with at least one slave

    - `observer` receives each attempt once its session is closed, it is the only way to get the details of failed attempts
    - failures on an interface never stop the probe, they are reported in the attempt and the next candidate is tried
    - no interface is tried after the selected one
*/
pub async fn probe<M, I>(stack: &M, candidates: I, mut observer: impl FnMut(&ProbeAttempt)) -> ProbeResult
where
    M: MasterStack,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    for candidate in candidates {
        let interface = candidate.as_ref();
        log::debug!("probing {}", interface);
        let attempt = ProbeAttempt {
            interface: interface.to_owned(),
            outcome: attempt(stack, interface).await,
        };
        match &attempt.outcome {
            AttemptOutcome::SlavesFound(count, _) => log::info!("{}: {} slaves found", interface, count),
            AttemptOutcome::NoSlaves => log::info!("{}: no slaves", interface),
            AttemptOutcome::Error(error) => log::info!("{}", error),
        }
        observer(&attempt);

        if let AttemptOutcome::SlavesFound(_, slaves) = attempt.outcome {
            return ProbeResult::Selected {interface: attempt.interface, slaves};
        }
    }
    ProbeResult::NotFound
}

/// probe one interface, the session is closed before returning
async fn attempt<M: MasterStack>(stack: &M, interface: &str) -> AttemptOutcome {
    let session = match stack.open(interface).await {
        Ok(session) => session,
        Err(error) => return AttemptOutcome::Error(ProbeError::SessionOpenFailed {
            interface: interface.to_owned(),
            reason: error.to_string(),
            }),
    };
    let mut guard = SessionGuard::new(stack, session);
    let failed = |reason: String|  AttemptOutcome::Error(ProbeError::InitializationFailed {
        interface: interface.to_owned(),
        reason,
        });

    let count = match stack.init(guard.session()).await {
        Ok(count) => count,
        Err(error) => return failed(error.to_string()),
    };
    if count == 0
        {return AttemptOutcome::NoSlaves}

    let slaves = match stack.slaves(guard.session()).await {
        Ok(slaves) => slaves,
        Err(error) => return failed(error.to_string()),
    };
    if slaves.len() != usize::from(count) {
        return failed(EthercatError::<()>::Protocol("listed slaves differ from counted slaves").to_string());
    }
    guard.release();
    AttemptOutcome::SlavesFound(count, slaves)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_status() {
        let selected = ProbeResult::Selected {
            interface: "eth1".into(),
            slaves: vec![SlaveRecord {position: 0, name: "Motor1".into(), vendor: 0x7d1, product: 0x2710}],
            };
        assert!(selected.is_selected());
        assert_eq!(selected.interface(), Some("eth1"));
        assert_eq!(selected.exit_status(), 0);

        assert!(! ProbeResult::NotFound.is_selected());
        assert_eq!(ProbeResult::NotFound.interface(), None);
        assert_eq!(ProbeResult::NotFound.exit_status(), 1);
    }
}
