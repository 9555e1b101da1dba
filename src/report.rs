//! human-readable text of a probe run, as printed by the detection binary

use core::fmt;
use crate::{
    probe::{ProbeAttempt, AttemptOutcome, ProbeResult},
    stack::SlaveRecord,
    };


const RULE: &str = "============================================================";

pub const BANNER: &str = "EtherCAT Interface Detection";

/// what to check when no interface has slaves
pub const TROUBLESHOOTING: &str = "\
Troubleshooting:
  - Check EtherCAT cable is connected
  - Verify motor power is on
  - Run as root or with CAP_NET_RAW: sudo ./detect_ethercat_interface
  - Check available interfaces: ip link show (Linux) or ifconfig (macOS)";


/// title of the report
pub struct Banner;

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}", BANNER, RULE)
    }
}

/// the interfaces about to be probed
pub struct Candidates<'a>(pub &'a [String]);

impl fmt::Display for Candidates<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "No network interfaces found!");
        }
        write!(f, "Found {} network interface(s): {}", self.0.len(), self.0.join(", "))
    }
}

/// one probed interface, with the slaves found on it
pub struct Attempt<'a>(pub &'a ProbeAttempt);

impl fmt::Display for Attempt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Trying {}... ", self.0.interface)?;
        match &self.0.outcome {
            AttemptOutcome::SlavesFound(count, slaves) => {
                write!(f, "✓ Found {} slave(s)!", count)?;
                for slave in slaves {
                    write!(f, "\n{}", Slave(slave))?;
                }
                Ok(())
            },
            AttemptOutcome::NoSlaves => write!(f, "no slaves"),
            AttemptOutcome::Error(error) => write!(f, "error ({})", error.reason()),
        }
    }
}

/// identity of one slave, indented below its interface
pub struct Slave<'a>(pub &'a SlaveRecord);

impl fmt::Display for Slave<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Slave {}: {}", self.0.position, self.0.name)?;
        writeln!(f, "    Vendor: 0x{:08X}", self.0.vendor)?;
        write!(f, "    Product: 0x{:08X}", self.0.product)
    }
}

/// conclusion of the probe, with how to use its result
pub struct Verdict<'a>(pub &'a ProbeResult);

impl fmt::Display for Verdict<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            ProbeResult::Selected {interface, ..} => {
                writeln!(f, "{}", RULE)?;
                writeln!(f, "✅ EtherCAT interface detected: {}\n", interface)?;
                writeln!(f, "Use this interface for motor control:")?;
                write!(f, "  sudo ./motor_control {}", interface)
            },
            ProbeResult::NotFound => {
                writeln!(f, "\nNo EtherCAT slaves found on any interface!\n")?;
                writeln!(f, "{}", RULE)?;
                writeln!(f, "❌ No EtherCAT interface found\n")?;
                write!(f, "{}", TROUBLESHOOTING)
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;

    fn motor() -> SlaveRecord {
        SlaveRecord {position: 0, name: "Motor1".into(), vendor: 0x7d1, product: 0x2710}
    }

    #[test]
    fn attempts() {
        let found = ProbeAttempt {
            interface: "eth1".into(),
            outcome: AttemptOutcome::SlavesFound(1, vec![motor()]),
            };
        assert_eq!(Attempt(&found).to_string(), "\
Trying eth1... ✓ Found 1 slave(s)!
  Slave 0: Motor1
    Vendor: 0x000007D1
    Product: 0x00002710");

        let empty = ProbeAttempt {interface: "eth0".into(), outcome: AttemptOutcome::NoSlaves};
        assert_eq!(Attempt(&empty).to_string(), "Trying eth0... no slaves");

        let failed = ProbeAttempt {
            interface: "eth0".into(),
            outcome: AttemptOutcome::Error(ProbeError::SessionOpenFailed {
                interface: "eth0".into(),
                reason: "io: Operation not permitted".into(),
                }),
            };
        assert_eq!(Attempt(&failed).to_string(), "Trying eth0... error (io: Operation not permitted)");
    }

    #[test]
    fn candidates() {
        assert_eq!(Candidates(&[]).to_string(), "No network interfaces found!");
        assert_eq!(
            Candidates(&["eth0".into(), "en0".into()]).to_string(),
            "Found 2 network interface(s): eth0, en0");
    }

    #[test]
    fn verdicts() {
        let selected = ProbeResult::Selected {interface: "eth1".into(), slaves: vec![motor()]};
        let text = Verdict(&selected).to_string();
        assert!(text.contains("EtherCAT interface detected: eth1"));
        assert!(text.ends_with("sudo ./motor_control eth1"));

        let text = Verdict(&ProbeResult::NotFound).to_string();
        assert!(text.contains("No EtherCAT interface found"));
        assert!(text.ends_with(TROUBLESHOOTING));
    }
}
