/*!
    listing of the network interfaces worth probing on this host.

    The system is queried through its datalink layer, then with the usual command-line tools when the datalink listing is unavailable. Names of interfaces that cannot carry an ethercat segment (loopback, virtual, bridges, tunnels, CAN) are discarded.
*/

use std::{
    io,
    fmt,
    process::{Command, ExitStatus},
    };


/// interfaces tried when the system cannot be queried
pub const FALLBACK_INTERFACES: [&str; 5] = ["eth0", "eth1", "enp0s3", "en0", "en9"];

/// prefixes of interface names which are not physical ethernet ports
const EXCLUDED_PREFIXES: [&str; 11] = ["lo", "veth", "docker", "br-", "virbr", "vnet", "tun", "tap", "wg", "can", "vcan"];


/// anything producing the ordered list of interfaces to probe
pub trait InterfaceSource {
    /// interface names, in probing order. This never fails, an empty list means the host has no candidate interface
    fn candidates(&self) -> Vec<String>;
}

/// one way of asking the system for its network interfaces
pub trait InterfaceQuery {
    /// names of the candidate interfaces, in the order the system reports them
    fn query(&self) -> Result<Vec<String>, EnumerationError>;
}

/**
    the interfaces reported by the operating system

    Its queries are tried in order until one succeeds. When none does, [FALLBACK_INTERFACES] are returned.
*/
pub struct SystemInterfaces {
    queries: Vec<Box<dyn InterfaceQuery>>,
}

/// a fixed list of interfaces, given by the operator
#[derive(Clone, Debug, Default)]
pub struct StaticInterfaces(pub Vec<String>);

/// interfaces listed by the datalink layer (`getifaddrs` on unix)
#[derive(Copy, Clone, Debug, Default)]
pub struct Datalink;
/// interfaces listed by `ip link show`
#[derive(Copy, Clone, Debug, Default)]
pub struct IpLink;
/// interfaces listed by `ifconfig`
#[derive(Copy, Clone, Debug, Default)]
pub struct Ifconfig;

/// reason why the system interfaces could not be listed
#[derive(Debug)]
pub enum EnumerationError {
    /// the datalink layer reported no interface at all, not even loopback
    Empty,
    /// the listing command could not be run
    Spawn {command: &'static str, error: io::Error},
    /// the listing command reported a failure
    Status {command: &'static str, status: ExitStatus},
    /// no query is available
    Unavailable,
}

impl fmt::Display for EnumerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "the datalink layer lists no interface"),
            Self::Spawn {command, error} => write!(f, "cannot run `{}`: {}", command, error),
            Self::Status {command, status} => write!(f, "`{}` failed with {}", command, status),
            Self::Unavailable => write!(f, "no way to list interfaces"),
        }
    }
}
impl std::error::Error for EnumerationError {}


impl SystemInterfaces {
    /// query the datalink layer, then `ip link show`, then `ifconfig`
    pub fn new() -> Self {
        Self::with_queries(vec![Box::new(Datalink) as Box<dyn InterfaceQuery>, Box::new(IpLink), Box::new(Ifconfig)])
    }
    /// query the system with the given queries, in order
    pub fn with_queries(queries: Vec<Box<dyn InterfaceQuery>>) -> Self {
        Self {queries}
    }
    /// names reported by the first successful query
    pub fn list(&self) -> Result<Vec<String>, EnumerationError> {
        let mut failure = EnumerationError::Unavailable;
        for query in &self.queries {
            match query.query() {
                Ok(names) => return Ok(names),
                Err(error) => {
                    log::debug!("{}, trying next interface query", error);
                    failure = error;
                },
            }
        }
        Err(failure)
    }
}
impl Default for SystemInterfaces {
    fn default() -> Self {Self::new()}
}

impl InterfaceSource for SystemInterfaces {
    fn candidates(&self) -> Vec<String> {
        match self.list() {
            Ok(names) => names,
            Err(error) => {
                log::warn!("interface enumeration degraded ({}), using common interface names", error);
                FALLBACK_INTERFACES.iter().map(|name| name.to_string()).collect()
            },
        }
    }
}

impl InterfaceSource for StaticInterfaces {
    fn candidates(&self) -> Vec<String> {
        self.0.clone()
    }
}

impl InterfaceQuery for Datalink {
    fn query(&self) -> Result<Vec<String>, EnumerationError> {
        let interfaces = pnet_datalink::interfaces();
        // every host has at least a loopback, so nothing means the listing failed
        if interfaces.is_empty()
            {return Err(EnumerationError::Empty)}
        Ok(interfaces.into_iter()
            .filter(|interface| ! interface.is_loopback() && is_candidate(&interface.name))
            .map(|interface| interface.name)
            .collect())
    }
}
impl InterfaceQuery for IpLink {
    fn query(&self) -> Result<Vec<String>, EnumerationError> {
        run("ip", &["link", "show"]).map(|output| parse_ip_link(&output))
    }
}
impl InterfaceQuery for Ifconfig {
    fn query(&self) -> Result<Vec<String>, EnumerationError> {
        run("ifconfig", &[]).map(|output| parse_ifconfig(&output))
    }
}

/// run a listing command and return its standard output
fn run(command: &'static str, args: &[&str]) -> Result<String, EnumerationError> {
    let output = Command::new(command)
        .args(args)
        .output()
        .map_err(|error|  EnumerationError::Spawn {command, error})?;
    if ! output.status.success()
        {return Err(EnumerationError::Status {command, status: output.status})}
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}


/// extract candidate interfaces from the output of `ip link show`
pub fn parse_ip_link(output: &str) -> Vec<String> {
    output.lines()
        .filter(|line| line.contains(':') && line.to_lowercase().contains("state"))
        .filter_map(|line| line.split(':').nth(1))
        .map(|name| name.trim())
        // veth pairs and vlans are shown as `name@peer`
        .map(|name| name.split('@').next().unwrap_or(name))
        .filter(|name| is_candidate(name))
        .map(str::to_owned)
        .collect()
}

/// extract candidate interfaces from the output of `ifconfig`, only ethernet names are kept
pub fn parse_ifconfig(output: &str) -> Vec<String> {
    output.lines()
        .filter(|line| line.contains(':') && line.contains("flags="))
        .filter_map(|line| line.split(':').next())
        .map(|name| name.trim())
        .filter(|name| name.starts_with("en") || name.starts_with("eth"))
        .filter(|name| is_candidate(name))
        .map(str::to_owned)
        .collect()
}

/// true if the interface name may be a physical ethernet port
pub fn is_candidate(name: &str) -> bool {
    ! name.is_empty()
    && ! EXCLUDED_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_link() {
        let output = "\
1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue state UNKNOWN mode DEFAULT group default qlen 1000
    link/loopback 00:00:00:00:00:00 brd 00:00:00:00:00:00
2: enp3s0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc fq_codel state UP mode DEFAULT group default qlen 1000
    link/ether 3c:7c:3f:0e:12:aa brd ff:ff:ff:ff:ff:ff
3: eth1: <NO-CARRIER,BROADCAST,MULTICAST,UP> mtu 1500 qdisc pfifo_fast state DOWN mode DEFAULT group default qlen 1000
    link/ether 3c:7c:3f:0e:12:ab brd ff:ff:ff:ff:ff:ff
4: docker0: <NO-CARRIER,BROADCAST,MULTICAST,UP> mtu 1500 qdisc noqueue state DOWN mode DEFAULT group default
    link/ether 02:42:5d:1b:70:11 brd ff:ff:ff:ff:ff:ff
5: veth12ab@if4: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc noqueue master docker0 state UP mode DEFAULT group default
    link/ether 6a:1e:8f:5a:02:9c brd ff:ff:ff:ff:ff:ff link-netnsid 0
6: enp3s0.100@enp3s0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc noqueue state UP mode DEFAULT group default qlen 1000
    link/ether 3c:7c:3f:0e:12:aa brd ff:ff:ff:ff:ff:ff
7: can0: <NOARP,UP,LOWER_UP,ECHO> mtu 16 qdisc pfifo_fast state UP mode DEFAULT group default qlen 10
    link/can
";
        assert_eq!(parse_ip_link(output), ["enp3s0", "eth1", "enp3s0.100"]);
        assert!(parse_ip_link("").is_empty());
    }

    #[test]
    fn ifconfig() {
        let output = "\
lo0: flags=8049<UP,LOOPBACK,RUNNING,MULTICAST> mtu 16384
\toptions=1203<RXCSUM,TXCSUM,TXSTATUS,SW_TIMESTAMP>
\tinet 127.0.0.1 netmask 0xff000000
en0: flags=8863<UP,BROADCAST,SMART,RUNNING,SIMPLEX,MULTICAST> mtu 1500
\tether a4:83:e7:11:22:33
bridge0: flags=8863<UP,BROADCAST,SMART,RUNNING,SIMPLEX,MULTICAST> mtu 1500
en9: flags=8863<UP,BROADCAST,SMART,RUNNING,SIMPLEX,MULTICAST> mtu 1500
utun0: flags=8051<UP,POINTOPOINT,RUNNING,MULTICAST> mtu 1380
";
        assert_eq!(parse_ifconfig(output), ["en0", "en9"]);
    }

    #[test]
    fn exclusions() {
        assert!(is_candidate("eth0"));
        assert!(is_candidate("enx00e04c680001"));
        assert!(is_candidate("wlp2s0"));
        for name in ["", "lo", "veth0", "docker0", "br-1a2b", "virbr0", "vnet3", "tun0", "tap1", "wg0", "can0", "vcan0"] {
            assert!(! is_candidate(name), "{} should be excluded", name);
        }
    }

    /// query answering with a fixed listing
    struct Listing(&'static [&'static str]);
    impl InterfaceQuery for Listing {
        fn query(&self) -> Result<Vec<String>, EnumerationError> {
            Ok(self.0.iter().map(|name| name.to_string()).collect())
        }
    }
    /// query of a tool missing on the host
    struct Missing;
    impl InterfaceQuery for Missing {
        fn query(&self) -> Result<Vec<String>, EnumerationError> {
            Err(EnumerationError::Spawn {
                command: "ip",
                error: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
                })
        }
    }

    #[test]
    fn failed_enumeration_falls_back() {
        let source = SystemInterfaces::with_queries(vec![Box::new(Missing) as Box<dyn InterfaceQuery>, Box::new(Missing)]);
        assert!(source.list().is_err());
        assert_eq!(source.candidates(), ["eth0", "eth1", "enp0s3", "en0", "en9"]);

        let source = SystemInterfaces::with_queries(vec![]);
        assert_eq!(source.candidates(), FALLBACK_INTERFACES);
    }

    #[test]
    fn next_query_after_failure() {
        let source = SystemInterfaces::with_queries(vec![
            Box::new(Missing) as Box<dyn InterfaceQuery>,
            Box::new(Listing(&["enp3s0", "eth1"])),
            Box::new(Listing(&["eth9"])),
            ]);
        assert_eq!(source.candidates(), ["enp3s0", "eth1"]);
    }

    #[test]
    fn empty_listing_stays_empty() {
        let source = SystemInterfaces::with_queries(vec![Box::new(Listing(&[])) as Box<dyn InterfaceQuery>, Box::new(Listing(&["eth0"]))]);
        assert!(source.list().unwrap().is_empty());
        assert!(source.candidates().is_empty());
    }

    #[test]
    fn static_source() {
        let source = StaticInterfaces(vec!["eth2".into(), "eth0".into()]);
        assert_eq!(source.candidates(), ["eth2", "eth0"]);
    }
}
