use crate::{
	socket::EthercatSocket,
	rawmaster::RawMaster,
	registers::{self, AlControlRequest, AlState},
	sii::Sii,
	stack::SlaveRecord,
	error::{EthercatError, EthercatResult},
	};
use core::time::Duration;


/// fixed addresses given to slaves are their position plus this offset, so no slave ends up with the forbidden address 0
pub const STATION_ADDRESS_OFFSET: u16 = 0x1000;


/**
    This struct is one session of ethercat master on one network interface: it owns the socket bound to the interface for its whole life, and closes it when dropped.

    ## Example

    The following is the typical detection sequence

    ```ignore
    let mut master = Master::open("eno1", DEFAULT_TIMEOUT)?;
    if master.init().await? > 0 {
        for slave in master.slaves().await? {
            println!("{}", slave.name);
        }
    }
    master.close();
    ```
*/
pub struct Master {
    raw: RawMaster,
    interface: String,
    /// number of slaves found by the last initialization
    slaves: u16,
}
impl Master {
    /**
        open a session on the given network interface, using a raw ethernet socket

        this requires the privileges to open raw sockets
    */
    #[cfg(target_os = "linux")]
    pub fn open(interface: &str, timeout: Duration) -> EthercatResult<Self> {
        let socket = crate::socket::EthernetSocket::new(interface)?;
        Ok(Self::new(interface, socket, timeout))
    }
    #[cfg(not(target_os = "linux"))]
    pub fn open(_interface: &str, _timeout: Duration) -> EthercatResult<Self> {
        Err(EthercatError::Master("raw ethernet sockets are only supported on linux"))
    }

    /// initialize a session on any socket
    pub fn new<S: EthercatSocket + 'static + Send + Sync>(interface: &str, socket: S, timeout: Duration) -> Self {
        Self {
            raw: RawMaster::new(socket, timeout),
            interface: interface.to_owned(),
            slaves: 0,
        }
    }

    /// name of the interface this session is bound to
    pub fn interface(&self) -> &str  {&self.interface}
    /// return a reference to the low level master control.
    pub fn raw(&self) -> &RawMaster  {&self.raw}

    /**
        number of slaves in the ethercat segment (only answering slaves will be accounted for)

        a frame not coming back means there is no ethercat device on this interface, so a timeout is a count of 0
    */
    pub async fn count(&self) -> EthercatResult<u16> {
        match self.raw.brd(registers::dl::information).await {
            Ok(answer) => Ok(answer.answers),
            Err(EthercatError::Timeout(_)) => Ok(0),
            Err(error) => Err(error),
        }
    }

    /**
        initialize the segment: count slaves, reset them to [AlState::Init], give the EEPROM access to the master and set their fixed addresses

        returns the number of slaves found
    */
    pub async fn init(&mut self) -> EthercatResult<u16> {
        self.slaves = 0;
        let count = self.count().await?;
        log::debug!("{}: {} slaves answering", self.interface, count);
        if count == 0
            {return Ok(0)}
        if STATION_ADDRESS_OFFSET.checked_add(count).is_none()
            {return Err(EthercatError::Protocol("too many slaves counted to give them fixed addresses"))}

        let answers = self.raw.bwr(registers::al::control, AlControlRequest::switch(AlState::Init)).await?.answers;
        if answers != count
            {log::warn!("{}: only {} of {} slaves accepted the init request", self.interface, answers, count)}
        self.raw.bwr(registers::sii::access, 0).await?;

        for position in 0 .. count {
            self.raw.apwr(position, registers::address::fixed, STATION_ADDRESS_OFFSET + position).await?
                .one()?;
        }
        let status = self.raw.brd(registers::al::status).await?;
        log::debug!("{}: segment states {:?}", self.interface, status.value.state());

        self.slaves = count;
        Ok(count)
    }

    /**
        identity of every slave found by [Self::init], in topological order

        a slave with an unreadable EEPROM is still reported, with null identifiers
    */
    pub async fn slaves(&self) -> EthercatResult<Vec<SlaveRecord>> {
        let mut records = Vec::with_capacity(usize::from(self.slaves));
        for position in 0 .. self.slaves {
            records.push(self.identify(position).await?);
        }
        Ok(records)
    }

    async fn identify(&self, position: u16) -> EthercatResult<SlaveRecord> {
        let sii = Sii::new(&self.raw, STATION_ADDRESS_OFFSET + position);
        let (vendor, product) = match sii.identity().await {
            Ok(identity) => identity,
            Err(EthercatError::Slave(error)) => {
                log::warn!("{}: slave {} identity is unreadable: {:?}", self.interface, position, error);
                (0, 0)
                },
            Err(error) => return Err(error.map(|_| ())),
        };
        let name = match sii.name().await {
            Ok(name) => name,
            Err(EthercatError::Slave(error)) => {
                log::warn!("{}: slave {} name is unreadable: {:?}", self.interface, position, error);
                None
                },
            Err(error) => return Err(error.map(|_| ())),
        };
        Ok(SlaveRecord {
            position,
            name: name.unwrap_or_else(|| format!("? M:{:08x} I:{:08x}", vendor, product)),
            vendor,
            product,
        })
    }

    /// end the session, releasing the network interface
    pub fn close(self) {
        log::debug!("{}: session closed", self.interface);
    }
}
