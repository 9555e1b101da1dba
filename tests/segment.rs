//! detection of slaves by the ethercat master, on a simulated segment

use std::{
    io,
    sync::{Arc, Mutex},
    collections::VecDeque,
    task::{Context, Poll},
    };
use ethercat_detect::{
    EthercatSocket, EthercatError, EthercatResult,
    MasterStack, SlaveRecord, ProbeResult, AttemptOutcome,
    master::{Master, STATION_ADDRESS_OFFSET},
    probe, DEFAULT_TIMEOUT,
    };


const BRD: u8 = 0x07;
const BWR: u8 = 0x08;
const APRD: u8 = 0x01;
const APWR: u8 = 0x02;
const FPRD: u8 = 0x04;
const FPWR: u8 = 0x05;

const SII_CONTROL: usize = 0x0502;
const SII_ADDRESS: usize = 0x0504;
const SII_DATA: usize = 0x0508;


/// an EtherCAT slave controller, with only the behaviors needed to identify it
struct Esc {
    memory: Vec<u8>,
    eeprom: Vec<u8>,
    /// reads 8 bytes per SII request instead of 4
    wide: bool,
    /// number of SII requests still to refuse
    nacks: usize,
}

impl Esc {
    fn new(eeprom: Vec<u8>, wide: bool) -> Self {
        let mut esc = Self {memory: vec![0; 0x1000], eeprom, wide, nacks: 0};
        // ESC type
        esc.memory[0] = 0x11;
        esc.update();
        esc
    }
    fn station(&self) -> u16 {
        u16::from_le_bytes([self.memory[0x10], self.memory[0x11]])
    }
    /// react to a write in the registers
    fn update(&mut self) {
        let mut control = u16::from_le_bytes([self.memory[SII_CONTROL], self.memory[SII_CONTROL+1]]);
        // read size is not writable
        control = (control & !0x0040) | if self.wide {0x0040} else {0};
        if control & 0x0100 != 0 {
            control &= !0x0100;
            if self.nacks > 0 {
                self.nacks -= 1;
                control |= 0x2000;
            }
            else {
                let word = u32::from_le_bytes(self.memory[SII_ADDRESS .. SII_ADDRESS+4].try_into().unwrap()) as usize;
                let size = if self.wide {8} else {4};
                for i in 0 .. 8 {
                    self.memory[SII_DATA + i] = if i < size {
                        // an erased EEPROM reads as ones
                        self.eeprom.get(word*2 + i).copied().unwrap_or(0xff)
                    } else {0};
                }
            }
        }
        self.memory[SII_CONTROL .. SII_CONTROL+2].copy_from_slice(&control.to_le_bytes());
    }
}

/// EEPROM content of a slave, with an optional device name
fn eeprom(vendor: u32, product: u32, name: Option<&str>) -> Vec<u8> {
    let mut image = vec![0; 0x40 * 2];
    image[0x10 .. 0x14].copy_from_slice(&vendor.to_le_bytes());
    image[0x14 .. 0x18].copy_from_slice(&product.to_le_bytes());
    fn category(image: &mut Vec<u8>, ty: u16, content: &[u8]) {
        image.extend_from_slice(&ty.to_le_bytes());
        image.extend_from_slice(&((content.len() / 2) as u16).to_le_bytes());
        image.extend_from_slice(content);
    }
    if let Some(name) = name {
        let mut general = vec![0; 32];
        general[3] = 2;
        category(&mut image, 30, &general);

        let mut strings = vec![2, 3, b'E', b'S', b'C', name.len() as u8];
        strings.extend_from_slice(name.as_bytes());
        if strings.len() % 2 != 0
            {strings.push(0)}
        category(&mut image, 10, &strings);
    }
    category(&mut image, 0xffff, &[]);
    image
}

/// slaves wired in a loop, processing frames as soon as they are sent
#[derive(Default)]
struct Bus {
    slaves: Vec<Esc>,
    returned: VecDeque<Vec<u8>>,
    /// working counter answered instead of the real one, like a faulty device would
    miscount: Option<u16>,
}

impl Bus {
    /// process every PDU of a frame, returns nothing if no slave is there to return the frame
    fn process(&mut self, frame: &[u8]) -> Option<Vec<u8>> {
        if self.slaves.is_empty()
            {return None}
        let mut frame = frame.to_vec();
        let mut offset = 2;
        loop {
            let command = frame[offset];
            let slave = u16::from_le_bytes([frame[offset+2], frame[offset+3]]);
            let memory = usize::from(u16::from_le_bytes([frame[offset+4], frame[offset+5]]));
            let flags = u16::from_le_bytes([frame[offset+6], frame[offset+7]]);
            let data = offset + 10 .. offset + 10 + usize::from(flags & 0x7ff);
            let registers = memory .. memory + data.len();

            let mut count = 0u16;
            let mut position = slave;
            for esc in self.slaves.iter_mut() {
                let addressed = match command {
                    BRD | BWR => true,
                    APRD | APWR => position == 0,
                    FPRD | FPWR => esc.station() == slave,
                    _ => false,
                };
                position = position.wrapping_add(1);
                if ! addressed
                    {continue}
                match command {
                    BRD => for (dst, src) in frame[data.clone()].iter_mut().zip(&esc.memory[registers.clone()]) {
                        *dst |= *src;
                    },
                    APRD | FPRD => frame[data.clone()].copy_from_slice(&esc.memory[registers.clone()]),
                    _ => {
                        esc.memory[registers.clone()].copy_from_slice(&frame[data.clone()]);
                        esc.update();
                    },
                }
                count += 1;
            }
            let count = self.miscount.unwrap_or(count);
            frame[data.end .. data.end+2].copy_from_slice(&count.to_le_bytes());

            if flags & 0x8000 == 0
                {break}
            offset = data.end + 2;
        }
        Some(frame)
    }
}

/// socket plugged on a simulated segment
#[derive(Clone, Default)]
struct Segment {
    bus: Arc<Mutex<Bus>>,
}

impl Segment {
    fn new(slaves: Vec<Esc>) -> Self {
        Self {bus: Arc::new(Mutex::new(Bus {slaves, .. Default::default()}))}
    }
    fn register(&self, slave: usize, address: usize) -> u8 {
        self.bus.lock().unwrap().slaves[slave].memory[address]
    }
}

impl EthercatSocket for Segment {
    fn poll_receive(&self, _cx: &mut Context<'_>, data: &mut [u8]) -> Poll<io::Result<usize>> {
        // a frame lost on the segment never comes back
        match self.bus.lock().unwrap().returned.pop_front() {
            Some(frame) => {
                data[.. frame.len()].copy_from_slice(&frame);
                Poll::Ready(Ok(frame.len()))
            },
            None => Poll::Pending,
        }
    }
    fn poll_send(&self, _cx: &mut Context<'_>, data: &[u8]) -> Poll<io::Result<()>> {
        let mut bus = self.bus.lock().unwrap();
        if let Some(frame) = bus.process(data) {
            bus.returned.push_back(frame);
        }
        Poll::Ready(Ok(()))
    }
    fn max_frame(&self) -> usize {1500}
}

/// master stack opening sessions on simulated segments
struct SimulatedStack {
    segments: Vec<(&'static str, Segment)>,
}

impl MasterStack for SimulatedStack {
    type Session = Master;

    async fn open(&self, interface: &str) -> EthercatResult<Master> {
        let (_, segment) = self.segments.iter()
            .find(|(name, _)| *name == interface)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such device"))?;
        Ok(Master::new(interface, segment.clone(), DEFAULT_TIMEOUT))
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

fn motor() -> Esc {
    Esc::new(eeprom(0x0000_07d1, 0x0000_2710, Some("Motor1")), true)
}


#[tokio::test]
async fn identify_slaves() {
    let coupler = Esc::new(eeprom(0x0000_0002, 0x044c_2c52, Some("EK1100")), false);
    let segment = Segment::new(vec![coupler, motor()]);
    let mut master = Master::new("sim0", segment.clone(), DEFAULT_TIMEOUT);

    assert_eq!(master.count().await.unwrap(), 2);
    assert_eq!(master.init().await.unwrap(), 2);
    // slaves are reset and addressed
    for slave in 0 .. 2 {
        assert_eq!(segment.register(slave, 0x0120), 0x11);
        assert_eq!(
            u16::from_le_bytes([segment.register(slave, 0x10), segment.register(slave, 0x11)]),
            STATION_ADDRESS_OFFSET + slave as u16);
    }

    assert_eq!(master.slaves().await.unwrap(), [
        SlaveRecord {position: 0, name: "EK1100".into(), vendor: 0x0000_0002, product: 0x044c_2c52},
        SlaveRecord {position: 1, name: "Motor1".into(), vendor: 0x0000_07d1, product: 0x0000_2710},
        ]);
    master.close();
}

#[tokio::test]
async fn unnamed_slave() {
    let segment = Segment::new(vec![Esc::new(eeprom(0x0000_07d1, 0x0000_2710, None), true)]);
    let mut master = Master::new("sim0", segment, DEFAULT_TIMEOUT);

    assert_eq!(master.init().await.unwrap(), 1);
    let slaves = master.slaves().await.unwrap();
    assert_eq!(slaves[0].name, "? M:000007d1 I:00002710");
    assert_eq!(slaves[0].vendor, 0x07d1);
}

#[tokio::test]
async fn blank_name() {
    let segment = Segment::new(vec![Esc::new(eeprom(0x0000_07d1, 0x0000_2710, Some("  ")), true)]);
    let mut master = Master::new("sim0", segment, DEFAULT_TIMEOUT);

    assert_eq!(master.init().await.unwrap(), 1);
    assert_eq!(master.slaves().await.unwrap()[0].name, "? M:000007d1 I:00002710");
}

#[tokio::test]
async fn unaddressable_count() {
    let segment = Segment::new(vec![motor()]);
    segment.bus.lock().unwrap().miscount = Some(0xf001);
    let mut master = Master::new("sim0", segment.clone(), DEFAULT_TIMEOUT);

    assert_eq!(master.count().await.unwrap(), 0xf001);
    assert!(matches!(master.init().await, Err(EthercatError::Protocol(_))));
    assert!(master.slaves().await.unwrap().is_empty());
    // nothing was written to the slaves
    assert_eq!(segment.register(0, 0x0120), 0);
    assert_eq!(segment.register(0, 0x10), 0);
}

#[tokio::test]
async fn refused_eeprom_reads() {
    // a few refusals are retried
    let mut esc = motor();
    esc.nacks = 2;
    let mut master = Master::new("sim0", Segment::new(vec![esc]), DEFAULT_TIMEOUT);
    master.init().await.unwrap();
    assert_eq!(master.slaves().await.unwrap()[0].name, "Motor1");

    // an unreadable EEPROM still lists the slave
    let mut esc = motor();
    esc.nacks = usize::MAX;
    let mut master = Master::new("sim0", Segment::new(vec![esc]), DEFAULT_TIMEOUT);
    master.init().await.unwrap();
    assert_eq!(master.slaves().await.unwrap(), [
        SlaveRecord {position: 0, name: "? M:00000000 I:00000000".into(), vendor: 0, product: 0},
        ]);
}

#[tokio::test(start_paused = true)]
async fn silent_segment() {
    let mut master = Master::new("sim0", Segment::default(), DEFAULT_TIMEOUT);
    assert_eq!(master.init().await.unwrap(), 0);
    assert!(master.slaves().await.unwrap().is_empty());
    // other commands than counting do report the lost frame
    assert!(matches!(
        master.raw().fprd(STATION_ADDRESS_OFFSET, ethercat_detect::registers::al::status).await,
        Err(EthercatError::Timeout(_))));
}

#[tokio::test(start_paused = true)]
async fn first_segment_with_slaves() {
    let stack = SimulatedStack {segments: vec![
        ("eth1", Segment::default()),
        ("eth2", Segment::new(vec![motor()])),
        ("eth3", Segment::new(vec![motor()])),
        ]};
    let mut attempts = Vec::new();
    let result = probe(&stack, ["eth0", "eth1", "eth2", "eth3"], |attempt| attempts.push(attempt.outcome.clone())).await;

    assert_eq!(result, ProbeResult::Selected {
        interface: "eth2".into(),
        slaves: vec![SlaveRecord {position: 0, name: "Motor1".into(), vendor: 0x0000_07d1, product: 0x0000_2710}],
        });
    assert_eq!(attempts.len(), 3);
    assert!(matches!(attempts[0], AttemptOutcome::Error(_)));
    assert_eq!(attempts[1], AttemptOutcome::NoSlaves);
}
