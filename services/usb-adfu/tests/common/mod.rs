#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use usb_adfu::*;
use usbd_bulk_only_transport::{CommandBlockWrapper, CommandStatusWrapper, Direction, SetupPacket};

pub const BLOCK: usize = 512;
pub const DISK_BLOCKS: u32 = 256;
const WAIT: Duration = Duration::from_secs(5);

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
pub struct MockState {
    sink: Option<CompletionSink>,
    /// What the host has put on the wire and no OUT request took yet
    host_out: VecDeque<Vec<u8>>,
    pending_out: VecDeque<TransferRequest>,
    outstanding: HashSet<(Endpoint, usize)>,
    pub enabled: bool,
    pub in_halted: bool,
    pub out_halted: bool,
    pub acks: usize,
    /// A slot that got a second request while the first was outstanding
    pub violations: usize,
    pub short_in: bool,
}

impl MockState {
    fn complete(&mut self, ep: Endpoint, req: TransferRequest, actual: usize, status: TransferStatus) {
        self.outstanding.remove(&(ep, req.slot));
        if let Some(sink) = self.sink.as_ref() {
            sink.complete(Completion { ep, slot: req.slot, buf: req.buf, actual, status });
        }
    }

    /// Each host chunk ends the OUT request it lands in; a longer chunk
    /// spills into the next request
    fn pump(&mut self) {
        while !self.pending_out.is_empty() && !self.host_out.is_empty() {
            let mut req = self.pending_out.pop_front().unwrap();
            let mut chunk = self.host_out.pop_front().unwrap();
            let n = chunk.len().min(req.length);
            req.buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.host_out.push_front(chunk.split_off(n));
            }
            self.complete(Endpoint::BulkOut, req, n, TransferStatus::Complete);
        }
    }
}

/// Endpoint layer that plays the host side of the wire
pub struct MockEndpoints {
    state: Arc<Mutex<MockState>>,
    to_host: Sender<Vec<u8>>,
}

impl UsbEndpoints for MockEndpoints {
    fn attach(&mut self, sink: CompletionSink) {
        self.state.lock().unwrap().sink = Some(sink);
    }

    fn enable(&mut self, _ep: Endpoint, max_packet_size: usize) {
        assert_eq!(max_packet_size, 512);
        self.state.lock().unwrap().enabled = true;
    }

    fn disable(&mut self, _ep: Endpoint) {
        self.state.lock().unwrap().enabled = false;
    }

    fn enqueue(&mut self, ep: Endpoint, req: TransferRequest) -> Result<(), TransferRequest> {
        let mut state = self.state.lock().unwrap();
        if !state.outstanding.insert((ep, req.slot)) {
            state.violations += 1;
        }
        match ep {
            Endpoint::BulkIn => {
                let length = req.length;
                self.to_host.send(req.buf[..length].to_vec()).unwrap();
                if req.zero && length % 512 == 0 {
                    self.to_host.send(Vec::new()).unwrap();
                }
                state.complete(ep, req, length, TransferStatus::Complete);
            }
            Endpoint::BulkOut => {
                assert_eq!(req.length % 512, 0, "OUT requests are whole packets");
                state.pending_out.push_back(req);
                state.pump();
            }
        }
        Ok(())
    }

    fn dequeue(&mut self, ep: Endpoint, slot: usize) {
        let mut state = self.state.lock().unwrap();
        if ep == Endpoint::BulkOut {
            if let Some(pos) = state.pending_out.iter().position(|r| r.slot == slot) {
                let req = state.pending_out.remove(pos).unwrap();
                state.complete(ep, req, 0, TransferStatus::Cancelled);
            }
        }
    }

    fn set_halt(&mut self, ep: Endpoint) {
        let mut state = self.state.lock().unwrap();
        match ep {
            Endpoint::BulkIn => state.in_halted = true,
            Endpoint::BulkOut => state.out_halted = true,
        }
    }

    fn clear_halt(&mut self, ep: Endpoint) {
        let mut state = self.state.lock().unwrap();
        match ep {
            Endpoint::BulkIn => state.in_halted = false,
            Endpoint::BulkOut => state.out_halted = false,
        }
    }

    fn supports_short_in(&self) -> bool {
        self.state.lock().unwrap().short_in
    }

    fn ack_control(&mut self) {
        self.state.lock().unwrap().acks += 1;
    }
}

#[derive(Clone, Default)]
pub struct PowerLog {
    pub halts: Arc<Mutex<usize>>,
    pub reboots: Arc<Mutex<usize>>,
}

impl PowerControl for PowerLog {
    fn halt(&mut self) {
        *self.halts.lock().unwrap() += 1;
    }

    fn reboot(&mut self) {
        *self.reboots.lock().unwrap() += 1;
    }
}

/// The host end of the bulk pipes
pub struct Host {
    state: Arc<Mutex<MockState>>,
    from_device: Receiver<Vec<u8>>,
    next_tag: u32,
}

impl Host {
    pub fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn send(&self, bytes: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.host_out.push_back(bytes.to_vec());
        state.pump();
    }

    /// Send a CBW and return its tag
    pub fn send_cbw(&mut self, lun: u8, data_transfer_length: u32, direction: Direction, cdb: &[u8]) -> u32 {
        self.next_tag += 1;
        let mut data = [0u8; 16];
        data[..cdb.len()].copy_from_slice(cdb);
        let cbw = CommandBlockWrapper {
            tag: self.next_tag,
            data_transfer_length,
            direction,
            lun,
            data_length: cdb.len() as u8,
            data,
        };
        self.send(&cbw.pack());
        self.next_tag
    }

    pub fn recv(&self) -> Vec<u8> {
        self.from_device.recv_timeout(WAIT).expect("device went quiet")
    }

    /// Collect exactly `n` bytes of IN data
    pub fn read_data(&self, n: usize) -> Vec<u8> {
        let mut data = Vec::new();
        while data.len() < n {
            data.extend(self.recv());
        }
        assert_eq!(data.len(), n, "IN data overran the data stage");
        data
    }

    pub fn read_csw(&self) -> CommandStatusWrapper {
        let mut bytes = self.recv();
        // a zero length packet that ended the data stage
        while bytes.is_empty() {
            bytes = self.recv();
        }
        CommandStatusWrapper::parse(&bytes).expect("not a CSW")
    }

    /// Nothing arrives on IN for `d`
    pub fn expect_silence(&self, d: Duration) {
        if let Ok(bytes) = self.from_device.recv_timeout(d) {
            panic!("unexpected {} bytes from the device", bytes.len());
        }
    }

    /// Run a command with no data stage
    pub fn command(&mut self, lun: u8, cdb: &[u8]) -> CommandStatusWrapper {
        let tag = self.send_cbw(lun, 0, Direction::HostToDevice, cdb);
        let csw = self.read_csw();
        assert_eq!(csw.tag, tag);
        csw
    }

    /// Run a command that returns `n` bytes
    pub fn command_in(&mut self, lun: u8, n: u32, cdb: &[u8]) -> (Vec<u8>, CommandStatusWrapper) {
        let tag = self.send_cbw(lun, n, Direction::DeviceToHost, cdb);
        let data = self.read_data(n as usize);
        let csw = self.read_csw();
        assert_eq!(csw.tag, tag);
        (data, csw)
    }

    /// Run a command that sends `data`
    pub fn command_out(&mut self, lun: u8, cdb: &[u8], data: &[u8]) -> CommandStatusWrapper {
        let tag = self.send_cbw(lun, data.len() as u32, Direction::HostToDevice, cdb);
        self.send(data);
        let csw = self.read_csw();
        assert_eq!(csw.tag, tag);
        csw
    }

    pub fn request_sense(&mut self, lun: u8) -> Vec<u8> {
        let (sense, csw) = self.command_in(lun, 18, &[0x03, 0, 0, 0, 18, 0]);
        assert_eq!(csw.status, usbd_bulk_only_transport::CommandStatus::CommandOk);
        sense
    }
}

pub fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let start = Instant::now();
    while !cond() {
        assert!(start.elapsed() < WAIT, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(2));
    }
}

pub fn partitions() -> PartitionTable {
    PartitionTable::new(vec![
        Partition { index: 0, start_lba: 16, blocks: 64 },
        Partition { index: 1, start_lba: 80, blocks: 128 },
    ])
}

pub struct Rig {
    pub engine: Engine,
    pub host: Host,
    pub disk: RamDisk,
    pub ram: RamRegions,
    pub phase: MemoryPhaseChannel,
    pub power: PowerLog,
}

impl Rig {
    pub fn new() -> Rig {
        Rig::with(EngineConfig::default(), false)
    }

    /// A bound and configured engine: LUN 0 is the ADFU disk, LUN 1 a small
    /// read-only removable unit
    pub fn with(config: EngineConfig, short_in: bool) -> Rig {
        init();
        let state = Arc::new(Mutex::new(MockState { short_in, ..Default::default() }));
        let (to_host, from_device) = unbounded();
        let disk = RamDisk::new(BLOCK, DISK_BLOCKS);
        let ram = RamRegions::new();
        ram.add_region(1, 4096);
        let phase = MemoryPhaseChannel::new();
        let power = PowerLog::default();

        let luns = vec![
            LogicalUnit::new(Box::new(disk.clone()), LunConfig::default()),
            LogicalUnit::new(
                Box::new(RamDisk::new(BLOCK, 16)),
                LunConfig { read_only: true, removable: true },
            ),
        ];
        let parts = Collaborators {
            endpoints: Box::new(MockEndpoints { state: state.clone(), to_host }),
            luns,
            ram: Box::new(ram.clone()),
            partitions: partitions(),
            phase: Box::new(phase.clone()),
            power: Box::new(power.clone()),
        };
        let engine = Engine::bind(config, parts).expect("bind");
        engine.set_configuration(1);
        let host = Host { state, from_device, next_tag: 0 };
        wait_for("configuration", || host.state().enabled && engine.state() == State::Idle);
        Rig { engine, host, disk, ram, phase, power }
    }

    pub fn reset(&mut self) {
        let acks = self.host.state().acks;
        let setup = SetupPacket { request_type: 0x21, request: 0xFF, value: 0, index: 0, length: 0 };
        assert_eq!(self.engine.class_request(&setup).unwrap(), Some(ControlResponse::Delayed));
        wait_for("reset ack", || self.host.state().acks > acks);
    }
}
