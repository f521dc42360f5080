mod common;

use std::time::Duration;

use common::*;
use usb_adfu::*;
use usbd_bulk_only_transport::{CommandStatus, Direction, Error as BulkOnlyTransportError, SetupPacket};
use usbd_scsi::BlockDevice;

fn read10(lba: u32, blocks: u16) -> [u8; 10] {
    let lba = lba.to_be_bytes();
    let blocks = blocks.to_be_bytes();
    [0x28, 0, lba[0], lba[1], lba[2], lba[3], 0, blocks[0], blocks[1], 0]
}

fn write10(lba: u32, blocks: u16) -> [u8; 10] {
    let mut cdb = read10(lba, blocks);
    cdb[0] = 0x2A;
    cdb
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

#[test]
fn inquiry_is_padded_to_the_announced_length() {
    let mut rig = Rig::new();
    let (data, csw) = rig.host.command_in(0, 512, &[0x12, 0, 0, 0x02, 0x00, 0]);
    assert_eq!(data[0], 0x00);
    assert_eq!(data[4], 31);
    assert_eq!(&data[8..16], b"Actions ");
    assert_eq!(&data[16..32], b"ADFU Storage    ");
    assert!(data[36..].iter().all(|&b| b == 0));
    assert_eq!(csw.status, CommandStatus::CommandOk);
    assert_eq!(csw.data_residue, 0);
}

#[test]
fn inquiry_ends_short_when_the_controller_can() {
    let mut rig = Rig::with(EngineConfig::default(), true);
    let tag = rig.host.send_cbw(0, 512, Direction::DeviceToHost, &[0x12, 0, 0, 0, 36, 0]);
    assert_eq!(rig.host.recv().len(), 36);
    let csw = rig.host.read_csw();
    assert_eq!(csw.tag, tag);
    assert_eq!(csw.status, CommandStatus::CommandOk);
    assert_eq!(csw.data_residue, 512 - 36);
}

#[test]
fn reply_on_a_packet_boundary_ends_with_a_zlp() {
    let mut rig = Rig::with(EngineConfig::default(), true);
    let tag = rig.host.send_cbw(0, 2 * BLOCK as u32, Direction::DeviceToHost, &read10(0, 1));
    assert_eq!(rig.host.recv().len(), BLOCK);
    assert!(rig.host.recv().is_empty());
    let csw = rig.host.read_csw();
    assert_eq!(csw.tag, tag);
    assert_eq!(csw.status, CommandStatus::CommandOk);
    assert_eq!(csw.data_residue, BLOCK as u32);
}

#[test]
fn short_data_stage_is_a_phase_error() {
    let mut rig = Rig::new();

    // one block write, but the host only announces half a block
    let tag = rig.host.send_cbw(0, 256, Direction::HostToDevice, &write10(4, 1));
    rig.host.send(&[0xAA; 256]);
    let csw = rig.host.read_csw();
    assert_eq!(csw.tag, tag);
    assert_eq!(csw.status, CommandStatus::PhaseError);
    assert_eq!(csw.data_residue, 256);
    // no partial block reaches the medium
    assert!(rig.disk.snapshot(4, 1).iter().all(|&b| b == 0));

    let (data, csw) = rig.host.command_in(0, 256, &read10(4, 1));
    assert_eq!(data.len(), 256);
    assert_eq!(csw.status, CommandStatus::PhaseError);
    // all 256 announced bytes went out
    assert_eq!(csw.data_residue, 0);
}

#[test]
fn direction_mismatch_is_a_phase_error() {
    let mut rig = Rig::new();
    let tag = rig.host.send_cbw(0, 512, Direction::HostToDevice, &read10(0, 1));
    rig.host.send(&[0u8; 512]);
    let csw = rig.host.read_csw();
    assert_eq!(csw.tag, tag);
    assert_eq!(csw.status, CommandStatus::PhaseError);
}

#[test]
fn write_then_read_back() {
    let mut rig = Rig::new();
    let data = pattern(3 * BLOCK, 7);
    let csw = rig.host.command_out(0, &write10(10, 3), &data);
    assert_eq!(csw.status, CommandStatus::CommandOk);
    assert_eq!(csw.data_residue, 0);
    assert_eq!(rig.disk.snapshot(10, 3), data);

    let (back, csw) = rig.host.command_in(0, data.len() as u32, &read10(10, 3));
    assert_eq!(csw.status, CommandStatus::CommandOk);
    assert_eq!(back, data);
}

#[test]
fn large_read_cycles_the_buffer_ring() {
    let mut rig = Rig::new();
    let data = pattern(64 * BLOCK, 3);
    let mut disk = rig.disk.clone();
    disk.write_blocks(0, &data).unwrap();

    let (back, csw) = rig.host.command_in(0, data.len() as u32, &read10(0, 64));
    assert_eq!(csw.status, CommandStatus::CommandOk);
    assert_eq!(csw.data_residue, 0);
    assert_eq!(back, data);

    wait_for("command count", || rig.engine.stats().commands >= 1);
    let stats = rig.engine.stats();
    assert!(stats.busy_high_water >= 1 && stats.busy_high_water <= DEFAULT_BUFFER_COUNT);
    assert_eq!(rig.host.state().violations, 0);
}

#[test]
fn large_write_cycles_the_buffer_ring() {
    let mut rig = Rig::new();
    let data = pattern(80 * BLOCK, 11);
    let csw = rig.host.command_out(0, &write10(100, 80), &data);
    assert_eq!(csw.status, CommandStatus::CommandOk);
    assert_eq!(rig.disk.snapshot(100, 80), data);
    assert_eq!(rig.host.state().violations, 0);
}

#[test]
fn read_past_the_end() {
    let mut rig = Rig::new();
    let (_, csw) = rig.host.command_in(0, 512, &read10(DISK_BLOCKS, 1));
    assert_eq!(csw.status, CommandStatus::CommandError);
    let sense = rig.host.request_sense(0);
    assert_eq!(sense[2], 0x05);
    assert_eq!(sense[12], 0x21);
}

#[test]
fn write_protected_unit_discards_the_data() {
    let mut rig = Rig::new();
    let csw = rig.host.command_out(1, &write10(0, 1), &[0x55; 512]);
    assert_eq!(csw.status, CommandStatus::CommandError);
    assert_eq!(csw.data_residue, 512);
    let sense = rig.host.request_sense(1);
    assert_eq!(sense[2], 0x07);
    assert_eq!(sense[12], 0x27);
}

#[test]
fn mode_select_is_refused_but_drained() {
    let mut rig = Rig::new();
    let csw = rig.host.command_out(0, &[0x55, 0x10, 0, 0, 0, 0, 0, 0x02, 0x00, 0], &[0u8; 512]);
    assert_eq!(csw.status, CommandStatus::CommandError);
    assert_eq!(csw.data_residue, 512);
    assert_eq!(rig.host.request_sense(0)[12], 0x20);
    // the pipe is still in step
    assert_eq!(rig.host.command(0, &[0x00, 0, 0, 0, 0, 0]).status, CommandStatus::CommandOk);
}

#[test]
fn unknown_op_code_is_rejected() {
    let mut rig = Rig::new();
    let csw = rig.host.command(0, &[0xA0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(csw.status, CommandStatus::CommandError);
    let sense = rig.host.request_sense(0);
    assert_eq!(sense[2], 0x05);
    assert_eq!(sense[12], 0x20);

    // reserved bits set in a known command
    let csw = rig.host.command(0, &[0x00, 0, 0, 0, 0, 0x40]);
    assert_eq!(csw.status, CommandStatus::CommandError);
    assert_eq!(rig.host.request_sense(0)[12], 0x24);
}

#[test]
fn missing_lun() {
    let mut rig = Rig::new();
    let csw = rig.host.command(5, &[0x00, 0, 0, 0, 0, 0]);
    assert_eq!(csw.status, CommandStatus::CommandError);

    let sense = rig.host.request_sense(5);
    assert_eq!(sense[12], 0x25);

    let (data, csw) = rig.host.command_in(5, 36, &[0x12, 0, 0, 0, 36, 0]);
    assert_eq!(data[0], 0x7F);
    assert_eq!(csw.status, CommandStatus::CommandOk);
}

#[test]
fn capacity_and_mode_sense() {
    let mut rig = Rig::new();
    let (data, csw) = rig.host.command_in(0, 8, &[0x25, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(csw.status, CommandStatus::CommandOk);
    assert_eq!(data, [0, 0, 0, 0xFF, 0, 0, 0x02, 0x00]);

    let (data, csw) = rig.host.command_in(0, 4, &[0x1A, 0, 0x3F, 0, 4, 0]);
    assert_eq!(csw.status, CommandStatus::CommandOk);
    assert_eq!(data[2] & 0x80, 0);

    let (data, csw) = rig.host.command_in(1, 4, &[0x1A, 0, 0x3F, 0, 4, 0]);
    assert_eq!(csw.status, CommandStatus::CommandOk);
    assert_eq!(data[2] & 0x80, 0x80);

    let csw = rig.host.command(0, &[0x2F, 0, 0, 0, 0, 0, 0, 0, 16, 0]);
    assert_eq!(csw.status, CommandStatus::CommandOk);
    let csw = rig.host.command(0, &[0x35, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(csw.status, CommandStatus::CommandOk);
}

#[test]
fn eject_honours_prevent_medium_removal() {
    let mut rig = Rig::new();
    let csw = rig.host.command(1, &[0x1E, 0, 0, 0, 1, 0]);
    assert_eq!(csw.status, CommandStatus::CommandOk);

    let csw = rig.host.command(1, &[0x1B, 0, 0, 0, 0x02, 0]);
    assert_eq!(csw.status, CommandStatus::CommandError);
    let sense = rig.host.request_sense(1);
    assert_eq!((sense[12], sense[13]), (0x53, 0x02));

    assert_eq!(rig.host.command(1, &[0x1E, 0, 0, 0, 0, 0]).status, CommandStatus::CommandOk);
    assert_eq!(rig.host.command(1, &[0x1B, 0, 0, 0, 0x02, 0]).status, CommandStatus::CommandOk);

    let csw = rig.host.command(1, &[0x00, 0, 0, 0, 0, 0]);
    assert_eq!(csw.status, CommandStatus::CommandError);
    let sense = rig.host.request_sense(1);
    assert_eq!(sense[2], 0x02);
    assert_eq!(sense[12], 0x3A);

    // the fixed unit can't be ejected at all
    assert_eq!(rig.host.command(0, &[0x1B, 0, 0, 0, 0x02, 0]).status, CommandStatus::CommandError);
}

#[test]
fn invalid_cbw_stalls_until_reset() {
    let mut rig = Rig::new();
    rig.host.send(&[0x42; 20]);
    wait_for("IN halt", || rig.host.state().in_halted);

    // ignored until reset recovery
    rig.host.send_cbw(0, 0, Direction::HostToDevice, &[0x00, 0, 0, 0, 0, 0]);
    rig.host.expect_silence(Duration::from_millis(200));

    rig.reset();
    assert!(!rig.host.state().in_halted);
    let csw = rig.host.command(0, &[0x00, 0, 0, 0, 0, 0]);
    assert_eq!(csw.status, CommandStatus::CommandError);
    assert_eq!(rig.host.command(0, &[0x00, 0, 0, 0, 0, 0]).status, CommandStatus::CommandOk);
}

#[test]
fn meaningless_cbw_stalls_both_pipes() {
    let mut rig = Rig::new();
    // LUN 16 doesn't fit the BOT LUN field
    rig.host.send_cbw(16, 0, Direction::HostToDevice, &[0x00, 0, 0, 0, 0, 0]);
    wait_for("halts", || {
        let state = rig.host.state();
        state.in_halted && state.out_halted
    });
}

#[test]
fn back_to_back_resets_report_one_unit_attention() {
    let mut rig = Rig::new();
    let setup = SetupPacket { request_type: 0x21, request: 0xFF, value: 0, index: 0, length: 0 };
    assert_eq!(rig.engine.class_request(&setup).unwrap(), Some(ControlResponse::Delayed));
    assert_eq!(rig.engine.class_request(&setup).unwrap(), Some(ControlResponse::Delayed));
    wait_for("reset handled", || rig.engine.state() != State::Reset && rig.host.state().acks >= 1);

    let csw = rig.host.command(0, &[0x00, 0, 0, 0, 0, 0]);
    assert_eq!(csw.status, CommandStatus::CommandError);
    let sense = rig.host.request_sense(0);
    assert_eq!(sense[2], 0x06);
    assert_eq!(sense[12], 0x29);

    assert_eq!(rig.host.command(0, &[0x00, 0, 0, 0, 0, 0]).status, CommandStatus::CommandOk);
    assert!(rig.engine.stats().pool_clean_after_exception);
}

#[test]
fn reset_during_the_data_stage() {
    let mut rig = Rig::new();
    rig.host.send_cbw(0, 8 * BLOCK as u32, Direction::HostToDevice, &write10(0, 8));
    wait_for("data stage", || rig.engine.state() == State::DataPhase);

    rig.reset();
    assert_eq!(rig.engine.state(), State::Idle);
    assert!(rig.engine.stats().pool_clean_after_exception);
    // the interrupted write gets no CSW
    rig.host.expect_silence(Duration::from_millis(50));

    let (_, csw) = rig.host.command_in(0, 36, &[0x12, 0, 0, 0, 36, 0]);
    assert_eq!(csw.status, CommandStatus::CommandOk);
    assert_eq!(rig.host.request_sense(0)[12], 0x29);
    assert_eq!(rig.host.command(0, &[0x00, 0, 0, 0, 0, 0]).status, CommandStatus::CommandOk);
    assert!(rig.disk.snapshot(0, 8).iter().all(|&b| b == 0));
}

#[test]
fn interface_change_during_the_data_stage() {
    let mut rig = Rig::new();
    rig.host.send_cbw(0, 8 * BLOCK as u32, Direction::HostToDevice, &write10(0, 8));
    wait_for("data stage", || rig.engine.state() == State::DataPhase);

    let handled = rig.engine.stats().exceptions_handled;
    rig.engine.set_interface();
    wait_for("interface change", || rig.engine.stats().exceptions_handled > handled);
    wait_for("endpoints back", || rig.host.state().enabled && rig.engine.state() == State::Idle);
    assert!(rig.engine.stats().pool_clean_after_exception);
    rig.host.expect_silence(Duration::from_millis(50));

    // no unit attention for an interface change
    assert_eq!(rig.host.command(0, &[0x00, 0, 0, 0, 0, 0]).status, CommandStatus::CommandOk);
    assert!(rig.disk.snapshot(0, 8).iter().all(|&b| b == 0));
}

#[test]
fn get_max_lun() {
    let rig = Rig::new();
    let setup = SetupPacket { request_type: 0xA1, request: 0xFE, value: 0, index: 0, length: 1 };
    assert_eq!(rig.engine.class_request(&setup).unwrap(), Some(ControlResponse::Data(vec![1])));

    let wrong_interface = SetupPacket { index: 3, ..setup };
    assert!(matches!(
        rig.engine.class_request(&wrong_interface),
        Err(Error::Transport(BulkOnlyTransportError::InvalidRequest))
    ));

    let standard = SetupPacket { request_type: 0x80, request: 0x06, value: 0x0100, index: 0, length: 18 };
    assert_eq!(rig.engine.class_request(&standard).unwrap(), None);
}

#[test]
fn deconfigure_and_unbind() {
    let mut rig = Rig::new();
    rig.engine.set_configuration(0);
    wait_for("deconfigure", || !rig.host.state().enabled);

    rig.engine.set_configuration(1);
    wait_for("reconfigure", || rig.host.state().enabled);
    assert_eq!(rig.host.command(0, &[0x00, 0, 0, 0, 0, 0]).status, CommandStatus::CommandOk);

    let Rig { engine, host, .. } = rig;
    engine.unbind().unwrap();
    assert!(!host.state().enabled);
}

#[test]
fn bind_rejects_bad_configs() {
    init();
    let parts = || Collaborators {
        endpoints: Box::new(NullEndpoints),
        luns: vec![LogicalUnit::new(Box::new(RamDisk::new(BLOCK, 8)), LunConfig::default())],
        ram: Box::new(RamRegions::new()),
        partitions: PartitionTable::default(),
        phase: Box::new(MemoryPhaseChannel::new()),
        power: Box::new(PowerLog::default()),
    };
    let config = EngineConfig { buffer_count: 1, ..Default::default() };
    assert!(matches!(Engine::bind(config, parts()), Err(Error::InvalidConfig(_))));
    let config = EngineConfig { buffer_bytes: 1000, ..Default::default() };
    assert!(matches!(Engine::bind(config, parts()), Err(Error::InvalidConfig(_))));
    let config = EngineConfig { adfu_lun: 3, ..Default::default() };
    assert!(matches!(Engine::bind(config, parts()), Err(Error::InvalidConfig(_))));
}

struct NullEndpoints;

impl UsbEndpoints for NullEndpoints {
    fn attach(&mut self, _sink: CompletionSink) {}
    fn enable(&mut self, _ep: Endpoint, _max_packet_size: usize) {}
    fn disable(&mut self, _ep: Endpoint) {}
    fn enqueue(&mut self, _ep: Endpoint, req: TransferRequest) -> Result<(), TransferRequest> {
        Err(req)
    }
    fn dequeue(&mut self, _ep: Endpoint, _slot: usize) {}
    fn set_halt(&mut self, _ep: Endpoint) {}
    fn clear_halt(&mut self, _ep: Endpoint) {}
    fn ack_control(&mut self) {}
}
