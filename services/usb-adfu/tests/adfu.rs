mod common;

use std::time::Duration;

use common::*;
use usb_adfu::*;
use usbd_bulk_only_transport::{CommandStatus, Direction};

const ADFU: u8 = 0xCC;
const UPGRADE_SUCCESS: u8 = 0xCD;

fn adfu(sub_op: u8, b2: u8, p1: u32, p2: u32) -> [u8; 12] {
    let mut cdb = [0u8; 12];
    cdb[0] = ADFU;
    cdb[1] = sub_op;
    cdb[2] = b2;
    cdb[3..7].copy_from_slice(&p1.to_be_bytes());
    cdb[7..11].copy_from_slice(&p2.to_be_bytes());
    cdb
}

fn access_ram(region: u8, offset: u32, length: u32) -> [u8; 12] {
    adfu(0x01, region, offset, length)
}

fn download(partition: u8, sector_offset: u32, sector_count: u32) -> [u8; 12] {
    adfu(0x02, partition, sector_offset, sector_count)
}

fn query(selector: u8, expected_crc: u32) -> [u8; 12] {
    adfu(0x03, selector, expected_crc, 0)
}

fn transfer_over(stage: u8) -> [u8; 12] {
    adfu(0x04, stage, 0, 0)
}

fn format(partition: u8) -> [u8; 12] {
    adfu(0x05, partition, 0, 0)
}

fn image(blocks: usize, seed: u8) -> Vec<u8> {
    (0..blocks * BLOCK).map(|i| (i as u8).wrapping_mul(13) ^ seed).collect()
}

/// Plays the userspace installer: waits for `seen`, then answers `reply`
fn installer(rig: &Rig, seen: &'static str, reply: &'static str) -> std::thread::JoinHandle<()> {
    let mut channel = rig.phase.clone();
    std::thread::spawn(move || {
        wait_for(seen, || channel.current() == seen);
        channel.write_phase(reply).unwrap();
    })
}

#[test]
fn download_then_checksum() {
    let mut rig = Rig::new();
    let data = image(4, 0x5A);

    // two downloads back to back make up one image
    let csw = rig.host.command_out(0, &download(1, 0, 2), &data[..2 * BLOCK]);
    assert_eq!(csw.status, CommandStatus::CommandOk);
    let csw = rig.host.command_out(0, &download(1, 2, 2), &data[2 * BLOCK..]);
    assert_eq!(csw.status, CommandStatus::CommandOk);
    assert_eq!(rig.phase.current(), "writing-phy");
    // partition 1 starts at LBA 80
    assert_eq!(rig.disk.snapshot(80, 4), data);

    let crc = crc::crc32::checksum_ieee(&data);
    let (response, csw) = rig.host.command_in(0, 8, &query(0x02, crc));
    assert_eq!(csw.status, CommandStatus::CommandOk);
    assert_eq!(response[0], 0);
    assert_eq!(response[1], 0x02);
    assert_eq!(u32::from_be_bytes([response[4], response[5], response[6], response[7]]), crc);
}

#[test]
fn checksum_mismatch_fails_the_install() {
    let mut rig = Rig::new();
    let data = image(2, 0x11);
    assert_eq!(rig.host.command_out(0, &download(0, 0, 2), &data).status, CommandStatus::CommandOk);

    let crc = crc::crc32::checksum_ieee(&data);
    let (response, csw) = rig.host.command_in(0, 8, &query(0x02, !crc));
    // the response still carries what we computed
    assert_eq!(response[0], 1);
    assert_eq!(u32::from_be_bytes([response[4], response[5], response[6], response[7]]), crc);
    assert_eq!(csw.status, CommandStatus::CommandError);
    assert_eq!(rig.phase.current(), "failed");

    let sense = rig.host.request_sense(0);
    assert_eq!(sense[2], 0x0E);
    assert_eq!(sense[12], 0x1D);
}

#[test]
fn checksum_without_an_image() {
    let mut rig = Rig::new();
    let (response, csw) = rig.host.command_in(0, 8, &query(0x02, 0));
    assert_eq!(response[0], 1);
    assert_eq!(csw.status, CommandStatus::CommandError);
}

#[test]
fn consistent_partition_table() {
    let mut rig = Rig::new();
    let (response, csw) = rig.host.command_in(0, 8, &query(0x01, 0));
    assert_eq!(csw.status, CommandStatus::CommandOk);
    assert_eq!(response, [0, 0x01, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn short_download_aborts_bulk_out() {
    let mut rig = Rig::new();
    let data = image(4, 0x77);

    let tag = rig.host.send_cbw(0, 2048, Direction::HostToDevice, &download(0, 0, 4));
    rig.host.send(&data[..1000]);
    let csw = rig.host.read_csw();
    assert_eq!(csw.tag, tag);
    assert_eq!(csw.status, CommandStatus::CommandError);
    assert_eq!(csw.data_residue, 2048 - 512);
    assert!(rig.engine.stats().pool_clean_after_exception);
    // the installer hears about it too
    assert_eq!(rig.phase.current(), "failed");

    // the whole first block made it, nothing after it did
    assert_eq!(rig.disk.snapshot(16, 1), data[..BLOCK]);
    assert!(rig.disk.snapshot(17, 3).iter().all(|&b| b == 0));

    let sense = rig.host.request_sense(0);
    assert_eq!(sense[2], 0x04);
    assert_eq!(sense[12], 0x08);
    assert_eq!(rig.host.command(0, &[0x00, 0, 0, 0, 0, 0]).status, CommandStatus::CommandOk);
}

#[test]
fn short_ram_stage_fails_the_install() {
    let mut rig = Rig::new();
    let tag = rig.host.send_cbw(0, 1024, Direction::HostToDevice, &access_ram(1, 0, 1024));
    rig.host.send(&[0x3C; 100]);
    let csw = rig.host.read_csw();
    assert_eq!(csw.tag, tag);
    assert_eq!(csw.status, CommandStatus::CommandError);
    assert_eq!(rig.phase.current(), "failed");
}

#[test]
fn download_to_unknown_partition() {
    let mut rig = Rig::new();
    let csw = rig.host.command_out(0, &download(9, 0, 1), &[0xEE; BLOCK]);
    assert_eq!(csw.status, CommandStatus::CommandError);
    assert_eq!(csw.data_residue, BLOCK as u32);
    assert_eq!(rig.phase.current(), "failed");
    assert_eq!(rig.host.request_sense(0)[12], 0x24);
}

#[test]
fn download_past_the_partition() {
    let mut rig = Rig::new();
    // partition 0 is 64 blocks long
    let csw = rig.host.command_out(0, &download(0, 63, 2), &image(2, 0));
    assert_eq!(csw.status, CommandStatus::CommandError);
    assert_eq!(rig.host.request_sense(0)[12], 0x21);
    assert!(rig.disk.snapshot(79, 1).iter().all(|&b| b == 0));
}

#[test]
fn stage_a_blob_in_ram() {
    let mut rig = Rig::new();
    let blob: Vec<u8> = (0..64u8).collect();
    let csw = rig.host.command_out(0, &access_ram(1, 0x100, 64), &blob);
    assert_eq!(csw.status, CommandStatus::CommandOk);
    assert_eq!(csw.data_residue, 0);
    assert_eq!(rig.phase.current(), "flashing");

    let region = rig.ram.contents(1).unwrap();
    assert_eq!(&region[0x100..0x140], &blob[..]);
    assert!(region[..0x100].iter().all(|&b| b == 0));
}

#[test]
fn stage_into_a_missing_region() {
    let mut rig = Rig::new();
    let csw = rig.host.command_out(0, &access_ram(9, 0, 64), &[1u8; 64]);
    assert_eq!(csw.status, CommandStatus::CommandError);
    assert_eq!(rig.phase.current(), "failed");
}

#[test]
fn transfer_over_stages() {
    let mut rig = Rig::new();
    assert_eq!(rig.host.command(0, &transfer_over(0)).status, CommandStatus::CommandOk);
    assert_eq!(rig.phase.current(), "flash-done");
    assert_eq!(rig.host.command(0, &transfer_over(1)).status, CommandStatus::CommandOk);
    assert_eq!(rig.phase.current(), "write-done");

    let installer = installer(&rig, "finished", "finished-ok");
    assert_eq!(rig.host.command(0, &transfer_over(2)).status, CommandStatus::CommandOk);
    installer.join().unwrap();
    assert_eq!(rig.phase.current(), "finished-ok");

    // unknown stage
    assert_eq!(rig.host.command(0, &transfer_over(7)).status, CommandStatus::CommandError);
}

#[test]
fn format_waits_for_the_installer() {
    let mut rig = Rig::new();
    let installer = installer(&rig, "formatting", "format-done");
    assert_eq!(rig.host.command(0, &format(1)).status, CommandStatus::CommandOk);
    installer.join().unwrap();
}

#[test]
fn format_reported_failed() {
    let mut rig = Rig::new();
    let installer = installer(&rig, "formatting", "failed");
    assert_eq!(rig.host.command(0, &format(1)).status, CommandStatus::CommandError);
    installer.join().unwrap();
    let sense = rig.host.request_sense(0);
    assert_eq!(sense[2], 0x03);
    assert_eq!(sense[12], 0x31);
}

#[test]
fn installer_never_answers() {
    let config = EngineConfig {
        phase_timeout: Duration::from_millis(100),
        phase_poll_interval: Duration::from_millis(10),
        ..Default::default()
    };
    let mut rig = Rig::with(config, false);
    assert_eq!(rig.host.command(0, &format(0)).status, CommandStatus::CommandError);
    assert_eq!(rig.phase.current(), "failed");
    let sense = rig.host.request_sense(0);
    assert_eq!(sense[2], 0x04);
    assert_eq!((sense[12], sense[13]), (0x08, 0x01));
}

#[test]
fn disconnect_while_waiting_for_the_installer() {
    let mut rig = Rig::new();
    rig.host.send_cbw(0, 0, Direction::HostToDevice, &format(1));
    wait_for("formatting", || rig.phase.current() == "formatting");

    rig.engine.disconnect();
    wait_for("disconnect", || !rig.host.state().enabled && rig.engine.state() == State::Idle);
    // the format never completes, so no CSW for it
    rig.host.expect_silence(Duration::from_millis(50));
    assert_eq!(rig.phase.current(), "formatting");
    assert!(rig.engine.stats().pool_clean_after_exception);

    let handled = rig.engine.stats().exceptions_handled;
    rig.engine.set_configuration(1);
    wait_for("reconfigured", || rig.engine.stats().exceptions_handled > handled && rig.host.state().enabled);
    assert_eq!(rig.host.command(0, &[0x00, 0, 0, 0, 0, 0]).status, CommandStatus::CommandOk);
}

#[test]
fn reset_while_waiting_for_the_installer() {
    let mut rig = Rig::new();
    rig.host.send_cbw(0, 0, Direction::HostToDevice, &transfer_over(2));
    wait_for("finished", || rig.phase.current() == "finished");

    rig.reset();
    rig.host.expect_silence(Duration::from_millis(50));
    let (_, csw) = rig.host.command_in(0, 36, &[0x12, 0, 0, 0, 36, 0]);
    assert_eq!(csw.status, CommandStatus::CommandOk);
    assert_eq!(rig.host.request_sense(0)[12], 0x29);
}

#[test]
fn vendor_commands_only_on_the_adfu_unit() {
    let mut rig = Rig::new();
    let csw = rig.host.command(1, &transfer_over(0));
    assert_eq!(csw.status, CommandStatus::CommandError);
    let sense = rig.host.request_sense(1);
    assert_eq!(sense[2], 0x05);
    assert_eq!(sense[12], 0x20);
    assert_eq!(rig.phase.current(), "start");
}

#[test]
fn reboot_once_after_a_successful_upgrade() {
    let mut rig = Rig::new();
    let mut cdb = [0u8; 12];
    cdb[0] = UPGRADE_SUCCESS;
    assert_eq!(rig.host.command(0, &cdb).status, CommandStatus::CommandOk);
    assert!(rig.engine.upgrade_latched());

    rig.engine.disconnect();
    wait_for("post upgrade action", || rig.engine.stats().post_upgrade_actions == 1);
    assert_eq!(*rig.power.reboots.lock().unwrap(), 1);
    assert!(!rig.engine.upgrade_latched());

    let handled = rig.engine.stats().exceptions_handled;
    rig.engine.disconnect();
    wait_for("second disconnect", || rig.engine.stats().exceptions_handled > handled);
    assert_eq!(*rig.power.reboots.lock().unwrap(), 1);
    assert_eq!(*rig.power.halts.lock().unwrap(), 0);
    assert_eq!(rig.engine.stats().post_upgrade_actions, 1);
}

#[test]
fn halt_after_a_successful_upgrade() {
    let config = EngineConfig { post_upgrade_action: PostUpgradeAction::Halt, ..Default::default() };
    let mut rig = Rig::with(config, false);
    let mut cdb = [0u8; 12];
    cdb[0] = UPGRADE_SUCCESS;
    assert_eq!(rig.host.command(0, &cdb).status, CommandStatus::CommandOk);

    rig.engine.disconnect();
    wait_for("post upgrade action", || rig.engine.stats().post_upgrade_actions == 1);
    assert_eq!(*rig.power.halts.lock().unwrap(), 1);
    assert_eq!(*rig.power.reboots.lock().unwrap(), 0);
}

#[test]
fn disconnect_without_an_upgrade_does_nothing() {
    let rig = Rig::new();
    rig.engine.disconnect();
    wait_for("disconnect", || !rig.host.state().enabled);
    wait_for("idle", || rig.engine.state() == State::Idle);
    assert_eq!(*rig.power.reboots.lock().unwrap(), 0);
    assert_eq!(rig.engine.stats().post_upgrade_actions, 0);
}
