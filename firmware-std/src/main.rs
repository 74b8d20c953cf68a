//! airprox: ESP-IDF std firmware
//!
//! Joins the network named at build time (`AIRPROX_SSID`,
//! `AIRPROX_PASSWORD`) as a station, then listens promiscuously on the AP's
//! channel. Driver callbacks are forwarded into one shared `Sniffer`; its
//! events stream out as NDJSON on the console and host commands are read
//! back from stdin.

mod arp;

use std::io::Read;
use std::net::Ipv4Addr;
use std::sync::mpsc::{self, SyncSender};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use airprox::comm::{self, LineReader};
use airprox::frame::{Capture, FrameKind};
use airprox::protocol::{DeviceMessage, MsgBuffer, MAX_MSG_LEN, VERSION};
use airprox::{Config, Event, MacAddr, Sniffer};
use anyhow::{anyhow, Context};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::sys::{
    esp, esp_wifi_set_promiscuous, esp_wifi_set_promiscuous_filter, esp_wifi_set_promiscuous_rx_cb,
    esp_wifi_sta_get_ap_info, wifi_ap_record_t, wifi_promiscuous_filter_t, wifi_promiscuous_pkt_t,
    wifi_promiscuous_pkt_type_t, wifi_promiscuous_pkt_type_t_WIFI_PKT_CTRL,
    wifi_promiscuous_pkt_type_t_WIFI_PKT_DATA, wifi_promiscuous_pkt_type_t_WIFI_PKT_MGMT,
    WIFI_PROMIS_FILTER_MASK_CTRL, WIFI_PROMIS_FILTER_MASK_DATA, WIFI_PROMIS_FILTER_MASK_MGMT,
};
use esp_idf_svc::wifi::{BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs::EspDefaultNvsPartition};

use crate::arp::EspArpTable;

const SSID: &str = match option_env!("AIRPROX_SSID") {
    Some(s) => s,
    None => "",
};
const PASSWORD: &str = match option_env!("AIRPROX_PASSWORD") {
    Some(s) => s,
    None => "",
};

/// Proximity timeout sweep and ARP re-probe cadence
const POLL_INTERVAL_MS: u64 = 100;

type FirmwareSniffer = Sniffer<EspArpTable, 32>;

// ── Shared state ─────────────────────────────────────────────────────

static SNIFFER: Mutex<Option<FirmwareSniffer>> = Mutex::new(None);

/// Serialized NDJSON lines on their way to the console
static OUTPUT_TX: Mutex<Option<SyncSender<MsgBuffer>>> = Mutex::new(None);

/// Station address once DHCP has completed
pub(crate) static STATION_IP: Mutex<Option<Ipv4Addr>> = Mutex::new(None);

/// Boot time, captured once in main, used for uptime calculation.
static BOOT_INSTANT: Mutex<Option<Instant>> = Mutex::new(None);

fn uptime_millis() -> u64 {
    BOOT_INSTANT
        .lock()
        .ok()
        .and_then(|i| i.map(|boot| boot.elapsed().as_millis() as u64))
        .unwrap_or(0)
}

fn uptime_secs() -> u32 {
    (uptime_millis() / 1000) as u32
}

fn send(msg: &DeviceMessage) {
    let mut buf = MsgBuffer::new();
    buf.resize_default(MAX_MSG_LEN).ok();
    if let Some(len) = comm::serialize_message(msg, &mut buf) {
        buf.truncate(len);
        if let Ok(guard) = OUTPUT_TX.lock() {
            if let Some(ref tx) = *guard {
                let _ = tx.try_send(buf);
            }
        }
    }
}

/// Event sink shared by every sniffer entry point.
fn emit(event: Event<'_>) {
    let ts = (uptime_millis() & 0xFFFF_FFFF) as u32;
    send(&DeviceMessage::from_event(event, ts));
}

// ── Driver callbacks ─────────────────────────────────────────────────

/// WiFi promiscuous mode callback.
///
/// Runs in the WiFi driver task and must not block: if the poll or command
/// thread holds the sniffer, the frame is dropped.
unsafe extern "C" fn promisc_rx_cb(buf: *mut std::ffi::c_void, pkt_type: wifi_promiscuous_pkt_type_t) {
    let pkt = unsafe { &*(buf as *const wifi_promiscuous_pkt_t) };
    let rssi = pkt.rx_ctrl.rssi() as i8;
    let channel = pkt.rx_ctrl.channel() as u8;
    let sig_len = pkt.rx_ctrl.sig_len() as usize;

    #[allow(non_upper_case_globals)]
    let kind = match pkt_type {
        wifi_promiscuous_pkt_type_t_WIFI_PKT_MGMT => FrameKind::Management,
        wifi_promiscuous_pkt_type_t_WIFI_PKT_CTRL => FrameKind::Control,
        wifi_promiscuous_pkt_type_t_WIFI_PKT_DATA => FrameKind::Data,
        _ => FrameKind::Misc,
    };

    // Safety: payload is `sig_len` bytes starting at pkt.payload
    let payload = unsafe { std::slice::from_raw_parts(pkt.payload.as_ptr(), sig_len) };
    let capture = Capture::new(kind, payload, rssi, channel);

    if let Ok(mut guard) = SNIFFER.try_lock() {
        if let Some(sniffer) = guard.as_mut() {
            sniffer.on_frame(&capture, uptime_millis(), &mut emit);
        }
    }
}

#[cfg(feature = "csi")]
unsafe extern "C" fn csi_rx_cb(_ctx: *mut std::ffi::c_void, info: *mut esp_idf_svc::sys::wifi_csi_info_t) {
    if info.is_null() {
        return;
    }
    let info = unsafe { &*info };
    if info.buf.is_null() {
        return;
    }
    // Safety: the driver hands over `len` signed bytes at `buf`
    let data = unsafe { std::slice::from_raw_parts(info.buf as *const i8, info.len as usize) };

    if let Ok(mut guard) = SNIFFER.try_lock() {
        if let Some(sniffer) = guard.as_mut() {
            sniffer.on_channel_sample(
                MacAddr(info.mac),
                info.rx_ctrl.rssi() as i8,
                info.rx_ctrl.channel() as u8,
                data,
                &mut emit,
            );
        }
    }
}

#[cfg(feature = "csi")]
fn enable_csi() -> anyhow::Result<()> {
    use esp_idf_svc::sys::{esp_wifi_set_csi, esp_wifi_set_csi_config, esp_wifi_set_csi_rx_cb, wifi_csi_config_t};

    let config = wifi_csi_config_t {
        lltf_en: true,
        htltf_en: true,
        stbc_htltf2_en: true,
        ltf_merge_en: true,
        channel_filter_en: true,
        manu_scale: false,
        shift: 0,
        ..Default::default()
    };
    unsafe {
        esp!(esp_wifi_set_csi_config(&config))?;
        esp!(esp_wifi_set_csi_rx_cb(Some(csi_rx_cb), std::ptr::null_mut()))?;
        esp!(esp_wifi_set_csi(true))?;
    }
    log::info!("CSI capture enabled");
    Ok(())
}

/// BSSID of the access point we are associated with.
fn ap_bssid() -> anyhow::Result<MacAddr> {
    let mut record = wifi_ap_record_t::default();
    unsafe {
        esp!(esp_wifi_sta_get_ap_info(&mut record))?;
    }
    Ok(MacAddr(record.bssid))
}

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    // Bind the ESP-IDF logger to the `log` facade
    esp_idf_svc::log::EspLogger::initialize_default();

    if let Ok(mut boot) = BOOT_INSTANT.lock() {
        *boot = Some(Instant::now());
    }

    log::info!("airprox v{} starting (std)", VERSION);

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // ── Station join ─────────────────────────────────────────────────

    let mut wifi = BlockingWifi::wrap(EspWifi::new(peripherals.modem, sys_loop.clone(), Some(nvs))?, sys_loop)?;
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: SSID.try_into().map_err(|_| anyhow!("SSID too long"))?,
        password: PASSWORD.try_into().map_err(|_| anyhow!("password too long"))?,
        ..Default::default()
    }))?;
    wifi.start()?;
    wifi.connect().context("joining network")?;
    wifi.wait_netif_up()?;

    let ip_info = wifi.wifi().sta_netif().get_ip_info()?;
    if let Ok(mut ip) = STATION_IP.lock() {
        *ip = Some(ip_info.ip);
    }
    let bssid = ap_bssid()?;
    log::info!("Joined {} as {}, bssid {}", SSID, ip_info.ip, bssid);

    // ── Sniffer ──────────────────────────────────────────────────────

    let config = Config::new().with_local_bssid(bssid).with_arp_resolution(true);
    let mut sniffer: FirmwareSniffer = Sniffer::new(config, EspArpTable);
    // Blocking ARP scan before any frame is accepted
    if !sniffer.begin(|ms| thread::sleep(Duration::from_millis(ms as u64))) {
        log::warn!("ARP scan skipped, devices will carry no IP");
    }
    *SNIFFER.lock().map_err(|_| anyhow!("sniffer lock poisoned"))? = Some(sniffer);

    // ── Output thread ────────────────────────────────────────────────

    let (output_tx, output_rx) = mpsc::sync_channel::<MsgBuffer>(16);
    *OUTPUT_TX.lock().map_err(|_| anyhow!("output lock poisoned"))? = Some(output_tx);

    thread::Builder::new()
        .name("output".into())
        .stack_size(4096)
        .spawn(move || output_thread(output_rx))?;
    log::info!("Output thread spawned");

    // ── Command thread ───────────────────────────────────────────────

    thread::Builder::new()
        .name("command".into())
        .stack_size(4096)
        .spawn(command_thread)?;
    log::info!("Command thread spawned");

    // ── Status thread ────────────────────────────────────────────────

    thread::Builder::new()
        .name("status".into())
        .stack_size(4096)
        .spawn(status_thread)?;
    log::info!("Status thread spawned");

    // ── Capture ──────────────────────────────────────────────────────

    let filter = wifi_promiscuous_filter_t {
        filter_mask: WIFI_PROMIS_FILTER_MASK_MGMT | WIFI_PROMIS_FILTER_MASK_CTRL | WIFI_PROMIS_FILTER_MASK_DATA,
    };
    unsafe {
        esp!(esp_wifi_set_promiscuous_filter(&filter))?;
        esp!(esp_wifi_set_promiscuous_rx_cb(Some(promisc_rx_cb)))?;
        esp!(esp_wifi_set_promiscuous(true))?;
    }
    log::info!("Promiscuous capture enabled");

    #[cfg(feature = "csi")]
    enable_csi()?;

    // ── Poll loop ────────────────────────────────────────────────────

    loop {
        thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
        if let Ok(mut guard) = SNIFFER.lock() {
            if let Some(sniffer) = guard.as_mut() {
                sniffer.poll(uptime_millis(), &mut emit);
            }
        }
    }
}

// ── Output thread ────────────────────────────────────────────────────

fn output_thread(output_rx: mpsc::Receiver<MsgBuffer>) {
    log::info!("Output thread started");

    while let Ok(msg) = output_rx.recv() {
        if let Ok(s) = std::str::from_utf8(&msg) {
            log::info!("{}", s.trim_end());
        }
    }
}

// ── Status thread ────────────────────────────────────────────────────

fn send_status() {
    let msg = SNIFFER
        .lock()
        .ok()
        .and_then(|guard| guard.as_ref().map(|s| comm::status_message(s, uptime_secs())));
    if let Some(msg) = msg {
        send(&msg);
    }
}

fn status_thread() {
    loop {
        thread::sleep(Duration::from_secs(30));
        send_status();
    }
}

// ── Command thread ───────────────────────────────────────────────────

fn command_thread() {
    let mut reader: LineReader = LineReader::new();
    let mut stdin = std::io::stdin();
    let mut byte = [0u8; 1];

    loop {
        match stdin.read(&mut byte) {
            Ok(1) => {}
            // Console stdin is non-blocking: nothing buffered yet
            _ => {
                thread::sleep(Duration::from_millis(20));
                continue;
            }
        }

        let Some(line) = reader.feed(byte[0]) else {
            continue;
        };
        let Some(cmd) = comm::parse_command(line) else {
            log::warn!("Unrecognized command");
            continue;
        };

        let is_status_request = matches!(cmd, airprox::protocol::HostCommand::GetStatus);
        let reply = SNIFFER
            .lock()
            .ok()
            .and_then(|mut guard| guard.as_mut().and_then(|s| comm::handle_command(cmd, s)));
        if let Some(reply) = reply {
            send(&reply);
        }
        if is_status_request {
            send_status();
        }
    }
}
