//! Best-effort host probes used to register the hive itself.

use std::{
    fs,
    net::UdpSocket,
    path::Path,
    sync::OnceLock,
};

use hive_model::{DeviceDetails, Statistic};

use crate::config::HiveConfig;

static SERIAL: OnceLock<String> = OnceLock::new();

const SERIAL_FILE: &str = "hive-serial";

/// Short hostname (first label).
pub fn hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .and_then(|h| h.split('.').next().map(str::to_string))
        .unwrap_or_else(|| "localhost".into())
}

/// Get platform (OS family).
#[inline]
pub fn system_name() -> &'static str {
    std::env::consts::OS
}

/// Kernel release, or the distribution name when that is unreadable.
pub fn system_version() -> String {
    #[cfg(target_os = "linux")]
    {
        if let Ok(release) = fs::read_to_string("/proc/sys/kernel/osrelease") {
            return release.trim().to_string();
        }
        if let Ok(content) = fs::read_to_string("/etc/os-release") {
            for line in content.lines() {
                if let Some(name) = line.strip_prefix("PRETTY_NAME=") {
                    return name.trim_matches('"').to_string();
                }
            }
        }
    }

    String::new()
}

/// Outbound IPv4 address. No packet is sent; connecting a UDP socket only picks a route.
pub fn ip_address() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("10.255.255.255:1").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then(|| ip.to_string())
}

/// Hardware addresses of the network interfaces, loopback excluded.
pub fn mac_addresses() -> Vec<String> {
    let Ok(entries) = fs::read_dir("/sys/class/net") else {
        return Vec::new();
    };
    let mut macs: Vec<String> = entries
        .flatten()
        .filter_map(|e| fs::read_to_string(e.path().join("address")).ok())
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty() && m != "00:00:00:00:00:00")
        .collect();
    macs.sort();
    macs.dedup();
    macs
}

/// Hardware serial, or an id generated once and persisted under `state_dir`.
pub fn serial_identifier(state_dir: &Path) -> &'static str {
    SERIAL.get_or_init(|| {
        hardware_serial()
            .or_else(|| load_or_generate_serial(&state_dir.join(SERIAL_FILE)))
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    })
}

fn hardware_serial() -> Option<String> {
    ["/sys/class/dmi/id/product_serial", "/sys/class/dmi/id/board_serial"]
        .iter()
        .filter_map(|p| fs::read_to_string(p).ok())
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"))
}

fn load_or_generate_serial(path: &Path) -> Option<String> {
    if let Ok(id) = fs::read_to_string(path) {
        let id = id.trim();
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }
    let id = uuid::Uuid::new_v4().to_string();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    fs::write(path, &id).ok()?;
    Some(id)
}

/// One minute load average.
pub fn load_average() -> Option<f64> {
    let mut loads = [0f64; 3];
    // SAFETY: getloadavg writes at most `nelem` doubles into the buffer.
    let n = unsafe { libc::getloadavg(loads.as_mut_ptr(), 3) };
    (n >= 1).then_some(loads[0])
}

pub fn processor_count() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// Registration payload for the hive host.
pub fn hive_details(cfg: &HiveConfig) -> DeviceDetails {
    DeviceDetails {
        id: None,
        hostname: Some(cfg.name.clone().unwrap_or_else(hostname)),
        serial: Some(serial_identifier(cfg.logging.pids_dir()).to_string()),
        macs: mac_addresses(),
        ips: ip_address().into_iter().collect(),
        brand: Some(cfg.brand.clone().unwrap_or_else(|| "Hive".into())),
        model: Some(cfg.model.clone().unwrap_or_else(|| "Hive".into())),
        device_type: Some("Hive".into()),
        operating_system_name: Some(system_name().to_string()),
        operating_system_version: Some(system_version()),
        location: cfg.location.clone(),
        building: cfg.building.clone(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    }
}

/// Statistics sent once after registration.
pub fn registration_statistics(cfg: &HiveConfig) -> Vec<Statistic> {
    let mut stats = vec![Statistic::integer(
        "Processor count",
        processor_count() as u64,
    )];
    if let Some((warning, error)) = cfg.load_thresholds() {
        stats.push(Statistic::float("Load average warning threshold", warning));
        stats.push(Statistic::float("Load average error threshold", error));
    }
    stats
}
