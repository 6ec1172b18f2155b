//! Platform collaborators behind the identifier sources.
//!
//! Each trait has one system implementation that picks its data source per
//! target OS. Tests and other platforms plug in their own implementations.

use std::net::IpAddr;
#[cfg(any(target_os = "macos", target_os = "windows"))]
use std::process::Command;

use super::error::ProviderError;

/// Reads the installation id the OS persists across reboots.
pub trait InstallIdProvider: Send + Sync {
    fn persistent_id(&self) -> Result<String, ProviderError>;
}

/// One processor record from the hardware inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessorRecord {
    pub vendor_id: String,
    pub physical_id: String,
}

/// Hardware inventory; may be slow or hang on some systems.
pub trait HardwareInventory: Send + Sync {
    fn processors(&self) -> Result<Vec<ProcessorRecord>, ProviderError>;
}

/// How far an interface address reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Loopback,
    LinkLocal,
    GlobalUnicast,
    /// Unspecified, multicast or limited broadcast.
    NonUnicast,
}

impl Reachability {
    /// Private ranges classify as `GlobalUnicast`.
    pub fn classify(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) if v4.is_loopback() => Self::Loopback,
            IpAddr::V4(v4) if v4.is_link_local() => Self::LinkLocal,
            IpAddr::V4(v4) if v4.is_unspecified() || v4.is_multicast() || v4.is_broadcast() => {
                Self::NonUnicast
            }
            IpAddr::V6(v6) if v6.is_loopback() => Self::Loopback,
            // fe80::/10
            IpAddr::V6(v6) if v6.segments()[0] & 0xffc0 == 0xfe80 => Self::LinkLocal,
            IpAddr::V6(v6) if v6.is_unspecified() || v6.is_multicast() => Self::NonUnicast,
            _ => Self::GlobalUnicast,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceRecord {
    pub name: String,
    pub is_up: bool,
    pub is_loopback: bool,
    pub addresses: Vec<Reachability>,
    /// `aa:bb:cc:dd:ee:ff`, empty when the interface has no hardware address.
    pub hardware_address: String,
}

pub trait InterfaceEnumerator: Send + Sync {
    fn interfaces(&self) -> Result<Vec<InterfaceRecord>, ProviderError>;
}

/// Every non-empty hardware address, in enumeration order.
pub fn hardware_addresses(enumerator: &dyn InterfaceEnumerator) -> Result<Vec<String>, ProviderError> {
    Ok(enumerator
        .interfaces()?
        .into_iter()
        .map(|intf| intf.hardware_address)
        .filter(|mac| !mac.is_empty())
        .collect())
}

// ─── System implementations ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInstallId;

impl InstallIdProvider for SystemInstallId {
    #[cfg(target_os = "windows")]
    fn persistent_id(&self) -> Result<String, ProviderError> {
        let output = Command::new("reg")
            .args([
                "query",
                r"HKLM\SOFTWARE\Microsoft\Cryptography",
                "/v",
                "MachineGuid",
                "/reg:64",
            ])
            .output()?;

        if !output.status.success() {
            return Err(ProviderError::NotFound("MachineGuid registry value".to_string()));
        }

        parse_reg_query(&String::from_utf8_lossy(&output.stdout), "MachineGuid")
            .ok_or_else(|| ProviderError::NotFound("MachineGuid registry value".to_string()))
    }

    #[cfg(target_os = "macos")]
    fn persistent_id(&self) -> Result<String, ProviderError> {
        let output = Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()?;

        if !output.status.success() {
            return Err(ProviderError::Query("ioreg command failed".to_string()));
        }

        // "IOPlatformUUID" = "XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX"
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| line.contains("IOPlatformUUID"))
            .find_map(|line| line.split('"').nth(3).map(str::to_string))
            .ok_or_else(|| ProviderError::NotFound("IOPlatformUUID in ioreg output".to_string()))
    }

    #[cfg(target_os = "linux")]
    fn persistent_id(&self) -> Result<String, ProviderError> {
        let raw = std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))?;
        Ok(hyphenate_machine_id(&raw))
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    fn persistent_id(&self) -> Result<String, ProviderError> {
        Err(ProviderError::Unsupported)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInventory;

impl HardwareInventory for SystemInventory {
    #[cfg(target_os = "windows")]
    fn processors(&self) -> Result<Vec<ProcessorRecord>, ProviderError> {
        match Command::new("wmic")
            .args(["cpu", "get", "Manufacturer,ProcessorId", "/format:csv"])
            .output()
        {
            Ok(output) if output.status.success() => {
                parse_processor_csv(&String::from_utf8_lossy(&output.stdout))
            }
            // wmic is gone from recent Windows 11 builds.
            _ => {
                tracing::debug!("wmic unavailable, querying Win32_Processor through PowerShell");
                let output = powershell(
                    "Get-CimInstance Win32_Processor \
                     | Select-Object Manufacturer,ProcessorId \
                     | ConvertTo-Csv -NoTypeInformation",
                )?;
                parse_processor_csv(&output)
            }
        }
    }

    #[cfg(target_os = "macos")]
    fn processors(&self) -> Result<Vec<ProcessorRecord>, ProviderError> {
        let sysctl = |key: &str| -> Result<String, ProviderError> {
            let output = Command::new("sysctl").args(["-n", key]).output()?;
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        };

        // machdep.cpu.vendor only exists on Intel Macs.
        let mut vendor_id = sysctl("machdep.cpu.vendor")?;
        if vendor_id.is_empty() {
            vendor_id = sysctl("machdep.cpu.brand_string")?;
        }
        if vendor_id.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![ProcessorRecord {
            vendor_id,
            physical_id: String::new(),
        }])
    }

    #[cfg(target_os = "linux")]
    fn processors(&self) -> Result<Vec<ProcessorRecord>, ProviderError> {
        let cpuinfo = std::fs::read_to_string("/proc/cpuinfo")?;
        Ok(parse_cpuinfo(&cpuinfo))
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    fn processors(&self) -> Result<Vec<ProcessorRecord>, ProviderError> {
        Err(ProviderError::Unsupported)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl InterfaceEnumerator for SystemInterfaces {
    #[cfg(target_os = "windows")]
    fn interfaces(&self) -> Result<Vec<InterfaceRecord>, ProviderError> {
        let output = powershell(
            "Get-CimInstance Win32_NetworkAdapterConfiguration -Filter 'IPEnabled=True' \
             | Select-Object Description,MACAddress,@{Name='IPAddress';Expression={$_.IPAddress -join ' '}} \
             | ConvertTo-Csv -NoTypeInformation",
        )?;
        parse_adapter_csv(&output)
    }

    #[cfg(not(target_os = "windows"))]
    fn interfaces(&self) -> Result<Vec<InterfaceRecord>, ProviderError> {
        Ok(pnet::datalink::interfaces()
            .into_iter()
            .map(|intf| InterfaceRecord {
                is_up: intf.is_up(),
                is_loopback: intf.is_loopback(),
                addresses: intf
                    .ips
                    .iter()
                    .map(|net| Reachability::classify(net.ip()))
                    .collect(),
                hardware_address: intf.mac.map(|mac| mac.to_string()).unwrap_or_default(),
                name: intf.name,
            })
            .collect())
    }
}

#[cfg(target_os = "windows")]
fn powershell(script: &str) -> Result<String, ProviderError> {
    let output = Command::new("powershell")
        .args(["-NoProfile", "-NonInteractive", "-Command", script])
        .output()?;

    if !output.status.success() {
        return Err(ProviderError::Query("PowerShell CIM query failed".to_string()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// ─── Output parsers ──────────────────────────────────────────────────────

/// Renders the 32-hex `machine-id` as a hyphenated UUID. Anything else is
/// returned trimmed but otherwise untouched, for the caller to reject.
#[cfg(any(target_os = "linux", test))]
fn hyphenate_machine_id(raw: &str) -> String {
    let raw = raw.trim();
    match uuid::Uuid::parse_str(raw) {
        Ok(id) if raw.len() == 32 => id.hyphenated().to_string(),
        _ => raw.to_string(),
    }
}

/// Blocks separated by blank lines, one per logical processor.
#[cfg(any(target_os = "linux", test))]
fn parse_cpuinfo(cpuinfo: &str) -> Vec<ProcessorRecord> {
    let mut records = Vec::new();

    for block in cpuinfo.split("\n\n") {
        let mut is_processor = false;
        let mut vendor_id = None;
        let mut implementer = None;
        let mut physical_id = String::new();

        for line in block.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim() {
                "processor" => is_processor = true,
                "vendor_id" => vendor_id = Some(value),
                "CPU implementer" => implementer = Some(value),
                "physical id" => physical_id = value,
                _ => {}
            }
        }

        if is_processor {
            records.push(ProcessorRecord {
                vendor_id: vendor_id.or(implementer).unwrap_or_default(),
                physical_id,
            });
        }
    }

    records
}

/// Rows of a CSV table with the named `columns`, in that order.
///
/// Blank lines are dropped, so the leading blank line `wmic` prints is fine.
#[cfg(any(target_os = "windows", test))]
fn csv_columns(output: &str, columns: &[&str]) -> Result<Vec<Vec<String>>, ProviderError> {
    let body: String = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ProviderError::Query(e.to_string()))?
        .clone();
    let positions = columns
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| ProviderError::Query(format!("missing {name} column")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| ProviderError::Query(e.to_string()))?;
        rows.push(
            positions
                .iter()
                .map(|&i| row.get(i).unwrap_or_default().to_string())
                .collect(),
        );
    }
    Ok(rows)
}

/// `wmic ... /format:csv` or `ConvertTo-Csv` output with `Manufacturer` and
/// `ProcessorId` columns.
#[cfg(any(target_os = "windows", test))]
fn parse_processor_csv(output: &str) -> Result<Vec<ProcessorRecord>, ProviderError> {
    Ok(csv_columns(output, &["Manufacturer", "ProcessorId"])?
        .into_iter()
        .map(|mut row| ProcessorRecord {
            physical_id: row.pop().unwrap_or_default(),
            vendor_id: row.pop().unwrap_or_default(),
        })
        .collect())
}

/// `Win32_NetworkAdapterConfiguration` rows. Only IP-enabled adapters are
/// queried, so every row counts as up.
#[cfg(any(target_os = "windows", test))]
fn parse_adapter_csv(output: &str) -> Result<Vec<InterfaceRecord>, ProviderError> {
    Ok(csv_columns(output, &["Description", "MACAddress", "IPAddress"])?
        .into_iter()
        .map(|row| {
            let addresses: Vec<Reachability> = row[2]
                .split_whitespace()
                .filter_map(|ip| ip.parse::<IpAddr>().ok())
                .map(Reachability::classify)
                .collect();
            InterfaceRecord {
                is_up: true,
                is_loopback: !addresses.is_empty()
                    && addresses.iter().all(|a| *a == Reachability::Loopback),
                addresses,
                hardware_address: row[1].to_ascii_lowercase(),
                name: row[0].clone(),
            }
        })
        .collect())
}

#[cfg(any(target_os = "windows", test))]
fn parse_reg_query(output: &str, value_name: &str) -> Option<String> {
    // "    MachineGuid    REG_SZ    4b49ff10-aaaa-1111-bbbb-222233334444"
    output.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        if parts.next()? != value_name {
            return None;
        }
        parts.next()?;
        parts.next().map(str::to_string)
    })
}
