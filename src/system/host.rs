//! Host detection.

use crate::models::{HostInfo, HostOs};

/// Describe the machine the driver runs on.
///
/// Pointer width is that of the driver binary itself, so a 32-bit build of the driver on a
/// 64-bit OS reports a 32-bit host.
pub fn detect_host() -> HostInfo {
    let os = host_os_from(std::env::consts::OS);
    let machine = machine_name(os, std::env::consts::ARCH);
    let pointer_width = if cfg!(target_pointer_width = "32") { 32 } else { 64 };

    log::debug!(
        "[System] Host: {} {} ({}-bit)",
        os,
        machine,
        pointer_width
    );
    HostInfo::new(os, machine, pointer_width)
}

/// Unknown Unix-likes follow the Linux conventions.
fn host_os_from(os: &str) -> HostOs {
    match os {
        "windows" => HostOs::Windows,
        "macos" => HostOs::MacOs,
        _ => HostOs::Linux,
    }
}

/// Machine name in the spelling the host's own tools use (`arm64` on macOS, `AMD64` on Windows).
fn machine_name(os: HostOs, arch: &str) -> String {
    match (os, arch) {
        (HostOs::MacOs, "aarch64") => "arm64".to_string(),
        (HostOs::Windows, "x86_64") => "AMD64".to_string(),
        (HostOs::Windows, "aarch64") => "ARM64".to_string(),
        (_, arch) => arch.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_os_mapping() {
        assert_eq!(host_os_from("windows"), HostOs::Windows);
        assert_eq!(host_os_from("macos"), HostOs::MacOs);
        assert_eq!(host_os_from("linux"), HostOs::Linux);
        assert_eq!(host_os_from("freebsd"), HostOs::Linux);
    }

    #[test]
    fn test_machine_names() {
        assert_eq!(machine_name(HostOs::MacOs, "aarch64"), "arm64");
        assert_eq!(machine_name(HostOs::Windows, "x86_64"), "AMD64");
        assert_eq!(machine_name(HostOs::Linux, "aarch64"), "aarch64");
    }

    #[test]
    fn test_detect_host_is_consistent() {
        let host = detect_host();
        assert!(host.pointer_width == 32 || host.pointer_width == 64);
        assert!(!host.machine.is_empty());
        assert_eq!(host, detect_host());
    }
}
