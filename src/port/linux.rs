use glob::glob;
use std::fs;

/// A port is busy when some process holds an fd on it.
pub fn is_port_open(port_name: &str) -> bool {
    glob("/proc/[0-9]*/fd/*")
        .unwrap()
        .filter_map(|p| p.ok())
        .filter_map(|path| fs::read_link(path).ok())
        .any(|link| link.to_str() == Some(port_name))
}
