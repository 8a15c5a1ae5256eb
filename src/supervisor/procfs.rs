//! Per-process resource usage read from `/proc`.

use serde::Serialize;

/// CPU and memory figures for one backend process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProcessUsage {
    /// User plus system CPU time consumed so far
    pub cpu_time_seconds: f64,
    /// Resident set size
    pub memory_rss_mb: f64,
}

/// USER_HZ as exposed to userspace on Linux.
#[cfg(target_os = "linux")]
const CLOCK_TICKS_PER_SECOND: f64 = 100.0;

#[cfg(target_os = "linux")]
pub fn read_usage(pid: u32) -> Option<ProcessUsage> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    let status = std::fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
    Some(ProcessUsage {
        cpu_time_seconds: parse_cpu_ticks(&stat)? as f64 / CLOCK_TICKS_PER_SECOND,
        memory_rss_mb: parse_rss_kb(&status)? as f64 / 1024.0,
    })
}

#[cfg(not(target_os = "linux"))]
pub fn read_usage(_pid: u32) -> Option<ProcessUsage> {
    None
}

/// utime + stime from `/proc/<pid>/stat`.
///
/// The command name field may contain spaces, so fields are counted from the
/// closing parenthesis.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_cpu_ticks(stat: &str) -> Option<u64> {
    let rest = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // fields[0] is state (field 3); utime and stime are fields 14 and 15
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(utime + stime)
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_rss_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|value| value.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_ticks_with_spaces_in_name() {
        let stat = "4242 (python3 -m vllm) S 1 4242 4242 0 -1 4194560 \
                    100 0 0 0 250 50 0 0 20 0 12 0 1000 0 0";
        assert_eq!(parse_cpu_ticks(stat), Some(300));
    }

    #[test]
    fn test_parse_rss_kb() {
        let status = "Name:\tpython3\nVmPeak:\t 9000 kB\nVmRSS:\t  204800 kB\nThreads:\t12\n";
        assert_eq!(parse_rss_kb(status), Some(204_800));
        assert_eq!(parse_rss_kb("Name:\tx\n"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_read_own_usage() {
        let usage = read_usage(std::process::id()).unwrap();
        assert!(usage.memory_rss_mb > 0.0);
        assert!(usage.cpu_time_seconds >= 0.0);
    }
}
