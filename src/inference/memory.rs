//! 系统内存压力探测

use parking_lot::Mutex;
use sysinfo::System;

/// 系统内存使用率来源
pub trait MemoryProbe: Send + Sync {
    /// 当前已用内存百分比 [0, 100]
    fn used_percent(&self) -> f64;
}

/// 基于 sysinfo 的实时探测
pub struct SystemMemoryProbe {
    system: Mutex<System>,
}

impl SystemMemoryProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemoryProbe {
    fn used_percent(&self) -> f64 {
        let mut system = self.system.lock();
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return 0.0;
        }
        system.used_memory() as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_probe_returns_percentage() {
        let probe = SystemMemoryProbe::new();
        let used = probe.used_percent();
        assert!((0.0..=100.0).contains(&used));
    }
}
