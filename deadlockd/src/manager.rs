//! Process queries and remediation actions.
//!
//! Actions race with the poll loop: the target may already be gone, which is
//! reported as a failed outcome rather than an error.

use crate::collector::{SysinfoCollector, memory_percent, percent_of, snapshot_of};
use crate::error::MonitorError;
use crate::types::{
    ActionOutcome, CpuSummary, MemorySummary, ProcessInfo, ProcessSnapshot, ResourceSummary,
    UsageSummary,
};
use log::{error, info, warn};
use std::path::Path;
use std::process::Command;
use sysinfo::{Disks, Pid, ProcessRefreshKind, ProcessesToUpdate, UpdateKind};

pub trait ProcessManager: Send + Sync {
    fn list_processes(&self) -> Vec<ProcessSnapshot>;

    fn process_info(&self, pid: u32) -> Result<ProcessInfo, MonitorError>;

    fn kill(&self, pid: u32) -> ActionOutcome;

    /// Kill `pid` and start its command line again.
    fn restart(&self, pid: u32) -> ActionOutcome;

    fn system_resources(&self) -> ResourceSummary;
}

impl ProcessManager for SysinfoCollector {
    fn list_processes(&self) -> Vec<ProcessSnapshot> {
        let system = self.lock();
        let total_memory = system.total_memory();
        let mut processes: Vec<ProcessSnapshot> = system
            .processes()
            .iter()
            .map(|(pid, process)| snapshot_of(*pid, process, total_memory))
            .collect();
        processes.sort_by_key(|p| p.pid);
        processes
    }

    fn process_info(&self, pid: u32) -> Result<ProcessInfo, MonitorError> {
        let system = self.lock();
        let process = system
            .process(Pid::from_u32(pid))
            .ok_or(MonitorError::UnknownProcess(pid))?;

        let username = process.user_id().and_then(|uid| {
            self.users()
                .get_user_by_id(uid)
                .map(|user| user.name().to_string())
        });
        // sysinfo lists the main thread among the tasks only on some kernels
        let num_threads = process
            .tasks()
            .map(|tasks| tasks.len() + usize::from(!tasks.contains(&process.pid())));

        Ok(ProcessInfo {
            pid,
            name: process.name().to_string_lossy().into_owned(),
            status: process.status().to_string().to_lowercase(),
            cpu_percent: f64::from(process.cpu_usage()),
            memory_percent: memory_percent(process, system.total_memory()),
            create_time: process.start_time(),
            num_threads,
            username,
        })
    }

    fn kill(&self, pid: u32) -> ActionOutcome {
        let mut system = self.lock();
        let target = Pid::from_u32(pid);
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            ProcessRefreshKind::nothing(),
        );

        let Some(process) = system.process(target) else {
            return ActionOutcome::failed(format!("Process {pid} not found"));
        };

        if process.kill() {
            info!("[manager] killed process {pid}");
            ActionOutcome::ok(format!("Process {pid} killed successfully"))
        } else {
            warn!("[manager] kill of process {pid} refused");
            ActionOutcome::failed(format!("Access denied to kill process {pid}"))
        }
    }

    fn restart(&self, pid: u32) -> ActionOutcome {
        let mut system = self.lock();
        let target = Pid::from_u32(pid);
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
        );

        let Some(process) = system.process(target) else {
            return ActionOutcome::failed(format!("Process {pid} not found"));
        };

        let cmdline: Vec<_> = process.cmd().to_vec();
        let Some((program, args)) = cmdline.split_first() else {
            warn!("[manager] {}", MonitorError::CommandLineUnavailable(pid));
            return ActionOutcome::failed("Could not determine process command line");
        };

        if !process.kill() {
            return ActionOutcome::failed(format!("Access denied to kill process {pid}"));
        }

        match Command::new(program).args(args).spawn() {
            Ok(child) => {
                info!(
                    "[manager] restarted process {pid} as {} ({})",
                    child.id(),
                    program.to_string_lossy()
                );
                ActionOutcome::ok(format!("Process {pid} restarted successfully"))
            }
            Err(err) => {
                error!("[manager] failed to respawn process {pid}: {err}");
                ActionOutcome::failed(err.to_string())
            }
        }
    }

    fn system_resources(&self) -> ResourceSummary {
        let system = self.lock();
        let total_memory = system.total_memory();
        if total_memory == 0 {
            error!("[manager] error getting system resources: total memory reported as zero");
            return ResourceSummary::default();
        }

        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .find(|disk| disk.mount_point() == Path::new("/"))
            .map(|disk| {
                let used = disk.total_space().saturating_sub(disk.available_space());
                UsageSummary {
                    total: disk.total_space(),
                    used,
                    percent: percent_of(used, disk.total_space()),
                }
            })
            .unwrap_or_default();

        ResourceSummary {
            cpu: CpuSummary {
                percent: f64::from(system.global_cpu_usage()),
                count: system.cpus().len(),
            },
            memory: MemorySummary {
                total: total_memory,
                available: system.available_memory(),
                percent: percent_of(system.used_memory(), total_memory),
            },
            swap: UsageSummary {
                total: system.total_swap(),
                used: system.used_swap(),
                percent: percent_of(system.used_swap(), system.total_swap()),
            },
            disk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MetricsSampler;

    #[test]
    fn process_info_for_current_process() {
        let collector = SysinfoCollector::new();
        let current = std::process::id();
        let info = collector.process_info(current).unwrap();
        assert_eq!(info.pid, current);
        assert!(!info.name.is_empty());
    }

    #[test]
    fn process_info_for_missing_pid_is_unknown() {
        let collector = SysinfoCollector::new();
        assert_eq!(
            collector.process_info(u32::MAX - 1),
            Err(MonitorError::UnknownProcess(u32::MAX - 1))
        );
    }

    #[test]
    fn kill_missing_process_reports_not_found() {
        let collector = SysinfoCollector::new();
        let outcome = collector.kill(u32::MAX - 1);
        assert!(!outcome.success);
        assert!(outcome.message.contains("not found"));
    }

    #[test]
    fn restart_missing_process_reports_not_found() {
        let collector = SysinfoCollector::new();
        let outcome = collector.restart(u32::MAX - 1);
        assert!(!outcome.success);
        assert!(outcome.message.contains("not found"));
    }

    #[test]
    fn process_list_is_sorted_by_pid() {
        let collector = SysinfoCollector::new();
        let processes = collector.list_processes();
        assert!(processes.windows(2).all(|w| w[0].pid < w[1].pid));
    }

    fn kill_matching(collector: &SysinfoCollector, cmd: &[&str], skip: u32) {
        let mut system = collector.lock();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
        );
        for (pid, process) in system.processes() {
            let matches = process.cmd().len() == cmd.len()
                && process.cmd().iter().zip(cmd).all(|(a, b)| a == b);
            if matches && pid.as_u32() != skip {
                process.kill();
            }
        }
    }

    #[test]
    fn restart_respawns_live_process() {
        let cmd = ["sleep", "271"];
        let mut child = std::process::Command::new(cmd[0])
            .arg(cmd[1])
            .spawn()
            .unwrap();
        let collector = SysinfoCollector::new();

        let outcome = collector.restart(child.id());
        assert!(outcome.success, "{outcome:?}");
        assert_eq!(
            outcome.message,
            format!("Process {} restarted successfully", child.id())
        );
        // the original was killed, not left running
        let status = child.wait().unwrap();
        assert!(!status.success());

        kill_matching(&collector, &cmd, child.id());
    }

    #[test]
    fn kill_live_process_succeeds() {
        let mut child = std::process::Command::new("sleep")
            .arg("272")
            .spawn()
            .unwrap();
        let collector = SysinfoCollector::new();

        let outcome = collector.kill(child.id());
        assert!(outcome.success, "{outcome:?}");
        assert!(!child.wait().unwrap().success());
    }

    #[test]
    fn busy_process_reports_cpu_after_refresh() {
        let mut child = std::process::Command::new("sh")
            .args(["-c", "while :; do :; done"])
            .spawn()
            .unwrap();
        let collector = SysinfoCollector::new();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL * 3);
        collector.refresh();

        let busy = collector
            .list_processes()
            .into_iter()
            .find(|p| p.pid == child.id());
        child.kill().unwrap();
        child.wait().unwrap();

        let busy = busy.expect("busy child should be listed");
        assert!(busy.cpu_percent > 0.0, "{busy:?}");
    }

    #[test]
    fn process_info_reports_threads_and_owner() {
        let (release, parked) = std::sync::mpsc::channel::<()>();
        let worker = std::thread::spawn(move || {
            let _ = parked.recv();
        });
        let collector = SysinfoCollector::new();

        let info = collector.process_info(std::process::id()).unwrap();
        release.send(()).unwrap();
        worker.join().unwrap();

        assert!(info.num_threads.is_some_and(|n| n > 1), "{info:?}");
        assert!(info.username.is_some(), "{info:?}");
    }
}
