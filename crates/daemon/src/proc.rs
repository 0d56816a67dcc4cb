// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process liveness probing.

use nix::sys::signal::kill;
use nix::unistd::Pid;

/// True when a process with `pid` exists (signal 0 probe).
///
/// EPERM counts as alive: the process exists but belongs to another user.
pub fn pid_alive(pid: u32) -> bool {
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(test)]
#[path = "proc_tests.rs"]
mod tests;
