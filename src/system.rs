//! Raw CPU counter collection from the /proc filesystem.
//!
//! This module reads the cumulative per-core counters from `/proc/stat` and
//! the cumulative per-process CPU ticks from `/proc/<pid>/stat`. The file
//! handle for `/proc/stat` and the directory handle for `/proc` are opened
//! once and rewound on every sample, because at 100 Hz the open/close
//! syscalls are a measurable share of the budget.

use anyhow::{bail, Context, Result};
use nix::dir::Dir;
use nix::fcntl::OFlag;
use nix::sched::{sched_setaffinity, CpuSet};
use nix::sys::stat::Mode;
use nix::unistd::{sysconf, Pid, SysconfVar};
use std::fmt;
use std::fmt::Write as FmtWrite;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Default mount point of procfs.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Longest display name kept per process, in bytes.
pub const COMM_MAX: usize = 63;

/// Whitespace-delimited fields between the closing `)` and `utime`
/// (state, ppid, pgrp, session, tty_nr, tpgid, flags, minflt, cminflt,
/// majflt, cmajflt).
const FIELDS_BEFORE_UTIME: usize = 11;

/// Minimum counters a core line must carry: idle lives in the fourth one.
const MIN_CORE_FIELDS: usize = 4;

/// user, nice, system, idle, iowait, irq, softirq, steal, guest, guest_nice
const MAX_CORE_FIELDS: usize = 10;

const STAT_BUFFER_CAP: usize = 8 * 1024;
const PID_STAT_BUFFER_CAP: usize = 1024;

/// Starting capacity of a process snapshot; grows by doubling past it.
pub const INITIAL_PROCESS_CAPACITY: usize = 1024;

/// Cumulative idle and total ticks of one core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreSample {
    /// idle + iowait
    pub idle: u64,
    /// Sum of every counter present on the line.
    pub total: u64,
}

/// Process display name stored inline, truncated to [`COMM_MAX`] bytes on a
/// char boundary. Keeps samples `Copy` so refilling a snapshot never
/// allocates.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CommName {
    buf: [u8; COMM_MAX],
    len: u8,
}

impl CommName {
    pub fn new(name: &str) -> Self {
        let mut end = name.len().min(COMM_MAX);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        let mut buf = [0u8; COMM_MAX];
        buf[..end].copy_from_slice(&name.as_bytes()[..end]);
        Self {
            buf,
            len: end as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf[..self.len as usize]).unwrap_or_default()
    }
}

impl Default for CommName {
    fn default() -> Self {
        Self {
            buf: [0u8; COMM_MAX],
            len: 0,
        }
    }
}

impl fmt::Debug for CommName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for CommName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Delegate so width/alignment flags apply to the name itself.
        fmt::Display::fmt(self.as_str(), f)
    }
}

/// One process at one sampling instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: CommName,
    /// utime + stime since process start.
    pub ticks: u64,
}

/// Reusable container of all processes read in one sample.
///
/// Clearing keeps the allocation, and growth is amortized doubling, so a
/// snapshot settles at the host's peak process count and stays there.
#[derive(Debug, Default)]
pub struct ProcessSnapshot {
    samples: Vec<ProcessSample>,
    skipped: usize,
}

impl ProcessSnapshot {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            skipped: 0,
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.skipped = 0;
    }

    pub fn push(&mut self, sample: ProcessSample) {
        self.samples.push(sample);
    }

    /// Records a process that was enumerated but could not be read.
    pub fn mark_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn get(&self, slot: usize) -> Option<&ProcessSample> {
        self.samples.get(slot)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProcessSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

/// Parses one per-core line of /proc/stat.
///
/// Format: "cpu3 4705 356 584 3699 23 23 0 0 0 0". Older kernels report
/// fewer than ten counters; at least four are required.
pub fn parse_core_line(line: &str) -> Option<CoreSample> {
    let mut fields = line.split_whitespace();
    if !fields.next()?.starts_with("cpu") {
        return None;
    }

    let mut values = [0u64; MAX_CORE_FIELDS];
    let mut count = 0;
    for field in fields.take(MAX_CORE_FIELDS) {
        match field.parse::<u64>() {
            Ok(v) => {
                values[count] = v;
                count += 1;
            }
            Err(_) => break,
        }
    }

    if count < MIN_CORE_FIELDS {
        return None;
    }

    Some(CoreSample {
        idle: values[3].saturating_add(values[4]),
        total: values[..count]
            .iter()
            .fold(0u64, |acc, &v| acc.saturating_add(v)),
    })
}

/// Fills `out` from the content of /proc/stat.
///
/// The aggregate "cpu" line is skipped, then one line per core is expected
/// in order. Running out of lines or hitting a malformed one is fatal.
pub fn parse_core_counters(content: &str, out: &mut [CoreSample]) -> Result<()> {
    let mut lines = content.lines();
    lines.next();

    for (core, slot) in out.iter_mut().enumerate() {
        let line = lines
            .next()
            .with_context(|| format!("core counters ended before cpu{}", core))?;
        *slot = parse_core_line(line)
            .with_context(|| format!("malformed core counter line for cpu{}: {:?}", core, line))?;
    }

    Ok(())
}

/// Extracts the display name and utime+stime from a /proc/<pid>/stat record.
///
/// The name sits between the first `(` and the last `)`, so names that
/// contain parentheses or spaces survive intact.
pub fn parse_pid_stat(content: &str) -> Option<(&str, u64)> {
    let open = content.find('(')?;
    let close = content.rfind(')')?;
    if close <= open {
        return None;
    }

    let name = &content[open + 1..close];
    let mut fields = content[close + 1..]
        .split_whitespace()
        .skip(FIELDS_BEFORE_UTIME);
    let utime: u64 = fields.next()?.parse().ok()?;
    let stime: u64 = fields.next()?.parse().ok()?;

    Some((name, utime.saturating_add(stime)))
}

/// Directory stream over the process list, kept open across samples.
///
/// `std::fs::read_dir` cannot be rewound.
pub struct ProcDir {
    dir: Dir,
}

impl ProcDir {
    pub fn open(path: &Path) -> io::Result<Self> {
        let dir = Dir::open(
            path,
            OFlag::O_RDONLY | OFlag::O_DIRECTORY | OFlag::O_CLOEXEC,
            Mode::empty(),
        )?;
        Ok(Self { dir })
    }

    /// Entries whose name is all digits, parsed as pids.
    ///
    /// The stream is rewound when the returned iterator is dropped, so every
    /// call starts from the first entry and sees processes created since.
    pub fn pids(&mut self) -> impl Iterator<Item = u32> + '_ {
        self.dir
            .iter()
            .map_while(|entry| entry.ok())
            .filter_map(|entry| {
                let bytes = entry.file_name().to_bytes();
                if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
                    return None;
                }
                std::str::from_utf8(bytes).ok()?.parse().ok()
            })
    }
}

/// Reads `<root>/<pid>/stat` records through one reused path and buffer.
struct PidStatReader {
    /// "<root>" followed by "/<pid>/stat", truncated back to the root each time
    path: String,
    root_len: usize,
    buf: Vec<u8>,
}

impl PidStatReader {
    fn new(root: &Path) -> Self {
        let path = root.to_string_lossy().into_owned();
        let root_len = path.len();
        Self {
            path,
            root_len,
            buf: Vec::with_capacity(PID_STAT_BUFFER_CAP),
        }
    }

    fn read(&mut self, pid: u32) -> Option<ProcessSample> {
        self.path.truncate(self.root_len);
        write!(self.path, "/{}/stat", pid).ok()?;

        self.buf.clear();
        let read = File::open(&self.path).and_then(|mut f| f.read_to_end(&mut self.buf));
        match read {
            Ok(0) => {
                trace!("Skipping pid {}: empty stat record", pid);
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                trace!("Skipping pid {}: {}", pid, e);
                return None;
            }
        }

        let text = String::from_utf8_lossy(&self.buf);
        match parse_pid_stat(&text) {
            Some((name, ticks)) => Some(ProcessSample {
                pid,
                name: CommName::new(name),
                ticks,
            }),
            None => {
                trace!("Skipping pid {}: malformed stat record", pid);
                None
            }
        }
    }
}

/// Reads core and process counters, holding its handles for its lifetime.
pub struct CounterSource {
    stat_path: PathBuf,
    stat: File,
    stat_buf: String,
    proc_dir: ProcDir,
    reader: PidStatReader,
    max_processes: Option<usize>,
}

impl CounterSource {
    /// Opens `<root>/stat` and the `<root>` directory.
    pub fn open(root: &Path, max_processes: Option<usize>) -> Result<Self> {
        let stat_path = root.join("stat");
        let stat = File::open(&stat_path)
            .with_context(|| format!("Failed to open {}", stat_path.display()))?;
        let proc_dir = ProcDir::open(root)
            .with_context(|| format!("Failed to open directory {}", root.display()))?;

        debug!("Counter source opened at {}", root.display());

        Ok(Self {
            stat_path,
            stat,
            stat_buf: String::with_capacity(STAT_BUFFER_CAP),
            proc_dir,
            reader: PidStatReader::new(root),
            max_processes,
        })
    }

    /// Rewinds and rereads the core-counter source into `out`, one slot per core.
    pub fn sample_cores(&mut self, out: &mut [CoreSample]) -> Result<()> {
        self.stat
            .seek(SeekFrom::Start(0))
            .with_context(|| format!("Failed to rewind {}", self.stat_path.display()))?;
        self.stat_buf.clear();
        let bytes = self
            .stat
            .read_to_string(&mut self.stat_buf)
            .with_context(|| format!("Failed to read {}", self.stat_path.display()))?;
        if bytes == 0 {
            bail!("{} returned no data", self.stat_path.display());
        }

        parse_core_counters(&self.stat_buf, out)
            .with_context(|| format!("Failed to parse {}", self.stat_path.display()))
    }

    /// Refills `snapshot` with every process currently visible.
    ///
    /// Processes that exit between enumeration and read, or whose record is
    /// malformed, are counted as skipped and otherwise ignored.
    pub fn sample_processes(&mut self, snapshot: &mut ProcessSnapshot) {
        snapshot.clear();
        let Self {
            proc_dir,
            reader,
            max_processes,
            ..
        } = self;

        for pid in proc_dir.pids() {
            if max_processes.is_some_and(|max| snapshot.len() >= max) {
                break;
            }
            match reader.read(pid) {
                Some(sample) => snapshot.push(sample),
                None => snapshot.mark_skipped(),
            }
        }
    }
}

/// Number of configured CPU cores.
pub fn cpu_core_count() -> Result<usize> {
    match sysconf(SysconfVar::_NPROCESSORS_CONF) {
        Ok(Some(n)) if n >= 1 => Ok(n as usize),
        Ok(_) => bail!("Failed to determine CPU core count: sysconf reported no value"),
        Err(e) => Err(e).context("Failed to determine CPU core count"),
    }
}

/// Restricts this process to the highest-numbered core.
///
/// Core numbers beyond what a `CpuSet` can address are rejected with
/// `EINVAL` rather than pinned.
pub fn pin_to_last_cpu(cores: usize) -> io::Result<()> {
    if cores == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "no cores to pin to"));
    }

    let mut set = CpuSet::new();
    set.set(cores - 1)?;
    sched_setaffinity(Pid::from_raw(0), &set)?;
    Ok(())
}

/// Applies the pinning hint. Failure is a warning unless `strict` is set.
pub fn apply_affinity(cores: usize, strict: bool) -> Result<()> {
    match pin_to_last_cpu(cores) {
        Ok(()) => {
            debug!("Pinned sampler to cpu{}", cores.saturating_sub(1));
            Ok(())
        }
        Err(e) if strict => {
            Err(e).with_context(|| format!("Failed to pin sampler to cpu{}", cores.saturating_sub(1)))
        }
        Err(e) => {
            warn!(
                "Could not pin sampler to cpu{}: {} (measurements may include sampler noise)",
                cores.saturating_sub(1),
                e
            );
            Ok(())
        }
    }
}
