//! VCD (Value Change Dump) tracing of the register bank
//!
//! Supports two modes:
//! - Buffer mode: accumulate changes in memory, export at end
//! - Streaming mode: write changes directly to a file as they happen
//!
//! One time unit elapses per captured clock step.

use std::fs::File;
use std::io::{BufWriter, Write};

use tracing::debug;

use crate::error::SimError;

/// Signal change event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalChange {
    pub time: u64,
    pub signal_idx: usize,
    pub value: u64,
}

/// VCD trace mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceMode {
    Buffer,
    Streaming,
}

pub struct VcdTracer {
    time: u64,
    enabled: bool,
    mode: TraceMode,
    signal_names: Vec<String>,
    signal_widths: Vec<usize>,
    vcd_ids: Vec<String>,
    /// Values at `start()`, emitted under `$dumpvars`
    initial_values: Vec<u64>,
    /// Last recorded value per signal, for change detection
    prev_values: Vec<u64>,
    changes: Vec<SignalChange>,
    file_writer: Option<BufWriter<File>>,
    header_written: bool,
    timescale: String,
    module_name: String,
}

impl VcdTracer {
    pub fn new(signal_names: Vec<String>, signal_widths: Vec<usize>) -> Self {
        let n = signal_names.len();
        Self {
            time: 0,
            enabled: false,
            mode: TraceMode::Buffer,
            vcd_ids: (0..n).map(Self::idx_to_vcd_id).collect(),
            signal_names,
            signal_widths,
            initial_values: vec![0; n],
            prev_values: vec![0; n],
            changes: Vec::new(),
            file_writer: None,
            header_written: false,
            timescale: "1ns".to_string(),
            module_name: "addsub".to_string(),
        }
    }

    /// Printable ASCII identifier, base-94 from '!'
    fn idx_to_vcd_id(idx: usize) -> String {
        let base = 94;
        let offset = 33u8;

        if idx < base {
            return ((offset + idx as u8) as char).to_string();
        }

        let mut result = String::new();
        let mut n = idx;
        loop {
            result.insert(0, (offset + (n % base) as u8) as char);
            n /= base;
            if n == 0 {
                break;
            }
            n -= 1;
        }
        result
    }

    pub fn set_timescale(&mut self, timescale: &str) {
        self.timescale = timescale.to_string();
    }

    pub fn set_module_name(&mut self, name: &str) {
        self.module_name = name.to_string();
    }

    pub fn mode(&self) -> TraceMode {
        self.mode
    }

    /// Start tracing from the given current values.
    ///
    /// A stream whose header is already written is resumed instead: time
    /// keeps counting and the next capture diffs against the last recorded
    /// values, so the file stays a single valid dump.
    pub fn start(&mut self, initial: &[u64]) {
        self.enabled = true;
        if self.mode == TraceMode::Streaming && self.header_written {
            debug!("VCD stream resumed at t={}", self.time);
            return;
        }
        self.time = 0;
        self.header_written = false;
        self.changes.clear();
        for (i, v) in initial.iter().enumerate().take(self.prev_values.len()) {
            self.initial_values[i] = *v;
            self.prev_values[i] = *v;
        }
        debug!("VCD tracing started ({:?})", self.mode);
    }

    pub fn stop(&mut self) -> Result<(), SimError> {
        self.enabled = false;
        if let Some(ref mut writer) = self.file_writer {
            writer.flush()?;
        }
        debug!("VCD tracing stopped at t={}", self.time);
        Ok(())
    }

    /// Stop recording without touching the file writer.
    pub(crate) fn disable(&mut self) {
        self.enabled = false;
    }

    /// Switch to streaming mode, writing to `path`.
    pub fn open_file(&mut self, path: &str) -> Result<(), SimError> {
        let file = File::create(path)?;
        self.file_writer = Some(BufWriter::with_capacity(64 * 1024, file));
        self.mode = TraceMode::Streaming;
        self.header_written = false;
        debug!("VCD streaming to {}", path);
        Ok(())
    }

    pub fn close_file(&mut self) -> Result<(), SimError> {
        if let Some(mut writer) = self.file_writer.take() {
            writer.flush()?;
        }
        self.mode = TraceMode::Buffer;
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    /// Record one clock step. Only values that differ from the previous
    /// capture are kept.
    pub fn capture(&mut self, values: &[u64]) -> Result<(), SimError> {
        if !self.enabled {
            return Ok(());
        }

        if self.mode == TraceMode::Streaming && !self.header_written {
            let header = self.header();
            if let Some(ref mut writer) = self.file_writer {
                writer.write_all(header.as_bytes())?;
            }
            self.header_written = true;
        }

        self.time += 1;
        let time = self.time;

        let mut step_changes = Vec::new();
        for (idx, &val) in values.iter().enumerate().take(self.prev_values.len()) {
            if self.prev_values[idx] != val {
                self.prev_values[idx] = val;
                step_changes.push(SignalChange { time, signal_idx: idx, value: val });
            }
        }

        if step_changes.is_empty() {
            return Ok(());
        }

        match self.mode {
            TraceMode::Buffer => self.changes.extend(step_changes),
            TraceMode::Streaming => self.write_changes(&step_changes)?,
        }
        Ok(())
    }

    fn write_changes(&mut self, changes: &[SignalChange]) -> Result<(), SimError> {
        let mut output = String::new();
        self.push_changes(&mut output, changes);
        if let Some(ref mut writer) = self.file_writer {
            writer.write_all(output.as_bytes())?;
        }
        Ok(())
    }

    fn push_changes(&self, out: &mut String, changes: &[SignalChange]) {
        let mut last_time: Option<u64> = None;
        for change in changes {
            if last_time != Some(change.time) {
                out.push_str(&format!("#{}\n", change.time));
                last_time = Some(change.time);
            }
            let width = self.signal_widths.get(change.signal_idx).copied().unwrap_or(1);
            out.push_str(&Self::format_value(change.value, width, &self.vcd_ids[change.signal_idx]));
            out.push('\n');
        }
    }

    fn header(&self) -> String {
        let mut header = String::new();
        header.push_str(&format!("$timescale {} $end\n", self.timescale));
        header.push_str(&format!("$scope module {} $end\n", self.module_name));
        for (idx, name) in self.signal_names.iter().enumerate() {
            let width = self.signal_widths.get(idx).copied().unwrap_or(1);
            header.push_str(&format!("$var reg {} {} {} $end\n", width, self.vcd_ids[idx], name));
        }
        header.push_str("$upscope $end\n");
        header.push_str("$enddefinitions $end\n");

        header.push_str("#0\n$dumpvars\n");
        for (idx, &val) in self.initial_values.iter().enumerate() {
            let width = self.signal_widths.get(idx).copied().unwrap_or(1);
            header.push_str(&Self::format_value(val, width, &self.vcd_ids[idx]));
            header.push('\n');
        }
        header.push_str("$end\n");
        header
    }

    fn format_value(value: u64, width: usize, vcd_id: &str) -> String {
        if width == 1 {
            format!("{}{}", value & 1, vcd_id)
        } else {
            format!("b{:0width$b} {}", value, vcd_id, width = width)
        }
    }

    /// Render the buffered trace as VCD text.
    pub fn to_vcd(&self) -> String {
        let mut vcd = self.header();
        self.push_changes(&mut vcd, &self.changes);
        vcd
    }

    pub fn save_vcd(&self, path: &str) -> Result<(), SimError> {
        std::fs::write(path, self.to_vcd())?;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.changes.clear();
        self.time = 0;
        self.header_written = false;
    }
}
