//! Core clocked simulator for the registered adder/subtractor
//!
//! Each step is evaluated cycle-accurately:
//! - reset is checked first and, when high, forces the all-zero bank
//! - on a clock edge the next bank is computed from a frozen snapshot of
//!   the current one and assigned whole (non-blocking register semantics)
//! - with neither, the registers hold
//!
//! Hosts drive the circuit either with [`CoreSimulator::step`] or with the
//! pin-level `poke`/`tick`/`peek` interface.

use tracing::{debug, info, trace, warn};

use crate::config::SimConfig;
use crate::error::SimError;
use crate::logic::{add_sub, select_operand, signed_overflow, Op, Width};
use crate::vcd::VcdTracer;

/// Writable input pins
pub const INPUT_NAMES: [&str; 6] = ["a", "b", "op", "sel", "clk", "rst"];
/// Externally observable registered outputs
pub const OUTPUT_NAMES: [&str; 2] = ["z", "overflow"];
/// Register bank fields
pub const REG_NAMES: [&str; 6] = ["a_reg", "b_reg", "z", "sel_reg", "op_reg", "overflow"];
/// Combinational wires feeding the registers
pub const WIRE_NAMES: [&str; 5] = ["g", "h", "sum", "carry_out", "overflow_next"];

/// External stimulus for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Inputs {
    pub a: u8,
    pub b: u8,
    pub op: Op,
    pub select: bool,
    pub clock_edge: bool,
    pub reset: bool,
}

impl Inputs {
    /// A rising clock edge with reset released.
    pub fn clocked(a: u8, b: u8, op: Op, select: bool) -> Self {
        Self { a, b, op, select, clock_edge: true, reset: false }
    }

    /// Reset asserted; data pins low.
    pub fn reset() -> Self {
        Self { reset: true, ..Self::default() }
    }
}

/// Registered outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Outputs {
    pub z: u8,
    pub overflow: bool,
}

/// All state elements of the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterBank {
    pub a: u8,
    pub b: u8,
    pub z: u8,
    pub select: bool,
    pub op: Op,
    pub overflow: bool,
}

impl RegisterBank {
    pub fn outputs(&self) -> Outputs {
        Outputs { z: self.z, overflow: self.overflow }
    }

    /// Values in VCD signal order: a, b, z, sel, op, overflow
    fn trace_values(&self) -> [u64; 6] {
        [
            self.a as u64,
            self.b as u64,
            self.z as u64,
            self.select as u64,
            self.op.bit() as u64,
            self.overflow as u64,
        ]
    }
}

/// Combinational values the next edge would register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Wires {
    /// Mux output (left operand)
    pub g: u8,
    /// B after conditional invert (right operand)
    pub h: u8,
    pub sum: u8,
    pub carry_out: bool,
    pub overflow: bool,
}

/// Mux -> adder/subtractor -> overflow detect, for one set of operands.
pub fn compute_wires(width: Width, a: u8, b: u8, op: Op, select: bool, prev_z: u8) -> Wires {
    let g = select_operand(a, prev_z, select);
    let r = add_sub(width, g, b, op);
    Wires {
        g,
        h: r.h,
        sum: r.sum,
        carry_out: r.carry_out,
        overflow: signed_overflow(width, g, r.h, r.sum),
    }
}

/// Next register bank as a pure function of the current bank and the
/// stimulus for this step.
pub fn next_state(width: Width, old: &RegisterBank, inputs: &Inputs) -> RegisterBank {
    if inputs.reset {
        return RegisterBank::default();
    }
    if !inputs.clock_edge {
        return *old;
    }

    let mask = width.mask();
    let a = inputs.a & mask;
    let b = inputs.b & mask;
    let w = compute_wires(width, a, b, inputs.op, inputs.select, old.z);

    RegisterBank {
        a,
        b,
        z: w.sum,
        select: inputs.select,
        op: inputs.op,
        overflow: w.overflow,
    }
}

/// Current level of every input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Pins {
    a: u8,
    b: u8,
    op: Op,
    select: bool,
    clk: bool,
    rst: bool,
}

pub struct CoreSimulator {
    width: Width,
    pins: Pins,
    regs: RegisterBank,
    wires: Wires,
    /// Clock level sampled at the previous `tick`, for edge detection
    prev_clk: bool,
    /// Committed clock edges since the last reset
    cycles: u64,
    tracer: VcdTracer,
}

impl CoreSimulator {
    pub fn new(width: Width) -> Self {
        let names = ["a", "b", "z", "sel", "op", "overflow"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let n = width.bits() as usize;
        let widths = vec![n, n, n, 1, 1, 1];

        info!("created {}-bit adder/subtractor simulator", width.bits());
        Self {
            width,
            pins: Pins::default(),
            regs: RegisterBank::default(),
            wires: Wires::default(),
            prev_clk: false,
            cycles: 0,
            tracer: VcdTracer::new(names, widths),
        }
    }

    /// Build from bit count; anything outside 1..=8 is rejected.
    pub fn with_width(bits: u32) -> Result<Self, SimError> {
        Ok(Self::new(Width::new(bits)?))
    }

    pub fn from_config(config: &SimConfig) -> Result<Self, SimError> {
        let mut sim = Self::new(config.width()?);
        sim.tracer.set_timescale(&config.trace.timescale);
        sim.tracer.set_module_name(&config.trace.module_name);
        if let Some(ref path) = config.trace.path {
            sim.tracer.open_file(path)?;
        }
        if config.trace.enabled {
            sim.trace_start();
        }
        Ok(sim)
    }

    pub fn from_json(json: &str) -> Result<Self, SimError> {
        Self::from_config(&SimConfig::from_json(json)?)
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn registers(&self) -> &RegisterBank {
        &self.regs
    }

    pub fn outputs(&self) -> Outputs {
        self.regs.outputs()
    }

    pub fn wires(&self) -> &Wires {
        &self.wires
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycles
    }

    pub fn reg_count(&self) -> usize {
        REG_NAMES.len()
    }

    /// Apply one step of external stimulus and return the registered outputs.
    pub fn step(&mut self, inputs: Inputs) -> Outputs {
        let mask = self.width.mask();
        self.pins.a = inputs.a & mask;
        self.pins.b = inputs.b & mask;
        self.pins.op = inputs.op;
        self.pins.select = inputs.select;
        self.pins.rst = inputs.reset;
        self.apply(&inputs)
    }

    /// Run a sequence of steps, returning the outputs after each.
    pub fn run(&mut self, stimuli: &[Inputs]) -> Vec<Outputs> {
        stimuli.iter().map(|i| self.step(*i)).collect()
    }

    /// Force the all-zero register bank.
    pub fn reset(&mut self) {
        self.apply(&Inputs::reset());
    }

    /// Set an input pin. Values are masked to the pin width.
    ///
    /// `rst` is asynchronous: raising it clears the registers at once,
    /// without waiting for `tick`. While it stays high every `tick` holds
    /// the all-zero bank.
    pub fn poke(&mut self, name: &str, value: u64) -> Result<(), SimError> {
        let mask = self.width.mask() as u64;
        let bit = value & 1 != 0;
        match name {
            "a" => self.pins.a = (value & mask) as u8,
            "b" => self.pins.b = (value & mask) as u8,
            "op" => self.pins.op = Op::from(bit),
            "sel" => self.pins.select = bit,
            "clk" => self.pins.clk = bit,
            "rst" => {
                self.pins.rst = bit;
                if bit {
                    self.apply(&Inputs::reset());
                }
            }
            _ => return Err(SimError::UnknownSignal(name.to_string())),
        }
        Ok(())
    }

    /// Read a pin, register or wire by name.
    pub fn peek(&self, name: &str) -> Result<u64, SimError> {
        let v = match name {
            "a" => self.pins.a as u64,
            "b" => self.pins.b as u64,
            "op" => self.pins.op.bit() as u64,
            "sel" => self.pins.select as u64,
            "clk" => self.pins.clk as u64,
            "rst" => self.pins.rst as u64,
            "a_reg" => self.regs.a as u64,
            "b_reg" => self.regs.b as u64,
            "z" => self.regs.z as u64,
            "sel_reg" => self.regs.select as u64,
            "op_reg" => self.regs.op.bit() as u64,
            "overflow" => self.regs.overflow as u64,
            "g" => self.wires.g as u64,
            "h" => self.wires.h as u64,
            "sum" => self.wires.sum as u64,
            "carry_out" => self.wires.carry_out as u64,
            "overflow_next" => self.wires.overflow as u64,
            _ => return Err(SimError::UnknownSignal(name.to_string())),
        };
        Ok(v)
    }

    pub fn has_signal(name: &str) -> bool {
        INPUT_NAMES
            .iter()
            .chain(REG_NAMES.iter())
            .chain(WIRE_NAMES.iter())
            .any(|&n| n == name)
    }

    /// Recompute the combinational wires from the current pins and registers.
    pub fn evaluate(&mut self) {
        let p = self.pins;
        self.wires = compute_wires(self.width, p.a, p.b, p.op, p.select, self.regs.z);
    }

    /// Sample `rst` and `clk`: reset if `rst` is high, else clock the
    /// registers if `clk` rose since the previous tick.
    pub fn tick(&mut self) -> Outputs {
        let rising = !self.prev_clk && self.pins.clk;
        self.prev_clk = self.pins.clk;

        let p = self.pins;
        let inputs = Inputs {
            a: p.a,
            b: p.b,
            op: p.op,
            select: p.select,
            clock_edge: rising,
            reset: p.rst,
        };
        self.apply(&inputs)
    }

    fn apply(&mut self, inputs: &Inputs) -> Outputs {
        let next = next_state(self.width, &self.regs, inputs);

        if inputs.reset {
            if self.regs != RegisterBank::default() || self.cycles != 0 {
                debug!("reset after {} cycles", self.cycles);
            }
            self.cycles = 0;
        } else if inputs.clock_edge {
            self.cycles += 1;
            trace!(
                "edge {}: a={:#04x} b={:#04x} op={:?} sel={} -> z={:#04x} v={}",
                self.cycles,
                next.a,
                next.b,
                next.op,
                next.select,
                next.z,
                next.overflow
            );
        }

        self.regs = next;
        self.evaluate();

        if let Err(e) = self.tracer.capture(&self.regs.trace_values()) {
            warn!("VCD capture failed, tracing disabled: {}", e);
            self.tracer.disable();
        }

        self.regs.outputs()
    }

    // ------------------------------------------------------------------
    // Tracing
    // ------------------------------------------------------------------

    pub fn tracer(&self) -> &VcdTracer {
        &self.tracer
    }

    pub fn tracer_mut(&mut self) -> &mut VcdTracer {
        &mut self.tracer
    }

    /// Start tracing from the current register values.
    pub fn trace_start(&mut self) {
        let values = self.regs.trace_values();
        self.tracer.start(&values);
    }

    pub fn trace_stop(&mut self) -> Result<(), SimError> {
        self.tracer.stop()
    }

    pub fn trace_to_vcd(&self) -> String {
        self.tracer.to_vcd()
    }

    /// Drop buffered changes and rewind trace time.
    pub fn trace_clear(&mut self) {
        self.tracer.clear();
    }
}
