//! Cycle-accurate simulator for a registered adder/subtractor circuit
//!
//! Models the steady-state behavior of a small synchronous datapath:
//! - input registers latch operands A, B and the `op`/`sel` control bits
//! - a mux picks A or the previous result Z as the left operand
//! - a ripple adder computes `G + (op ? !B : B) + op` with signed overflow
//! - result and overflow are registered on the rising clock edge
//! - an asynchronous reset clears every register and wins over the clock
//!
//! Hosts drive the circuit through [`CoreSimulator`] or the C ABI in [`ffi`].

pub mod config;
pub mod core;
pub mod error;
pub mod ffi;
pub mod logic;
pub mod vcd;

pub use crate::config::{SimConfig, TraceConfig};
pub use crate::core::{CoreSimulator, Inputs, Outputs, RegisterBank, Wires};
pub use crate::error::SimError;
pub use crate::logic::{Op, Width, MAX_WIDTH};
pub use crate::vcd::{TraceMode, VcdTracer};
