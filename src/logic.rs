//! Combinational datapath: operand mux, adder/subtractor and overflow detect.
//!
//! Every function here is pure. Values are carried in `u8` and masked to the
//! configured [`Width`]; the adder widens to `u16` so bit `n` of the sum is
//! available as the carry-out.

use crate::error::SimError;

/// Widest operand the datapath models.
pub const MAX_WIDTH: u32 = 8;

/// Operand width in bits, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Width(u32);

impl Width {
    /// Width used by the board wrapper.
    pub const BYTE: Width = Width(8);

    pub fn new(bits: u32) -> Result<Self, SimError> {
        if bits == 0 || bits > MAX_WIDTH {
            return Err(SimError::InvalidWidth(bits));
        }
        Ok(Width(bits))
    }

    #[inline(always)]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// All-ones value for this width.
    #[inline(always)]
    pub fn mask(self) -> u8 {
        ((1u16 << self.0) - 1) as u8
    }

    /// Sign bit for this width.
    #[inline(always)]
    pub fn msb(self) -> u8 {
        1u8 << (self.0 - 1)
    }
}

impl Default for Width {
    fn default() -> Self {
        Width::BYTE
    }
}

/// Operation select bit: 0 adds, 1 subtracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Op {
    #[default]
    Add,
    Sub,
}

impl Op {
    /// The bit as driven on the `op` pin. It is both the B-invert control
    /// and the adder carry-in.
    #[inline(always)]
    pub fn bit(self) -> u8 {
        match self {
            Op::Add => 0,
            Op::Sub => 1,
        }
    }
}

impl From<bool> for Op {
    fn from(sub: bool) -> Self {
        if sub { Op::Sub } else { Op::Add }
    }
}

/// Output of the adder/subtractor for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddSub {
    /// Right operand after the conditional invert.
    pub h: u8,
    /// Sum truncated to the width.
    pub sum: u8,
    /// Bit `n` of the `n+1`-bit sum.
    pub carry_out: bool,
}

/// Left-operand mux: the latched operand when `select` is low, the
/// previously registered result when high.
#[inline(always)]
pub fn select_operand(a: u8, z: u8, select: bool) -> u8 {
    if select { z } else { a }
}

/// `G + (op ? !B : B) + op`, modulo `2^n`.
#[inline(always)]
pub fn add_sub(width: Width, g: u8, b: u8, op: Op) -> AddSub {
    let mask = width.mask();
    let h = match op {
        Op::Add => b & mask,
        Op::Sub => !b & mask,
    };
    let full = (g & mask) as u16 + h as u16 + op.bit() as u16;
    AddSub {
        h,
        sum: (full & mask as u16) as u8,
        carry_out: (full >> width.bits()) & 1 != 0,
    }
}

/// Signed overflow: both operands share a sign bit and the sum does not.
#[inline(always)]
pub fn signed_overflow(width: Width, g: u8, h: u8, s: u8) -> bool {
    let msb = width.msb();
    let g_neg = g & msb != 0;
    let h_neg = h & msb != 0;
    let s_neg = s & msb != 0;
    (g_neg && h_neg && !s_neg) || (!g_neg && !h_neg && s_neg)
}
