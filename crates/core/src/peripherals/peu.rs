use crate::fixed::cordic_sin_cos;
use crate::regs::{self, Control, Status};
use crate::{HarnessResult, Peripheral};
use peu_config::{PeripheralDescriptor, PeuKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeuMode {
    /// Angle write at 0x08 starts sin/cos; results at 0x10/0x14.
    #[default]
    Trig,
    /// Control write at 0x08 with START starts `X + Y`; STATUS.DONE signals completion.
    Adder,
}

impl From<PeuKind> for PeuMode {
    fn from(kind: PeuKind) -> Self {
        match kind {
            PeuKind::Trig => PeuMode::Trig,
            PeuKind::Adder => PeuMode::Adder,
        }
    }
}

/// A computation latched at trigger time, committed when `remaining` hits zero.
#[derive(Debug, Clone, Copy)]
struct Pending {
    remaining: u32,
    result_a: u32,
    result_b: u32,
}

/// Cycle-stepped model of the PEU register block.
///
/// Results are latched from the operands at trigger time and become
/// visible `latency` ticks later. Until then the result registers keep
/// their previous contents, so a short fixed delay reads stale values.
#[derive(Debug, Default)]
pub struct Peu {
    mode: PeuMode,
    latency: u32,
    stuck: bool,
    x: u32,        // 0x00
    y: u32,        // 0x04
    ctrl: u32,     // 0x08
    status: Status, // 0x0C
    result_a: u32, // 0x10
    result_b: u32, // 0x14
    pending: Option<Pending>,
    output_log: Vec<u32>,
    triggers: u64,
}

impl Peu {
    pub fn new(mode: PeuMode, latency: u32) -> Self {
        Self {
            mode,
            latency,
            ..Default::default()
        }
    }

    pub fn from_config(desc: &PeripheralDescriptor) -> Self {
        let mut peu = Self::new(desc.mode.into(), desc.latency_cycles);
        peu.stuck = desc.stuck;
        peu
    }

    /// A peripheral that accepts triggers but never completes.
    pub fn stuck(mode: PeuMode) -> Self {
        Self {
            mode,
            stuck: true,
            ..Default::default()
        }
    }

    pub fn mode(&self) -> PeuMode {
        self.mode
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Every value written to Y, in order. This is what a waveform viewer
    /// attached to the Y register would show.
    pub fn output_log(&self) -> &[u32] {
        &self.output_log
    }

    /// Number of computations started since reset.
    pub fn triggers(&self) -> u64 {
        self.triggers
    }

    pub fn reset(&mut self) {
        *self = Self {
            mode: self.mode,
            latency: self.latency,
            stuck: self.stuck,
            ..Default::default()
        };
    }

    fn start(&mut self, result_a: u32, result_b: u32) {
        self.triggers += 1;
        if self.mode == PeuMode::Adder {
            self.status.remove(Status::DONE);
        }
        tracing::debug!(
            "PEU: {:?} computation started, latency {} cycles",
            self.mode,
            self.latency
        );
        self.pending = Some(Pending {
            remaining: self.latency,
            result_a,
            result_b,
        });
        if self.latency == 0 {
            self.commit();
        }
    }

    fn commit(&mut self) {
        if self.stuck {
            return;
        }
        if let Some(p) = self.pending.take() {
            self.result_a = p.result_a;
            self.result_b = p.result_b;
            if self.mode == PeuMode::Adder {
                self.status.insert(Status::DONE);
            }
            tracing::debug!(
                "PEU: results committed a={:#010x} b={:#010x}",
                self.result_a,
                self.result_b
            );
        }
    }
}

impl Peripheral for Peu {
    fn read(&self, offset: u64) -> HarnessResult<u32> {
        let value = match offset {
            regs::X => self.x,
            regs::Y => self.y,
            regs::ANGLE => self.ctrl,
            // Status is only wired up in adder mode.
            regs::STATUS => self.status.bits(),
            regs::RESULT_A => self.result_a,
            regs::RESULT_B => self.result_b,
            _ => 0,
        };
        Ok(value)
    }

    fn write(&mut self, offset: u64, value: u32) -> HarnessResult<()> {
        match offset {
            regs::X => self.x = value,
            regs::Y => {
                self.y = value;
                self.output_log.push(value);
            }
            regs::ANGLE => match self.mode {
                PeuMode::Trig => {
                    self.ctrl = value;
                    let (cos, sin) = cordic_sin_cos(value);
                    self.start(cos, sin);
                }
                PeuMode::Adder => {
                    let control = Control::from_bits_retain(value);
                    // START is self-clearing.
                    self.ctrl = (control - Control::START).bits();
                    if control.contains(Control::START) {
                        self.start(self.x.wrapping_add(self.y), 0);
                    }
                }
            },
            // STATUS and results are read-only.
            _ => {}
        }
        Ok(())
    }

    fn tick(&mut self) {
        if self.stuck {
            return;
        }
        if let Some(p) = self.pending.as_mut() {
            p.remaining = p.remaining.saturating_sub(1);
            if p.remaining == 0 {
                self.commit();
            }
        }
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }
}
