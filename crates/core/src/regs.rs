//! PEU register map.
//!
//! | Offset | Register | Role |
//! |---|---|---|
//! | 0x00 | X | operand A |
//! | 0x04 | Y | operand B, diagnostic output |
//! | 0x08 | ANGLE | angle input (trig) / control (adder), trigger |
//! | 0x0C | STATUS | bit 0 = done (adder) |
//! | 0x10 | RESULT_A | cosine / sum |
//! | 0x14 | RESULT_B | sine |

use bitflags::bitflags;
use peu_config::RegisterName;
use serde::Serialize;
use std::fmt;

pub use peu_config::DEFAULT_BASE_ADDRESS as PEU_BASE;

pub const X: u64 = 0x00;
pub const Y: u64 = 0x04;
pub const ANGLE: u64 = 0x08;
pub const CONTROL: u64 = ANGLE;
pub const STATUS: u64 = 0x0C;
pub const RESULT_A: u64 = 0x10;
pub const RESULT_B: u64 = 0x14;

/// Size of the register window in bytes.
pub const WINDOW_SIZE: u64 = 0x18;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Control: u32 {
        const START = 1 << 0;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Status: u32 {
        const DONE = 1 << 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Register {
    X,
    Y,
    Angle,
    Status,
    ResultA,
    ResultB,
}

impl Register {
    pub const ALL: [Register; 6] = [
        Register::X,
        Register::Y,
        Register::Angle,
        Register::Status,
        Register::ResultA,
        Register::ResultB,
    ];

    pub fn offset(self) -> u64 {
        match self {
            Register::X => X,
            Register::Y => Y,
            Register::Angle => ANGLE,
            Register::Status => STATUS,
            Register::ResultA => RESULT_A,
            Register::ResultB => RESULT_B,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::X => "X",
            Register::Y => "Y",
            Register::Angle => "ANGLE",
            Register::Status => "STATUS",
            Register::ResultA => "RESULT_A",
            Register::ResultB => "RESULT_B",
        }
    }

    pub fn role(self) -> &'static str {
        match self {
            Register::X => "operand A input",
            Register::Y => "operand B input / diagnostic output",
            Register::Angle => "angle input / control (trigger)",
            Register::Status => "status, bit 0 = done",
            Register::ResultA => "result A / cosine (Q16.16)",
            Register::ResultB => "result B / sine (Q16.16)",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<RegisterName> for Register {
    fn from(name: RegisterName) -> Self {
        match name {
            RegisterName::X => Register::X,
            RegisterName::Y => Register::Y,
            RegisterName::Angle => Register::Angle,
            RegisterName::Status => Register::Status,
            RegisterName::ResultA => Register::ResultA,
            RegisterName::ResultB => Register::ResultB,
        }
    }
}

/// A register block placed at a platform base address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMap {
    pub base: u64,
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self { base: PEU_BASE }
    }
}

impl RegisterMap {
    pub fn new(base: u64) -> Self {
        Self { base }
    }

    pub fn addr(&self, reg: Register) -> u64 {
        self.base.wrapping_add(reg.offset())
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr.checked_sub(self.base)
            .is_some_and(|offset| offset < WINDOW_SIZE)
    }
}
