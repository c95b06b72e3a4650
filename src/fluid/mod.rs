pub mod eos;
pub mod flash;
pub mod pvt;
pub mod relperm;

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Aqueous,
    Liquid,
    Vapor,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Aqueous => "Aqueous",
            Phase::Liquid => "Liquid",
            Phase::Vapor => "Vapor",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
