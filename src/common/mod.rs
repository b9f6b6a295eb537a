// SPDX-License-Identifier: MIT

pub mod error;

pub use error::{CalcError, Result};
