// Licensed under the Apache-2.0 license

#![cfg_attr(target_arch = "riscv32", no_std)]

pub mod codec;
pub mod error;
pub mod message;
pub mod protocol;
pub mod util;
