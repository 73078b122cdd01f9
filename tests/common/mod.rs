#![allow(dead_code)]

pub mod glb;
#[cfg(feature = "integration-tests")]
pub mod test_utils;
