#![allow(dead_code)]

pub mod utils;
pub mod wearable_helpers;
