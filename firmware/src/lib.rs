#![cfg_attr(not(test), no_std)]

pub mod ads1115;
pub mod board;
pub mod delay;
pub mod display;
pub mod network;
pub mod panel;
pub mod rtc;
pub mod storage;
