use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};

pub const RED: &str = "\x1B[1;31m";
pub const GRN: &str = "\x1B[1;32m";
pub const YEL: &str = "\x1B[1;33m";
pub const GRY: &str = "\x1B[1;30m";
pub const RESET: &str = "\x1B[0m";

static DEBUG: AtomicBool = AtomicBool::new(false);

/// turn `debug` messages on or off for the whole process
pub fn set_debug(enabled: bool) {
    DEBUG.store(enabled, Ordering::Relaxed);
}

pub fn debug_enabled() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

pub fn error<S: Display>(msg: S) {
    eprintln!("[ish] {}error:{} {}", RED, RESET, msg);
}

pub fn warn<S: Display>(msg: S) {
    eprintln!("[ish] {}warning:{} {}", YEL, RESET, msg);
}

pub fn info<S: Display>(msg: S) {
    eprintln!("[ish] {}info:{} {}", GRN, RESET, msg);
}

pub fn debug<S: Display>(msg: S) {
    if debug_enabled() {
        eprintln!("[ish] {}DEBUG:{} {}", GRY, RESET, msg);
    }
}
