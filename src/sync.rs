#[cfg(feature = "loom")]
mod imp {
    pub(crate) use loom::sync::{
        atomic::{fence, AtomicBool, AtomicI32, AtomicU64, Ordering},
        Arc, Mutex,
    };
}

#[cfg(not(feature = "loom"))]
mod imp {
    pub(crate) use core::sync::atomic::{fence, AtomicBool, AtomicI32, AtomicU64, Ordering};
    pub(crate) use std::sync::{Arc, Mutex};
}

pub(crate) use imp::*;
