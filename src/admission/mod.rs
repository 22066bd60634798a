//! Admission control logic and state management.

mod backend;
mod clock;
mod controller;
mod counter;
mod decision;
mod key;
mod policy;
mod sweeper;

pub use backend::AdmissionBackend;
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::AdmissionController;
pub use counter::WindowCounter;
pub use decision::Decision;
pub use key::{RateKey, MAX_KEY_LEN};
pub use policy::{AdmissionPolicy, DEFAULT_RETENTION_WINDOWS};
pub use sweeper::Sweeper;
