//! # ward-bed
//!
//! A simulated patient bed. Dials set vitals, a remote classifier turns them
//! into a seriousness level, and the result is sent to the relay once the
//! dials have been still for the debounce window.

pub mod classifier;
pub mod simulator;
pub mod vitals;

pub use classifier::{Classifier, ClassifyError, HttpClassifier};
pub use simulator::{BedSimulator, Uplink};
pub use vitals::{ClassifierRequest, Dial, Vitals};
