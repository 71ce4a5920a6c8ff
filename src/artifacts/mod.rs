pub mod services;

pub use services::{discard, store, StoredObject, Upload};
