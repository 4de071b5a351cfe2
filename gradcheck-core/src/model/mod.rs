// src/model/mod.rs
// Networks assembled from layers.

pub mod net;

pub use net::Net;
