pub mod client;

pub use client::{Rendering, SiegClient};
