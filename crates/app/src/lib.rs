pub mod config;
pub mod controller;
pub mod gate;
pub mod latency;
pub mod listener;
pub mod reasoning;
pub mod remote;
pub mod reminder;
pub mod session;
pub mod voice;
