pub mod audio;
pub mod bootstrap;
pub mod event;
pub mod scheduler;
pub mod session;
pub mod tags;
pub mod telemetry;
pub mod time;
pub mod trigger;
