pub mod event;
pub mod extract;
pub mod file_ops;
pub mod gate;
pub mod guard;
pub mod intake;
pub mod reactor;
pub mod scheduler;
pub mod state;
pub mod stream;
