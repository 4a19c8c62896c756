pub mod capture;
pub mod mailbox;

pub use capture::run_capture;
pub use mailbox::FrameMailbox;
