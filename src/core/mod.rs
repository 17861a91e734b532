pub mod console;
pub mod de;
pub mod domain;
pub mod form;
pub mod sequencer;
pub mod state;
pub mod timers;
