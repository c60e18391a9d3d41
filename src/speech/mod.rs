//! Wake-triggered speech segmentation.

pub mod state_machine;

pub use state_machine::{
    FinalizedRecording, ListenState, SpeechConfig, SpeechEvent, SpeechStateMachine,
};
