use gesture::PointerSample;
use link::{ConnectionState, LinkMessage};
use shared::protocol::InputEvent;

/// Item carried from the acquisition task to the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Display-space sample from the hand tracker.
    Pointer(PointerSample),
    /// Decoded wire frame.
    Event(InputEvent),
    Link(ConnectionState),
}

impl From<LinkMessage> for Input {
    fn from(message: LinkMessage) -> Self {
        match message {
            LinkMessage::State(state) => Input::Link(state),
            LinkMessage::Frame(event) => Input::Event(event),
        }
    }
}

impl From<PointerSample> for Input {
    fn from(sample: PointerSample) -> Self {
        Input::Pointer(sample)
    }
}
