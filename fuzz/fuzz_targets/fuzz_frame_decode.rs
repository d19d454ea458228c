#![no_main]

use libfuzzer_sys::fuzz_target;
use shadow_signal_client::codec::{Frame, Packet};
use shadow_signal_client::protocol::{Ack, ServerEvent};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(frame) = Frame::decode(text) else {
        return;
    };

    // Anything that decodes must encode again without error.
    let _ = frame.encode();

    match frame {
        Frame::Message(Packet::Event { name, args, .. }) => {
            let _ = ServerEvent::decode(&name, &args);
        }
        Frame::Message(Packet::Ack { args, .. }) => {
            let ack = Ack::from_args(args);
            let _ = ack.room();
        }
        _ => {}
    }
});
