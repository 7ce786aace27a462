#![no_main]

use libfuzzer_sys::fuzz_target;
use reject_party_owner::protocol::LcuEvent;
use reject_party_owner::{LeadershipTracker, SummonerId};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Whatever decodes must also be safe to feed through the tracker.
    let mut tracker = LeadershipTracker::new(None);
    match LcuEvent::decode(text) {
        Ok(Some(LcuEvent::LobbyChanged(comms))) => {
            let _ = tracker.on_membership_change(SummonerId(1), &comms);
        }
        Ok(Some(LcuEvent::ChatMessage {
            event_type,
            message,
        })) => {
            let _ = tracker.on_chat_message(message.from_summoner_id, event_type, &message);
        }
        Ok(None) | Err(_) => {}
    }
});
