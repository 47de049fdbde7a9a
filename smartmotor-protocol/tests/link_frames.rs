//! Property tests for command and reading frames on the wire

use proptest::prelude::*;
use smartmotor_protocol::{
    CommandFrame, Frame, FrameError, FrameLayout, BANK_SLOTS, FRAME_START,
};

fn layout() -> impl Strategy<Value = FrameLayout> {
    prop_oneof![Just(FrameLayout::V1), Just(FrameLayout::V2)]
}

fn commands() -> impl Strategy<Value = [i8; BANK_SLOTS]> {
    prop::array::uniform5(-127i8..=127)
}

proptest! {
    #[test]
    fn commands_survive_the_wire(
        layout in layout(),
        bank in 0u8..3,
        seq in any::<u8>(),
        enabled in 0u8..32,
        cmds in commands(),
    ) {
        let sent = CommandFrame::new(layout, bank, seq, enabled, cmds);
        let bytes = sent.to_frame().unwrap().encode_to_vec().unwrap();

        let received = CommandFrame::from_frame(&Frame::decode(&bytes).unwrap()).unwrap();
        prop_assert_eq!(received.commands(), cmds);
        prop_assert_eq!(received, sent);
    }

    #[test]
    fn corrupted_payload_byte_is_rejected(
        layout in layout(),
        cmds in commands(),
        index in 0usize..BANK_SLOTS + 2,
        flip in 1u8..=255,
    ) {
        let sent = CommandFrame::new(layout, 0, 0, 0x1F, cmds);
        let mut bytes = sent.to_frame().unwrap().encode_to_vec().unwrap();
        // Payload starts after START, LENGTH and TYPE
        bytes[3 + index] ^= flip;
        // A start byte inside the payload could open a shorter valid frame
        prop_assume!(!bytes[1..].contains(&FRAME_START));

        prop_assert_eq!(Frame::decode(&bytes), Err(FrameError::InvalidChecksum));
    }
}
