//! Thin wrappers over the hickory wire codec.

use hickory_proto::op::{Edns, Message, MessageType, ResponseCode};

use crate::error::Result;

/// Largest DNS message accepted over UDP or carried by one TCP frame.
pub const MAX_MESSAGE_SIZE: usize = u16::MAX as usize;

/// Smallest payload EDNS lets a responder advertise.
const MIN_EDNS_PAYLOAD: u16 = 512;

/// Decode one DNS message from wire bytes.
pub fn decode(wire: &[u8]) -> Result<Message> {
    Ok(Message::from_vec(wire)?)
}

/// Encode one DNS message to wire bytes.
pub fn encode(message: &Message) -> Result<Vec<u8>> {
    Ok(message.to_vec()?)
}

/// Build a REFUSED response addressed to `request`.
///
/// The response keeps the request's id, opcode, RD/CD flags and question
/// section. If the request carried an OPT record, the response carries one too.
pub fn refused_response(request: &Message) -> Message {
    let mut response = Message::new();
    response
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_recursion_desired(request.recursion_desired())
        .set_checking_disabled(request.checking_disabled())
        .set_response_code(ResponseCode::Refused);
    response.add_queries(request.queries().iter().cloned());

    if let Some(edns) = request.extensions() {
        let mut reply = Edns::new();
        reply.set_max_payload(edns.max_payload().max(MIN_EDNS_PAYLOAD));
        reply.set_version(0);
        response.set_edns(reply);
    }

    response
}
