mod frame_codec;
mod frame_splitter;
mod message;
mod request_response;

pub use frame_codec::FrameCodec;
pub use frame_splitter::{FrameIter, FrameSplitter};
pub use message::{Message, MessageBody, MessageType};
pub use request_response::{ResponseCode, RpcRequest, RpcResponse, make_service_key};
