mod resolver;

pub use resolver::{
    DEFAULT_ROOM_OVERRIDES, RoomError, RoomMapping, RoomResolver, padded_room_name,
};
