mod payload;

pub use payload::{
    MappingError, MappingOptions, PayloadMapper, adjust_end_time, build_day_times,
    check_same_room, compose_name, extract_repeat_days, group_payload, has_distinct_times,
    single_payload,
};
