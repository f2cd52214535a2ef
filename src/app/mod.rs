pub mod log_data_use_case;
pub mod ports;
pub mod song_data_use_case;
